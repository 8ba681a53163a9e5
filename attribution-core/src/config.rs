use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

use crate::{
    error::Error, protocol::EngineKind, protocol::attribution::InputEncryption,
    telemetry::Verbosity,
};

/// Prefix of environment variables that override file settings, e.g. `ATTRIBUTION_BATCH_SIZE=8`.
pub const ENV_PREFIX: &str = "ATTRIBUTION";

/// Settings of one party process. Both parties must agree on everything here except
/// `verbosity`, otherwise the run fails with a desynchronization error.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AttributionConfig {
    /// Rows per batch. `1` runs the single-row path.
    pub batch_size: usize,
    pub input_encryption: InputEncryption,
    pub engine: EngineKind,
    /// Capacity of each in-memory channel between the parties.
    pub channel_capacity: usize,
    pub verbosity: Verbosity,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            input_encryption: InputEncryption::default(),
            engine: EngineKind::default(),
            channel_capacity: 16,
            verbosity: Verbosity::default(),
        }
    }
}

impl AttributionConfig {
    /// Reads the configuration from a TOML string.
    ///
    /// ## Errors
    /// If the string is not valid TOML, or a setting has the wrong type, or the settings are
    /// inconsistent.
    pub fn from_toml_str(input: &str) -> Result<Self, Error> {
        Self::build(Config::builder().add_source(File::from_str(input, FileFormat::Toml)))
    }

    /// Reads the configuration from the TOML file at `path` and applies `ATTRIBUTION_*`
    /// environment overrides on top of it.
    ///
    /// ## Errors
    /// If the file can't be read or parsed, or the settings are inconsistent.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::build(
            Config::builder()
                .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
                .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true)),
        )
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, Error> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(Error::Unsupported("batch_size must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Unsupported(
                "channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use std::io::Write;

    use super::AttributionConfig;
    use crate::{
        error::Error,
        protocol::{EngineKind, attribution::InputEncryption},
        telemetry::Verbosity,
    };

    #[test]
    fn defaults() {
        let config = AttributionConfig::from_toml_str("").unwrap();
        assert_eq!(AttributionConfig::default(), config);
        assert_eq!(EngineKind::Eager, config.engine);
        assert_eq!(InputEncryption::Plaintext, config.input_encryption);
    }

    #[test]
    fn parses_all_settings() {
        let config = AttributionConfig::from_toml_str(
            r#"
            batch_size = 8
            input_encryption = "partner_xor"
            engine = "lazy"
            channel_capacity = 4

            [verbosity]
            verbose = 2
            "#,
        )
        .unwrap();
        assert_eq!(
            AttributionConfig {
                batch_size: 8,
                input_encryption: InputEncryption::PartnerXor,
                engine: EngineKind::Lazy,
                channel_capacity: 4,
                verbosity: Verbosity {
                    quiet: false,
                    verbose: 2
                },
            },
            config
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AttributionConfig::from_toml_str("engine = \"quantum\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AttributionConfig::from_toml_str("batch_size = 0"),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "batch_size = 3\nengine = \"plaintext\"").unwrap();

        let config = AttributionConfig::load(file.path()).unwrap();
        assert_eq!(3, config.batch_size);
        assert_eq!(EngineKind::Plaintext, config.engine);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AttributionConfig::load(dir.path().join("absent.toml")),
            Err(Error::Config(_))
        ));
    }
}
