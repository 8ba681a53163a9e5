pub mod stats;

use std::io::{IsTerminal, stderr};

use serde::Deserialize;
use tracing::{Level, info, metadata::LevelFilter};
use tracing_subscriber::{
    EnvFilter, fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

pub use stats::EngineStats;

use crate::error::set_global_panic_hook;

pub mod metrics {
    pub const AND_GATES: &str = "engine.and_gates";
    pub const ROUNDS: &str = "engine.rounds";
    pub const MESSAGES_SENT: &str = "engine.messages_sent";
    pub const BYTES_SENT: &str = "engine.bytes_sent";
}

/// Logging verbosity of a party process.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Verbosity {
    /// Silence all output
    pub quiet: bool,

    /// Verbose mode (1, or 2 for even more verbose)
    pub verbose: u8,
}

impl Verbosity {
    /// Installs the global tracing subscriber and panic hook. Returns `false` if a subscriber
    /// was already installed, in which case nothing changes.
    pub fn setup_logging(&self) -> bool {
        let filter_layer = self.log_filter();
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_ansi(stderr().is_terminal())
            .with_writer(stderr);

        let installed = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed {
            set_global_panic_hook();
            info!("Logging setup at level {:?}", self.level());
        }
        installed
    }

    fn level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::OFF
        } else {
            LevelFilter::from_level(match self.verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            })
        }
    }

    fn log_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level().into())
            .from_env_lossy()
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use tracing::metadata::LevelFilter;

    use super::Verbosity;

    #[test]
    fn levels() {
        assert_eq!(LevelFilter::INFO, Verbosity::default().level());
        assert_eq!(
            LevelFilter::TRACE,
            Verbosity {
                quiet: false,
                verbose: 2
            }
            .level()
        );
        assert_eq!(
            LevelFilter::OFF,
            Verbosity {
                quiet: true,
                verbose: 2
            }
            .level()
        );
    }
}
