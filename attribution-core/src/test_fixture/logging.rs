use std::sync::Once;

/// Set up logging for tests. Only this crate logs at `INFO` by default; `RUST_LOG` overrides it.
///
/// ## Panics
/// Does not, but compiler cannot be convinced otherwise
pub fn setup() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        use std::str::FromStr;

        use tracing::Level;
        use tracing_subscriber::{
            EnvFilter, filter::Directive, fmt, fmt::format::FmtSpan, layer::SubscriberExt,
            util::SubscriberInitExt,
        };

        let default_directive = if let Some(crate_name) = option_env!("CARGO_CRATE_NAME") {
            Directive::from_str(&format!("{crate_name}=INFO")).unwrap()
        } else {
            Level::INFO.into()
        };

        let _ = tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(default_directive)
                    .from_env_lossy(),
            )
            .with(
                fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .with_test_writer(),
            )
            .try_init();
    });
}
