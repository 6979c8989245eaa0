//! Logging setup

use crate::config::LogFormat;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a `RUST_LOG`-style level name; unknown values mean INFO
pub fn parse_level(value: &str) -> Level {
    match value.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global tracing subscriber. Level comes from `RUST_LOG`.
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG")
        .map(|s| parse_level(&s))
        .unwrap_or(Level::INFO);

    match format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}
