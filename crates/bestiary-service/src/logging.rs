use std::io::IsTerminal;

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;

use crate::config::{LogFormat, Logging};

/// Initializes the global tracing subscriber from the logging config.
///
/// This is meant to be called once by the embedding application; the library
/// itself only emits `tracing` events and never installs a subscriber on its
/// own. Calling it twice is a no-op.
pub fn init(config: &Logging) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let format = match config.format {
        LogFormat::Auto if std::io::stdout().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        other => other,
    };

    let builder = fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_env_filter(filter);

    match format {
        LogFormat::Pretty => {
            builder.pretty().try_init().ok();
        }
        LogFormat::Simplified => {
            builder.with_ansi(false).with_target(false).try_init().ok();
        }
        _ => {
            builder.json().flatten_event(true).try_init().ok();
        }
    }
}
