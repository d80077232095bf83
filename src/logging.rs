use crate::config::LoggingConfig;
use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging with console output plus a daily-rolling JSON file
/// under the configured directory.
pub fn init_logging(config: &LoggingConfig) {
    let _ = fs::create_dir_all(&config.dir);

    let file_appender = tracing_appender::rolling::daily(&config.dir, "foodreel.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    // A malformed filter directive falls back to the default rather than
    // panicking at startup.
    let directive = config
        .filter
        .parse()
        .unwrap_or_else(|_| "foodreel=info".parse().expect("valid default directive"));

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(directive))
        .with(file_layer)
        .with(console_layer)
        .init();

    // The guard must outlive the process for logs to keep flushing
    std::mem::forget(_guard);
}
