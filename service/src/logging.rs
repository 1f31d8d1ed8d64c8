use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Transport crates whose logs drown the client's own output below `TRACE`.
const NOISY_DEPENDENCIES: &[&str] = &[
    "reqwest",
    "reqwest_retry",
    "hyper",
    "hyper_util",
    "cookie_store",
    "rust_socketio",
    "rust_engineio",
    "tungstenite",
    "tokio_tungstenite",
    "native_tls",
];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger.
    ///
    /// Production builds log everything to stderr without colors so the output
    /// can be captured; other environments split warnings and errors to stderr.
    /// Fails if a global logger is already installed.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let (mode, color) = if config.is_production() {
            (TerminalMode::Stderr, ColorChoice::Never)
        } else {
            (TerminalMode::Mixed, ColorChoice::Auto)
        };

        TermLogger::init(
            config.log_level_filter,
            Self::log_config(config.log_level_filter),
            mode,
            color,
        )
    }

    /// Modules silenced at `level`. `TRACE` silences nothing.
    fn ignored_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            NOISY_DEPENDENCIES
        }
    }

    fn log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        for module in Self::ignored_modules(level) {
            builder.add_filter_ignore_str(module);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_http_and_socket_stacks_are_silenced() {
        let ignored = Logger::ignored_modules(LevelFilter::Info);
        for module in ["reqwest", "hyper", "rust_socketio", "rust_engineio", "tungstenite"] {
            assert!(ignored.contains(&module), "{module} should be silenced");
        }
    }

    #[test]
    fn test_trace_shows_dependency_logs() {
        assert!(Logger::ignored_modules(LevelFilter::Trace).is_empty());
        assert_eq!(Logger::ignored_modules(LevelFilter::Debug), NOISY_DEPENDENCIES);
    }

    #[test]
    fn test_second_init_is_rejected() {
        let config = Config::try_parse_from(["beasybox", "--log-level-filter", "ERROR"]).unwrap();

        let _ = Logger::init_logger(&config);

        assert!(Logger::init_logger(&config).is_err());
    }
}
