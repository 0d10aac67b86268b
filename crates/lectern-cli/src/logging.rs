//! Diagnostic output for the CLI.
//!
//! Logs go to stderr so that stdout carries only command output. The level
//! comes from `LECTERN_LOG` when set (any `EnvFilter` directive), otherwise
//! from the `-v` count:
//!
//! - 0: `warn`
//! - 1 (`-v`): `info`
//! - 2 (`-vv`): `debug`
//! - 3+: `trace`

use std::io;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub const ENV_VAR: &str = "LECTERN_LOG";

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: &LogConfig) {
    init_logging_with_writer(config, io::stderr);
}

pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_env(ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.level)));

    let layer = fmt::layer()
        .compact()
        .with_writer(writer)
        .with_ansi(config.with_ansi)
        .with_target(false)
        .without_time();

    // A second initialization is a no-op
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

/// Our crates at `level`, everything else (HTTP stack included) at `warn`.
/// The binary is also named `lectern`, so its events share the first target.
fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,lectern={level},lectern_session={level}", level = level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verbosity() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(7).level, Level::TRACE);
        assert!(!LogConfig::default().with_ansi(false).with_ansi);
    }

    #[test]
    fn test_default_directives() {
        let directives = default_directives(Level::DEBUG);
        assert_eq!(directives, "warn,lectern=debug,lectern_session=debug");
        assert!(EnvFilter::try_new(&directives).is_ok());

        // Events from the binary carry `lectern::...` targets
        assert!(module_path!().starts_with("lectern::"));
    }
}
