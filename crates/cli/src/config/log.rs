//! Configuration and initialization for application logging.
//!
//! `LogConfig` selects the output targets (stdout, stderr, journald, file)
//! and the minimum level. `LogDriver` turns each enabled target into a
//! `tracing` layer.
use std::{fs::OpenOptions, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use tracing_subscriber::{
    Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// Represents the configuration for the agent's logging system.
///
/// Messages go to every enabled target. The defaults mirror the legacy
/// deployment: `error` level, stdout plus `./log/tools.log`.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// Optional path to a file where logs should be appended.
    #[serde(default = "LogConfig::default_file_path")]
    pub file_path: Option<PathBuf>,

    #[serde(default = "LogConfig::default_emit_journald")]
    pub emit_journald: bool,

    #[serde(default = "LogConfig::default_emit_stdout")]
    pub emit_stdout: bool,

    #[serde(default = "LogConfig::default_emit_stderr")]
    pub emit_stderr: bool,

    /// The minimum log level to be recorded.
    #[serde(default = "LogConfig::default_log_level")]
    #[serde_as(as = "DisplayFromStr")]
    pub level: tracing::Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: Self::default_file_path(),
            emit_journald: Self::default_emit_journald(),
            emit_stdout: Self::default_emit_stdout(),
            emit_stderr: Self::default_emit_stderr(),
            level: Self::default_log_level(),
        }
    }
}

impl LogConfig {
    /// Returns the default log level, which is `ERROR`.
    #[inline]
    #[must_use]
    pub const fn default_log_level() -> tracing::Level { tracing::Level::ERROR }

    /// Returns the default log file, `./log/tools.log`.
    #[inline]
    #[must_use]
    pub fn default_file_path() -> Option<PathBuf> { Some(PathBuf::from("./log/tools.log")) }

    /// Returns the default setting for `emit_journald`, which is `false`.
    #[inline]
    #[must_use]
    pub const fn default_emit_journald() -> bool { false }

    /// Returns the default setting for `emit_stdout`, which is `true`.
    #[inline]
    #[must_use]
    pub const fn default_emit_stdout() -> bool { true }

    /// Returns the default setting for `emit_stderr`, which is `false`.
    #[inline]
    #[must_use]
    pub const fn default_emit_stderr() -> bool { false }

    /// Initializes the global `tracing` subscriber registry based on this
    /// `LogConfig`.
    ///
    /// # Panics
    ///
    /// This method panics if called more than once in the same process, as
    /// `tracing_subscriber::util::SubscriberInitExt::init()` panics when a
    /// global subscriber is already set.
    pub fn registry(&self) {
        let Self { emit_journald, file_path, emit_stdout, emit_stderr, level: log_level } = self;

        let filter_layer = tracing_subscriber::filter::LevelFilter::from_level(*log_level);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(emit_journald.then(|| LogDriver::Journald.layer()))
            .with(file_path.clone().map(|path| LogDriver::File(path).layer()))
            .with(emit_stdout.then(|| LogDriver::Stdout.layer()))
            .with(emit_stderr.then(|| LogDriver::Stderr.layer()))
            .init();
    }
}

/// Enumerates the possible log output drivers.
#[derive(Clone, Debug)]
enum LogDriver {
    Stdout,
    Stderr,
    Journald,
    File(PathBuf),
}

impl LogDriver {
    /// Creates a `tracing_subscriber::Layer` for the specific log driver.
    ///
    /// Returns `None` when the target is unusable: the log file (or its
    /// parent directory) cannot be created, or journald is unreachable.
    #[allow(clippy::type_repetition_in_bounds)]
    fn layer<S>(self) -> Option<Box<dyn Layer<S> + Send + Sync + 'static>>
    where
        S: tracing::Subscriber,
        for<'a> S: LookupSpan<'a>,
    {
        let fmt =
            tracing_subscriber::fmt::layer().pretty().with_thread_ids(true).with_thread_names(true);

        match self {
            Self::Stdout => Some(Box::new(fmt.with_writer(std::io::stdout))),
            Self::Stderr => Some(Box::new(fmt.with_writer(std::io::stderr))),
            Self::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).ok()?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
                Some(Box::new(fmt.with_ansi(false).with_writer(file)))
            }
            Self::Journald => Some(Box::new(tracing_journald::layer().ok()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, tracing::Level::ERROR);
        assert_eq!(config.file_path, Some(PathBuf::from("./log/tools.log")));
        assert!(config.emit_stdout);
        assert!(!config.emit_journald);
        assert!(!config.emit_stderr);
    }

    #[test]
    fn test_parse_log_config_with_camel_case_keys() {
        let config: LogConfig =
            serde_yaml::from_str("level: debug\nfilePath: /tmp/secretool.log\nemitStderr: true\n")
                .expect("Should parse log config");
        assert_eq!(config.level, tracing::Level::DEBUG);
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/secretool.log")));
        assert!(config.emit_stderr);
        assert!(config.emit_stdout);
    }

    #[test]
    fn test_parse_log_config_rejects_unknown_level() {
        let result = serde_yaml::from_str::<LogConfig>("level: chatty\n");
        assert!(result.is_err());
    }
}
