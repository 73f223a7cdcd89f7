use std::path::PathBuf;

use snafu::Snafu;

/// Represents the possible errors that can occur when loading the
/// configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Error returned when the configuration file specified by `filename`
    /// fails to open.
    #[snafu(display("Failed to open config from {}, error: {source}", filename.display()))]
    OpenConfig { filename: PathBuf, source: std::io::Error },

    /// Error returned when the content of the configuration file specified by
    /// `filename` fails to be parsed.
    #[snafu(display("Failed to parse config from {}, error: {source}", filename.display()))]
    ParseConfig { filename: PathBuf, source: serde_yaml::Error },

    /// Error returned when a file path cannot be resolved to its canonical
    /// form.
    #[snafu(display("Failed to resolve file path {}, error: {source}", file_path.display()))]
    ResolveFilePath { file_path: PathBuf, source: std::io::Error },

    /// Error returned when an environment variable holds a value that does not
    /// fit the key it overrides.
    #[snafu(display("Invalid value '{value}' in environment variable {variable}: {reason}"))]
    InvalidEnvValue { variable: String, value: String, reason: String },

    #[snafu(display("`serviceName` must be set when setMethod is WebHook"))]
    MissingServiceName,

    #[snafu(display(
        "`certFile` and `privateKeyFile` must be set when autoTLS is disabled"
    ))]
    MissingCertificateFiles,

    #[snafu(display("Failed to serialize config, error: {source}"))]
    SerializeConfig { source: serde_yaml::Error },
}
