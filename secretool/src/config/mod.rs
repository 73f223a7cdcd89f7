mod env;
mod error;
mod set_method;

use std::path::{Path, PathBuf};

use resolve_path::PathResolveExt;
use secretool_cli::config::LogConfig;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use snafu::ResultExt;

pub use self::{
    error::Error,
    set_method::{ParseSetMethodError, SetMethod},
};

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Informational only, every namespace is watched.
    #[serde(default)]
    pub watch_namespaces: Vec<String>,

    /// Credential secrets in the home namespace to propagate.
    #[serde(default)]
    pub docker_secret_names: Vec<String>,

    #[serde(default)]
    #[serde_as(as = "DisplayFromStr")]
    pub set_method: SetMethod,

    /// Owner API versions whose children the reconcile path skips.
    #[serde(default)]
    pub not_manager_owners: Vec<String>,

    #[serde(default = "Config::default_server_port")]
    pub server_port: u16,

    /// Service fronting the webhook, also the common name of its certificate.
    #[serde(default)]
    pub service_name: String,

    #[serde(rename = "autoTLS", default = "Config::default_auto_tls")]
    pub auto_tls: bool,

    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    #[serde(rename = "rootCA", default)]
    pub root_ca: Option<PathBuf>,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_namespaces: Vec::new(),
            docker_secret_names: Vec::new(),
            set_method: SetMethod::default(),
            not_manager_owners: Vec::new(),
            server_port: Self::default_server_port(),
            service_name: String::new(),
            auto_tls: Self::default_auto_tls(),
            cert_file: None,
            private_key_file: None,
            root_ca: None,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    #[inline]
    #[must_use]
    pub const fn default_server_port() -> u16 { 8888 }

    #[inline]
    #[must_use]
    pub const fn default_auto_tls() -> bool { true }

    /// First existing `config.yaml` in the project configuration directories.
    pub fn search_config_file_path() -> Option<PathBuf> {
        secretool_base::project_config_directories()
            .into_iter()
            .map(|mut path| {
                path.push(secretool_base::CLI_CONFIG_NAME);
                path
            })
            .find(|path| path.try_exists().unwrap_or(false))
    }

    /// Loads `path`, or the searched file when `path` is `None`, then applies
    /// environment overrides. Without an explicit path and without a file in
    /// the search directories the defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path.map(Path::to_path_buf).or_else(Self::search_config_file_path) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        env::apply(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut config: Self = {
            let path =
                path.as_ref().try_resolve().map(|path| path.to_path_buf()).with_context(|_| {
                    error::ResolveFilePathSnafu { file_path: path.as_ref().to_path_buf() }
                })?;
            let data =
                std::fs::read(&path).context(error::OpenConfigSnafu { filename: path.clone() })?;
            Self::from_slice(&data).context(error::ParseConfigSnafu { filename: path })?
        };

        config.log.file_path = match config.log.file_path.map(|path| {
            path.try_resolve()
                .map(|path| path.to_path_buf())
                .with_context(|_| error::ResolveFilePathSnafu { file_path: path.clone() })
        }) {
            Some(Ok(path)) => Some(path),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        Ok(config)
    }

    fn from_slice(data: &[u8]) -> Result<Self, serde_yaml::Error> {
        // An empty document parses as `null`.
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_yaml::from_slice(data)
    }

    /// Checks settings that only matter in combination.
    pub fn validate(&self) -> Result<(), Error> {
        if self.set_method == SetMethod::WebHook {
            snafu::ensure!(!self.service_name.is_empty(), error::MissingServiceNameSnafu);
            snafu::ensure!(
                self.auto_tls || (self.cert_file.is_some() && self.private_key_file.is_some()),
                error::MissingCertificateFilesSnafu
            );
        }
        Ok(())
    }

    /// Default configuration rendered as YAML.
    pub fn template_basic() -> Result<Vec<u8>, Error> {
        serde_yaml::to_string(&Self::default())
            .map(String::into_bytes)
            .context(error::SerializeConfigSnafu)
    }
}
