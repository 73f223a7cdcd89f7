//! Command line interface of the `secretool` agent.
//!
//! # Examples
//!
//! ```bash
//! # Start the agent with the configuration found in the search directories
//! secretool
//!
//! # Start the agent with an explicit configuration and log level
//! secretool --config /etc/secretool/config.yaml --logLevel info run
//!
//! # Print the default configuration
//! secretool default-config
//! ```

pub mod error;
mod run;

use std::{io::Write, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use snafu::ResultExt;
use tokio::runtime::Runtime;

pub use self::error::Error;
use crate::{config::Config, shadow};

/// Registry credential propagation agent for Kubernetes.
#[derive(Parser)]
#[command(
    name = secretool_base::CLI_PROGRAM_NAME,
    author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about = "Propagate registry credentials into namespaces and workloads",
    long_about = "Secretool copies registry credentials from its home namespace into every \
                  namespace and references them from new workloads, either through a \
                  mutating admission webhook or by patching workloads after creation.",
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Option<Commands>,

    #[clap(
        long = "config",
        short = 'c',
        env = "SECRETOOL_CONFIG_FILE_PATH",
        help = "Specify a configuration file. Defaults to the first config.yaml found in \
                ~/.secretool, /etc/secretool or the working directory."
    )]
    config_file: Option<PathBuf>,

    #[clap(long = "logLevel", help = "Set the logging level (e.g., error, info, debug).")]
    log_level: Option<tracing::Level>,

    #[clap(long = "logFile", help = "Append logs to this file.")]
    log_file: Option<PathBuf>,

    #[clap(long = "port", help = "Port of the admission HTTPS server.")]
    port: Option<u16>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Run the agent (default)")]
    Run,

    #[command(about = "Display client and server version information")]
    Version {
        #[clap(long = "client", help = "If true, shows client version only (no server required).")]
        client: bool,
    },

    #[command(about = "Generate shell completion script for the specified shell (bash, zsh, fish)")]
    Completions { shell: clap_complete::Shell },

    #[command(about = "Output the default configuration in YAML format")]
    DefaultConfig,
}

impl Default for Cli {
    fn default() -> Self { Self::parse() }
}

impl Cli {
    /// Loads the configuration and applies command line overrides on top of
    /// the file and environment values.
    fn load_config(&self) -> Result<Config, Error> {
        let mut config = Config::load_or_default(self.config_file.as_deref())?;

        if let Some(log_level) = self.log_level {
            config.log.level = log_level;
        }
        if let Some(log_file) = &self.log_file {
            config.log.file_path = Some(log_file.clone());
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }

        config.validate()?;
        Ok(config)
    }

    fn write_stdout(data: &[u8]) -> Result<(), Error> {
        std::io::stdout().write_all(data).context(error::WriteStdoutSnafu)
    }

    /// Dispatches the parsed command and returns the process exit code.
    pub fn run(self) -> Result<i32, Error> {
        let client_version = Self::command().get_version().unwrap_or_default().to_string();
        match self.commands {
            Some(Commands::Version { client }) if client => {
                Self::write_stdout(Self::command().render_long_version().as_bytes())?;
                Self::write_stdout(format!("Client Version: {client_version}\n").as_bytes())?;
                return Ok(0);
            }
            Some(Commands::Completions { shell }) => {
                let mut app = Self::command();
                let bin_name = app.get_name().to_string();
                clap_complete::generate(shell, &mut app, bin_name, &mut std::io::stdout());
                return Ok(0);
            }
            Some(Commands::DefaultConfig) => {
                Self::write_stdout(Config::template_basic()?.as_slice())?;
                return Ok(0);
            }
            _ => {}
        }

        let config = self.load_config()?;
        config.log.registry();

        let fut = async move {
            let kube_client = kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
            if let Some(Commands::Version { .. }) = self.commands {
                let server_version = kube_client.apiserver_version().await.map_or_else(
                    |_| "unknown".to_string(),
                    |info| format!("{}.{}", info.major, info.minor),
                );
                Self::write_stdout(Self::command().render_long_version().as_bytes())?;
                Self::write_stdout(
                    format!("Client Version: {client_version}\nServer Version: {server_version}\n")
                        .as_bytes(),
                )?;
                return Ok(0);
            }

            let home = secretool_base::resolve_home_namespace();
            run::run(kube_client, config, home).await?;
            Ok(0)
        };

        Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(fut)
    }
}
