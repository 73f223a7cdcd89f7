use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Configuration { source: crate::config::Error },

    #[snafu(display("{source}"))]
    Tls { source: crate::tls::Error },

    #[snafu(display("{source}"))]
    Webhook { source: crate::webhook::Error },

    #[snafu(display("Failed to write to stdout, error: {source}"))]
    WriteStdout { source: std::io::Error },

    #[snafu(display("Failed to initialize Kubernetes client configuration, error: {source}"))]
    KubeConfig { source: kube::Error },

    #[snafu(display("Failed to create tokio runtime, error: {source}"))]
    InitializeTokioRuntime { source: std::io::Error },
}

impl From<crate::config::Error> for Error {
    fn from(source: crate::config::Error) -> Self { Self::Configuration { source } }
}

impl From<crate::tls::Error> for Error {
    fn from(source: crate::tls::Error) -> Self { Self::Tls { source } }
}

impl From<crate::webhook::Error> for Error {
    fn from(source: crate::webhook::Error) -> Self { Self::Webhook { source } }
}
