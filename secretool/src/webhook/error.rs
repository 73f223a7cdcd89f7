use std::net::SocketAddr;

use snafu::Snafu;

use crate::cluster::ApiError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to load TLS key pair, error: {source}"))]
    LoadKeyPair { source: std::io::Error },

    #[snafu(display("Failed to serve webhook on {addr}, error: {source}"))]
    Serve { addr: SocketAddr, source: std::io::Error },

    #[snafu(display("Failed to list secrets in namespace '{namespace}', error: {source}"))]
    ListSecrets { namespace: String, source: ApiError },

    #[snafu(display(
        "No cluster CA found in namespace '{namespace}', neither a default service account token nor the root CA ConfigMap carries `ca.crt`"
    ))]
    ClusterCaNotFound { namespace: String },

    #[snafu(display("Failed to get webhook configuration '{name}', error: {source}"))]
    GetConfiguration { name: String, source: ApiError },

    #[snafu(display("Failed to create webhook configuration '{name}', error: {source}"))]
    CreateConfiguration { name: String, source: ApiError },

    #[snafu(display("Failed to update webhook configuration '{name}', error: {source}"))]
    UpdateConfiguration { name: String, source: ApiError },
}
