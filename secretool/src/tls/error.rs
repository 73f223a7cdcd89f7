use std::{path::PathBuf, time::Duration};

use snafu::Snafu;

use crate::cluster::ApiError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Service name is required to request a serving certificate"))]
    EmptyServiceName,

    #[snafu(display("Failed to generate private key, error: {source}"))]
    GenerateKey { source: rcgen::Error },

    #[snafu(display("Failed to build certificate signing request, error: {source}"))]
    BuildRequest { source: rcgen::Error },

    #[snafu(display("Failed to probe certificate signing request API, error: {source}"))]
    ProbeSigningApi { source: ApiError },

    #[snafu(display("Failed to delete certificate signing request '{name}', error: {source}"))]
    DeleteRequest { name: String, source: ApiError },

    #[snafu(display("Failed to submit certificate signing request '{name}', error: {source}"))]
    SubmitRequest { name: String, source: ApiError },

    #[snafu(display("Failed to approve certificate signing request '{name}', error: {source}"))]
    ApproveRequest { name: String, source: ApiError },

    #[snafu(display("Failed to get certificate signing request '{name}', error: {source}"))]
    FetchRequest { name: String, source: ApiError },

    #[snafu(display("Certificate signing request '{name}' was not issued: {reason}"))]
    RequestRejected { name: String, reason: String },

    #[snafu(display("Certificate of signing request '{name}' was not issued within {timeout:?}"))]
    IssueTimeout { name: String, timeout: Duration },

    #[snafu(display("Failed to get TLS secret '{name}', error: {source}"))]
    FetchTlsSecret { name: String, source: ApiError },

    #[snafu(display("TLS secret '{name}' has no '{key}'"))]
    IncompleteTlsSecret { name: String, key: String },

    #[snafu(display("Failed to store TLS secret '{name}', error: {source}"))]
    StoreTlsSecret { name: String, source: ApiError },

    #[snafu(display("Failed to read file {}, error: {source}", file_path.display()))]
    ReadFile { file_path: PathBuf, source: std::io::Error },
}
