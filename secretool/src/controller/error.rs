use snafu::Snafu;

use crate::{cluster::ApiError, workload::WorkloadKind};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Failed to copy credential '{secret}' into namespace '{namespace}', error: {source}"
    ))]
    CopyCredential { namespace: String, secret: String, source: ApiError },

    #[snafu(display("Failed to fetch {kind} '{namespace}/{name}', error: {source}"))]
    FetchWorkload { kind: WorkloadKind, namespace: String, name: String, source: ApiError },

    #[snafu(display("Failed to patch {kind} '{namespace}/{name}', error: {source}"))]
    PatchWorkload { kind: WorkloadKind, namespace: String, name: String, source: ApiError },
}
