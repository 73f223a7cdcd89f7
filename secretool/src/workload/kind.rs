use std::{fmt, str::FromStr};

use snafu::Snafu;

/// Workload kinds that may receive image pull secrets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WorkloadKind {
    Pod,
    Deployment,
    ReplicaSet,
    DaemonSet,
    StatefulSet,
}

impl WorkloadKind {
    /// Location of the pod spec within the object.
    #[must_use]
    pub const fn pod_spec_path(self) -> &'static [&'static str] {
        match self {
            Self::Pod => &["spec"],
            Self::Deployment | Self::ReplicaSet | Self::DaemonSet | Self::StatefulSet => {
                &["spec", "template", "spec"]
            }
        }
    }

    /// Whether the admission endpoint mutates this kind. StatefulSets are
    /// only handled by the reconcile path.
    #[must_use]
    pub const fn is_admitted(self) -> bool { !matches!(self, Self::StatefulSet) }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::ReplicaSet => "ReplicaSet",
            Self::DaemonSet => "DaemonSet",
            Self::StatefulSet => "StatefulSet",
        };
        f.write_str(val)
    }
}

impl FromStr for WorkloadKind {
    type Err = UnsupportedKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Pod" => Ok(Self::Pod),
            "Deployment" => Ok(Self::Deployment),
            "ReplicaSet" => Ok(Self::ReplicaSet),
            "DaemonSet" => Ok(Self::DaemonSet),
            "StatefulSet" => Ok(Self::StatefulSet),
            _ => Err(UnsupportedKindError { kind: value.to_string() }),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("'{kind}' is not a supported workload kind"))]
pub struct UnsupportedKindError {
    kind: String,
}
