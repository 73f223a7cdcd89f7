//! Registry credentials: reading the administrative secrets, indexing them by
//! registry host, and copying them into workload namespaces.

mod docker_config;
mod index;

use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use secretool_base::{HomeNamespace, consts::k8s::secrets};

pub use self::{
    docker_config::{DockerAuth, DockerConfigJson},
    index::CredentialIndex,
};
use crate::cluster::{ApiError, ClusterApi};

/// Where the administrative credentials live.
#[derive(Clone, Debug)]
pub struct CredentialSources {
    pub home: HomeNamespace,
    pub names: Vec<String>,
}

impl CredentialSources {
    pub const fn new(home: HomeNamespace, names: Vec<String>) -> Self { Self { home, names } }

    /// Reads the named secrets from the home namespace, keeping only those of
    /// type `kubernetes.io/dockerconfigjson`.
    ///
    /// Unreadable secrets are skipped. Legacy `kubernetes.io/dockercfg`
    /// secrets are skipped with a log line.
    pub async fn read<C: ClusterApi>(&self, cluster: &C) -> Vec<Secret> {
        let mut credentials = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let secret = match cluster.get::<Secret>(Some(self.home.as_str()), name).await {
                Ok(secret) => secret,
                Err(err) => {
                    tracing::debug!(namespace = %self.home, secret = %name, "Skip credential, error: {err}");
                    continue;
                }
            };
            match secret.type_.as_deref() {
                Some(secrets::TYPE_DOCKER_CONFIG_JSON) => credentials.push(secret),
                Some(secrets::TYPE_DOCKER_CFG) => {
                    tracing::info!(secret = %name, "Not support dockercfg docker secret");
                }
                _ => {}
            }
        }
        credentials
    }

    /// Reads the credentials and indexes them by registry host.
    pub async fn index<C: ClusterApi>(&self, cluster: &C) -> CredentialIndex {
        CredentialIndex::build(self.read(cluster).await)
    }
}

/// Copy of `credential` ready to be created in `namespace`.
///
/// Name, labels, annotations, type and data are kept. Server-populated
/// metadata (resource version, uid, timestamps, owners) is dropped so the
/// create is accepted.
#[must_use]
pub fn namespaced_copy(credential: &Secret, namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: credential.metadata.name.clone(),
            namespace: Some(namespace.to_string()),
            labels: credential.metadata.labels.clone(),
            annotations: credential.metadata.annotations.clone(),
            ..ObjectMeta::default()
        },
        type_: credential.type_.clone(),
        data: credential.data.clone(),
        string_data: credential.string_data.clone(),
        immutable: credential.immutable,
    }
}

/// Outcome of making sure a credential exists in a namespace.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ensured {
    /// A same-named secret was already there.
    Existing,
    Created,
}

/// Creates a copy of `credential` in `namespace` unless a secret with the same
/// name exists. Losing a create race counts as success.
pub async fn ensure_namespaced_copy<C: ClusterApi>(
    cluster: &C,
    credential: &Secret,
    namespace: &str,
) -> Result<Ensured, ApiError> {
    let name = credential.metadata.name.clone().unwrap_or_default();
    match cluster.get::<Secret>(Some(namespace), &name).await {
        Ok(_) => return Ok(Ensured::Existing),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    match cluster.create(Some(namespace), &namespaced_copy(credential, namespace)).await {
        Ok(_) => {
            tracing::info!(namespace = %namespace, secret = %name, "Created credential copy");
            Ok(Ensured::Created)
        }
        Err(err) if err.is_already_exists() => Ok(Ensured::Existing),
        Err(err) => Err(err),
    }
}
