//! Typed access to the Kubernetes API.
//!
//! Everything the agent does against the cluster goes through [`ClusterApi`],
//! so the core logic can run against the real API server ([`KubeCluster`]) or
//! an in-memory fake in tests.

mod error;
mod kube_cluster;
#[cfg(test)]
pub mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource};
use serde::{Serialize, de::DeserializeOwned};

pub use self::{error::ApiError, kube_cluster::KubeCluster};

/// Builds an [`Api`] appropriate for the resource's scope.
pub trait ScopeExt {
    const NAMESPACED: bool;

    fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = Self>;
}

impl ScopeExt for NamespaceResourceScope {
    const NAMESPACED: bool = true;

    fn api<K>(client: Client, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = Self>,
    {
        match namespace {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::all(client),
        }
    }
}

impl ScopeExt for ClusterResourceScope {
    const NAMESPACED: bool = false;

    fn api<K>(client: Client, _namespace: Option<&str>) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = Self>,
    {
        Api::all(client)
    }
}

/// Any statically typed object the agent reads or writes.
pub trait ClusterResource:
    Resource<DynamicType = (), Scope: ScopeExt>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ClusterResource for K where
    K: Resource<DynamicType = (), Scope: ScopeExt>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Cluster operations used by the agent.
///
/// `namespace` is ignored for cluster-scoped resources. Implementations must
/// report missing objects as [`ApiError::NotFound`] and name conflicts on
/// create as [`ApiError::AlreadyExists`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get<K: ClusterResource>(&self, namespace: Option<&str>, name: &str)
    -> Result<K, ApiError>;

    async fn list<K: ClusterResource>(&self, namespace: Option<&str>) -> Result<Vec<K>, ApiError>;

    async fn create<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        object: &K,
    ) -> Result<K, ApiError>;

    async fn replace<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        object: &K,
    ) -> Result<K, ApiError>;

    /// Applies a strategic-merge patch.
    async fn patch<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ApiError>;

    async fn delete<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError>;

    /// Replaces the `approval` subresource of a certificate signing request.
    async fn replace_approval<K: ClusterResource>(&self, object: &K) -> Result<K, ApiError>;

    /// Whether the API server serves `group_version` (e.g.
    /// `certificates.k8s.io/v1`).
    async fn supports_api_version(&self, group_version: &str) -> Result<bool, ApiError>;
}

/// Name of an object, or an empty string when unset.
pub(crate) fn object_name<K: Resource>(object: &K) -> String {
    object.meta().name.clone().unwrap_or_default()
}
