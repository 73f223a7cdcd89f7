use async_trait::async_trait;
use kube::{
    Api, Client, Resource,
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
};
use snafu::ResultExt;

use super::{ApiError, ClusterApi, ClusterResource, ScopeExt, error, object_name};

/// [`ClusterApi`] backed by a live API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    #[inline]
    pub const fn new(client: Client) -> Self { Self { client } }

    fn api<K: ClusterResource>(&self, namespace: Option<&str>) -> Api<K> {
        <K::Scope as ScopeExt>::api(self.client.clone(), namespace)
    }
}

fn kind_of<K: Resource<DynamicType = ()>>() -> String { K::kind(&()).to_string() }

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, ApiError> {
        self.api::<K>(namespace)
            .get(name)
            .await
            .map_err(|err| ApiError::from_kube(&kind_of::<K>(), name, err))
    }

    async fn list<K: ClusterResource>(&self, namespace: Option<&str>) -> Result<Vec<K>, ApiError> {
        self.api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|err| ApiError::from_kube(&kind_of::<K>(), "", err))
    }

    async fn create<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        object: &K,
    ) -> Result<K, ApiError> {
        self.api::<K>(namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|err| ApiError::from_kube_create(&kind_of::<K>(), &object_name(object), err))
    }

    async fn replace<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        object: &K,
    ) -> Result<K, ApiError> {
        let name = object_name(object);
        self.api::<K>(namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|err| ApiError::from_kube(&kind_of::<K>(), &name, err))
    }

    async fn patch<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, ApiError> {
        self.api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Strategic(patch))
            .await
            .map_err(|err| ApiError::from_kube(&kind_of::<K>(), name, err))
    }

    async fn delete<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError> {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|err| ApiError::from_kube(&kind_of::<K>(), name, err))
    }

    async fn replace_approval<K: ClusterResource>(&self, object: &K) -> Result<K, ApiError> {
        let name = object_name(object);
        let _data = serde_json::to_vec(object)
            .context(error::EncodeSnafu { kind: kind_of::<K>(), name: name.clone() })?;
        self.api::<K>(None)
            .replace_subresource("approval", &name, &PostParams::default(), object)
            .await
            .map_err(|err| ApiError::from_kube(&kind_of::<K>(), &name, err))
    }

    async fn supports_api_version(&self, group_version: &str) -> Result<bool, ApiError> {
        match self.client.list_api_group_resources(group_version).await {
            Ok(_) => Ok(true),
            Err(err) => match ApiError::from_kube("APIResourceList", group_version, err) {
                ApiError::NotFound { .. } => Ok(false),
                err => Err(err),
            },
        }
    }
}
