//! Shared mutation logic for the admission and reconcile paths.
//!
//! A [`MutationPlan`] holds the credentials a workload needs and ensures
//! their copies exist in the workload's namespace. The admission path renders
//! the references as a two-way strategic-merge patch against the submitted
//! object; the reconcile path patches the live object.

use k8s_openapi::api::core::v1::Secret;
use serde_json::{Map, Value, json};

use crate::{
    cluster::{ApiError, ClusterApi},
    credentials::{self, CredentialIndex, Ensured},
    patch,
    workload::WorkloadKind,
};

const IMAGE_PULL_SECRETS: &str = "imagePullSecrets";

/// Which credentials end up referenced by the workload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReferencePolicy {
    /// Every needed credential, even if its copy could not be ensured.
    AllNeeded,

    /// Only credentials whose copy exists in the namespace.
    EnsuredOnly,
}

#[derive(Debug)]
pub struct EnsuredCredential {
    pub name: String,
    pub result: Result<Ensured, ApiError>,
}

#[derive(Clone, Debug)]
pub struct MutationPlan {
    kind: WorkloadKind,
    namespace: String,
    credentials: Vec<Secret>,
}

impl MutationPlan {
    pub fn new<S: AsRef<str>>(
        kind: WorkloadKind,
        namespace: impl Into<String>,
        index: &CredentialIndex,
        images: &[S],
    ) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            credentials: index.needed_for(images).into_iter().cloned().collect(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> WorkloadKind { self.kind }

    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str { &self.namespace }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.credentials.is_empty() }

    pub fn credential_names(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(|secret| secret.metadata.name.as_deref().unwrap_or_default())
    }

    /// Makes sure every needed credential has a copy in the namespace, in plan
    /// order. A failure on one credential does not stop the others.
    pub async fn ensure<C: ClusterApi>(&self, cluster: &C) -> Vec<EnsuredCredential> {
        let mut ensured = Vec::with_capacity(self.credentials.len());
        for credential in &self.credentials {
            let name = credential.metadata.name.clone().unwrap_or_default();
            let result =
                credentials::ensure_namespaced_copy(cluster, credential, &self.namespace).await;
            if let Err(err) = &result {
                tracing::error!(
                    namespace = %self.namespace,
                    secret = %name,
                    "Failed to ensure credential copy, error: {err}"
                );
            }
            ensured.push(EnsuredCredential { name, result });
        }
        ensured
    }

    /// Ensures the credentials and returns the names to reference.
    pub async fn references<C: ClusterApi>(
        &self,
        cluster: &C,
        policy: ReferencePolicy,
    ) -> Vec<String> {
        self.ensure(cluster)
            .await
            .into_iter()
            .filter(|ensured| policy == ReferencePolicy::AllNeeded || ensured.result.is_ok())
            .map(|ensured| ensured.name)
            .collect()
    }
}

fn reference_list(names: &[String]) -> impl Iterator<Item = Value> + '_ {
    names.iter().map(|name| json!({ "name": name }))
}

/// Deep copy of `object` with `names` appended to the pod spec's
/// `imagePullSecrets`. Existing references are kept in place.
#[must_use]
pub fn with_references(object: &Value, kind: WorkloadKind, names: &[String]) -> Value {
    let mut modified = object.clone();

    let mut cursor = &mut modified;
    for segment in kind.pod_spec_path() {
        if cursor.is_null() {
            *cursor = Value::Object(Map::new());
        }
        let Value::Object(map) = cursor else {
            return object.clone();
        };
        cursor = map.entry((*segment).to_string()).or_insert(Value::Null);
    }
    if cursor.is_null() {
        *cursor = Value::Object(Map::new());
    }
    let Value::Object(pod_spec) = cursor else {
        return object.clone();
    };

    let secrets = pod_spec.entry(IMAGE_PULL_SECRETS.to_string()).or_insert(Value::Null);
    match secrets {
        Value::Array(list) => list.extend(reference_list(names)),
        _ => *secrets = Value::Array(reference_list(names).collect()),
    }
    modified
}

/// Patch for the admission response: a two-way strategic merge between the
/// submitted object and the object with `names` appended.
#[must_use]
pub fn admission_patch(object: &Value, kind: WorkloadKind, names: &[String]) -> Value {
    patch::two_way_merge(object, &with_references(object, kind, names))
}

/// Strategic-merge patch adding `names` to a live workload.
#[must_use]
pub fn reconcile_patch(kind: WorkloadKind, names: &[String]) -> Value {
    let mut patch = json!({ IMAGE_PULL_SECRETS: reference_list(names).collect::<Vec<_>>() });
    for segment in kind.pod_spec_path().iter().rev() {
        let mut wrapper = Map::new();
        let _unused = wrapper.insert((*segment).to_string(), patch);
        patch = Value::Object(wrapper);
    }
    patch
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{ByteString, apimachinery::pkg::apis::meta::v1::ObjectMeta};
    use secretool_base::consts::k8s::secrets;

    use super::*;
    use crate::cluster::memory::MemoryCluster;

    fn credential(name: &str, host: &str) -> Secret {
        Secret {
            metadata: ObjectMeta { name: Some(name.to_string()), ..ObjectMeta::default() },
            type_: Some(secrets::TYPE_DOCKER_CONFIG_JSON.to_string()),
            data: Some(BTreeMap::from([(
                secrets::DOCKER_CONFIG_JSON_KEY.to_string(),
                ByteString(format!(r#"{{"auths":{{"{host}":{{}}}}}}"#).into_bytes()),
            )])),
            ..Secret::default()
        }
    }

    fn names(list: &[&str]) -> Vec<String> { list.iter().map(ToString::to_string).collect() }

    #[test]
    fn test_plan_collects_needed_credentials() {
        let index = CredentialIndex::build([
            credential("pull-a", "registry.example.com"),
            credential("dh", "docker.io"),
        ]);
        let plan = MutationPlan::new(
            WorkloadKind::Pod,
            "team-ns",
            &index,
            &["registry.example.com/team/api:v1", "quay.io/other:1"],
        );
        assert_eq!(plan.credential_names().collect::<Vec<_>>(), ["pull-a"]);
        assert_eq!(plan.namespace(), "team-ns");
        assert!(!plan.is_empty());
    }

    #[tokio::test]
    async fn test_reference_policies() {
        let cluster = MemoryCluster::new();
        cluster.fail_creates_of::<Secret>("broken");
        let index = CredentialIndex::build([
            credential("broken", "registry.example.com"),
            credential("pull-a", "registry.example.com"),
        ]);
        let plan = MutationPlan::new(
            WorkloadKind::Deployment,
            "team-ns",
            &index,
            &["registry.example.com/team/api:v1"],
        );

        assert_eq!(plan.references(&cluster, ReferencePolicy::EnsuredOnly).await, ["pull-a"]);
        assert_eq!(
            plan.references(&cluster, ReferencePolicy::AllNeeded).await,
            ["broken", "pull-a"]
        );
    }

    #[test]
    fn test_with_references_appends_after_existing() {
        let pod = json!({"spec": {"imagePullSecrets": [{"name": "own"}], "containers": []}});
        let modified = with_references(&pod, WorkloadKind::Pod, &names(&["a", "a"]));
        assert_eq!(
            modified["spec"]["imagePullSecrets"],
            json!([{"name": "own"}, {"name": "a"}, {"name": "a"}])
        );
        assert_eq!(modified["spec"]["containers"], json!([]));
    }

    #[test]
    fn test_with_references_creates_missing_template() {
        let deployment = json!({"kind": "Deployment", "spec": {"replicas": 1}});
        let modified = with_references(&deployment, WorkloadKind::Deployment, &names(&["a"]));
        assert_eq!(modified["spec"]["template"]["spec"]["imagePullSecrets"], json!([{"name": "a"}]));
        assert_eq!(modified["spec"]["replicas"], json!(1));
    }

    #[test]
    fn test_admission_patch_touches_only_image_pull_secrets() {
        let deployment = json!({
            "metadata": {"name": "api", "namespace": "team-ns"},
            "spec": {"template": {"spec": {"containers": [{"name": "api", "image": "reg/api:v1"}]}}}
        });
        assert_eq!(
            admission_patch(&deployment, WorkloadKind::Deployment, &names(&["pull-a"])),
            json!({"spec": {"template": {"spec": {"imagePullSecrets": [{"name": "pull-a"}]}}}})
        );
    }

    #[test]
    fn test_reconcile_patch_shape() {
        assert_eq!(
            reconcile_patch(WorkloadKind::Pod, &names(&["a"])),
            json!({"spec": {"imagePullSecrets": [{"name": "a"}]}})
        );
        assert_eq!(
            reconcile_patch(WorkloadKind::StatefulSet, &names(&["a", "b"])),
            json!({"spec": {"template": {"spec": {"imagePullSecrets": [{"name": "a"}, {"name": "b"}]}}}})
        );
    }
}
