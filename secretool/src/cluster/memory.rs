//! In-memory [`ClusterApi`] used by unit tests.
//!
//! Objects are stored as JSON keyed by `(apiVersion/kind, namespace, name)`.
//! Create, replace and patch follow the API server's rules closely enough to
//! exercise not-found and already-exists handling.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

use super::{ApiError, ClusterApi, ClusterResource, ScopeExt, object_name};
use crate::patch;

type ObjectKey = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    resource_version: u64,
    api_versions: BTreeSet<String>,
    failing_creates: BTreeSet<(String, String)>,
    failing_gets: BTreeSet<(String, String)>,
    failing_patches: BTreeMap<(String, String), PatchFailure>,
    created: Vec<(String, String, String)>,
    issued_certificate: Option<Vec<u8>>,
}

#[derive(Clone, Copy)]
enum PatchFailure {
    Transient,
    Invalid,
}

#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<State>>,
}

fn type_key<K: ClusterResource>() -> String { format!("{}/{}", K::api_version(&()), K::kind(&())) }

fn kind<K: ClusterResource>() -> String { K::kind(&()).to_string() }

fn scoped_namespace<K: ClusterResource>(namespace: Option<&str>) -> String {
    if <K::Scope as ScopeExt>::NAMESPACED { namespace.unwrap_or_default().to_string() } else { String::new() }
}

fn encode<K: ClusterResource>(object: &K) -> Value {
    serde_json::to_value(object).expect("test objects serialize")
}

fn decode<K: ClusterResource>(value: &Value) -> K {
    serde_json::from_value(value.clone()).expect("stored objects deserialize")
}

impl MemoryCluster {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, State> { self.state.lock().expect("state lock") }

    /// Declares group versions reported by
    /// [`ClusterApi::supports_api_version`].
    pub fn with_api_versions(self, versions: &[&str]) -> Self {
        self.lock().api_versions.extend(versions.iter().map(ToString::to_string));
        self
    }

    /// Approved certificate signing requests get `certificate` as their
    /// issued certificate.
    pub fn with_issued_certificate(self, certificate: &[u8]) -> Self {
        self.lock().issued_certificate = Some(certificate.to_vec());
        self
    }

    /// Stores an object as if it already existed in the cluster.
    pub fn insert<K: ClusterResource>(&self, namespace: Option<&str>, object: K) {
        let mut state = self.lock();
        state.resource_version += 1;
        let version = state.resource_version.to_string();
        let ns = scoped_namespace::<K>(namespace);
        let mut value = encode(&object);
        value["metadata"]["resourceVersion"] = Value::from(version);
        if !ns.is_empty() {
            value["metadata"]["namespace"] = Value::from(ns.clone());
        }
        let _unused = state.objects.insert((type_key::<K>(), ns, object_name(&object)), value);
    }

    pub fn object<K: ClusterResource>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        self.lock()
            .objects
            .get(&(type_key::<K>(), scoped_namespace::<K>(namespace), name.to_string()))
            .map(decode)
    }

    /// Names of objects of type `K` created through [`ClusterApi::create`], in
    /// order, as `(namespace, name)`.
    pub fn created<K: ClusterResource>(&self) -> Vec<(String, String)> {
        let key = type_key::<K>();
        self.lock()
            .created
            .iter()
            .filter(|(type_key, _, _)| *type_key == key)
            .map(|(_, ns, name)| (ns.clone(), name.clone()))
            .collect()
    }

    pub fn fail_creates_of<K: ClusterResource>(&self, name: &str) {
        let _unused = self.lock().failing_creates.insert((type_key::<K>(), name.to_string()));
    }

    pub fn fail_gets_of<K: ClusterResource>(&self, name: &str) {
        let _unused = self.lock().failing_gets.insert((type_key::<K>(), name.to_string()));
    }

    /// Patches of the named object fail until the fake is dropped.
    pub fn fail_patches_of<K: ClusterResource>(&self, name: &str) {
        let _unused = self
            .lock()
            .failing_patches
            .insert((type_key::<K>(), name.to_string()), PatchFailure::Transient);
    }

    /// Patches of the named object are refused with `422 Unprocessable Entity`.
    pub fn reject_patches_of<K: ClusterResource>(&self, name: &str) {
        let _unused = self
            .lock()
            .failing_patches
            .insert((type_key::<K>(), name.to_string()), PatchFailure::Invalid);
    }

    fn sign_if_approved(state: &State, value: &mut Value) {
        let Some(certificate) = &state.issued_certificate else { return };
        let approved = value["status"]["conditions"].as_array().is_some_and(|conditions| {
            conditions.iter().any(|condition| condition["type"] == "Approved")
        });
        if approved {
            value["status"]["certificate"] =
                Value::from(base64::engine::general_purpose::STANDARD.encode(certificate));
        }
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn get<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, ApiError> {
        let state = self.lock();
        if state.failing_gets.contains(&(type_key::<K>(), name.to_string())) {
            return Err(ApiError::Rejected {
                kind: kind::<K>(),
                name: name.to_string(),
                message: "injected get failure".to_string(),
            });
        }
        state
            .objects
            .get(&(type_key::<K>(), scoped_namespace::<K>(namespace), name.to_string()))
            .map(decode)
            .ok_or_else(|| ApiError::NotFound { kind: kind::<K>(), name: name.to_string() })
    }

    async fn list<K: ClusterResource>(&self, namespace: Option<&str>) -> Result<Vec<K>, ApiError> {
        let key = type_key::<K>();
        let ns = namespace.map(|_| scoped_namespace::<K>(namespace));
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|((type_key, object_ns, _), _)| {
                *type_key == key && ns.as_ref().is_none_or(|ns| ns == object_ns)
            })
            .map(|(_, value)| decode(value))
            .collect())
    }

    async fn create<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        object: &K,
    ) -> Result<K, ApiError> {
        let name = object_name(object);
        let mut state = self.lock();
        if state.failing_creates.contains(&(type_key::<K>(), name.clone())) {
            return Err(ApiError::Rejected {
                kind: kind::<K>(),
                name,
                message: "injected create failure".to_string(),
            });
        }
        if object.meta().resource_version.as_ref().is_some_and(|version| !version.is_empty()) {
            return Err(ApiError::Rejected {
                kind: kind::<K>(),
                name,
                message: "resourceVersion should not be set on objects to be created".to_string(),
            });
        }
        let ns = scoped_namespace::<K>(namespace);
        let key = (type_key::<K>(), ns.clone(), name.clone());
        if state.objects.contains_key(&key) {
            return Err(ApiError::AlreadyExists { kind: kind::<K>(), name });
        }

        state.resource_version += 1;
        let mut value = encode(object);
        value["metadata"]["resourceVersion"] = Value::from(state.resource_version.to_string());
        value["metadata"]["uid"] = Value::from(format!("uid-{}", state.resource_version));
        if !ns.is_empty() {
            value["metadata"]["namespace"] = Value::from(ns.clone());
        }
        state.created.push((type_key::<K>(), ns, name));
        let _unused = state.objects.insert(key, value.clone());
        Ok(decode(&value))
    }

    async fn replace<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        object: &K,
    ) -> Result<K, ApiError> {
        let name = object_name(object);
        let key = (type_key::<K>(), scoped_namespace::<K>(namespace), name.clone());
        let mut state = self.lock();
        if !state.objects.contains_key(&key) {
            return Err(ApiError::NotFound { kind: kind::<K>(), name });
        }
        state.resource_version += 1;
        let mut value = encode(object);
        value["metadata"]["resourceVersion"] = Value::from(state.resource_version.to_string());
        let _unused = state.objects.insert(key, value.clone());
        Ok(decode(&value))
    }

    async fn patch<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
    ) -> Result<K, ApiError> {
        let key = (type_key::<K>(), scoped_namespace::<K>(namespace), name.to_string());
        let mut state = self.lock();
        let (kind, name) = (kind::<K>(), name.to_string());
        match state.failing_patches.get(&(type_key::<K>(), name.clone())) {
            Some(PatchFailure::Transient) => {
                return Err(ApiError::Rejected {
                    kind,
                    name,
                    message: "injected patch failure".to_string(),
                });
            }
            Some(PatchFailure::Invalid) => {
                return Err(ApiError::Invalid {
                    kind,
                    name,
                    message: "spec: Forbidden: pod updates may not change fields".to_string(),
                });
            }
            None => {}
        }
        state.resource_version += 1;
        let version = state.resource_version.to_string();
        let Some(value) = state.objects.get_mut(&key) else {
            return Err(ApiError::NotFound { kind, name });
        };
        patch::apply(value, patch);
        value["metadata"]["resourceVersion"] = Value::from(version);
        Ok(decode(value))
    }

    async fn delete<K: ClusterResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ApiError> {
        let key = (type_key::<K>(), scoped_namespace::<K>(namespace), name.to_string());
        self.lock()
            .objects
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound { kind: kind::<K>(), name: name.to_string() })
    }

    async fn replace_approval<K: ClusterResource>(&self, object: &K) -> Result<K, ApiError> {
        let name = object_name(object);
        let key = (type_key::<K>(), String::new(), name.clone());
        let mut state = self.lock();
        let Some(mut value) = state.objects.get(&key).cloned() else {
            return Err(ApiError::NotFound { kind: kind::<K>(), name });
        };
        value["status"]["conditions"] = encode(object)["status"]["conditions"].clone();
        Self::sign_if_approved(&state, &mut value);
        let _unused = state.objects.insert(key, value.clone());
        Ok(decode(&value))
    }

    async fn supports_api_version(&self, group_version: &str) -> Result<bool, ApiError> {
        Ok(self.lock().api_versions.contains(group_version))
    }
}

mod tests {
    use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
    use serde_json::json;

    use super::*;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta { name: Some(name.to_string()), ..ObjectMeta::default() },
            ..ConfigMap::default()
        }
    }

    #[tokio::test]
    async fn test_patch_bumps_resource_version() {
        let cluster = MemoryCluster::new();
        cluster.insert(Some("team-ns"), config_map("settings"));
        let before = cluster
            .object::<ConfigMap>(Some("team-ns"), "settings")
            .and_then(|object| object.metadata.resource_version)
            .expect("Object should have a resource version");

        let patched: ConfigMap = cluster
            .patch(Some("team-ns"), "settings", &json!({ "data": { "mode": "strict" } }))
            .await
            .expect("Patch should succeed");

        let after =
            patched.metadata.resource_version.clone().expect("Patched object should have a version");
        assert_ne!(before, after);
        assert_eq!(
            cluster
                .object::<ConfigMap>(Some("team-ns"), "settings")
                .and_then(|object| object.metadata.resource_version),
            Some(after)
        );
        assert_eq!(
            patched.data.and_then(|data| data.get("mode").cloned()).as_deref(),
            Some("strict")
        );
    }

    #[tokio::test]
    async fn test_injected_patch_failures() {
        let cluster = MemoryCluster::new();
        cluster.insert(Some("team-ns"), config_map("flaky"));
        cluster.insert(Some("team-ns"), config_map("frozen"));
        cluster.fail_patches_of::<ConfigMap>("flaky");
        cluster.reject_patches_of::<ConfigMap>("frozen");

        let err = cluster
            .patch::<ConfigMap>(Some("team-ns"), "flaky", &json!({}))
            .await
            .expect_err("Patch should fail");
        assert!(!err.is_invalid());
        let err = cluster
            .patch::<ConfigMap>(Some("team-ns"), "frozen", &json!({}))
            .await
            .expect_err("Patch should be refused");
        assert!(err.is_invalid());
    }
}
