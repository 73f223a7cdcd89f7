//! Workload kinds the agent mutates and how to find their container images.

mod error;
mod kind;

use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
    core::v1::{Pod, PodSpec},
};
use serde_json::Value;

pub use self::{
    error::{DecodeError, ExtractError},
    kind::{UnsupportedKindError, WorkloadKind},
};

/// A workload object that carries a pod spec.
pub trait HasPodSpec {
    const KIND: WorkloadKind;

    fn pod_spec(&self) -> Option<&PodSpec>;

    /// Images of the regular containers, in declaration order.
    fn images(&self) -> Vec<String> {
        self.pod_spec()
            .map(|spec| {
                spec.containers.iter().filter_map(|container| container.image.clone()).collect()
            })
            .unwrap_or_default()
    }
}

impl HasPodSpec for Pod {
    const KIND: WorkloadKind = WorkloadKind::Pod;

    fn pod_spec(&self) -> Option<&PodSpec> { self.spec.as_ref() }
}

macro_rules! impl_has_pod_template {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl HasPodSpec for $ty {
                const KIND: WorkloadKind = WorkloadKind::$ty;

                fn pod_spec(&self) -> Option<&PodSpec> {
                    self.spec.as_ref().and_then(|spec| spec.template.spec.as_ref())
                }
            }
        )+
    };
}

impl_has_pod_template!(Deployment, DaemonSet, StatefulSet);

impl HasPodSpec for ReplicaSet {
    const KIND: WorkloadKind = WorkloadKind::ReplicaSet;

    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref()?.template.as_ref()?.spec.as_ref()
    }
}

/// Decodes a raw object that is either JSON or YAML.
///
/// The payload is treated as JSON when its first non-whitespace byte is `{`,
/// otherwise it is parsed as YAML.
pub fn decode_object(raw: &[u8]) -> Result<Value, DecodeError> {
    if raw.trim_ascii_start().starts_with(b"{") {
        serde_json::from_slice(raw).map_err(|source| DecodeError::Json { source })
    } else {
        serde_yaml::from_slice(raw).map_err(|source| DecodeError::Yaml { source })
    }
}

fn containers_at<'a>(object: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(object, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

/// Container images of a workload in JSON form.
///
/// Looks at `spec.template.spec.containers`, then `spec.containers`.
/// Containers without a string `image` are skipped.
pub fn extract_images(object: &Value) -> Result<Vec<String>, ExtractError> {
    let containers = containers_at(object, &["spec", "template", "spec", "containers"])
        .or_else(|| containers_at(object, &["spec", "containers"]));

    let Some(Value::Array(containers)) = containers else {
        return Err(ExtractError::NotAnArray);
    };

    let mut images = Vec::with_capacity(containers.len());
    for (index, container) in containers.iter().enumerate() {
        let Value::Object(container) = container else {
            return Err(ExtractError::NotAMapping { index });
        };
        if let Some(image) = container.get("image").and_then(Value::as_str) {
            images.push(image.to_string());
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::{
        apps::v1::DeploymentSpec,
        core::v1::{Container, PodTemplateSpec},
    };
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_from_pod() {
        let pod = json!({
            "kind": "Pod",
            "spec": {"containers": [
                {"name": "api", "image": "registry.example.com/team/api:v1"},
                {"name": "proxy", "image": "docker.io/library/envoy:1.30"}
            ]}
        });
        assert_eq!(
            extract_images(&pod).expect("Should extract images"),
            ["registry.example.com/team/api:v1", "docker.io/library/envoy:1.30"]
        );
    }

    #[test]
    fn test_extract_prefers_pod_template() {
        let deployment = json!({
            "kind": "Deployment",
            "spec": {
                "containers": [{"name": "ignored", "image": "ignored:1"}],
                "template": {"spec": {"containers": [{"name": "app", "image": "app:2"}]}}
            }
        });
        assert_eq!(extract_images(&deployment).expect("Should extract images"), ["app:2"]);
    }

    #[test]
    fn test_null_template_containers_fall_back() {
        let object = json!({
            "spec": {
                "template": {"spec": {"containers": null}},
                "containers": [{"name": "app", "image": "app:3"}]
            }
        });
        assert_eq!(extract_images(&object).expect("Should extract images"), ["app:3"]);
    }

    #[test]
    fn test_extract_errors() {
        assert!(matches!(extract_images(&json!({"spec": {}})), Err(ExtractError::NotAnArray)));
        assert!(matches!(
            extract_images(&json!({"spec": {"containers": {"name": "app"}}})),
            Err(ExtractError::NotAnArray)
        ));
        assert!(matches!(
            extract_images(&json!({"spec": {"containers": [{"image": "a:1"}, "b:1"]}})),
            Err(ExtractError::NotAMapping { index: 1 })
        ));
    }

    #[test]
    fn test_containers_without_image_are_skipped() {
        let pod = json!({"spec": {"containers": [{"name": "a"}, {"name": "b", "image": "b:1"}]}});
        assert_eq!(extract_images(&pod).expect("Should extract images"), ["b:1"]);
    }

    #[test]
    fn test_decode_yaml_and_json_agree() {
        let yaml = b"\
apiVersion: v1
kind: Pod
spec:
  containers:
  - name: api
    image: registry.example.com/team/api:v1
";
        let json = br#"  {"apiVersion":"v1","kind":"Pod","spec":{"containers":[{"name":"api","image":"registry.example.com/team/api:v1"}]}}"#;
        assert_eq!(
            decode_object(yaml).expect("Should decode YAML"),
            decode_object(json).expect("Should decode JSON")
        );
    }

    #[test]
    fn test_decode_rejects_broken_json() {
        assert!(matches!(decode_object(b"{\"spec\":"), Err(DecodeError::Json { .. })));
    }

    #[test]
    fn test_typed_workload_images() {
        let deployment = Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![
                            Container {
                                name: "app".to_string(),
                                image: Some("reg.example.com/app:v1".to_string()),
                                ..Container::default()
                            },
                            Container { name: "bare".to_string(), ..Container::default() },
                        ],
                        ..PodSpec::default()
                    }),
                    ..PodTemplateSpec::default()
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        };
        assert_eq!(<Deployment as HasPodSpec>::KIND, WorkloadKind::Deployment);
        assert_eq!(deployment.images(), ["reg.example.com/app:v1"]);
        assert!(Pod::default().images().is_empty());
    }
}
