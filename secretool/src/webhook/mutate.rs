use serde_json::Value;

use super::review::{AdmissionRequest, AdmissionResponse, Operation};
use crate::{
    cluster::ClusterApi,
    credentials::CredentialSources,
    plan::{self, MutationPlan, ReferencePolicy},
    workload::{self, WorkloadKind},
};

fn request_namespace(request: &AdmissionRequest, object: &Value) -> String {
    if request.namespace.is_empty() {
        object["metadata"]["namespace"].as_str().unwrap_or_default().to_string()
    } else {
        request.namespace.clone()
    }
}

/// Computes the admission response for `request`.
///
/// The request is always allowed. When the workload runs images from a
/// registry with known credentials, the credentials are copied into its
/// namespace and the response carries a patch referencing them.
pub async fn mutate<C: ClusterApi>(
    cluster: &C,
    sources: &CredentialSources,
    request: &AdmissionRequest,
) -> AdmissionResponse {
    let response = AdmissionResponse::allow(&request.uid);

    if matches!(request.operation, Operation::Connect | Operation::Delete) {
        return response;
    }

    let kind = match request.kind.kind.parse::<WorkloadKind>() {
        Ok(kind) if kind.is_admitted() => kind,
        _ => {
            tracing::debug!(uid = %request.uid, kind = %request.kind.kind, "Skip unsupported kind");
            return response;
        }
    };

    let object = match request.decoded_object() {
        Some(Ok(object)) => object,
        Some(Err(err)) => {
            tracing::error!(uid = %request.uid, "Failed to decode object, error: {err}");
            return response;
        }
        None => return response,
    };

    let images = match workload::extract_images(&object) {
        Ok(images) => images,
        Err(err) => {
            tracing::error!(uid = %request.uid, "Failed to extract images, error: {err}");
            return response;
        }
    };
    if images.is_empty() {
        tracing::debug!(uid = %request.uid, "Workload has no image");
        return response;
    }

    let namespace = request_namespace(request, &object);
    let index = sources.index(cluster).await;
    let plan = MutationPlan::new(kind, namespace, &index, &images);
    if plan.is_empty() {
        tracing::debug!(uid = %request.uid, images = ?images, "No credential matches the images");
        return response;
    }

    let references = plan.references(cluster, ReferencePolicy::AllNeeded).await;
    if references.is_empty() {
        return response;
    }

    let patch = plan::admission_patch(&object, kind, &references);
    match serde_json::to_vec(&patch) {
        Ok(patch) => {
            tracing::info!(
                uid = %request.uid,
                kind = %kind,
                namespace = %plan.namespace(),
                name = %request.name,
                secrets = ?references,
                "Patch workload with image pull secrets"
            );
            response.with_patch(&patch)
        }
        Err(err) => {
            tracing::error!(uid = %request.uid, "Failed to encode patch, error: {err}");
            response
        }
    }
}
