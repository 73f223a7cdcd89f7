//! Admission review envelope, as exchanged with the API server.
//!
//! Only the fields the agent reads or writes are modelled. The request object
//! is kept as raw JSON: it is either the embedded workload, or a string
//! holding the workload as YAML or JSON.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workload::{self, DecodeError};

pub const API_VERSION: &str = "admission.k8s.io/v1";

pub const KIND: &str = "AdmissionReview";

/// Patch type label of mutating responses. The body itself is a
/// strategic-merge patch.
pub const PATCH_TYPE: &str = "JSONPatch";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Wraps `response` in the `apiVersion` of the request it answers, or
    /// `admission.k8s.io/v1` when the request did not carry one.
    #[must_use]
    pub fn from_response(api_version: &str, response: AdmissionResponse) -> Self {
        let api_version = if api_version.is_empty() { API_VERSION } else { api_version };
        Self {
            api_version: api_version.to_string(),
            kind: KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub kind: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,

    pub kind: GroupVersionKind,

    #[serde(default)]
    pub namespace: String,

    #[serde(default)]
    pub name: String,

    pub operation: Operation,

    #[serde(default)]
    pub object: Option<Value>,
}

impl AdmissionRequest {
    /// The submitted object as JSON, decoding string payloads as YAML or
    /// JSON. `None` when the request carries no object.
    pub fn decoded_object(&self) -> Option<Result<Value, DecodeError>> {
        match self.object.as_ref()? {
            Value::Null => None,
            Value::String(raw) => Some(workload::decode_object(raw.as_bytes())),
            object => Some(Ok(object.clone())),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Status {
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,

    pub allowed: bool,

    /// Base64 encoded patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl AdmissionResponse {
    /// Allows the request unchanged.
    #[must_use]
    pub fn allow(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), allowed: true, ..Self::default() }
    }

    #[must_use]
    pub fn with_patch(mut self, patch: &[u8]) -> Self {
        self.patch = Some(base64::engine::general_purpose::STANDARD.encode(patch));
        self.patch_type = Some(PATCH_TYPE.to_string());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.status = Some(Status { message: message.into() });
        self
    }

    /// Decoded patch bytes.
    pub fn patch_bytes(&self) -> Option<Vec<u8>> {
        self.patch
            .as_ref()
            .and_then(|patch| base64::engine::general_purpose::STANDARD.decode(patch).ok())
    }
}
