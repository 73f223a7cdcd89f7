//! `certificates.k8s.io/v1beta1` signing requests, served by clusters older
//! than 1.22.

use std::borrow::Cow;

use k8s_openapi::{
    ByteString, ClusterResourceScope, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::Resource;
use serde::{Deserialize, Serialize};
use secretool_base::consts::certificate;

use super::signing_request::{self, SigningRequest};

const GROUP: &str = "certificates.k8s.io";

const VERSION: &str = "v1beta1";

const KIND: &str = "CertificateSigningRequest";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSigningRequest {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: CertificateSigningRequestSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CertificateSigningRequestStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSigningRequestSpec {
    pub request: ByteString,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usages: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CertificateSigningRequestStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<ByteString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<CertificateSigningRequestCondition>>,
}

/// In v1beta1 the condition `status` is optional and defaults to `True`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CertificateSigningRequestCondition {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Resource for CertificateSigningRequest {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> { KIND.into() }

    fn group(_: &()) -> Cow<'_, str> { GROUP.into() }

    fn version(_: &()) -> Cow<'_, str> { VERSION.into() }

    fn plural(_: &()) -> Cow<'_, str> { "certificatesigningrequests".into() }

    fn meta(&self) -> &ObjectMeta { &self.metadata }

    fn meta_mut(&mut self) -> &mut ObjectMeta { &mut self.metadata }
}

impl SigningRequest for CertificateSigningRequest {
    fn submission(name: &str, request: &[u8]) -> Self {
        Self {
            api_version: format!("{GROUP}/{VERSION}"),
            kind: KIND.to_string(),
            metadata: ObjectMeta { name: Some(name.to_string()), ..ObjectMeta::default() },
            spec: CertificateSigningRequestSpec {
                request: ByteString(request.to_vec()),
                signer_name: Some(certificate::SIGNER_NAME.to_string()),
                usages: Some(signing_request::USAGES.iter().map(ToString::to_string).collect()),
            },
            status: None,
        }
    }

    fn approve(&mut self) {
        self.status.get_or_insert_default().conditions.get_or_insert_default().push(
            CertificateSigningRequestCondition {
                type_: "Approved".to_string(),
                status: Some("True".to_string()),
                reason: Some(certificate::APPROVAL_REASON.to_string()),
                message: Some(certificate::APPROVAL_MESSAGE.to_string()),
            },
        );
    }

    fn certificate(&self) -> Option<&[u8]> {
        self.status
            .as_ref()?
            .certificate
            .as_ref()
            .map(|certificate| certificate.0.as_slice())
            .filter(|certificate| !certificate.is_empty())
    }

    fn rejection(&self) -> Option<String> {
        let conditions = self.status.as_ref()?.conditions.as_ref()?;
        signing_request::rejection_of(
            conditions
                .iter()
                .map(|condition| (condition.type_.as_str(), condition.message.as_deref())),
        )
    }
}
