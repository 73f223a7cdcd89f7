use std::time::Duration;

use k8s_openapi::{
    ByteString,
    api::certificates::v1::{
        CertificateSigningRequest, CertificateSigningRequestCondition,
        CertificateSigningRequestSpec,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use secretool_base::consts::certificate;
use snafu::ResultExt;

use super::{Error, error};
use crate::cluster::{ClusterApi, ClusterResource};

pub const USAGES: [&str; 2] = ["server auth", "client auth"];

const CONDITION_APPROVED: &str = "Approved";

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A version of the `CertificateSigningRequest` API.
pub trait SigningRequest: ClusterResource {
    /// A request for the PEM encoded `request`, signed by the legacy signer.
    fn submission(name: &str, request: &[u8]) -> Self;

    fn approve(&mut self);

    /// The issued certificate, once the signer has filled it in.
    fn certificate(&self) -> Option<&[u8]>;

    /// Why the request will never be issued, if it was denied or failed.
    fn rejection(&self) -> Option<String>;
}

pub(super) fn rejection_of<'a>(
    conditions: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
) -> Option<String> {
    conditions.into_iter().find(|(type_, _)| matches!(*type_, "Denied" | "Failed")).map(
        |(type_, message)| match message {
            Some(message) if !message.is_empty() => format!("{type_}: {message}"),
            _ => type_.to_string(),
        },
    )
}

impl SigningRequest for CertificateSigningRequest {
    fn submission(name: &str, request: &[u8]) -> Self {
        Self {
            metadata: ObjectMeta { name: Some(name.to_string()), ..ObjectMeta::default() },
            spec: CertificateSigningRequestSpec {
                request: ByteString(request.to_vec()),
                signer_name: certificate::SIGNER_NAME.to_string(),
                usages: Some(USAGES.iter().map(ToString::to_string).collect()),
                ..CertificateSigningRequestSpec::default()
            },
            status: None,
        }
    }

    fn approve(&mut self) {
        self.status.get_or_insert_default().conditions.get_or_insert_default().push(
            CertificateSigningRequestCondition {
                type_: CONDITION_APPROVED.to_string(),
                status: "True".to_string(),
                reason: Some(certificate::APPROVAL_REASON.to_string()),
                message: Some(certificate::APPROVAL_MESSAGE.to_string()),
                ..CertificateSigningRequestCondition::default()
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
        rejection_of(
            conditions
                .iter()
                .map(|condition| (condition.type_.as_str(), condition.message.as_deref())),
        )
    }
}

/// Submits `request` under `name`, approves it and waits up to `timeout` for
/// the issued certificate.
///
/// A request left over under the same name is deleted first.
pub async fn issue<R, C>(
    cluster: &C,
    name: &str,
    request: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, Error>
where
    R: SigningRequest,
    C: ClusterApi,
{
    match cluster.delete::<R>(None, name).await {
        Ok(()) => tracing::info!(name, "Deleted previous certificate signing request"),
        Err(err) if err.is_not_found() => {}
        Err(source) => return Err(Error::DeleteRequest { name: name.to_string(), source }),
    }

    let _submitted = cluster
        .create(None, &R::submission(name, request))
        .await
        .context(error::SubmitRequestSnafu { name })?;
    tracing::info!(name, "Submitted certificate signing request");

    let mut submitted =
        cluster.get::<R>(None, name).await.context(error::FetchRequestSnafu { name })?;
    submitted.approve();
    let _approved =
        cluster.replace_approval(&submitted).await.context(error::ApproveRequestSnafu { name })?;
    tracing::info!(name, "Approved certificate signing request");

    tokio::time::timeout(timeout, wait_for_certificate::<R, C>(cluster, name))
        .await
        .map_err(|_| Error::IssueTimeout { name: name.to_string(), timeout })?
}

async fn wait_for_certificate<R, C>(cluster: &C, name: &str) -> Result<Vec<u8>, Error>
where
    R: SigningRequest,
    C: ClusterApi,
{
    loop {
        let current =
            cluster.get::<R>(None, name).await.context(error::FetchRequestSnafu { name })?;
        if let Some(reason) = current.rejection() {
            return Err(Error::RequestRejected { name: name.to_string(), reason });
        }
        if let Some(certificate) = current.certificate() {
            return Ok(certificate.to_vec());
        }
        tracing::debug!(name, "Waiting for certificate to be issued");
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::certificates::v1::CertificateSigningRequestStatus;

    use super::*;
    use crate::cluster::memory::MemoryCluster;

    const NAME: &str = "docker-secret-tool-webhook.tool-test";

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_submission() {
        let submission = CertificateSigningRequest::submission(NAME, b"REQUEST");
        assert_eq!(submission.spec.request, ByteString(b"REQUEST".to_vec()));
        assert_eq!(submission.spec.signer_name, "kubernetes.io/legacy-unknown");
        assert_eq!(submission.spec.usages, Some(vec![
            "server auth".to_string(),
            "client auth".to_string()
        ]));
    }

    #[test]
    fn test_rejection() {
        let request = CertificateSigningRequest {
            status: Some(CertificateSigningRequestStatus {
                conditions: Some(vec![CertificateSigningRequestCondition {
                    type_: "Denied".to_string(),
                    status: "True".to_string(),
                    message: Some("not allowed".to_string()),
                    ..CertificateSigningRequestCondition::default()
                }]),
                ..CertificateSigningRequestStatus::default()
            }),
            ..CertificateSigningRequest::submission(NAME, b"REQUEST")
        };
        assert_eq!(request.rejection().as_deref(), Some("Denied: not allowed"));
        assert_eq!(request.certificate(), None);
    }

    #[tokio::test]
    async fn test_issue_replaces_previous_request() {
        let cluster = MemoryCluster::new().with_issued_certificate(b"CERT");
        let mut previous = CertificateSigningRequest::submission(NAME, b"OLD");
        previous.approve();
        cluster.insert(None, previous);

        let certificate =
            issue::<CertificateSigningRequest, _>(&cluster, NAME, b"REQUEST", TIMEOUT)
                .await
                .expect("Certificate should be issued");
        assert_eq!(certificate, b"CERT");

        let stored = cluster
            .object::<CertificateSigningRequest>(None, NAME)
            .expect("Request should exist");
        assert_eq!(stored.spec.request, ByteString(b"REQUEST".to_vec()));
        let conditions = stored.status.and_then(|status| status.conditions).unwrap_or_default();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].type_, "Approved");
        assert_eq!(conditions[0].reason.as_deref(), Some("docker secret tools webhook"));
    }

    #[tokio::test]
    async fn test_issue_times_out_without_signer() {
        let cluster = MemoryCluster::new();
        let err = issue::<CertificateSigningRequest, _>(
            &cluster,
            NAME,
            b"REQUEST",
            Duration::from_millis(50),
        )
        .await
        .expect_err("Certificate should never be issued");
        assert!(matches!(err, Error::IssueTimeout { .. }));
    }
}
