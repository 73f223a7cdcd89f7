//! Serving certificate of the admission webhook.
//!
//! With `autoTLS` the key pair is obtained from the cluster signer once and
//! persisted as a TLS secret in the home namespace; every later start reuses
//! that secret. Otherwise the key pair is read from disk.

mod csr;
mod error;
mod signing_request;
mod v1beta1;

use std::{collections::BTreeMap, path::Path, time::Duration};

use k8s_openapi::{
    ByteString,
    api::{certificates::v1::CertificateSigningRequest, core::v1::Secret},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use secretool_base::{
    HomeNamespace,
    consts::{certificate, k8s::secrets, webhook},
};
use snafu::ResultExt;

pub use self::{
    csr::{CertConfig, SigningRequestPem},
    error::Error,
};
use crate::cluster::ClusterApi;

/// How long to wait for the cluster signer to issue the certificate.
pub const ISSUE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// PEM encoded certificate chain and private key.
#[derive(Clone)]
pub struct TlsMaterial {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("certificate", &String::from_utf8_lossy(&self.certificate))
            .finish_non_exhaustive()
    }
}

impl TlsMaterial {
    fn from_secret(secret: &Secret) -> Result<Self, Error> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        let read = |key: &str| {
            secret
                .data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|value| value.0.clone())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::IncompleteTlsSecret {
                    name: name.clone(),
                    key: key.to_string(),
                })
        };
        Ok(Self {
            certificate: read(secrets::TLS_CERT_KEY)?,
            private_key: read(secrets::TLS_PRIVATE_KEY_KEY)?,
        })
    }

    fn to_secret(&self) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(webhook::TLS_SECRET_NAME.to_string()),
                ..ObjectMeta::default()
            },
            type_: Some(secrets::TYPE_TLS.to_string()),
            data: Some(BTreeMap::from([
                (secrets::TLS_CERT_KEY.to_string(), ByteString(self.certificate.clone())),
                (secrets::TLS_PRIVATE_KEY_KEY.to_string(), ByteString(self.private_key.clone())),
            ])),
            ..Secret::default()
        }
    }

    /// Reads the certificate and private key from PEM files.
    pub async fn load_files(cert_file: &Path, private_key_file: &Path) -> Result<Self, Error> {
        Ok(Self {
            certificate: read_file(cert_file).await?,
            private_key: read_file(private_key_file).await?,
        })
    }
}

pub async fn read_file(file_path: &Path) -> Result<Vec<u8>, Error> {
    tokio::fs::read(file_path).await.context(error::ReadFileSnafu { file_path })
}

/// Returns the persisted serving key pair, requesting and persisting a new
/// one when the TLS secret does not exist yet.
pub async fn bootstrap<C: ClusterApi>(
    cluster: &C,
    home: &HomeNamespace,
    service_name: &str,
) -> Result<TlsMaterial, Error> {
    let name = webhook::TLS_SECRET_NAME;
    match cluster.get::<Secret>(Some(home.as_str()), name).await {
        Ok(secret) => {
            tracing::info!(namespace = %home, secret = name, "Use existing TLS secret");
            return TlsMaterial::from_secret(&secret);
        }
        Err(err) if err.is_not_found() => {}
        Err(source) => return Err(Error::FetchTlsSecret { name: name.to_string(), source }),
    }

    tracing::info!(namespace = %home, secret = name, "Request a certificate for the webhook");
    let material = request_certificate(cluster, home, service_name, ISSUE_TIMEOUT).await?;
    let _created = cluster
        .create(Some(home.as_str()), &material.to_secret())
        .await
        .context(error::StoreTlsSecretSnafu { name })?;
    tracing::info!(namespace = %home, secret = name, "Stored TLS secret");
    Ok(material)
}

/// Generates a key pair for the service and has the cluster signer issue its
/// certificate, through the newest signing request API the cluster serves.
pub async fn request_certificate<C: ClusterApi>(
    cluster: &C,
    home: &HomeNamespace,
    service_name: &str,
    timeout: Duration,
) -> Result<TlsMaterial, Error> {
    let SigningRequestPem { request, private_key } =
        CertConfig::for_service(service_name, home.as_str())?.generate()?;

    let name = certificate::CSR_NAME;
    let serves_v1 = cluster
        .supports_api_version(certificate::GROUP_VERSION_V1)
        .await
        .context(error::ProbeSigningApiSnafu)?;
    let issued = if serves_v1 {
        signing_request::issue::<CertificateSigningRequest, C>(
            cluster,
            name,
            request.as_bytes(),
            timeout,
        )
        .await?
    } else {
        tracing::info!("{} is not served, fall back to v1beta1", certificate::GROUP_VERSION_V1);
        signing_request::issue::<v1beta1::CertificateSigningRequest, C>(
            cluster,
            name,
            request.as_bytes(),
            timeout,
        )
        .await?
    };

    Ok(TlsMaterial { certificate: issued, private_key: private_key.into_bytes() })
}
