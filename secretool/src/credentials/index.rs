use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use secretool_base::consts::k8s::secrets;

use super::DockerConfigJson;
use crate::image;

/// Registry host to the credentials that authenticate against it.
///
/// Built from scratch for every admission request or reconcile so that
/// changes to the source secrets are picked up without a cache.
#[derive(Clone, Debug, Default)]
pub struct CredentialIndex {
    by_host: BTreeMap<String, Vec<Secret>>,
}

impl CredentialIndex {
    /// Indexes each credential under every host in its `auths` map.
    /// Credentials whose payload does not decode are logged and left out.
    pub fn build(credentials: impl IntoIterator<Item = Secret>) -> Self {
        let mut by_host: BTreeMap<String, Vec<Secret>> = BTreeMap::new();

        for credential in credentials {
            let name = credential.metadata.name.clone().unwrap_or_default();
            let Some(payload) = credential
                .data
                .as_ref()
                .and_then(|data| data.get(secrets::DOCKER_CONFIG_JSON_KEY))
            else {
                tracing::debug!(secret = %name, "Credential has no {} entry", secrets::DOCKER_CONFIG_JSON_KEY);
                continue;
            };

            match DockerConfigJson::from_slice(&payload.0) {
                Ok(config) => {
                    for host in config.hosts() {
                        by_host.entry(host.to_string()).or_default().push(credential.clone());
                    }
                }
                Err(err) => {
                    tracing::error!(secret = %name, "Failed to decode docker config, error: {err}");
                }
            }
        }

        Self { by_host }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.by_host.is_empty() }

    pub fn hosts(&self) -> impl Iterator<Item = &str> { self.by_host.keys().map(String::as_str) }

    #[must_use]
    pub fn credentials_for(&self, host: &str) -> &[Secret] {
        self.by_host.get(host).map(Vec::as_slice).unwrap_or_default()
    }

    /// Credentials needed by a workload running `images`.
    ///
    /// Ordered by host, then by image; a credential is repeated for every
    /// image that matches its host.
    #[must_use]
    pub fn needed_for<S: AsRef<str>>(&self, images: &[S]) -> Vec<&Secret> {
        let hosts: Vec<Option<&str>> =
            images.iter().map(|image| image::registry_host(image.as_ref())).collect();

        let mut needed = Vec::new();
        for (host, credentials) in &self.by_host {
            for image_host in &hosts {
                if *image_host == Some(host.as_str()) {
                    needed.extend(credentials.iter());
                }
            }
        }
        needed
    }
}
