use k8s_openapi::{
    ByteString,
    api::{
        admissionregistration::v1::{
            MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
            WebhookClientConfig,
        },
        core::v1::{ConfigMap, Secret},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use secretool_base::{
    HomeNamespace,
    consts::{
        k8s::{self, annotations, secrets},
        webhook,
    },
};
use snafu::ResultExt;

use super::{Error, error};
use crate::cluster::ClusterApi;

fn strings(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(ToString::to_string).collect())
}

/// Webhook configuration sending workload creations to the agent's service.
#[must_use]
pub fn desired_configuration(
    home: &HomeNamespace,
    service_name: &str,
    ca_bundle: Option<&[u8]>,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(webhook::CONFIGURATION_NAME.to_string()),
            ..ObjectMeta::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: webhook::WEBHOOK_NAME.to_string(),
            side_effects: "None".to_string(),
            admission_review_versions: vec!["v1".to_string(), "v1beta1".to_string()],
            failure_policy: Some("Ignore".to_string()),
            rules: Some(vec![RuleWithOperations {
                operations: strings(&["CREATE"]),
                api_groups: strings(&["", "apps"]),
                api_versions: strings(&["*"]),
                resources: strings(&["deployments", "daemonsets", "replicasets", "pods"]),
                scope: Some("*".to_string()),
            }]),
            client_config: WebhookClientConfig {
                service: Some(ServiceReference {
                    namespace: home.to_string(),
                    name: service_name.to_string(),
                    path: Some(webhook::MUTATE_PATH.to_string()),
                    port: None,
                }),
                ca_bundle: ca_bundle
                    .filter(|bundle| !bundle.is_empty())
                    .map(|bundle| ByteString(bundle.to_vec())),
                url: None,
            },
            ..MutatingWebhook::default()
        }]),
    }
}

fn registered_ca_bundle(configuration: &MutatingWebhookConfiguration) -> &[u8] {
    configuration
        .webhooks
        .as_ref()
        .and_then(|webhooks| webhooks.first())
        .and_then(|webhook| webhook.client_config.ca_bundle.as_ref())
        .map(|bundle| bundle.0.as_slice())
        .unwrap_or_default()
}

/// Creates the webhook configuration, or refreshes the CA bundle of an
/// existing one when it differs from `ca_bundle`. Nothing else of an existing
/// configuration is changed.
pub async fn register<C: ClusterApi>(
    cluster: &C,
    home: &HomeNamespace,
    service_name: &str,
    ca_bundle: Option<&[u8]>,
) -> Result<(), Error> {
    let name = webhook::CONFIGURATION_NAME;
    let desired = desired_configuration(home, service_name, ca_bundle);

    let mut current = match cluster.get::<MutatingWebhookConfiguration>(None, name).await {
        Ok(current) => current,
        Err(err) if err.is_not_found() => {
            let _created = cluster
                .create(None, &desired)
                .await
                .context(error::CreateConfigurationSnafu { name })?;
            tracing::info!(name, "Created mutating webhook configuration");
            return Ok(());
        }
        Err(source) => return Err(Error::GetConfiguration { name: name.to_string(), source }),
    };

    if registered_ca_bundle(&current) == ca_bundle.unwrap_or_default() {
        tracing::debug!(name, "Mutating webhook configuration is up to date");
        return Ok(());
    }

    match current.webhooks.as_mut().and_then(|webhooks| webhooks.first_mut()) {
        Some(webhook) => {
            webhook.client_config.ca_bundle = ca_bundle.map(|bundle| ByteString(bundle.to_vec()));
        }
        None => current.webhooks = desired.webhooks,
    }
    let _replaced = cluster
        .replace(None, &current)
        .await
        .context(error::UpdateConfigurationSnafu { name })?;
    tracing::info!(name, "Updated CA bundle of mutating webhook configuration");
    Ok(())
}

/// CA bundle of the cluster, read from the default service account token in
/// the home namespace, or from the root CA ConfigMap when no such token
/// exists.
pub async fn cluster_ca_bundle<C: ClusterApi>(
    cluster: &C,
    home: &HomeNamespace,
) -> Result<Vec<u8>, Error> {
    let namespace = home.as_str();
    let from_token = cluster
        .list::<Secret>(Some(namespace))
        .await
        .context(error::ListSecretsSnafu { namespace })?
        .into_iter()
        .filter(|secret| secret.type_.as_deref() == Some(secrets::TYPE_SERVICE_ACCOUNT_TOKEN))
        .filter(|secret| {
            secret
                .metadata
                .annotations
                .as_ref()
                .and_then(|map| map.get(annotations::SERVICE_ACCOUNT_NAME))
                .is_some_and(|account| account == k8s::DEFAULT_SERVICE_ACCOUNT)
        })
        .find_map(|mut secret| {
            secret.data.as_mut().and_then(|data| data.remove(secrets::CA_CERT_KEY))
        })
        .map(|bundle| bundle.0)
        .filter(|bundle| !bundle.is_empty());
    if let Some(bundle) = from_token {
        return Ok(bundle);
    }

    match cluster.get::<ConfigMap>(Some(namespace), k8s::ROOT_CA_CONFIG_MAP).await {
        Ok(config_map) => config_map
            .data
            .and_then(|mut data| data.remove(secrets::CA_CERT_KEY))
            .filter(|bundle| !bundle.is_empty())
            .map(String::into_bytes)
            .ok_or_else(|| Error::ClusterCaNotFound { namespace: namespace.to_string() }),
        Err(err) => {
            tracing::warn!(namespace, "Failed to read {}, error: {err}", k8s::ROOT_CA_CONFIG_MAP);
            Err(Error::ClusterCaNotFound { namespace: namespace.to_string() })
        }
    }
}
