//! Fixed object names shared by every deployment of the agent.
//!
//! These names are part of the upgrade contract with clusters that already
//! run the agent; changing any of them orphans existing objects.

pub mod k8s {
    pub mod secrets {
        /// Key holding the docker config JSON blob in a credential secret.
        pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

        pub const TYPE_DOCKER_CONFIG_JSON: &str = "kubernetes.io/dockerconfigjson";

        pub const TYPE_DOCKER_CFG: &str = "kubernetes.io/dockercfg";

        pub const TYPE_TLS: &str = "kubernetes.io/tls";

        pub const TYPE_SERVICE_ACCOUNT_TOKEN: &str = "kubernetes.io/service-account-token";

        pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

        pub const TLS_CERT_KEY: &str = "tls.crt";

        pub const CA_CERT_KEY: &str = "ca.crt";
    }

    pub mod annotations {
        pub const SERVICE_ACCOUNT_NAME: &str = "kubernetes.io/service-account.name";
    }

    /// Service account whose token secret carries the cluster CA.
    pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

    /// ConfigMap published into every namespace with the cluster root CA.
    pub const ROOT_CA_CONFIG_MAP: &str = "kube-root-ca.crt";
}

pub mod webhook {
    /// Name of the TLS secret holding the serving key pair.
    pub const TLS_SECRET_NAME: &str = "docker-secret-tools-mutating-webhook";

    /// Name of the `MutatingWebhookConfiguration` object.
    pub const CONFIGURATION_NAME: &str = "docker-secret-tools";

    /// Name of the webhook entry inside the configuration.
    pub const WEBHOOK_NAME: &str = "docker-secret-tools.shijunlee.net";

    pub const MUTATE_PATH: &str = "/mutate";

    pub const VALIDATE_PATH: &str = "/validate";

    pub const LIVE_PATH: &str = "/live";
}

pub mod certificate {
    /// Name of the certificate signing request submitted at bootstrap.
    pub const CSR_NAME: &str = "docker-secret-tool-webhook.tool-test";

    pub const SIGNER_NAME: &str = "kubernetes.io/legacy-unknown";

    pub const GROUP_VERSION_V1: &str = "certificates.k8s.io/v1";

    pub const APPROVAL_REASON: &str = "docker secret tools webhook";

    pub const APPROVAL_MESSAGE: &str = "This CSR was approved by docker-tools";

    pub const COUNTRY: &str = "CN";
}
