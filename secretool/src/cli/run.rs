use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use kube::Client;
use secretool_base::HomeNamespace;
use sigfinn::{ExitStatus, LifecycleManager};

use super::Error;
use crate::{
    cluster::KubeCluster,
    config::{self, Config, SetMethod},
    controller::{self, Context},
    credentials::CredentialSources,
    tls::{self, TlsMaterial},
    webhook::{self, WebhookState},
};

/// Starts the agent and blocks until a termination signal arrives or a worker
/// fails.
///
/// The namespace propagator always runs. In `WebHook` mode the admission
/// server is started next to it, in `Update` mode the workload reconcilers.
pub async fn run(client: Client, config: Config, home: HomeNamespace) -> Result<(), Error> {
    tracing::info!(
        namespace = %home,
        set_method = %config.set_method,
        secrets = ?config.docker_secret_names,
        "Starting {}",
        secretool_base::PROJECT_NAME
    );

    let cluster = KubeCluster::new(client.clone());
    let sources = CredentialSources::new(home.clone(), config.docker_secret_names.clone());
    let ctx = Arc::new(Context::new(
        cluster.clone(),
        sources.clone(),
        config.not_manager_owners.clone(),
    ));

    let lifecycle_manager = LifecycleManager::<Error>::new();

    let _handle = lifecycle_manager.spawn("namespace-controller", {
        let (client, ctx) = (client.clone(), ctx.clone());
        move |shutdown_signal| async move {
            controller::run_namespace_controller(client, ctx, shutdown_signal).await;
            ExitStatus::Success
        }
    });

    match config.set_method {
        SetMethod::WebHook => {
            let _handle = lifecycle_manager.spawn("webhook-server", move |shutdown_signal| {
                async move {
                    match run_webhook(cluster, sources, &config, shutdown_signal).await {
                        Ok(()) => ExitStatus::Success,
                        Err(err) => ExitStatus::Error(err),
                    }
                }
            });
        }
        SetMethod::Update => {
            let _handle = lifecycle_manager.spawn("workload-controllers", move |shutdown_signal| {
                async move {
                    controller::run_workload_controllers(client, ctx, shutdown_signal).await;
                    ExitStatus::Success
                }
            });
        }
    }

    if let Ok(Err(err)) = lifecycle_manager.serve().await {
        tracing::error!("{err}");
        Err(err)
    } else {
        Ok(())
    }
}

/// Prepares the serving certificate and the webhook registration, then serves
/// admission requests. Preparation is abandoned when `shutdown_signal`
/// resolves first.
async fn run_webhook(
    cluster: KubeCluster,
    sources: CredentialSources,
    config: &Config,
    mut shutdown_signal: impl Future<Output = ()> + Send + Unpin,
) -> Result<(), Error> {
    let home = sources.home.clone();
    let tls = tokio::select! {
        tls = prepare_webhook(&cluster, &home, config) => tls?,
        () = &mut shutdown_signal => return Ok(()),
    };

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.server_port);
    let router = webhook::router(Arc::new(WebhookState::new(cluster, sources)));
    webhook::serve(addr, tls, router, shutdown_signal).await?;
    Ok(())
}

async fn prepare_webhook(
    cluster: &KubeCluster,
    home: &HomeNamespace,
    config: &Config,
) -> Result<TlsMaterial, Error> {
    let (tls, ca_bundle) = if config.auto_tls {
        let tls = tls::bootstrap(cluster, home, &config.service_name).await?;
        (tls, Some(webhook::cluster_ca_bundle(cluster, home).await?))
    } else {
        let (Some(cert_file), Some(private_key_file)) =
            (config.cert_file.as_deref(), config.private_key_file.as_deref())
        else {
            return Err(Error::from(config::Error::MissingCertificateFiles));
        };
        let tls = TlsMaterial::load_files(cert_file, private_key_file).await?;
        let ca_bundle = match config.root_ca.as_deref() {
            Some(root_ca) => Some(tls::read_file(root_ca).await?),
            None => None,
        };
        (tls, ca_bundle)
    };

    webhook::register(cluster, home, &config.service_name, ca_bundle.as_deref()).await?;
    Ok(tls)
}
