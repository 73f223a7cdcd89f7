use std::{future::Future, sync::Arc};

use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Api, Client, ResourceExt,
    runtime::{Controller, controller::Action, watcher},
};
use snafu::ResultExt;

use super::{Context, Error, error, error_policy, log_reconcile_result, prune_handled};
use crate::{
    cluster::{ClusterApi, KubeCluster},
    credentials,
};

/// Copies every administrative credential into a newly observed namespace.
///
/// Stops at the first credential that cannot be copied; the controller
/// retries the namespace later. Terminating namespaces are skipped.
pub async fn reconcile_namespace<C: ClusterApi>(
    namespace: Arc<Namespace>,
    ctx: Arc<Context<C>>,
) -> Result<Action, Error> {
    if namespace.metadata.deletion_timestamp.is_some() {
        ctx.forget(namespace.as_ref());
        return Ok(Action::await_change());
    }
    if ctx.is_handled(namespace.as_ref()) {
        return Ok(Action::await_change());
    }

    let name = namespace.name_any();
    for credential in ctx.sources.read(&ctx.cluster).await {
        let secret = credential.name_any();
        let _ensured = credentials::ensure_namespaced_copy(&ctx.cluster, &credential, &name)
            .await
            .context(error::CopyCredentialSnafu { namespace: name.clone(), secret })?;
    }

    tracing::debug!(namespace = %name, "Namespace has every credential");
    ctx.mark_handled(namespace.as_ref());
    Ok(Action::await_change())
}

/// Runs the namespace propagator until `shutdown_signal` resolves.
pub async fn run_namespace_controller(
    client: Client,
    ctx: Arc<Context<KubeCluster>>,
    shutdown_signal: impl Future<Output = ()> + Send + Unpin,
) {
    tracing::info!("Starting namespace controller");
    let controller = Controller::new(Api::<Namespace>::all(client), watcher::Config::default());
    let pruning = prune_handled(controller.store(), ctx.clone());
    let reconciling = controller
        .run(reconcile_namespace::<KubeCluster>, error_policy::<Namespace, KubeCluster>, ctx)
        .for_each(log_reconcile_result("Namespace".to_string()));

    tokio::select! {
        () = reconciling => {},
        () = pruning => {},
        () = shutdown_signal => tracing::info!("Namespace controller is shutting down"),
    }
}
