use std::{future::Future, sync::Arc};

use futures::{StreamExt, future};
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
    core::v1::Pod,
};
use kube::{
    Api, Client, ResourceExt,
    runtime::{Controller, controller::Action, watcher},
};
use snafu::ResultExt;

use super::{Context, Error, error, error_policy, log_reconcile_result, prune_handled};
use crate::{
    cluster::{ClusterApi, ClusterResource, KubeCluster},
    plan::{self, MutationPlan, ReferencePolicy},
    workload::HasPodSpec,
};

/// Adds image pull secret references to a live workload.
///
/// The object is fetched again so the images come from the latest version.
/// A fetch error, including not found, is returned to the controller; the
/// controller drops objects that have left its cache. A patch the API server
/// refuses as invalid, such as a new reference on an existing bare Pod, is
/// logged and not retried.
pub async fn reconcile_workload<K, C>(object: Arc<K>, ctx: Arc<Context<C>>) -> Result<Action, Error>
where
    K: HasPodSpec + ClusterResource,
    C: ClusterApi,
{
    if object.meta().deletion_timestamp.is_some() {
        ctx.forget(object.as_ref());
        return Ok(Action::await_change());
    }
    if ctx.is_handled(object.as_ref()) {
        return Ok(Action::await_change());
    }
    if ctx.has_excluded_owner(object.as_ref()) {
        tracing::debug!(kind = %K::KIND, name = %object.name_any(), "Skip owned workload");
        return Ok(Action::await_change());
    }

    let namespace = object.namespace().unwrap_or_default();
    let name = object.name_any();
    let live = ctx
        .cluster
        .get::<K>(Some(&namespace), &name)
        .await
        .inspect_err(|err| {
            if err.is_not_found() {
                ctx.forget(object.as_ref());
            }
        })
        .context(error::FetchWorkloadSnafu {
            kind: K::KIND,
            namespace: namespace.clone(),
            name: name.clone(),
        })?;

    let images = live.images();
    if images.is_empty() {
        ctx.mark_handled(object.as_ref());
        return Ok(Action::await_change());
    }

    let index = ctx.sources.index(&ctx.cluster).await;
    let plan = MutationPlan::new(K::KIND, namespace.clone(), &index, &images);
    if plan.is_empty() {
        tracing::debug!(
            kind = %K::KIND,
            namespace = %namespace,
            name = %name,
            "No credential matches the images"
        );
        ctx.mark_handled(object.as_ref());
        return Ok(Action::await_change());
    }

    let references = plan.references(&ctx.cluster, ReferencePolicy::EnsuredOnly).await;
    if !references.is_empty() {
        let patch = plan::reconcile_patch(K::KIND, &references);
        match ctx.cluster.patch::<K>(Some(&namespace), &name, &patch).await {
            Ok(_patched) => tracing::info!(
                kind = %K::KIND,
                namespace = %namespace,
                name = %name,
                secrets = ?references,
                "Added image pull secrets"
            ),
            Err(err) if err.is_invalid() => tracing::warn!(
                kind = %K::KIND,
                namespace = %namespace,
                name = %name,
                "Image pull secrets cannot be added, error: {err}"
            ),
            Err(source) => {
                return Err(source).context(error::PatchWorkloadSnafu {
                    kind: K::KIND,
                    namespace,
                    name,
                });
            }
        }
    }

    ctx.mark_handled(object.as_ref());
    Ok(Action::await_change())
}

async fn run_workload_controller<K>(client: Client, ctx: Arc<Context<KubeCluster>>)
where
    K: HasPodSpec + ClusterResource,
{
    tracing::info!(kind = %K::KIND, "Starting workload controller");
    let controller = Controller::new(Api::<K>::all(client), watcher::Config::default());
    let pruning = prune_handled(controller.store(), ctx.clone());
    let reconciling = controller
        .run(reconcile_workload::<K, KubeCluster>, error_policy::<K, KubeCluster>, ctx)
        .for_each(log_reconcile_result(K::KIND.to_string()));

    tokio::select! {
        () = reconciling => {},
        () = pruning => {},
    }
}

/// Runs one reconciler per workload kind until `shutdown_signal` resolves.
pub async fn run_workload_controllers(
    client: Client,
    ctx: Arc<Context<KubeCluster>>,
    shutdown_signal: impl Future<Output = ()> + Send + Unpin,
) {
    let controllers = future::join5(
        run_workload_controller::<Pod>(client.clone(), ctx.clone()),
        run_workload_controller::<Deployment>(client.clone(), ctx.clone()),
        run_workload_controller::<StatefulSet>(client.clone(), ctx.clone()),
        run_workload_controller::<ReplicaSet>(client.clone(), ctx.clone()),
        run_workload_controller::<DaemonSet>(client, ctx),
    );

    tokio::select! {
        _ = controllers => {},
        () = shutdown_signal => tracing::info!("Workload controllers are shutting down"),
    }
}
