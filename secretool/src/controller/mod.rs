//! Watch-driven controllers: the namespace propagator and the workload
//! reconcilers used when the agent runs in `Update` mode.
//!
//! Controllers only act on objects they have not handled yet; the UID of
//! every successfully reconciled object is remembered so that later update
//! events and resyncs for it are ignored. Remembered UIDs are dropped once
//! the object is terminating, is gone from the API server or has left the
//! controller's cache.

mod error;
mod namespace;
mod workload;

use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use dashmap::{DashMap, DashSet};
use kube::{
    Resource,
    runtime::{controller::Action, reflector::Store},
};

pub use self::{
    error::Error,
    namespace::{reconcile_namespace, run_namespace_controller},
    workload::{reconcile_workload, run_workload_controllers},
};
use crate::credentials::CredentialSources;

/// Owner API version whose children are always left alone.
const MANAGED_OWNER_API_VERSION: &str = "apps/v1";

const REQUEUE_AFTER_ERROR: Duration = Duration::from_secs(5);

const MAX_REQUEUE_AFTER_ERROR: Duration = Duration::from_secs(5 * 60);

/// How often remembered UIDs are checked against the controller's cache.
const PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// `(kind, uid)`
type ObjectKey = (String, String);

fn object_key<K: Resource<DynamicType = ()>>(object: &K) -> Option<ObjectKey> {
    object.meta().uid.clone().map(|uid| (K::kind(&()).into_owned(), uid))
}

/// Delay before retrying an object that failed `attempts` times in a row.
fn backoff(attempts: u32) -> Duration {
    let factor = 2_u32.saturating_pow(attempts.saturating_sub(1));
    REQUEUE_AFTER_ERROR.saturating_mul(factor).min(MAX_REQUEUE_AFTER_ERROR)
}

/// State shared by every reconcile call of one controller.
pub struct Context<C> {
    pub cluster: C,
    pub sources: CredentialSources,
    pub not_manager_owners: Vec<String>,
    handled: DashSet<ObjectKey>,
    failures: DashMap<ObjectKey, u32>,
}

impl<C> Context<C> {
    pub fn new(cluster: C, sources: CredentialSources, not_manager_owners: Vec<String>) -> Self {
        Self {
            cluster,
            sources,
            not_manager_owners,
            handled: DashSet::new(),
            failures: DashMap::new(),
        }
    }

    fn is_handled<K: Resource<DynamicType = ()>>(&self, object: &K) -> bool {
        object_key(object).is_some_and(|key| self.handled.contains(&key))
    }

    /// Remembers `object` as done and clears its failure streak.
    fn mark_handled<K: Resource<DynamicType = ()>>(&self, object: &K) {
        if let Some(key) = object_key(object) {
            let _unused = self.failures.remove(&key);
            let _unused = self.handled.insert(key);
        }
    }

    fn forget<K: Resource<DynamicType = ()>>(&self, object: &K) {
        if let Some(key) = object_key(object) {
            let _unused = self.failures.remove(&key);
            let _unused = self.handled.remove(&key);
        }
    }

    /// Counts another consecutive failure of `object` and returns the streak.
    fn record_failure<K: Resource<DynamicType = ()>>(&self, object: &K) -> u32 {
        object_key(object).map_or(1, |key| {
            let mut attempts = self.failures.entry(key).or_insert(0);
            *attempts = attempts.saturating_add(1);
            *attempts
        })
    }

    /// Drops the bookkeeping of every `K` whose UID is not in `live`.
    fn retain_live<K: Resource<DynamicType = ()>>(&self, live: &HashSet<String>) {
        let kind = K::kind(&());
        let keep = |(object_kind, uid): &ObjectKey| *object_kind != kind || live.contains(uid);
        self.handled.retain(keep);
        self.failures.retain(|key, _| keep(key));
    }

    /// Whether `object` is owned by a controller the reconcile path must not
    /// second-guess.
    fn has_excluded_owner<K: Resource>(&self, object: &K) -> bool {
        object.meta().owner_references.iter().flatten().any(|owner| {
            owner.api_version == MANAGED_OWNER_API_VERSION
                || self.not_manager_owners.iter().any(|excluded| *excluded == owner.api_version)
        })
    }
}

/// Re-queues a failed object with exponential backoff per object.
pub fn error_policy<K, C>(object: Arc<K>, error: &Error, ctx: Arc<Context<C>>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let attempts = ctx.record_failure(object.as_ref());
    let delay = backoff(attempts);
    tracing::error!(
        name = %object.meta().name.as_deref().unwrap_or_default(),
        namespace = %object.meta().namespace.as_deref().unwrap_or_default(),
        attempts,
        retry_after = ?delay,
        "Reconciliation failed, error: {error}"
    );
    Action::requeue(delay)
}

/// Periodically forgets objects that have left the controller's cache.
async fn prune_handled<K, C>(store: Store<K>, ctx: Arc<Context<C>>)
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    if store.wait_until_ready().await.is_err() {
        return;
    }
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        let _instant = interval.tick().await;
        let live: HashSet<String> =
            store.state().iter().filter_map(|object| object.meta().uid.clone()).collect();
        ctx.retain_live::<K>(&live);
    }
}

fn log_reconcile_result<T: fmt::Debug, E: fmt::Debug>(
    controller_name: String,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{controller_name} reconciliation completed"),
            Err(err) => tracing::error!(error = ?err, "{controller_name} reconciliation error"),
        }
        std::future::ready(())
    }
}
