use crate::{
    CatalogueItem, OPERATOR_VERSION, Result,
    manager::Context,
    metrics::ReconcileMetrics,
    observe::{Observed, detect_trigger, status_patch},
};
use async_trait::async_trait;
use chrono::Utc;
use common::{
    CharmConfig, Flavor, Status, TlsState,
    context::is_leader,
    model::CertificateMaterial,
    kubeworkload::{KubeStatus, KubeWorkload},
    reconciler::Reconciler,
    triggers::{Snapshot, dispatch},
    workload::Workload,
};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Client, ResourceExt,
    api::{Api, Patch, PatchParams},
    runtime::controller::Action,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;

/// Captures what differs between the landing page and the catalogue.
///
/// The shared pass lives in [`run_pass`], it calls the methods below for
/// every kind-specific decision.
#[async_trait]
pub trait Operand:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + serde::de::DeserializeOwned
    + serde::Serialize
    + Send
    + Sync
    + 'static
{
    fn flavor() -> Flavor
    where
        Self: Sized;
    fn metrics(ctx: &Context) -> &ReconcileMetrics
    where
        Self: Sized;

    fn workload(&self) -> &str;
    fn container(&self) -> &str;
    fn config(&self) -> &CharmConfig;
    /// What the last successful pass recorded
    fn last_observed(&self) -> Observed;

    /// TLS state and the version of the secret it comes from
    async fn tls(&self, _client: Client) -> Result<(TlsState, Option<String>)> {
        Ok((TlsState::Disabled, None))
    }

    fn ingress_url(&self) -> Option<String> {
        None
    }

    fn internal_url(&self, _tls: bool) -> Option<String> {
        None
    }
}

/// TLS state to reconcile with when the issuer secret cannot be read
fn tls_or_unreadable(res: Result<(TlsState, Option<String>)>) -> (TlsState, Option<String>) {
    res.unwrap_or_else(|e| {
        tracing::warn!("Cannot read TLS material: {e}");
        (TlsState::Requested(CertificateMaterial::default()), None)
    })
}

fn requeue_for(status: &Status, active: Duration) -> Action {
    match status {
        Status::Active => Action::requeue(active),
        Status::Waiting(_) => Action::requeue(Duration::from_secs(10)),
        Status::Blocked(_) => Action::requeue(Duration::from_secs(60)),
    }
}

/// One reconciliation of a LandingPage or a Catalogue
pub async fn run_pass<T: Operand>(obj: Arc<T>, ctx: Arc<Context>) -> Result<Action> {
    let metrics = T::metrics(&ctx);
    let _measure = metrics.count_and_measure();
    ctx.diagnostics.write().await.last_event = Utc::now();

    let client = ctx.client.clone();
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let leader = is_leader(
        client.clone(),
        ctx.client.default_namespace(),
        &ctx.lease_name,
        &ctx.identity,
    )
    .await;
    let workload = KubeWorkload::new(client.clone(), &ns, obj.workload(), obj.container(), T::flavor());
    let status = KubeStatus::<T>::new(client.clone(), &ns, &name, &ctx.identity, leader);
    let reconciler = Reconciler::new(T::flavor(), &workload, &status);

    let entries = match CatalogueItem::entries_for(client.clone(), &ns, &name).await {
        Ok(entries) => entries,
        Err(e) => {
            let failed = reconciler.status_for(&e);
            reconciler.report(&failed).await?;
            return Ok(requeue_for(&failed, ctx.requeue));
        }
    };
    let (tls, cert_version) = tls_or_unreadable(obj.tls(client.clone()).await);
    let current = Observed {
        generation: obj.meta().generation,
        workload_ready: workload.can_connect().await,
        cert_version,
        ingress_url: obj.ingress_url(),
        version: Some(OPERATOR_VERSION.to_string()),
    };
    let trigger = detect_trigger(&obj.last_observed(), &current);
    metrics.trigger(&trigger);
    tracing::info!("Reconciling {} {ns}/{name} on {}", T::kind(&()), trigger.name());

    let outcome = dispatch(&trigger, &reconciler, &Snapshot {
        entries: &entries,
        config: obj.config(),
        tls: &tls,
    })
    .await?;

    let patch = status_patch(
        &current,
        &outcome.status,
        entries.len(),
        obj.internal_url(tls.is_enabled()),
        T::flavor().supports_tls(),
    );
    let api = Api::<T>::namespaced(client, &ns);
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(json!({ "status": patch })))
        .await?;

    Ok(requeue_for(&outcome.status, ctx.requeue))
}
