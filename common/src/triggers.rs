use crate::{
    Result,
    model::{CatalogueEntry, CharmConfig, TlsState},
    reconciler::{ReconcileInput, ReconcileOutcome, Reconciler},
};

/// Lifecycle events both operators react to
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum Trigger {
    WorkloadReady,
    ConfigChanged,
    Upgrade,
    RelationChanged,
    CertificateChanged,
    IngressReady(String),
    IngressRevoked,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::WorkloadReady => "workload-ready",
            Trigger::ConfigChanged => "config-changed",
            Trigger::Upgrade => "upgrade",
            Trigger::RelationChanged => "relation-changed",
            Trigger::CertificateChanged => "certificate-changed",
            Trigger::IngressReady(_) => "ingress-ready",
            Trigger::IngressRevoked => "ingress-revoked",
        }
    }

    pub fn pushes_certificates(&self) -> bool {
        matches!(
            self,
            Trigger::WorkloadReady
                | Trigger::CertificateChanged
                | Trigger::IngressReady(_)
                | Trigger::IngressRevoked
        )
    }
}

/// Everything a trigger hands over to the reconciler
pub struct Snapshot<'a> {
    pub entries: &'a [CatalogueEntry],
    pub config: &'a CharmConfig,
    pub tls: &'a TlsState,
}

impl<'a> Snapshot<'a> {
    fn input(&self, push_certs: bool) -> ReconcileInput<'a> {
        ReconcileInput {
            entries: self.entries,
            config: self.config,
            tls: self.tls,
            push_certs,
        }
    }
}

pub async fn on_workload_ready(r: &Reconciler<'_>, snap: &Snapshot<'_>) -> Result<ReconcileOutcome> {
    r.reconcile(&snap.input(true)).await
}

pub async fn on_config_changed(r: &Reconciler<'_>, snap: &Snapshot<'_>) -> Result<ReconcileOutcome> {
    r.reconcile(&snap.input(false)).await
}

pub async fn on_upgrade(r: &Reconciler<'_>, snap: &Snapshot<'_>) -> Result<ReconcileOutcome> {
    r.reconcile(&snap.input(false)).await
}

pub async fn on_relation_changed(r: &Reconciler<'_>, snap: &Snapshot<'_>) -> Result<ReconcileOutcome> {
    r.reconcile(&snap.input(false)).await
}

pub async fn on_certificate_changed(r: &Reconciler<'_>, snap: &Snapshot<'_>) -> Result<ReconcileOutcome> {
    r.reconcile(&snap.input(true)).await
}

pub async fn on_ingress_ready(
    r: &Reconciler<'_>,
    snap: &Snapshot<'_>,
    url: &str,
) -> Result<ReconcileOutcome> {
    tracing::info!("This app's ingress URL: {url}");
    r.reconcile(&snap.input(true)).await
}

pub async fn on_ingress_revoked(r: &Reconciler<'_>, snap: &Snapshot<'_>) -> Result<ReconcileOutcome> {
    tracing::info!("This app no longer has ingress");
    r.reconcile(&snap.input(true)).await
}

/// Route a trigger to its handler
pub async fn dispatch(
    trigger: &Trigger,
    r: &Reconciler<'_>,
    snap: &Snapshot<'_>,
) -> Result<ReconcileOutcome> {
    tracing::debug!("Handling {} for {}", trigger.name(), r.flavor().service_name());
    match trigger {
        Trigger::WorkloadReady => on_workload_ready(r, snap).await,
        Trigger::ConfigChanged => on_config_changed(r, snap).await,
        Trigger::Upgrade => on_upgrade(r, snap).await,
        Trigger::RelationChanged => on_relation_changed(r, snap).await,
        Trigger::CertificateChanged => on_certificate_changed(r, snap).await,
        Trigger::IngressReady(url) => on_ingress_ready(r, snap, url).await,
        Trigger::IngressRevoked => on_ingress_revoked(r, snap).await,
    }
}
