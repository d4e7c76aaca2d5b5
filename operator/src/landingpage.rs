use crate::{
    Error, LandingPage, Result,
    manager::Context,
    metrics::ReconcileMetrics,
    observe::Observed,
    operand::{Operand, run_pass},
};
use async_trait::async_trait;
use common::{CharmConfig, Flavor};
use kube::{ResourceExt, runtime::controller::Action};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{instrument, warn};

#[async_trait]
impl Operand for LandingPage {
    fn flavor() -> Flavor {
        Flavor::LandingPage
    }

    fn metrics(ctx: &Context) -> &ReconcileMetrics {
        &ctx.metrics.landing_page
    }

    fn workload(&self) -> &str {
        &self.spec.workload
    }

    fn container(&self) -> &str {
        self.container_name()
    }

    fn config(&self) -> &CharmConfig {
        &self.spec.config
    }

    fn last_observed(&self) -> Observed {
        self.status
            .as_ref()
            .map(|s| Observed {
                generation: s.observed_generation,
                workload_ready: s.workload_ready.unwrap_or(false),
                cert_version: None,
                ingress_url: None,
                version: s.operator_version.clone(),
            })
            .unwrap_or_default()
    }
}

#[instrument(skip(ctx, page), fields(name = %page.name_any()))]
pub async fn reconcile(page: Arc<LandingPage>, ctx: Arc<Context>) -> Result<Action> {
    run_pass(page, ctx).await
}

#[must_use]
pub fn error_policy(page: Arc<LandingPage>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        "reconcile failed for LandingPage '{:?}.{:?}': {:?}",
        page.metadata.namespace, page.metadata.name, error
    );
    ctx.metrics.landing_page.reconcile_failure(&page.name_any(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}
