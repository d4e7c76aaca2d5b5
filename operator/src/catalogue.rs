use crate::{
    Catalogue, Error, Result,
    manager::Context,
    metrics::ReconcileMetrics,
    observe::Observed,
    operand::{Operand, run_pass},
};
use async_trait::async_trait;
use common::{CharmConfig, Flavor, TlsState, catalogue::internal_url};
use kube::{Client, ResourceExt, runtime::controller::Action};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{instrument, warn};

#[async_trait]
impl Operand for Catalogue {
    fn flavor() -> Flavor {
        Flavor::Catalogue
    }

    fn metrics(ctx: &Context) -> &ReconcileMetrics {
        &ctx.metrics.catalogue
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
                cert_version: s.cert_version.clone(),
                ingress_url: s.ingress_url.clone(),
                version: s.operator_version.clone(),
            })
            .unwrap_or_default()
    }

    async fn tls(&self, client: Client) -> Result<(TlsState, Option<String>)> {
        self.tls_state(client).await
    }

    fn ingress_url(&self) -> Option<String> {
        self.spec.ingress_url.clone()
    }

    fn internal_url(&self, tls: bool) -> Option<String> {
        Some(internal_url(&self.service_host(), tls))
    }
}

#[instrument(skip(ctx, cat), fields(name = %cat.name_any()))]
pub async fn reconcile(cat: Arc<Catalogue>, ctx: Arc<Context>) -> Result<Action> {
    run_pass(cat, ctx).await
}

#[must_use]
pub fn error_policy(cat: Arc<Catalogue>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        "reconcile failed for Catalogue '{:?}.{:?}': {:?}",
        cat.metadata.namespace, cat.metadata.name, error
    );
    ctx.metrics.catalogue.reconcile_failure(&cat.name_any(), error);
    Action::requeue(Duration::from_secs(5 * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::catalogue::{CatalogueSpec, CatalogueStatus};

    fn catalogue() -> Catalogue {
        let mut cat = Catalogue::new("catalogue", CatalogueSpec {
            workload: "catalogue".to_string(),
            container: None,
            config: CharmConfig::default(),
            tls_secret: Some("catalogue-tls".to_string()),
            ingress_url: Some("https://testingress.com".to_string()),
        });
        cat.metadata.namespace = Some("cos".to_string());
        cat
    }

    #[test]
    fn test_internal_url_follows_tls() {
        let cat = catalogue();
        let https = cat.internal_url(true).unwrap();
        assert!(https.starts_with("https://"));
        assert!(https.ends_with(":443"));
        let http = cat.internal_url(false).unwrap();
        assert_eq!(http, "http://catalogue.cos.svc.cluster.local:80");
    }

    #[test]
    fn test_last_observed_carries_tls_and_ingress() {
        let mut cat = catalogue();
        cat.status = Some(CatalogueStatus {
            cert_version: Some("12".to_string()),
            ingress_url: Some("https://old.example".to_string()),
            ..Default::default()
        });
        let observed = cat.last_observed();
        assert_eq!(observed.cert_version.as_deref(), Some("12"));
        assert_eq!(observed.ingress_url.as_deref(), Some("https://old.example"));
        assert!(!observed.workload_ready);
        assert_eq!(cat.ingress_url().as_deref(), Some("https://testingress.com"));
    }
}
