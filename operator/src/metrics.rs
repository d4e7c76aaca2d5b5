use crate::{Error, Result};
use common::triggers::Trigger;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Metrics {
    pub landing_page: ReconcileMetrics,
    pub catalogue: ReconcileMetrics,
    pub registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        let mut registry = Registry::default();
        let landing_page =
            ReconcileMetrics::default().register(registry.sub_registry_with_prefix("landing_page_reconcile"));
        let catalogue =
            ReconcileMetrics::default().register(registry.sub_registry_with_prefix("catalogue_reconcile"));
        Self {
            landing_page,
            catalogue,
            registry: Arc::new(registry),
        }
    }
}

impl Metrics {
    /// OpenMetrics text exposition of every registered metric
    pub fn encode(&self) -> Result<String> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)
            .map_err(|e| Error::Other(format!("metrics encoding failed: {e}")))?;
        Ok(buffer)
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub instance: String,
    pub error: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TriggerLabels {
    pub trigger: String,
}

#[derive(Clone)]
pub struct ReconcileMetrics {
    pub runs: Counter,
    pub failures: Family<ErrorLabels, Counter>,
    pub triggers: Family<TriggerLabels, Counter>,
    pub duration: Histogram,
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self {
            runs: Counter::default(),
            failures: Family::<ErrorLabels, Counter>::default(),
            triggers: Family::<TriggerLabels, Counter>::default(),
            duration: Histogram::new([0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.].into_iter()),
        }
    }
}

impl ReconcileMetrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, r: &mut Registry) -> Self {
        r.register_with_unit("duration", "reconcile duration", Unit::Seconds, self.duration.clone());
        r.register("failures", "reconciliation errors", self.failures.clone());
        r.register("triggers", "handled triggers", self.triggers.clone());
        r.register("runs", "reconciliations", self.runs.clone());
        self
    }

    pub fn reconcile_failure(&self, instance: &str, e: &Error) {
        self.failures
            .get_or_create(&ErrorLabels {
                instance: instance.to_string(),
                error: e.metric_label(),
            })
            .inc();
    }

    pub fn trigger(&self, trigger: &Trigger) {
        self.triggers
            .get_or_create(&TriggerLabels {
                trigger: trigger.name().to_string(),
            })
            .inc();
    }

    pub fn count_and_measure(&self) -> ReconcileMeasurer {
        self.runs.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.duration.clone(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: Histogram,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_counts_runs_and_triggers() {
        let metrics = Metrics::default();
        drop(metrics.catalogue.count_and_measure());
        metrics.catalogue.trigger(&Trigger::CertificateChanged);
        metrics
            .landing_page
            .reconcile_failure("home", &Error::Other("boom".to_string()));
        let text = metrics.encode().unwrap();
        assert!(text.contains("catalogue_reconcile_runs_total 1"));
        assert!(text.contains("trigger=\"certificate-changed\""));
        assert!(text.contains("instance=\"home\""));
    }
}
