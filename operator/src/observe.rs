//! Works out which lifecycle trigger a pass stands for, by comparing what the
//! last successful pass recorded in the status with what is observed now.
use common::{Status, triggers::Trigger};
use serde_json::{Value, json};

#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub struct Observed {
    pub generation: Option<i64>,
    pub workload_ready: bool,
    pub cert_version: Option<String>,
    pub ingress_url: Option<String>,
    pub version: Option<String>,
}

pub fn detect_trigger(previous: &Observed, current: &Observed) -> Trigger {
    if current.workload_ready && !previous.workload_ready {
        Trigger::WorkloadReady
    } else if previous.version.is_some() && previous.version != current.version {
        Trigger::Upgrade
    } else if previous.cert_version != current.cert_version {
        Trigger::CertificateChanged
    } else if previous.ingress_url != current.ingress_url {
        match &current.ingress_url {
            Some(url) => Trigger::IngressReady(url.clone()),
            None => Trigger::IngressRevoked,
        }
    } else if previous.generation != current.generation {
        Trigger::ConfigChanged
    } else {
        Trigger::RelationChanged
    }
}

/// Status fields to record once a pass is over.
///
/// Only an active pass records what it handled, so that a failed one is
/// retried as the same trigger.
pub fn status_patch(
    observed: &Observed,
    status: &Status,
    apps: usize,
    internal_url: Option<String>,
    with_tls: bool,
) -> Value {
    if !status.is_active() {
        return json!({ "workloadReady": observed.workload_ready });
    }
    let mut patch = json!({
        "observedGeneration": observed.generation,
        "workloadReady": observed.workload_ready,
        "apps": apps,
        "operatorVersion": observed.version,
    });
    if with_tls {
        patch["certVersion"] = json!(observed.cert_version);
        patch["ingressUrl"] = json!(observed.ingress_url);
        patch["internalUrl"] = json!(internal_url);
    }
    patch
}
