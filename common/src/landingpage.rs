use crate::model::{CharmConfig, StatusReport};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describe a landing page listing the applications related to it
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    kind = "LandingPage",
    status = "LandingPageStatus",
    shortname = "lp",
    group = "charms.catalogue.dev",
    version = "v1",
    namespaced
)]
#[kube(
    doc = "Custom resource representing a landing page served by a python http server",
    printcolumn = r#"
    {"name":"workload", "type":"string", "description":"Workload deployment", "jsonPath":".spec.workload"},
    {"name":"status", "type":"string", "description":"Application status", "jsonPath":".status.app.name"},
    {"name":"message", "type":"string", "description":"Message", "jsonPath":".status.app.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LandingPageSpec {
    /// Deployment serving the page
    pub workload: String,
    /// Container to configure, defaults to the workload name
    pub container: Option<String>,
    /// Page configuration
    #[serde(default)]
    pub config: CharmConfig,
}

/// The status object of `LandingPage`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LandingPageStatus {
    /// Status reported by each operator replica
    #[serde(default)]
    pub units: BTreeMap<String, StatusReport>,
    /// Status reported by the leader
    pub app: Option<StatusReport>,
    /// Generation handled by the last successful pass
    pub observed_generation: Option<i64>,
    /// Whether the workload was reachable during the last pass
    pub workload_ready: Option<bool>,
    /// Number of applications listed
    pub apps: Option<u32>,
    /// Operator version of the last successful pass
    pub operator_version: Option<String>,
}

impl LandingPage {
    pub fn container_name(&self) -> &str {
        self.spec.container.as_deref().unwrap_or(&self.spec.workload)
    }
}
