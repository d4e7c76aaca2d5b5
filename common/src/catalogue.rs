use crate::{
    Result,
    model::{CertificateMaterial, CharmConfig, StatusReport, TlsState},
};
use k8s_openapi::api::core::v1::Secret;
use kube::{Client, CustomResource, ResourceExt, api::Api};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describe a catalogue of applications served by nginx, optionally over TLS
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    kind = "Catalogue",
    status = "CatalogueStatus",
    shortname = "cat",
    group = "charms.catalogue.dev",
    version = "v1",
    namespaced
)]
#[kube(
    doc = "Custom resource representing a catalogue of applications",
    printcolumn = r#"
    {"name":"workload", "type":"string", "description":"Workload deployment", "jsonPath":".spec.workload"},
    {"name":"url", "type":"string", "description":"Internal URL", "jsonPath":".status.internalUrl"},
    {"name":"status", "type":"string", "description":"Application status", "jsonPath":".status.app.name"},
    {"name":"message", "type":"string", "description":"Message", "jsonPath":".status.app.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueSpec {
    /// Deployment running nginx
    pub workload: String,
    /// Container to configure, defaults to the workload name
    pub container: Option<String>,
    /// Catalogue configuration
    #[serde(default)]
    pub config: CharmConfig,
    /// Secret of type kubernetes.io/tls holding tls.crt, tls.key and ca.crt
    pub tls_secret: Option<String>,
    /// URL an ingress exposes the catalogue on
    pub ingress_url: Option<String>,
}

/// The status object of `Catalogue`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueStatus {
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
    /// Resource version of the TLS secret last pushed
    pub cert_version: Option<String>,
    /// Ingress URL handled by the last successful pass
    pub ingress_url: Option<String>,
    /// In-cluster URL of the catalogue
    pub internal_url: Option<String>,
}

pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_KEY_KEY: &str = "tls.key";
pub const TLS_CA_KEY: &str = "ca.crt";

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(v) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return String::from_utf8(v.0.clone()).ok();
    }
    secret.string_data.as_ref().and_then(|d| d.get(key)).cloned()
}

pub fn material_from_secret(secret: &Secret) -> CertificateMaterial {
    CertificateMaterial {
        cert: secret_value(secret, TLS_CERT_KEY),
        key: secret_value(secret, TLS_KEY_KEY),
        ca: secret_value(secret, TLS_CA_KEY),
    }
}

/// URL other workloads of the cluster reach the catalogue with
pub fn internal_url(host: &str, tls: bool) -> String {
    if tls {
        format!("https://{host}:443")
    } else {
        format!("http://{host}:80")
    }
}

impl Catalogue {
    pub fn container_name(&self) -> &str {
        self.spec.container.as_deref().unwrap_or(&self.spec.workload)
    }

    pub fn service_host(&self) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            self.spec.workload,
            self.namespace().unwrap_or_default()
        )
    }

    /// TLS state along with the secret version it was read from
    pub async fn tls_state(&self, client: Client) -> Result<(TlsState, Option<String>)> {
        let Some(name) = self.spec.tls_secret.as_deref() else {
            return Ok((TlsState::Disabled, None));
        };
        let api: Api<Secret> = Api::namespaced(client, &self.namespace().unwrap_or_default());
        match api.get_opt(name).await? {
            Some(secret) => Ok((
                TlsState::Requested(material_from_secret(&secret)),
                secret.resource_version(),
            )),
            None => {
                tracing::debug!("TLS secret {name} not found");
                Ok((TlsState::Requested(CertificateMaterial::default()), None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;

    #[test]
    fn test_internal_url() {
        assert_eq!(internal_url("cat.ns.svc.cluster.local", true), "https://cat.ns.svc.cluster.local:443");
        assert_eq!(internal_url("cat.ns.svc.cluster.local", false), "http://cat.ns.svc.cluster.local:80");
    }

    #[test]
    fn test_material_from_secret() {
        let mut data = BTreeMap::new();
        data.insert(TLS_CERT_KEY.to_string(), ByteString(b"cert".to_vec()));
        data.insert(TLS_KEY_KEY.to_string(), ByteString(b"key".to_vec()));
        let secret = Secret {
            data: Some(data),
            ..Default::default()
        };
        let m = material_from_secret(&secret);
        assert_eq!(m.cert.as_deref(), Some("cert"));
        assert_eq!(m.missing(), vec!["CA"]);
    }

    #[test]
    fn test_service_host() {
        let mut cat = Catalogue::new("cat", CatalogueSpec {
            workload: "nginx".to_string(),
            container: None,
            config: CharmConfig::default(),
            tls_secret: None,
            ingress_url: None,
        });
        cat.metadata.namespace = Some("obs".to_string());
        assert_eq!(cat.service_host(), "nginx.obs.svc.cluster.local");
        assert_eq!(cat.container_name(), "nginx");
    }
}
