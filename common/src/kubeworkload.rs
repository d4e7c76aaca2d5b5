//! Kubernetes rendition of the workload and status collaborators.
//!
//! Plain files live in the `<workload>-files` ConfigMap, files under the
//! certificate directory in the `<workload>-certs` Secret. The Deployment
//! carries the installed layer as an annotation, runs its command and mounts
//! both objects back at the paths the files were pushed to.
use crate::{
    Error, Result,
    context::GROUP,
    layer::{Service, ServiceLayer},
    model::{Flavor, Status, StatusReport},
    nginx::{CA_CERT_PATH, CATALOGUE_CERTS_DIR, CERT_PATH, KEY_PATH, NGINX_CONFIG_PATH},
    reconciler::CONFIG_PATH,
    workload::{StatusSink, Workload},
};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::{
    NamespaceResourceScope,
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Secret},
    },
};
use kube::{
    Client,
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::collections::BTreeMap;

const FILES_VOLUME: &str = "operator-files";
const CERTS_VOLUME: &str = "operator-certs";

pub fn layer_annotation() -> String {
    format!("{GROUP}/services")
}

pub fn restart_annotation() -> String {
    format!("{GROUP}/restartedAt")
}

/// ConfigMap and Secret keys cannot hold slashes
pub fn path_key(path: &str) -> String {
    path.trim_start_matches('/').replace('/', "_")
}

pub fn is_cert_path(path: &str) -> bool {
    path.starts_with(CATALOGUE_CERTS_DIR)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Files of the `-files` ConfigMap the workload reads
fn file_paths(flavor: Flavor) -> Vec<&'static str> {
    let mut paths = vec![CONFIG_PATH];
    if flavor.manages_nginx() {
        paths.push(NGINX_CONFIG_PATH);
    }
    paths
}

/// Strategic merge patch installing a layer on the Deployment `name`.
///
/// Besides the command, it mounts each pushed file at its own path and the
/// certificates Secret as the certificate directory. Both volumes are
/// optional so the pod starts before anything was pushed.
pub fn layer_patch(name: &str, container: &str, flavor: Flavor, services: &str, command: &str) -> Value {
    let files = file_paths(flavor);
    let items: Vec<Value> = files
        .iter()
        .map(|p| json!({ "key": path_key(p), "path": path_key(p) }))
        .collect();
    let mut volumes = vec![json!({
        "name": FILES_VOLUME,
        "configMap": { "name": format!("{name}-files"), "optional": true, "items": items },
    })];
    let mut mounts: Vec<Value> = files
        .iter()
        .map(|p| json!({ "name": FILES_VOLUME, "mountPath": p, "subPath": path_key(p) }))
        .collect();
    if flavor.supports_tls() {
        let items: Vec<Value> = [CERT_PATH, KEY_PATH, CA_CERT_PATH]
            .iter()
            .map(|p| json!({ "key": path_key(p), "path": file_name(p) }))
            .collect();
        volumes.push(json!({
            "name": CERTS_VOLUME,
            "secret": { "secretName": format!("{name}-certs"), "optional": true, "items": items },
        }));
        mounts.push(json!({ "name": CERTS_VOLUME, "mountPath": CATALOGUE_CERTS_DIR, "readOnly": true }));
    }
    json!({
        "metadata": { "annotations": { layer_annotation(): services } },
        "spec": { "template": { "spec": {
            "containers": [{
                "name": container,
                "command": ["/bin/sh", "-c", command],
                "volumeMounts": mounts,
            }],
            "volumes": volumes,
        }}}
    })
}

fn stored_report(value: Option<&Value>) -> Option<StatusReport> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Status patch for `unit`, `None` when the stored report already says the same
pub fn unit_status_patch(current: &Value, unit: &str, status: &Status) -> Option<Value> {
    let previous = stored_report(current.get("units").and_then(|u| u.get(unit)));
    StatusReport::updated(previous.as_ref(), status).map(|r| json!({ "units": { unit: r } }))
}

/// Status patch for the application, `None` when it already says the same
pub fn app_status_patch(current: &Value, status: &Status) -> Option<Value> {
    let previous = stored_report(current.get("app"));
    StatusReport::updated(previous.as_ref(), status).map(|r| json!({ "app": r }))
}

#[derive(Clone)]
pub struct KubeWorkload {
    deployments: Api<Deployment>,
    configmaps: Api<ConfigMap>,
    secrets: Api<Secret>,
    name: String,
    container: String,
    flavor: Flavor,
}

impl KubeWorkload {
    #[must_use]
    pub fn new(client: Client, namespace: &str, name: &str, container: &str, flavor: Flavor) -> Self {
        KubeWorkload {
            deployments: Api::namespaced(client.clone(), namespace),
            configmaps: Api::namespaced(client.clone(), namespace),
            secrets: Api::namespaced(client, namespace),
            name: name.to_string(),
            container: container.to_string(),
            flavor,
        }
    }

    fn files_name(&self) -> String {
        format!("{}-files", self.name)
    }

    fn certs_name(&self) -> String {
        format!("{}-certs", self.name)
    }

    async fn push_file(&self, key: &str, content: &str) -> Result<()> {
        let name = self.files_name();
        if self.configmaps.get_opt(&name).await?.is_none() {
            let cm = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(key.to_string(), content.to_string())])),
                ..Default::default()
            };
            self.configmaps.create(&PostParams::default(), &cm).await?;
            return Ok(());
        }
        let patch = Patch::Merge(json!({ "data": { key: content } }));
        self.configmaps.patch(&name, &PatchParams::default(), &patch).await?;
        Ok(())
    }

    async fn push_cert(&self, key: &str, content: &str) -> Result<()> {
        let name = self.certs_name();
        if self.secrets.get_opt(&name).await?.is_none() {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(name),
                    ..Default::default()
                },
                string_data: Some(BTreeMap::from([(key.to_string(), content.to_string())])),
                ..Default::default()
            };
            self.secrets.create(&PostParams::default(), &secret).await?;
            return Ok(());
        }
        let patch = Patch::Merge(json!({ "stringData": { key: content } }));
        self.secrets.patch(&name, &PatchParams::default(), &patch).await?;
        Ok(())
    }
}

#[async_trait]
impl Workload for KubeWorkload {
    async fn can_connect(&self) -> bool {
        match self.deployments.get_opt(&self.name).await {
            Ok(Some(d)) => d.status.and_then(|s| s.ready_replicas).unwrap_or(0) > 0,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Cannot reach workload {}: {e}", self.name);
                false
            }
        }
    }

    async fn pull(&self, path: &str) -> Result<Option<String>> {
        let key = path_key(path);
        if is_cert_path(path) {
            let secret = self.secrets.get_opt(&self.certs_name()).await?;
            match secret.and_then(|s| s.data).and_then(|mut d| d.remove(&key)) {
                Some(bytes) => Ok(Some(String::from_utf8(bytes.0)?)),
                None => Ok(None),
            }
        } else {
            let cm = self.configmaps.get_opt(&self.files_name()).await?;
            Ok(cm.and_then(|c| c.data).and_then(|mut d| d.remove(&key)))
        }
    }

    async fn push(&self, path: &str, content: &str) -> Result<()> {
        let key = path_key(path);
        if is_cert_path(path) {
            self.push_cert(&key, content).await
        } else {
            self.push_file(&key, content).await
        }
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let key = path_key(path);
        let patch = Patch::Merge(json!({ "data": { key: null } }));
        if is_cert_path(path) {
            self.secrets.patch(&self.certs_name(), &PatchParams::default(), &patch).await?;
        } else {
            self.configmaps.patch(&self.files_name(), &PatchParams::default(), &patch).await?;
        }
        Ok(())
    }

    async fn services(&self) -> Result<BTreeMap<String, Service>> {
        let Some(deploy) = self.deployments.get_opt(&self.name).await? else {
            return Err(Error::WorkloadError(format!("deployment {} not found", self.name)));
        };
        match deploy.metadata.annotations.and_then(|mut a| a.remove(&layer_annotation())) {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn add_layer(&self, label: &str, layer: &ServiceLayer) -> Result<()> {
        let mut services = self.services().await?;
        for (name, svc) in &layer.services {
            services.insert(name.clone(), svc.clone());
        }
        let Some(svc) = layer.services.values().next() else {
            return Err(Error::WorkloadError(format!("layer {label} has no service")));
        };
        let mut patch = layer_patch(
            &self.name,
            &self.container,
            self.flavor,
            &serde_json::to_string(&services)?,
            &svc.command,
        );
        if svc.startup == "enabled" {
            let scaled_down = self
                .deployments
                .get_opt(&self.name)
                .await?
                .and_then(|d| d.spec)
                .and_then(|s| s.replicas)
                == Some(0);
            if scaled_down {
                patch["spec"]["replicas"] = json!(1);
            }
        }
        tracing::debug!("Installing layer {label} on {}", self.name);
        self.deployments
            .patch(&self.name, &PatchParams::default(), &Patch::Strategic(patch))
            .await?;
        Ok(())
    }

    async fn restart(&self, service: &str) -> Result<()> {
        let patch = json!({
            "spec": { "template": { "metadata": { "annotations": {
                restart_annotation(): Utc::now().to_rfc3339(),
            }}}}
        });
        tracing::debug!("Restarting {service} in {}", self.name);
        self.deployments
            .patch(&self.name, &PatchParams::default(), &Patch::Strategic(patch))
            .await?;
        Ok(())
    }
}

/// Writes unit and application status into the custom resource status
pub struct KubeStatus<K> {
    api: Api<K>,
    name: String,
    unit: String,
    leader: bool,
}

impl<K> KubeStatus<K>
where
    K: kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + DeserializeOwned
        + Serialize,
{
    #[must_use]
    pub fn new(client: Client, namespace: &str, name: &str, unit: &str, leader: bool) -> Self {
        KubeStatus {
            api: Api::namespaced(client, namespace),
            name: name.to_string(),
            unit: unit.to_string(),
            leader,
        }
    }

    /// Status currently stored in the resource, `Null` when there is none
    async fn current(&self) -> Result<Value> {
        let obj = self.api.get_status(&self.name).await?;
        Ok(serde_json::to_value(&obj)?.get("status").cloned().unwrap_or(Value::Null))
    }

    async fn patch_status(&self, patch: Option<Value>) -> Result<()> {
        let Some(patch) = patch else {
            return Ok(());
        };
        self.api
            .patch_status(&self.name, &PatchParams::default(), &Patch::Merge(json!({ "status": patch })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<K> StatusSink for KubeStatus<K>
where
    K: kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync,
{
    fn is_leader(&self) -> bool {
        self.leader
    }

    async fn set_unit_status(&self, status: &Status) -> Result<()> {
        let current = self.current().await?;
        self.patch_status(unit_status_patch(&current, &self.unit, status)).await
    }

    async fn set_app_status(&self, status: &Status) -> Result<()> {
        let current = self.current().await?;
        self.patch_status(app_status_patch(&current, status)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_key() {
        assert_eq!(path_key("/web/config.json"), "web_config.json");
        assert_eq!(path_key(NGINX_CONFIG_PATH), "etc_nginx_nginx.conf");
        assert_eq!(path_key(CA_CERT_PATH), "etc_catalogue_certs_ca.cert");
    }

    #[test]
    fn test_is_cert_path() {
        assert!(is_cert_path(CA_CERT_PATH));
        assert!(!is_cert_path("/web/config.json"));
    }

    fn mount<'a>(mounts: &'a Value, path: &str) -> Option<&'a Value> {
        mounts.as_array()?.iter().find(|m| m["mountPath"] == path)
    }

    #[test]
    fn test_layer_patch_mounts_catalogue_files() {
        let patch = layer_patch("catalogue", "nginx", Flavor::Catalogue, "{}", "nginx");
        let pod = &patch["spec"]["template"]["spec"];
        let container = &pod["containers"][0];
        assert_eq!(container["name"], "nginx");
        assert_eq!(container["command"], json!(["/bin/sh", "-c", "nginx"]));

        let mounts = &container["volumeMounts"];
        let nginx = mount(mounts, NGINX_CONFIG_PATH).unwrap();
        assert_eq!(nginx["subPath"], "etc_nginx_nginx.conf");
        assert_eq!(mount(mounts, CONFIG_PATH).unwrap()["subPath"], "web_config.json");
        assert_eq!(mount(mounts, CATALOGUE_CERTS_DIR).unwrap()["name"], CERTS_VOLUME);

        let files = &pod["volumes"][0];
        assert_eq!(files["configMap"]["name"], "catalogue-files");
        assert_eq!(files["configMap"]["optional"], true);
        assert_eq!(files["configMap"]["items"].as_array().unwrap().len(), 2);
        let certs = &pod["volumes"][1]["secret"];
        assert_eq!(certs["secretName"], "catalogue-certs");
        assert_eq!(
            certs["items"][0],
            json!({ "key": "etc_catalogue_certs_catalogue.cert.pem", "path": "catalogue.cert.pem" })
        );
        assert_eq!(certs["items"][2]["path"], "ca.cert");
        assert_eq!(patch["metadata"]["annotations"][layer_annotation()], "{}");
    }

    #[test]
    fn test_layer_patch_landing_page_has_no_nginx_or_certs() {
        let patch = layer_patch("landing", "landing", Flavor::LandingPage, "{}", "python3 -m http.server 80");
        let pod = &patch["spec"]["template"]["spec"];
        let mounts = &pod["containers"][0]["volumeMounts"];
        assert!(mount(mounts, CONFIG_PATH).is_some());
        assert!(mount(mounts, NGINX_CONFIG_PATH).is_none());
        assert!(mount(mounts, CATALOGUE_CERTS_DIR).is_none());
        assert_eq!(pod["volumes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_identical_status_is_written_once() {
        let mut stored = json!({});
        let first = unit_status_patch(&stored, "operator-0", &Status::Active).unwrap();
        stored["units"] = first["units"].clone();
        assert_eq!(unit_status_patch(&stored, "operator-0", &Status::Active), None);
        assert!(unit_status_patch(&stored, "operator-1", &Status::Active).is_some());

        let blocked = Status::Blocked("boom".to_string());
        assert!(unit_status_patch(&stored, "operator-0", &blocked).is_some());

        let app = app_status_patch(&Value::Null, &blocked).unwrap();
        assert_eq!(app_status_patch(&app, &blocked), None);
        assert_eq!(app["app"]["message"], "boom");
    }
}
