//! Computes the desired workload artifacts and applies only what differs.
//!
//! Each pass reads the deployed state back from the workload, nothing is
//! remembered between passes. Errors never leave this module as errors:
//! they become the reported status, and the next trigger tries again.
use crate::{
    Error, Result,
    layer::ServiceLayer,
    model::{CatalogueEntry, CharmConfig, Flavor, RenderedConfig, Status, TlsState},
    nginx::{CA_CERT_PATH, CERT_PATH, KEY_PATH, NGINX_CONFIG_PATH, NginxConfigBuilder},
    workload::{StatusSink, Workload},
};
use serde_json::Value;

pub const CONFIG_PATH: &str = "/web/config.json";
pub const WAITING_FOR_WORKLOAD: &str = "Waiting for workload to be reachable";

pub struct ReconcileInput<'a> {
    pub entries: &'a [CatalogueEntry],
    pub config: &'a CharmConfig,
    pub tls: &'a TlsState,
    /// Replace the certificate files even if they look current
    pub push_certs: bool,
}

#[derive(Eq, PartialEq, Clone, Debug)]
pub struct ReconcileOutcome {
    /// Whether anything was written, installed or restarted
    pub applied: bool,
    pub status: Status,
}

pub struct Reconciler<'a> {
    flavor: Flavor,
    workload: &'a dyn Workload,
    status: &'a dyn StatusSink,
}

impl<'a> Reconciler<'a> {
    pub fn new(flavor: Flavor, workload: &'a dyn Workload, status: &'a dyn StatusSink) -> Self {
        Reconciler {
            flavor,
            workload,
            status,
        }
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Run one pass and publish the resulting status.
    ///
    /// Only a failure to publish that status is returned as an error.
    pub async fn reconcile(&self, input: &ReconcileInput<'_>) -> Result<ReconcileOutcome> {
        let mut applied = false;
        let status = match self.apply(input, &mut applied).await {
            Ok(()) => Status::Active,
            Err(e) => self.status_for(&e),
        };
        self.report(&status).await?;
        Ok(ReconcileOutcome { applied, status })
    }

    /// Status a failed pass ends with
    pub fn status_for(&self, error: &Error) -> Status {
        match error {
            Error::NotReady(msg) => {
                tracing::debug!("{} workload not ready, skipping", self.flavor.service_name());
                Status::Waiting(msg.clone())
            }
            e => {
                tracing::warn!("Reconciling {} failed: {e}", self.flavor.service_name());
                Status::Blocked(e.status_message())
            }
        }
    }

    /// Set the unit status, and the application status when leading
    pub async fn report(&self, status: &Status) -> Result<()> {
        self.status.set_unit_status(status).await?;
        if self.status.is_leader() {
            self.status.set_app_status(status).await?;
        }
        Ok(())
    }

    async fn apply(&self, input: &ReconcileInput<'_>, applied: &mut bool) -> Result<()> {
        if !self.workload.can_connect().await {
            return Err(Error::NotReady(WAITING_FOR_WORKLOAD.to_string()));
        }
        let rendered = input.config.render(input.entries)?;
        let tls = self.tls_enabled(input.tls)?;

        if self.flavor.supports_tls() {
            let missing = tls && !self.workload.exists(CERT_PATH).await.unwrap_or(false);
            if input.push_certs || missing {
                *applied |= self.push_certificates(input.tls).await?;
            }
        }
        if self.flavor.manages_nginx() {
            *applied |= self.sync_nginx(tls).await?;
        }
        *applied |= self.sync_config(&rendered).await?;
        *applied |= self.sync_layer().await?;

        if *applied {
            let service = self.flavor.service_name();
            tracing::info!("Restarting {service}");
            self.workload
                .restart(service)
                .await
                .map_err(|e| Error::RestartError(format!("Failed to restart {service}: {e}")))?;
        }
        Ok(())
    }

    fn tls_enabled(&self, tls: &TlsState) -> Result<bool> {
        if !self.flavor.supports_tls() {
            if tls != &TlsState::Disabled {
                tracing::debug!("{} does not serve TLS, ignoring certificates", self.flavor.service_name());
            }
            return Ok(false);
        }
        match tls.material() {
            None => Ok(false),
            Some(m) if m.is_complete() => Ok(true),
            Some(m) => Err(Error::CertificateError(format!(
                "TLS requested but the {} is missing",
                m.missing().join(", ")
            ))),
        }
    }

    /// Certificates are always replaced, never compared
    async fn push_certificates(&self, tls: &TlsState) -> Result<bool> {
        let mut changed = false;
        match tls.material().filter(|m| m.is_complete()) {
            Some(m) => {
                for (path, content) in [(CERT_PATH, &m.cert), (KEY_PATH, &m.key), (CA_CERT_PATH, &m.ca)] {
                    if self.workload.exists(path).await? {
                        self.workload.remove(path).await?;
                    }
                    self.workload.push(path, content.as_deref().unwrap_or_default()).await?;
                }
                tracing::info!("Pushed TLS certificates");
                changed = true;
            }
            None => {
                for path in [CERT_PATH, KEY_PATH, CA_CERT_PATH] {
                    if self.workload.exists(path).await? {
                        self.workload.remove(path).await?;
                        changed = true;
                    }
                }
                if changed {
                    tracing::info!("Removed stale TLS certificates");
                }
            }
        }
        Ok(changed)
    }

    async fn sync_nginx(&self, tls: bool) -> Result<bool> {
        let desired = NginxConfigBuilder::new(tls).build();
        let current = match self.workload.pull(NGINX_CONFIG_PATH).await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("Cannot read back {NGINX_CONFIG_PATH}: {e}");
                None
            }
        };
        if current.as_deref() == Some(desired.as_str()) {
            return Ok(false);
        }
        tracing::info!("Writing nginx configuration (tls: {tls})");
        self.workload.push(NGINX_CONFIG_PATH, &desired).await?;
        Ok(true)
    }

    async fn sync_config(&self, rendered: &RenderedConfig) -> Result<bool> {
        let desired = rendered.to_value()?;
        let current = match self.workload.pull(CONFIG_PATH).await {
            Ok(Some(text)) => serde_json::from_str::<Value>(&text).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Cannot read back {CONFIG_PATH}: {e}");
                None
            }
        };
        if current.as_ref() == Some(&desired) {
            return Ok(false);
        }
        tracing::info!("Configuring {} application entries", rendered.apps.len());
        self.workload.push(CONFIG_PATH, &rendered.to_json()?).await?;
        Ok(true)
    }

    async fn sync_layer(&self) -> Result<bool> {
        let layer = ServiceLayer::for_flavor(self.flavor);
        let current = self.workload.services().await?;
        if layer.is_installed_in(&current) {
            return Ok(false);
        }
        tracing::info!("Installing {} service layer", self.flavor.service_name());
        self.workload.add_layer(self.flavor.service_name(), &layer).await?;
        Ok(true)
    }
}
