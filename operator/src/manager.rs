use crate::{Catalogue, CatalogueItem, Error, LandingPage, Metrics, Result, catalogue, landingpage};
use chrono::{DateTime, Utc};
use common::context::{LEASE_DURATION_SECONDS, acquire_lease};
use futures::{FutureExt, StreamExt, future::BoxFuture};
use kube::{
    Resource, ResourceExt,
    api::{Api, ListParams},
    client::Client,
    runtime::{controller::Controller, reflector::ObjectRef, watcher::Config},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
    /// Name of this replica
    pub identity: String,
    /// Lease deciding which replica is the leader
    pub lease_name: String,
    /// Delay before an active object is checked again
    pub requeue: Duration,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    pub reporter: String,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "catalogue-controller".into(),
        }
    }
}

/// Settings the controllers are started with
#[derive(Clone, Debug)]
pub struct Settings {
    pub identity: String,
    pub lease_name: String,
    pub requeue: Duration,
}

/// Data owned by the Manager
#[derive(Clone, Default)]
pub struct Manager {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    metrics: Metrics,
}

/// Route an item to the object it is listed in
fn item_target<K>(item: &CatalogueItem) -> Option<ObjectRef<K>>
where
    K: Resource<DynamicType = ()>,
{
    Some(ObjectRef::new(&item.spec.catalogue).within(&item.namespace()?))
}

/// Keep trying to hold the lease, renewing it while this replica leads
async fn elect(client: Client, lease: String, identity: String) {
    let namespace = client.default_namespace().to_string();
    let period = Duration::from_secs((LEASE_DURATION_SECONDS / 3).unsigned_abs().into());
    let mut leading = false;
    loop {
        let now_leading = match acquire_lease(client.clone(), &namespace, &lease, &identity).await {
            Ok(held) => held,
            Err(e) => {
                tracing::warn!("Election round for {namespace}/{lease} failed: {e}");
                false
            }
        };
        if now_leading != leading {
            if now_leading {
                tracing::info!("{identity} is now the leader");
            } else {
                tracing::info!("{identity} is no longer the leader");
            }
            leading = now_leading;
        }
        tokio::time::sleep(period).await;
    }
}

async fn ensure_crd<K>(api: &Api<K>) -> Result<()>
where
    K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    api.list(&ListParams::default().limit(1)).await.map_err(|e| {
        tracing::error!("is the crd installed? please run: cargo run --bin crdgen | kubectl apply -f -");
        Error::KubeError(e)
    })?;
    Ok(())
}

/// Manager that owns a Controller for LandingPage and Catalogue
impl Manager {
    /// Lifecycle initialization interface for app
    ///
    /// This returns a `Manager` that drives two `Controller`s, one future each,
    /// plus the leader election loop. It is up to `main` to wait for them.
    pub async fn new(
        settings: Settings,
    ) -> Result<(Self, BoxFuture<'static, ()>, BoxFuture<'static, ()>, BoxFuture<'static, ()>)> {
        let client = Client::try_default().await?;
        let manager = Manager::default();
        let election = elect(client.clone(), settings.lease_name.clone(), settings.identity.clone()).boxed();
        let context = Arc::new(Context {
            client: client.clone(),
            metrics: manager.metrics.clone(),
            diagnostics: manager.diagnostics.clone(),
            identity: settings.identity,
            lease_name: settings.lease_name,
            requeue: settings.requeue,
        });

        let pages = Api::<LandingPage>::all(client.clone());
        let catalogues = Api::<Catalogue>::all(client.clone());
        let items = Api::<CatalogueItem>::all(client);
        // Ensure CRD is installed before loop-watching
        ensure_crd(&pages).await?;
        ensure_crd(&catalogues).await?;
        ensure_crd(&items).await?;

        let controller_pages = Controller::new(pages, Config::default().any_semantic())
            .watches(items.clone(), Config::default(), |item| item_target::<LandingPage>(&item))
            .shutdown_on_signal()
            .run(landingpage::reconcile, landingpage::error_policy, context.clone())
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        let controller_catalogues = Controller::new(catalogues, Config::default().any_semantic())
            .watches(items, Config::default(), |item| item_target::<Catalogue>(&item))
            .shutdown_on_signal()
            .run(catalogue::reconcile, catalogue::error_policy, context)
            .filter_map(|x| async move { std::result::Result::ok(x) })
            .for_each(|_| futures::future::ready(()))
            .boxed();

        Ok((manager, controller_pages, controller_catalogues, election))
    }

    /// Metrics getter
    pub fn metrics(&self) -> Result<String> {
        self.metrics.encode()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }
}
