//! Advertise an application to a landing page or a catalogue, the way a
//! related application would over its relation.
use crate::{CatalogueItem, Result};
use clap::Args;
use common::{CatalogueEntry, context::is_leader, get_client_name, relation::publish_item};
use kube::Client;

#[derive(Args, Debug)]
pub struct Parameters {
    /// Namespace of the target
    #[arg(short, long, env = "NAMESPACE", value_name = "NAMESPACE", default_value = "default")]
    pub namespace: String,
    /// LandingPage or Catalogue the application is listed in
    #[arg(short, long, env = "CATALOGUE", value_name = "CATALOGUE")]
    pub catalogue: String,
    /// Name of the CatalogueItem object, defaults to the application name
    #[arg(long, value_name = "ITEM")]
    pub item: Option<String>,
    /// Application name shown on the page
    #[arg(long, env = "APP_NAME", value_name = "APP_NAME")]
    pub name: String,
    #[arg(long, env = "APP_URL", value_name = "APP_URL")]
    pub url: String,
    #[arg(long, env = "APP_ICON", value_name = "APP_ICON")]
    pub icon: String,
    #[arg(long, env = "APP_DESCRIPTION", value_name = "APP_DESCRIPTION", default_value = "")]
    pub description: String,
    /// Lease deciding which replica of the application publishes
    #[arg(long, env = "LEASE_NAME", value_name = "LEASE_NAME")]
    pub lease_name: Option<String>,
    #[arg(long, env = "POD_NAME", value_name = "POD_NAME", default_value = "unknown")]
    pub pod_name: String,
}

impl Parameters {
    fn entry(&self) -> CatalogueEntry {
        CatalogueEntry::new(&self.name, &self.url, &self.icon).with_description(&self.description)
    }

    fn item_name(&self) -> String {
        self.item.clone().unwrap_or_else(|| self.name.to_lowercase().replace(' ', "-"))
    }
}

pub async fn run(args: &Parameters) -> Result<()> {
    let client = Client::try_default().await?;
    let leader = match &args.lease_name {
        Some(lease) => is_leader(client.clone(), &args.namespace, lease, &args.pod_name).await,
        None => true,
    };
    let Some(bag) = publish_item(leader, &args.entry()) else {
        tracing::info!("{} is not the leader, nothing published", args.pod_name);
        return Ok(());
    };
    let item = CatalogueItem::publish(client, &args.namespace, &args.item_name(), &args.catalogue, &bag).await?;
    tracing::info!(
        "{} published {} to {}/{}",
        get_client_name(),
        item.metadata.name.unwrap_or_default(),
        args.namespace,
        args.catalogue
    );
    Ok(())
}
