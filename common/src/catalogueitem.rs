use crate::{
    Error, Result,
    context::{GROUP, get_client_name},
    model::CatalogueEntry,
    relation::{DataBag, entries_from_bags},
};
use kube::{
    Client, CustomResource, ResourceExt,
    api::{Api, ListParams, Patch, PatchParams},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Relation data published by an application that wants to be listed
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    kind = "CatalogueItem",
    shortname = "ci",
    group = "charms.catalogue.dev",
    version = "v1",
    namespaced
)]
#[kube(
    doc = "Custom resource representing an application listed in a catalogue or a landing page",
    printcolumn = r#"
    {"name":"catalogue", "type":"string", "description":"Target catalogue", "jsonPath":".spec.catalogue"},
    {"name":"url", "type":"string", "description":"Application URL", "jsonPath":".spec.data.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueItemSpec {
    /// Name of the Catalogue or LandingPage listing this item
    pub catalogue: String,
    /// name, url, icon and description of the application
    pub data: DataBag,
}

/// Keep the items aimed at `target`, oldest first
pub fn order_items(items: impl IntoIterator<Item = CatalogueItem>, target: &str) -> Vec<CatalogueItem> {
    let mut items: Vec<CatalogueItem> = items.into_iter().filter(|i| i.spec.catalogue == target).collect();
    items.sort_by_key(|i| (i.metadata.creation_timestamp.clone().map(|t| t.0), i.name_any()));
    items
}

impl CatalogueItem {
    /// Entries currently published for `target`
    pub async fn entries_for(client: Client, namespace: &str, target: &str) -> Result<Vec<CatalogueEntry>> {
        let api = Api::<Self>::namespaced(client, namespace);
        let list = api.list(&ListParams::default()).await.map_err(Error::KubeError)?;
        let items = order_items(list.items, target);
        Ok(entries_from_bags(items.iter().map(|i| &i.spec.data)))
    }

    /// Create or replace the item `name` with the given bag
    pub async fn publish(client: Client, namespace: &str, name: &str, target: &str, bag: &DataBag) -> Result<Self> {
        let api = Api::<Self>::namespaced(client, namespace);
        let item = json!({
            "apiVersion": format!("{GROUP}/v1"),
            "kind": "CatalogueItem",
            "metadata": { "name": name },
            "spec": {
                "catalogue": target,
                "data": bag,
            }
        });
        api.patch(name, &PatchParams::apply(&get_client_name()).force(), &Patch::Apply(item))
            .await
            .map_err(Error::KubeError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn item(name: &str, target: &str, created: i64) -> CatalogueItem {
        let mut data = DataBag::new();
        data.insert("name".to_string(), name.to_string());
        data.insert("url".to_string(), format!("http://{name}"));
        data.insert("icon".to_string(), "box".to_string());
        let mut i = CatalogueItem::new(name, CatalogueItemSpec {
            catalogue: target.to_string(),
            data,
        });
        i.metadata.creation_timestamp = Some(Time(Utc.timestamp_opt(created, 0).unwrap()));
        i
    }

    #[test]
    fn test_order_items() {
        let items = vec![
            item("late", "cat", 300),
            item("other", "landing", 100),
            item("b-early", "cat", 100),
            item("a-early", "cat", 100),
        ];
        let names: Vec<String> = order_items(items, "cat").iter().map(|i| i.name_any()).collect();
        assert_eq!(names, vec!["a-early", "b-early", "late"]);
    }

    #[test]
    fn test_ordered_items_to_entries() {
        let items = order_items(vec![item("z", "cat", 1), item("y", "cat", 2)], "cat");
        let entries = entries_from_bags(items.iter().map(|i| &i.spec.data));
        assert_eq!(entries[0].name, "z");
        assert_eq!(entries[1].url, "http://y");
    }
}
