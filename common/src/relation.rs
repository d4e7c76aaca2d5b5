use crate::model::CatalogueEntry;
use std::collections::BTreeMap;

/// Flat string map exchanged between related applications
pub type DataBag = BTreeMap<String, String>;

/// Turn the bags published by related applications into entries.
///
/// A bag missing `name`, `url` or `icon` is skipped, order is kept.
pub fn entries_from_bags<'a, I>(bags: I) -> Vec<CatalogueEntry>
where
    I: IntoIterator<Item = &'a DataBag>,
{
    bags.into_iter().filter_map(entry_from_bag).collect()
}

pub fn entry_from_bag(bag: &DataBag) -> Option<CatalogueEntry> {
    match (bag.get("name"), bag.get("url"), bag.get("icon")) {
        (Some(name), Some(url), Some(icon)) => Some(CatalogueEntry {
            name: name.clone(),
            url: url.clone(),
            icon: icon.clone(),
            description: bag.get("description").cloned().unwrap_or_default(),
        }),
        _ => {
            tracing::debug!("Skipping incomplete relation data: {:?}", bag.keys().collect::<Vec<_>>());
            None
        }
    }
}

/// The bag a related application advertises itself with
pub fn entry_to_bag(entry: &CatalogueEntry) -> DataBag {
    let mut bag = DataBag::new();
    bag.insert("name".to_string(), entry.name.clone());
    bag.insert("url".to_string(), entry.url.clone());
    bag.insert("icon".to_string(), entry.icon.clone());
    if !entry.description.is_empty() {
        bag.insert("description".to_string(), entry.description.clone());
    }
    bag
}

/// Only the leader writes application data
pub fn publish_item(is_leader: bool, item: &CatalogueEntry) -> Option<DataBag> {
    if !is_leader {
        tracing::debug!("Not the leader, not publishing {}", item.name);
        return None;
    }
    Some(entry_to_bag(item))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, &str)]) -> DataBag {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_entries_from_bags() {
        let bags = vec![
            bag(&[("name", "grafana"), ("url", "http://g"), ("icon", "chart")]),
            bag(&[("name", "broken"), ("url", "http://b")]),
            bag(&[
                ("name", "alertmanager"),
                ("url", "http://a"),
                ("icon", "bell"),
                ("description", "alerts"),
            ]),
        ];
        let entries = entries_from_bags(&bags);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], CatalogueEntry::new("grafana", "http://g", "chart"));
        assert_eq!(entries[1].description, "alerts");
    }

    #[test]
    fn test_empty_bags() {
        assert!(entries_from_bags(&Vec::<DataBag>::new()).is_empty());
        assert!(entries_from_bags(&[DataBag::new()]).is_empty());
    }

    #[test]
    fn test_publish_item_leader_only() {
        let item = CatalogueEntry::new("DummyCharm-foo", "http://some.url/foo", "some-cool-icon-foo");
        assert_eq!(publish_item(false, &item), None);
        assert_eq!(
            publish_item(true, &item),
            Some(bag(&[
                ("name", "DummyCharm-foo"),
                ("url", "http://some.url/foo"),
                ("icon", "some-cool-icon-foo"),
            ]))
        );
    }

    #[test]
    fn test_bag_keeps_description() {
        let item = CatalogueEntry::new("a", "http://a", "i").with_description("hello");
        let bag = entry_to_bag(&item);
        assert_eq!(entry_from_bag(&bag), Some(item));
    }
}
