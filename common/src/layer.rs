use crate::{model::Flavor, nginx::NGINX_CONFIG_PATH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const HTTP_SERVER_COMMAND: &str = "python3 -m http.server 80";

/// One supervised process
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug)]
pub struct Service {
    #[serde(rename = "override")]
    pub override_policy: String,
    pub summary: String,
    pub command: String,
    pub startup: String,
}

/// A process supervision layer, as installed in the workload
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug)]
pub struct ServiceLayer {
    pub summary: String,
    pub description: String,
    pub services: BTreeMap<String, Service>,
}

impl ServiceLayer {
    #[must_use]
    pub fn for_flavor(flavor: Flavor) -> ServiceLayer {
        let name = flavor.service_name();
        let command = match flavor {
            Flavor::LandingPage => HTTP_SERVER_COMMAND.to_string(),
            Flavor::Catalogue => format!("nginx -g 'daemon off;' -c {NGINX_CONFIG_PATH}"),
        };
        let mut services = BTreeMap::new();
        services.insert(name.to_string(), Service {
            override_policy: "replace".to_string(),
            summary: name.to_string(),
            command,
            startup: "enabled".to_string(),
        });
        ServiceLayer {
            summary: format!("{name} layer"),
            description: format!("process supervision layer for {name}"),
            services,
        }
    }

    /// True when every service of this layer is installed as-is
    pub fn is_installed_in(&self, current: &BTreeMap<String, Service>) -> bool {
        self.services.iter().all(|(name, svc)| current.get(name) == Some(svc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_layer() {
        let layer = ServiceLayer::for_flavor(Flavor::Catalogue);
        let svc = &layer.services["catalogue"];
        assert_eq!(svc.command, "nginx -g 'daemon off;' -c /etc/nginx/nginx.conf");
        assert_eq!(svc.startup, "enabled");
        assert_eq!(svc.override_policy, "replace");
        assert_eq!(svc.summary, "catalogue");
    }

    #[test]
    fn test_landing_page_layer() {
        let layer = ServiceLayer::for_flavor(Flavor::LandingPage);
        assert_eq!(layer.services.len(), 1);
        assert_eq!(layer.services["web"].command, "python3 -m http.server 80");
    }

    #[test]
    fn test_serialized_override_key() {
        let layer = ServiceLayer::for_flavor(Flavor::LandingPage);
        let v = serde_json::to_value(&layer.services).unwrap();
        assert_eq!(v["web"]["override"], "replace");
    }

    #[test]
    fn test_is_installed_in() {
        let layer = ServiceLayer::for_flavor(Flavor::Catalogue);
        assert!(!layer.is_installed_in(&BTreeMap::new()));
        let mut current = layer.services.clone();
        assert!(layer.is_installed_in(&current));
        current.get_mut("catalogue").unwrap().command = "nginx".to_string();
        assert!(!layer.is_installed_in(&current));
        let mut other = layer.services.clone();
        other.insert("sidecar".to_string(), current["catalogue"].clone());
        assert!(layer.is_installed_in(&other));
    }
}
