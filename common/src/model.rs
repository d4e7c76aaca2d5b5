use crate::{Error, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One application advertised on the landing page or in the catalogue
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema)]
pub struct CatalogueEntry {
    /// Display name of the application
    pub name: String,
    /// Where the application can be reached
    pub url: String,
    /// Icon name used by the web UI
    pub icon: String,
    /// Free text description
    #[serde(default)]
    pub description: String,
}

impl CatalogueEntry {
    #[must_use]
    pub fn new(name: &str, url: &str, icon: &str) -> CatalogueEntry {
        CatalogueEntry {
            name: name.to_string(),
            url: url.to_string(),
            icon: icon.to_string(),
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> CatalogueEntry {
        self.description = description.to_string();
        self
    }
}

/// User facing configuration of both operators
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CharmConfig {
    /// Title of the page (required)
    pub title: Option<String>,
    /// Tagline shown under the title (required)
    pub tagline: Option<String>,
    /// Description shown on the page
    pub description: Option<String>,
    /// JSON encoded array of links (required)
    pub links: Option<String>,
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::ConfigurationError(format!("Missing required configuration `{key}`")))
}

impl CharmConfig {
    /// Validate the configuration and merge it with the entries
    pub fn render(&self, entries: &[CatalogueEntry]) -> Result<RenderedConfig> {
        let title = required(&self.title, "title")?;
        let tagline = required(&self.tagline, "tagline")?;
        let links = required(&self.links, "links")?;
        let links = match serde_json::from_str::<Value>(links) {
            Ok(Value::Array(links)) => links,
            Ok(_) => {
                return Err(Error::ConfigurationError(
                    "Configuration `links` must be a JSON array".to_string(),
                ));
            }
            Err(e) => {
                return Err(Error::ConfigurationError(format!(
                    "Configuration `links` is not valid JSON: {e}"
                )));
            }
        };
        Ok(RenderedConfig {
            title: title.to_string(),
            tagline: tagline.to_string(),
            description: self.description.clone().unwrap_or_default(),
            links,
            apps: entries.to_vec(),
        })
    }
}

/// The document served to the web UI as `config.json`
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct RenderedConfig {
    pub title: String,
    pub tagline: String,
    pub description: String,
    pub links: Vec<Value>,
    pub apps: Vec<CatalogueEntry>,
}

impl RenderedConfig {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::SerializationError)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::SerializationError)
    }
}

/// Certificate, key and CA as found in the issuer secret
#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub struct CertificateMaterial {
    pub cert: Option<String>,
    pub key: Option<String>,
    pub ca: Option<String>,
}

fn present(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl CertificateMaterial {
    #[must_use]
    pub fn new(cert: &str, key: &str, ca: &str) -> CertificateMaterial {
        CertificateMaterial {
            cert: Some(cert.to_string()),
            key: Some(key.to_string()),
            ca: Some(ca.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.cert) {
            missing.push("certificate");
        }
        if !present(&self.key) {
            missing.push("key");
        }
        if !present(&self.ca) {
            missing.push("CA");
        }
        missing
    }
}

#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub enum TlsState {
    #[default]
    Disabled,
    Requested(CertificateMaterial),
}

impl TlsState {
    /// TLS is served only when the whole triple is available
    pub fn is_enabled(&self) -> bool {
        match self {
            TlsState::Disabled => false,
            TlsState::Requested(m) => m.is_complete(),
        }
    }

    pub fn material(&self) -> Option<&CertificateMaterial> {
        match self {
            TlsState::Disabled => None,
            TlsState::Requested(m) => Some(m),
        }
    }
}

/// Which of the two operators is reconciling
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Copy, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Flavor {
    LandingPage,
    Catalogue,
}

impl Flavor {
    pub fn service_name(&self) -> &'static str {
        match self {
            Flavor::LandingPage => "web",
            Flavor::Catalogue => "catalogue",
        }
    }

    pub fn manages_nginx(&self) -> bool {
        matches!(self, Flavor::Catalogue)
    }

    pub fn supports_tls(&self) -> bool {
        matches!(self, Flavor::Catalogue)
    }
}

#[derive(Eq, PartialEq, Clone, Debug)]
pub enum Status {
    Active,
    Blocked(String),
    Waiting(String),
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Blocked(_) => "blocked",
            Status::Waiting(_) => "waiting",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Status::Active => "",
            Status::Blocked(m) | Status::Waiting(m) => m,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Active => write!(f, "active"),
            s => write!(f, "{}: {}", s.name(), s.message()),
        }
    }
}

/// Status as stored in a custom resource
#[derive(Serialize, Deserialize, Eq, PartialEq, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// active, blocked or waiting
    pub name: String,
    /// Human readable details
    pub message: String,
    /// When this status was reported
    pub since: Option<DateTime<Utc>>,
}

impl StatusReport {
    /// Same status and message, whenever it was reported
    pub fn reports(&self, status: &Status) -> bool {
        self.name == status.name() && self.message == status.message()
    }

    /// The report to store, `None` when `previous` already says the same
    pub fn updated(previous: Option<&StatusReport>, status: &Status) -> Option<StatusReport> {
        match previous {
            Some(p) if p.reports(status) => None,
            _ => Some(StatusReport::from(status)),
        }
    }
}

impl From<&Status> for StatusReport {
    fn from(status: &Status) -> StatusReport {
        StatusReport {
            name: status.name().to_string(),
            message: status.message().to_string(),
            since: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(links: &str) -> CharmConfig {
        CharmConfig {
            title: Some("Catalogue".to_string()),
            tagline: Some("All the apps".to_string()),
            description: None,
            links: Some(links.to_string()),
        }
    }

    #[test]
    fn test_render_single_entry() {
        let entries = vec![CatalogueEntry::new("remote-charm", "https://localhost", "some-cool-icon")];
        let rendered = config("[]").render(&entries).unwrap();
        assert_eq!(
            rendered.to_value().unwrap()["apps"],
            serde_json::json!([{
                "name": "remote-charm",
                "url": "https://localhost",
                "icon": "some-cool-icon",
                "description": "",
            }])
        );
        assert_eq!(rendered.description, "");
    }

    #[test]
    fn test_render_keeps_entry_order_and_duplicates() {
        let entries = vec![
            CatalogueEntry::new("zeta", "http://z", "z"),
            CatalogueEntry::new("alpha", "http://a", "a"),
            CatalogueEntry::new("zeta", "http://z", "z"),
        ];
        let rendered = config("[]").render(&entries).unwrap();
        let names: Vec<&str> = rendered.apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "zeta"]);
    }

    #[test]
    fn test_render_empty_entries() {
        let rendered = config(r#"[{"title": "docs", "url": "http://docs"}]"#).render(&[]).unwrap();
        let value = rendered.to_value().unwrap();
        assert_eq!(value["apps"], serde_json::json!([]));
        assert_eq!(value["links"][0]["title"], "docs");
    }

    #[test]
    fn test_json_key_order() {
        let json = config("[]").render(&[]).unwrap().to_json().unwrap();
        let title = json.find("\"title\"").unwrap();
        let tagline = json.find("\"tagline\"").unwrap();
        let apps = json.find("\"apps\"").unwrap();
        assert!(title < tagline && tagline < apps);
    }

    #[test]
    fn test_missing_title() {
        let mut c = config("[]");
        c.title = None;
        let err = c.render(&[]).unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_links_must_parse() {
        assert!(matches!(
            config("[not json").render(&[]),
            Err(Error::ConfigurationError(_))
        ));
        assert!(matches!(
            config(r#"{"a": 1}"#).render(&[]),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_certificate_material() {
        let full = CertificateMaterial::new("cert", "key", "ca");
        assert!(full.is_complete());
        let partial = CertificateMaterial {
            ca: None,
            ..full.clone()
        };
        assert_eq!(partial.missing(), vec!["CA"]);
        assert!(TlsState::Requested(full).is_enabled());
        assert!(!TlsState::Requested(partial).is_enabled());
        assert!(!TlsState::Disabled.is_enabled());
    }

    #[test]
    fn test_blank_certificate_is_missing() {
        let m = CertificateMaterial::new("  ", "key", "ca");
        assert_eq!(m.missing(), vec!["certificate"]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Active.to_string(), "active");
        assert_eq!(Status::Blocked("boom".into()).to_string(), "blocked: boom");
        let report = StatusReport::from(&Status::Waiting("later".into()));
        assert_eq!(report.name, "waiting");
        assert_eq!(report.message, "later");
    }

    #[test]
    fn test_unchanged_status_is_not_reported_again() {
        let first = StatusReport::updated(None, &Status::Active).unwrap();
        assert_eq!(StatusReport::updated(Some(&first), &Status::Active), None);
        let blocked = Status::Blocked("boom".into());
        let second = StatusReport::updated(Some(&first), &blocked).unwrap();
        assert_eq!(second.name, "blocked");
        assert_eq!(StatusReport::updated(Some(&second), &blocked), None);
        assert!(StatusReport::updated(Some(&second), &Status::Blocked("other".into())).is_some());
    }
}
