use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    NotReady(String),

    #[error("{0}")]
    ConfigurationError(String),

    #[error("{0}")]
    CertificateError(String),

    #[error("{0}")]
    RestartError(String),

    #[error("SerializationError: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("K8s error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Stdio error {0}")]
    Stdio(#[from] std::io::Error),

    #[error("UTF8 error {0}")]
    UTF8(#[from] std::string::FromUtf8Error),

    #[error("Workload error: {0}")]
    WorkloadError(String),

    #[error("Error: {0}")]
    Other(String),
}
impl Error {
    pub fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }

    /// Message shown to the user through a `Blocked` status
    pub fn status_message(&self) -> String {
        match self {
            Error::NotReady(m) | Error::ConfigurationError(m) | Error::CertificateError(m) => m.clone(),
            Error::RestartError(m) => m.clone(),
            e => format!("Failed to write configuration: {e}"),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod catalogue;
pub mod catalogueitem;
pub mod context;
pub mod kubeworkload;
pub mod landingpage;
pub mod layer;
pub mod model;
pub mod nginx;
pub mod reconciler;
pub mod relation;
pub mod triggers;
pub mod workload;
pub mod workloadmock;
pub use context::get_client_name;
pub use model::{CatalogueEntry, CharmConfig, Flavor, Status, TlsState};
