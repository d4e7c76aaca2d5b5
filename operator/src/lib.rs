pub use common::{
    Error, Result, catalogue::Catalogue, catalogueitem::CatalogueItem, get_client_name,
    landingpage::LandingPage,
};

pub static OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod catalogue;
pub mod landingpage;
pub mod observe;
pub mod operand;

/// State machinery for kube, as exposeable to actix
pub mod manager;
pub use manager::Manager;

/// Metrics
mod metrics;
pub use metrics::Metrics;

/// Command line entry points
pub mod publish;
pub mod run;
