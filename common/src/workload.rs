use crate::{
    Result,
    layer::{Service, ServiceLayer},
    model::Status,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Control surface of the managed container: its files and its supervisor
#[async_trait]
pub trait Workload: Send + Sync {
    /// Whether the workload answers at all
    async fn can_connect(&self) -> bool;

    /// Read a file back, `None` when it does not exist
    async fn pull(&self, path: &str) -> Result<Option<String>>;

    async fn push(&self, path: &str, content: &str) -> Result<()>;

    async fn remove(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.pull(path).await?.is_some())
    }

    /// Services currently known to the supervisor
    async fn services(&self) -> Result<BTreeMap<String, Service>>;

    /// Install the layer and enable its services
    async fn add_layer(&self, label: &str, layer: &ServiceLayer) -> Result<()>;

    async fn restart(&self, service: &str) -> Result<()>;
}

/// Where unit and application status end up
#[async_trait]
pub trait StatusSink: Send + Sync {
    fn is_leader(&self) -> bool;

    async fn set_unit_status(&self, status: &Status) -> Result<()>;

    async fn set_app_status(&self, status: &Status) -> Result<()>;
}
