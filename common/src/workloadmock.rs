use crate::{
    Error, Result,
    layer::{Service, ServiceLayer},
    model::Status,
    workload::{StatusSink, Workload},
};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};

#[derive(Debug, Default)]
pub struct MemoryState {
    pub reachable: bool,
    pub files: BTreeMap<String, String>,
    pub services: BTreeMap<String, Service>,
    /// Paths that fail to be read back
    pub unreadable: BTreeSet<String>,
    /// When set, every restart fails with that message
    pub fail_restart: Option<String>,
    pub writes: Vec<String>,
    pub removals: Vec<String>,
    pub layers: usize,
    pub restarts: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryWorkload {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryWorkload {
    #[must_use]
    pub fn new() -> Self {
        let wl = Self::default();
        wl.state().reachable = true;
        wl
    }

    #[must_use]
    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.state().files.get(path).cloned()
    }

    /// Number of mutations (writes, removals and layer installs) seen so far
    pub fn mutations(&self) -> usize {
        let s = self.state();
        s.writes.len() + s.removals.len() + s.layers
    }

    pub fn restarts(&self) -> usize {
        self.state().restarts.len()
    }
}

#[async_trait]
impl Workload for MemoryWorkload {
    async fn can_connect(&self) -> bool {
        self.state().reachable
    }

    async fn pull(&self, path: &str) -> Result<Option<String>> {
        let s = self.state();
        if s.unreadable.contains(path) {
            return Err(Error::WorkloadError(format!("cannot read {path}")));
        }
        Ok(s.files.get(path).cloned())
    }

    async fn push(&self, path: &str, content: &str) -> Result<()> {
        let mut s = self.state();
        s.unreadable.remove(path);
        s.files.insert(path.to_string(), content.to_string());
        s.writes.push(path.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let mut s = self.state();
        s.files.remove(path);
        s.removals.push(path.to_string());
        Ok(())
    }

    async fn services(&self) -> Result<BTreeMap<String, Service>> {
        Ok(self.state().services.clone())
    }

    async fn add_layer(&self, _label: &str, layer: &ServiceLayer) -> Result<()> {
        let mut s = self.state();
        for (name, svc) in &layer.services {
            s.services.insert(name.clone(), svc.clone());
        }
        s.layers += 1;
        Ok(())
    }

    async fn restart(&self, service: &str) -> Result<()> {
        let mut s = self.state();
        if let Some(msg) = s.fail_restart.clone() {
            return Err(Error::WorkloadError(msg));
        }
        s.restarts.push(service.to_string());
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStatus {
    pub leader: bool,
    unit: Arc<Mutex<Vec<Status>>>,
    app: Arc<Mutex<Vec<Status>>>,
}

impl MemoryStatus {
    #[must_use]
    pub fn new(leader: bool) -> Self {
        Self {
            leader,
            ..Default::default()
        }
    }

    pub fn unit(&self) -> Option<Status> {
        self.unit.lock().unwrap().last().cloned()
    }

    pub fn app(&self) -> Option<Status> {
        self.app.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl StatusSink for MemoryStatus {
    fn is_leader(&self) -> bool {
        self.leader
    }

    async fn set_unit_status(&self, status: &Status) -> Result<()> {
        self.unit.lock().unwrap().push(status.clone());
        Ok(())
    }

    async fn set_app_status(&self, status: &Status) -> Result<()> {
        self.app.lock().unwrap().push(status.clone());
        Ok(())
    }
}
