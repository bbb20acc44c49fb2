use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Public view of a registered worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Unique process name; the registry key.
    pub name: String,
    pub workload: String,
    pub pid: u32,
    /// Pool slot the worker occupies, `None` for ad hoc workers.
    pub pool_index: Option<usize>,
}

impl ProcessInfo {
    pub fn new(name: impl Into<String>, workload: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            workload: workload.into(),
            pid,
            pool_index: None,
        }
    }

    pub fn with_pool_index(mut self, index: usize) -> Self {
        self.pool_index = Some(index);
        self
    }
}

/// Owner-side session of a worker, told when the worker dies.
///
/// Called once per registration, from the registry's watcher task, after the
/// entry has been removed.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    async fn on_process_died(&self, process: &ProcessInfo);
}

/// Session that ignores deaths.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSession;

#[async_trait]
impl Session for NoopSession {
    async fn on_process_died(&self, _process: &ProcessInfo) {}
}
