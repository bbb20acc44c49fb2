//! # Process registry - every live worker, pool or ad hoc.
//!
//! ## Architecture
//! ```text
//! attach(info, liveness, session)
//!   ├─► entries[name] = Entry (write lock)
//!   └─► spawn watcher ── liveness.cancelled() ──► remove entry (write lock)
//!                                                └─► session.on_process_died(info)
//! ```
//!
//! ## Rules
//! - Lookups are linear scans under the read lock.
//! - An entry whose liveness already fired is never returned.
//! - Re-attaching a name replaces the entry; the old watcher no longer
//!   removes anything.
//! - Cancelling the runtime token stops every watcher without notifying.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::session::{ProcessInfo, Session};
use crate::events::{Bus, Event, EventKind};

struct Entry {
    info: ProcessInfo,
    liveness: CancellationToken,
    session: Arc<dyn Session>,
    generation: u64,
}

impl Entry {
    fn alive(&self) -> Option<&ProcessInfo> {
        (!self.liveness.is_cancelled()).then_some(&self.info)
    }
}

/// Registry of live worker processes keyed by process name.
pub struct ProcessRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    bus: Bus,
    runtime_token: CancellationToken,
    generation: AtomicU64,
}

impl ProcessRegistry {
    pub fn new(bus: Bus, runtime_token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            bus,
            runtime_token,
            generation: AtomicU64::new(0),
        })
    }

    /// Inserts a worker and watches `liveness`.
    ///
    /// When `liveness` is cancelled the entry is removed and `session` is
    /// notified exactly once.
    pub async fn attach(
        self: &Arc<Self>,
        info: ProcessInfo,
        liveness: CancellationToken,
        session: Arc<dyn Session>,
    ) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let name = info.name.clone();
        self.bus.publish(
            Event::new(EventKind::RegistryAttached)
                .with_reason(info.name.as_str())
                .with_workload(info.workload.as_str())
                .with_pid(info.pid),
        );
        {
            let mut entries = self.entries.write().await;
            entries.insert(
                name.clone(),
                Entry {
                    info,
                    liveness: liveness.clone(),
                    session,
                    generation,
                },
            );
        }

        let me = Arc::clone(self);
        let rt = self.runtime_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = rt.cancelled() => {}
                _ = liveness.cancelled() => me.handle_death(&name, generation).await,
            }
        });
    }

    async fn handle_death(&self, name: &str, generation: u64) {
        let removed = {
            let mut entries = self.entries.write().await;
            match entries.get(name) {
                Some(e) if e.generation == generation => entries.remove(name),
                _ => None,
            }
        };
        let Some(entry) = removed else {
            return;
        };

        self.bus.publish(
            Event::new(EventKind::RegistryDied)
                .with_reason(entry.info.name.as_str())
                .with_workload(entry.info.workload.as_str())
                .with_pid(entry.info.pid),
        );
        entry.session.on_process_died(&entry.info).await;
    }

    /// Live entry by process name.
    pub async fn lookup(&self, name: &str) -> Option<ProcessInfo> {
        let entries = self.entries.read().await;
        entries.get(name).and_then(Entry::alive).cloned()
    }

    /// First live worker hosting `workload`.
    pub async fn lookup_by_workload(&self, workload: &str) -> Option<ProcessInfo> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter_map(Entry::alive)
            .find(|i| i.workload == workload)
            .cloned()
    }

    /// Live worker with OS pid `pid`.
    pub async fn lookup_by_pid(&self, pid: u32) -> Option<ProcessInfo> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter_map(Entry::alive)
            .find(|i| i.pid == pid)
            .cloned()
    }

    /// Returns sorted list of registered process names.
    pub async fn list(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut names: Vec<String> = entries.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::NoopSession;

    struct Notify(mpsc::UnboundedSender<ProcessInfo>);

    #[async_trait]
    impl Session for Notify {
        async fn on_process_died(&self, process: &ProcessInfo) {
            let _ = self.0.send(process.clone());
        }
    }

    fn registry() -> Arc<ProcessRegistry> {
        ProcessRegistry::new(Bus::new(64), CancellationToken::new())
    }

    #[tokio::test]
    async fn lookups_by_workload_and_pid() {
        let reg = registry();
        reg.attach(
            ProcessInfo::new("app:loader0", "mail", 100).with_pool_index(0),
            CancellationToken::new(),
            Arc::new(NoopSession),
        )
        .await;
        reg.attach(
            ProcessInfo::new("app:sync", "maps", 101),
            CancellationToken::new(),
            Arc::new(NoopSession),
        )
        .await;

        assert_eq!(reg.lookup_by_workload("maps").await.unwrap().pid, 101);
        assert_eq!(
            reg.lookup_by_pid(100).await.unwrap().pool_index,
            Some(0)
        );
        assert!(reg.lookup_by_pid(7).await.is_none());
        assert_eq!(reg.list().await, vec!["app:loader0", "app:sync"]);
    }

    #[tokio::test]
    async fn death_removes_entry_and_notifies_session() {
        let reg = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let liveness = CancellationToken::new();
        reg.attach(
            ProcessInfo::new("app:loader1", "mail", 100),
            liveness.clone(),
            Arc::new(Notify(tx)),
        )
        .await;

        liveness.cancel();
        assert!(reg.lookup("app:loader1").await.is_none());

        let died = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(died.pid, 100);
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn stale_watcher_does_not_remove_replacement() {
        let reg = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let old = CancellationToken::new();
        reg.attach(ProcessInfo::new("app:p", "mail", 100), old.clone(), Arc::new(Notify(tx)))
            .await;
        reg.attach(
            ProcessInfo::new("app:p", "mail", 200),
            CancellationToken::new(),
            Arc::new(NoopSession),
        )
        .await;

        old.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reg.lookup("app:p").await.unwrap().pid, 200);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn runtime_cancel_stops_watchers() {
        let rt = CancellationToken::new();
        let reg = ProcessRegistry::new(Bus::new(8), rt.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let liveness = CancellationToken::new();
        reg.attach(ProcessInfo::new("app:p", "mail", 1), liveness.clone(), Arc::new(Notify(tx)))
            .await;

        rt.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        liveness.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(reg.len().await, 1);
    }
}
