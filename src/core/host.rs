//! # Host: the single owner of slot, pool and registry state.
//!
//! The [`Host`] owns the event bus, the [`SubscriberSet`] fan-out, the
//! [`SlotAllocator`], the [`ProcessPoolScheduler`] and the [`ProcessRegistry`].
//! Other processes reach it through [`Host::handle`], usually via a
//! [`HostClient`](crate::HostClient).
//!
//! ## High-level architecture
//! ```text
//! HostBuilder::build()
//!   Bus ──subscribe()──► subscriber_listener ──► SubscriberSet::emit(&Event)
//!   SlotAllocator::new(layout, store)      (restores from RecoveryStore)
//!   ProcessPoolScheduler::new(cfg, control)
//!   ProcessRegistry::new()
//!
//! attach_process(worker, liveness, session)
//!   pool worker ──► ProcessPoolScheduler::attach ──► None → rejected
//!   every worker ──► ProcessRegistry::attach
//!                         └─ liveness fired ──► ProcessPoolScheduler::on_death(pid)
//!                                           └─► session.on_process_died()
//!
//! shutdown()
//!   runtime_token.cancel() ──► reaper, liveness watchers, listener stop
//!   SubscriberSet::shutdown() ──► subscriber workers drain and exit
//! ```
//!
//! ## Example
//! ```rust
//! use slotvisor::{HostBuilder, HostConfig, LaunchMode, LogicalIdentity, PartitionKey};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let host = HostBuilder::new(HostConfig::default()).build();
//!
//!     let key = PartitionKey::main(LaunchMode::Multiple, false);
//!     let who = LogicalIdentity::new("mail", "Inbox");
//!     let slot = host.slots().alloc(&key, &who).unwrap();
//!     assert_eq!(host.slots().alloc(&key, &who), Some(slot));
//!
//!     host.shutdown().await;
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::HostConfig;
use crate::events::{Bus, Event};
use crate::pool::ProcessPoolScheduler;
use crate::registry::{ProcessInfo, ProcessRegistry, Session};
use crate::rpc::{Request, Response};
use crate::slots::SlotAllocator;
use crate::subscribers::SubscriberSet;

/// How a worker process relates to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerKind {
    /// Runs in pool slot `index`. `default_workload`, when set, re-claims the
    /// slot for that workload first (a worker restarted by the OS).
    Pool {
        index: usize,
        default_workload: Option<String>,
    },
    /// Runs outside the pool, dedicated to `workload`.
    AdHoc { workload: String },
}

/// Announcement of a freshly started worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAttach {
    pub name: String,
    pub pid: u32,
    pub kind: WorkerKind,
}

/// Moves the pool slot to `Stopped` before the owner session hears of a death.
struct PoolAwareSession {
    pool: Arc<ProcessPoolScheduler>,
    inner: Arc<dyn Session>,
}

#[async_trait]
impl Session for PoolAwareSession {
    async fn on_process_died(&self, process: &ProcessInfo) {
        if process.pool_index.is_some() {
            self.pool.on_death(process.pid);
        }
        self.inner.on_process_died(process).await;
    }
}

/// Owner process object.
pub struct Host {
    cfg: HostConfig,
    bus: Bus,
    slots: SlotAllocator,
    pool: Arc<ProcessPoolScheduler>,
    registry: Arc<ProcessRegistry>,
    runtime_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Host {
    pub(crate) fn new_internal(
        cfg: HostConfig,
        bus: Bus,
        slots: SlotAllocator,
        pool: Arc<ProcessPoolScheduler>,
        registry: Arc<ProcessRegistry>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            slots,
            pool,
            registry,
            runtime_token,
            listener: Mutex::new(None),
        }
    }

    /// Forwards bus events to the subscriber set until shutdown.
    pub(crate) fn subscriber_listener(
        &self,
        mut rx: broadcast::Receiver<Event>,
        set: SubscriberSet,
    ) {
        let rt = self.runtime_token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rt.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            // deliver what was already published before stopping the workers
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        });
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub fn config(&self) -> &HostConfig {
        &self.cfg
    }

    /// Event bus; subscribe for a raw event stream.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn slots(&self) -> &SlotAllocator {
        &self.slots
    }

    pub fn pool(&self) -> &Arc<ProcessPoolScheduler> {
        &self.pool
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    /// Registers a worker process.
    ///
    /// Pool workers must attach to an `Allocated` slot (or bring a default
    /// workload). Returns the workload the worker must host, or `None` if the
    /// attach was refused.
    pub async fn attach_process(
        &self,
        worker: WorkerAttach,
        liveness: CancellationToken,
        session: Arc<dyn Session>,
    ) -> Option<String> {
        let (workload, pool_index) = match worker.kind {
            WorkerKind::Pool {
                index,
                default_workload,
            } => {
                let w = self
                    .pool
                    .attach(
                        index,
                        worker.pid,
                        liveness.clone(),
                        default_workload.as_deref(),
                    )
                    .await?;
                (w, Some(index))
            }
            WorkerKind::AdHoc { workload } => (workload, None),
        };

        let info = ProcessInfo {
            name: worker.name,
            workload: workload.clone(),
            pid: worker.pid,
            pool_index,
        };
        let session = Arc::new(PoolAwareSession {
            pool: Arc::clone(&self.pool),
            inner: session,
        });
        self.registry.attach(info, liveness, session).await;
        Some(workload)
    }

    /// Serves one RPC request.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::KeyFor { shape } => Response::Key(self.slots.key_for(&shape)),
            Request::Alloc { key, identity } => Response::Slot(self.slots.alloc(&key, &identity)),
            Request::Lookup { slot } => Response::Snapshot(self.slots.lookup(&slot)),
            Request::Retarget {
                origin,
                target,
                identity,
                hops,
            } => Response::Accepted(self.slots.retarget(&origin, &target, &identity, hops)),
            Request::DumpSlots => Response::Slots(self.slots.dump()),
            Request::AllocateProcess { workload } => {
                Response::ProcessIndex(self.pool.allocate(&workload).await)
            }
            Request::AdjustLoad { index, kind, delta } => {
                Response::Accepted(self.pool.adjust_load(index, kind, delta))
            }
            Request::AdjustBindersByPid { pid, delta } => {
                Response::Accepted(self.pool.adjust_binders_by_pid(pid, delta))
            }
            Request::DumpPool => Response::Pool(self.pool.dump()),
            Request::LookupByWorkload { workload } => {
                Response::Process(self.registry.lookup_by_workload(&workload).await)
            }
            Request::LookupByPid { pid } => {
                Response::Process(self.registry.lookup_by_pid(pid).await)
            }
        }
    }

    /// Stops background work and drains subscribers. Idempotent.
    pub async fn shutdown(&self) {
        self.runtime_token.cancel();
        self.pool.reaper().cancel();
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::core::HostBuilder;
    use crate::events::EventKind;
    use crate::pool::testing::FakeControl;
    use crate::pool::{LoadKind, ProcessState};
    use crate::registry::NoopSession;
    use crate::rpc::{HostClient, LocalTransport};
    use crate::slots::{LaunchMode, LogicalIdentity, PartitionKey, SlotStatus};
    use crate::store::MemoryStore;
    use crate::subscribers::Subscribe;

    struct Forward(mpsc::UnboundedSender<EventKind>);

    #[async_trait]
    impl Subscribe for Forward {
        async fn on_event(&self, event: &Event) {
            let _ = self.0.send(event.kind);
        }
    }

    struct Notify(mpsc::UnboundedSender<u32>);

    #[async_trait]
    impl Session for Notify {
        async fn on_process_died(&self, process: &ProcessInfo) {
            let _ = self.0.send(process.pid);
        }
    }

    fn cfg() -> HostConfig {
        HostConfig {
            reaper_enabled: false,
            ..HostConfig::default()
        }
    }

    fn host(control: &Arc<FakeControl>) -> Arc<Host> {
        HostBuilder::new(cfg())
            .with_process_control(control.clone())
            .build()
    }

    fn pool_worker(name: &str, pid: u32, index: usize) -> WorkerAttach {
        WorkerAttach {
            name: name.to_string(),
            pid,
            kind: WorkerKind::Pool {
                index,
                default_workload: None,
            },
        }
    }

    #[tokio::test]
    async fn worker_death_stops_pool_slot_and_notifies_owner() {
        let control = Arc::new(FakeControl::new());
        let host = host(&control);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let index = host.pool().allocate("mail").await.unwrap();
        control.spawn_worker(index, 100);
        let liveness = CancellationToken::new();
        let got = host
            .attach_process(
                pool_worker("app:loader0", 100, index),
                liveness.clone(),
                Arc::new(Notify(tx)),
            )
            .await;
        assert_eq!(got.as_deref(), Some("mail"));
        assert_eq!(host.registry().lookup_by_workload("mail").await.unwrap().pid, 100);

        liveness.cancel();
        let pid = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pid, 100);
        assert_eq!(host.pool().get(index).unwrap().state, ProcessState::Stopped);
        assert!(host.registry().lookup_by_pid(100).await.is_none());

        host.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_pool_attach_is_not_registered() {
        let control = Arc::new(FakeControl::new());
        let host = host(&control);
        let got = host
            .attach_process(
                pool_worker("app:loader1", 7, 1),
                CancellationToken::new(),
                Arc::new(NoopSession),
            )
            .await;
        assert_eq!(got, None);
        assert!(host.registry().is_empty().await);

        let adhoc = WorkerAttach {
            name: "app:sync".into(),
            pid: 8,
            kind: WorkerKind::AdHoc {
                workload: "maps".into(),
            },
        };
        let got = host
            .attach_process(adhoc, CancellationToken::new(), Arc::new(NoopSession))
            .await;
        assert_eq!(got.as_deref(), Some("maps"));
        assert_eq!(host.registry().lookup_by_pid(8).await.unwrap().pool_index, None);
    }

    #[tokio::test]
    async fn client_reaches_host_through_transport() {
        let control = Arc::new(FakeControl::new());
        let host = host(&control);
        let client = HostClient::new(LocalTransport::new(&host));

        let key = PartitionKey::main(LaunchMode::SingleTop, false);
        let who = LogicalIdentity::new("mail", "Compose");
        let slot = client.alloc(&key, &who).await.unwrap().unwrap();
        assert_eq!(client.alloc(&key, &who).await.unwrap(), Some(slot.clone()));
        let snap = client.lookup(&slot).await.unwrap().unwrap();
        assert_eq!(snap.status, SlotStatus::Occupied);
        assert_eq!(client.dump_slots().await.unwrap().len(), 1);

        let index = client.allocate_process("mail").await.unwrap().unwrap();
        assert!(client.adjust_load(index, LoadKind::Service, 1).await.unwrap());
        assert_eq!(client.dump_pool().await.unwrap()[index].services, 1);
        assert_eq!(client.lookup_by_workload("mail").await.unwrap(), None);

        host.shutdown().await;
        let err = client.lookup_by_pid(1).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn subscribers_see_restored_and_new_assignments() {
        let store = MemoryStore::new();
        let key = PartitionKey::main(LaunchMode::Multiple, false);
        let who = LogicalIdentity::new("mail", "Inbox");

        let first = HostBuilder::new(cfg())
            .with_store(Arc::new(store.clone()))
            .build();
        let slot = first.slots().alloc(&key, &who).unwrap();
        first.shutdown().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let second = HostBuilder::new(cfg())
            .with_store(Arc::new(store))
            .with_subscribers(vec![Arc::new(Forward(tx))])
            .build();
        assert_eq!(second.slots().lookup(&slot).unwrap().status, SlotStatus::Restored);
        assert_eq!(second.slots().alloc(&key, &who), Some(slot));
        second.shutdown().await;

        let mut seen = Vec::new();
        while let Ok(kind) = rx.try_recv() {
            seen.push(kind);
        }
        assert_eq!(seen, vec![EventKind::SlotRestored, EventKind::SlotReused]);
    }

    #[tokio::test]
    async fn missing_process_control_fails_allocation() {
        let host = HostBuilder::new(cfg()).build();
        assert_eq!(host.pool().allocate("mail").await, None);
        host.shutdown().await;
        host.shutdown().await;
    }
}
