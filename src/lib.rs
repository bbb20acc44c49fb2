//! # slotvisor
//!
//! **Slotvisor** lets a small fixed set of pre-declared slots stand in for an
//! open-ended set of dynamically discovered components, and a small fixed pool
//! of worker processes stand in for an open-ended set of workloads.
//!
//! Both halves solve the same problem: bounded-capacity allocation with
//! identity reuse, recycling, forced eviction and crash recovery.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   other processes                          owner process
//! ┌──────────────┐   Request/Response   ┌───────────────────────────────────────┐
//! │  HostClient  │ ───── Transport ───► │ Host::handle                          │
//! └──────────────┘                      │  ├─ SlotAllocator ──► PartitionTable  │
//!                                       │  │        └─ occupy ──► RecoveryStore │
//!                                       │  ├─ ProcessPoolScheduler              │
//!                                       │  │        ├─ ProcessControl (list/kill)│
//!                                       │  │        └─ IdleReaper               │
//!                                       │  └─ ProcessRegistry (liveness)        │
//!                                       └──────────────────┬────────────────────┘
//!                                                          │ publish(Event)
//!                                                          ▼
//!                                               Bus ──► subscriber_listener
//!                                                          └─► SubscriberSet
//!                                                               ├─ worker1 ─► sub1.on_event()
//!                                                               └─ workerN ─► subN.on_event()
//! ```
//!
//! ### Slot allocation
//! ```text
//! alloc(key, identity)
//!   ├─ no partition             ─► None
//!   ├─ identity already placed  ─► same slot
//!   ├─ free slot                ─► occupy
//!   ├─ slot without instances   ─► occupy the oldest
//!   └─ every slot busy          ─► finish instances of the oldest, occupy
//! ```
//!
//! ### Process pool
//! ```text
//! allocate(workload)
//!   ├─ process list unavailable ─► None
//!   ├─ best = max priority (same workload > unused > stopped > stale > idle > busy)
//!   ├─ best already hosts it    ─► same index
//!   └─ otherwise                ─► kill occupant, wait (bounded), reset to Allocated
//! attach(index, pid)            ─► Allocated → Running
//! death / idle reap             ─► Running → Stopped
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                                   |
//! |-------------------|----------------------------------------------------------|------------------------------------------------------|
//! | **Slots**         | Partitioned container slots with reuse and eviction.     | [`SlotAllocator`], [`PartitionKey`], [`Instance`]    |
//! | **Recovery**      | Durable slot assignments across restarts.                | [`RecoveryStore`], [`MemoryStore`], [`FileStore`]    |
//! | **Process pool**  | Priority-based worker slot selection and reclamation.    | [`ProcessPoolScheduler`], [`ProcessControl`]         |
//! | **Registry**      | Every live worker with death notification.               | [`ProcessRegistry`], [`Session`]                     |
//! | **RPC**           | Client stub for non-owner processes.                     | [`HostClient`], [`Transport`]                        |
//! | **Subscriber API**| Hook into allocation events (logging, metrics, ...).     | [`Subscribe`], [`Event`]                             |
//! | **Configuration** | Centralized settings.                                    | [`HostConfig`], [`SlotLayout`]                       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use slotvisor::{
//!     ComponentShape, HostBuilder, HostConfig, LaunchMode, LogicalIdentity, MemoryStore,
//!     TokenInstance,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn slotvisor::Subscribe>> = vec![Arc::new(slotvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn slotvisor::Subscribe>> = Vec::new();
//!
//!     let host = HostBuilder::new(HostConfig::default())
//!         .with_subscribers(subs)
//!         .with_store(Arc::new(MemoryStore::new()))
//!         .build();
//!
//!     let shape = ComponentShape::new(LaunchMode::SingleTop, false);
//!     let key = host.slots().key_for(&shape).unwrap();
//!     let who = LogicalIdentity::new("mail", "Compose");
//!
//!     let slot = host.slots().alloc(&key, &who).unwrap();
//!     let instance = TokenInstance::new();
//!     assert!(host.slots().create(&slot, &who, instance.clone()));
//!
//!     host.shutdown().await;
//! }
//! ```
mod core;
mod error;
mod events;
mod pool;
mod registry;
mod rpc;
mod slots;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Host, HostBuilder, HostConfig, ReaperDelays, WorkerAttach, WorkerKind};
pub use error::{ProcessError, StoreError, TransportError};
pub use events::{Bus, Event, EventKind, Level};
pub use pool::{
    LoadKind, NoProcessControl, OsProcess, PRIORITY_MAX, ProcessControl, ProcessPoolScheduler,
    ProcessSlot, ProcessSlotSnapshot, ProcessState, pool_index,
};
pub use registry::{NoopSession, ProcessInfo, ProcessRegistry, Session};
pub use rpc::{HostClient, LocalTransport, Request, Response, Transport};
pub use slots::{
    ComponentShape, DEFAULT_MAX_FORWARD_HOPS, Instance, InstanceId, InstanceRef, LaunchMode,
    LogicalIdentity, ModeCounts, PartitionKey, PartitionTable, ProcessScope, SlotAllocator,
    SlotLayout, SlotSnapshot, SlotState, SlotStatus, TokenInstance,
};
pub use store::{Assignment, FileStore, MemoryStore, RecoveryStore};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
