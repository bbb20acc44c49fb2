//! # Runtime events emitted by the allocators, the reaper and the registry.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Slot events**: container slot assignment, reuse, eviction and instance bookkeeping
//! - **Pool events**: worker-process slot selection, termination and attachment
//! - **Registry events**: live worker processes attaching and dying
//! - **Subscriber events**: fan-out overflow and panics
//!
//! The [`Event`] struct carries metadata such as the slot id, identity,
//! workload, pid and a human-readable reason. Every kind maps to a [`Level`]
//! so that log writers can filter warnings (forced eviction, mismatches) from
//! routine traffic.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use slotvisor::{Event, EventKind, Level};
//!
//! let ev = Event::new(EventKind::ForcedEviction)
//!     .with_slot("slot.N1NRNTS0")
//!     .with_identity("mail/Compose")
//!     .with_count(2);
//!
//! assert_eq!(ev.kind.level(), Level::Warn);
//! assert_eq!(ev.count, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Severity attached to an [`EventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Routine bookkeeping.
    Info,
    /// Normal but disruptive outcome (forced eviction, mismatch, kill timeout).
    Warn,
    /// Bookkeeping loss or collaborator failure.
    Error,
}

impl Level {
    /// Short lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Slot events ===
    /// Slot assigned to a new identity and written to the recovery store.
    ///
    /// Sets: `slot`, `identity`
    SlotOccupied,

    /// Slot rebuilt from the recovery store at startup.
    ///
    /// Sets: `slot`, `identity`
    SlotRestored,

    /// Slot released back to `None` by the redirect flow.
    ///
    /// Sets: `slot`, `identity` (previous)
    SlotRecycled,

    /// Allocation found the identity already registered and reused its slot.
    ///
    /// Sets: `slot`, `identity`
    SlotReused,

    /// Redirect flow moved an identity onto a target slot.
    ///
    /// Sets: `slot` (target), `identity`, `reason` (origin slot)
    SlotRetargeted,

    /// Every slot in the partition had live instances; the oldest was taken
    /// and its instances were told to finish.
    ///
    /// Sets: `slot`, `identity` (new), `count` (instances terminated), `reason` (previous identity)
    ForcedEviction,

    /// A live instance was registered on its slot.
    ///
    /// Sets: `slot`, `identity`
    InstanceCreated,

    /// A live instance was registered on a slot still in the `Restored`
    /// state (relaunch of an identity known from a previous run).
    ///
    /// Sets: `slot`, `identity`
    InstanceRelaunched,

    /// A live instance was unregistered from its slot.
    ///
    /// Sets: `slot`
    InstanceDestroyed,

    /// Instance creation named an identity different from the slot's.
    ///
    /// Sets: `slot`, `identity` (requested), `reason` (registered identity)
    IdentityMismatch,

    /// Instance creation hit a slot with no bookkeeping at all.
    ///
    /// Sets: `slot`, `identity`
    BookkeepingLost,

    /// Allocation asked for a partition that is not configured.
    ///
    /// Sets: `reason` (partition key), `identity`
    PartitionMissing,

    /// `occupy` refused an empty or malformed identity.
    ///
    /// Sets: `slot`, `reason`
    OccupyRejected,

    /// The recovery store could not be read or written.
    ///
    /// Sets: `slot` (if any), `reason`
    StoreFailed,

    /// Redirect flow refused a request that exceeded the hop bound.
    ///
    /// Sets: `slot`, `identity`, `count` (hops)
    ForwardLoop,

    // === Pool events ===
    /// Pool slot reset and assigned to a workload.
    ///
    /// Sets: `index`, `workload`
    ProcessAllocated,

    /// Pool slot already hosting the workload was returned unchanged.
    ///
    /// Sets: `index`, `workload`
    ProcessReused,

    /// Previous occupant of a pool slot was terminated.
    ///
    /// Sets: `index`, `pid`, `workload` (previous)
    ProcessKilled,

    /// The terminated process was still listed after the bounded wait.
    ///
    /// Sets: `index`, `pid`
    KillWaitTimeout,

    /// Worker attached to its pool slot (`Allocated` → `Running`).
    ///
    /// Sets: `index`, `pid`, `workload`
    ProcessAttached,

    /// Attach refused because the slot was not `Allocated`.
    ///
    /// Sets: `index`, `pid`, `reason`
    AttachRejected,

    /// Worker death observed; pool slot moved to `Stopped`.
    ///
    /// Sets: `index`, `pid`, `workload`
    ProcessStopped,

    /// Idle reaper terminated a running worker with no load.
    ///
    /// Sets: `index`, `pid`, `workload`
    IdleReaped,

    /// The OS process list was unavailable; allocation gave up.
    ///
    /// Sets: `workload`, `reason`
    ProcessListUnavailable,

    // === Registry events ===
    /// Worker process inserted into the registry.
    ///
    /// Sets: `reason` (process name), `workload`, `pid`
    RegistryAttached,

    /// Worker process liveness fired; entry removed.
    ///
    /// Sets: `reason` (process name), `workload`, `pid`
    RegistryDied,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and cause)
    SubscriberOverflow,
}

impl EventKind {
    /// Severity of this kind of event.
    pub fn level(&self) -> Level {
        match self {
            EventKind::ForcedEviction
            | EventKind::IdentityMismatch
            | EventKind::PartitionMissing
            | EventKind::OccupyRejected
            | EventKind::ForwardLoop
            | EventKind::KillWaitTimeout
            | EventKind::AttachRejected
            | EventKind::SubscriberOverflow => Level::Warn,
            EventKind::BookkeepingLost
            | EventKind::StoreFailed
            | EventKind::ProcessListUnavailable
            | EventKind::SubscriberPanicked => Level::Error,
            _ => Level::Info,
        }
    }

    /// Short kebab-case label used by log writers.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SlotOccupied => "slot-occupied",
            EventKind::SlotRestored => "slot-restored",
            EventKind::SlotRecycled => "slot-recycled",
            EventKind::SlotReused => "slot-reused",
            EventKind::SlotRetargeted => "slot-retargeted",
            EventKind::ForcedEviction => "forced-eviction",
            EventKind::InstanceCreated => "instance-created",
            EventKind::InstanceRelaunched => "instance-relaunched",
            EventKind::InstanceDestroyed => "instance-destroyed",
            EventKind::IdentityMismatch => "identity-mismatch",
            EventKind::BookkeepingLost => "bookkeeping-lost",
            EventKind::PartitionMissing => "partition-missing",
            EventKind::OccupyRejected => "occupy-rejected",
            EventKind::StoreFailed => "store-failed",
            EventKind::ForwardLoop => "forward-loop",
            EventKind::ProcessAllocated => "process-allocated",
            EventKind::ProcessReused => "process-reused",
            EventKind::ProcessKilled => "process-killed",
            EventKind::KillWaitTimeout => "kill-wait-timeout",
            EventKind::ProcessAttached => "process-attached",
            EventKind::AttachRejected => "attach-rejected",
            EventKind::ProcessStopped => "process-stopped",
            EventKind::IdleReaped => "idle-reaped",
            EventKind::ProcessListUnavailable => "process-list-unavailable",
            EventKind::RegistryAttached => "registry-attached",
            EventKind::RegistryDied => "registry-died",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Container slot id.
    pub slot: Option<Arc<str>>,
    /// Logical component identity (`workload/component`).
    pub identity: Option<Arc<str>>,
    /// Workload id (pool and registry events).
    pub workload: Option<Arc<str>>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Pool slot index.
    pub index: Option<usize>,
    /// Counter payload (terminated instances, hops).
    pub count: Option<usize>,
    /// Human-readable reason or secondary subject.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            slot: None,
            identity: None,
            workload: None,
            pid: None,
            index: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches a container slot id.
    #[inline]
    pub fn with_slot(mut self, slot: impl Into<Arc<str>>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Attaches a rendered logical identity.
    #[inline]
    pub fn with_identity(mut self, identity: impl Into<Arc<str>>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Attaches a workload id.
    #[inline]
    pub fn with_workload(mut self, workload: impl Into<Arc<str>>) -> Self {
        self.workload = Some(workload.into());
        self
    }

    /// Attaches an OS process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a pool slot index.
    #[inline]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attaches a counter payload.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}
