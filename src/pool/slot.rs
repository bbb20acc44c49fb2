//! # Pool slot state machine.
//!
//! ```text
//!   Unused ──allocate──► Allocated ──attach──► Running ──death/reap──► Stopped
//!                          ▲                                             │
//!                          └────────────────allocate─────────────────────┘
//! ```
//!
//! ## Rules
//! - `pid > 0` only while `Running`.
//! - `workload` survives `Stopped`, so the same workload still ranks first.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Highest selection priority.
pub const PRIORITY_MAX: u32 = u32::MAX;

/// Lifecycle state of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    Unused,
    Allocated,
    Running,
    Stopped,
}

/// Load counter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadKind {
    Activity,
    Service,
    Binder,
}

/// One worker process slot.
#[derive(Debug)]
pub struct ProcessSlot {
    index: usize,
    state: ProcessState,
    workload: Option<String>,
    pid: u32,
    liveness: Option<CancellationToken>,
    last_modified: Instant,
    activities: i32,
    services: i32,
    binders: i32,
}

impl ProcessSlot {
    pub(crate) fn new(index: usize, now: Instant) -> Self {
        Self {
            index,
            state: ProcessState::Unused,
            workload: None,
            pid: 0,
            liveness: None,
            last_modified: now,
            activities: 0,
            services: 0,
            binders: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn workload(&self) -> Option<&str> {
        self.workload.as_deref()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn last_modified(&self) -> Instant {
        self.last_modified
    }

    /// Sum of all load counters.
    pub fn active_count(&self) -> i32 {
        self.activities + self.services + self.binders
    }

    /// No counter above zero.
    pub fn is_idle(&self) -> bool {
        self.activities <= 0 && self.services <= 0 && self.binders <= 0
    }

    pub(crate) fn is_claimed(&self) -> bool {
        matches!(self.state, ProcessState::Allocated | ProcessState::Running)
    }

    /// How strongly this slot should be picked for `workload` (higher wins).
    pub fn priority(&self, workload: &str, now: Instant, stale: Duration) -> u32 {
        if self.workload.as_deref() == Some(workload) {
            PRIORITY_MAX
        } else if self.state == ProcessState::Unused {
            PRIORITY_MAX - 1
        } else if self.state == ProcessState::Stopped {
            PRIORITY_MAX - 2
        } else if now.saturating_duration_since(self.last_modified) > stale {
            PRIORITY_MAX - 3
        } else if self.active_count() <= 0 {
            PRIORITY_MAX - 4
        } else {
            0
        }
    }

    /// Claims the slot for `workload` with fresh counters.
    pub(crate) fn reset(&mut self, workload: &str, now: Instant) {
        self.state = ProcessState::Allocated;
        self.workload = Some(workload.to_string());
        self.pid = 0;
        self.liveness = None;
        self.last_modified = now;
        self.activities = 0;
        self.services = 0;
        self.binders = 0;
    }

    pub(crate) fn attach(&mut self, pid: u32, liveness: CancellationToken, now: Instant) {
        self.state = ProcessState::Running;
        self.pid = pid;
        self.liveness = Some(liveness);
        self.last_modified = now;
    }

    /// The worker is gone; keeps the workload.
    pub(crate) fn stop(&mut self, now: Instant) {
        self.state = ProcessState::Stopped;
        self.pid = 0;
        self.liveness = None;
        self.last_modified = now;
        self.activities = 0;
        self.services = 0;
        self.binders = 0;
    }

    pub(crate) fn adjust(&mut self, kind: LoadKind, delta: i32, now: Instant) {
        let counter = match kind {
            LoadKind::Activity => &mut self.activities,
            LoadKind::Service => &mut self.services,
            LoadKind::Binder => &mut self.binders,
        };
        *counter = counter.saturating_add(delta);
        self.last_modified = now;
    }

    pub fn snapshot(&self, now: Instant) -> ProcessSlotSnapshot {
        ProcessSlotSnapshot {
            index: self.index,
            state: self.state,
            workload: self.workload.clone(),
            pid: self.pid,
            activities: self.activities,
            services: self.services,
            binders: self.binders,
            idle_for_ms: u64::try_from(
                now.saturating_duration_since(self.last_modified)
                    .as_millis(),
            )
            .unwrap_or(u64::MAX),
        }
    }
}

/// Serializable copy of a [`ProcessSlot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSlotSnapshot {
    pub index: usize,
    pub state: ProcessState,
    pub workload: Option<String>,
    pub pid: u32,
    pub activities: i32,
    pub services: i32,
    pub binders: i32,
    /// Time since the slot was last touched.
    pub idle_for_ms: u64,
}
