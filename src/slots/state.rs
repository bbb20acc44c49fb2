//! # Per-slot bookkeeping.
//!
//! A [`SlotState`] tracks one container slot: which identity it currently
//! stands in for, when it was assigned, and which live instances run on it.
//!
//! ```text
//!            occupy                  create (same identity)
//!   None ────────────► Occupied ◄──────────────────────── Restored
//!    ▲                    │                                  ▲
//!    │     recycle        │ occupy (re-targeting)            │ restore
//!    └────────────────────┘                                  │ (startup)
//!                                                    recovery store
//! ```
//!
//! ## Rules
//! - `Occupied`/`Restored` slots always carry an identity; `None` slots carry none.
//! - `instances` only ever holds handles that were alive when last inspected.
//! - The state methods never touch the recovery store; persisting is the
//!   allocator's job.

use serde::{Deserialize, Serialize};

use super::identity::{LogicalIdentity, PartitionKey};
use super::instance::{InstanceId, InstanceRef};

/// Slot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotStatus {
    /// Free; never assigned or released by the redirect flow.
    None,
    /// Assigned during this run.
    Occupied,
    /// Assignment rebuilt from the recovery store; no instance created yet.
    Restored,
}

/// Outcome of registering an instance on a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CreateOutcome {
    Created,
    /// The slot was `Restored`; it is `Occupied` now.
    Relaunched,
    /// The slot is registered for a different identity.
    Mismatch(LogicalIdentity),
    /// The slot has no identity at all.
    NoBookkeeping,
}

/// Mutable state of one container slot.
#[derive(Clone)]
pub struct SlotState {
    id: String,
    key: PartitionKey,
    status: SlotStatus,
    identity: Option<LogicalIdentity>,
    timestamp: i64,
    instances: Vec<InstanceRef>,
}

impl SlotState {
    pub(crate) fn new(id: String, key: PartitionKey) -> Self {
        Self {
            id,
            key,
            status: SlotStatus::None,
            identity: None,
            timestamp: 0,
            instances: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> PartitionKey {
        self.key
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&LogicalIdentity> {
        self.identity.as_ref()
    }

    /// Epoch milliseconds of the last assignment.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub(crate) fn holds(&self, identity: &LogicalIdentity) -> bool {
        self.status != SlotStatus::None && self.identity.as_ref() == Some(identity)
    }

    /// Assigns the slot and forgets any instance handles it still had.
    pub(crate) fn occupy(&mut self, identity: LogicalIdentity, timestamp: i64) {
        self.status = SlotStatus::Occupied;
        self.identity = Some(identity);
        self.timestamp = timestamp;
        self.instances.clear();
    }

    /// Rebuilds an assignment from persisted data.
    pub(crate) fn restore(&mut self, identity: LogicalIdentity, timestamp: i64) {
        self.status = SlotStatus::Restored;
        self.identity = Some(identity);
        self.timestamp = timestamp;
    }

    /// Releases the slot and returns the identity it held.
    pub(crate) fn recycle(&mut self) -> Option<LogicalIdentity> {
        self.status = SlotStatus::None;
        self.timestamp = 0;
        self.instances.clear();
        self.identity.take()
    }

    /// Registers a live instance after checking the identity and bumps the
    /// assignment timestamp.
    pub(crate) fn create(
        &mut self,
        identity: &LogicalIdentity,
        instance: InstanceRef,
        timestamp: i64,
    ) -> CreateOutcome {
        let Some(registered) = &self.identity else {
            return CreateOutcome::NoBookkeeping;
        };
        if registered != identity {
            return CreateOutcome::Mismatch(registered.clone());
        }
        let id = instance.id();
        if !self.instances.iter().any(|i| i.id() == id) {
            self.instances.push(instance);
        }
        self.timestamp = self.timestamp.max(timestamp);
        if self.status == SlotStatus::Restored {
            self.status = SlotStatus::Occupied;
            return CreateOutcome::Relaunched;
        }
        CreateOutcome::Created
    }

    /// Unregisters an instance; returns `true` if it was present.
    pub(crate) fn destroy_ref(&mut self, instance: InstanceId) -> bool {
        let before = self.instances.len();
        self.instances.retain(|i| i.id() != instance);
        self.instances.len() != before
    }

    /// Drops dead handles and returns how many were removed.
    pub(crate) fn prune(&mut self) -> usize {
        let before = self.instances.len();
        self.instances.retain(|i| i.is_alive());
        before - self.instances.len()
    }

    pub(crate) fn has_live(&mut self) -> bool {
        self.prune();
        !self.instances.is_empty()
    }

    /// Asks every live instance to finish and forgets all handles.
    ///
    /// Returns how many live instances were signalled.
    pub(crate) fn finish_all(&mut self) -> usize {
        let mut signalled = 0;
        for inst in self.instances.drain(..) {
            if inst.is_alive() {
                inst.finish();
                signalled += 1;
            }
        }
        signalled
    }

    /// Point-in-time copy of the slot.
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            id: self.id.clone(),
            partition: self.key,
            status: self.status,
            identity: self.identity.clone(),
            timestamp: self.timestamp,
            live_instances: self.instances.iter().filter(|i| i.is_alive()).count(),
        }
    }
}

impl std::fmt::Debug for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotState")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("identity", &self.identity)
            .field("timestamp", &self.timestamp)
            .field("instances", &self.instances.len())
            .finish()
    }
}

/// Serializable copy of a [`SlotState`], as returned by `lookup` and `dump`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub id: String,
    pub partition: PartitionKey,
    pub status: SlotStatus,
    pub identity: Option<LogicalIdentity>,
    pub timestamp: i64,
    pub live_instances: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::identity::LaunchMode;
    use crate::slots::instance::{Instance, TokenInstance};

    fn slot() -> SlotState {
        SlotState::new(
            "slot.N1NRNTS0".into(),
            PartitionKey::main(LaunchMode::Multiple, false),
        )
    }

    #[test]
    fn create_checks_identity() {
        let mut s = slot();
        let a = LogicalIdentity::new("mail", "Inbox");
        let b = LogicalIdentity::new("mail", "Compose");

        assert_eq!(s.create(&a, TokenInstance::new(), 20), CreateOutcome::NoBookkeeping);

        s.occupy(a.clone(), 10);
        assert_eq!(s.create(&b, TokenInstance::new(), 20), CreateOutcome::Mismatch(a.clone()));
        assert_eq!(s.create(&a, TokenInstance::new(), 20), CreateOutcome::Created);
        assert!(s.has_live());
    }

    #[test]
    fn restored_slot_relaunches_once() {
        let mut s = slot();
        let a = LogicalIdentity::new("mail", "Inbox");
        s.restore(a.clone(), 5);
        assert_eq!(s.status(), SlotStatus::Restored);
        assert_eq!(s.create(&a, TokenInstance::new(), 20), CreateOutcome::Relaunched);
        assert_eq!(s.status(), SlotStatus::Occupied);
        assert_eq!(s.create(&a, TokenInstance::new(), 20), CreateOutcome::Created);
    }

    #[test]
    fn dead_handles_are_pruned() {
        let mut s = slot();
        let a = LogicalIdentity::new("mail", "Inbox");
        s.occupy(a.clone(), 1);
        let inst = TokenInstance::new();
        s.create(&a, inst.clone(), 20);
        inst.finish();
        assert!(!s.has_live());
        assert_eq!(s.snapshot().live_instances, 0);
    }

    #[test]
    fn finish_all_signals_live_only() {
        let mut s = slot();
        let a = LogicalIdentity::new("mail", "Inbox");
        s.occupy(a.clone(), 1);
        let live = TokenInstance::new();
        let dead = TokenInstance::new();
        dead.finish();
        s.create(&a, live.clone(), 20);
        s.create(&a, dead, 20);
        assert_eq!(s.finish_all(), 1);
        assert!(!live.is_alive());
        assert!(!s.has_live());
    }

    #[test]
    fn recycle_clears_identity() {
        let mut s = slot();
        s.occupy(LogicalIdentity::new("mail", "Inbox"), 1);
        assert_eq!(s.recycle(), Some(LogicalIdentity::new("mail", "Inbox")));
        assert_eq!(s.status(), SlotStatus::None);
        assert!(s.identity().is_none());
    }
}
