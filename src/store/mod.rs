//! # Recovery store
//!
//! Durable `slot id -> "workload:component:timestamp"` map the
//! [`SlotAllocator`](crate::SlotAllocator) writes on every `occupy` and reads
//! once, in bulk, at startup.
//!
//! ## Contents
//! - [`RecoveryStore`] raw string key/value contract, plus typed helpers
//! - [`Assignment`] decoded value and its stable encoding
//! - [`MemoryStore`] shared in-memory store (tests, single-process hosts)
//! - [`FileStore`] JSON file shared by every process of an installation,
//!   merged and replaced atomically under a file lock on each write
//!
//! ## Rules
//! - Last write wins per key; no transactions.
//! - Values that do not decode are skipped, never fatal.

mod file;
mod memory;
mod record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::Assignment;

use std::collections::HashMap;

use crate::error::StoreError;
use crate::slots::LogicalIdentity;

/// Durable key/value store shared by every process of one installation.
pub trait RecoveryStore: Send + Sync + 'static {
    /// Raw value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Every stored pair.
    fn get_all(&self) -> Result<HashMap<String, String>, StoreError>;

    /// Decoded assignment for one slot.
    fn assignment(&self, slot_id: &str) -> Result<Option<Assignment>, StoreError> {
        Ok(self.get(slot_id)?.as_deref().and_then(Assignment::decode))
    }

    /// Persists an assignment for one slot.
    fn save_assignment(
        &self,
        slot_id: &str,
        identity: &LogicalIdentity,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        let value = Assignment {
            identity: identity.clone(),
            timestamp,
        }
        .encode();
        self.set(slot_id, value)
    }

    /// Every assignment that decodes.
    fn assignments(&self) -> Result<HashMap<String, Assignment>, StoreError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter_map(|(k, v)| Assignment::decode(&v).map(|a| (k, a)))
            .collect())
    }
}
