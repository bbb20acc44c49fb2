//! # Process pool
//!
//! A small fixed pool of worker-process slots shared by an open-ended set of
//! workloads.
//!
//! - `slot`: [`ProcessSlot`] state machine and priority ladder
//! - `control`: [`ProcessControl`], the OS boundary
//! - `scheduler`: [`ProcessPoolScheduler`], selection, eviction and load tracking
//! - `reaper`: idle worker reclamation

mod control;
mod reaper;
mod scheduler;
mod slot;

pub use control::{NoProcessControl, OsProcess, ProcessControl, pool_index};
pub use scheduler::ProcessPoolScheduler;
pub use slot::{LoadKind, PRIORITY_MAX, ProcessSlot, ProcessSlotSnapshot, ProcessState};

#[cfg(test)]
pub(crate) use control::testing;
