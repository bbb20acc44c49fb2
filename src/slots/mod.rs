//! # Container slots
//!
//! A fixed set of pre-declared slots stands in for an open-ended set of
//! logical components.
//!
//! - `identity`: identities, launch modes, partition keys and shapes
//! - `instance`: live-instance handles
//! - `state`: per-slot state machine and snapshots
//! - `table`: layout and partition index
//! - `allocator`: [`SlotAllocator`], the public entry point

mod allocator;
pub(crate) mod identity;
mod instance;
mod state;
mod table;

pub use allocator::{DEFAULT_MAX_FORWARD_HOPS, SlotAllocator};
pub use identity::{ComponentShape, LaunchMode, LogicalIdentity, PartitionKey, ProcessScope};
pub use instance::{Instance, InstanceId, InstanceRef, TokenInstance};
pub use state::{SlotSnapshot, SlotState, SlotStatus};
pub use table::{ModeCounts, PartitionTable, SlotLayout};
