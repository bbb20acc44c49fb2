//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the slot allocator, the
//! process pool scheduler, the idle reaper and the process registry.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Level`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SlotAllocator`, `ProcessPoolScheduler`, the idle reaper,
//!   `ProcessRegistry` liveness watchers, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Host::subscriber_listener()` (fans out to `SubscriberSet`).
//!
//! Publishing never blocks, so the synchronous allocator paths publish from
//! inside their critical sections without awaiting anything.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Level};
