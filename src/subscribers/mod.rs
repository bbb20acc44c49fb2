//! # Event subscribers for the slotvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and an optional built-in [`LogWriter`] for events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//!   SlotAllocator / ProcessPoolScheduler ── publish(Event) ──► Bus
//!                                                              │
//!                                      Host::subscriber_listener
//!                                                              ▼
//!                                                       SubscriberSet
//!                                          ┌──────────────┬────┴─────────┐
//!                                          ▼              ▼              ▼
//!                                      LogWriter       Metrics        Custom
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
