//! # Subscriber extension point.
//!
//! A [`Subscribe`] implementation observes allocation, eviction and worker
//! lifecycle events. Typical uses: shipping logs, counting forced evictions,
//! alerting when the process list keeps failing.
//!
//! The [`SubscriberSet`](crate::SubscriberSet) gives each subscriber its own
//! bounded queue and worker task. [`Subscribe::accepts`] is checked before
//! queueing, so a subscriber only interested in the pool does not fill its
//! queue with slot traffic.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use async_trait::async_trait;
//! use slotvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct EvictionCounter(AtomicUsize);
//!
//! #[async_trait]
//! impl Subscribe for EvictionCounter {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn accepts(&self, kind: EventKind) -> bool {
//!         kind == EventKind::ForcedEviction
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "eviction-counter"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Observer of host events.
///
/// `on_event` runs on the subscriber's own worker task; a slow or panicking
/// subscriber only hurts itself.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Whether events of this kind should be queued at all. Default: all.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }

    /// Name reported in overflow and panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
