//! # Host event bus.
//!
//! Every component that changes slot or process state reports it here. The
//! host drains the bus into its [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//!   SlotAllocator        ──┐
//!   ProcessPoolScheduler ──┤
//!   IdleReaper           ──┼──► Bus ──► Host listener ──► SubscriberSet
//!   ProcessRegistry      ──┘
//! ```
//!
//! ## Rules
//! - `publish` is synchronous and never waits, so the allocator may call it
//!   with its table lock held.
//! - The ring buffer is bounded; a lagging receiver loses the oldest events.
//! - Events published with no receiver attached are discarded.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable handle for publishing and observing [`Event`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Ring buffer of `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to current receivers. Fire-and-forget.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn publish_reaches_receivers_subscribed_before_send() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::SlotOccupied).with_slot("slot.N1NRNTS0"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SlotOccupied);
        assert_eq!(ev.slot.as_deref(), Some("slot.N1NRNTS0"));
    }

    #[test]
    fn publish_without_receivers_is_a_noop() {
        let bus = Bus::new(0);
        assert_eq!(bus.receiver_count(), 0);
        bus.publish(Event::new(EventKind::ProcessStopped));
    }
}
