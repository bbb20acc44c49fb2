//! # Subscriber fan-out.
//!
//! [`SubscriberSet`] hands every event to each interested subscriber through
//! a bounded per-subscriber queue, never waiting on any of them.
//!
//! ```text
//! emit(ev) ─┬─ accepts(kind)? ─► try_send ─► [queue] ─► worker ─► on_event()
//!           │                        └─ full/closed ─► SubscriberOverflow on the bus
//!           └─ ...one lane per subscriber
//! ```
//!
//! ## Rules
//! - A lane drops events when its queue is full; other lanes are unaffected.
//! - Each lane is FIFO; there is no ordering across lanes.
//! - A panic inside `on_event` is caught, reported as `SubscriberPanicked`,
//!   and the lane keeps running.
//! - Overflow of an overflow event is not reported again.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// One subscriber's queue and worker.
struct Lane {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
    worker: JoinHandle<()>,
}

/// Set of subscribers fed from the host's event bus.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    bus: Bus,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl SubscriberSet {
    /// Starts one worker per subscriber. Must run inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let lanes = subs
            .into_iter()
            .map(|sub| Self::open_lane(sub, bus.clone()))
            .collect();
        Self { lanes, bus }
    }

    fn open_lane(sub: Arc<dyn Subscribe>, bus: Bus) -> Lane {
        let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
        let worker_sub = Arc::clone(&sub);
        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let handled = std::panic::AssertUnwindSafe(worker_sub.on_event(&ev))
                    .catch_unwind()
                    .await;
                if let Err(payload) = handled {
                    bus.publish(Event::subscriber_panicked(
                        worker_sub.name(),
                        panic_message(payload.as_ref()),
                    ));
                }
            }
        });
        Lane { sub, tx, worker }
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues `event` for every subscriber that accepts its kind.
    pub fn emit(&self, event: &Event) {
        let mut shared: Option<Arc<Event>> = None;
        for lane in &self.lanes {
            if !lane.sub.accepts(event.kind) {
                continue;
            }
            let ev = shared.get_or_insert_with(|| Arc::new(event.clone()));
            self.offer(lane, Arc::clone(ev));
        }
    }

    /// Like [`emit`](Self::emit) for an event that is already shared.
    pub fn emit_arc(&self, event: Arc<Event>) {
        for lane in self.lanes.iter().filter(|l| l.sub.accepts(event.kind)) {
            self.offer(lane, Arc::clone(&event));
        }
    }

    fn offer(&self, lane: &Lane, event: Arc<Event>) {
        let overflow = event.kind == EventKind::SubscriberOverflow;
        let cause = match lane.tx.try_send(event) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(_)) => "full",
            Err(mpsc::error::TrySendError::Closed(_)) => "closed",
        };
        if !overflow {
            self.bus
                .publish(Event::subscriber_overflow(lane.sub.name(), cause));
        }
    }

    /// Closes every queue and waits until the workers have drained them.
    pub async fn shutdown(self) {
        let mut workers = Vec::with_capacity(self.lanes.len());
        for lane in self.lanes {
            drop(lane.tx);
            workers.push(lane.worker);
        }
        for w in workers {
            let _ = w.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
        only_pool: bool,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }

        fn accepts(&self, kind: EventKind) -> bool {
            !self.only_pool || kind.as_label().starts_with("process-")
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicker;

    #[async_trait]
    impl Subscribe for Panicker {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    struct Tiny;

    #[async_trait]
    impl Subscribe for Tiny {
        async fn on_event(&self, _event: &Event) {
            std::future::pending::<()>().await;
        }

        fn name(&self) -> &'static str {
            "tiny"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains_on_shutdown() {
        let bus = Bus::new(16);
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>], bus);

        set.emit(&Event::new(EventKind::SlotOccupied));
        set.emit(&Event::new(EventKind::InstanceCreated));
        set.shutdown().await;

        let seen = rec.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![EventKind::SlotOccupied, EventKind::InstanceCreated]);
    }

    #[tokio::test]
    async fn uninterested_subscribers_are_skipped() {
        let bus = Bus::new(16);
        let rec = Arc::new(Recorder {
            only_pool: true,
            ..Recorder::default()
        });
        let set = SubscriberSet::new(vec![rec.clone() as Arc<dyn Subscribe>], bus);

        set.emit(&Event::new(EventKind::SlotOccupied));
        set.emit(&Event::new(EventKind::ProcessKilled));
        set.shutdown().await;

        assert_eq!(*rec.seen.lock().unwrap(), vec![EventKind::ProcessKilled]);
    }

    #[tokio::test]
    async fn panics_are_reported_on_the_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicker) as Arc<dyn Subscribe>], bus);

        set.emit(&Event::new(EventKind::SlotOccupied));
        set.shutdown().await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert!(ev.reason.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn full_queue_reports_overflow() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Tiny) as Arc<dyn Subscribe>], bus);

        for _ in 0..4 {
            set.emit(&Event::new(EventKind::SlotReused));
        }

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert!(ev.reason.as_deref().unwrap().contains("tiny"));
    }
}
