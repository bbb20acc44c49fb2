use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::HostConfig;
use super::host::Host;
use crate::events::Bus;
use crate::pool::{NoProcessControl, ProcessControl, ProcessPoolScheduler};
use crate::registry::ProcessRegistry;
use crate::slots::SlotAllocator;
use crate::store::{MemoryStore, RecoveryStore};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Host`].
pub struct HostBuilder {
    cfg: HostConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    store: Option<Arc<dyn RecoveryStore>>,
    control: Option<Arc<dyn ProcessControl>>,
}

impl HostBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: HostConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            store: None,
            control: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the recovery store. Defaults to a fresh [`MemoryStore`].
    pub fn with_store(mut self, store: Arc<dyn RecoveryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets OS process control. Without it, pool allocation always fails.
    pub fn with_process_control(mut self, control: Arc<dyn ProcessControl>) -> Self {
        self.control = Some(control);
        self
    }

    /// Builds the host.
    ///
    /// Must be called inside a tokio runtime: it spawns the subscriber workers
    /// and the listener. Slot restoration events are already delivered to
    /// the subscribers.
    pub fn build(self) -> Arc<Host> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let rx = bus.subscribe();
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let control = self
            .control
            .unwrap_or_else(|| Arc::new(NoProcessControl));

        let slots = SlotAllocator::new(&self.cfg.layout, store, bus.clone())
            .with_max_forward_hops(self.cfg.max_forward_hops);
        let pool =
            ProcessPoolScheduler::new(&self.cfg, control, bus.clone(), runtime_token.clone());
        let registry = ProcessRegistry::new(bus.clone(), runtime_token.clone());

        let host = Arc::new(Host::new_internal(
            self.cfg,
            bus,
            slots,
            pool,
            registry,
            runtime_token,
        ));
        host.subscriber_listener(rx, subs);
        host
    }
}
