//! # Slot allocator
//!
//! Places logical identities onto the fixed slots of a [`PartitionTable`].
//!
//! ```text
//! alloc(key, identity)
//!   1. partition configured?            no  → None
//!   2. slot already holds identity?     yes → reuse it
//!   3. slot in None state?              yes → occupy
//!   4. slot without live instances?     yes → occupy the oldest
//!   5. otherwise                            → finish instances of the oldest, occupy
//! ```
//!
//! ## Rules
//! - Every operation runs under one lock over the whole table.
//! - Ties between equally old slots go to the lowest slot index.
//! - `occupy` persists `(slot → identity, timestamp)` before mutating; a store
//!   failure leaves the slot untouched and the allocation returns `None`.
//! - Startup loads the recovery store once; nothing reads it afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use super::identity::{ComponentShape, LogicalIdentity, PartitionKey};
use super::instance::{InstanceId, InstanceRef};
use super::state::{CreateOutcome, SlotSnapshot, SlotStatus};
use super::table::{PartitionTable, SlotLayout};
use crate::events::{Bus, Event, EventKind};
use crate::store::RecoveryStore;

/// Default bound on redirect hops.
pub const DEFAULT_MAX_FORWARD_HOPS: u32 = 3;

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Allocates container slots to logical identities.
pub struct SlotAllocator {
    table: Mutex<PartitionTable>,
    store: Arc<dyn RecoveryStore>,
    bus: Bus,
    max_forward_hops: u32,
}

impl SlotAllocator {
    /// Builds the table from `layout` and restores prior assignments from `store`.
    pub fn new(layout: &SlotLayout, store: Arc<dyn RecoveryStore>, bus: Bus) -> Self {
        let this = Self {
            table: Mutex::new(PartitionTable::build(layout)),
            store,
            bus,
            max_forward_hops: DEFAULT_MAX_FORWARD_HOPS,
        };
        this.restore_all();
        this
    }

    /// Overrides the redirect hop bound.
    pub fn with_max_forward_hops(mut self, hops: u32) -> Self {
        self.max_forward_hops = hops;
        self
    }

    fn lock(&self) -> MutexGuard<'_, PartitionTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn restore_all(&self) {
        let assignments = match self.store.assignments() {
            Ok(a) => a,
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::StoreFailed).with_reason(e.to_string()));
                return;
            }
        };
        let mut table = self.lock();
        for (slot_id, a) in assignments {
            let Some(i) = table.index_of(&slot_id) else {
                continue;
            };
            self.bus.publish(
                Event::new(EventKind::SlotRestored)
                    .with_slot(slot_id)
                    .with_identity(a.identity.to_string()),
            );
            table.slot_mut(i).restore(a.identity, a.timestamp);
        }
    }

    /// Partition a component with this shape is placed in.
    pub fn key_for(&self, shape: &ComponentShape) -> Option<PartitionKey> {
        self.lock().key_for(shape)
    }

    /// Chooses a slot for `identity` inside partition `key`.
    ///
    /// Returns `None` when the partition is not configured, the identity is
    /// malformed, or the recovery store rejected the write.
    pub fn alloc(&self, key: &PartitionKey, identity: &LogicalIdentity) -> Option<String> {
        let mut table = self.lock();
        let Some(indices) = table.indices(key).map(<[usize]>::to_vec) else {
            self.bus.publish(
                Event::new(EventKind::PartitionMissing)
                    .with_identity(identity.to_string())
                    .with_reason(key.to_string()),
            );
            return None;
        };

        if let Some(&i) = indices.iter().find(|&&i| table.slot(i).holds(identity)) {
            let id = table.slot(i).id().to_string();
            self.bus.publish(
                Event::new(EventKind::SlotReused)
                    .with_slot(id.clone())
                    .with_identity(identity.to_string()),
            );
            return Some(id);
        }

        if let Some(&i) = indices
            .iter()
            .find(|&&i| table.slot(i).status() == SlotStatus::None)
        {
            return self
                .occupy_locked(&mut table, i, identity, false)
                .map(|_| table.slot(i).id().to_string());
        }

        let mut idle: Option<usize> = None;
        for &i in &indices {
            if table.slot_mut(i).has_live() {
                continue;
            }
            if idle.is_none_or(|o| table.slot(i).timestamp() < table.slot(o).timestamp()) {
                idle = Some(i);
            }
        }
        if let Some(i) = idle {
            return self
                .occupy_locked(&mut table, i, identity, false)
                .map(|_| table.slot(i).id().to_string());
        }

        let mut oldest = *indices.first()?;
        for &i in &indices {
            if table.slot(i).timestamp() < table.slot(oldest).timestamp() {
                oldest = i;
            }
        }
        let previous = table.slot(oldest).identity().map(ToString::to_string);
        let signalled = self.occupy_locked(&mut table, oldest, identity, true)?;
        let id = table.slot(oldest).id().to_string();
        let mut ev = Event::new(EventKind::ForcedEviction)
            .with_slot(id.clone())
            .with_identity(identity.to_string())
            .with_count(signalled);
        if let Some(previous) = previous {
            ev = ev.with_reason(previous);
        }
        self.bus.publish(ev);
        Some(id)
    }

    /// Persists and applies an assignment.
    ///
    /// With `evict`, live instances are told to finish first. Returns how many
    /// were signalled, or `None` if the assignment was refused.
    fn occupy_locked(
        &self,
        table: &mut PartitionTable,
        index: usize,
        identity: &LogicalIdentity,
        evict: bool,
    ) -> Option<usize> {
        let slot_id = table.slot(index).id().to_string();
        if !identity.is_well_formed() {
            self.bus.publish(
                Event::new(EventKind::OccupyRejected)
                    .with_slot(slot_id)
                    .with_reason(format!("malformed identity {identity}")),
            );
            return None;
        }

        let now = now_millis();
        if let Err(e) = self.store.save_assignment(&slot_id, identity, now) {
            self.bus.publish(
                Event::new(EventKind::StoreFailed)
                    .with_slot(slot_id)
                    .with_reason(e.to_string()),
            );
            return None;
        }

        let slot = table.slot_mut(index);
        let signalled = if evict { slot.finish_all() } else { 0 };
        slot.occupy(identity.clone(), now);
        self.bus.publish(
            Event::new(EventKind::SlotOccupied)
                .with_slot(slot_id)
                .with_identity(identity.to_string()),
        );
        Some(signalled)
    }

    /// Registers a live instance on `slot_id`.
    ///
    /// Returns `false` when the slot is unknown, holds another identity, or
    /// has no bookkeeping at all; the caller must redirect the instance.
    pub fn create(&self, slot_id: &str, identity: &LogicalIdentity, instance: InstanceRef) -> bool {
        let mut table = self.lock();
        let Some(i) = table.index_of(slot_id) else {
            self.bus.publish(
                Event::new(EventKind::BookkeepingLost)
                    .with_slot(slot_id.to_string())
                    .with_identity(identity.to_string())
                    .with_reason("unknown slot"),
            );
            return false;
        };

        let event = |kind| {
            Event::new(kind)
                .with_slot(slot_id.to_string())
                .with_identity(identity.to_string())
        };
        let (ev, accepted) = match table.slot_mut(i).create(identity, instance, now_millis()) {
            CreateOutcome::Created => (event(EventKind::InstanceCreated), true),
            CreateOutcome::Relaunched => (event(EventKind::InstanceRelaunched), true),
            CreateOutcome::Mismatch(registered) => (
                event(EventKind::IdentityMismatch).with_reason(registered.to_string()),
                false,
            ),
            CreateOutcome::NoBookkeeping => (event(EventKind::BookkeepingLost), false),
        };
        self.bus.publish(ev);
        accepted
    }

    /// Unregisters an instance; the slot keeps its identity.
    pub fn destroy_ref(&self, slot_id: &str, instance: InstanceId) -> bool {
        let mut table = self.lock();
        let Some(i) = table.index_of(slot_id) else {
            return false;
        };
        let removed = table.slot_mut(i).destroy_ref(instance);
        if removed {
            self.bus
                .publish(Event::new(EventKind::InstanceDestroyed).with_slot(slot_id.to_string()));
        }
        removed
    }

    /// Copy of an assigned slot; `None` for unknown or free slots.
    pub fn lookup(&self, slot_id: &str) -> Option<SlotSnapshot> {
        let table = self.lock();
        let slot = table.slot(table.index_of(slot_id)?);
        (slot.status() != SlotStatus::None).then(|| slot.snapshot())
    }

    /// Redirect flow: moves `identity` onto `target`, releasing `origin`.
    ///
    /// A free target is occupied; a target holding another identity is
    /// force-occupied without finishing its instances. When origin and target
    /// differ, the origin is recycled. Requests beyond the hop bound are
    /// refused.
    pub fn retarget(
        &self,
        origin: &str,
        target: &str,
        identity: &LogicalIdentity,
        hops: u32,
    ) -> bool {
        if hops > self.max_forward_hops {
            self.bus.publish(
                Event::new(EventKind::ForwardLoop)
                    .with_slot(target.to_string())
                    .with_identity(identity.to_string())
                    .with_count(hops as usize),
            );
            return false;
        }

        let mut table = self.lock();
        let (Some(o), Some(t)) = (table.index_of(origin), table.index_of(target)) else {
            self.bus.publish(
                Event::new(EventKind::BookkeepingLost)
                    .with_slot(target.to_string())
                    .with_identity(identity.to_string())
                    .with_reason(format!("unknown origin {origin} or target")),
            );
            return false;
        };

        if !table.slot(t).holds(identity) {
            let live = {
                let slot = table.slot_mut(t);
                slot.prune();
                slot.snapshot().live_instances
            };
            if table.slot(t).status() != SlotStatus::None && live > 0 {
                self.bus.publish(
                    Event::new(EventKind::ForcedEviction)
                        .with_slot(target.to_string())
                        .with_identity(identity.to_string())
                        .with_count(0)
                        .with_reason(format!("{live} live instances left running")),
                );
            }
            if self.occupy_locked(&mut table, t, identity, false).is_none() {
                return false;
            }
        }

        if o != t {
            let previous = table.slot_mut(o).recycle();
            let mut ev = Event::new(EventKind::SlotRecycled).with_slot(origin.to_string());
            if let Some(previous) = previous {
                ev = ev.with_identity(previous.to_string());
            }
            self.bus.publish(ev);
        }

        self.bus.publish(
            Event::new(EventKind::SlotRetargeted)
                .with_slot(target.to_string())
                .with_identity(identity.to_string())
                .with_reason(origin.to_string()),
        );
        true
    }

    /// Drops dead instance handles everywhere; returns how many were removed.
    pub fn prune(&self) -> usize {
        self.lock().slots_mut().iter_mut().map(|s| s.prune()).sum()
    }

    /// Snapshots of every assigned slot, in table order.
    pub fn dump(&self) -> Vec<SlotSnapshot> {
        self.lock()
            .slots()
            .iter()
            .filter(|s| s.status() != SlotStatus::None)
            .map(|s| s.snapshot())
            .collect()
    }

    /// Total number of slots.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Capacity of one partition.
    pub fn capacity(&self, key: &PartitionKey) -> Option<usize> {
        self.lock().capacity(key)
    }

    /// Every configured partition with its capacity.
    pub fn partitions(&self) -> Vec<(PartitionKey, usize)> {
        self.lock().partitions()
    }
}
