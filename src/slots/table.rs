//! # Partition table
//!
//! Fixed index from [`PartitionKey`] to an ordered run of [`SlotState`]s,
//! built once from a [`SlotLayout`] and never resized.
//!
//! ```text
//! scope (N1, P0..Pn)
//!   └─ group (default, TA0..TAg)
//!        └─ mode (NR, STP, ST, SI) × transparency (TS, NTS)
//!             └─ slot.<scope><group><mode><TS|NTS><i>   i = 0..count
//! ```
//!
//! ## Rules
//! - Every slot belongs to exactly one partition.
//! - Slot ids are unique across the table.
//! - Slots of a partition are kept in index order; scans rely on it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::identity::{ComponentShape, LaunchMode, PartitionKey, ProcessScope};
use super::state::SlotState;

/// Slot counts for the four launch modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCounts {
    pub multiple: usize,
    pub single_top: usize,
    pub single_task: usize,
    pub single_instance: usize,
}

impl ModeCounts {
    pub fn get(&self, mode: LaunchMode) -> usize {
        match mode {
            LaunchMode::Multiple => self.multiple,
            LaunchMode::SingleTop => self.single_top,
            LaunchMode::SingleTask => self.single_task,
            LaunchMode::SingleInstance => self.single_instance,
        }
    }
}

/// Static shape of the slot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    /// Counts for visually-transparent partitions.
    pub transparent: ModeCounts,
    /// Counts for opaque partitions.
    pub opaque: ModeCounts,
    /// Number of non-default task-affinity groups per scope.
    pub affinity_groups: u8,
    /// Number of custom process scopes (`P0..`).
    pub custom_processes: u8,
    /// Prefix of every slot id.
    pub prefix: String,
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            transparent: ModeCounts {
                multiple: 2,
                single_top: 2,
                single_task: 2,
                single_instance: 3,
            },
            opaque: ModeCounts {
                multiple: 6,
                single_top: 2,
                single_task: 3,
                single_instance: 2,
            },
            affinity_groups: 2,
            custom_processes: 3,
            prefix: "slot.".to_string(),
        }
    }
}

impl SlotLayout {
    /// Slots per partition for a mode/transparency pair.
    pub fn count(&self, mode: LaunchMode, transparent: bool) -> usize {
        if transparent {
            self.transparent.get(mode)
        } else {
            self.opaque.get(mode)
        }
    }

    fn scopes(&self) -> impl Iterator<Item = ProcessScope> {
        std::iter::once(ProcessScope::Main)
            .chain((0..self.custom_processes).map(ProcessScope::Custom))
    }

    fn groups(&self) -> impl Iterator<Item = Option<u8>> {
        std::iter::once(None).chain((0..self.affinity_groups).map(Some))
    }
}

/// First-come assignment of task-affinity strings to group indices.
#[derive(Debug, Clone, Default)]
pub(crate) struct AffinityGroups {
    limit: u8,
    assigned: Vec<String>,
}

impl AffinityGroups {
    fn new(limit: u8) -> Self {
        Self {
            limit,
            assigned: Vec::new(),
        }
    }

    /// Group index for `affinity`; `None` once every group is taken.
    fn resolve(&mut self, affinity: &str) -> Option<u8> {
        if let Some(pos) = self.assigned.iter().position(|a| a == affinity) {
            return u8::try_from(pos).ok();
        }
        if self.assigned.len() >= usize::from(self.limit) {
            return None;
        }
        self.assigned.push(affinity.to_string());
        u8::try_from(self.assigned.len() - 1).ok()
    }
}

/// Slots grouped by partition.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    slots: Vec<SlotState>,
    partitions: HashMap<PartitionKey, Vec<usize>>,
    by_id: HashMap<String, usize>,
    custom_processes: u8,
    affinity: AffinityGroups,
}

impl PartitionTable {
    /// Creates every slot described by `layout`, all in the `None` state.
    pub fn build(layout: &SlotLayout) -> Self {
        let mut slots = Vec::new();
        let mut partitions: HashMap<PartitionKey, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::new();

        for scope in layout.scopes() {
            for group in layout.groups() {
                for mode in LaunchMode::ALL {
                    for transparent in [true, false] {
                        let count = layout.count(mode, transparent);
                        if count == 0 {
                            continue;
                        }
                        let key = PartitionKey {
                            scope,
                            group,
                            mode,
                            transparent,
                        };
                        let stem = key.id_stem();
                        let run = partitions.entry(key).or_default();
                        for i in 0..count {
                            let id = format!("{}{}{}", layout.prefix, stem, i);
                            by_id.insert(id.clone(), slots.len());
                            run.push(slots.len());
                            slots.push(SlotState::new(id, key));
                        }
                    }
                }
            }
        }

        Self {
            slots,
            partitions,
            by_id,
            custom_processes: layout.custom_processes,
            affinity: AffinityGroups::new(layout.affinity_groups),
        }
    }

    /// Total number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Capacity of a partition, `None` if it is not configured.
    pub fn capacity(&self, key: &PartitionKey) -> Option<usize> {
        self.partitions.get(key).map(Vec::len)
    }

    /// Every configured partition with its capacity.
    pub fn partitions(&self) -> Vec<(PartitionKey, usize)> {
        self.partitions.iter().map(|(k, v)| (*k, v.len())).collect()
    }

    pub(crate) fn indices(&self, key: &PartitionKey) -> Option<&[usize]> {
        self.partitions.get(key).map(Vec::as_slice)
    }

    pub(crate) fn index_of(&self, slot_id: &str) -> Option<usize> {
        self.by_id.get(slot_id).copied()
    }

    pub(crate) fn slot(&self, index: usize) -> &SlotState {
        &self.slots[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut SlotState {
        &mut self.slots[index]
    }

    pub(crate) fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [SlotState] {
        &mut self.slots
    }

    /// Resolves the partition a component shape belongs to.
    ///
    /// `SingleInstance` always lands in the default group. A non-default task
    /// affinity claims a group the first time it is seen; once all groups are
    /// claimed, new affinities resolve to `None`.
    pub(crate) fn key_for(&mut self, shape: &ComponentShape) -> Option<PartitionKey> {
        if matches!(shape.scope, ProcessScope::Custom(n) if n >= self.custom_processes) {
            return None;
        }
        let key = PartitionKey {
            scope: shape.scope,
            group: None,
            mode: shape.mode,
            transparent: shape.transparent,
        };
        match (&shape.task_affinity, shape.mode) {
            (_, LaunchMode::SingleInstance) | (None, _) => Some(key),
            (Some(affinity), _) => self.affinity.resolve(affinity).map(|g| key.in_group(g)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_unique_ids() {
        let table = PartitionTable::build(&SlotLayout::default());
        // 4 scopes × 3 groups × (9 transparent + 13 opaque)
        assert_eq!(table.len(), 4 * 3 * 22);
        assert_eq!(table.by_id.len(), table.len());
        assert_eq!(table.slot(0).id(), "slot.N1NRTS0");
        assert_eq!(
            table.capacity(&PartitionKey::main(LaunchMode::Multiple, false)),
            Some(6)
        );
    }

    #[test]
    fn zero_count_partitions_are_missing() {
        let mut layout = SlotLayout::default();
        layout.opaque.single_top = 0;
        let table = PartitionTable::build(&layout);
        assert_eq!(
            table.capacity(&PartitionKey::main(LaunchMode::SingleTop, false)),
            None
        );
    }

    #[test]
    fn affinity_groups_are_stable_then_exhausted() {
        let mut table = PartitionTable::build(&SlotLayout::default());
        let shape = |a: &str| ComponentShape::new(LaunchMode::SingleTop, false).with_affinity(a);

        let first = table.key_for(&shape("com.a")).unwrap();
        assert_eq!(first.group, Some(0));
        assert_eq!(table.key_for(&shape("com.b")).unwrap().group, Some(1));
        assert_eq!(table.key_for(&shape("com.a")).unwrap().group, Some(0));
        assert_eq!(table.key_for(&shape("com.c")), None);
    }

    #[test]
    fn single_instance_ignores_affinity() {
        let mut table = PartitionTable::build(&SlotLayout::default());
        let shape = ComponentShape::new(LaunchMode::SingleInstance, true).with_affinity("com.a");
        assert_eq!(table.key_for(&shape).unwrap().group, None);
    }

    #[test]
    fn unknown_custom_scope_has_no_key() {
        let mut table = PartitionTable::build(&SlotLayout::default());
        let shape =
            ComponentShape::new(LaunchMode::Multiple, false).with_scope(ProcessScope::Custom(9));
        assert_eq!(table.key_for(&shape), None);
        let shape =
            ComponentShape::new(LaunchMode::Multiple, false).with_scope(ProcessScope::Custom(2));
        assert!(table.key_for(&shape).is_some());
    }
}
