//! Identities and partition keys.
//!
//! A [`LogicalIdentity`] names the component a container slot stands in for.
//! A [`PartitionKey`] names the disjoint group of slots an identity may be
//! placed in; it is derived from a [`ComponentShape`] by
//! [`SlotAllocator::key_for`](crate::SlotAllocator::key_for).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator used by the recovery store encoding; not allowed inside identities.
pub(crate) const FIELD_SEPARATOR: char = ':';

/// `(workload, component)` pair a slot is currently standing in for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalIdentity {
    workload: String,
    component: String,
}

impl LogicalIdentity {
    /// Creates an identity. Well-formedness is checked where it matters (`occupy`).
    pub fn new(workload: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            workload: workload.into(),
            component: component.into(),
        }
    }

    pub fn workload(&self) -> &str {
        &self.workload
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Both parts non-empty and free of the store field separator.
    pub fn is_well_formed(&self) -> bool {
        let ok = |s: &str| !s.is_empty() && !s.contains(FIELD_SEPARATOR);
        ok(&self.workload) && ok(&self.component)
    }
}

impl fmt::Display for LogicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workload, self.component)
    }
}

/// Declared re-launch semantics of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaunchMode {
    Multiple,
    SingleTop,
    SingleTask,
    SingleInstance,
}

impl LaunchMode {
    /// Every mode, in slot-id order.
    pub const ALL: [LaunchMode; 4] = [
        LaunchMode::Multiple,
        LaunchMode::SingleTop,
        LaunchMode::SingleTask,
        LaunchMode::SingleInstance,
    ];

    /// Infix used in slot ids.
    pub fn infix(&self) -> &'static str {
        match self {
            LaunchMode::Multiple => "NR",
            LaunchMode::SingleTop => "STP",
            LaunchMode::SingleTask => "ST",
            LaunchMode::SingleInstance => "SI",
        }
    }
}

/// Which process family a partition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessScope {
    /// The main (UI) process.
    Main,
    /// A custom process declared by configuration, numbered from 0.
    Custom(u8),
}

impl ProcessScope {
    /// Tag used in slot ids: `N1` for main, `P<n>` for custom processes.
    pub fn tag(&self) -> String {
        match self {
            ProcessScope::Main => "N1".to_string(),
            ProcessScope::Custom(n) => format!("P{n}"),
        }
    }
}

/// Disjoint partition of the slot table.
///
/// `group` is `None` for the default task-affinity group, `Some(g)` for the
/// `g`-th non-default affinity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub scope: ProcessScope,
    pub group: Option<u8>,
    pub mode: LaunchMode,
    pub transparent: bool,
}

impl PartitionKey {
    /// Default-group partition in the main process.
    pub fn main(mode: LaunchMode, transparent: bool) -> Self {
        Self {
            scope: ProcessScope::Main,
            group: None,
            mode,
            transparent,
        }
    }

    /// Same key moved to an affinity group.
    pub fn in_group(mut self, group: u8) -> Self {
        self.group = Some(group);
        self
    }

    /// Same key moved to another process scope.
    pub fn in_scope(mut self, scope: ProcessScope) -> Self {
        self.scope = scope;
        self
    }

    /// Slot id prefix (without the table-wide prefix and the index).
    pub(crate) fn id_stem(&self) -> String {
        let group = self.group.map(|g| format!("TA{g}")).unwrap_or_default();
        let ts = if self.transparent { "TS" } else { "NTS" };
        format!("{}{}{}{}", self.scope.tag(), group, self.mode.infix(), ts)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id_stem())
    }
}

/// Launch characteristics of a component, as declared by its workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentShape {
    pub scope: ProcessScope,
    pub mode: LaunchMode,
    pub transparent: bool,
    /// Non-default task affinity; `None` means the workload's default task.
    pub task_affinity: Option<String>,
}

impl ComponentShape {
    /// Main-process component with default task affinity.
    pub fn new(mode: LaunchMode, transparent: bool) -> Self {
        Self {
            scope: ProcessScope::Main,
            mode,
            transparent,
            task_affinity: None,
        }
    }

    pub fn with_affinity(mut self, affinity: impl Into<String>) -> Self {
        self.task_affinity = Some(affinity.into());
        self
    }

    pub fn with_scope(mut self, scope: ProcessScope) -> Self {
        self.scope = scope;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_rejects_empty_and_separator() {
        assert!(LogicalIdentity::new("mail", "Inbox").is_well_formed());
        assert!(!LogicalIdentity::new("", "Inbox").is_well_formed());
        assert!(!LogicalIdentity::new("mail", "").is_well_formed());
        assert!(!LogicalIdentity::new("mail:x", "Inbox").is_well_formed());
    }

    #[test]
    fn id_stem_encodes_every_dimension() {
        let key = PartitionKey::main(LaunchMode::SingleTop, true);
        assert_eq!(key.id_stem(), "N1STPTS");

        let key = PartitionKey::main(LaunchMode::Multiple, false)
            .in_group(1)
            .in_scope(ProcessScope::Custom(2));
        assert_eq!(key.id_stem(), "P2TA1NRNTS");
    }
}
