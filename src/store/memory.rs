use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::RecoveryStore;
use crate::error::StoreError;

/// In-memory [`RecoveryStore`].
///
/// Clones share the same map, so a clone handed to a second allocator
/// behaves like the same store seen after a process restart.
#[derive(Clone, Default, Debug)]
pub struct MemoryStore {
    map: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecoveryStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut map = self.map.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, String>, StoreError> {
        let map = self.map.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::LogicalIdentity;

    #[test]
    fn clones_share_state() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.save_assignment("slot.x", &LogicalIdentity::new("mail", "Inbox"), 7)
            .unwrap();
        let got = b.assignment("slot.x").unwrap().unwrap();
        assert_eq!(got.timestamp, 7);
        assert_eq!(b.assignments().unwrap().len(), 1);
    }

    #[test]
    fn undecodable_values_are_skipped() {
        let s = MemoryStore::new();
        s.set("slot.bad", "nonsense".into()).unwrap();
        s.set("slot.ok", "mail:Inbox:1".into()).unwrap();
        let all = s.assignments().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("slot.ok"));
    }
}
