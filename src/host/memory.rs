//! 메모리 기반 HostPersistentStore (테스트/임시 호스트용)

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::host::HostPersistentStore;

/// 키 순서가 고정된(BTreeMap) 메모리 저장소
#[derive(Debug, Default)]
pub struct MemoryHostStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryHostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::LockPoisoned(err.to_string())
}

impl HostPersistentStore for MemoryHostStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crud_and_sorted_keys() {
        let store = MemoryHostStore::new();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        store.set("a", "3").unwrap();

        assert_eq!(store.get("a").unwrap(), Some("3".to_string()));
        assert_eq!(store.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

        store.delete("a").unwrap();
        store.delete("missing").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_len_survives_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryHostStore::new());
        store.set("a", "1").unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert!(matches!(store.get("a"), Err(StoreError::LockPoisoned(_))));
    }
}
