//! Durable storage seam.
//!
//! Each actor owns its own key-value map of JSON records. The actors
//! follow a strict commit order: mutate a working copy, `put` the record,
//! and only then install the copy and notify subscribers. A failed `put`
//! therefore never leaves half-applied state behind.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
#[error("storage operation failed: {0}")]
pub struct StoreError(pub String);

pub trait KvStore: Send {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store backing a single actor.
#[derive(Default)]
pub struct MemStore {
    records: Mutex<HashMap<String, Value>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError("store lock poisoned".into()))?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError("store lock poisoned".into()))?;
        records.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError("store lock poisoned".into()))?;
        records.remove(key);
        Ok(())
    }
}

/// Store that rejects every write. Test double for the commit protocol.
#[cfg(test)]
pub struct FailStore;

#[cfg(test)]
impl KvStore for FailStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
        Err(StoreError("write refused".into()))
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError("delete refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_delete_roundtrip() {
        let store = MemStore::new();
        assert!(store.get("room").expect("get").is_none());
        store.put("room", json!({"phase": "LOBBY"})).expect("put");
        let loaded = store.get("room").expect("get").expect("present");
        assert_eq!(loaded["phase"], "LOBBY");
        store.delete("room").expect("delete");
        assert!(store.get("room").expect("get").is_none());
    }
}
