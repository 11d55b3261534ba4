//! Typed record storage over a confidential key-value backend.
//!
//! Records are encoded as JSON before they reach the backend. A payload that
//! no longer decodes is reported as [`StoreError::Corrupt`], distinct from a
//! key that was never written ([`StoreError::NotFound`]).

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

mod backend;
pub use backend::{FileBackend, MemoryBackend, StoreBackend};

mod error;
pub use error::StoreError;

/// Typed get/set/delete over a shared [`StoreBackend`].
#[derive(Clone)]
pub struct SecureRecordStore {
    backend: Arc<dyn StoreBackend>,
}

impl SecureRecordStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn get<R: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<R, StoreError> {
        let payload = self
            .backend
            .read(namespace, key)
            .map_err(|source| StoreError::ReadFailed {
                namespace: namespace.to_owned(),
                key: key.to_owned(),
                source,
            })?
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_owned(),
                key: key.to_owned(),
            })?;

        serde_json::from_slice(&payload).map_err(|source| StoreError::Corrupt {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            source,
        })
    }

    pub fn set<R: Serialize>(&self, namespace: &str, key: &str, record: &R) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(record).map_err(|source| StoreError::Encode {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            source,
        })?;

        self.backend
            .write(namespace, key, &payload)
            .map_err(|source| StoreError::WriteFailed {
                namespace: namespace.to_owned(),
                key: key.to_owned(),
                source,
            })
    }

    /// Delete `key`. Deleting a missing key is not an error.
    pub fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.backend
            .remove(namespace, key)
            .map_err(|source| StoreError::WriteFailed {
                namespace: namespace.to_owned(),
                key: key.to_owned(),
                source,
            })
    }

    pub fn accounts(&self, namespace: &str) -> Result<Vec<String>, StoreError> {
        self.backend
            .accounts(namespace)
            .map_err(|source| StoreError::ReadFailed {
                namespace: namespace.to_owned(),
                key: "*".to_owned(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderRecord;

    #[test]
    fn get_missing_key_is_not_found() {
        let store = SecureRecordStore::in_memory();
        let err = store.get::<OrderRecord>("orders", "sku1").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn set_then_get_returns_record() {
        let store = SecureRecordStore::in_memory();
        let order = OrderRecord::new("u1", "o1", "sku1");
        store.set("orders", "sku1", &order).unwrap();
        assert_eq!(store.get::<OrderRecord>("orders", "sku1").unwrap(), order);
    }

    #[test]
    fn undecodable_payload_is_corrupt_not_missing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.write("orders", "sku1", b"\x00garbage").unwrap();

        let store = SecureRecordStore::new(backend);
        let err = store.get::<OrderRecord>("orders", "sku1").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = SecureRecordStore::in_memory();
        store.delete("orders", "never-written").unwrap();
        store
            .set("orders", "sku1", &OrderRecord::new("u1", "o1", "sku1"))
            .unwrap();
        store.delete("orders", "sku1").unwrap();
        store.delete("orders", "sku1").unwrap();
        assert!(store.get::<OrderRecord>("orders", "sku1").unwrap_err().is_not_found());
    }

    #[test]
    fn store_is_usable_off_the_calling_thread() {
        let store = SecureRecordStore::in_memory();
        let worker = store.clone();
        std::thread::spawn(move || {
            worker
                .set("orders", "sku1", &OrderRecord::new("u1", "o1", "sku1"))
                .unwrap();
        })
        .join()
        .unwrap();
        assert!(store.get::<OrderRecord>("orders", "sku1").is_ok());
    }
}
