//! Durable local storage for the cart snapshot.
//!
//! The cart is the only client-owned state that survives a restart. It
//! lives in a single key-value slot: one file, one JSON document, fully
//! overwritten on every save.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use super::CartSnapshot;

/// Errors from the snapshot slot. The engine never surfaces these to its
/// callers; it fails open to an empty cart instead.
#[derive(Debug, Error)]
pub enum CartStoreError {
    #[error("cart slot i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cart snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A durable slot holding the serialized cart.
pub trait CartStore: Send + Sync {
    /// Read the last persisted snapshot. `Ok(None)` means the slot has
    /// never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<CartSnapshot>, CartStoreError>;

    /// Overwrite the slot with a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartStoreError>;
}

/// File-backed snapshot slot.
#[derive(Debug)]
pub struct JsonFileCartStore {
    path: PathBuf,
}

impl JsonFileCartStore {
    /// Create a store persisting to `path`. The file is created on first
    /// save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CartStore for JsonFileCartStore {
    fn load(&self) -> Result<Option<CartSnapshot>, CartStoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartStoreError> {
        let raw = serde_json::to_string(snapshot)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// In-memory snapshot slot for tests.
///
/// Stores the serialized document rather than the value, so tests exercise
/// the same serde round-trip the file store does.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with a raw document, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// The raw persisted document, if any.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl CartStore for MemoryCartStore {
    fn load(&self) -> Result<Option<CartSnapshot>, CartStoreError> {
        let slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match slot.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &CartSnapshot) -> Result<(), CartStoreError> {
        let raw = serde_json::to_string(snapshot)?;
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(raw);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_missing_slot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCartStore::new(dir.path().join("cart.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCartStore::new(dir.path().join("cart.json"));

        let snapshot = CartSnapshot::default();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), snapshot);
    }

    #[test]
    fn test_file_store_corrupt_slot_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileCartStore::new(path);
        assert!(matches!(store.load(), Err(CartStoreError::Malformed(_))));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCartStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&CartSnapshot::default()).unwrap();
        assert!(store.load().unwrap().is_some());
        assert!(store.raw().is_some());
    }
}
