//! Secure key-value storage primitives for PassVault.
//!
//! The vault core never talks to a platform keychain directly. It consumes
//! the [`SecureStore`] trait, a narrow keyed-secret interface a host
//! application backs with whatever hardware-backed storage the platform
//! offers (Keychain, Keystore, TPM-sealed files). Entry names are opaque
//! identifiers chosen by the caller; values are small UTF-8 secrets such as
//! derived keys and salts.
//!
//! [`MemorySecureStore`] is an in-process reference implementation used by
//! the test suites and by hosts that have not wired a platform store yet.
//! It keeps values in a mutex-guarded map and zeroizes them on drop, but it
//! offers no at-rest protection and is not a substitute for a real keychain.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use secrecy::SecretString;
use thiserror::Error;
use zeroize::Zeroizing;

/// Result type for secure store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a secure store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entry with the same name already exists.
    #[error("entry `{0}` already exists")]
    DuplicateEntry(String),

    /// The named entry is not present in the store.
    #[error("entry `{0}` not found")]
    EntryNotFound(String),

    /// The platform backend rejected or failed the operation.
    #[error("secure store backend error: {0}")]
    Backend(String),
}

/// Keyed secret storage backed by the platform's secure enclave/keychain.
///
/// Implementations must be safe to share across threads; the vault core
/// routes all credential mutations through a single owner, but read-only
/// lookups may happen from multiple components.
pub trait SecureStore: Send + Sync {
    /// Returns whether an entry with the given name exists.
    fn contains(&self, entry: &str) -> bool;

    /// Inserts a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEntry`] if the entry already exists,
    /// or [`StoreError::Backend`] if the platform store rejects the write.
    fn add(&self, entry: &str, value: &str) -> StoreResult<()>;

    /// Replaces the value of an existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if the entry does not exist,
    /// or [`StoreError::Backend`] if the platform store rejects the write.
    fn update(&self, entry: &str, value: &str) -> StoreResult<()>;

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EntryNotFound`] if the entry does not exist,
    /// or [`StoreError::Backend`] if the platform store rejects the delete.
    fn delete(&self, entry: &str) -> StoreResult<()>;

    /// Reads an entry's value. Absence is `Ok(None)`, not an error.
    ///
    /// The returned value is sensitive material; callers must discard it as
    /// soon as the operation at hand completes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the platform store fails the read.
    fn get_string(&self, entry: &str) -> StoreResult<Option<SecretString>>;
}

/// In-process [`SecureStore`] holding entries in a mutex-guarded map.
///
/// Values are zeroized when the store is dropped. Intended for tests and
/// early integration; provides no at-rest protection.
#[derive(Default)]
pub struct MemorySecureStore {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl MemorySecureStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, Zeroizing<String>>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_owned()))
    }
}

impl SecureStore for MemorySecureStore {
    fn contains(&self, entry: &str) -> bool {
        self.lock().is_ok_and(|map| map.contains_key(entry))
    }

    fn add(&self, entry: &str, value: &str) -> StoreResult<()> {
        let mut map = self.lock()?;
        match map.entry(entry.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateEntry(entry.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(Zeroizing::new(value.to_owned()));
                Ok(())
            }
        }
    }

    fn update(&self, entry: &str, value: &str) -> StoreResult<()> {
        let mut map = self.lock()?;
        let slot = map
            .get_mut(entry)
            .ok_or_else(|| StoreError::EntryNotFound(entry.to_owned()))?;
        *slot = Zeroizing::new(value.to_owned());
        Ok(())
    }

    fn delete(&self, entry: &str) -> StoreResult<()> {
        let mut map = self.lock()?;
        map.remove(entry)
            .map(drop)
            .ok_or_else(|| StoreError::EntryNotFound(entry.to_owned()))
    }

    fn get_string(&self, entry: &str) -> StoreResult<Option<SecretString>> {
        let map = self.lock()?;
        Ok(map
            .get(entry)
            .map(|value| SecretString::from(value.as_str().to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_add_then_get_round_trips() {
        let store = MemorySecureStore::new();
        store.add("master_key", "abc123").expect("add");

        let value = store.get_string("master_key").expect("get");
        assert_eq!(value.expect("present").expose_secret(), "abc123");
        assert!(store.contains("master_key"));
    }

    #[test]
    fn test_absent_entry_reads_as_none() {
        let store = MemorySecureStore::new();
        assert!(store.get_string("missing").expect("get").is_none());
        assert!(!store.contains("missing"));
    }

    #[test]
    fn test_add_duplicate_fails() {
        let store = MemorySecureStore::new();
        store.add("entry", "one").expect("add");
        let Err(StoreError::DuplicateEntry(name)) = store.add("entry", "two") else {
            panic!("duplicate add should fail");
        };
        assert_eq!(name, "entry");
    }

    #[test]
    fn test_update_replaces_existing_value() {
        let store = MemorySecureStore::new();
        store.add("entry", "one").expect("add");
        store.update("entry", "two").expect("update");

        let value = store.get_string("entry").expect("get").expect("present");
        assert_eq!(value.expose_secret(), "two");
    }

    #[test]
    fn test_update_missing_entry_fails() {
        let store = MemorySecureStore::new();
        let Err(StoreError::EntryNotFound(name)) = store.update("missing", "value") else {
            panic!("updating a missing entry should fail");
        };
        assert_eq!(name, "missing");
    }

    #[test]
    fn test_delete_removes_entry() {
        let store = MemorySecureStore::new();
        store.add("entry", "one").expect("add");
        store.delete("entry").expect("delete");
        assert!(!store.contains("entry"));
    }
}
