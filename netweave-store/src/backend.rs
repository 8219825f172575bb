//! Record store trait for pluggable implementations

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use netweave_core::{Error, Record, ResourceId, Result};

/// Keyed store for one kind of record
///
/// This allows for different implementations:
/// - [`JsonFileStore`](crate::JsonFileStore) - one JSON file per record
/// - [`MemoryStore`] - Testing without filesystem
///
/// # Thread Safety
/// All implementations must be `Send + Sync`.
pub trait RecordStore<R: Record>: Send + Sync {
    /// Insert or replace a record
    ///
    /// # Errors
    /// Returns error if the record cannot be written
    fn save(&self, record: &R) -> Result<()>;

    /// Load the record with exactly this ID
    ///
    /// # Errors
    /// Returns `NotFound` if there is no such record
    fn find_by_id(&self, id: &ResourceId) -> Result<R>;

    /// Load the first record called `name`
    ///
    /// # Errors
    /// Returns error if records cannot be read
    fn find_by_name(&self, name: &str) -> Result<Option<R>>;

    /// All records, ordered by ID
    ///
    /// # Errors
    /// Returns error if records cannot be read
    fn list(&self) -> Result<Vec<R>>;

    /// Remove the record with this ID
    ///
    /// # Errors
    /// Returns `NotFound` if there is no such record
    fn delete(&self, id: &ResourceId) -> Result<()>;

    /// Resolve user input to a record: exact name first, then unique ID prefix
    ///
    /// # Errors
    /// Returns `NotFound` if nothing matches and `InvalidInput` if a prefix
    /// matches more than one record
    fn resolve(&self, ident: &str) -> Result<R> {
        if let Some(record) = self.find_by_name(ident)? {
            return Ok(record);
        }

        let mut matches: Vec<R> = self
            .list()?
            .into_iter()
            .filter(|r| r.id().matches_prefix(ident))
            .collect();

        match matches.len() {
            0 => Err(Error::not_found(R::KIND, ident)),
            1 => Ok(matches.remove(0)),
            n => Err(Error::invalid(format!(
                "'{ident}' matches {n} {}s, use a longer prefix",
                R::KIND
            ))),
        }
    }
}

/// In-memory store (doesn't touch filesystem)
pub struct MemoryStore<R> {
    records: Arc<RwLock<BTreeMap<ResourceId, R>>>,
}

impl<R> MemoryStore<R> {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl<R> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for MemoryStore<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<R> std::fmt::Debug for MemoryStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.read().len())
            .finish()
    }
}

impl<R: Record> RecordStore<R> for MemoryStore<R> {
    fn save(&self, record: &R) -> Result<()> {
        self.records
            .write()
            .insert(record.id().clone(), record.clone());

        tracing::trace!(kind = %R::KIND, id = %record.id(), "Memory store: saved");
        Ok(())
    }

    fn find_by_id(&self, id: &ResourceId) -> Result<R> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(R::KIND, id.as_str()))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<R>> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.name() == name)
            .cloned())
    }

    fn list(&self) -> Result<Vec<R>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn delete(&self, id: &ResourceId) -> Result<()> {
        self.records
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(R::KIND, id.as_str()))
    }
}
