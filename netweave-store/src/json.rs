//! JSON file store: one `<id>.json` file per record
//!
//! Records of each kind live in their own directory under the state root,
//! e.g. `/var/lib/netweave/containers/b819a3c0ffee.json`. Writes go to a
//! temporary file first and are renamed into place so a crash never leaves a
//! truncated record behind.

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use netweave_core::{Error, Record, ResourceId, Result};

use crate::RecordStore;

/// Filesystem-backed record store
pub struct JsonFileStore<R> {
    dir: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> JsonFileStore<R> {
    /// Open the store for `R` under `state_dir`
    ///
    /// The directory is created lazily on first save.
    #[must_use]
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: state_dir.as_ref().join(format!("{}s", R::KIND)),
            _record: PhantomData,
        }
    }

    /// Directory holding this kind's records
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &ResourceId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_record(path: &Path) -> Result<R> {
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| Error::Store {
            message: format!("corrupt record {}: {e}", path.display()),
        })
    }
}

impl<R> Clone for JsonFileStore<R> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for JsonFileStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore")
            .field("dir", &self.dir)
            .finish()
    }
}

impl<R: Record> RecordStore<R> for JsonFileStore<R> {
    fn save(&self, record: &R) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::Store {
            message: format!("cannot create {}: {e}", self.dir.display()),
        })?;

        let path = self.record_path(record.id());
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(record)?;

        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(
            kind = %R::KIND,
            id = %record.id(),
            path = %path.display(),
            "Saved record"
        );

        Ok(())
    }

    fn find_by_id(&self, id: &ResourceId) -> Result<R> {
        let path = self.record_path(id);
        match fs::metadata(&path) {
            Ok(_) => Self::read_record(&path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::not_found(R::KIND, id.as_str()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_name(&self, name: &str) -> Result<Option<R>> {
        Ok(self.list()?.into_iter().find(|r| r.name() == name))
    }

    fn list(&self) -> Result<Vec<R>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        kind = %R::KIND,
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable record"
                    );
                }
            }
        }

        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }

    fn delete(&self, id: &ResourceId) -> Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => {
                tracing::debug!(kind = %R::KIND, id = %id, "Deleted record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::not_found(R::KIND, id.as_str()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netweave_core::{Container, ResourceName};
    use tempfile::TempDir;

    #[test]
    fn test_layout_per_kind() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Container> = JsonFileStore::new(dir.path());
        assert_eq!(store.dir(), dir.path().join("containers"));

        let container = Container::new(ResourceName::new("h1").unwrap());
        store.save(&container).unwrap();

        let file = dir
            .path()
            .join("containers")
            .join(format!("{}.json", container.id));
        assert!(file.exists());
        assert!(!file.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_list_on_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Container> = JsonFileStore::new(dir.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_records_are_skipped_in_list() {
        let dir = TempDir::new().unwrap();
        let store: JsonFileStore<Container> = JsonFileStore::new(dir.path());
        store
            .save(&Container::new(ResourceName::new("h1").unwrap()))
            .unwrap();

        fs::write(store.dir().join("deadbeef0000.json"), b"{not json").unwrap();
        fs::write(store.dir().join("README"), b"ignored").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);

        let bad = ResourceId::parse("deadbeef0000").unwrap();
        assert!(matches!(
            store.find_by_id(&bad).unwrap_err(),
            Error::Store { .. }
        ));
    }
}
