//! File-backed storage backend.
//!
//! One JSON document per store key, written atomically: the new document is
//! serialized to a temporary sibling file and renamed over the old one, so a
//! crash mid-save leaves the previous document intact. This mirrors how the
//! host's own storage helper persists integration state.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::storage::traits::{KvStore, StorageError};

/// A [`KvStore`] persisting each key as `<dir>/<key>.json`.
#[derive(Debug)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileKvStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.document_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.document_path(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));

        let data = serde_json::to_vec_pretty(value)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_missing_document_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        assert!(store.load("housemind_mapping").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        let doc = json!({"items": [{"id": "1", "text": "hi"}]});
        store.save("housemind_chat_history", &doc).unwrap();
        assert_eq!(store.load("housemind_chat_history").unwrap(), Some(doc));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).unwrap();
        store.save("k", &json!(1)).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }

    #[test]
    fn test_reopen_sees_saved_document() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileKvStore::open(dir.path()).unwrap();
            store.save("k", &json!({"present": true})).unwrap();
        }
        let store = FileKvStore::open(dir.path()).unwrap();
        assert_eq!(store.load("k").unwrap(), Some(json!({"present": true})));
    }
}
