use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

/// Metadata of one uploaded CSV file
///
/// Created on a successful upload and removed together with the file it
/// points to. Records are never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Identifier unique across the store
    pub id: u64,

    /// Original upload file name
    pub file_name: String,

    /// Second file-name segment (market or category)
    pub category: String,

    /// Third file-name segment (security code)
    pub ticker_code: String,

    /// Where the uploaded bytes were copied to
    pub file_path: String,
}

/// A record that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    pub file_name: String,
    pub category: String,
    pub ticker_code: String,
    pub file_path: String,
}

impl NewFileRecord {
    fn with_id(self, id: u64) -> FileRecord {
        FileRecord {
            id,
            file_name: self.file_name,
            category: self.category,
            ticker_code: self.ticker_code,
            file_path: self.file_path,
        }
    }
}

/// On-disk document layout: `{"_default": {"<doc_id>": {record}}}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(rename = "_default", default)]
    table: BTreeMap<u64, FileRecord>,
}

/// JSON-file backed collection of [`FileRecord`]s
///
/// Every operation reads the backing file, applies its change and writes the
/// file back while holding the store lock, so writers sharing one store never
/// interleave.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RecordStore {
    /// Opens a store backed by `path`
    ///
    /// The file does not have to exist yet; a missing file reads as an empty
    /// store and is created on the first write.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON document file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        RecordStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record as-is
    ///
    /// The record's `id` is stored unchanged; uniqueness is only guaranteed
    /// for ids handed out by [`RecordStore::create`].
    ///
    /// # Errors
    /// * Returns an error if the backing file cannot be read, parsed or written
    pub fn insert(&self, record: FileRecord) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        let doc_id = next_doc_id(&doc);
        log::info!("inserting record {} ({})", record.id, record.file_name);
        doc.table.insert(doc_id, record);
        self.save(&doc)
    }

    /// Assigns the next id and inserts the record
    ///
    /// The id is `max(existing ids) + 1`, or 1 for an empty store, computed
    /// under the same lock as the write.
    ///
    /// # Returns
    /// * The stored record including its id
    pub fn create(&self, record: NewFileRecord) -> Result<FileRecord> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        let record = record.with_id(next_record_id(&doc));
        let doc_id = next_doc_id(&doc);
        log::info!("creating record {} ({})", record.id, record.file_name);
        doc.table.insert(doc_id, record.clone());
        self.save(&doc)?;
        Ok(record)
    }

    /// The id [`RecordStore::create`] would assign right now
    pub fn next_id(&self) -> Result<u64> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(next_record_id(&self.load()?))
    }

    /// All records in storage order
    pub fn list_all(&self) -> Result<Vec<FileRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.table.into_values().collect())
    }

    /// Looks a record up by id
    ///
    /// When several stored documents carry the same id, the most recently
    /// inserted one wins.
    ///
    /// # Returns
    /// * `Ok(None)` if no record has that id
    pub fn get_by_id(&self, id: u64) -> Result<Option<FileRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let doc = self.load()?;
        Ok(doc.table.into_values().rev().find(|r| r.id == id))
    }

    /// Removes every record with the given id
    ///
    /// Deleting an absent id is a no-op.
    ///
    /// # Returns
    /// * Number of removed records
    pub fn delete_by_id(&self, id: u64) -> Result<usize> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        let before = doc.table.len();
        doc.table.retain(|_, r| r.id != id);
        let removed = before - doc.table.len();
        if removed > 0 {
            log::info!("deleted record {}", id);
            self.save(&doc)?;
        }
        Ok(removed)
    }

    /// Empties the store
    pub fn truncate(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        log::info!("truncating record store {}", self.path.display());
        self.save(&Document::default())
    }

    fn load(&self) -> Result<Document> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Document::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    // Write to a sibling temp file, then persist it over the store file.
    fn save(&self, doc: &Document) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let json = serde_json::to_string(doc)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| Error::io(&dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io(&self.path, e.error))?;
        Ok(())
    }
}

fn next_doc_id(doc: &Document) -> u64 {
    doc.table.keys().next_back().map_or(1, |last| last + 1)
}

fn next_record_id(doc: &Document) -> u64 {
    doc.table.values().map(|r| r.id).max().map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, name: &str) -> FileRecord {
        FileRecord {
            id,
            file_name: name.to_string(),
            category: "US".into(),
            ticker_code: "AAPL".into(),
            file_path: format!("data/{}", name),
        }
    }

    #[test]
    fn layout_matches_document_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("db.json"));
        store.insert(record(7, "a.csv")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["_default"]["1"]["id"], 7);
        assert_eq!(value["_default"]["1"]["file_name"], "a.csv");
    }

    #[test]
    fn reads_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{"_default": {"1": {"id": 1, "file_name": "x.csv", "category": "JP",
               "ticker_code": "7203", "file_path": "data/x.csv"},
               "10": {"id": 4, "file_name": "y.csv", "category": "US",
               "ticker_code": "KO", "file_path": "data/y.csv"},
               "2": {"id": 2, "file_name": "z.csv", "category": "US",
               "ticker_code": "VT", "file_path": "data/z.csv"}}}"#,
        )
        .unwrap();

        let store = RecordStore::open(&path);
        let ids: Vec<u64> = store.list_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert_eq!(store.next_id().unwrap(), 5);
    }

    #[test]
    fn empty_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "").unwrap();
        assert!(RecordStore::open(&path).list_all().unwrap().is_empty());
    }
}
