use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::store::{FileRecord, NewFileRecord, RecordStore};

/// Metadata carried by an upload file name
///
/// The expected shape is `{download_date}_{category}_{ticker_code}.csv`.
/// Only the first three underscore segments are consumed positionally; any
/// further segments are kept but ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    pub file_name: String,
    pub download_date: NaiveDate,
    pub category: String,
    pub ticker_code: String,
    segments: Vec<String>,
}

impl UploadName {
    /// Parses and validates an upload file name
    ///
    /// # Errors
    /// * `Error::InvalidFileName` describing which part of the contract is broken
    ///
    /// # Examples
    /// ```
    /// use stock_viewer::ingest::UploadName;
    ///
    /// let name = UploadName::parse("20240101_US_AAPL.csv").unwrap();
    /// assert_eq!(name.category, "US");
    /// assert_eq!(name.ticker_code, "AAPL");
    /// ```
    pub fn parse(file_name: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidFileName {
            name: file_name.to_string(),
            reason: reason.to_string(),
        };

        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(invalid("must be a bare file name"));
        }

        let stem = strip_csv_extension(file_name)
            .ok_or_else(|| invalid("expected a .csv extension"))?;

        let segments: Vec<String> = stem.split('_').map(str::to_string).collect();
        if segments.len() < 3 {
            return Err(invalid(
                "expected {download_date}_{category}_{ticker_code}.csv",
            ));
        }
        if segments[..3].iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("date, category and ticker code must not be empty"));
        }

        let date_segment = &segments[0];
        if date_segment.len() != 8 || !date_segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("download date must be YYYYMMDD"));
        }
        let download_date = NaiveDate::parse_from_str(date_segment, "%Y%m%d")
            .map_err(|_| invalid("download date is not a calendar date"))?;

        Ok(UploadName {
            file_name: file_name.to_string(),
            download_date,
            category: segments[1].clone(),
            ticker_code: segments[2].clone(),
            segments,
        })
    }

    /// Underscore segment at `index` of the name without its extension
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }
}

fn strip_csv_extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if ext.eq_ignore_ascii_case("csv") && !stem.is_empty() {
        Some(stem)
    } else {
        None
    }
}

/// Stores an uploaded CSV file and records its metadata
///
/// The bytes are staged in a temp file inside `data_dir` and moved to
/// `data_dir/file_name` once the record is stored. If the record cannot be
/// inserted, nothing in `data_dir` changes.
///
/// # Arguments
/// * `store` - Record store receiving the metadata
/// * `data_dir` - Directory the file is copied into (created if missing)
/// * `file_name` - Upload file name, validated with [`UploadName::parse`]
/// * `bytes` - File contents
///
/// # Returns
/// * The stored record with its assigned id
pub fn ingest_csv(
    store: &RecordStore,
    data_dir: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<FileRecord> {
    let name = UploadName::parse(file_name)?;
    check_csv(file_name, bytes)?;

    fs::create_dir_all(data_dir).map_err(|e| Error::io(data_dir, e))?;
    let target = data_dir.join(&name.file_name);
    let mut staged = NamedTempFile::new_in(data_dir).map_err(|e| Error::io(data_dir, e))?;
    staged
        .write_all(bytes)
        .map_err(|e| Error::io(staged.path(), e))?;

    let record = NewFileRecord {
        file_name: name.file_name.clone(),
        category: name.category.clone(),
        ticker_code: name.ticker_code.clone(),
        file_path: target.to_string_lossy().into_owned(),
    };

    let stored = store.create(record)?;
    if let Err(e) = staged.persist(&target) {
        store.delete_by_id(stored.id)?;
        return Err(Error::io(&target, e.error));
    }
    log::info!("saved upload to {}", target.display());
    Ok(stored)
}

// The upload must at least be readable CSV with a header row.
fn check_csv(file_name: &str, bytes: &[u8]) -> Result<()> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?;
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::Validation(format!("{} has no header row", file_name)));
    }
    for row in reader.records() {
        row?;
    }
    Ok(())
}

/// Removes records together with the files they point to
///
/// A file that is already gone is logged and the record is deleted anyway.
///
/// # Returns
/// * How many of the given ids had a record
pub fn remove_records(store: &RecordStore, ids: &[u64]) -> Result<usize> {
    let mut removed = 0;
    for &id in ids {
        if let Some(record) = store.get_by_id(id)? {
            let path = Path::new(&record.file_path);
            match fs::remove_file(path) {
                Ok(()) => log::info!("deleted file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::warn!("file not found: {}", path.display())
                }
                Err(e) => log::error!("error deleting {}: {}", path.display(), e),
            }
            removed += 1;
        }
        store.delete_by_id(id)?;
    }
    Ok(removed)
}
