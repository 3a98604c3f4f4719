//! Append-only CSV row log with an in-memory offset and version index.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use parking_lot::{Mutex, MutexGuard};

use crate::logging;

use super::error::Error;
use super::types::Row;

/// Latest known state for one identifier.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    /// Byte offset of the start of the latest row.
    offset: u64,
    /// Current version; `0` means deleted or never created.
    version: i64,
}

struct Inner {
    file: File,
    index: HashMap<String, IndexEntry>,
}

/// Append-only log of rows backed by a single CSV file.
///
/// The latest row for an identifier is the source of truth; earlier rows are
/// history and a version of `0` is a tombstone. Writes carry an expected
/// next-version and are rejected when it does not match `current + 1`
/// (optimistic concurrency control). Every public operation holds one
/// internal mutex for the duration of the call.
pub struct RowLog {
    inner: Mutex<Inner>,
}

impl RowLog {
    /// Open or create the log at `path`, scanning the file front to back to
    /// rebuild the offset and version index. Later rows for an identifier
    /// overwrite earlier index entries; a CSV-level parse error aborts the
    /// open.
    pub fn open(path: impl AsRef<Path>) -> Result<RowLog, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let mut index = HashMap::new();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(&file);
        let mut record = StringRecord::new();
        loop {
            let offset = reader.position().byte();
            if !reader.read_record(&mut record)? {
                break;
            }
            if record.len() < 2 {
                continue;
            }
            let version = match record[1].parse() {
                Ok(v) => v,
                Err(_) => {
                    logging::warn!(offset, row_id = &record[0], "unparseable version, treating as 0");
                    0
                }
            };
            index.insert(record[0].to_string(), IndexEntry { offset, version });
        }
        logging::debug!(path = %path.display(), entries = index.len(), "opened row log");

        Ok(RowLog {
            inner: Mutex::new(Inner { file, index }),
        })
    }

    /// Append a fresh row. The row must have at least two fields, a
    /// non-empty identifier and version `"1"`, and the identifier must not
    /// currently be live.
    pub fn create(&self, row: &Row) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if row.len() < 2 || row[0].is_empty() || row[1] != "1" || version_of(&inner, &row[0]) != 0 {
            return Err(Error::InvalidRecord);
        }
        append(&mut inner, row, 1)
    }

    /// Append a new revision. The row's version must be exactly one above
    /// the current version, which must be at least 1. Stale or replayed
    /// updates are rejected and leave the log unchanged.
    pub fn update(&self, row: &Row) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if row.len() < 2 {
            return Err(Error::InvalidVersion);
        }
        let current = version_of(&inner, &row[0]);
        if current < 1 || row[1] != (current + 1).to_string() {
            return Err(Error::InvalidVersion);
        }
        append(&mut inner, row, current + 1)
    }

    /// Append a tombstone for `id`, making it absent for readers.
    pub fn delete(&self, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if version_of(&inner, id) < 1 {
            return Err(Error::NotFound);
        }
        let tombstone = vec![id.to_string(), "0".to_string()];
        append(&mut inner, &tombstone, 0)
    }

    /// Read the latest row for `id` by seeking to its indexed offset.
    pub fn get(&self, id: &str) -> Result<Row, Error> {
        let mut inner = self.inner.lock();
        let entry = match inner.index.get(id) {
            Some(entry) if entry.version >= 1 => *entry,
            _ => return Err(Error::NotFound),
        };
        inner.file.seek(SeekFrom::Start(entry.offset))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(&inner.file);
        let mut record = StringRecord::new();
        if !reader.read_record(&mut record)? || record.get(0) != Some(id) {
            return Err(Error::CorruptedIndex);
        }
        Ok(record.iter().map(str::to_string).collect())
    }

    /// Iterate over the live rows in file order, skipping tombstones and
    /// superseded revisions. Each call starts a fresh scan; the internal
    /// lock is held until the returned iterator is dropped, so callers must
    /// not invoke mutating operations on the same log while iterating. At
    /// most one error is yielded, after which the iteration ends.
    pub fn iter(&self) -> Rows<'_> {
        let guard = self.inner.lock();
        let (records, error) = match guard.file.try_clone().and_then(|mut file| {
            file.seek(SeekFrom::Start(0))?;
            Ok(file)
        }) {
            Ok(file) => (
                Some(
                    ReaderBuilder::new()
                        .has_headers(false)
                        .flexible(true)
                        .from_reader(file)
                        .into_records(),
                ),
                None,
            ),
            Err(e) => (None, Some(Error::Io(e))),
        };
        Rows {
            guard,
            records,
            error,
            done: false,
        }
    }

    /// Flush and release the file. Subsequent operations on clones of the
    /// path require a fresh `open`.
    pub fn close(self) -> Result<(), Error> {
        let inner = self.inner.into_inner();
        inner.file.sync_all()?;
        Ok(())
    }
}

fn version_of(inner: &Inner, id: &str) -> i64 {
    inner.index.get(id).map_or(0, |entry| entry.version)
}

fn append(inner: &mut Inner, row: &[String], version: i64) -> Result<(), Error> {
    let offset = inner.file.seek(SeekFrom::End(0))?;
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_writer(&inner.file);
    writer.write_record(row)?;
    writer.flush()?;
    drop(writer);
    inner
        .index
        .insert(row[0].clone(), IndexEntry { offset, version });
    Ok(())
}

/// Lazy sequence of live rows. Holds the log's lock for its whole lifetime.
pub struct Rows<'a> {
    guard: MutexGuard<'a, Inner>,
    records: Option<csv::StringRecordsIntoIter<File>>,
    error: Option<Error>,
    done: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(error) = self.error.take() {
            self.done = true;
            return Some(Err(error));
        }
        let records = self.records.as_mut()?;
        loop {
            match records.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(record)) => {
                    if record.len() < 2 || &record[1] == "0" {
                        continue;
                    }
                    let current = self.guard.index.get(&record[0]).map_or(0, |e| e.version);
                    if record[1] != current.to_string() {
                        continue; // superseded revision
                    }
                    return Some(Ok(record.iter().map(str::to_string).collect()));
                }
            }
        }
    }
}
