// Test helpers shared by the unit tests

use crate::company::Company;
use crate::db::SqliteStore;
use crate::error::StoreError;
use crate::store::{CompanyField, CreatedAtPolicy, RecordStore};
use std::cell::{Cell, RefCell};
use std::io::Write;
use tempfile::NamedTempFile;

/// Write `lines` to a temporary `.csv` file, one per line
pub fn write_csv<S: AsRef<str>>(lines: &[S]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("test_companies")
        .suffix(".csv")
        .tempfile()
        .unwrap();

    for line in lines {
        writeln!(file, "{}", line.as_ref()).unwrap();
    }
    file.flush().unwrap();
    file
}

/// In-memory SQLite store that records every call made against it
pub struct RecordingStore {
    inner: SqliteStore,
    batches: RefCell<Vec<Vec<String>>>,
    upsert_calls: Cell<usize>,
    lookup_calls: Cell<usize>,
    fail_after: Option<usize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        RecordingStore {
            inner: SqliteStore::open_in_memory(CreatedAtPolicy::Reset).unwrap(),
            batches: RefCell::new(Vec::new()),
            upsert_calls: Cell::new(0),
            lookup_calls: Cell::new(0),
            fail_after: None,
        }
    }

    /// Upserts succeed `successes` times, then every call fails
    pub fn failing_after(successes: usize) -> Self {
        RecordingStore {
            fail_after: Some(successes),
            ..Self::new()
        }
    }

    pub fn seeded(companies: &[(&str, &str, &str)]) -> Self {
        let store = Self::new();
        let records: Vec<Company> = companies
            .iter()
            .map(|(key, name, city)| {
                Company::new(*key, Some(name.to_string()), Some(city.to_string()), chrono::Utc::now())
            })
            .collect();
        store.inner.upsert_by_key(&records).unwrap();
        store
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.borrow().iter().map(Vec::len).collect()
    }

    pub fn upserted_keys(&self) -> Vec<String> {
        self.batches.borrow().iter().flatten().cloned().collect()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.get()
    }

    /// Calls to any read operation
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.get()
    }

    fn count_lookup(&self) {
        self.lookup_calls.set(self.lookup_calls.get() + 1);
    }
}

impl RecordStore for RecordingStore {
    fn upsert_by_key(&self, records: &[Company]) -> Result<usize, StoreError> {
        let call = self.upsert_calls.get();
        self.upsert_calls.set(call + 1);

        if self.fail_after.is_some_and(|successes| call >= successes) {
            return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        }

        self.batches
            .borrow_mut()
            .push(records.iter().map(|c| c.key.clone()).collect());
        self.inner.upsert_by_key(records)
    }

    fn find_by_field_substring(
        &self,
        field: CompanyField,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.count_lookup();
        self.inner.find_by_field_substring(field, needle, limit)
    }

    fn find_any_field_substring(
        &self,
        needle: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Company>, usize), StoreError> {
        self.count_lookup();
        self.inner.find_any_field_substring(needle, offset, limit)
    }

    fn list_all(&self, offset: usize, limit: usize) -> Result<(Vec<Company>, usize), StoreError> {
        self.count_lookup();
        self.inner.list_all(offset, limit)
    }

    fn find_by_key(&self, key: &str) -> Result<Option<Company>, StoreError> {
        self.inner.find_by_key(key)
    }

    fn count_all(&self) -> Result<usize, StoreError> {
        self.inner.count_all()
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        self.inner.delete_all()
    }
}

/// Store whose every read fails, for error propagation tests
pub struct UnreachableStore;

impl RecordStore for UnreachableStore {
    fn upsert_by_key(&self, _records: &[Company]) -> Result<usize, StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn find_by_field_substring(&self, _: CompanyField, _: &str, _: usize) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn find_any_field_substring(&self, _: &str, _: usize, _: usize) -> Result<(Vec<Company>, usize), StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn list_all(&self, _: usize, _: usize) -> Result<(Vec<Company>, usize), StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn find_by_key(&self, _: &str) -> Result<Option<Company>, StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn count_all(&self) -> Result<usize, StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
    }
}
