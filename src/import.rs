// 📥 Bulk Import Pipeline
// Streams a `;`-separated company file into the store in bounded batches
//
//   file → CompanyRow → normalize → DedupBuffer → BatchCommitter → RecordStore
//
// Memory stays O(buffer threshold): rows are read forward-only and at most one
// buffer's worth of records is held at a time.

use crate::buffer::{Batch, DedupBuffer, DEFAULT_BUFFER_THRESHOLD};
use crate::company::{normalize, CompanyRow, REQUIRED_HEADERS};
use crate::error::ImportError;
use crate::store::RecordStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info, info_span, warn};

pub const CSV_SEPARATOR: u8 = b';';

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Records held in memory before a forced flush
    pub buffer_threshold: usize,
}

impl ImportOptions {
    pub fn with_buffer_threshold(mut self, buffer_threshold: usize) -> Self {
        self.buffer_threshold = buffer_threshold;
        self
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
        }
    }
}

// ============================================================================
// COUNTERS
// ============================================================================

/// Counters of one committed batch. `batch_size == duplicates + unique`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub batch_size: usize,
    pub duplicates: usize,
    pub unique: usize,
}

impl From<&Batch> for BatchStats {
    fn from(batch: &Batch) -> Self {
        BatchStats {
            batch_size: batch.received(),
            duplicates: batch.duplicates(),
            unique: batch.unique(),
        }
    }
}

/// Running totals of an import run
///
/// `total_processed` counts accepted rows across all batches, while
/// duplicates are only collapsed within a batch, so
/// `total_processed == duplicates_removed + final_count` holds per batch but
/// says nothing about keys repeated across batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTotals {
    pub total_processed: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
}

impl ImportTotals {
    pub fn fold(self, stats: BatchStats) -> Self {
        ImportTotals {
            total_processed: self.total_processed + stats.batch_size,
            duplicates_removed: self.duplicates_removed + stats.duplicates,
            final_count: self.final_count + stats.unique,
        }
    }
}

// ============================================================================
// BATCH COMMITTER
// ============================================================================

/// One batch, one upsert call. No retries.
pub struct BatchCommitter<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> BatchCommitter<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        BatchCommitter { store }
    }

    pub fn commit(&self, batch: &Batch) -> Result<BatchStats, ImportError> {
        let stats = BatchStats::from(batch);
        if batch.is_empty() {
            return Ok(stats);
        }

        self.store
            .upsert_by_key(batch.records())
            .map_err(ImportError::StoreCommitFailed)?;

        debug!(
            batch_size = stats.batch_size,
            duplicates = stats.duplicates,
            unique = stats.unique,
            "committed batch"
        );
        Ok(stats)
    }
}

// ============================================================================
// IMPORT COORDINATOR
// ============================================================================

/// Drives read → normalize → buffer → flush for one source.
///
/// A failed run is never resumed. Batches committed before the failure stay
/// committed; re-running the whole import is safe because upserts overwrite.
pub struct ImportCoordinator<'a> {
    store: &'a dyn RecordStore,
    options: ImportOptions,
}

impl<'a> ImportCoordinator<'a> {
    pub fn new(store: &'a dyn RecordStore, options: ImportOptions) -> Self {
        ImportCoordinator { store, options }
    }

    pub fn run_file(&self, path: &Path) -> Result<ImportTotals, ImportError> {
        let file = File::open(path).map_err(|e| {
            ImportError::SourceUnreadable(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let _span = info_span!("company_import", file = %path.display()).entered();
        self.run_reader(file)
    }

    pub fn run_reader<R: Read>(&self, source: R) -> Result<ImportTotals, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(CSV_SEPARATOR)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = reader.headers().map_err(ImportError::unreadable)?;
        if headers.is_empty() {
            info!("empty source, nothing to import");
            return Ok(ImportTotals::default());
        }
        for required in REQUIRED_HEADERS {
            if !headers.iter().any(|h| h == required) {
                return Err(ImportError::SourceUnreadable(format!(
                    "Missing required header: {}",
                    required
                )));
            }
        }

        let committer = BatchCommitter::new(self.store);
        let mut buffer = DedupBuffer::new(self.options.buffer_threshold);
        let mut totals = ImportTotals::default();
        let mut rejected = 0usize;

        for (index, result) in reader.deserialize::<CompanyRow>().enumerate() {
            let row = result.map_err(|e| row_error(index, e))?;

            match normalize(row, Utc::now()) {
                Some(company) => buffer.add(company),
                None => {
                    rejected += 1;
                    continue;
                }
            }

            if let Some(batch) = buffer.flush_if_full() {
                totals = totals.fold(committer.commit(&batch)?);
            }
        }

        // End of stream: flush the remainder
        let batch = buffer.drain();
        if !batch.is_empty() {
            totals = totals.fold(committer.commit(&batch)?);
        }

        if rejected > 0 {
            warn!(rejected, "skipped rows without a CoC number");
        }
        info!(
            total_processed = totals.total_processed,
            duplicates_removed = totals.duplicates_removed,
            final_count = totals.final_count,
            "import complete"
        );

        Ok(totals)
    }
}

/// Quoted cells may span lines, so the reader's own position is preferred
/// over the record index.
fn row_error(index: usize, e: csv::Error) -> ImportError {
    match e.position() {
        Some(pos) => ImportError::SourceUnreadable(format!("Failed to parse line {}: {}", pos.line(), e)),
        // Record 1 is the header
        None => ImportError::SourceUnreadable(format!("Failed to parse record {}: {}", index + 2, e)),
    }
}

// ============================================================================
// IMPORT RESULT
// ============================================================================

/// Outcome of [`import_from_file`], shaped for the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub total_processed: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportResult {
    pub fn failed(error: impl Into<String>) -> Self {
        ImportResult {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn success_message(&self) -> String {
        format!(
            "CSV imported successfully! Processed {} rows, removed {} duplicates, updated/inserted {} companies.",
            self.total_processed, self.duplicates_removed, self.final_count
        )
    }

    pub fn error_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|error| format!("Error importing CSV: {}", error))
    }
}

impl From<ImportTotals> for ImportResult {
    fn from(totals: ImportTotals) -> Self {
        ImportResult {
            total_processed: totals.total_processed,
            duplicates_removed: totals.duplicates_removed,
            final_count: totals.final_count,
            error: None,
        }
    }
}

impl From<Result<ImportTotals, ImportError>> for ImportResult {
    fn from(outcome: Result<ImportTotals, ImportError>) -> Self {
        match outcome {
            Ok(totals) => totals.into(),
            Err(e) => {
                error!(error = %e, "CSV import failed");
                ImportResult::failed(e.to_string())
            }
        }
    }
}

/// Import a company file. Never panics or returns `Err`: failures end up in
/// [`ImportResult::error`].
pub fn import_from_file(
    store: &dyn RecordStore,
    path: impl AsRef<Path>,
    options: ImportOptions,
) -> ImportResult {
    ImportCoordinator::new(store, options)
        .run_file(path.as_ref())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CreatedAtPolicy;
    use crate::test_support::{write_csv, RecordingStore};
    use crate::SqliteStore;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(CreatedAtPolicy::Reset).unwrap()
    }

    #[test]
    fn test_import_valid_rows() {
        let store = store();
        let file = write_csv(&[
            "coc_number;company_name;city",
            "12345678;Test Corp;Amsterdam",
            "87654321;Another Corp;Rotterdam",
        ]);

        let result = import_from_file(&store, file.path(), ImportOptions::default());

        assert!(result.is_success());
        assert_eq!(result.total_processed, 2);
        assert_eq!(result.final_count, 2);
        assert_eq!(result.duplicates_removed, 0);
        assert_eq!(store.count_all().unwrap(), 2);
        assert!(store.find_by_key("12345678").unwrap().is_some());
        assert!(store.find_by_key("87654321").unwrap().is_some());
    }

    #[test]
    fn test_import_keeps_last_duplicate() {
        let store = store();
        let file = write_csv(&[
            "coc_number;company_name;city",
            "A;CorpOne;Rotterdam",
            "A;CorpTwo;Utrecht",
        ]);

        let result = import_from_file(&store, file.path(), ImportOptions::default());

        assert_eq!(result.total_processed, 2);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.final_count, 1);

        let stored = store.find_by_key("A").unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("CorpTwo"));
        assert_eq!(stored.locality.as_deref(), Some("Utrecht"));
    }

    #[test]
    fn test_import_skips_blank_keys() {
        let store = RecordingStore::new();
        let file = write_csv(&[
            "coc_number;company_name;city",
            ";Test Corp;Amsterdam",
            "   ;Blank Corp;Delft",
            "12345678;Valid Corp;Rotterdam",
        ]);

        let result = import_from_file(&store, file.path(), ImportOptions::default());

        assert!(result.is_success());
        assert_eq!(result.total_processed, 1);
        assert_eq!(store.count_all().unwrap(), 1);
        assert_eq!(store.upserted_keys(), vec!["12345678".to_string()]);
    }

    #[test]
    fn test_import_flushes_in_bounded_batches() {
        let store = RecordingStore::new();
        let mut lines = vec!["coc_number;company_name;city".to_string()];
        for i in 0..1500 {
            lines.push(format!("{:08};Company {};City {}", i, i, i));
        }
        let file = write_csv(lines.as_slice());

        let result = import_from_file(&store, file.path(), ImportOptions::default());

        assert!(result.is_success());
        assert_eq!(store.batch_sizes(), vec![1000, 500]);
        assert_eq!(result.total_processed, 1500);
        assert_eq!(result.final_count, 1500);
        assert_eq!(result.duplicates_removed, 0);
        assert_eq!(store.count_all().unwrap(), 1500);
    }

    #[test]
    fn test_duplicates_only_collapse_within_a_batch() {
        let store = RecordingStore::new();
        let file = write_csv(&[
            "coc_number;company_name;city",
            "A;First;Delft",
            "B;Other;Delft",
            "A;Second;Delft",
            "A;Third;Delft",
        ]);

        let result = import_from_file(&store, file.path(), ImportOptions::default().with_buffer_threshold(2));

        // Batches: [A, B] then [A, A] → one duplicate, three unique upserts
        assert_eq!(store.batch_sizes(), vec![2, 1]);
        assert_eq!(result.total_processed, 4);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.final_count, 3);
        assert_eq!(store.count_all().unwrap(), 2);
        assert_eq!(store.find_by_key("A").unwrap().unwrap().name.as_deref(), Some("Third"));
    }

    #[test]
    fn test_import_missing_file() {
        let store = store();
        let result = import_from_file(&store, "nonexistent.csv", ImportOptions::default());

        assert!(!result.is_success());
        assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert_eq!(result.total_processed, 0);
    }

    #[test]
    fn test_import_missing_header() {
        let store = RecordingStore::new();
        let file = write_csv(&["coc_number;name;city", "12345678;Test Corp;Amsterdam"]);

        let outcome = ImportCoordinator::new(&store, ImportOptions::default()).run_file(file.path());

        match outcome {
            Err(ImportError::SourceUnreadable(message)) => assert!(message.contains("company_name")),
            other => panic!("expected SourceUnreadable, got {:?}", other),
        }
        assert!(store.batch_sizes().is_empty());
    }

    #[test]
    fn test_import_short_row_is_rejected_by_store() {
        let store = store();
        let file = write_csv(&["coc_number;company_name;city", "12345678;Test Corp"]);

        let outcome = ImportCoordinator::new(&store, ImportOptions::default()).run_file(file.path());

        assert!(matches!(outcome, Err(ImportError::StoreCommitFailed(_))));
        assert_eq!(store.count_all().unwrap(), 0);
    }

    #[test]
    fn test_commit_failure_aborts_without_retry() {
        let store = RecordingStore::failing_after(1);
        let file = write_csv(&[
            "coc_number;company_name;city",
            "1;One;Delft",
            "2;Two;Delft",
            "3;Three;Delft",
        ]);

        let result = import_from_file(&store, file.path(), ImportOptions::default().with_buffer_threshold(1));

        assert!(!result.is_success());
        assert_eq!(store.upsert_calls(), 2, "second batch fails, nothing after it is tried");
        // First batch stays committed
        assert_eq!(store.count_all().unwrap(), 1);
    }

    #[test]
    fn test_import_is_idempotent() {
        let store = store();
        let file = write_csv(&[
            "coc_number;company_name;city",
            "1;One;Delft",
            "2;Two;Leiden",
            "1;Uno;Delft",
        ]);

        let first = import_from_file(&store, file.path(), ImportOptions::default());
        let after_first = store.list_all(0, 10).unwrap().0;
        let second = import_from_file(&store, file.path(), ImportOptions::default());
        let after_second = store.list_all(0, 10).unwrap().0;

        assert_eq!(first.duplicates_removed, 1);
        assert_eq!(second.duplicates_removed, 1, "duplicates are recomputed per run");
        assert_eq!(second.final_count, 2);
        assert_eq!(after_first.len(), after_second.len());
        for (a, b) in after_first.iter().zip(after_second.iter()) {
            assert_eq!((&a.key, &a.name, &a.locality), (&b.key, &b.name, &b.locality));
        }
    }

    #[test]
    fn test_run_reader_from_memory() {
        let store = store();
        let data = "coc_number;company_name;city\n42;Answer B.V.;Den Haag\n";

        let totals = ImportCoordinator::new(&store, ImportOptions::default())
            .run_reader(data.as_bytes())
            .unwrap();

        assert_eq!(totals.final_count, 1);
        assert_eq!(
            store.find_by_key("42").unwrap().unwrap().locality.as_deref(),
            Some("Den Haag")
        );
    }

    #[test]
    fn test_zero_byte_file_imports_nothing() {
        let store = RecordingStore::new();
        let file = write_csv::<&str>(&[]);

        let result = import_from_file(&store, file.path(), ImportOptions::default());

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.total_processed, 0);
        assert_eq!(result.duplicates_removed, 0);
        assert_eq!(result.final_count, 0);
        assert_eq!(store.upsert_calls(), 0);

        let totals = ImportCoordinator::new(&store, ImportOptions::default())
            .run_reader("".as_bytes())
            .unwrap();
        assert_eq!(totals, ImportTotals::default());
    }

    #[test]
    fn test_parse_error_reports_physical_line() {
        let store = store();
        // Record 2 spans lines 2-3, so the bad record starts on line 4
        let data: &[u8] = b"coc_number;company_name;city\n1;\"multi\nline\";Delft\n2;\xff;Delft\n";

        let outcome = ImportCoordinator::new(&store, ImportOptions::default()).run_reader(data);

        match outcome {
            Err(ImportError::SourceUnreadable(message)) => {
                assert!(message.contains("line 4"), "{}", message)
            }
            other => panic!("expected SourceUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_buffer_threshold_is_usable() {
        let store = RecordingStore::new();
        let file = write_csv(&[
            "coc_number;company_name;city",
            "1;One;Delft",
            "2;Two;Leiden",
        ]);

        let result = import_from_file(
            &store,
            file.path(),
            ImportOptions::default().with_buffer_threshold(100_000_000),
        );

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(store.batch_sizes(), vec![2]);
        assert_eq!(result.final_count, 2);
    }

    #[test]
    fn test_totals_fold() {
        let totals = ImportTotals::default()
            .fold(BatchStats { batch_size: 1000, duplicates: 10, unique: 990 })
            .fold(BatchStats { batch_size: 5, duplicates: 0, unique: 5 });

        assert_eq!(
            totals,
            ImportTotals {
                total_processed: 1005,
                duplicates_removed: 10,
                final_count: 995,
            }
        );
    }

    #[test]
    fn test_import_result_messages() {
        let ok = ImportResult {
            total_processed: 100,
            duplicates_removed: 10,
            final_count: 90,
            error: None,
        };
        assert!(ok.is_success());
        let message = ok.success_message();
        assert!(message.contains("100"));
        assert!(message.contains("10"));
        assert!(message.contains("90"));
        assert!(ok.error_message().is_none());

        let failed = ImportResult::failed("Test error");
        assert!(!failed.is_success());
        assert_eq!(failed.error_message().as_deref(), Some("Error importing CSV: Test error"));
    }
}
