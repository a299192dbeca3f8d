// Record store contract
// The narrow interface the import pipeline and search engine depend on

use crate::company::Company;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Indexed text fields that can be matched by substring lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyField {
    Name,
    Locality,
    Key,
}

impl CompanyField {
    /// Column name in the `companies` table
    pub fn column(&self) -> &'static str {
        match self {
            CompanyField::Name => "company_name",
            CompanyField::Locality => "city",
            CompanyField::Key => "coc_number",
        }
    }
}

/// What happens to `created_at` when an existing key is upserted again.
///
/// `Reset` stamps both timestamps with the import time, every time.
/// `Preserve` keeps the `created_at` of the first insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedAtPolicy {
    #[default]
    Reset,
    Preserve,
}

/// RecordStore - Keyed company table
///
/// Each `upsert_by_key` call is one atomic unit: it either applies every
/// record or none. Nothing spans calls, so an import split into several
/// batches is NOT atomic as a whole. Callers that need whole-file atomicity
/// have to wrap the run in their own transaction.
///
/// Substring lookups are case-insensitive and return rows in store order.
pub trait RecordStore {
    /// Insert new keys, overwrite non-key fields and `updated_at` of existing ones.
    /// Returns the number of records applied.
    fn upsert_by_key(&self, records: &[Company]) -> Result<usize, StoreError>;

    /// Values of `field` containing `needle`, at most `limit`, duplicates included
    fn find_by_field_substring(
        &self,
        field: CompanyField,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError>;

    /// Records where any indexed field contains `needle`, plus the total match count
    fn find_any_field_substring(
        &self,
        needle: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Company>, usize), StoreError>;

    /// All records in store order, plus the total count
    fn list_all(&self, offset: usize, limit: usize) -> Result<(Vec<Company>, usize), StoreError>;

    fn find_by_key(&self, key: &str) -> Result<Option<Company>, StoreError>;

    fn count_all(&self) -> Result<usize, StoreError>;

    /// Remove every record, returning how many were deleted
    fn delete_all(&self) -> Result<usize, StoreError>;
}
