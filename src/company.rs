// Company record and row normalization
// One CSV row in, one canonical record (or nothing) out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header names of the import file. These are a fixed external contract.
pub const KEY_HEADER: &str = "coc_number";
pub const NAME_HEADER: &str = "company_name";
pub const LOCALITY_HEADER: &str = "city";

pub const REQUIRED_HEADERS: [&str; 3] = [KEY_HEADER, NAME_HEADER, LOCALITY_HEADER];

// ============================================================================
// RAW ROW (typed at the reading boundary)
// ============================================================================

/// CompanyRow - One parsed line of the import file
///
/// Every column is optional here: short rows and empty cells come through as
/// `None`, and it is up to [`normalize`] (key) and the store schema
/// (name, city) to decide what that means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompanyRow {
    #[serde(rename = "coc_number", default)]
    pub key: Option<String>,

    #[serde(rename = "company_name", default)]
    pub name: Option<String>,

    #[serde(rename = "city", default)]
    pub locality: Option<String>,
}

impl CompanyRow {
    pub fn new(key: &str, name: &str, locality: &str) -> Self {
        CompanyRow {
            key: Some(key.to_string()),
            name: Some(name.to_string()),
            locality: Some(locality.to_string()),
        }
    }
}

// ============================================================================
// COMPANY RECORD
// ============================================================================

/// Company - The sole stored entity, keyed by its CoC number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Internal row id, assigned by the store on first insert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Business key (CoC number), never blank
    #[serde(rename = "coc_number")]
    pub key: String,

    #[serde(rename = "company_name")]
    pub name: Option<String>,

    #[serde(rename = "city")]
    pub locality: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Fresh record stamped at `now` (not yet stored, so no id)
    pub fn new(key: impl Into<String>, name: Option<String>, locality: Option<String>, now: DateTime<Utc>) -> Self {
        Company {
            id: None,
            key: key.into(),
            name,
            locality,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn locality_or_empty(&self) -> &str {
        self.locality.as_deref().unwrap_or("")
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Turn a raw row into a record, or reject it.
///
/// Rejects rows whose key is missing or blank after trimming. The key is
/// stored trimmed; name and city are passed through untouched.
pub fn normalize(row: CompanyRow, now: DateTime<Utc>) -> Option<Company> {
    let key = row.key?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some(Company::new(key, row.name, row.locality, now))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_valid_row() {
        let now = Utc::now();
        let company = normalize(CompanyRow::new("12345678", "Test Corp", "Amsterdam"), now).unwrap();

        assert_eq!(company.key, "12345678");
        assert_eq!(company.name.as_deref(), Some("Test Corp"));
        assert_eq!(company.locality.as_deref(), Some("Amsterdam"));
        assert_eq!(company.created_at, now);
        assert_eq!(company.updated_at, now);
        assert!(company.id.is_none());
    }

    #[test]
    fn test_normalize_rejects_blank_key() {
        let now = Utc::now();

        assert!(normalize(CompanyRow::new("", "Test Corp", "Amsterdam"), now).is_none());
        assert!(normalize(CompanyRow::new("   \t", "Test Corp", "Amsterdam"), now).is_none());

        let missing = CompanyRow {
            key: None,
            ..CompanyRow::new("x", "Test Corp", "Amsterdam")
        };
        assert!(normalize(missing, now).is_none());
    }

    #[test]
    fn test_normalize_trims_key() {
        let company = normalize(CompanyRow::new("  12345678 ", "Test Corp", "Amsterdam"), Utc::now()).unwrap();
        assert_eq!(company.key, "12345678");
    }

    #[test]
    fn test_normalize_passes_through_missing_fields() {
        let row = CompanyRow {
            key: Some("12345678".to_string()),
            name: None,
            locality: Some(String::new()),
        };

        let company = normalize(row, Utc::now()).unwrap();
        assert_eq!(company.name, None);
        assert_eq!(company.locality.as_deref(), Some(""));
    }

    #[test]
    fn test_company_serializes_with_external_names() {
        let company = Company::new("12345678", Some("Beequip".to_string()), Some("Amsterdam".to_string()), Utc::now());
        let json = serde_json::to_value(&company).unwrap();

        assert_eq!(json["coc_number"], "12345678");
        assert_eq!(json["company_name"], "Beequip");
        assert_eq!(json["city"], "Amsterdam");
        assert!(json.get("id").is_none());
    }
}
