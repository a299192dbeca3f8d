use crate::company::Company;
use crate::error::StoreError;
use crate::store::{CompanyField, CreatedAtPolicy, RecordStore};
use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tracing::{debug, info};

const SELECT_COLUMNS: &str = "id, coc_number, company_name, city, created_at, updated_at";

/// SQLite-backed [`RecordStore`]
///
/// One connection, one `companies` table. Upserts run inside a single
/// transaction per call.
pub struct SqliteStore {
    conn: Connection,
    created_at_policy: CreatedAtPolicy,
}

impl SqliteStore {
    /// Open (or create) a database file, in WAL mode
    pub fn open(path: &Path, created_at_policy: CreatedAtPolicy) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;

        info!(path = %path.display(), "opened company database");
        Self::from_connection(conn, created_at_policy)
    }

    pub fn open_in_memory(created_at_policy: CreatedAtPolicy) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, created_at_policy)
    }

    pub fn from_connection(conn: Connection, created_at_policy: CreatedAtPolicy) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn,
            created_at_policy,
        })
    }

    pub fn created_at_policy(&self) -> CreatedAtPolicy {
        self.created_at_policy
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn upsert_sql(&self) -> &'static str {
        match self.created_at_policy {
            CreatedAtPolicy::Reset => {
                "INSERT INTO companies (coc_number, company_name, city, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(coc_number) DO UPDATE SET
                    company_name = excluded.company_name,
                    city = excluded.city,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at"
            }
            CreatedAtPolicy::Preserve => {
                "INSERT INTO companies (coc_number, company_name, city, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(coc_number) DO UPDATE SET
                    company_name = excluded.company_name,
                    city = excluded.city,
                    updated_at = excluded.updated_at"
            }
        }
    }

    fn query_companies(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Company>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;

        let rows = stmt
            .query_map(params, raw_company_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawCompany::into_company).collect()
    }

    fn count(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        from_sql_count(count)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// SQLite's own UPPER/LOWER only fold ASCII; lookups go through this instead.
pub const FOLD_FUNCTION: &str = "unicode_lower";

/// Register `unicode_lower(text)` on the connection (NULL stays NULL)
pub fn register_functions(conn: &Connection) -> Result<(), StoreError> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )?;
    Ok(())
}

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    register_functions(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            coc_number TEXT NOT NULL UNIQUE,
            company_name TEXT NOT NULL,
            city TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Indexes for name/city lookups and combined searches
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(company_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_city ON companies(city)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_name_city ON companies(company_name, city)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

/// Row as read from SQLite, timestamps still as text
struct RawCompany {
    id: i64,
    key: String,
    name: Option<String>,
    locality: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawCompany {
    fn into_company(self) -> Result<Company, StoreError> {
        Ok(Company {
            id: Some(self.id),
            key: self.key,
            name: self.name,
            locality: self.locality,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

fn raw_company_from_row(row: &Row<'_>) -> rusqlite::Result<RawCompany> {
    Ok(RawCompany {
        id: row.get(0)?,
        key: row.get(1)?,
        name: row.get(2)?,
        locality: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::CorruptTimestamp {
            column,
            value: value.to_string(),
        })
}

/// `%needle%`, with LIKE metacharacters escaped so they match literally
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn to_sql_int(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(format!("{} does not fit in i64", value)))
}

fn from_sql_count(value: i64) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::OutOfRange(format!("negative count {}", value)))
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

impl RecordStore for SqliteStore {
    fn upsert_by_key(&self, records: &[Company]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(self.upsert_sql())?;
            for company in records {
                stmt.execute(params![
                    company.key,
                    company.name,
                    company.locality,
                    company.created_at.to_rfc3339(),
                    company.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(records = records.len(), "upserted companies");
        Ok(records.len())
    }

    fn find_by_field_substring(
        &self,
        field: CompanyField,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let column = field.column();
        let sql = format!(
            r"SELECT {column} FROM companies
              WHERE unicode_lower({column}) LIKE unicode_lower(?1) ESCAPE '\'
              ORDER BY id
              LIMIT ?2"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map(params![like_pattern(needle), to_sql_int(limit)?], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(values)
    }

    fn find_any_field_substring(
        &self,
        needle: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Company>, usize), StoreError> {
        let filter = r"unicode_lower(company_name) LIKE unicode_lower(?1) ESCAPE '\'
                       OR unicode_lower(city) LIKE unicode_lower(?1) ESCAPE '\'
                       OR unicode_lower(coc_number) LIKE unicode_lower(?1) ESCAPE '\'";
        let pattern = like_pattern(needle);

        let total = self.count(
            &format!("SELECT COUNT(*) FROM companies WHERE {filter}"),
            params![pattern],
        )?;

        let companies = self.query_companies(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM companies WHERE {filter}
                 ORDER BY id LIMIT ?2 OFFSET ?3"
            ),
            params![pattern, to_sql_int(limit)?, to_sql_int(offset)?],
        )?;

        Ok((companies, total))
    }

    fn list_all(&self, offset: usize, limit: usize) -> Result<(Vec<Company>, usize), StoreError> {
        let total = self.count_all()?;

        let companies = self.query_companies(
            &format!("SELECT {SELECT_COLUMNS} FROM companies ORDER BY id LIMIT ?1 OFFSET ?2"),
            params![to_sql_int(limit)?, to_sql_int(offset)?],
        )?;

        Ok((companies, total))
    }

    fn find_by_key(&self, key: &str) -> Result<Option<Company>, StoreError> {
        let mut companies = self.query_companies(
            &format!("SELECT {SELECT_COLUMNS} FROM companies WHERE coc_number = ?1"),
            params![key],
        )?;

        Ok(companies.pop())
    }

    fn count_all(&self) -> Result<usize, StoreError> {
        self.count("SELECT COUNT(*) FROM companies", params![])
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let deleted = self.conn.execute("DELETE FROM companies", [])?;
        info!(deleted, "cleared all companies");
        Ok(deleted)
    }
}
