// 🔎 Keyword suggestions and paginated search over stored companies

use crate::company::Company;
use crate::config::SearchConfig;
use crate::error::StoreError;
use crate::store::{CompanyField, RecordStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// SUGGESTIONS
// ============================================================================

/// Which field a suggestion came from. Serialized with the display labels
/// the autocomplete widget expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuggestionKind {
    #[serde(rename = "Company Name")]
    CompanyName,
    #[serde(rename = "City")]
    City,
    #[serde(rename = "CoC Number")]
    CocNumber,
}

impl SuggestionKind {
    /// Probe order: names first, then cities, then CoC numbers
    pub const LOOKUP_ORDER: [SuggestionKind; 3] = [
        SuggestionKind::CompanyName,
        SuggestionKind::City,
        SuggestionKind::CocNumber,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SuggestionKind::CompanyName => "Company Name",
            SuggestionKind::City => "City",
            SuggestionKind::CocNumber => "CoC Number",
        }
    }

    pub fn field(&self) -> CompanyField {
        match self {
            SuggestionKind::CompanyName => CompanyField::Name,
            SuggestionKind::City => CompanyField::Locality,
            SuggestionKind::CocNumber => CompanyField::Key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
}

/// Stateless per call: every `suggest` goes back to the store.
pub struct SuggestionAggregator<'a> {
    store: &'a dyn RecordStore,
    config: SearchConfig,
}

impl<'a> SuggestionAggregator<'a> {
    pub fn new(store: &'a dyn RecordStore, config: SearchConfig) -> Self {
        SuggestionAggregator { store, config }
    }

    /// Autocomplete candidates for a partial query.
    ///
    /// Blank or too-short queries return nothing without touching the store.
    /// Otherwise each field is looked up (capped per field), the lists are merged
    /// in field order, deduplicated by text (first wins) and truncated.
    pub fn suggest(&self, query: Option<&str>) -> Result<Vec<Suggestion>, StoreError> {
        let query = match query {
            Some(q) if !is_blank(q) && q.chars().count() >= self.config.min_query_length => q,
            _ => return Ok(Vec::new()),
        };

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for kind in SuggestionKind::LOOKUP_ORDER {
            let values = self.store.find_by_field_substring(
                kind.field(),
                query,
                self.config.suggestions_per_field,
            )?;

            suggestions.extend(
                values
                    .into_iter()
                    .map(|text| Suggestion { text, kind }),
            );
        }

        suggestions.retain(|s| seen.insert(s.text.clone()));
        suggestions.truncate(self.config.max_suggestions);

        debug!(query, count = suggestions.len(), "suggestions");
        Ok(suggestions)
    }
}

// ============================================================================
// PAGINATED SEARCH
// ============================================================================

/// One page of results. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_count: usize,
}

impl<T> Page<T> {
    pub fn empty(page: usize, per_page: usize) -> Self {
        Page {
            items: Vec::new(),
            page,
            per_page,
            total_count: 0,
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct CompanySearch<'a> {
    store: &'a dyn RecordStore,
    config: SearchConfig,
}

impl<'a> CompanySearch<'a> {
    pub fn new(store: &'a dyn RecordStore, config: SearchConfig) -> Self {
        CompanySearch { store, config }
    }

    /// Companies whose name, city or CoC number contains `query`.
    /// A blank query yields an empty page without a store call.
    pub fn search(&self, query: Option<&str>, page: usize, per_page: Option<usize>) -> Result<Page<Company>, StoreError> {
        let (page, per_page) = self.window(page, per_page);

        let query = match query {
            Some(q) if !is_blank(q) => q,
            _ => return Ok(Page::empty(page, per_page)),
        };

        let (items, total_count) =
            self.store
                .find_any_field_substring(query, (page - 1).saturating_mul(per_page), per_page)?;

        debug!(query, page, total_count, "company search");
        Ok(Page {
            items,
            page,
            per_page,
            total_count,
        })
    }

    /// All companies, paginated in store order
    pub fn list(&self, page: usize, per_page: Option<usize>) -> Result<Page<Company>, StoreError> {
        let (page, per_page) = self.window(page, per_page);
        let (items, total_count) = self
            .store
            .list_all((page - 1).saturating_mul(per_page), per_page)?;

        Ok(Page {
            items,
            page,
            per_page,
            total_count,
        })
    }

    fn window(&self, page: usize, per_page: Option<usize>) -> (usize, usize) {
        let per_page = per_page.filter(|n| *n > 0).unwrap_or(self.config.per_page);
        (page.max(1), per_page)
    }
}

fn is_blank(query: &str) -> bool {
    query.trim().is_empty()
}
