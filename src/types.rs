//! Core data types for catalog records, cache projections and search parameters.
//!
//! - [`TitleRecord`] - A cataloged work as extracted from a detail page
//! - [`ListingEntry`] - A title as it appears on a paginated listing page
//! - [`Chapter`] - A chapter link on a detail page
//! - [`SearchableTitle`] - The cache-layer projection of a stored record
//! - [`SearchHit`] - A ranked search result
//! - [`SearchParams`] - Parameters for matching against a snapshot
//!
//! # Examples
//!
//! ```rust
//! use hondana::types::TitleRecord;
//!
//! let record = TitleRecord::new("Ocean King", "https://example.com/manga/ocean-king");
//! assert_eq!(record.author, "N/A");
//! assert_eq!(record.cover_image_url, "N/A");
//! ```

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Placeholder for display metadata that could not be found.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder title used when no selector produced a name.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Default minimum score for a search result to be kept.
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Returns `true` if a title is empty or one of the listing placeholders.
pub fn is_placeholder_title(title: &str) -> bool {
    let trimmed = title.trim();
    trimmed.is_empty() || trimmed == UNKNOWN_TITLE || trimmed == "Unknown Title"
}

/// A cataloged work for one source, as extracted from its detail page.
///
/// `title` is the upsert key within a source store and never changes in
/// place; `url`, `author`, `updated`, `cover_image_url` and `genres` are
/// overwritten on every upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    /// Store-assigned surrogate key, `None` until persisted
    #[serde(default)]
    pub id: Option<i64>,

    /// Canonical display name
    pub title: String,

    /// Canonical detail-page address
    pub url: String,

    /// Author, `"N/A"` when unknown
    pub author: String,

    /// Free-text or ISO date of the last update
    pub updated: String,

    /// Absolute cover URL, `"N/A"` when unknown
    pub cover_image_url: String,

    /// Genre tags in page order
    #[serde(default)]
    pub genres: Vec<String>,

    /// Alternate titles
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl TitleRecord {
    /// Creates a record with every optional field set to its sentinel.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            url: url.into(),
            author: NOT_AVAILABLE.to_string(),
            updated: today(),
            cover_image_url: NOT_AVAILABLE.to_string(),
            genres: Vec::new(),
            alternatives: Vec::new(),
        }
    }
}

/// Today's date in `YYYY-MM-DD` form, the default `updated` value.
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// A title as listed on an index page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub title: String,
    pub url: String,
    pub cover_image_url: Option<String>,
}

/// A chapter link. Lists of chapters are ordered oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub url: String,
}

/// Cache-layer projection of a stored [`TitleRecord`].
///
/// `searchable_names` is the canonical title followed by every alternate
/// name, with empty entries removed. Instances are built fresh on every
/// cache rebuild and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchableTitle {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub author: Option<String>,
    pub updated: Option<String>,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub searchable_names: Vec<String>,
}

/// A record that scored at or above the search threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: SearchableTitle,

    /// Best score across all searchable names, in `[0, 1]`
    pub score: f64,

    /// The searchable name that produced `score`
    pub matched_name: String,
}

/// Parameters for matching a query against a cached snapshot.
///
/// ```rust
/// use hondana::types::SearchParamsBuilder;
///
/// let params = SearchParamsBuilder::default()
///     .query("ocean king")
///     .genre(Some("Action".to_string()))
///     .build()
///     .unwrap();
/// assert_eq!(params.threshold, 0.2);
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct SearchParams {
    pub query: String,
    #[builder(default = "DEFAULT_THRESHOLD")]
    pub threshold: f64,
    #[builder(default)]
    pub genre: Option<String>,
    #[builder(default)]
    pub limit: Option<usize>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            threshold: DEFAULT_THRESHOLD,
            genre: None,
            limit: None,
        }
    }
}

impl From<&str> for SearchParams {
    fn from(query: &str) -> Self {
        SearchParams {
            query: query.to_string(),
            ..Default::default()
        }
    }
}

impl From<String> for SearchParams {
    fn from(query: String) -> Self {
        SearchParams {
            query,
            ..Default::default()
        }
    }
}
