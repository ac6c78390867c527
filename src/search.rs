//! Ranking of cached titles against a query.
//!
//! Matching is a pure function over a snapshot. Every searchable name of a
//! title is scored and the best score is kept:
//!
//! | match                        | score        |
//! |------------------------------|--------------|
//! | exact (case-insensitive)     | `1.0`        |
//! | name starts with the query   | `0.85`       |
//! | name contains the query      | `0.7`        |
//! | otherwise                    | Dice bigrams |
//!
//! Titles scoring below the threshold are dropped and the rest are sorted by
//! descending score, keeping corpus order among equal scores.
//!
//! # Examples
//!
//! ```rust
//! use hondana::search::SearchBuilder;
//! use hondana::types::SearchableTitle;
//!
//! let corpus = vec![SearchableTitle {
//!     id: 1,
//!     title: "Ocean King".to_string(),
//!     url: "https://example.com/ocean-king".to_string(),
//!     author: None,
//!     updated: None,
//!     cover_image_url: None,
//!     genres: vec!["Action".to_string()],
//!     searchable_names: vec!["Ocean King".to_string(), "Sea Monarch".to_string()],
//! }];
//!
//! let hits = SearchBuilder::new(&corpus, "ocean").genre("action").run();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].score, 0.85);
//! ```

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::cache::CacheSnapshot;
use crate::source::SourceKind;
use crate::types::{SearchHit, SearchParams, SearchableTitle};

const EXACT_SCORE: f64 = 1.0;
const PREFIX_SCORE: f64 = 0.85;
const SUBSTRING_SCORE: f64 = 0.7;

/// Minimum score for the fuzzy fallback of [`find_by_slug`].
pub const SLUG_FUZZY_THRESHOLD: f64 = 0.6;

/// Lowercases `text` and joins its alphanumeric runs with `-`.
///
/// ```rust
/// use hondana::search::slugify;
///
/// assert_eq!(slugify("  Slice of Life!! "), "slice-of-life");
/// assert_eq!(slugify("Re:Zero"), "re-zero");
/// ```
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Sørensen-Dice coefficient over character bigrams, in `[0, 1]`.
///
/// Whitespace runs count as a single space, so word order affects the score.
/// Repeated bigrams are matched at most as often as they occur in both
/// strings.
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    let a = a.split_whitespace().collect::<Vec<_>>().join(" ");
    let b = b.split_whitespace().collect::<Vec<_>>().join(" ");
    if a == b {
        return 1.0;
    }

    let left = bigrams(&a);
    let right = bigrams(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for bigram in &left {
        *counts.entry(*bigram).or_default() += 1;
    }
    let mut matches = 0;
    for bigram in &right {
        if let Some(count) = counts.get_mut(bigram).filter(|count| **count > 0) {
            *count -= 1;
            matches += 1;
        }
    }

    (2 * matches) as f64 / (left.len() + right.len()) as f64
}

/// Scores one lowercase name against a lowercase query.
fn score_name(query: &str, name: &str) -> f64 {
    if name == query {
        EXACT_SCORE
    } else if name.starts_with(query) {
        PREFIX_SCORE
    } else if name.contains(query) {
        SUBSTRING_SCORE
    } else {
        dice_coefficient(query, name)
    }
}

fn matches_genre(title: &SearchableTitle, genre_slug: &str) -> bool {
    title.genres.iter().any(|genre| slugify(genre) == genre_slug)
}

fn score_title(query: &str, title: &SearchableTitle) -> (f64, String) {
    let names: Vec<&str> = if title.searchable_names.is_empty() {
        vec![title.title.as_str()]
    } else {
        title.searchable_names.iter().map(String::as_str).collect()
    };

    let mut best = (0.0, title.title.clone());
    for name in names.into_iter().filter(|name| !name.is_empty()) {
        let score = score_name(query, &name.to_lowercase());
        if score > best.0 {
            best = (score, name.to_string());
        }
    }
    best
}

/// Ranks `corpus` against `query`.
///
/// When `genre_filter` is set, only titles carrying a genre with the same
/// slug are considered. An empty query yields no hits.
pub fn search(
    query: &str,
    corpus: &[SearchableTitle],
    threshold: f64,
    genre_filter: Option<&str>,
) -> Vec<SearchHit> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let genre_slug = genre_filter.map(slugify).filter(|slug| !slug.is_empty());

    let mut hits: Vec<SearchHit> = corpus
        .par_iter()
        .filter(|title| genre_slug.as_deref().is_none_or(|slug| matches_genre(title, slug)))
        .filter_map(|title| {
            let (score, matched_name) = score_title(&query, title);
            (score >= threshold).then(|| SearchHit {
                title: title.clone(),
                score,
                matched_name,
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    debug!(
        query = %query,
        candidates = corpus.len(),
        hits = hits.len(),
        "Search complete"
    );
    hits
}

/// A fluent search over one source's titles.
///
/// `SearchBuilder` collects [`SearchParams`] through chained calls and runs
/// them against the borrowed corpus, usually a published cache snapshot.
///
/// # Execution
///
/// - [`run()`](SearchBuilder::run) - Every hit, best first, capped by `limit`
/// - [`best()`](SearchBuilder::best) - Only the top hit
/// - [`build()`](SearchBuilder::build) - Just the parameters
///
/// # Examples
///
/// ```rust
/// use hondana::prelude::*;
///
/// # fn example(snapshot: CacheSnapshot) {
/// let hits = SearchBuilder::new(snapshot.get(SourceKind::Manga), "garden")
///     .threshold(0.4)
///     .genre("Slice of Life")
///     .limit(10)
///     .run();
///
/// for hit in hits {
///     println!("{:.2} {}", hit.score, hit.title.title);
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SearchBuilder<'a> {
    corpus: &'a [SearchableTitle],
    params: SearchParams,
}

impl<'a> SearchBuilder<'a> {
    /// Starts a search with the default threshold and no filters.
    pub fn new(corpus: &'a [SearchableTitle], query: impl Into<String>) -> Self {
        Self::with_params(corpus, SearchParams::from(query.into()))
    }

    /// Starts a search from prepared parameters.
    pub fn with_params(corpus: &'a [SearchableTitle], params: SearchParams) -> Self {
        Self { corpus, params }
    }

    /// Sets the minimum score a title needs to be returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hondana::search::SearchBuilder;
    ///
    /// let params = SearchBuilder::new(&[], "ocean").threshold(0.6).build();
    /// assert_eq!(params.threshold, 0.6);
    /// ```
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.params.threshold = threshold;
        self
    }

    /// Keeps only titles tagged with `genre`, compared by slug.
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.params.genre = Some(genre.into());
        self
    }

    /// Caps the number of hits returned by [`run`](Self::run).
    pub fn limit(mut self, limit: usize) -> Self {
        self.params.limit = Some(limit);
        self
    }

    /// Returns the collected parameters without searching.
    pub fn build(self) -> SearchParams {
        self.params
    }

    /// Runs the search.
    pub fn run(self) -> Vec<SearchHit> {
        let mut hits = search(
            &self.params.query,
            self.corpus,
            self.params.threshold,
            self.params.genre.as_deref(),
        );
        if let Some(limit) = self.params.limit {
            hits.truncate(limit);
        }
        hits
    }

    /// Runs the search and returns the top hit.
    pub fn best(self) -> Option<SearchHit> {
        self.limit(1).run().into_iter().next()
    }
}

/// Resolves a detail-page slug to the single best title across every source.
///
/// A title whose canonical or alternate name slugifies to `slug` wins
/// outright with a score of `1.0`, scanning sources in
/// [`SourceKind::ALL`] order. Otherwise the slug is searched as words in
/// every source and the highest scoring hit at or above `threshold` is
/// returned.
pub fn find_by_slug(
    slug: &str,
    snapshot: &CacheSnapshot,
    threshold: f64,
) -> Option<(SourceKind, SearchHit)> {
    let slug = slug.trim().to_lowercase();
    if slug.is_empty() {
        return None;
    }

    for (kind, titles) in snapshot.iter() {
        for title in titles {
            let exact = std::iter::once(&title.title)
                .chain(&title.searchable_names)
                .find(|name| slugify(name) == slug);
            if let Some(name) = exact {
                return Some((
                    kind,
                    SearchHit {
                        title: title.clone(),
                        score: EXACT_SCORE,
                        matched_name: name.clone(),
                    },
                ));
            }
        }
    }

    let words = slug.replace('-', " ");
    let mut hits: Vec<(SourceKind, SearchHit)> = snapshot
        .iter()
        .flat_map(|(kind, titles)| {
            search(&words, titles, threshold, None)
                .into_iter()
                .map(move |hit| (kind, hit))
        })
        .collect();
    hits.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    hits.into_iter().next()
}
