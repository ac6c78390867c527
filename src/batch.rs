//! Chunked detail-page ingestion.
//!
//! [`BatchOrchestrator`] fans detail fetches out in fixed-size chunks, waits
//! for every outcome in a chunk before starting the next, then extracts and
//! persists each successful document in order. Per-URL failures never stop
//! a batch: they are logged and collected in the returned [`ErrorLedger`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::batch::BatchOrchestrator;
//! use hondana::config::Config;
//! use hondana::net::HttpClient;
//! use hondana::source::SourceKind;
//! use hondana::store::Store;
//!
//! # async fn example() -> hondana::Result<()> {
//! let config = Config::default();
//! let client = HttpClient::new(&config.fetch)?;
//! let orchestrator = BatchOrchestrator::new(client, config.batch.clone());
//! let store = Store::open_in_memory().await?;
//!
//! let ledger = orchestrator
//!     .refresh_listing_page(SourceKind::Manga, 1, &store)
//!     .await;
//! println!("{} saved, {} failed", ledger.saved(), ledger.len());
//! # Ok(())
//! # }
//! ```

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::BatchConfig;
use crate::error::Result;
use crate::net::{FetchOptions, HttpClient, html};
use crate::source::{Extractor, SourceKind};
use crate::store::Store;
use crate::types::{Chapter, is_placeholder_title};

/// Why a URL ended up in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retries exhausted without a usable response
    Fetch,
    /// The document lacked required fields
    Parse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Fetch => f.write_str("fetch"),
            FailureKind::Parse => f.write_str("parse"),
        }
    }
}

/// A single failed URL
#[derive(Debug, Clone, PartialEq)]
pub struct FailedUrl {
    pub url: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one or more batch runs.
///
/// Owned by the caller; nothing is shared between runs unless the caller
/// [`merge`](ErrorLedger::merge)s ledgers itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorLedger {
    failures: Vec<FailedUrl>,
    saved: usize,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, url: &str, kind: FailureKind, reason: impl fmt::Display) {
        self.failures.push(FailedUrl {
            url: url.to_string(),
            kind,
            reason: reason.to_string(),
        });
    }

    pub(crate) fn record_saved(&mut self) {
        self.saved += 1;
    }

    /// Folds another run's results into this one.
    pub fn merge(&mut self, other: ErrorLedger) {
        self.failures.extend(other.failures);
        self.saved += other.saved;
    }

    pub fn failures(&self) -> &[FailedUrl] {
        &self.failures
    }

    /// URLs that failed, in the order they were recorded.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.url.as_str())
    }

    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    /// Number of records persisted with a resolved id.
    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives listing refreshes, detail batches and full crawls for any source.
#[derive(Clone)]
pub struct BatchOrchestrator {
    client: HttpClient,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(client: HttpClient, config: BatchConfig) -> Self {
        Self { client, config }
    }

    fn options_for(extractor: &dyn Extractor, url: &str) -> FetchOptions {
        FetchOptions::new().with_referer(&extractor.referer(url))
    }

    /// Fetches, extracts and persists every detail URL.
    ///
    /// `hints` maps detail URLs to titles seen on a listing page; they take
    /// precedence over titles found on the detail page. Persistence errors
    /// are logged but not recorded in the ledger.
    pub async fn process_batch(
        &self,
        kind: SourceKind,
        urls: &[String],
        store: &Store,
        hints: &HashMap<String, String>,
    ) -> ErrorLedger {
        let extractor = kind.extractor();
        let chunk_size = self.config.chunk_size.max(1);
        let mut ledger = ErrorLedger::new();

        for (index, chunk) in urls.chunks(chunk_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.chunk_pause()).await;
            }
            debug!(source = kind.tag(), chunk = index + 1, size = chunk.len(), "Fetching chunk");

            let outcomes = join_all(chunk.iter().map(|url| async move {
                let options = Self::options_for(extractor, url);
                (url, self.client.fetch(url, &options).await)
            }))
            .await;

            for (url, outcome) in outcomes {
                let document = match outcome {
                    Ok(document) => document,
                    Err(e) => {
                        warn!(source = kind.tag(), url = %url, error = %e, "Detail fetch failed");
                        ledger.record(url, FailureKind::Fetch, &e);
                        continue;
                    }
                };

                let extracted = {
                    let parsed = html::parse(&document.body);
                    extractor.extract_detail(&parsed, url, hints.get(url).map(String::as_str))
                };
                let record = match extracted {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(source = kind.tag(), url = %url, error = %e, "Detail parse failed");
                        ledger.record(url, FailureKind::Parse, &e);
                        continue;
                    }
                };

                match store.upsert_title(&record).await {
                    Ok(Some(_)) => ledger.record_saved(),
                    Ok(None) => {}
                    Err(e) => {
                        error!(source = kind.tag(), title = %record.title, error = %e, "Failed to save title")
                    }
                }
            }
        }

        info!(
            source = kind.tag(),
            urls = urls.len(),
            saved = ledger.saved(),
            fetch_errors = ledger.count(FailureKind::Fetch),
            parse_errors = ledger.count(FailureKind::Parse),
            "Batch complete"
        );
        ledger
    }

    /// Re-scrapes one listing page and ingests every title on it.
    ///
    /// A listing page that cannot be fetched is logged and yields an empty
    /// ledger; only detail pages are ledger entries.
    pub async fn refresh_listing_page(&self, kind: SourceKind, page: u32, store: &Store) -> ErrorLedger {
        let extractor = kind.extractor();
        let url = extractor.listing_url(page);

        let body = match self
            .client
            .get_text(&url, &Self::options_for(extractor, &url))
            .await
        {
            Ok(body) => body,
            Err(e) => {
                error!(source = kind.tag(), page, url = %url, error = %e, "Listing page fetch failed");
                return ErrorLedger::new();
            }
        };

        let entries = extractor.extract_listing(&html::parse(&body));
        if entries.is_empty() {
            info!(source = kind.tag(), page, "No titles found on listing page");
            return ErrorLedger::new();
        }

        let mut seen = HashSet::new();
        let urls: Vec<String> = entries
            .iter()
            .filter(|entry| seen.insert(entry.url.clone()))
            .map(|entry| entry.url.clone())
            .collect();
        let hints: HashMap<String, String> = entries
            .into_iter()
            .filter(|entry| !is_placeholder_title(&entry.title))
            .map(|entry| (entry.url, entry.title))
            .collect();

        info!(source = kind.tag(), page, titles = urls.len(), "Processing listing page");
        self.process_batch(kind, &urls, store, &hints).await
    }

    /// Walks every listing page of a source, pausing between pages.
    ///
    /// The page count is fixed per source, or read from page 1's
    /// pagination when the source does not fix one.
    pub async fn crawl_all(&self, kind: SourceKind, store: &Store) -> ErrorLedger {
        let pages = match kind.extractor().full_crawl_pages() {
            Some(pages) => pages,
            None => self.discover_last_page(kind).await,
        };
        info!(source = kind.tag(), pages, "Starting full crawl");

        let mut ledger = ErrorLedger::new();
        for page in 1..=pages {
            if page > 1 {
                tokio::time::sleep(self.config.page_pause()).await;
            }
            ledger.merge(self.refresh_listing_page(kind, page, store).await);
        }

        info!(
            source = kind.tag(),
            saved = ledger.saved(),
            failed = ledger.len(),
            "Full crawl complete"
        );
        ledger
    }

    async fn discover_last_page(&self, kind: SourceKind) -> u32 {
        let extractor = kind.extractor();
        let url = extractor.listing_url(1);
        match self
            .client
            .get_text(&url, &Self::options_for(extractor, &url))
            .await
        {
            Ok(body) => extractor.last_page(&html::parse(&body)).unwrap_or(1),
            Err(e) => {
                error!(source = kind.tag(), error = %e, "Could not read page count");
                1
            }
        }
    }

    /// Chapter links on a detail page, oldest first.
    pub async fn chapters(&self, kind: SourceKind, detail_url: &str) -> Result<Vec<Chapter>> {
        let extractor = kind.extractor();
        let body = self
            .client
            .get_text(detail_url, &Self::options_for(extractor, detail_url))
            .await?;
        Ok(extractor.extract_chapter_list(&html::parse(&body)))
    }

    /// Page image URLs of a chapter, in reading order.
    pub async fn chapter_images(&self, kind: SourceKind, chapter_url: &str) -> Result<Vec<String>> {
        let extractor = kind.extractor();
        let body = self
            .client
            .get_text(chapter_url, &Self::options_for(extractor, chapter_url))
            .await?;
        Ok(extractor.extract_chapter_images(&html::parse(&body)))
    }
}
