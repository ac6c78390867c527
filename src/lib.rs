//! # Hondana - catalog acquisition and search cache for manga sites
//!
//! Hondana crawls the listing and detail pages of several manga and manhwa
//! sites, normalizes what it finds into one record shape, persists it in a
//! SQLite database per source and serves it through an in-memory snapshot
//! that is rebuilt on a schedule and swapped atomically.
//!
//! ## Features
//!
//! - **Retrying fetches**: timeouts with exponential backoff and per-source referers
//! - **Source extractors**: one [`source::Extractor`] per site, driven by CSS selectors
//! - **Chunked batches**: bounded concurrency with a pause between chunks and a failure ledger
//! - **Idempotent storage**: title-keyed upserts with alternate names
//! - **Atomic snapshots**: readers always see a whole collection
//! - **Scheduled refresh**: an hourly full cycle and a ten-minute cycle for the busiest source
//! - **Fuzzy search**: tiered scoring with a bigram fallback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hondana::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> hondana::Result<()> {
//!     let config = Config::default();
//!     let stores = SourceStores::open(&config.database).await?;
//!     let orchestrator = BatchOrchestrator::new(HttpClient::new(&config.fetch)?, config.batch);
//!
//!     // Ingest the newest page of one source
//!     let ledger = orchestrator
//!         .refresh_listing_page(SourceKind::Manga, 1, stores.get(SourceKind::Manga))
//!         .await;
//!     println!("saved {}, failed {}", ledger.saved(), ledger.len());
//!
//!     // Publish and search
//!     let cache = Arc::new(CacheManager::new(stores));
//!     cache.load_all().await?;
//!     let snapshot = cache.get_caches();
//!     let hits = SearchBuilder::new(snapshot.get(SourceKind::Manga), "solo leveling")
//!         .limit(5)
//!         .run();
//!     for hit in hits {
//!         println!("{:.2} {}", hit.score, hit.title.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`net`]: HTTP transport, retry policy and HTML helpers
//! - [`source`] and [`sources`]: the extractor contract and its site implementations
//! - [`batch`]: chunked detail fetching, listing refresh and full crawls
//! - [`store`]: per-source SQLite persistence
//! - [`cache`]: published snapshots and change notifications
//! - [`scheduler`]: the slow and fast refresh loops
//! - [`search`]: ranking over a snapshot
//! - [`config`], [`types`] and [`error`]: shared configuration, data and errors

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod net;
pub mod scheduler;
pub mod search;
pub mod source;
pub mod sources;
pub mod store;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hondana::prelude::*;
///
/// let params = SearchParams::from("ocean king");
/// assert_eq!(params.threshold, hondana::types::DEFAULT_THRESHOLD);
/// ```
pub mod prelude {
    pub use crate::{
        batch::{BatchOrchestrator, ErrorLedger, FailedUrl, FailureKind},
        cache::{CacheManager, CacheSnapshot},
        config::{BatchConfig, Config, FetchConfig, ScheduleConfig, load_config},
        net::{FetchOptions, HttpClient},
        scheduler::{Scheduler, SchedulerHandle},
        search::{SearchBuilder, find_by_slug, search},
        source::{Extractor, SourceKind},
        store::{SourceStores, Store},
        types::{Chapter, ListingEntry, SearchHit, SearchParams, SearchableTitle, TitleRecord},
    };
}

// Re-export main types at crate root for direct access
pub use error::{Error, Result};
pub use source::SourceKind;
pub use types::{SearchHit, SearchableTitle, TitleRecord};
