//! Atomically published, per-source search snapshots.
//!
//! Every source has one slot holding an `Arc<Vec<SearchableTitle>>`. A
//! rebuild reads the whole store, builds a fresh collection and swaps the
//! `Arc` in a single assignment, so readers see either the previous or the
//! new collection in full. Every publish, full or partial, broadcasts the
//! complete current [`CacheSnapshot`] to subscribers.
//!
//! # Examples
//!
//! ```rust
//! use hondana::cache::CacheManager;
//! use hondana::source::SourceKind;
//! use hondana::store::SourceStores;
//!
//! # async fn example() -> hondana::Result<()> {
//! let cache = CacheManager::new(SourceStores::open_in_memory().await?);
//! let mut updates = cache.subscribe();
//!
//! cache.load_all().await?;
//! let snapshot = updates.recv().await.unwrap();
//! assert!(snapshot.get(SourceKind::Manga).is_empty());
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::Result;
use crate::source::SourceKind;
use crate::store::SourceStores;
use crate::types::SearchableTitle;

/// Buffered snapshots per subscriber before the slowest one starts lagging.
const CHANNEL_CAPACITY: usize = 16;

/// Titles of one source at one point in time. Never mutated after publish.
pub type Snapshot = Arc<Vec<SearchableTitle>>;

/// The published collections of every source.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub shojo: Snapshot,
    pub toongod: Snapshot,
    pub manga: Snapshot,
}

impl CacheSnapshot {
    pub fn get(&self, kind: SourceKind) -> &Snapshot {
        match kind {
            SourceKind::Shojo => &self.shojo,
            SourceKind::ToonGod => &self.toongod,
            SourceKind::Manga => &self.manga,
        }
    }

    /// Each source with its titles, in [`SourceKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &[SearchableTitle])> {
        SourceKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind).as_slice()))
    }

    /// Title count across all sources.
    pub fn total(&self) -> usize {
        self.iter().map(|(_, titles)| titles.len()).sum()
    }
}

/// Owns the per-source slots and the publish channel.
pub struct CacheManager {
    stores: SourceStores,
    shojo: RwLock<Snapshot>,
    toongod: RwLock<Snapshot>,
    manga: RwLock<Snapshot>,
    sender: broadcast::Sender<CacheSnapshot>,
}

impl CacheManager {
    /// Creates a manager with empty slots. Call [`load_all`](Self::load_all)
    /// before serving reads.
    pub fn new(stores: SourceStores) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            stores,
            shojo: RwLock::default(),
            toongod: RwLock::default(),
            manga: RwLock::default(),
            sender,
        }
    }

    pub fn stores(&self) -> &SourceStores {
        &self.stores
    }

    fn slot(&self, kind: SourceKind) -> &RwLock<Snapshot> {
        match kind {
            SourceKind::Shojo => &self.shojo,
            SourceKind::ToonGod => &self.toongod,
            SourceKind::Manga => &self.manga,
        }
    }

    async fn build(&self, kind: SourceKind) -> Result<Snapshot> {
        let titles = self.stores.get(kind).get_all_titles_for_search().await?;
        Ok(Arc::new(titles))
    }

    fn publish(&self, kind: SourceKind, snapshot: Snapshot) {
        let count = snapshot.len();
        *self.slot(kind).write() = snapshot;
        info!(source = kind.tag(), titles = count, "Cache published");
    }

    fn notify(&self) {
        if self.sender.send(self.get_caches()).is_err() {
            debug!("No cache subscribers");
        }
    }

    /// Rebuilds every source and notifies subscribers once.
    ///
    /// All three collections are read before any slot is replaced; if one
    /// read fails, no slot changes.
    pub async fn load_all(&self) -> Result<()> {
        let mut built = Vec::with_capacity(SourceKind::ALL.len());
        for kind in SourceKind::ALL {
            built.push((kind, self.build(kind).await?));
        }
        for (kind, snapshot) in built {
            self.publish(kind, snapshot);
        }
        self.notify();
        Ok(())
    }

    /// Rebuilds one source and notifies subscribers with the full snapshot.
    pub async fn reload_source(&self, kind: SourceKind) -> Result<()> {
        let snapshot = self.build(kind).await?;
        self.publish(kind, snapshot);
        self.notify();
        Ok(())
    }

    /// The currently published collections.
    pub fn get_caches(&self) -> CacheSnapshot {
        CacheSnapshot {
            shojo: self.shojo.read().clone(),
            toongod: self.toongod.read().clone(),
            manga: self.manga.read().clone(),
        }
    }

    /// Receives a [`CacheSnapshot`] after every publish.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheSnapshot> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TitleRecord;

    async fn seed(stores: &SourceStores, kind: SourceKind, titles: &[&str]) {
        for title in titles {
            let url = format!("https://{}.test/{}", kind, title.replace(' ', "-"));
            stores
                .get(kind)
                .upsert_title(&TitleRecord::new(*title, url))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_load_all_publishes_every_source() {
        let stores = SourceStores::open_in_memory().await.unwrap();
        seed(&stores, SourceKind::Shojo, &["Ocean King"]).await;
        seed(&stores, SourceKind::Manga, &["Quiet Garden", "Night Shift"]).await;

        let cache = CacheManager::new(stores);
        assert_eq!(cache.get_caches().total(), 0);

        cache.load_all().await.unwrap();
        let snapshot = cache.get_caches();
        assert_eq!(snapshot.shojo.len(), 1);
        assert!(snapshot.toongod.is_empty());
        assert_eq!(snapshot.manga.len(), 2);
        assert_eq!(snapshot.total(), 3);
    }

    #[tokio::test]
    async fn test_held_snapshot_is_never_mutated() {
        let stores = SourceStores::open_in_memory().await.unwrap();
        seed(&stores, SourceKind::Manga, &["A", "B", "C"]).await;
        let cache = CacheManager::new(stores);
        cache.load_all().await.unwrap();

        let before = cache.get_caches();
        seed(cache.stores(), SourceKind::Manga, &["D", "E"]).await;
        cache.reload_source(SourceKind::Manga).await.unwrap();

        assert_eq!(before.manga.len(), 3);
        assert_eq!(cache.get_caches().manga.len(), 5);
    }

    #[tokio::test]
    async fn test_partial_reload_broadcasts_full_snapshot() {
        let stores = SourceStores::open_in_memory().await.unwrap();
        seed(&stores, SourceKind::Shojo, &["Ocean King"]).await;
        let cache = CacheManager::new(stores);
        cache.load_all().await.unwrap();

        let mut updates = cache.subscribe();
        seed(cache.stores(), SourceKind::Manga, &["Quiet Garden"]).await;
        cache.reload_source(SourceKind::Manga).await.unwrap();

        let snapshot = updates.recv().await.unwrap();
        assert_eq!(snapshot.shojo.len(), 1);
        assert_eq!(snapshot.manga.len(), 1);
        assert_eq!(snapshot.manga[0].title, "Quiet Garden");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_readers_see_whole_collections() {
        let stores = SourceStores::open_in_memory().await.unwrap();
        seed(&stores, SourceKind::ToonGod, &["A", "B", "C"]).await;
        let cache = Arc::new(CacheManager::new(stores));
        cache.load_all().await.unwrap();
        seed(cache.stores(), SourceKind::ToonGod, &["D", "E"]).await;

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for _ in 0..2_000 {
                    let len = cache.get_caches().toongod.len();
                    assert!(len == 3 || len == 5, "torn collection of {len}");
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..10 {
            cache.reload_source(SourceKind::ToonGod).await.unwrap();
        }
        reader.await.unwrap();
        assert_eq!(cache.get_caches().toongod.len(), 5);
    }
}
