//! Periodic refresh cycles.
//!
//! Two independent loops run until shutdown:
//!
//! - **slow** (hourly by default): re-ingests the configured listing pages of
//!   every source, then rebuilds every cache
//! - **fast** (every ten minutes by default): re-ingests the same pages of the
//!   high-churn source only, then rebuilds that source's cache
//!
//! The first tick of each loop fires one full period after start. A failing
//! tick is logged as [`Error::ScheduledCycle`] and the loop keeps its
//! schedule.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hondana::prelude::*;
//!
//! # async fn example(orchestrator: BatchOrchestrator, cache: Arc<CacheManager>) {
//! let handle = Scheduler::new(orchestrator, cache, ScheduleConfig::default()).spawn();
//! tokio::signal::ctrl_c().await.ok();
//! handle.shutdown().await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::batch::{BatchOrchestrator, ErrorLedger};
use crate::cache::CacheManager;
use crate::config::ScheduleConfig;
use crate::error::{Error, Result};
use crate::source::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Slow,
    Fast,
}

impl Cycle {
    fn name(self) -> &'static str {
        match self {
            Cycle::Slow => "slow",
            Cycle::Fast => "fast",
        }
    }
}

/// Runs the refresh cycles against one orchestrator and cache.
pub struct Scheduler {
    orchestrator: BatchOrchestrator,
    cache: Arc<CacheManager>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        orchestrator: BatchOrchestrator,
        cache: Arc<CacheManager>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            orchestrator,
            cache,
            config,
        }
    }

    async fn refresh_pages(&self, kind: SourceKind, page: u32, ledger: &mut ErrorLedger) {
        let store = self.cache.stores().get(kind);
        ledger.merge(self.orchestrator.refresh_listing_page(kind, page, store).await);
    }

    /// Refreshes every source, then rebuilds every cache.
    ///
    /// Pages of the other sources are interleaved page by page; the fast
    /// source's pages follow.
    pub async fn run_slow_cycle(&self) -> Result<ErrorLedger> {
        let fast = self.config.fast_source;
        let mut ledger = ErrorLedger::new();

        for &page in &self.config.refresh_pages {
            for kind in SourceKind::ALL.into_iter().filter(|k| *k != fast) {
                self.refresh_pages(kind, page, &mut ledger).await;
            }
        }
        for &page in &self.config.refresh_pages {
            self.refresh_pages(fast, page, &mut ledger).await;
        }

        self.cache.load_all().await?;
        Ok(ledger)
    }

    /// Refreshes the fast source only, then rebuilds its cache.
    pub async fn run_fast_cycle(&self) -> Result<ErrorLedger> {
        let fast = self.config.fast_source;
        let mut ledger = ErrorLedger::new();

        for &page in &self.config.refresh_pages {
            self.refresh_pages(fast, page, &mut ledger).await;
        }

        self.cache.reload_source(fast).await?;
        Ok(ledger)
    }

    async fn tick(&self, cycle: Cycle) {
        let started = Instant::now();
        let result = match cycle {
            Cycle::Slow => self.run_slow_cycle().await,
            Cycle::Fast => self.run_fast_cycle().await,
        };

        match result {
            Ok(ledger) => info!(
                cycle = cycle.name(),
                saved = ledger.saved(),
                failed = ledger.len(),
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Refresh cycle complete"
            ),
            Err(e) => {
                let e = Error::scheduled(cycle.name(), e);
                error!(cycle = cycle.name(), error = %e, "Refresh cycle failed");
            }
        }
    }

    /// Starts both loops on the current runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, _) = broadcast::channel(1);
        let scheduler = Arc::new(self);

        let slow = scheduler.config.slow_interval();
        let fast = scheduler.config.fast_interval();
        let tasks = vec![
            Self::spawn_loop(Arc::clone(&scheduler), Cycle::Slow, slow, shutdown_tx.subscribe()),
            Self::spawn_loop(scheduler, Cycle::Fast, fast, shutdown_tx.subscribe()),
        ];

        SchedulerHandle { shutdown_tx, tasks }
    }

    fn spawn_loop(
        scheduler: Arc<Self>,
        cycle: Cycle,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(cycle = cycle.name(), period_secs = period.as_secs_f64(), "Refresh loop started");
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(cycle = cycle.name(), "Refresh loop received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        scheduler.tick(cycle).await;
                    }
                }
            }
            info!(cycle = cycle.name(), "Refresh loop stopped");
        })
    }
}

/// Stops the loops started by [`Scheduler::spawn`].
pub struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals both loops and waits for them to exit. A cycle already in
    /// progress runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Refresh loop panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::net::testing::{MapTransport, instant_client};
    use crate::store::SourceStores;
    use std::collections::HashMap;

    fn quick_batch() -> BatchConfig {
        BatchConfig {
            chunk_size: 40,
            chunk_pause_ms: 0,
            page_pause_ms: 0,
        }
    }

    async fn scheduler(
        transport: Arc<MapTransport>,
        config: ScheduleConfig,
    ) -> (Scheduler, Arc<CacheManager>) {
        let cache = Arc::new(CacheManager::new(SourceStores::open_in_memory().await.unwrap()));
        let orchestrator = BatchOrchestrator::new(instant_client(transport, 1), quick_batch());
        (Scheduler::new(orchestrator, Arc::clone(&cache), config), cache)
    }

    fn pages(pages: &[u32]) -> ScheduleConfig {
        ScheduleConfig {
            refresh_pages: pages.to_vec(),
            ..ScheduleConfig::default()
        }
    }

    #[tokio::test]
    async fn test_slow_cycle_page_order() {
        let transport = Arc::new(MapTransport::default());
        let (scheduler, _) = scheduler(Arc::clone(&transport), pages(&[1, 2])).await;

        scheduler.run_slow_cycle().await.unwrap();

        let expected: Vec<String> = [
            (SourceKind::Shojo, 1),
            (SourceKind::ToonGod, 1),
            (SourceKind::Shojo, 2),
            (SourceKind::ToonGod, 2),
            (SourceKind::Manga, 1),
            (SourceKind::Manga, 2),
        ]
        .into_iter()
        .map(|(kind, page)| kind.extractor().listing_url(page))
        .collect();
        assert_eq!(*transport.requests.lock(), expected);
    }

    #[tokio::test]
    async fn test_fast_cycle_touches_fast_source_only() {
        let listing_url = SourceKind::Manga.extractor().listing_url(1);
        let listing = r#"<div class="list-comic-item-wrap"><a href="/manga/a" title="Fresh"></a></div>"#;
        let detail = r#"<ul class="manga-info-text"><li><h1>Fresh</h1></li></ul>"#;
        let transport = Arc::new(MapTransport::new(HashMap::from([
            (listing_url.clone(), listing.to_string()),
            ("https://www.mangakakalot.gg/manga/a".to_string(), detail.to_string()),
        ])));
        let (scheduler, cache) = scheduler(Arc::clone(&transport), pages(&[1])).await;
        let mut updates = cache.subscribe();

        scheduler.run_fast_cycle().await.unwrap();

        assert!(transport
            .requests
            .lock()
            .iter()
            .all(|url| url.contains("mangakakalot")));
        let snapshot = updates.recv().await.unwrap();
        assert_eq!(snapshot.manga.len(), 1);
        assert_eq!(snapshot.manga[0].title, "Fresh");
    }

    #[tokio::test]
    async fn test_failing_ticks_do_not_stop_the_loop() {
        let (scheduler, cache) = scheduler(Arc::new(MapTransport::default()), pages(&[1])).await;
        let manga = cache.stores().get(SourceKind::Manga).clone();
        sqlx::query("DROP TABLE alternatives")
            .execute(manga.pool())
            .await
            .unwrap();

        let scheduler = Arc::new(scheduler);
        let (shutdown_tx, _) = broadcast::channel(1);
        let task = Scheduler::spawn_loop(
            Arc::clone(&scheduler),
            Cycle::Fast,
            Duration::from_millis(20),
            shutdown_tx.subscribe(),
        );
        let mut updates = cache.subscribe();

        // Several ticks fail while the table is missing
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(updates.try_recv().is_err());

        manga.init_schema().await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("loop kept ticking")
            .unwrap();
        assert!(snapshot.manga.is_empty());

        let _ = shutdown_tx.send(());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_both_loops() {
        let (scheduler, _) = scheduler(Arc::new(MapTransport::default()), pages(&[1])).await;
        let handle = scheduler.spawn();
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("loops stop promptly");
    }
}
