//! Hondana daemon and maintenance commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hondana::prelude::*;
use hondana::search::SLUG_FUZZY_THRESHOLD;

#[derive(Parser)]
#[command(name = "hondana")]
#[command(about = "Catalog acquisition and search cache for manga sites", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the caches and keep them fresh until interrupted
    Run {
        /// Crawl every source in full before the first load
        #[arg(long)]
        crawl: bool,
    },

    /// Crawl every listing page of one source, or of all sources
    Crawl {
        /// Source tag: shojo, toongod or manga
        source: Option<SourceKind>,
    },

    /// Search the stored catalog
    Search {
        query: String,
        /// Restrict to one source
        #[arg(long)]
        source: Option<SourceKind>,
        /// Keep only titles with this genre
        #[arg(long)]
        genre: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Resolve a detail-page slug to a single title
    Slug { slug: String },
}

fn init_logging() {
    let json = std::env::var("HONDANA_LOG_JSON").is_ok_and(|v| v == "1");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hondana=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = run(Cli::parse()).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => Config::default(),
    };

    let stores = SourceStores::open(&config.database)
        .await
        .context("Failed to open source databases")?;
    info!("Databases initialized");

    match cli.command {
        Commands::Run { crawl } => {
            let orchestrator = orchestrator(&config)?;
            if crawl {
                crawl_sources(&orchestrator, &stores, &SourceKind::ALL).await;
            }
            serve(config, stores, orchestrator).await
        }
        Commands::Crawl { source } => {
            let kinds = source.map_or_else(|| SourceKind::ALL.to_vec(), |kind| vec![kind]);
            crawl_sources(&orchestrator(&config)?, &stores, &kinds).await;
            Ok(())
        }
        Commands::Search {
            query,
            source,
            genre,
            limit,
        } => {
            let cache = CacheManager::new(stores);
            cache.load_all().await.context("Failed to load caches")?;
            let snapshot = cache.get_caches();

            let mut hits: Vec<(SourceKind, SearchHit)> = snapshot
                .iter()
                .filter(|(kind, _)| source.is_none_or(|s| s == *kind))
                .flat_map(|(kind, titles)| {
                    let mut builder =
                        SearchBuilder::new(titles, query.as_str()).threshold(config.search.threshold);
                    if let Some(genre) = &genre {
                        builder = builder.genre(genre.as_str());
                    }
                    builder.run().into_iter().map(move |hit| (kind, hit))
                })
                .collect();
            hits.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
            hits.truncate(limit);

            for (kind, hit) in hits {
                println!(
                    "{}",
                    serde_json::json!({ "source": kind, "score": hit.score, "matched": hit.matched_name, "title": hit.title })
                );
            }
            Ok(())
        }
        Commands::Slug { slug } => {
            let cache = CacheManager::new(stores);
            cache.load_all().await.context("Failed to load caches")?;

            match find_by_slug(&slug, &cache.get_caches(), SLUG_FUZZY_THRESHOLD) {
                Some((kind, hit)) => println!(
                    "{}",
                    serde_json::json!({ "source": kind, "score": hit.score, "title": hit.title })
                ),
                None => warn!(slug = %slug, "No title found"),
            }
            Ok(())
        }
    }
}

fn orchestrator(config: &Config) -> Result<BatchOrchestrator> {
    let client = HttpClient::new(&config.fetch).context("Failed to build HTTP client")?;
    Ok(BatchOrchestrator::new(client, config.batch.clone()))
}

async fn crawl_sources(orchestrator: &BatchOrchestrator, stores: &SourceStores, kinds: &[SourceKind]) {
    for &kind in kinds {
        let ledger = orchestrator.crawl_all(kind, stores.get(kind)).await;
        info!(
            source = kind.tag(),
            saved = ledger.saved(),
            failed = ledger.len(),
            "Full crawl finished"
        );
        for failure in ledger.failures() {
            warn!(source = kind.tag(), url = %failure.url, kind = %failure.kind, "Not ingested: {}", failure.reason);
        }
    }
}

async fn serve(config: Config, stores: SourceStores, orchestrator: BatchOrchestrator) -> Result<()> {
    let cache = Arc::new(CacheManager::new(stores));
    cache.load_all().await.context("Failed to load caches")?;
    info!(titles = cache.get_caches().total(), "Caches loaded");

    let handle = Scheduler::new(orchestrator, Arc::clone(&cache), config.schedule).spawn();

    info!("Press Ctrl+C to stop");
    signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    handle.shutdown().await;
    info!("Stopped");
    Ok(())
}
