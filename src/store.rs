//! Per-source SQLite persistence.
//!
//! Each source has its own database file with two tables: `titles`, keyed
//! by the unique canonical title, and `alternatives`, mapping each alternate
//! name to exactly one title. Writes are single-row upserts; there are no
//! multi-statement transactions.
//!
//! # Examples
//!
//! ```rust
//! use hondana::store::Store;
//! use hondana::types::TitleRecord;
//!
//! # async fn example() -> hondana::Result<()> {
//! let store = Store::open_in_memory().await?;
//! let mut record = TitleRecord::new("Ocean King", "https://example.com/manga/ocean-king");
//! record.alternatives = vec!["Sea Monarch".to_string()];
//!
//! let id = store.upsert_title(&record).await?;
//! assert!(id.is_some());
//!
//! let titles = store.get_all_titles_for_search().await?;
//! assert_eq!(titles[0].searchable_names, vec!["Ocean King", "Sea Monarch"]);
//! # Ok(())
//! # }
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::source::SourceKind;
use crate::types::{NOT_AVAILABLE, SearchableTitle, TitleRecord};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS titles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT UNIQUE NOT NULL,
        url TEXT UNIQUE NOT NULL,
        author TEXT,
        updated TEXT,
        cover_image_url TEXT,
        genres TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alternatives (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        alt_title TEXT UNIQUE NOT NULL,
        title_id INTEGER NOT NULL,
        FOREIGN KEY (title_id) REFERENCES titles (id)
    )
    "#,
];

#[derive(Debug, FromRow)]
struct TitleRow {
    id: i64,
    title: String,
    url: String,
    author: Option<String>,
    updated: Option<String>,
    cover_image_url: Option<String>,
    genres: Option<String>,
}

/// SQLite store for one source
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) a database file in WAL mode and
    /// initialises the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Opens a private in-memory database.
    ///
    /// The pool keeps a single connection alive for its whole lifetime;
    /// every new in-memory connection would otherwise be an empty database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Creates the tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Underlying pool, for ad-hoc queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts or updates a record keyed by its title, then attaches any
    /// new alternate names to it.
    ///
    /// Alternate names already owned by any title are left untouched. When
    /// the title's id cannot be read back after the write, the anomaly is
    /// logged and `Ok(None)` is returned without writing alternates.
    ///
    /// # Errors
    ///
    /// * [`Error::Database`] - the write itself failed, e.g. the URL is
    ///   already used by a different title
    pub async fn upsert_title(&self, record: &TitleRecord) -> Result<Option<i64>> {
        let genres = serde_json::to_string(&record.genres)?;

        sqlx::query(
            r#"
            INSERT INTO titles (title, url, author, updated, cover_image_url, genres)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO UPDATE SET
                url = excluded.url,
                author = excluded.author,
                updated = excluded.updated,
                cover_image_url = excluded.cover_image_url,
                genres = excluded.genres
            "#,
        )
        .bind(&record.title)
        .bind(&record.url)
        .bind(&record.author)
        .bind(&record.updated)
        .bind(&record.cover_image_url)
        .bind(&genres)
        .execute(&self.pool)
        .await?;

        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE title = ?")
            .bind(&record.title)
            .fetch_optional(&self.pool)
            .await?;

        let Some(id) = id else {
            let anomaly = Error::PersistenceAnomaly {
                title: record.title.clone(),
            };
            warn!(url = %record.url, "{}", anomaly);
            return Ok(None);
        };

        for alternative in record.alternatives.iter().map(|a| a.trim()) {
            if alternative.is_empty() {
                continue;
            }
            sqlx::query(
                "INSERT INTO alternatives (alt_title, title_id) VALUES (?, ?) \
                 ON CONFLICT(alt_title) DO NOTHING",
            )
            .bind(alternative)
            .bind(id)
            .execute(&self.pool)
            .await?;
        }

        debug!(title = %record.title, id, "Upserted title");
        Ok(Some(id))
    }

    /// Every stored title projected for search, ordered by id.
    ///
    /// Genres that are missing or not a JSON array of strings read as empty;
    /// a missing cover reads as `"N/A"`.
    pub async fn get_all_titles_for_search(&self) -> Result<Vec<SearchableTitle>> {
        let rows: Vec<TitleRow> = sqlx::query_as(
            "SELECT id, title, url, author, updated, cover_image_url, genres \
             FROM titles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let alternative_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT alt_title, title_id FROM alternatives ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut alternatives: HashMap<i64, Vec<String>> = HashMap::new();
        for (alt_title, title_id) in alternative_rows {
            alternatives.entry(title_id).or_default().push(alt_title);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let genres = parse_genres(row.id, row.genres.as_deref());
                let searchable_names = std::iter::once(row.title.clone())
                    .chain(alternatives.remove(&row.id).unwrap_or_default())
                    .filter(|name| !name.trim().is_empty())
                    .collect();

                SearchableTitle {
                    id: row.id,
                    title: row.title,
                    url: row.url,
                    author: row.author,
                    updated: row.updated,
                    cover_image_url: Some(
                        row.cover_image_url
                            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    ),
                    genres,
                    searchable_names,
                }
            })
            .collect())
    }

    /// Alternate names attached to a title, in insertion order.
    pub async fn alternatives_for(&self, title_id: i64) -> Result<Vec<String>> {
        let names = sqlx::query_scalar(
            "SELECT alt_title FROM alternatives WHERE title_id = ? ORDER BY id",
        )
        .bind(title_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    pub async fn title_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM titles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// One [`Store`] per source
#[derive(Debug, Clone)]
pub struct SourceStores {
    shojo: Store,
    toongod: Store,
    manga: Store,
}

impl SourceStores {
    pub fn new(shojo: Store, toongod: Store, manga: Store) -> Self {
        Self {
            shojo,
            toongod,
            manga,
        }
    }

    /// Opens every source database named in the configuration.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(
            Store::open(config.path_for(SourceKind::Shojo)).await?,
            Store::open(config.path_for(SourceKind::ToonGod)).await?,
            Store::open(config.path_for(SourceKind::Manga)).await?,
        ))
    }

    /// Three independent in-memory databases.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(
            Store::open_in_memory().await?,
            Store::open_in_memory().await?,
            Store::open_in_memory().await?,
        ))
    }

    pub fn get(&self, kind: SourceKind) -> &Store {
        match kind {
            SourceKind::Shojo => &self.shojo,
            SourceKind::ToonGod => &self.toongod,
            SourceKind::Manga => &self.manga,
        }
    }
}

fn parse_genres(id: i64, raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        debug!(id, error = %e, "Unreadable genres column");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, url: &str, alternatives: &[&str]) -> TitleRecord {
        let mut record = TitleRecord::new(title, url);
        record.alternatives = alternatives.iter().map(|a| a.to_string()).collect();
        record
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_overwrites_columns() {
        let store = Store::open_in_memory().await.unwrap();

        let mut first = record("Ocean King", "https://a.test/ocean", &["Sea Monarch"]);
        first.genres = vec!["Action".into()];
        let id = store.upsert_title(&first).await.unwrap().unwrap();

        let mut second = first.clone();
        second.url = "https://a.test/ocean-king".into();
        second.author = "Han Ji".into();
        second.genres = vec!["Action".into(), "Fantasy".into()];
        let again = store.upsert_title(&second).await.unwrap().unwrap();

        assert_eq!(id, again);
        assert_eq!(store.title_count().await.unwrap(), 1);

        let titles = store.get_all_titles_for_search().await.unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].url, "https://a.test/ocean-king");
        assert_eq!(titles[0].author.as_deref(), Some("Han Ji"));
        assert_eq!(titles[0].genres, vec!["Action", "Fantasy"]);
        assert_eq!(titles[0].searchable_names, vec!["Ocean King", "Sea Monarch"]);
    }

    #[tokio::test]
    async fn test_alternate_name_belongs_to_first_owner() {
        let store = Store::open_in_memory().await.unwrap();

        let first = store
            .upsert_title(&record("Ocean King", "https://a.test/1", &["Sea Monarch", " "]))
            .await
            .unwrap()
            .unwrap();
        let second = store
            .upsert_title(&record("Tide Lord", "https://a.test/2", &["Sea Monarch", "Wave"]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.alternatives_for(first).await.unwrap(), vec!["Sea Monarch"]);
        assert_eq!(store.alternatives_for(second).await.unwrap(), vec!["Wave"]);
    }

    #[tokio::test]
    async fn test_malformed_genres_read_as_empty() {
        let store = Store::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO titles (title, url, author, updated, cover_image_url, genres) \
             VALUES ('Broken', 'https://a.test/b', NULL, NULL, NULL, '{not json')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let titles = store.get_all_titles_for_search().await.unwrap();
        assert_eq!(titles.len(), 1);
        assert!(titles[0].genres.is_empty());
        assert_eq!(titles[0].author, None);
        assert_eq!(titles[0].cover_image_url.as_deref(), Some(NOT_AVAILABLE));
    }

    #[tokio::test]
    async fn test_url_owned_by_another_title_is_an_error() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .upsert_title(&record("Ocean King", "https://a.test/same", &[]))
            .await
            .unwrap();

        let result = store
            .upsert_title(&record("Other", "https://a.test/same", &[]))
            .await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_unreadable_id_skips_alternates() {
        let store = Store::open_in_memory().await.unwrap();
        sqlx::query(
            "CREATE TRIGGER vanish AFTER INSERT ON titles \
             BEGIN DELETE FROM titles WHERE id = NEW.id; END",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let id = store
            .upsert_title(&record("Ocean King", "https://a.test/1", &["Sea Monarch"]))
            .await
            .unwrap();
        assert_eq!(id, None);

        let alternates: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alternatives")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(alternates, 0);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shojo.db");

        {
            let store = Store::open(&path).await.unwrap();
            store
                .upsert_title(&record("Ocean King", "https://a.test/1", &[]))
                .await
                .unwrap();
            store.pool().close().await;
        }

        let reopened = Store::open(&path).await.unwrap();
        assert_eq!(reopened.title_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_source_stores_are_isolated() {
        let stores = SourceStores::open_in_memory().await.unwrap();
        stores
            .get(SourceKind::Shojo)
            .upsert_title(&record("Ocean King", "https://a.test/1", &[]))
            .await
            .unwrap();

        assert_eq!(stores.get(SourceKind::Shojo).title_count().await.unwrap(), 1);
        assert_eq!(stores.get(SourceKind::Manga).title_count().await.unwrap(), 0);
    }
}
