//! Error types and result handling for Hondana operations.
//!
//! All fallible operations return [`Result<T>`], an alias over [`enum@Error`].
//!
//! # Error Categories
//!
//! - **Fetch Errors**: a URL that could not be retrieved after every retry
//! - **Parse Errors**: a document that lacks the fields a source needs
//! - **Persistence Anomalies**: a write that cannot be read back
//! - **Scheduled Cycle Errors**: anything escaping a refresh tick
//! - **Database, JSON, IO, Config**: wrapped lower-level failures
//!
//! Per-item fetch and parse failures never escape a batch; they are recorded
//! in an [`ErrorLedger`](crate::batch::ErrorLedger) instead.
//!
//! # Examples
//!
//! ```rust
//! use hondana::Error;
//!
//! let err = Error::parse("https://example.com/manga/1", "missing info table");
//! assert!(err.to_string().contains("missing info table"));
//! ```

use thiserror::Error;

/// Type alias for Results with Hondana errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Hondana operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure from the HTTP client (connect, timeout, TLS).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The origin answered with a non-success status code.
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// A URL could not be fetched after every attempt was exhausted.
    ///
    /// `cause` is the error from the final attempt.
    #[error("Fetch failed for {url}: {cause}")]
    Fetch {
        url: String,
        #[source]
        cause: Box<Error>,
    },

    /// A fetched document could not be turned into a record.
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    /// A title was written but its id could not be read back.
    ///
    /// The core columns are considered saved; only the alternate names of
    /// the record are skipped.
    #[error("Could not retrieve id for title '{title}' after upsert")]
    PersistenceAnomaly { title: String },

    /// SQLite errors from the store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An error that escaped a scheduled refresh tick.
    #[error("Scheduled {cycle} cycle failed: {cause}")]
    ScheduledCycle {
        cycle: &'static str,
        #[source]
        cause: Box<Error>,
    },

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a parse error for the given document URL.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::parse("https://example.com/a", "no title element");
    /// ```
    pub fn parse(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Parse {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wraps the last attempt's error into a terminal fetch failure.
    pub fn fetch(url: impl Into<String>, cause: Error) -> Self {
        Error::Fetch {
            url: url.into(),
            cause: Box::new(cause),
        }
    }

    /// Wraps an error that escaped a scheduled cycle.
    pub fn scheduled(cycle: &'static str, cause: Error) -> Self {
        Error::ScheduledCycle {
            cycle,
            cause: Box::new(cause),
        }
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_keeps_last_cause() {
        let err = Error::fetch("https://a.test/x", Error::Status { status: 503 });
        let text = err.to_string();
        assert!(text.contains("https://a.test/x"));
        assert!(text.contains("503"));
    }

    #[test]
    fn scheduled_cycle_names_the_cycle() {
        let err = Error::scheduled("slow", Error::Other("boom".into()));
        let text = err.to_string();
        assert!(text.contains("slow"));
        assert!(text.contains("boom"));
    }
}
