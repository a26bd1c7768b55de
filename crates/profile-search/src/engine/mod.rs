//! Search engine adapters.
//!
//! [`SearchBackend`] wraps either a remote Elasticsearch cluster or a local
//! tantivy index behind the same surface: recreate the index, load documents,
//! refresh, and run a [`ProfileQuery`].

mod elasticsearch;
mod embedded;

pub use elasticsearch::ElasticsearchEngine;
pub use embedded::EmbeddedEngine;
pub use error::EngineError;
use error::Result;

use profile_search_data_processing::ProfileRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::{BackendKind, EngineConfig};
use crate::query::ProfileQuery;

/// Hits returned by a search: total matches plus the returned documents.
///
/// Each document is the indexed profile, with an extra `_highlight` object
/// when the engine produced highlight fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchHits {
    pub total: u64,
    pub results: Vec<Map<String, Value>>,
}

/// Outcome of sending one batch of documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub indexed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub enum SearchBackend {
    Elasticsearch(ElasticsearchEngine),
    Embedded(EmbeddedEngine),
}

impl SearchBackend {
    /// Connect to (or open) the backend selected in the config.
    #[instrument(name = "Open search backend", skip_all, fields(backend = %config.backend))]
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(match config.backend {
            BackendKind::Elasticsearch => Self::Elasticsearch(ElasticsearchEngine::new(config)?),
            BackendKind::Embedded => Self::Embedded(match &config.index_dir {
                Some(dir) => EmbeddedEngine::open_in_dir(dir)?,
                None => EmbeddedEngine::in_memory()?,
            }),
        })
    }

    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Elasticsearch(_) => BackendKind::Elasticsearch,
            Self::Embedded(_) => BackendKind::Embedded,
        }
    }

    /// Drop every indexed document and start from an empty index.
    pub async fn recreate_index(&self) -> Result<()> {
        match self {
            Self::Elasticsearch(engine) => engine.recreate_index().await,
            Self::Embedded(engine) => engine.recreate_index(),
        }
    }

    pub async fn index_documents(&self, records: &[ProfileRecord]) -> Result<BulkOutcome> {
        match self {
            Self::Elasticsearch(engine) => engine.index_documents(records).await,
            Self::Embedded(engine) => engine.index_documents(records),
        }
    }

    /// Make everything indexed so far visible to searches.
    pub async fn refresh(&self) -> Result<()> {
        match self {
            Self::Elasticsearch(engine) => engine.refresh().await,
            Self::Embedded(engine) => engine.refresh(),
        }
    }

    pub async fn search(&self, query: &ProfileQuery) -> Result<SearchHits> {
        if query.matches_nothing() {
            debug!("Advanced search without fields, returning no hits");
            return Ok(SearchHits::default());
        }
        match self {
            Self::Elasticsearch(engine) => engine.search(query).await,
            Self::Embedded(engine) => {
                let engine = engine.clone();
                let query = query.clone();
                tokio::task::spawn_blocking(move || engine.search(&query)).await?
            }
        }
    }

    pub async fn health(&self) -> Result<()> {
        match self {
            Self::Elasticsearch(engine) => engine.health().await,
            Self::Embedded(engine) => engine.health(),
        }
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum EngineError {
        #[error("Search engine unavailable: {0}")]
        Unavailable(String),
        #[error("Search engine returned {status}: {body}")]
        Status { status: u16, body: String },
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Unexpected engine response: {0}")]
        UnexpectedResponse(String),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("Tantivy directory error: {0}")]
        Directory(#[from] tantivy::directory::error::OpenDirectoryError),
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Serialization error: {0}")]
        Json(#[from] serde_json::Error),
        #[error("Search task failed: {0}")]
        Join(#[from] tokio::task::JoinError),
    }

    impl EngineError {
        /// Connection refused, DNS failure or timeout.
        pub fn from_transport(error: reqwest::Error) -> Self {
            if error.is_connect() || error.is_timeout() {
                Self::Unavailable(error.to_string())
            } else {
                Self::Http(error)
            }
        }
    }

    pub type Result<T> = std::result::Result<T, EngineError>;
}
