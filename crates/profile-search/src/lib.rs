//! Profile search: clean a profile dump, index it, and serve it over HTTP.
//!
//! The cleaning pipeline lives in the `profile-search-data-processing`
//! subcrate (re-exported as [`data_processing`]). This crate loads the
//! cleaned records into a search engine and exposes two searches:
//!
//! - `GET /search?q=...`: one query string across columns, any may match.
//! - `POST /search/advanced`: one value per column, all must match.
//!
//! ```rust,no_run
//! use profile_search::{SearchBackend, ServiceConfig, ingest};
//!
//! # async fn run() -> profile_search::error::Result<()> {
//! let config = ServiceConfig::builder().embedded(None).build()?;
//! let backend = SearchBackend::from_config(&config.engine)?;
//! let cleaned = profile_search::data_processing::clean_profile_file("data/300-user-linkedin.txt")?;
//! ingest(&backend, &cleaned.records, config.engine.bulk_batch_size).await?;
//! # Ok(())
//! # }
//! ```
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
mod ingest;
pub mod query;

pub use config::{BackendKind, EngineConfig, ServerConfig, ServiceConfig, ServiceConfigBuilder};
pub use engine::{SearchBackend, SearchHits};
pub use ingest::{IngestReport, ingest};
pub use profile_search_data_processing as data_processing;
pub use profile_search_data_processing::{ProfileColumn, ProfileRecord};
pub use query::{AdvancedSearch, ProfileQuery, SearchLimits, SimpleSearch};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` applies. Only the first call
/// installs anything, later calls are no-ops.
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::ProfileSearchError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?)
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}
