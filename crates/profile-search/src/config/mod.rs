use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::ProfileSearchError;
use crate::query::SearchLimits;

pub const DEFAULT_ELASTICSEARCH_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX_NAME: &str = "linkedin_profiles";
pub const DEFAULT_BIND: &str = "127.0.0.1:8021";
pub const DEFAULT_BULK_BATCH_SIZE: usize = 500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which search engine serves the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// A remote Elasticsearch cluster
    #[default]
    Elasticsearch,
    /// A local tantivy index
    Embedded,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Elasticsearch => "elasticsearch",
            Self::Embedded => "embedded",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub backend: BackendKind,
    /// Elasticsearch base URL
    pub url: String,
    pub index: String,
    /// Embedded index directory; `None` keeps the index in memory.
    pub index_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub bulk_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            url: DEFAULT_ELASTICSEARCH_URL.to_string(),
            index: DEFAULT_INDEX_NAME.to_string(),
            index_dir: Some(profile_search_data_processing::get_data_dir().join("index")),
            timeout: DEFAULT_TIMEOUT,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to listen on
    pub bind: String,
    pub limits: SearchLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            limits: SearchLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }
}

/// Builder for the service configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Search a local tantivy index, on disk or in memory
    pub fn embedded(mut self, index_dir: Option<PathBuf>) -> Self {
        self.config.engine.backend = BackendKind::Embedded;
        self.config.engine.index_dir = index_dir;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.engine.backend = backend;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.engine.url = url.into();
        self
    }

    pub fn index_dir(mut self, index_dir: Option<PathBuf>) -> Self {
        self.config.engine.index_dir = index_dir;
        self
    }

    pub fn index_name(mut self, index: impl Into<String>) -> Self {
        self.config.engine.index = index.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.engine.timeout = timeout;
        self
    }

    pub fn bulk_batch_size(mut self, size: usize) -> Self {
        self.config.engine.bulk_batch_size = size;
        self
    }

    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self
    }

    /// Result size used when a request does not ask for one
    pub fn default_size(mut self, size: usize) -> Self {
        self.config.server.limits.default_size = size;
        self
    }

    pub fn max_size(mut self, size: usize) -> Self {
        self.config.server.limits.max_size = size;
        self
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<ServiceConfig, ProfileSearchError> {
        let config = self.config;
        let limits = config.server.limits;
        if limits.max_size == 0 || limits.default_size == 0 || limits.default_size > limits.max_size {
            return Err(ProfileSearchError::ConfigError(format!(
                "default size {} must be between 1 and max size {}",
                limits.default_size, limits.max_size
            )));
        }
        if config.engine.bulk_batch_size == 0 {
            return Err(ProfileSearchError::ConfigError(
                "bulk batch size must be greater than zero".to_string(),
            ));
        }
        if config.engine.index.trim().is_empty() {
            return Err(ProfileSearchError::ConfigError(
                "index name may not be empty".to_string(),
            ));
        }
        if config.engine.backend == BackendKind::Elasticsearch
            && !(config.engine.url.starts_with("http://") || config.engine.url.starts_with("https://"))
        {
            return Err(ProfileSearchError::ConfigError(format!(
                "Elasticsearch URL must start with http:// or https://, got '{}'",
                config.engine.url
            )));
        }
        Ok(config)
    }
}
