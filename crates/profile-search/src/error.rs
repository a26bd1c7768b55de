use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileSearchError {
    #[error("Engine error: {0}")]
    Engine(#[from] crate::engine::EngineError),
    #[error("Query error: {0}")]
    Query(#[from] crate::query::QueryError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] profile_search_data_processing::DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ProfileSearchError>;
