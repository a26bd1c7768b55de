//! HTTP surface: `/search`, `/search/advanced` and `/health`.

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{App, HttpResponse, HttpServer, ResponseError, web};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::ServiceConfig;
use crate::engine::{EngineError, SearchBackend};
use crate::query::{AdvancedSearch, QueryError, SearchLimits, SimpleSearch};

/// Shared, read-only state of every worker.
#[derive(Debug)]
pub struct AppState {
    pub backend: SearchBackend,
    pub limits: SearchLimits,
}

impl AppState {
    pub const fn new(backend: SearchBackend, limits: SearchLimits) -> Self {
        Self { backend, limits }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine(EngineError::Status { status, .. }) if *status >= 500 => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Engine(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(%status, error = %self, "Search failed");
        } else {
            warn!(%status, error = %self, "Rejected request");
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

/// Query string of `GET /search`.
///
/// `columns` may be repeated (`columns=full_name&columns=skills`) and each
/// value may itself be a comma separated list. Unknown keys are ignored.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub q: Option<String>,
    /// Comma separated column names
    pub columns: Option<String>,
    pub size: Option<usize>,
}

impl SearchParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut params = Self::default();
        let mut columns = Vec::new();
        for (key, value) in pairs {
            match key.as_str() {
                "q" => params.q = Some(value),
                "columns" => columns.push(value),
                "size" => {
                    let size = value
                        .trim()
                        .parse()
                        .map_err(|_| ApiError::BadRequest(format!("invalid size '{value}'")))?;
                    params.size = Some(size);
                }
                _ => {}
            }
        }
        if !columns.is_empty() {
            params.columns = Some(columns.join(","));
        }
        Ok(params)
    }
}

#[derive(Debug, Deserialize)]
pub struct SizeParams {
    pub size: Option<usize>,
}

#[instrument(name = "GET /search", skip_all, level = "info")]
async fn search(
    state: web::Data<AppState>,
    pairs: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse, ApiError> {
    let params = SearchParams::from_pairs(pairs.into_inner())?;
    let search = SimpleSearch::new(
        params.q.as_deref(),
        params.columns.as_deref(),
        params.size,
        &state.limits,
    )?;
    let hits = state.backend.search(&search.into()).await?;
    info!(
        q = params.q.as_deref().unwrap_or_default(),
        total = hits.total,
        returned = hits.results.len(),
        "Simple search served"
    );
    Ok(HttpResponse::Ok().json(hits))
}

#[instrument(name = "POST /search/advanced", skip_all, level = "info")]
async fn search_advanced(
    state: web::Data<AppState>,
    params: web::Query<SizeParams>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let search = AdvancedSearch::from_json(&body, params.size, &state.limits)?;
    let hits = state.backend.search(&search.into()).await?;
    info!(total = hits.total, returned = hits.results.len(), "Advanced search served");
    Ok(HttpResponse::Ok().json(hits))
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let backend = state.backend.kind();
    match state.backend.health().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok", "backend": backend })),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
                "backend": backend,
                "error": e.to_string(),
            }))
        }
    }
}

/// The application with routes, extractor error handlers and middleware.
///
/// Any origin may call the API. Trailing slashes are trimmed before routing,
/// so `/search/` and `/search` are the same endpoint.
pub fn app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let cors = Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    App::new()
        .app_data(state)
        .app_data(
            web::QueryConfig::default()
                .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
        )
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
        )
        .wrap(Logger::default())
        .wrap(cors)
        .wrap(NormalizePath::trim())
        .route("/search", web::get().to(search))
        .route("/search/advanced", web::post().to(search_advanced))
        .route("/health", web::get().to(health))
}

/// Serve the API until the server is stopped.
pub async fn serve(config: &ServiceConfig, backend: SearchBackend) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(backend, config.server.limits));
    info!(
        bind = %config.server.bind,
        backend = %state.backend.kind(),
        index = %config.engine.index,
        "Starting HTTP server"
    );
    HttpServer::new(move || app(state.clone()))
        .bind(config.server.bind.as_str())?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(QueryError::MissingQuery).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EngineError::Unavailable("refused".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(EngineError::Status { status: 503, body: String::new() }).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(EngineError::Status { status: 500, body: String::new() }).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(EngineError::Status { status: 404, body: String::new() }).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(EngineError::UnexpectedResponse("?".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_search_params_merge_repeated_columns() {
        let params = SearchParams::from_pairs(pairs(&[
            ("columns", "full_name"),
            ("q", "Python"),
            ("columns", "skills,summary"),
            ("size", "5"),
            ("page", "2"),
        ]))
        .unwrap();
        assert_eq!(
            params,
            SearchParams {
                q: Some("Python".into()),
                columns: Some("full_name,skills,summary".into()),
                size: Some(5),
            }
        );

        assert_eq!(SearchParams::from_pairs(vec![]).unwrap(), SearchParams::default());
        assert!(matches!(
            SearchParams::from_pairs(pairs(&[("size", "abc")])),
            Err(ApiError::BadRequest(_))
        ));
    }
}
