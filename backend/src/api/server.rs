//! HTTP server for the sales dashboard.
//!
//! # API Endpoints
//!
//! | Method | Path                 | Description                                 |
//! |--------|----------------------|---------------------------------------------|
//! | GET    | `/health`            | Health check                                |
//! | POST   | `/api/upload`        | Upload CSV, get KPIs, sales matrix, trend   |
//! | DELETE | `/api/cache/{hash}`  | Forget cached results for one upload        |
//! | DELETE | `/api/cache`         | Forget everything                           |
//! | GET    | `/api/logs`          | SSE stream for real-time logs               |
//!
//! Upload form fields: `file` (required), `product` (repeatable), `window`,
//! `lenient` (`true`/`1`/`on`).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{delete, get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, log_warning, Stage, LOG_BROADCASTER};
use super::types::{error_response, AnalysisResponse};
use crate::cache::{AnalysisCache, ContentHash, DatasetKey, ReportKey};
use crate::config::Settings;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::normalizer::ColumnMapping;
use crate::transform::pipeline::{analyze_set, load_bytes, resolve_filter, AnalysisOptions};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<Mutex<AnalysisCache>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let cache = AnalysisCache::with_capacity(settings.cache_capacity);
        Self {
            settings: Arc::new(settings),
            cache: Arc::new(Mutex::new(cache)),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    // multipart framing needs some room above the file itself
    let body_limit = state.settings.max_upload_bytes.saturating_add(64 * 1024);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_csv))
        .route("/api/cache", delete(clear_cache))
        .route("/api/cache/{hash}", delete(invalidate_cache))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> ServerResult<()> {
    let port = settings.port;
    let app = router(AppState::new(settings));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Retail insights server running on http://localhost:{}", port);
    println!("   POST   /api/upload        - Upload CSV file");
    println!("   DELETE /api/cache/{{hash}} - Invalidate cached results");
    println!("   GET    /api/logs          - SSE log stream");
    println!("   GET    /health            - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    let cache = state.cache.lock().await;
    let stats = cache.stats();
    Json(json!({
        "status": "ok",
        "service": "retail-insights",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "uploads": cache.uploads(),
            "hits": stats.hits,
            "misses": stats.misses
        },
        "endpoints": {
            "upload": "POST /api/upload",
            "invalidate": "DELETE /api/cache/{hash}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers just skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn invalidate_cache(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let content = ContentHash::parse(&hash)
        .ok_or_else(|| reject(ServerError::BadRequest(format!("Not a SHA-256 hash: {}", hash))))?;

    let removed = state.cache.lock().await.invalidate(&content);
    log_info(Stage::Cache, format!("Invalidated {} ({} entries)", content, removed));

    Ok(Json(json!({ "contentHash": content.as_str(), "removed": removed })))
}

async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.cache.lock().await.clear();
    log_info(Stage::Cache, "Cache cleared");
    Json(json!({ "cleared": true }))
}

/// Form fields of an upload
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    products: Vec<String>,
    window: Option<usize>,
    lenient: bool,
}

async fn read_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            form.file_name = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            form.bytes = Some(data.to_vec());
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        match name.as_str() {
            "product" => {
                let product = text.trim();
                if !product.is_empty() {
                    form.products.push(product.to_string());
                }
            }
            "window" => form.window = Some(parse_window(&text)?),
            "lenient" => form.lenient = parse_flag(&text),
            _ => {}
        }
    }

    Ok(form)
}

fn parse_window(text: &str) -> ServerResult<usize> {
    match text.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ServerError::BadRequest(format!(
            "window must be a positive integer, got '{}'",
            text.trim()
        ))),
        Ok(n) => Ok(n),
    }
}

fn parse_flag(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

/// Upload CSV endpoint
async fn upload_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    analyze_upload(&state, multipart).await.map(Json).map_err(reject)
}

async fn analyze_upload(state: &AppState, multipart: Multipart) -> ServerResult<AnalysisResponse> {
    let form = read_form(multipart).await?;
    let bytes = form
        .bytes
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    let limit = state.settings.max_upload_bytes;
    if bytes.len() > limit {
        return Err(ServerError::PayloadTooLarge { size: bytes.len(), limit });
    }

    log_info(
        Stage::Server,
        format!(
            "New upload: {} ({} bytes)",
            form.file_name.as_deref().unwrap_or("unknown"),
            bytes.len()
        ),
    );

    let options = AnalysisOptions {
        columns: ColumnMapping {
            date: state.settings.date_column.clone(),
            ..ColumnMapping::default()
        },
        products: (!form.products.is_empty()).then_some(form.products),
        trend_window: form.window.unwrap_or(state.settings.trend_window),
        lenient: form.lenient,
        ..AnalysisOptions::default()
    };

    let dataset_key = DatasetKey {
        content: ContentHash::of(&bytes),
        columns: options.columns.clone(),
        delimiter: options.delimiter,
        lenient: options.lenient,
    };

    let cached_dataset = state.cache.lock().await.dataset(&dataset_key);
    let dataset = match cached_dataset {
        Some(dataset) => {
            log_success(Stage::Cache, format!("Dataset {} reused", dataset_key.content));
            dataset
        }
        None => {
            let load_options = options.clone();
            let loaded = tokio::task::spawn_blocking(move || load_bytes(&bytes, &load_options))
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))??;
            state.cache.lock().await.insert_dataset(dataset_key.clone(), loaded)
        }
    };

    let report_key = ReportKey {
        filter: resolve_filter(&dataset.set, &options),
        trend_window: options.trend_window,
        dataset: dataset_key,
    };

    let cached_report = state.cache.lock().await.report(&report_key);
    let (report, cached) = match cached_report {
        Some(report) => {
            log_success(Stage::Cache, "Report served from cache");
            (report, true)
        }
        None => {
            let set_owner = Arc::clone(&dataset);
            let filter = report_key.filter.clone();
            let window = report_key.trend_window;
            let report = tokio::task::spawn_blocking(move || analyze_set(&set_owner.set, &filter, window))
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))??;
            let report = state.cache.lock().await.insert_report(report_key.clone(), report);
            (report, false)
        }
    };

    Ok(AnalysisResponse::new(
        &report_key.dataset.content,
        &dataset,
        &report,
        cached,
    ))
}

fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ServerError::Pipeline(PipelineError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Internal(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ServerError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        log_error(Stage::Server, format!("{} {}", status.as_u16(), err));
    } else {
        log_warning(Stage::Server, format!("{} {}", status.as_u16(), err));
    }
    (status, Json(error_response(&err.to_string())))
}
