use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
pub mod fetch;
pub mod transform;

use crate::cache::{derive_key, Cache, CacheKeyParams, DiskCache};
use crate::config::{ImageFormat, OptimgConfig, DEFAULT_CACHE_CONTROL};
use crate::fetch::Fetcher;
use crate::transform::transcode;

#[derive(Error, Debug)]
pub enum OptimgError {
    #[error("Invalid argument: {0}")]
    Validation(String),
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Cache error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, OptimgError>;

impl IntoResponse for OptimgError {
    fn into_response(self) -> Response {
        // Each failure kind maps to exactly one boundary status. Bad input,
        // unreachable sources, and undecodable bytes are the client's
        // problem; encoder and cache failures are ours.
        let status = match self {
            OptimgError::Validation(_) | OptimgError::Fetch(_) | OptimgError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            OptimgError::Encode(_) | OptimgError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Query parameters for the optimize endpoint
#[derive(Debug, Deserialize)]
pub struct OptimizeQuery {
    pub url: String,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default, alias = "format")]
    pub fmt: Option<ImageFormat>,
}

/// Shared per-service state: validated config plus the long-lived cache and
/// HTTP client.
pub struct AppState {
    pub config: OptimgConfig,
    pub cache: DiskCache,
    pub fetcher: Fetcher,
}

#[derive(Debug)]
struct ResolvedParams {
    url: String,
    max_width: u32,
    quality: u8,
    format: ImageFormat,
}

/// Validate query parameters and fill in defaults, before any I/O happens.
fn resolve_params(config: &OptimgConfig, query: OptimizeQuery) -> Result<ResolvedParams> {
    if query.url.trim().is_empty() {
        return Err(OptimgError::Validation("url must not be empty".into()));
    }

    let max_width = query.max_width.unwrap_or(config.default_max_width);
    if max_width == 0 {
        return Err(OptimgError::Validation("max_width must be >= 1".into()));
    }

    let quality = query.quality.unwrap_or(config.default_quality);
    if quality == 0 || quality > 100 {
        return Err(OptimgError::Validation("quality must be in 1..=100".into()));
    }

    let format = query.fmt.unwrap_or(config.default_format);

    Ok(ResolvedParams { url: query.url, max_width, quality, format })
}

fn image_response(data: Vec<u8>, format: ImageFormat) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static(DEFAULT_CACHE_CONTROL));
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    (headers, Body::from(data)).into_response()
}

async fn optimize_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OptimizeQuery>,
) -> Response {
    tracing::debug!(
        "Processing image request: url={}, max_width={:?}, quality={:?}, fmt={:?}",
        query.url, query.max_width, query.quality, query.fmt
    );

    let params = match resolve_params(&state.config, query) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    let key = derive_key(&CacheKeyParams {
        url: &params.url,
        max_width: params.max_width,
        quality: params.quality,
        format: params.format,
    });

    match state.cache.lookup(&key, params.format).await {
        Ok(Some(data)) => {
            tracing::info!("Cache hit for key={}", key);
            METRICS.cache_hits.fetch_add(1, Ordering::Relaxed);
            return image_response(data, params.format);
        }
        Ok(None) => {}
        // A broken cache read degrades to a miss rather than failing the
        // request.
        Err(e) => tracing::warn!("Cache lookup failed for key={}: {}", key, e),
    }

    tracing::info!("Cache miss for key={}, fetching from {}", key, params.url);
    METRICS.cache_misses.fetch_add(1, Ordering::Relaxed);

    let raw = match state.fetcher.fetch(&params.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to fetch {}: {}", params.url, e);
            METRICS.errors.fetch_add(1, Ordering::Relaxed);
            return e.into_response();
        }
    };

    METRICS.transforms.fetch_add(1, Ordering::Relaxed);
    let (max_width, quality, format) = (params.max_width, params.quality, params.format);

    // Decode/resize/encode is CPU-bound; run it off the reactor so slow
    // transcodes don't stall concurrent requests.
    let encoded = match tokio::task::spawn_blocking(move || transcode(&raw, max_width, quality, format)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            METRICS.errors.fetch_add(1, Ordering::Relaxed);
            return e.into_response();
        }
        Err(e) => {
            METRICS.errors.fetch_add(1, Ordering::Relaxed);
            return OptimgError::Encode(e.to_string()).into_response();
        }
    };

    if let Err(e) = state.cache.insert(&key, params.format, &encoded).await {
        tracing::warn!("Failed to cache transcoded image: {}", e);
        // Continue anyway - we can still serve the image
    }

    image_response(encoded, params.format)
}

/// Build the service router. Performs the one-time cache directory init and
/// constructs the shared HTTP client.
pub fn router(config: OptimgConfig) -> Result<Router> {
    let cache = DiskCache::open(config.cache_dir.clone())?;
    let fetcher = Fetcher::new(config.fetch_timeout, config.max_input_size)?;
    let state = Arc::new(AppState { config, cache, fetcher });

    Ok(Router::new()
        .route("/optimize-image", get(optimize_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// ====================================================================================
// OBSERVABILITY
// ====================================================================================

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics tracking
pub struct Metrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub transforms: AtomicU64,
    pub errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            transforms: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
}

lazy_static::lazy_static! {
    static ref METRICS: Metrics = Metrics::new();
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    use serde_json::json;

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "optimg"
    }))
}

/// Metrics endpoint (Prometheus-compatible plain text)
async fn metrics_handler() -> impl IntoResponse {
    let hits = METRICS.cache_hits.load(Ordering::Relaxed);
    let misses = METRICS.cache_misses.load(Ordering::Relaxed);
    let transforms = METRICS.transforms.load(Ordering::Relaxed);
    let errors = METRICS.errors.load(Ordering::Relaxed);

    let metrics = format!(
        "# HELP optimg_cache_hits_total Total number of cache hits\n\
         # TYPE optimg_cache_hits_total counter\n\
         optimg_cache_hits_total {}\n\
         # HELP optimg_cache_misses_total Total number of cache misses\n\
         # TYPE optimg_cache_misses_total counter\n\
         optimg_cache_misses_total {}\n\
         # HELP optimg_transforms_total Total number of image transcodes\n\
         # TYPE optimg_transforms_total counter\n\
         optimg_transforms_total {}\n\
         # HELP optimg_errors_total Total number of errors\n\
         # TYPE optimg_errors_total counter\n\
         optimg_errors_total {}\n",
        hits, misses, transforms, errors
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics,
    )
}
