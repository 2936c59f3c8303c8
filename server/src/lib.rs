use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use retrieval_core::config::DEFAULT_SEARCH_LIMIT;
use retrieval_core::persist::IndexPaths;
use retrieval_core::{normalize_scores, Document, HybridSearch, InvertedIndex, SearchConfig, SearchError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct WeightedParams {
    pub q: String,
    pub alpha: Option<f64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct RrfParams {
    pub q: String,
    pub k: Option<u32>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize { DEFAULT_SEARCH_LIMIT }

fn clamp_limit(limit: usize) -> usize { limit.clamp(1, MAX_LIMIT) }

#[derive(Deserialize)]
pub struct TermParams {
    pub term: String,
    pub doc_id: Option<u32>,
    pub k1: Option<f64>,
    pub b: Option<f64>,
}

#[derive(Deserialize)]
pub struct NormalizeRequest {
    pub scores: Vec<f64>,
}

#[derive(Serialize)]
pub struct SearchResponse<T> {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<T>,
}

impl<T> SearchResponse<T> {
    fn new(query: String, start: Instant, results: Vec<T>) -> Self {
        Self { query, took_s: start.elapsed().as_secs_f64(), total_hits: results.len(), results }
    }
}

#[derive(Serialize)]
pub struct StatResponse {
    pub term: String,
    pub doc_id: Option<u32>,
    pub value: f64,
}

/// Error body returned by every handler: `{"error": "..."}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self { Self { status, message: message.into() } }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        let status = match &err {
            SearchError::InvalidArgument { .. } | SearchError::EmptyInput | SearchError::DimensionMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            SearchError::IndexNotBuilt(_) => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::EmptyIndex { .. } => StatusCode::CONFLICT,
            SearchError::CapabilityTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub index_paths_root: PathBuf,
    pub config: SearchConfig,
    pub admin_token: Option<String>,
    engine: Arc<RwLock<Arc<HybridSearch>>>,
}

impl AppState {
    /// The engine serving new requests; in-flight requests keep their snapshot.
    fn engine(&self) -> Arc<HybridSearch> { self.engine.read().clone() }

    fn index(&self) -> std::result::Result<Arc<InvertedIndex>, ApiError> { Ok(self.engine().index().snapshot()?) }
}

pub fn build_app(index_dir: String, config: SearchConfig) -> Result<Router> {
    let index_paths_root = PathBuf::from(&index_dir);
    let engine = HybridSearch::open(&IndexPaths::new(&index_paths_root), config.clone())?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState { index_paths_root, config, admin_token, engine: Arc::new(RwLock::new(Arc::new(engine))) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search/bm25", get(bm25_handler))
        .route("/search/semantic", get(semantic_handler))
        .route("/search/weighted", get(weighted_handler))
        .route("/search/rrf", get(rrf_handler))
        .route("/normalize", post(normalize_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/stats/tf", get(tf_handler))
        .route("/stats/idf", get(idf_handler))
        .route("/stats/tfidf", get(tfidf_handler))
        .route("/stats/bm25-tf", get(bm25_tf_handler))
        .route("/stats/bm25-idf", get(bm25_idf_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    Ok(app)
}

pub async fn bm25_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse<retrieval_core::Bm25Hit>> {
    let start = Instant::now();
    let hits = state.engine().bm25_search(&params.q, clamp_limit(params.limit))?;
    Ok(Json(SearchResponse::new(params.q, start, hits)))
}

pub async fn semantic_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse<retrieval_core::VectorMatch>> {
    let start = Instant::now();
    let matches = state.engine().semantic_search(&params.q, clamp_limit(params.limit)).await?;
    Ok(Json(SearchResponse::new(params.q, start, matches)))
}

pub async fn weighted_handler(
    State(state): State<AppState>,
    Query(params): Query<WeightedParams>,
) -> ApiResult<SearchResponse<retrieval_core::FusedResult>> {
    let start = Instant::now();
    let engine = state.engine();
    let alpha = params.alpha.unwrap_or(engine.config().alpha);
    let results = engine.weighted_search(&params.q, alpha, clamp_limit(params.limit)).await?;
    Ok(Json(SearchResponse::new(params.q, start, results)))
}

pub async fn rrf_handler(
    State(state): State<AppState>,
    Query(params): Query<RrfParams>,
) -> ApiResult<SearchResponse<retrieval_core::FusedResult>> {
    let start = Instant::now();
    let engine = state.engine();
    let k = params.k.unwrap_or(engine.config().rrf_k);
    let results = engine.rrf_search(&params.q, k, clamp_limit(params.limit)).await?;
    Ok(Json(SearchResponse::new(params.q, start, results)))
}

pub async fn normalize_handler(Json(req): Json<NormalizeRequest>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "normalized": normalize_scores(&req.scores) }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> ApiResult<Document> {
    let index = state.index()?;
    match index.document(doc_id) {
        Some(doc) => Ok(Json(doc.clone())),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}

fn require_doc(params: &TermParams) -> std::result::Result<u32, ApiError> {
    params.doc_id.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "doc_id is required"))
}

pub async fn tf_handler(State(state): State<AppState>, Query(p): Query<TermParams>) -> ApiResult<StatResponse> {
    let doc_id = require_doc(&p)?;
    let value = state.index()?.get_term_frequency(doc_id, &p.term)? as f64;
    Ok(Json(StatResponse { term: p.term, doc_id: Some(doc_id), value }))
}

pub async fn idf_handler(State(state): State<AppState>, Query(p): Query<TermParams>) -> ApiResult<StatResponse> {
    let value = state.index()?.get_inverse_document_frequency(&p.term)?;
    Ok(Json(StatResponse { term: p.term, doc_id: None, value }))
}

pub async fn tfidf_handler(State(state): State<AppState>, Query(p): Query<TermParams>) -> ApiResult<StatResponse> {
    let doc_id = require_doc(&p)?;
    let value = state.index()?.get_tf_idf(doc_id, &p.term)?;
    Ok(Json(StatResponse { term: p.term, doc_id: Some(doc_id), value }))
}

pub async fn bm25_tf_handler(State(state): State<AppState>, Query(p): Query<TermParams>) -> ApiResult<StatResponse> {
    let doc_id = require_doc(&p)?;
    let k1 = p.k1.unwrap_or(state.config.bm25.k1);
    let b = p.b.unwrap_or(state.config.bm25.b);
    let value = state.index()?.get_bm25_term_frequency(doc_id, &p.term, k1, b)?;
    Ok(Json(StatResponse { term: p.term, doc_id: Some(doc_id), value }))
}

pub async fn bm25_idf_handler(State(state): State<AppState>, Query(p): Query<TermParams>) -> ApiResult<StatResponse> {
    let value = state.index()?.get_bm25_inverse_document_frequency(&p.term)?;
    Ok(Json(StatResponse { term: p.term, doc_id: None, value }))
}

/// Reload the index and embeddings from disk and swap them in as a unit.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<serde_json::Value> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_paths_root);
    let config = state.config.clone();
    let engine = tokio::task::spawn_blocking(move || HybridSearch::open(&paths, config))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    let num_docs = engine.index().snapshot()?.num_docs();
    *state.engine.write() = Arc::new(engine);
    tracing::info!(num_docs, "reloaded index");
    Ok(Json(serde_json::json!({ "num_docs": num_docs })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> std::result::Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::new(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::UNAUTHORIZED, "invalid admin token"))
    }
}
