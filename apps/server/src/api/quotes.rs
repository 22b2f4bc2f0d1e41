use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use quotecache_core::quotes::{QuoteOptions, QuoteResult};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Default)]
pub struct QuoteQuery {
    #[serde(default)]
    force_refresh: bool,
    allow_stale: Option<bool>,
}

impl From<&QuoteQuery> for QuoteOptions {
    fn from(q: &QuoteQuery) -> Self {
        QuoteOptions {
            force_refresh: q.force_refresh,
            allow_stale: q.allow_stale,
            ..QuoteOptions::default()
        }
    }
}

#[derive(Deserialize)]
pub struct BatchQuery {
    /// Comma-separated symbols
    symbols: Option<String>,
    #[serde(default)]
    force_refresh: bool,
    allow_stale: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    removed: usize,
}

#[utoipa::path(get, path = "/api/v1/quotes/{symbol}", responses((status = 200, description = "Quote or unavailable marker"), (status = 400, description = "Malformed symbol")))]
pub async fn get_quote(
    Path(symbol): Path<String>,
    Query(q): Query<QuoteQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<QuoteResult>> {
    let result = state.quote_service.get_quote(&symbol, (&q).into()).await?;
    Ok(Json(result))
}

#[utoipa::path(get, path = "/api/v1/quotes", responses((status = 200, description = "Quotes keyed by symbol"), (status = 400, description = "Missing, malformed or too many symbols")))]
pub async fn get_quotes(
    Query(q): Query<BatchQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<HashMap<String, QuoteResult>>> {
    let raw = q
        .symbols
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("symbols query parameter is required".to_string()))?;
    let symbols: Vec<String> = raw.split(',').map(|s| s.to_string()).collect();

    let options = QuoteOptions {
        force_refresh: q.force_refresh,
        allow_stale: q.allow_stale,
        ..QuoteOptions::default()
    };
    let results = state.quote_service.get_quotes(&symbols, options).await?;
    Ok(Json(results))
}

#[utoipa::path(delete, path = "/api/v1/quotes/{symbol}", responses((status = 200, description = "Snapshots removed")))]
pub async fn clear_quote(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ClearResponse>> {
    let removed = state.quote_service.clear_cache(Some(&symbol)).await?;
    Ok(Json(ClearResponse { removed }))
}

#[utoipa::path(delete, path = "/api/v1/quotes", responses((status = 200, description = "Snapshots removed")))]
pub async fn clear_all_quotes(State(state): State<Arc<AppState>>) -> ApiResult<Json<ClearResponse>> {
    let removed = state.quote_service.clear_cache(None).await?;
    Ok(Json(ClearResponse { removed }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quotes", get(get_quotes).delete(clear_all_quotes))
        .route("/quotes/{symbol}", get(get_quote).delete(clear_quote))
}
