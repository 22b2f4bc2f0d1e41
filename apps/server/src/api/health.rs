use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    status: &'static str,
    version: &'static str,
    storage: &'static str,
    snapshots: usize,
}

/// Liveness plus a snapshot count, which also proves the store is readable.
#[utoipa::path(get, path = "/api/v1/health", responses((status = 200, description = "Health")))]
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthStatus>> {
    let snapshots = state.snapshot_store.count()?;
    Ok(Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage: if state.db_path.is_some() { "sqlite" } else { "memory" },
        snapshots,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
