use std::sync::Arc;

use crate::main_lib::AppState;
use axum::{extract::State, routing::get, Json, Router};
use quotecache_core::quotes::MarketStatus;
use quotecache_market_data::ProviderStatus;

/// Current exchange session and the TTL a quote fetched now would get.
#[utoipa::path(get, path = "/api/v1/market/session", responses((status = 200, description = "Market session")))]
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<MarketStatus> {
    Json(state.quote_service.market_status())
}

/// Provider chain in order, with remaining call budget and circuit state.
#[utoipa::path(get, path = "/api/v1/market/providers", responses((status = 200, description = "Provider status")))]
pub async fn get_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderStatus>> {
    Json(state.quote_service.provider_status())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market/session", get(get_session))
        .route("/market/providers", get(get_providers))
}
