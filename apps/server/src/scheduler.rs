//! Background sweep of expired provider responses.

use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::debug;

use crate::main_lib::AppState;

const SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Starts the periodic response cache sweep.
pub fn start_response_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        // First tick is immediate and there is nothing to sweep yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = state.quote_service.sweep_expired_responses();
            if removed > 0 {
                debug!("Swept {} expired provider response(s)", removed);
            }
        }
    });
}
