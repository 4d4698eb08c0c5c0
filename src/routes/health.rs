//! Liveness endpoint (/health, /healthz)
//!
//! Always 200 while the process runs. The body reports cache statistics and
//! whether the snapshot has been captured; a snapshot store that cannot be
//! reached shows up as `snapshotCaptured: null` rather than a failed health check.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::json_response;
use crate::cache::CacheStats;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime: u64,
    pub timestamp: String,
    pub mode: &'static str,
    pub program_id: String,
    pub deadline: String,
    pub snapshot_captured: Option<bool>,
    pub cache: CacheStats,
}

pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let podium = &state.podium;
    let snapshot_captured = match podium.snapshot_exists().await {
        Ok(exists) => Some(exists),
        Err(e) => {
            debug!(error = %e, "Snapshot state unavailable for health check");
            None
        }
    };

    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        program_id: podium.program().program_id.clone(),
        deadline: podium.program().deadline.to_rfc3339(),
        snapshot_captured,
        cache: podium.cache_stats(),
    };

    json_response(StatusCode::OK, &response)
}
