//! Admin endpoints (admin key)
//!
//! - `POST /admin/snapshot` - capture the payout snapshot
//! - `POST /admin/scores/refresh` - drop cached rankings

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::{error_response, json_response};
use crate::server::AppState;

pub async fn handle_create_snapshot(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.podium.create_snapshot().await {
        Ok(summary) => json_response(StatusCode::CREATED, &summary),
        Err(e) => error_response(e),
    }
}

pub fn handle_refresh_scores(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let invalidated = state.podium.refresh_scores();
    json_response(StatusCode::ACCEPTED, &json!({ "invalidated": invalidated }))
}
