//! Public read endpoints
//!
//! - `GET /leaderboard?offset=&limit=` - one page of the live ranking
//! - `GET /leaderboard/{id}` - live and frozen standing of one identity
//! - `GET /snapshot` - the captured snapshot with its summary
//!
//! The page and snapshot bodies carry an ETag and honour `If-None-Match`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{error_response, etag_response, json_response};
use crate::decisions::parse_identity;
use crate::server::AppState;
use crate::types::PodiumError;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn parse(query: Option<&str>) -> Result<Self, PodiumError> {
        match query {
            None | Some("") => Ok(Self::default()),
            Some(q) => serde_urlencoded::from_str(q)
                .map_err(|e| PodiumError::Validation(format!("invalid query: {}", e))),
        }
    }
}

pub async fn handle_leaderboard(
    state: Arc<AppState>,
    query: Option<&str>,
    if_none_match: Option<&str>,
) -> Response<Full<Bytes>> {
    let query = match PageQuery::parse(query) {
        Ok(q) => q,
        Err(e) => return error_response(e),
    };

    match state
        .podium
        .page(query.offset.unwrap_or(0), query.limit.unwrap_or(DEFAULT_LIMIT))
        .await
    {
        Ok(page) => etag_response(&page, if_none_match),
        Err(e) => error_response(e),
    }
}

pub async fn handle_standing(state: Arc<AppState>, raw_id: &str) -> Response<Full<Bytes>> {
    let identity = match parse_identity(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.podium.standing(identity).await {
        Ok(standing) => json_response(StatusCode::OK, &standing),
        Err(e) => error_response(e),
    }
}

pub async fn handle_snapshot(state: Arc<AppState>, if_none_match: Option<&str>) -> Response<Full<Bytes>> {
    match state.podium.snapshot().await {
        Ok(view) => etag_response(&view, if_none_match),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_parsing() {
        let q = PageQuery::parse(Some("offset=20&limit=10")).unwrap();
        assert_eq!((q.offset, q.limit), (Some(20), Some(10)));

        let q = PageQuery::parse(None).unwrap();
        assert_eq!((q.offset, q.limit), (None, None));

        assert!(PageQuery::parse(Some("offset=-1")).is_err());
        assert!(PageQuery::parse(Some("limit=lots")).is_err());
    }
}
