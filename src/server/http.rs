//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Authorization happens
//! here, before any handler runs.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{is_route_allowed, required_permission, ApiKeyValidator, PermissionLevel, Route};
use crate::cache::{self, TagCache};
use crate::config::Args;
use crate::podium::Podium;
use crate::routes;
use crate::types::PodiumError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub podium: Arc<Podium>,
    pub cache: Arc<TagCache>,
    pub api_keys: ApiKeyValidator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, podium: Arc<Podium>, cache: Arc<TagCache>) -> Self {
        let api_keys = ApiKeyValidator::new(args.api_key_authenticated.clone(), args.api_key_admin.clone());
        Self {
            args,
            podium,
            cache,
            api_keys,
            started_at: Instant::now(),
        }
    }

    /// Permission carried by a request
    ///
    /// Without configured keys, dev mode grants every level.
    pub fn permission_for(&self, api_key: Option<&str>) -> Result<PermissionLevel, PodiumError> {
        if self.args.dev_mode && !self.api_keys.is_configured() {
            return Ok(PermissionLevel::Admin);
        }
        self.api_keys
            .validate(api_key)
            .ok_or_else(|| PodiumError::Unauthorized("invalid API key".into()))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), PodiumError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Podium listening on {} for program '{}'",
        state.args.listen,
        state.podium.program().program_id
    );

    if state.args.dev_mode && !state.api_keys.is_configured() {
        warn!("Development mode enabled without API keys - authentication disabled");
    }

    cache::spawn_cleanup_task(Arc::clone(&state.cache));
    info!("Cache service enabled (max {} entries)", state.cache.config().max_entries);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    let Some(route) = Route::parse(&method, &path) else {
        debug!("[{}] {} {} -> no route", addr, method, path);
        return Ok(not_found_response(&path));
    };

    let api_key = req.headers().get("x-api-key").and_then(|v| v.to_str().ok());
    if let Err(response) = authorize(&state, &route, api_key) {
        info!("[{}] {} {} -> {} (denied)", addr, method, path, response.status());
        return Ok(response);
    }

    let response = match route {
        Route::Health => routes::health_check(Arc::clone(&state)).await,
        Route::Leaderboard => {
            routes::handle_leaderboard(Arc::clone(&state), req.uri().query(), if_none_match(&req)).await
        },
        Route::Standing(ref id) => routes::handle_standing(Arc::clone(&state), id).await,
        Route::Snapshot => routes::handle_snapshot(Arc::clone(&state), if_none_match(&req)).await,
        Route::GetDecision(ref id) => routes::handle_get_decision(Arc::clone(&state), id).await,
        Route::PutDecision(ref id) => routes::handle_put_decision(Arc::clone(&state), req, id).await,
        Route::CreateSnapshot => routes::handle_create_snapshot(Arc::clone(&state)).await,
        Route::RefreshScores => routes::handle_refresh_scores(Arc::clone(&state)),
    };

    info!(
        route = route.name(),
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "[{}] {} {}",
        addr,
        method,
        path
    );
    Ok(response)
}

fn if_none_match(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
}

/// Check the caller's key against the route's required level
#[allow(clippy::result_large_err)]
fn authorize(state: &AppState, route: &Route, api_key: Option<&str>) -> Result<(), Response<Full<Bytes>>> {
    let level = state.permission_for(api_key).map_err(routes::error_response)?;
    if is_route_allowed(route, level) {
        return Ok(());
    }

    let required = required_permission(route);
    let err = if level == PermissionLevel::Public {
        PodiumError::Unauthorized(format!("{} requires an {} key", route.name(), required))
    } else {
        PodiumError::Forbidden(format!("{} requires {} permission, key grants {}", route.name(), required, level))
    };
    Err(routes::error_response(err))
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Content-Type, X-API-Key")
        .header("Access-Control-Allow-Methods", "GET, PUT, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    routes::error_response(PodiumError::NotFound(format!("no route for {}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgramConfig;
    use crate::leaderboard::SystemClock;
    use crate::store::{MemoryPreferenceStore, MemorySnapshotStore, StaticScoreSource};
    use crate::Stores;
    use clap::Parser;
    use http_body_util::BodyExt;
    use std::time::Duration;

    fn state(extra: &[&str]) -> AppState {
        let mut argv = vec!["podium", "--program-deadline", "2026-12-01T00:00:00Z"];
        argv.extend_from_slice(extra);
        let args = Args::try_parse_from(argv).unwrap();
        let cache = Arc::new(TagCache::with_defaults());
        let podium = Arc::new(Podium::new(
            ProgramConfig::default(),
            Stores {
                scores: Arc::new(StaticScoreSource::default()),
                preferences: Arc::new(MemoryPreferenceStore::new()),
                snapshots: Arc::new(MemorySnapshotStore::new()),
            },
            Arc::clone(&cache),
            Arc::new(SystemClock),
            Duration::from_secs(1),
        ));
        AppState::new(args, podium, cache)
    }

    fn keyed() -> AppState {
        state(&["--api-key-authenticated", "member", "--api-key-admin", "root"])
    }

    #[test]
    fn test_public_route_needs_no_key() {
        assert!(authorize(&keyed(), &Route::Leaderboard, None).is_ok());
    }

    #[test]
    fn test_missing_key_is_unauthorized() {
        let response = authorize(&keyed(), &Route::PutDecision("x".into()), None).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_wrong_key_is_unauthorized() {
        let response = authorize(&keyed(), &Route::Leaderboard, Some("nope")).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_member_key_cannot_snapshot() {
        let s = keyed();
        assert!(authorize(&s, &Route::GetDecision("x".into()), Some("member")).is_ok());
        let response = authorize(&s, &Route::CreateSnapshot, Some("member")).unwrap_err();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(authorize(&s, &Route::CreateSnapshot, Some("root")).is_ok());
    }

    #[test]
    fn test_dev_mode_without_keys_is_open() {
        let s = state(&["--dev-mode"]);
        assert!(authorize(&s, &Route::RefreshScores, None).is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_route_404_before_capture() {
        let s = Arc::new(state(&["--dev-mode"]));
        let response = routes::handle_snapshot(s, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_leaderboard_route_answers_304_for_known_etag() {
        let s = Arc::new(state(&["--dev-mode"]));
        let first = routes::handle_leaderboard(Arc::clone(&s), Some("limit=10"), None).await;
        assert_eq!(first.status(), StatusCode::OK);
        let etag = first.headers()[hyper::header::ETAG].to_str().unwrap().to_string();

        let second = routes::handle_leaderboard(Arc::clone(&s), Some("limit=10"), Some(&etag)).await;
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);

        // A different page is a different body
        let other = routes::handle_leaderboard(s, Some("limit=20"), Some(&etag)).await;
        assert_eq!(other.status(), StatusCode::OK);
    }
}
