//! Permission levels and the route table

use hyper::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission levels for gateway routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum PermissionLevel {
    /// No credentials - leaderboard and snapshot reads
    #[default]
    Public = 0,
    /// Authenticated key - decision reads and writes
    Authenticated = 1,
    /// Admin key - snapshot capture and score refresh
    Admin = 2,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Public => write!(f, "PUBLIC"),
            PermissionLevel::Authenticated => write!(f, "AUTHENTICATED"),
            PermissionLevel::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Routes served by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Leaderboard,
    Standing(String),
    Snapshot,
    GetDecision(String),
    PutDecision(String),
    CreateSnapshot,
    RefreshScores,
}

impl Route {
    /// Match a method and path. Unknown routes are `None`.
    pub fn parse(method: &Method, path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (&Method::GET, ["health"]) | (&Method::GET, ["healthz"]) => Some(Route::Health),
            (&Method::GET, ["leaderboard"]) => Some(Route::Leaderboard),
            (&Method::GET, ["leaderboard", id]) if !id.is_empty() => Some(Route::Standing(id.to_string())),
            (&Method::GET, ["snapshot"]) => Some(Route::Snapshot),
            (&Method::GET, ["decisions", id]) if !id.is_empty() => Some(Route::GetDecision(id.to_string())),
            (&Method::PUT, ["decisions", id]) if !id.is_empty() => Some(Route::PutDecision(id.to_string())),
            (&Method::POST, ["admin", "snapshot"]) => Some(Route::CreateSnapshot),
            (&Method::POST, ["admin", "scores", "refresh"]) => Some(Route::RefreshScores),
            _ => None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Route::Health => "health",
            Route::Leaderboard => "leaderboard",
            Route::Standing(_) => "standing",
            Route::Snapshot => "snapshot",
            Route::GetDecision(_) => "get_decision",
            Route::PutDecision(_) => "put_decision",
            Route::CreateSnapshot => "create_snapshot",
            Route::RefreshScores => "refresh_scores",
        }
    }
}

/// Permission level a route requires
pub fn required_permission(route: &Route) -> PermissionLevel {
    match route {
        Route::Health | Route::Leaderboard | Route::Standing(_) | Route::Snapshot => PermissionLevel::Public,
        Route::GetDecision(_) | Route::PutDecision(_) => PermissionLevel::Authenticated,
        Route::CreateSnapshot | Route::RefreshScores => PermissionLevel::Admin,
    }
}

/// Check if a route is allowed for the given permission level
pub fn is_route_allowed(route: &Route, level: PermissionLevel) -> bool {
    level >= required_permission(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parsing() {
        assert_eq!(Route::parse(&Method::GET, "/health"), Some(Route::Health));
        assert_eq!(Route::parse(&Method::GET, "/leaderboard/"), Some(Route::Leaderboard));
        assert_eq!(
            Route::parse(&Method::GET, "/leaderboard/abc"),
            Some(Route::Standing("abc".into()))
        );
        assert_eq!(
            Route::parse(&Method::PUT, "/decisions/abc"),
            Some(Route::PutDecision("abc".into()))
        );
        assert_eq!(Route::parse(&Method::POST, "/admin/scores/refresh"), Some(Route::RefreshScores));
        assert_eq!(Route::parse(&Method::DELETE, "/snapshot"), None);
        assert_eq!(Route::parse(&Method::GET, "/leaderboard/a/b"), None);
    }

    #[test]
    fn test_public_routes() {
        assert!(is_route_allowed(&Route::Leaderboard, PermissionLevel::Public));
        assert!(is_route_allowed(&Route::Snapshot, PermissionLevel::Admin));
    }

    #[test]
    fn test_decision_routes_need_a_key() {
        let route = Route::PutDecision("x".into());
        assert!(!is_route_allowed(&route, PermissionLevel::Public));
        assert!(is_route_allowed(&route, PermissionLevel::Authenticated));
        assert!(is_route_allowed(&route, PermissionLevel::Admin));
    }

    #[test]
    fn test_admin_routes() {
        assert!(!is_route_allowed(&Route::CreateSnapshot, PermissionLevel::Authenticated));
        assert!(is_route_allowed(&Route::CreateSnapshot, PermissionLevel::Admin));
        assert!(!is_route_allowed(&Route::RefreshScores, PermissionLevel::Public));
    }

    #[test]
    fn test_permission_ordering() {
        assert!(PermissionLevel::Admin > PermissionLevel::Authenticated);
        assert!(PermissionLevel::Authenticated > PermissionLevel::Public);
    }
}
