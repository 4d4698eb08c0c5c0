//! Authentication and authorization for Podium
//!
//! Provides:
//! - API key authentication (`X-API-Key` header)
//! - Permission levels for route authorization

pub mod api_key;
pub mod permissions;

pub use api_key::ApiKeyValidator;
pub use permissions::{is_route_allowed, required_permission, Route, PermissionLevel};
