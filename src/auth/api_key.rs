//! API key authentication
//!
//! Two distinct keys map to two permission levels. Keys are compared in
//! constant time over their SHA-256 digests.

use sha2::{Digest, Sha256};

use super::PermissionLevel;

/// Validates `X-API-Key` values against the configured keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeyValidator {
    authenticated: Option<[u8; 32]>,
    admin: Option<[u8; 32]>,
}

impl ApiKeyValidator {
    pub fn new(authenticated: Option<String>, admin: Option<String>) -> Self {
        Self {
            authenticated: authenticated.filter(|k| !k.is_empty()).map(|k| digest(&k)),
            admin: admin.filter(|k| !k.is_empty()).map(|k| digest(&k)),
        }
    }

    /// Whether any key is configured
    pub fn is_configured(&self) -> bool {
        self.authenticated.is_some() || self.admin.is_some()
    }

    /// Permission granted by a presented key.
    ///
    /// No key yields `Public`. A key that matches nothing yields `None`.
    pub fn validate(&self, presented: Option<&str>) -> Option<PermissionLevel> {
        let Some(presented) = presented else {
            return Some(PermissionLevel::Public);
        };
        let presented = digest(presented);

        if self.admin.is_some_and(|k| constant_time_eq(&k, &presented)) {
            return Some(PermissionLevel::Admin);
        }
        if self.authenticated.is_some_and(|k| constant_time_eq(&k, &presented)) {
            return Some(PermissionLevel::Authenticated);
        }
        None
    }
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
