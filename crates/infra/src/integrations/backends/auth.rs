//! Short-lived access token cache shared by OAuth-backed adapters
//!
//! Adapter instances are built per operation, so tokens are cached on the
//! factory keyed by tenant and backend. A token is reused until it is within
//! [`REFRESH_MARGIN_SECS`] of its expiry.

use std::collections::HashMap;

use bookline_domain::{BackendKind, TenantId};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

/// Refresh tokens this many seconds before the backend would reject them.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when a token response omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Thread-safe cache of access tokens.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<(TenantId, BackendKind), CachedToken>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token for the pair, if it is still comfortably valid.
    #[must_use]
    pub fn get(&self, tenant_id: &TenantId, kind: BackendKind) -> Option<String> {
        self.get_at(tenant_id, kind, Utc::now())
    }

    fn get_at(&self, tenant_id: &TenantId, kind: BackendKind, now: DateTime<Utc>) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(&(tenant_id.clone(), kind))
            .filter(|token| token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now)
            .map(|token| token.access_token.clone())
    }

    /// Remember a freshly issued token. `expires_in` is in seconds.
    pub fn store(&self, tenant_id: &TenantId, kind: BackendKind, access_token: &str, expires_in: Option<i64>) {
        let ttl = expires_in.filter(|secs| *secs > 0).unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        let token = CachedToken {
            access_token: access_token.to_string(),
            expires_at: Utc::now() + Duration::seconds(ttl),
        };
        self.entries.lock().insert((tenant_id.clone(), kind), token);
    }

    /// Forget a token, e.g. after the backend rejected it.
    pub fn invalidate(&self, tenant_id: &TenantId, kind: BackendKind) {
        self.entries.lock().remove(&(tenant_id.clone(), kind));
    }
}

/// Standard OAuth token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
