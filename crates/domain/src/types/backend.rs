//! Remote calendar backend kinds and the opaque credentials that drive them

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::tenant::TenantId;
use crate::errors::BooklineError;

/// Kind of remote calendar system a tenant can wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GoHighLevel / LeadConnector
    Ghl,
    HubSpot,
    Vagaro,
    /// Zoho CRM events
    Zoho,
    /// Google Calendar
    Google,
}

impl BackendKind {
    /// Every known backend kind, in inference priority order.
    pub const ALL: [BackendKind; 5] =
        [BackendKind::HubSpot, BackendKind::Ghl, BackendKind::Vagaro, BackendKind::Zoho, BackendKind::Google];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ghl => "ghl",
            Self::HubSpot => "hubspot",
            Self::Vagaro => "vagaro",
            Self::Zoho => "zoho",
            Self::Google => "google",
        }
    }

    /// Human-facing product name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ghl => "GoHighLevel",
            Self::HubSpot => "HubSpot",
            Self::Vagaro => "Vagaro",
            Self::Zoho => "Zoho",
            Self::Google => "Google Calendar",
        }
    }

    /// Source tag stamped on appointments imported from this backend.
    #[must_use]
    pub fn sync_source_tag(&self) -> &'static str {
        match self {
            Self::Ghl => "ghl_sync",
            Self::HubSpot => "hubspot_sync",
            Self::Vagaro => "vagaro_sync",
            Self::Zoho => "zoho_sync",
            Self::Google => "google_sync",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ghl" | "gohighlevel" | "leadconnector" => Ok(Self::Ghl),
            "hubspot" => Ok(Self::HubSpot),
            "vagaro" => Ok(Self::Vagaro),
            "zoho" => Ok(Self::Zoho),
            "google" | "google_calendar" => Ok(Self::Google),
            other => Err(BooklineError::Validation(format!("unknown backend kind: {other}"))),
        }
    }
}

/// Credentials for one backend of one tenant.
///
/// The secret bundle is opaque to the scheduling core: only the adapter for
/// `kind` knows which keys it expects. The core never builds or mutates it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredential {
    pub tenant_id: TenantId,
    pub kind: BackendKind,
    pub secrets: BTreeMap<String, String>,
    /// Calendar, location, or meeting identifier on the remote side.
    pub calendar_id: Option<String>,
}

impl BackendCredential {
    /// Look up a non-empty secret value by key.
    #[must_use]
    pub fn secret(&self, key: &str) -> Option<&str> {
        self.secrets.get(key).map(String::as_str).filter(|value| !value.trim().is_empty())
    }
}

impl fmt::Debug for BackendCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredential")
            .field("tenant_id", &self.tenant_id)
            .field("kind", &self.kind)
            .field("secret_keys", &self.secrets.keys().collect::<Vec<_>>())
            .field("calendar_id", &self.calendar_id)
            .finish()
    }
}
