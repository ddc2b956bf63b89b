//! HTTP adapters for the supported calendar backends
//!
//! Each adapter implements [`CalendarBackend`] for one backend kind and is
//! bound to a single tenant's credential and timezone. Adapters are cheap to
//! build; [`HttpBackendFactory`] creates one per scheduling operation and
//! shares the HTTP connection pool and the token cache across them.
//!
//! Secrets are read from the credential's opaque bundle:
//!
//! | Backend | Required secrets | `calendar_id` |
//! |---------|------------------|---------------|
//! | GoHighLevel | `api_key`, `location_id` | calendar id |
//! | HubSpot | `access_token` | meeting link slug |
//! | Vagaro | `client_id`, `client_secret`, `merchant_id` | unused |
//! | Zoho | `client_id`, `client_secret`, `refresh_token` | unused |
//! | Google | `access_token` or `refresh_token` + client pair | calendar id |

pub mod auth;
pub mod ghl;
pub mod google;
pub mod hubspot;
pub mod time;
pub mod vagaro;
pub mod zoho;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bookline_core::{BackendFactory, CalendarBackend};
use bookline_domain::constants::DEFAULT_PURPOSE;
use bookline_domain::{
    BackendCredential, BackendKind, BookingConfig, BooklineError, BusyInterval, CustomerInfo,
    HttpConfig, RemoteAppointment, Result, TenantId,
};
use chrono_tz::Tz;
use tracing::debug;

pub use auth::TokenCache;
pub use ghl::GhlBackend;
pub use google::GoogleCalendarBackend;
pub use hubspot::HubSpotBackend;
pub use vagaro::VagaroBackend;
pub use zoho::ZohoBackend;

use crate::http::HttpClient;

/// Everything an adapter needs: transport, credential, and tenant timezone.
#[derive(Clone)]
pub struct BackendContext {
    pub http: HttpClient,
    pub credential: BackendCredential,
    pub timezone: Tz,
    /// Replaces the adapter's default API host when set.
    pub base_override: Option<String>,
    pub tokens: Arc<TokenCache>,
}

impl BackendContext {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.credential.kind
    }

    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.credential.tenant_id
    }

    /// The first non-empty secret among `keys`, or `NotConfigured`.
    ///
    /// # Errors
    /// Returns `NotConfigured` naming the first key.
    pub fn require_secret(&self, keys: &[&str]) -> Result<String> {
        keys.iter()
            .find_map(|key| self.credential.secret(key))
            .map(str::to_owned)
            .ok_or_else(|| {
                BooklineError::NotConfigured(format!(
                    "{} credential for tenant {} is missing `{}`",
                    self.kind().display_name(),
                    self.tenant_id(),
                    keys.first().copied().unwrap_or_default()
                ))
            })
    }

    #[must_use]
    pub fn optional_secret(&self, key: &str) -> Option<String> {
        self.credential.secret(key).map(str::to_owned)
    }

    /// Remote calendar identifier, or `NotConfigured` naming what it stands for.
    ///
    /// # Errors
    /// Returns `NotConfigured` naming `what`.
    pub fn require_calendar_id(&self, what: &str) -> Result<String> {
        self.credential
            .calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                BooklineError::NotConfigured(format!(
                    "{} credential for tenant {} has no {what}",
                    self.kind().display_name(),
                    self.tenant_id()
                ))
            })
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self, default: &str) -> String {
        self.base_override.as_deref().unwrap_or(default).trim_end_matches('/').to_string()
    }
}

/// [`BackendFactory`] producing the HTTP adapters in this module.
pub struct HttpBackendFactory {
    http: HttpClient,
    base_urls: HashMap<BackendKind, String>,
    tokens: Arc<TokenCache>,
}

impl HttpBackendFactory {
    /// Build a factory with its own HTTP client.
    ///
    /// # Errors
    /// Returns `Config` if the HTTP client or a base URL override is invalid.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let http = HttpClient::builder().timeout(Duration::from_secs(config.timeout_secs.max(1))).build()?;
        Self::with_client(http, config)
    }

    /// Build a factory around an existing client.
    ///
    /// # Errors
    /// Returns `Config` if a base URL override does not parse.
    pub fn with_client(http: HttpClient, config: &HttpConfig) -> Result<Self> {
        let mut base_urls = HashMap::new();
        for (key, url) in &config.base_urls {
            let kind: BackendKind = key.parse().map_err(|_| {
                BooklineError::Config(format!("unknown backend in http.base_urls: {key}"))
            })?;
            url::Url::parse(url)
                .map_err(|err| BooklineError::Config(format!("invalid base url for {key}: {err}")))?;
            base_urls.insert(kind, url.clone());
        }
        Ok(Self { http, base_urls, tokens: Arc::new(TokenCache::new()) })
    }

    /// Token cache shared by the adapters this factory builds.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }
}

impl BackendFactory for HttpBackendFactory {
    fn backend(&self, config: &BookingConfig, kind: BackendKind) -> Result<Arc<dyn CalendarBackend>> {
        let credential = config.credential(kind).cloned().ok_or_else(|| {
            BooklineError::NotConfigured(format!(
                "tenant {} has no {} credential",
                config.tenant_id,
                kind.display_name()
            ))
        })?;

        let ctx = BackendContext {
            http: self.http.clone(),
            credential,
            timezone: config.timezone,
            base_override: self.base_urls.get(&kind).cloned(),
            tokens: Arc::clone(&self.tokens),
        };

        debug!(tenant = %config.tenant_id, backend = %kind, "building backend adapter");

        let backend: Arc<dyn CalendarBackend> = match kind {
            BackendKind::Ghl => Arc::new(GhlBackend::new(ctx)?),
            BackendKind::HubSpot => Arc::new(HubSpotBackend::new(ctx)?),
            BackendKind::Vagaro => Arc::new(VagaroBackend::new(ctx)?),
            BackendKind::Zoho => Arc::new(ZohoBackend::new(ctx)?),
            BackendKind::Google => Arc::new(GoogleCalendarBackend::new(ctx)?),
        };
        Ok(backend)
    }
}

/// Split an event title of the form `"Purpose - Customer Name"`.
///
/// Titles without the separator are taken as the purpose alone.
pub(crate) fn split_title(title: &str) -> (Option<String>, CustomerInfo) {
    let title = title.trim();
    let (purpose, name) = match title.split_once(" - ") {
        Some((purpose, name)) => (purpose.trim(), name.trim()),
        None => (title, ""),
    };
    let purpose = if purpose.is_empty() { None } else { Some(purpose.to_string()) };
    (purpose, CustomerInfo { name: name.to_string(), ..CustomerInfo::default() })
}

/// Purpose to record when a backend provides none.
pub(crate) fn purpose_or_default(purpose: Option<String>) -> Option<String> {
    purpose.or_else(|| Some(DEFAULT_PURPOSE.to_string()))
}

/// Busy windows derived from listed appointments. Cancelled ones are free.
pub(crate) fn busy_from_appointments(appointments: &[RemoteAppointment]) -> Vec<BusyInterval> {
    appointments
        .iter()
        .filter(|appointment| appointment.status.is_active())
        .map(|appointment| {
            let start = appointment.date.and_time(appointment.time);
            let end = start + chrono::Duration::minutes(i64::from(appointment.duration_minutes));
            BusyInterval::new(start, end)
        })
        .collect()
}

/// Split a full name into first and last parts for CRMs that store them apart.
pub(crate) fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}
