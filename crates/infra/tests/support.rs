//! Shared helpers for `bookline-infra` integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeMap;

use bookline_domain::{
    AppointmentSource, BackendCredential, BackendKind, BookingRequest, BusinessHours, Config,
    CustomerInfo, Tenant, TenantId,
};
use bookline_infra::BooklineContext;
use chrono::{NaiveDate, NaiveTime, Weekday};
use tempfile::TempDir;

pub const TENANT: &str = "acme";

/// Context over a throwaway database. The directory lives as long as this.
pub struct TestContext {
    pub context: BooklineContext,
    _temp_dir: TempDir,
}

impl std::ops::Deref for TestContext {
    type Target = BooklineContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// Context with no backend overrides.
pub fn test_context() -> TestContext {
    test_context_with(|_| {})
}

/// Context after applying `configure` to the default configuration.
pub fn test_context_with(configure: impl FnOnce(&mut Config)) -> TestContext {
    let temp_dir = TempDir::new().expect("temp dir should be created");
    let mut config = Config::default();
    config.database.path = temp_dir.path().join("bookline.db").to_string_lossy().into_owned();
    config.database.pool_size = 4;
    config.http.timeout_secs = 5;
    config.retry.max_attempts = 1;
    configure(&mut config);

    let context = BooklineContext::from_config(config).expect("context should build");
    TestContext { context, _temp_dir: temp_dir }
}

/// Context whose `kind` adapter talks to `base_url`.
pub fn test_context_for(kind: BackendKind, base_url: &str) -> TestContext {
    test_context_with(|config| {
        config.http.base_urls.insert(kind.as_str().to_string(), base_url.to_string());
    })
}

pub fn tenant_id() -> TenantId {
    TenantId::from(TENANT)
}

/// Mon-Fri 09:00-17:00 in New York, 30-minute slots, local system of record.
pub fn tenant() -> Tenant {
    let mut tenant = Tenant::new(TENANT, "Acme Dental", "America/New_York");
    tenant.hours = BusinessHours::uniform(
        time(9, 0),
        time(17, 0),
        &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
    );
    tenant
}

pub fn credential(kind: BackendKind, secrets: &[(&str, &str)], calendar_id: Option<&str>) -> BackendCredential {
    BackendCredential {
        tenant_id: tenant_id(),
        kind,
        secrets: secrets
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>(),
        calendar_id: calendar_id.map(str::to_owned),
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Monday 2 June 2025 (EDT, UTC-4).
pub fn monday() -> NaiveDate {
    date(2025, 6, 2)
}

pub fn customer(name: &str) -> CustomerInfo {
    CustomerInfo { name: name.to_string(), phone: "+1 (555) 010-2000".to_string(), email: None }
}

pub fn request(name: &str, on: NaiveDate, at: NaiveTime) -> BookingRequest {
    BookingRequest::new(customer(name), on, at, AppointmentSource::Voice).with_purpose("Cleaning")
}
