//! Shared test helpers for `bookline-core` integration tests.
//!
//! In-memory repositories and scriptable backends so scenario tests can
//! focus on scheduling behaviour instead of storage and HTTP plumbing.

#![allow(dead_code)]

pub mod backends;
pub mod repositories;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bookline_core::{CodeGenerator, RemoteCallPolicy, SchedulingService};
use bookline_domain::{
    AppointmentSource, AppointmentStatus, BackendCredential, BackendKind, BookingRequest,
    BusinessHours, CustomerInfo, RemoteAppointment, RetrySettings, Tenant, TenantId,
};
use chrono::{NaiveDate, NaiveTime, Weekday};

use backends::{MockBackend, MockBackendFactory};
use repositories::{MockAppointmentRepository, MockCredentialStore, MockTenantRepository};

pub const TENANT: &str = "acme";

pub fn tenant_id() -> TenantId {
    TenantId::from(TENANT)
}

/// Mon-Fri 09:00-17:00 in New York, 30-minute slots.
pub fn tenant() -> Tenant {
    let mut tenant = Tenant::new(TENANT, "Acme Dental", "America/New_York");
    tenant.hours = BusinessHours::uniform(
        time(9, 0),
        time(17, 0),
        &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
    );
    tenant
}

pub fn credential(kind: BackendKind) -> BackendCredential {
    let mut secrets = BTreeMap::new();
    secrets.insert("api_key".to_string(), format!("{kind}-key"));
    BackendCredential {
        tenant_id: tenant_id(),
        kind,
        secrets,
        calendar_id: Some(format!("{kind}-calendar")),
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Monday 2 June 2025.
pub fn monday() -> NaiveDate {
    date(2025, 6, 2)
}

pub fn customer(name: &str) -> CustomerInfo {
    CustomerInfo { name: name.to_string(), phone: "+1 (555) 010-2000".to_string(), email: None }
}

pub fn request(name: &str, on: NaiveDate, at: NaiveTime) -> BookingRequest {
    BookingRequest::new(customer(name), on, at, AppointmentSource::Voice).with_purpose("Cleaning")
}

/// A wired `SchedulingService` plus a handle on its appointment store.
pub struct Harness {
    pub service: SchedulingService,
    pub appointments: MockAppointmentRepository,
}

/// Service for `tenant` with a credential for each of `credentials` and the
/// given scripted backends. Remote calls time out after 200ms and reads are
/// attempted twice.
pub fn harness(tenant: Tenant, credentials: &[BackendKind], backends: Vec<Arc<MockBackend>>) -> Harness {
    let tenants = MockTenantRepository::default().with_tenant(tenant);
    let store = credentials
        .iter()
        .fold(MockCredentialStore::default(), |store, kind| store.with_credential(credential(*kind)));
    let factory = backends.into_iter().fold(MockBackendFactory::default(), MockBackendFactory::with);
    let appointments = MockAppointmentRepository::new();

    let service = SchedulingService::new(
        Arc::new(tenants),
        Arc::new(store),
        Arc::new(appointments.clone()),
        Arc::new(factory),
    )
    .with_policy(RemoteCallPolicy::new(
        Duration::from_millis(200),
        &RetrySettings { max_attempts: 2, initial_delay_ms: 1 },
    ));
    Harness { service, appointments }
}

/// Same as [`harness`] with a fixed confirmation code source.
pub fn harness_with_codes(
    tenant: Tenant,
    credentials: &[BackendKind],
    backends: Vec<Arc<MockBackend>>,
    codes: Arc<dyn CodeGenerator>,
) -> Harness {
    let Harness { service, appointments } = harness(tenant, credentials, backends);
    Harness { service: service.with_code_generator(codes), appointments }
}

pub fn remote(external_id: &str, on: NaiveDate, at: NaiveTime) -> RemoteAppointment {
    RemoteAppointment {
        external_id: external_id.to_string(),
        date: on,
        time: at,
        duration_minutes: 30,
        purpose: Some("Consultation".to_string()),
        status: AppointmentStatus::Confirmed,
        customer: CustomerInfo {
            name: "Remote Customer".to_string(),
            phone: "5550109999".to_string(),
            email: None,
        },
    }
}
