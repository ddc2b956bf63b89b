//! Reconciliation from a mocked GoHighLevel calendar into SQLite.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod support;

use bookline_domain::{AppointmentSource, AppointmentStatus, BackendKind, DashboardQuery, DateRange, SystemOfRecord};
use serde_json::{json, Value};
use support::{credential, date, monday, request, tenant, tenant_id, test_context_for, time, TestContext};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn week() -> DateRange {
    DateRange::new(monday(), date(2025, 6, 6)).unwrap()
}

fn event(id: &str, start: &str, end: &str, title: &str, status: &str) -> Value {
    json!({ "id": id, "title": title, "startTime": start, "endTime": end, "appointmentStatus": status })
}

async fn mount_events(server: &MockServer, events: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/calendars/events"))
        .and(query_param("calendarId", "cal-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "events": events })))
        .mount(server)
        .await;
}

async fn ghl_tenant(server: &MockServer) -> TestContext {
    let ctx = test_context_for(BackendKind::Ghl, &server.uri());
    let mut tenant = tenant();
    tenant.booking_system = Some(SystemOfRecord::Remote(BackendKind::Ghl));
    ctx.tenants.upsert_tenant(&tenant).await.unwrap();
    ctx.tenants
        .save_credential(&credential(BackendKind::Ghl, &[("api_key", "ghl-key"), ("location_id", "loc-1")], Some("cal-1")))
        .await
        .unwrap();
    ctx
}

fn remote_week() -> Vec<Value> {
    vec![
        event("g-1", "2025-06-03T10:00:00-04:00", "2025-06-03T10:30:00-04:00", "Checkup - Ann Lee", "confirmed"),
        event("g-2", "2025-06-04T15:00:00-04:00", "2025-06-04T16:00:00-04:00", "Whitening - Bo Diaz", "cancelled"),
    ]
}

#[tokio::test]
async fn repeated_sync_is_idempotent() {
    let server = MockServer::start().await;
    mount_events(&server, remote_week()).await;
    let ctx = ghl_tenant(&server).await;

    let first = ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    assert_eq!(first.created, 2);
    assert!(first.errors.is_empty());

    let second = ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(second.unchanged, 2);

    let view = ctx
        .scheduling
        .get_dashboard_appointments(&tenant_id(), &DashboardQuery { days: Some(5), refresh: false, from: Some(monday()) })
        .await
        .unwrap();
    // The cancelled import is stored but not listed.
    assert_eq!(view.appointments.len(), 1);
    let imported = &view.appointments[0];
    assert_eq!(imported.appointment.source, AppointmentSource::Sync(BackendKind::Ghl));
    assert_eq!(imported.appointment.customer.name, "Ann Lee");
    assert_eq!(imported.appointment.purpose.as_deref(), Some("Checkup"));
    assert_eq!(imported.appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(imported.badge.label, "GHL");
    assert_eq!(imported.appointment.duration_minutes, 30);
    assert!(view.last_synced_at.is_some());
}

#[tokio::test]
async fn remote_changes_update_imported_rows() {
    let server = MockServer::start().await;
    mount_events(&server, remote_week()).await;
    let ctx = ghl_tenant(&server).await;
    ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();

    server.reset().await;
    mount_events(
        &server,
        vec![
            event("g-1", "2025-06-03T11:00:00-04:00", "2025-06-03T11:30:00-04:00", "Checkup - Ann Lee", "confirmed"),
            event("g-2", "2025-06-04T15:00:00-04:00", "2025-06-04T16:00:00-04:00", "Whitening - Bo Diaz", "cancelled"),
        ],
    )
    .await;

    let report = ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);

    let view = ctx
        .scheduling
        .get_dashboard_appointments(&tenant_id(), &DashboardQuery { days: Some(5), refresh: false, from: Some(monday()) })
        .await
        .unwrap();
    assert_eq!(view.appointments[0].appointment.time, time(11, 0));
}

#[tokio::test]
async fn imported_appointments_block_remote_free_slots() {
    let server = MockServer::start().await;
    mount_events(&server, remote_week()).await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/free-slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slots": ["2025-06-03T10:00:00-04:00", "2025-06-03T10:30:00-04:00"]
        })))
        .mount(&server)
        .await;
    let ctx = ghl_tenant(&server).await;

    ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    let slots = ctx.scheduling.get_available_slots(&tenant_id(), date(2025, 6, 3)).await.unwrap();

    let times: Vec<_> = slots.iter().map(|slot| slot.time).collect();
    assert_eq!(times, vec![time(10, 30)]);
}

#[tokio::test]
async fn booked_then_synced_appointment_is_not_duplicated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contacts": [{ "id": "contact-1" }] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/events/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "appointment": { "id": "g-booked" } })))
        .expect(1)
        .mount(&server)
        .await;
    mount_events(
        &server,
        vec![event("g-booked", "2025-06-02T09:00:00-04:00", "2025-06-02T09:30:00-04:00", "Cleaning - Ada Lovelace", "confirmed")],
    )
    .await;
    let ctx = ghl_tenant(&server).await;

    let confirmation =
        ctx.scheduling.book_appointment(&tenant_id(), request("Ada Lovelace", monday(), time(9, 0))).await.unwrap();
    assert_eq!(confirmation.remote_external_id.as_deref(), Some("g-booked"));

    let report = ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    assert_eq!(report.created, 0);
    assert!(report.conflicts.is_empty());

    let view = ctx
        .scheduling
        .get_dashboard_appointments(&tenant_id(), &DashboardQuery { days: Some(5), refresh: true, from: Some(monday()) })
        .await
        .unwrap();
    assert_eq!(view.appointments.len(), 1);
    assert_eq!(view.appointments[0].appointment.source, AppointmentSource::Voice);
    assert!(view.sync.is_some());
}

#[tokio::test]
async fn remote_cancellation_frees_a_booked_slot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contacts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contacts": [{ "id": "contact-1" }] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/events/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "appointment": { "id": "g-booked" } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/cal-1/free-slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slots": ["2025-06-02T10:00:00-04:00", "2025-06-02T10:30:00-04:00"]
        })))
        .mount(&server)
        .await;
    mount_events(
        &server,
        vec![event("g-booked", "2025-06-02T10:00:00-04:00", "2025-06-02T10:30:00-04:00", "Cleaning - Ada Lovelace", "cancelled")],
    )
    .await;
    let ctx = ghl_tenant(&server).await;

    ctx.scheduling.book_appointment(&tenant_id(), request("Ada Lovelace", monday(), time(10, 0))).await.unwrap();
    assert!(!ctx.scheduling.is_slot_available(&tenant_id(), monday(), time(10, 0)).await.unwrap());

    let report = ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert!(report.conflicts.is_empty());
    assert!(ctx.scheduling.is_slot_available(&tenant_id(), monday(), time(10, 0)).await.unwrap());
}

#[tokio::test]
async fn listing_failure_is_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/events"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    let ctx = ghl_tenant(&server).await;

    let report = ctx.scheduling.sync_appointments(&tenant_id(), week()).await.unwrap();
    assert!(report.is_noop());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].backend, BackendKind::Ghl);
}
