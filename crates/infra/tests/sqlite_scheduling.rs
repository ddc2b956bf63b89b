//! End-to-end scheduling over the SQLite store with no remote backends.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod support;

use std::sync::Arc;

use bookline_domain::{
    AppointmentSource, AppointmentStatus, AvailabilityMode, BooklineError, DashboardQuery, SystemOfRecord,
};
use support::{monday, request, tenant, tenant_id, test_context, time};

#[tokio::test]
async fn local_tenant_books_and_lists() {
    let ctx = test_context();
    ctx.tenants.upsert_tenant(&tenant()).await.unwrap();

    let report = ctx.scheduling.availability(&tenant_id(), monday()).await.unwrap();
    assert_eq!(report.mode, AvailabilityMode::LocalOnly);
    assert_eq!(report.slots.len(), 16);
    assert_eq!(report.slots[0].time, time(9, 0));
    assert_eq!(report.slots[15].time, time(16, 30));

    let confirmation =
        ctx.scheduling.book_appointment(&tenant_id(), request("Ada Lovelace", monday(), time(10, 0))).await.unwrap();
    assert_eq!(confirmation.system, SystemOfRecord::Local);
    assert_eq!(confirmation.display_time, "10:00 AM");
    assert_eq!(confirmation.confirmation_code.len(), 6);
    assert!(confirmation.remote_external_id.is_none());

    let slots = ctx.scheduling.get_available_slots(&tenant_id(), monday()).await.unwrap();
    assert_eq!(slots.len(), 15);
    assert!(slots.iter().all(|slot| slot.time != time(10, 0)));
    assert!(!ctx.scheduling.is_slot_available(&tenant_id(), monday(), time(10, 0)).await.unwrap());
    assert!(ctx.scheduling.is_slot_available(&tenant_id(), monday(), time(10, 30)).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_one_slot_have_a_single_winner() {
    let ctx = test_context();
    ctx.tenants.upsert_tenant(&tenant()).await.unwrap();

    let mut handles = Vec::new();
    for caller in 0..8 {
        let scheduling = Arc::clone(&ctx.scheduling);
        handles.push(tokio::spawn(async move {
            scheduling
                .book_appointment(&tenant_id(), request(&format!("Caller {caller}"), monday(), time(11, 0)))
                .await
        }));
    }

    let mut booked = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(BooklineError::SlotConflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }
    assert_eq!(booked, 1);
    assert_eq!(conflicts, 7);

    let view = ctx
        .scheduling
        .get_dashboard_appointments(
            &tenant_id(),
            &DashboardQuery { days: Some(1), refresh: false, from: Some(monday()) },
        )
        .await
        .unwrap();
    assert_eq!(view.appointments.len(), 1);
}

#[tokio::test]
async fn cancelling_reopens_the_slot() {
    let ctx = test_context();
    ctx.tenants.upsert_tenant(&tenant()).await.unwrap();

    let first =
        ctx.scheduling.book_appointment(&tenant_id(), request("Ada Lovelace", monday(), time(14, 0))).await.unwrap();
    let cancelled = ctx.scheduling.cancel_appointment(&tenant_id(), first.appointment_id).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert!(ctx.scheduling.is_slot_available(&tenant_id(), monday(), time(14, 0)).await.unwrap());

    let second =
        ctx.scheduling.book_appointment(&tenant_id(), request("Grace Hopper", monday(), time(14, 0))).await.unwrap();
    assert_ne!(second.appointment_id, first.appointment_id);

    let again = ctx.scheduling.cancel_appointment(&tenant_id(), first.appointment_id).await.unwrap();
    assert_eq!(again.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn dashboard_shows_source_badges() {
    let ctx = test_context();
    ctx.tenants.upsert_tenant(&tenant()).await.unwrap();

    let mut walk_in = request("Walk In", monday(), time(9, 0));
    walk_in.source = AppointmentSource::WalkIn;
    ctx.scheduling.book_appointment(&tenant_id(), walk_in).await.unwrap();
    ctx.scheduling.book_appointment(&tenant_id(), request("Voice Caller", monday(), time(9, 30))).await.unwrap();

    let view = ctx
        .scheduling
        .get_dashboard_appointments(
            &tenant_id(),
            &DashboardQuery { days: Some(7), refresh: false, from: Some(monday()) },
        )
        .await
        .unwrap();

    let labels: Vec<&str> = view.appointments.iter().map(|entry| entry.badge.label.as_str()).collect();
    assert_eq!(labels, vec!["Walk-in", "Voice"]);
    assert!(view.sync.is_none());
}

#[tokio::test]
async fn booking_outside_hours_is_rejected() {
    let ctx = test_context();
    ctx.tenants.upsert_tenant(&tenant()).await.unwrap();

    let err = ctx
        .scheduling
        .book_appointment(&tenant_id(), request("Night Owl", monday(), time(17, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, BooklineError::Validation(_)));
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let ctx = test_context();
    let err = ctx.scheduling.get_available_slots(&tenant_id(), monday()).await.unwrap_err();
    assert!(matches!(err, BooklineError::NotFound(_)));
}
