//! GoHighLevel (LeadConnector) calendar adapter
//!
//! Uses a location API key. The location id goes in the query string of
//! reads and in the body of writes. Free slots come from the calendar's
//! `free-slots` endpoint, which answers either with a flat `slots` array or
//! with slots grouped under date keys.

use async_trait::async_trait;
use bookline_core::CalendarBackend;
use bookline_domain::constants::DEFAULT_SLOT_MINUTES;
use bookline_domain::{
    AppointmentDraft, AppointmentStatus, BackendKind, BooklineError, BusyInterval, CustomerInfo,
    DateRange, RemoteAppointment, RemoteCustomer, Result,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use super::time::{day_bounds, duration_minutes, parse_instant, range_bounds, to_local, to_offset_string, to_utc};
use super::{busy_from_appointments, purpose_or_default, split_name, split_title, BackendContext};

const GHL_API_BASE: &str = "https://services.leadconnectorhq.com";
const GHL_API_VERSION: &str = "2021-07-28";

/// GoHighLevel adapter bound to one location calendar.
pub struct GhlBackend {
    ctx: BackendContext,
    base_url: String,
    api_key: String,
    location_id: String,
    calendar_id: String,
}

impl GhlBackend {
    /// Adapter for one tenant's GoHighLevel location.
    ///
    /// # Errors
    /// Returns `NotConfigured` if the API key or calendar id is missing.
    pub fn new(ctx: BackendContext) -> Result<Self> {
        let api_key = ctx.require_secret(&["api_key", "apiKey"])?;
        let location_id = ctx.require_secret(&["location_id", "locationId"])?;
        let calendar_id = match ctx.optional_secret("calendar_id") {
            Some(id) => id,
            None => ctx.require_calendar_id("calendar id")?,
        };
        let base_url = ctx.base_url(GHL_API_BASE);
        Ok(Self { ctx, base_url, api_key, location_id, calendar_id })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.ctx
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("Version", GHL_API_VERSION)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    fn translate(&self, event: GhlEvent) -> Result<RemoteAppointment> {
        let start = parse_instant(&event.start_time)?;
        let end = event.end_time.as_deref().map(parse_instant).transpose()?;
        let local = to_local(self.ctx.timezone, start);
        let (purpose, customer) = split_title(event.title.as_deref().unwrap_or_default());

        Ok(RemoteAppointment {
            external_id: event.id,
            date: local.date(),
            time: local.time(),
            duration_minutes: end
                .map(|end| duration_minutes(start, end, DEFAULT_SLOT_MINUTES))
                .unwrap_or(DEFAULT_SLOT_MINUTES),
            purpose: purpose_or_default(purpose),
            status: ghl_status(event.appointment_status.as_deref().unwrap_or_default()),
            customer,
        })
    }
}

#[async_trait]
impl CalendarBackend for GhlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ghl
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_available_slots(&self, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let (start, end) = day_bounds(self.ctx.timezone, date)?;
        let path = format!("/calendars/{}/free-slots", self.calendar_id);
        let builder = self.request(Method::GET, &path).query(&[
            ("startDate", start.timestamp_millis().to_string()),
            ("endDate", end.timestamp_millis().to_string()),
            ("timezone", self.ctx.timezone.name().to_string()),
        ]);
        let body: Value = self.ctx.http.send_json(BackendKind::Ghl, builder).await?;

        let mut times: Vec<NaiveTime> = free_slot_strings(&body, date)
            .into_iter()
            .filter_map(|raw| match parse_instant(&raw) {
                Ok(instant) => Some(to_local(self.ctx.timezone, instant)),
                Err(err) => {
                    warn!(slot = %raw, error = %err, "skipping unparseable free slot");
                    None
                }
            })
            .filter(|local| local.date() == date)
            .map(|local| local.time())
            .collect();
        times.sort_unstable();
        times.dedup();
        Ok(times)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_busy_intervals(&self, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        let appointments = self.list_appointments(DateRange { start: date, end: date }).await?;
        Ok(busy_from_appointments(&appointments))
    }

    #[instrument(skip(self, customer), fields(tenant = %self.ctx.tenant_id()))]
    async fn find_or_create_customer(&self, customer: &CustomerInfo) -> Result<RemoteCustomer> {
        let lookup = self
            .request(Method::GET, "/contacts/")
            .query(&[("locationId", self.location_id.as_str()), ("query", customer.phone.as_str())]);
        let found: GhlContactSearch = self.ctx.http.send_json(BackendKind::Ghl, lookup).await?;
        if let Some(contact) = found.contacts.into_iter().next() {
            return Ok(RemoteCustomer { id: contact.id });
        }

        let (first_name, last_name) = split_name(&customer.name);
        let mut body = json!({
            "locationId": self.location_id,
            "name": customer.name,
            "firstName": first_name,
            "lastName": last_name,
            "phone": customer.phone,
            "source": "bookline",
        });
        if let Some(email) = &customer.email {
            body["email"] = json!(email);
        }
        let created: GhlContactEnvelope =
            self.ctx.http.send_json(BackendKind::Ghl, self.request(Method::POST, "/contacts/").json(&body)).await?;
        Ok(RemoteCustomer { id: created.contact.id })
    }

    #[instrument(skip(self, customer, draft), fields(tenant = %self.ctx.tenant_id(), date = %draft.date, time = %draft.time))]
    async fn create_appointment(&self, customer: &RemoteCustomer, draft: &AppointmentDraft) -> Result<String> {
        let start = to_utc(self.ctx.timezone, draft.date, draft.time)?;
        let end = start + Duration::minutes(i64::from(draft.duration_minutes));
        let mut body = json!({
            "calendarId": self.calendar_id,
            "locationId": self.location_id,
            "contactId": customer.id,
            "startTime": to_offset_string(self.ctx.timezone, draft.date, draft.time)?,
            "endTime": end.with_timezone(&self.ctx.timezone).to_rfc3339(),
            "title": draft.title,
            "appointmentStatus": "confirmed",
        });
        if let Some(notes) = &draft.notes {
            body["notes"] = json!(notes);
        }

        let response: Value = self
            .ctx
            .http
            .send_json(BackendKind::Ghl, self.request(Method::POST, "/calendars/events/appointments").json(&body))
            .await?;
        response["id"]
            .as_str()
            .or_else(|| response["appointment"]["id"].as_str())
            .map(str::to_owned)
            .ok_or_else(|| BooklineError::RemoteUnavailable("GoHighLevel did not return an appointment id".into()))
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_appointments(&self, range: DateRange) -> Result<Vec<RemoteAppointment>> {
        let (start, end) = range_bounds(self.ctx.timezone, range)?;
        let builder = self.request(Method::GET, "/calendars/events").query(&[
            ("locationId", self.location_id.clone()),
            ("calendarId", self.calendar_id.clone()),
            ("startTime", start.timestamp_millis().to_string()),
            ("endTime", end.timestamp_millis().to_string()),
        ]);
        let listing: GhlEventList = self.ctx.http.send_json(BackendKind::Ghl, builder).await?;

        let mut appointments = Vec::with_capacity(listing.events.len());
        for event in listing.events {
            let id = event.id.clone();
            match self.translate(event) {
                Ok(appointment) if range.contains(appointment.date) => appointments.push(appointment),
                Ok(_) => {}
                Err(err) => warn!(external_id = %id, error = %err, "skipping GoHighLevel event"),
            }
        }
        Ok(appointments)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn cancel_appointment(&self, external_id: &str) -> Result<()> {
        let path = format!("/calendars/events/appointments/{external_id}");
        let body = json!({ "appointmentStatus": "cancelled" });
        self.ctx.http.send_empty(BackendKind::Ghl, self.request(Method::PUT, &path).json(&body)).await
    }
}

/// GoHighLevel appointment status to the canonical status.
#[must_use]
pub fn ghl_status(raw: &str) -> AppointmentStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "showed" => AppointmentStatus::Completed,
        "noshow" | "no_show" => AppointmentStatus::NoShow,
        "cancelled" | "canceled" | "invalid" => AppointmentStatus::Cancelled,
        "confirmed" => AppointmentStatus::Confirmed,
        _ => AppointmentStatus::Scheduled,
    }
}

/// Slot timestamps from either response shape.
fn free_slot_strings(body: &Value, date: NaiveDate) -> Vec<String> {
    fn strings(value: &Value) -> Vec<String> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(|item| item.as_str().map(str::to_owned)).collect())
            .unwrap_or_default()
    }

    if body.get("slots").is_some() {
        return strings(&body["slots"]);
    }

    let key = date.format("%Y-%m-%d").to_string();
    match body.get(&key) {
        Some(day) => strings(&day["slots"]),
        // Some calendars key by neighbouring dates when the tenant timezone
        // differs from the calendar's. Caller filters by local date.
        None => body
            .as_object()
            .map(|days| days.values().flat_map(|day| strings(&day["slots"])).collect())
            .unwrap_or_default(),
    }
}

#[derive(Debug, Deserialize)]
struct GhlContactSearch {
    #[serde(default)]
    contacts: Vec<GhlContact>,
}

#[derive(Debug, Deserialize)]
struct GhlContactEnvelope {
    contact: GhlContact,
}

#[derive(Debug, Deserialize)]
struct GhlContact {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GhlEventList {
    #[serde(default)]
    events: Vec<GhlEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhlEvent {
    id: String,
    #[serde(default)]
    title: Option<String>,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    appointment_status: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::super::test_support::context;
    use super::*;

    fn backend() -> GhlBackend {
        GhlBackend::new(context(
            BackendKind::Ghl,
            "http://localhost",
            &[("api_key", "key"), ("location_id", "loc-1")],
            Some("cal-1"),
        ))
        .unwrap()
    }

    #[test]
    fn status_table() {
        assert_eq!(ghl_status("showed"), AppointmentStatus::Completed);
        assert_eq!(ghl_status("noshow"), AppointmentStatus::NoShow);
        assert_eq!(ghl_status("invalid"), AppointmentStatus::Cancelled);
        assert_eq!(ghl_status("cancelled"), AppointmentStatus::Cancelled);
        assert_eq!(ghl_status("confirmed"), AppointmentStatus::Confirmed);
        assert_eq!(ghl_status("new"), AppointmentStatus::Scheduled);
        assert_eq!(ghl_status(""), AppointmentStatus::Scheduled);
    }

    #[test]
    fn reads_flat_and_date_keyed_slots() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let flat = json!({ "slots": ["2025-01-06T09:00:00-05:00"] });
        assert_eq!(free_slot_strings(&flat, date).len(), 1);

        let keyed = json!({
            "2025-01-06": { "slots": ["2025-01-06T09:00:00-05:00", "2025-01-06T09:30:00-05:00"] },
            "traceId": "abc"
        });
        assert_eq!(free_slot_strings(&keyed, date).len(), 2);
    }

    #[test]
    fn translates_events_into_local_time() {
        let event = GhlEvent {
            id: "evt-1".into(),
            title: Some("Cleaning - Jane Doe".into()),
            start_time: "2025-01-06T15:00:00Z".into(),
            end_time: Some("2025-01-06T16:00:00Z".into()),
            appointment_status: Some("showed".into()),
        };
        let appointment = backend().translate(event).unwrap();
        assert_eq!(appointment.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(appointment.duration_minutes, 60);
        assert_eq!(appointment.status, AppointmentStatus::Completed);
        assert_eq!(appointment.purpose.as_deref(), Some("Cleaning"));
        assert_eq!(appointment.customer.name, "Jane Doe");
    }

    #[test]
    fn requires_location_and_calendar() {
        let ctx = context(BackendKind::Ghl, "http://localhost", &[("api_key", "key")], Some("cal"));
        assert!(matches!(GhlBackend::new(ctx), Err(BooklineError::NotConfigured(_))));

        let ctx = context(BackendKind::Ghl, "http://localhost", &[("api_key", "k"), ("location_id", "l")], None);
        assert!(matches!(GhlBackend::new(ctx), Err(BooklineError::NotConfigured(_))));
    }
}
