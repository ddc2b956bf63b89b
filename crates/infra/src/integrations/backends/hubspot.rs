//! HubSpot CRM adapter
//!
//! Appointments are CRM meeting objects associated with a contact. Free slots
//! come from the scheduler's meeting-link availability, keyed by the meeting
//! slug stored as the credential's calendar id. Contacts are matched on
//! email, which HubSpot requires.

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
use tracing::{debug, instrument, warn};

use super::time::{day_bounds, duration_minutes, parse_instant, range_bounds, to_local, to_utc};
use super::{busy_from_appointments, purpose_or_default, split_name, split_title, BackendContext};

const HUBSPOT_API_BASE: &str = "https://api.hubapi.com";
/// Meeting-to-contact association type.
const MEETING_TO_CONTACT: u32 = 200;
const SEARCH_PAGE_SIZE: u32 = 100;
const MAX_SEARCH_PAGES: usize = 20;

const MEETING_PROPERTIES: [&str; 5] = [
    "hs_meeting_title",
    "hs_meeting_body",
    "hs_meeting_start_time",
    "hs_meeting_end_time",
    "hs_meeting_outcome",
];

/// HubSpot adapter using a private-app access token.
pub struct HubSpotBackend {
    ctx: BackendContext,
    base_url: String,
    access_token: String,
}

impl HubSpotBackend {
    /// Adapter for one tenant's HubSpot portal.
    ///
    /// # Errors
    /// Returns `NotConfigured` if no access token is stored.
    pub fn new(ctx: BackendContext) -> Result<Self> {
        let access_token = ctx.require_secret(&["access_token", "api_key"])?;
        let base_url = ctx.base_url(HUBSPOT_API_BASE);
        Ok(Self { ctx, base_url, access_token })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.ctx
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
    }

    async fn search_contact(&self, property: &str, value: &str) -> Result<Option<String>> {
        let body = json!({
            "filterGroups": [{
                "filters": [{ "propertyName": property, "operator": "EQ", "value": value }]
            }],
            "properties": ["email", "firstname", "lastname", "phone"],
            "limit": 1,
        });
        let found: SearchResponse<HubSpotObject> = self
            .ctx
            .http
            .send_json(BackendKind::HubSpot, self.request(Method::POST, "/crm/v3/objects/contacts/search").json(&body))
            .await?;
        Ok(found.results.into_iter().next().map(|contact| contact.id))
    }

    fn translate(&self, meeting: HubSpotObject) -> Result<RemoteAppointment> {
        let props = &meeting.properties;
        let raw_start = property(props, "hs_meeting_start_time")
            .ok_or_else(|| BooklineError::RemoteUnavailable("meeting has no start time".into()))?;
        let start = parse_instant(&raw_start)?;
        let end = property(props, "hs_meeting_end_time").map(|raw| parse_instant(&raw)).transpose()?;
        let local = to_local(self.ctx.timezone, start);
        let (purpose, customer) = split_title(&property(props, "hs_meeting_title").unwrap_or_default());

        Ok(RemoteAppointment {
            external_id: meeting.id,
            date: local.date(),
            time: local.time(),
            duration_minutes: end
                .map(|end| duration_minutes(start, end, DEFAULT_SLOT_MINUTES))
                .unwrap_or(DEFAULT_SLOT_MINUTES),
            purpose: purpose_or_default(purpose),
            status: hubspot_status(&property(props, "hs_meeting_outcome").unwrap_or_default()),
            customer,
        })
    }
}

#[async_trait]
impl CalendarBackend for HubSpotBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::HubSpot
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_available_slots(&self, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let slug = self.ctx.require_calendar_id("meeting link slug")?;
        let (start, end) = day_bounds(self.ctx.timezone, date)?;
        let path = format!("/scheduler/v3/meetings/{slug}/availability");
        let builder = self.request(Method::GET, &path).query(&[
            ("startDatetime", start.timestamp_millis().to_string()),
            ("endDatetime", end.timestamp_millis().to_string()),
            ("timezone", self.ctx.timezone.name().to_string()),
        ]);
        let body: Value = self.ctx.http.send_json(BackendKind::HubSpot, builder).await?;

        let mut times: Vec<NaiveTime> = availability_starts(&body)
            .into_iter()
            .filter_map(|raw| match parse_instant(&raw) {
                Ok(instant) => Some(to_local(self.ctx.timezone, instant)),
                Err(err) => {
                    warn!(slot = %raw, error = %err, "skipping unparseable availability entry");
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
        let email = customer
            .email
            .as_deref()
            .ok_or_else(|| BooklineError::Validation("HubSpot contacts require an email address".into()))?;

        if let Some(id) = self.search_contact("email", email).await? {
            debug!(contact_id = %id, "matched existing HubSpot contact");
            return Ok(RemoteCustomer { id });
        }

        let (first_name, last_name) = split_name(&customer.name);
        let body = json!({
            "properties": {
                "email": email,
                "firstname": first_name,
                "lastname": last_name,
                "phone": customer.phone,
            }
        });
        let created: HubSpotObject = self
            .ctx
            .http
            .send_json(BackendKind::HubSpot, self.request(Method::POST, "/crm/v3/objects/contacts").json(&body))
            .await?;
        Ok(RemoteCustomer { id: created.id })
    }

    #[instrument(skip(self, customer, draft), fields(tenant = %self.ctx.tenant_id(), date = %draft.date, time = %draft.time))]
    async fn create_appointment(&self, customer: &RemoteCustomer, draft: &AppointmentDraft) -> Result<String> {
        let start = to_utc(self.ctx.timezone, draft.date, draft.time)?;
        let end = start + Duration::minutes(i64::from(draft.duration_minutes));
        let body = json!({
            "properties": {
                "hs_timestamp": start.timestamp_millis().to_string(),
                "hs_meeting_title": draft.title,
                "hs_meeting_body": draft.notes.clone().unwrap_or_default(),
                "hs_meeting_start_time": start.timestamp_millis().to_string(),
                "hs_meeting_end_time": end.timestamp_millis().to_string(),
                "hs_meeting_outcome": "SCHEDULED",
            },
            "associations": [{
                "to": { "id": customer.id },
                "types": [{
                    "associationCategory": "HUBSPOT_DEFINED",
                    "associationTypeId": MEETING_TO_CONTACT,
                }]
            }]
        });
        let created: HubSpotObject = self
            .ctx
            .http
            .send_json(BackendKind::HubSpot, self.request(Method::POST, "/crm/v3/objects/meetings").json(&body))
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_appointments(&self, range: DateRange) -> Result<Vec<RemoteAppointment>> {
        let (start, end) = range_bounds(self.ctx.timezone, range)?;
        let mut appointments = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_SEARCH_PAGES {
            let mut body = json!({
                "filterGroups": [{
                    "filters": [{
                        "propertyName": "hs_meeting_start_time",
                        "operator": "BETWEEN",
                        "value": start.timestamp_millis().to_string(),
                        "highValue": (end.timestamp_millis() - 1).to_string(),
                    }]
                }],
                "properties": MEETING_PROPERTIES,
                "sorts": [{ "propertyName": "hs_meeting_start_time", "direction": "ASCENDING" }],
                "limit": SEARCH_PAGE_SIZE,
            });
            if let Some(cursor) = &after {
                body["after"] = json!(cursor);
            }

            let page: SearchResponse<HubSpotObject> = self
                .ctx
                .http
                .send_json(
                    BackendKind::HubSpot,
                    self.request(Method::POST, "/crm/v3/objects/meetings/search").json(&body),
                )
                .await?;

            for meeting in page.results {
                let id = meeting.id.clone();
                match self.translate(meeting) {
                    Ok(appointment) if range.contains(appointment.date) => appointments.push(appointment),
                    Ok(_) => {}
                    Err(err) => warn!(external_id = %id, error = %err, "skipping HubSpot meeting"),
                }
            }

            after = page.paging.and_then(|paging| paging.next).map(|next| next.after);
            if after.is_none() {
                break;
            }
        }

        Ok(appointments)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn cancel_appointment(&self, external_id: &str) -> Result<()> {
        let path = format!("/crm/v3/objects/meetings/{external_id}");
        let body = json!({ "properties": { "hs_meeting_outcome": "CANCELED" } });
        self.ctx.http.send_empty(BackendKind::HubSpot, self.request(Method::PATCH, &path).json(&body)).await
    }

    fn requires_customer_email(&self) -> bool {
        true
    }
}

/// HubSpot meeting outcome to the canonical status.
#[must_use]
pub fn hubspot_status(outcome: &str) -> AppointmentStatus {
    match outcome.trim().to_ascii_uppercase().as_str() {
        "COMPLETED" => AppointmentStatus::Completed,
        "CANCELED" | "CANCELLED" => AppointmentStatus::Cancelled,
        "NO_SHOW" => AppointmentStatus::NoShow,
        "RESCHEDULED" => AppointmentStatus::Confirmed,
        _ => AppointmentStatus::Scheduled,
    }
}

/// Start instants from an availability response, as strings.
fn availability_starts(body: &Value) -> Vec<String> {
    let entries = body
        .get("availableTimes")
        .or_else(|| body.get("times"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    entries
        .iter()
        .filter_map(|entry| {
            let start = entry.get("startTime").or_else(|| entry.get("start")).unwrap_or(entry);
            match start {
                Value::String(raw) => Some(raw.clone()),
                Value::Number(millis) => Some(millis.to_string()),
                _ => None,
            }
        })
        .collect()
}

fn property(props: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(value) if !value.trim().is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<PagingCursor>,
}

#[derive(Debug, Deserialize)]
struct PagingCursor {
    after: String,
}

#[derive(Debug, Deserialize)]
struct HubSpotObject {
    id: String,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}
