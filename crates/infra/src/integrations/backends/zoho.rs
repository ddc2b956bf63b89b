//! Zoho CRM events adapter
//!
//! Zoho is a busy-source and optional mirror: it exposes no slot
//! availability and has no customer handshake. Access tokens come from a
//! long-lived refresh token exchanged against the regional accounts host.
//! Mirroring can be switched off per tenant with `create_events = "false"`.

use async_trait::async_trait;
use bookline_core::CalendarBackend;
use bookline_domain::constants::DEFAULT_SLOT_MINUTES;
use bookline_domain::{
    AppointmentDraft, AppointmentStatus, BackendKind, BooklineError, BusyInterval, CustomerInfo,
    DateRange, RemoteAppointment, RemoteCustomer, Result,
};
use chrono::{Duration, NaiveDate, NaiveTime, SecondsFormat};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::time::{duration_minutes, parse_instant, range_bounds, to_local, to_offset_string, to_utc};
use super::{busy_from_appointments, purpose_or_default, BackendContext};

const ZOHO_REGIONS: [&str; 6] = ["com", "eu", "in", "com.au", "jp", "com.cn"];
const DEFAULT_REGION: &str = "com";
const EVENT_FIELDS: &str = "Event_Title,Start_DateTime,End_DateTime,Venue,Description,Who_Id";
const PAGE_SIZE: u32 = 200;
const MAX_PAGES: u32 = 10;

/// Zoho CRM adapter.
pub struct ZohoBackend {
    ctx: BackendContext,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    create_events: bool,
}

impl ZohoBackend {
    /// Adapter for one tenant's Zoho CRM calendar.
    ///
    /// # Errors
    /// Returns `NotConfigured` if no refresh token is stored.
    pub fn new(ctx: BackendContext) -> Result<Self> {
        let client_id = ctx.require_secret(&["client_id", "clientId"])?;
        let client_secret = ctx.require_secret(&["client_secret", "clientSecret"])?;
        let refresh_token = ctx.require_secret(&["refresh_token", "refreshToken"])?;
        let region = ctx
            .optional_secret("region")
            .map(|region| region.to_ascii_lowercase())
            .filter(|region| ZOHO_REGIONS.contains(&region.as_str()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let create_events = ctx
            .optional_secret("create_events")
            .map(|flag| !flag.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        // An override points both hosts at the same server.
        let api_base = ctx.base_url(&format!("https://www.zohoapis.{region}"));
        let accounts_base = ctx.base_url(&format!("https://accounts.zoho.{region}"));

        Ok(Self { ctx, api_base, accounts_base, client_id, client_secret, refresh_token, create_events })
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.ctx.tokens.get(self.ctx.tenant_id(), BackendKind::Zoho) {
            return Ok(token);
        }

        debug!("refreshing Zoho access token");
        let builder = self.ctx.http.request(Method::POST, format!("{}/oauth/v2/token", self.accounts_base)).query(&[
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ]);
        // Zoho reports grant failures as 200 with an `error` field.
        let body: Value = self.ctx.http.send_json(BackendKind::Zoho, builder).await?;
        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(BooklineError::Auth(format!("Zoho token refresh failed: {error}")));
        }
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| BooklineError::Auth("Zoho token response has no access_token".into()))?;
        let expires_in = body.get("expires_in").and_then(Value::as_i64);
        self.ctx.tokens.store(self.ctx.tenant_id(), BackendKind::Zoho, token, expires_in);
        Ok(token.to_string())
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(self
            .ctx
            .http
            .request(method, format!("{}/crm/v5{}", self.api_base, path))
            .header(reqwest::header::AUTHORIZATION, format!("Zoho-oauthtoken {token}")))
    }

    fn translate(&self, event: ZohoEvent) -> Result<RemoteAppointment> {
        let start = parse_instant(&event.start)?;
        let end = event.end.as_deref().map(parse_instant).transpose()?;
        let local = to_local(self.ctx.timezone, start);
        let name = event
            .who
            .and_then(|who| who.name)
            .or_else(|| event.title.clone())
            .unwrap_or_default();

        Ok(RemoteAppointment {
            external_id: event.id,
            date: local.date(),
            time: local.time(),
            duration_minutes: end
                .map(|end| duration_minutes(start, end, DEFAULT_SLOT_MINUTES))
                .unwrap_or(DEFAULT_SLOT_MINUTES),
            purpose: purpose_or_default(event.description.filter(|text| !text.trim().is_empty())),
            // Zoho events carry no lifecycle state; deleted ones disappear.
            status: AppointmentStatus::Confirmed,
            customer: CustomerInfo { name, ..CustomerInfo::default() },
        })
    }
}

#[async_trait]
impl CalendarBackend for ZohoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Zoho
    }

    async fn list_available_slots(&self, _date: NaiveDate) -> Result<Vec<NaiveTime>> {
        Err(BooklineError::NotConfigured("Zoho does not publish slot availability".into()))
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_busy_intervals(&self, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        let appointments = self.list_appointments(DateRange { start: date, end: date }).await?;
        Ok(busy_from_appointments(&appointments))
    }

    async fn find_or_create_customer(&self, customer: &CustomerInfo) -> Result<RemoteCustomer> {
        Ok(RemoteCustomer { id: format!("local:{}", customer.phone_digits()) })
    }

    #[instrument(skip(self, _customer, draft), fields(tenant = %self.ctx.tenant_id(), date = %draft.date, time = %draft.time))]
    async fn create_appointment(&self, _customer: &RemoteCustomer, draft: &AppointmentDraft) -> Result<String> {
        if !self.create_events {
            return Err(BooklineError::NotConfigured("event creation is disabled for this Zoho account".into()));
        }

        let start = to_utc(self.ctx.timezone, draft.date, draft.time)?;
        let end = start + Duration::minutes(i64::from(draft.duration_minutes));
        let body = json!({
            "data": [{
                "Event_Title": draft.title,
                "Start_DateTime": to_offset_string(self.ctx.timezone, draft.date, draft.time)?,
                "End_DateTime": end.with_timezone(&self.ctx.timezone).to_rfc3339_opts(SecondsFormat::Secs, false),
                "Description": event_description(draft),
                "Venue": "",
            }]
        });
        let builder = self.request(Method::POST, "/Events").await?.json(&body);
        let response: ZohoWriteResponse = self.ctx.http.send_json(BackendKind::Zoho, builder).await?;

        let result = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BooklineError::RemoteUnavailable("Zoho returned an empty write response".into()))?;
        if !result.status.eq_ignore_ascii_case("success") {
            return Err(BooklineError::Validation(format!(
                "Zoho rejected the event: {}",
                result.message.unwrap_or(result.status)
            )));
        }
        result
            .details
            .and_then(|details| details.id)
            .ok_or_else(|| BooklineError::RemoteUnavailable("Zoho did not return an event id".into()))
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_appointments(&self, range: DateRange) -> Result<Vec<RemoteAppointment>> {
        // The v5 list endpoint has no date filter; page through and filter here.
        let (window_start, window_end) = range_bounds(self.ctx.timezone, range)?;
        let mut appointments = Vec::new();

        for page in 1..=MAX_PAGES {
            let builder = self.request(Method::GET, "/Events").await?.query(&[
                ("fields", EVENT_FIELDS.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
            // 204 No Content when there are no events.
            let listing: Option<ZohoEventList> = self.ctx.http.send_json(BackendKind::Zoho, builder).await?;
            let Some(listing) = listing else { break };

            for event in listing.data {
                let id = event.id.clone();
                match parse_instant(&event.start) {
                    Ok(start) if start >= window_start && start < window_end => match self.translate(event) {
                        Ok(appointment) => appointments.push(appointment),
                        Err(err) => warn!(external_id = %id, error = %err, "skipping Zoho event"),
                    },
                    Ok(_) => {}
                    Err(err) => warn!(external_id = %id, error = %err, "skipping Zoho event"),
                }
            }

            if !listing.info.map(|info| info.more_records).unwrap_or(false) {
                break;
            }
        }

        Ok(appointments)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn cancel_appointment(&self, external_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/Events/{external_id}")).await?;
        self.ctx.http.send_empty(BackendKind::Zoho, builder).await
    }

    fn supports_event_creation(&self) -> bool {
        self.create_events
    }
}

fn event_description(draft: &AppointmentDraft) -> String {
    let mut lines = Vec::new();
    if let Some(notes) = draft.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
        lines.push(notes.trim().to_string());
        lines.push(String::new());
    }
    lines.push(format!("Customer: {}", draft.customer.name));
    lines.push(format!("Phone: {}", draft.customer.phone));
    lines.push(format!("Email: {}", draft.customer.email.as_deref().unwrap_or("N/A")));
    lines.join("\n")
}

#[derive(Debug, Deserialize)]
struct ZohoEventList {
    #[serde(default)]
    data: Vec<ZohoEvent>,
    #[serde(default)]
    info: Option<ZohoPageInfo>,
}

#[derive(Debug, Deserialize)]
struct ZohoPageInfo {
    #[serde(default)]
    more_records: bool,
}

#[derive(Debug, Deserialize)]
struct ZohoEvent {
    id: String,
    #[serde(rename = "Event_Title", default)]
    title: Option<String>,
    #[serde(rename = "Start_DateTime")]
    start: String,
    #[serde(rename = "End_DateTime", default)]
    end: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Who_Id", default)]
    who: Option<ZohoLookup>,
}

#[derive(Debug, Deserialize)]
struct ZohoLookup {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZohoWriteResponse {
    #[serde(default)]
    data: Vec<ZohoWriteResult>,
}

#[derive(Debug, Deserialize)]
struct ZohoWriteResult {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<ZohoWriteDetails>,
}

#[derive(Debug, Deserialize)]
struct ZohoWriteDetails {
    #[serde(default)]
    id: Option<String>,
}
