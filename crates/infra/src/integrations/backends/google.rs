//! Google Calendar adapter
//!
//! Busy windows come from the free/busy endpoint. Events are written and
//! listed on the credential's calendar (`primary` when none is set). A static
//! `access_token` secret is used as-is; otherwise a `refresh_token` with the
//! OAuth client pair is exchanged and cached.

use async_trait::async_trait;
use bookline_core::CalendarBackend;
use bookline_domain::constants::DEFAULT_SLOT_MINUTES;
use bookline_domain::{
    AppointmentDraft, AppointmentStatus, BackendKind, BooklineError, BusyInterval, CustomerInfo,
    DateRange, RemoteAppointment, RemoteCustomer, Result,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use super::auth::TokenResponse;
use super::time::{day_bounds, duration_minutes, parse_instant, range_bounds, to_local, to_utc, to_zulu_string};
use super::{purpose_or_default, split_title, BackendContext};
use crate::errors::status_error;

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_CALENDAR: &str = "primary";
const PAGE_SIZE: u32 = 250;
const MAX_PAGES: usize = 10;

enum GoogleAuth {
    Static(String),
    Refresh { refresh_token: String, client_id: String, client_secret: String },
}

/// Google Calendar adapter bound to one calendar.
pub struct GoogleCalendarBackend {
    ctx: BackendContext,
    api_base: String,
    token_url: String,
    calendar_id: String,
    auth: GoogleAuth,
}

impl GoogleCalendarBackend {
    /// Adapter for one tenant's Google calendar.
    ///
    /// # Errors
    /// Returns `NotConfigured` if no access or refresh token is stored.
    pub fn new(ctx: BackendContext) -> Result<Self> {
        let auth = match ctx.optional_secret("access_token") {
            Some(token) => GoogleAuth::Static(token),
            None => GoogleAuth::Refresh {
                refresh_token: ctx.require_secret(&["refresh_token"])?,
                client_id: ctx.require_secret(&["client_id"])?,
                client_secret: ctx.require_secret(&["client_secret"])?,
            },
        };
        let calendar_id = ctx
            .credential
            .calendar_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_CALENDAR)
            .to_string();
        let api_base = ctx.base_url(GOOGLE_CALENDAR_API_BASE);
        let token_url = match &ctx.base_override {
            Some(_) => format!("{api_base}/token"),
            None => GOOGLE_TOKEN_URL.to_string(),
        };
        Ok(Self { ctx, api_base, token_url, calendar_id, auth })
    }

    async fn access_token(&self) -> Result<String> {
        let (refresh_token, client_id, client_secret) = match &self.auth {
            GoogleAuth::Static(token) => return Ok(token.clone()),
            GoogleAuth::Refresh { refresh_token, client_id, client_secret } => {
                (refresh_token, client_id, client_secret)
            }
        };
        if let Some(token) = self.ctx.tokens.get(self.ctx.tenant_id(), BackendKind::Google) {
            return Ok(token);
        }

        debug!("refreshing Google access token");
        let builder = self.ctx.http.request(Method::POST, &self.token_url).form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ]);
        let token: TokenResponse = self.ctx.http.send_json(BackendKind::Google, builder).await.map_err(|err| {
            match err {
                // invalid_grant arrives as 400
                BooklineError::Validation(msg) => BooklineError::Auth(msg),
                other => other,
            }
        })?;
        self.ctx.tokens.store(self.ctx.tenant_id(), BackendKind::Google, &token.access_token, token.expires_in);
        Ok(token.access_token)
    }

    /// URL under the API base with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|err| BooklineError::Config(format!("invalid Google Calendar base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| BooklineError::Config("Google Calendar base url cannot take a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(self.ctx.http.request(method, self.url(segments)?).bearer_auth(token))
    }

    fn translate(&self, event: GoogleEvent) -> Option<Result<RemoteAppointment>> {
        // All-day events have only `date`; they are not appointments.
        let raw_start = event.start.as_ref()?.date_time.clone()?;
        Some(self.translate_timed(event, &raw_start))
    }

    fn translate_timed(&self, event: GoogleEvent, raw_start: &str) -> Result<RemoteAppointment> {
        let start = parse_instant(raw_start)?;
        let end = event.end.and_then(|end| end.date_time).map(|raw| parse_instant(&raw)).transpose()?;
        let local = to_local(self.ctx.timezone, start);
        let (purpose, customer) = split_title(event.summary.as_deref().unwrap_or_default());

        Ok(RemoteAppointment {
            external_id: event.id,
            date: local.date(),
            time: local.time(),
            duration_minutes: end
                .map(|end| duration_minutes(start, end, DEFAULT_SLOT_MINUTES))
                .unwrap_or(DEFAULT_SLOT_MINUTES),
            purpose: purpose_or_default(purpose),
            status: google_status(event.status.as_deref().unwrap_or_default()),
            customer,
        })
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendarBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Google
    }

    async fn list_available_slots(&self, _date: NaiveDate) -> Result<Vec<NaiveTime>> {
        Err(BooklineError::NotConfigured("Google Calendar does not publish bookable slots".into()))
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_busy_intervals(&self, date: NaiveDate) -> Result<Vec<BusyInterval>> {
        let (start, end) = day_bounds(self.ctx.timezone, date)?;
        let body = json!({
            "timeMin": to_zulu_string(start),
            "timeMax": to_zulu_string(end),
            "timeZone": self.ctx.timezone.name(),
            "items": [{ "id": self.calendar_id }],
        });
        let builder = self.request(Method::POST, &["freeBusy"]).await?.json(&body);
        let response: FreeBusyResponse = self.ctx.http.send_json(BackendKind::Google, builder).await?;

        let calendar = response.calendars.get(&self.calendar_id).ok_or_else(|| {
            BooklineError::RemoteUnavailable(format!("free/busy response omitted calendar {}", self.calendar_id))
        })?;
        if let Some(error) = calendar.errors.first() {
            return Err(BooklineError::RemoteUnavailable(format!(
                "free/busy failed for calendar {}: {}",
                self.calendar_id, error.reason
            )));
        }

        calendar
            .busy
            .iter()
            .map(|window| {
                Ok(BusyInterval::new(
                    to_local(self.ctx.timezone, parse_instant(&window.start)?),
                    to_local(self.ctx.timezone, parse_instant(&window.end)?),
                ))
            })
            .collect()
    }

    async fn find_or_create_customer(&self, customer: &CustomerInfo) -> Result<RemoteCustomer> {
        Ok(RemoteCustomer { id: format!("local:{}", customer.phone_digits()) })
    }

    #[instrument(skip(self, _customer, draft), fields(tenant = %self.ctx.tenant_id(), date = %draft.date, time = %draft.time))]
    async fn create_appointment(&self, _customer: &RemoteCustomer, draft: &AppointmentDraft) -> Result<String> {
        let start = to_utc(self.ctx.timezone, draft.date, draft.time)?;
        let end = start + Duration::minutes(i64::from(draft.duration_minutes));
        let mut description = format!("Phone: {}", draft.customer.phone);
        if let Some(notes) = draft.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
            description = format!("{}\n\n{description}", notes.trim());
        }
        let body = json!({
            "summary": draft.title,
            "description": description,
            "start": { "dateTime": to_zulu_string(start), "timeZone": self.ctx.timezone.name() },
            "end": { "dateTime": to_zulu_string(end), "timeZone": self.ctx.timezone.name() },
        });
        let builder = self.request(Method::POST, &["calendars", &self.calendar_id, "events"]).await?.json(&body);
        let created: GoogleEvent = self.ctx.http.send_json(BackendKind::Google, builder).await?;
        Ok(created.id)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_appointments(&self, range: DateRange) -> Result<Vec<RemoteAppointment>> {
        let (start, end) = range_bounds(self.ctx.timezone, range)?;
        let mut appointments = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![
                ("timeMin", to_zulu_string(start)),
                ("timeMax", to_zulu_string(end)),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("showDeleted", "true".to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let builder =
                self.request(Method::GET, &["calendars", &self.calendar_id, "events"]).await?.query(&query);
            let page: GoogleEventList = self.ctx.http.send_json(BackendKind::Google, builder).await?;

            for event in page.items {
                let id = event.id.clone();
                match self.translate(event) {
                    Some(Ok(appointment)) if range.contains(appointment.date) => appointments.push(appointment),
                    Some(Ok(_)) | None => {}
                    Some(Err(err)) => warn!(external_id = %id, error = %err, "skipping Google event"),
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(appointments)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn cancel_appointment(&self, external_id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &["calendars", &self.calendar_id, "events", external_id]).await?;
        let response = self.ctx.http.send(builder).await?;
        let status = response.status();
        // 410 Gone: already deleted.
        if status.is_success() || status == StatusCode::GONE {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(BackendKind::Google, status, &body))
    }
}

/// Google event status to the canonical status.
#[must_use]
pub fn google_status(raw: &str) -> AppointmentStatus {
    match raw {
        "cancelled" => AppointmentStatus::Cancelled,
        "tentative" => AppointmentStatus::Scheduled,
        _ => AppointmentStatus::Confirmed,
    }
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<FreeBusyWindow>,
    #[serde(default)]
    errors: Vec<FreeBusyError>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyWindow {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyError {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<GoogleEventTime>,
    #[serde(default)]
    end: Option<GoogleEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    #[serde(default)]
    date_time: Option<String>,
}
