//! Vagaro salon and spa adapter
//!
//! Authenticates with the client-credentials grant against the merchant's
//! regional host and caches the token per tenant. Every response wraps its
//! payload in a `data` field. Dates and times are exchanged as local
//! wall-clock strings, so no timezone conversion is needed.

use std::fmt;

use async_trait::async_trait;
use bookline_core::CalendarBackend;
use bookline_domain::constants::DEFAULT_SLOT_MINUTES;
use bookline_domain::{
    parse_date, parse_time, AppointmentDraft, AppointmentStatus, BackendKind, BooklineError,
    BusyInterval, CustomerInfo, DateRange, RemoteAppointment, RemoteCustomer, Result,
};
use chrono::{NaiveDate, NaiveTime};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::auth::TokenResponse;
use super::time::{parse_instant, to_local};
use super::{busy_from_appointments, purpose_or_default, split_name, BackendContext};

const VAGARO_REGIONS: [&str; 5] = ["us01", "us02", "us03", "us04", "us05"];
const DEFAULT_REGION: &str = "us01";
const TOKEN_SCOPE: &str =
    "business:read business:write appointment:read appointment:write customer:read customer:write";

/// Vagaro adapter bound to one merchant.
pub struct VagaroBackend {
    ctx: BackendContext,
    base_url: String,
    client_id: String,
    client_secret: String,
    merchant_id: String,
    service_id: Option<String>,
}

impl VagaroBackend {
    /// Adapter for one tenant's Vagaro business.
    ///
    /// # Errors
    /// Returns `NotConfigured` if the client id or secret is missing.
    pub fn new(ctx: BackendContext) -> Result<Self> {
        let client_id = ctx.require_secret(&["client_id", "clientId"])?;
        let client_secret = ctx.require_secret(&["client_secret", "clientSecretKey"])?;
        let merchant_id = ctx.require_secret(&["merchant_id", "merchantId"])?;
        let service_id = ctx.optional_secret("service_id");
        let region = ctx
            .optional_secret("region")
            .map(|region| region.to_ascii_lowercase())
            .filter(|region| VAGARO_REGIONS.contains(&region.as_str()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let base_url = ctx.base_url(&format!("https://{region}-api.vagaro.com/v1"));
        Ok(Self { ctx, base_url, client_id, client_secret, merchant_id, service_id })
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.ctx.tokens.get(self.ctx.tenant_id(), BackendKind::Vagaro) {
            return Ok(token);
        }

        debug!(merchant = %self.merchant_id, "requesting Vagaro access token");
        let body = json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "scope": TOKEN_SCOPE,
            "grant_type": "client_credentials",
        });
        let builder = self.ctx.http.request(Method::POST, format!("{}/oauth/token", self.base_url)).json(&body);
        let token: TokenResponse = self.ctx.http.send_json(BackendKind::Vagaro, builder).await.map_err(|err| {
            match err {
                BooklineError::Validation(msg) | BooklineError::NotFound(msg) => BooklineError::Auth(msg),
                other => other,
            }
        })?;
        self.ctx.tokens.store(self.ctx.tenant_id(), BackendKind::Vagaro, &token.access_token, token.expires_in);
        Ok(token.access_token)
    }

    /// Authenticated call returning the `data` payload. A rejected token is
    /// dropped and the request repeated once with a fresh one.
    async fn call<T, F>(&self, method: Method, path: &str, configure: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let build = |token: &str| configure(self.ctx.http.request(method.clone(), &url).bearer_auth(token));

        let token = self.access_token().await?;
        let first = self.ctx.http.send_json::<Option<Envelope<T>>>(BackendKind::Vagaro, build(&token)).await;
        let envelope = match first {
            Err(BooklineError::Auth(msg)) => {
                warn!(error = %msg, "Vagaro rejected cached token; refreshing");
                self.ctx.tokens.invalidate(self.ctx.tenant_id(), BackendKind::Vagaro);
                let token = self.access_token().await?;
                self.ctx.http.send_json::<Option<Envelope<T>>>(BackendKind::Vagaro, build(&token)).await?
            }
            other => other?,
        };
        Ok(envelope.and_then(|envelope| envelope.data))
    }

    fn translate(&self, item: VagaroAppointment) -> Result<RemoteAppointment> {
        let (date, time) = match (&item.date, &item.time) {
            (Some(date), Some(time)) => (parse_date(date)?, parse_time(time)?),
            _ => {
                let raw = item
                    .start_time
                    .as_deref()
                    .ok_or_else(|| BooklineError::RemoteUnavailable("appointment has no start".into()))?;
                let local = to_local(self.ctx.timezone, parse_instant(raw)?);
                (local.date(), local.time())
            }
        };
        let customer = item.customer.map(VagaroCustomer::into_info).unwrap_or_default();

        Ok(RemoteAppointment {
            external_id: item.id.to_string(),
            date,
            time,
            duration_minutes: item.duration.filter(|minutes| *minutes > 0).unwrap_or(DEFAULT_SLOT_MINUTES),
            purpose: purpose_or_default(item.service.and_then(|service| service.name)),
            status: vagaro_status(item.status.as_deref().unwrap_or_default()),
            customer,
        })
    }
}

#[async_trait]
impl CalendarBackend for VagaroBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vagaro
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_available_slots(&self, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let service_id = self.service_id.clone().ok_or_else(|| {
            BooklineError::NotConfigured("Vagaro availability requires a `service_id` secret".into())
        })?;
        let day = date.format("%Y-%m-%d").to_string();
        let slots: Vec<Value> = self
            .call(Method::GET, "/appointments/availability", |builder| {
                builder.query(&[("serviceId", service_id.as_str()), ("date", day.as_str())])
            })
            .await?
            .unwrap_or_default();

        let mut times: Vec<NaiveTime> = slots
            .iter()
            .filter_map(|slot| match self.slot_time(slot, date) {
                Ok(time) => time,
                Err(err) => {
                    warn!(slot = %slot, error = %err, "skipping unparseable Vagaro slot");
                    None
                }
            })
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
        let phone = customer.phone_digits();
        let found: Vec<VagaroCustomer> = self
            .call(Method::GET, "/customers/search", |builder| builder.query(&[("phone", phone.as_str())]))
            .await?
            .unwrap_or_default();
        if let Some(existing) = found.into_iter().next() {
            return Ok(RemoteCustomer { id: existing.id.to_string() });
        }

        let (first_name, last_name) = split_name(&customer.name);
        let body = json!({
            "merchantId": self.merchant_id,
            "firstName": first_name,
            "lastName": last_name,
            "phone": customer.phone,
            "email": customer.email,
        });
        let created: VagaroCustomer = self
            .call(Method::POST, "/customers", |builder| builder.json(&body))
            .await?
            .ok_or_else(|| BooklineError::RemoteUnavailable("Vagaro did not return the created customer".into()))?;
        Ok(RemoteCustomer { id: created.id.to_string() })
    }

    #[instrument(skip(self, customer, draft), fields(tenant = %self.ctx.tenant_id(), date = %draft.date, time = %draft.time))]
    async fn create_appointment(&self, customer: &RemoteCustomer, draft: &AppointmentDraft) -> Result<String> {
        let body = json!({
            "merchantId": self.merchant_id,
            "customerId": customer.id,
            "serviceId": self.service_id,
            "date": draft.date.format("%Y-%m-%d").to_string(),
            "time": draft.time.format("%H:%M").to_string(),
            "duration": draft.duration_minutes,
            "title": draft.title,
            "notes": draft.notes.clone().unwrap_or_default(),
        });
        let created: VagaroAppointment = self
            .call(Method::POST, "/appointments", |builder| builder.json(&body))
            .await?
            .ok_or_else(|| BooklineError::RemoteUnavailable("Vagaro did not return the created appointment".into()))?;
        Ok(created.id.to_string())
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn list_appointments(&self, range: DateRange) -> Result<Vec<RemoteAppointment>> {
        let start = range.start.format("%Y-%m-%d").to_string();
        let end = range.end.format("%Y-%m-%d").to_string();
        let items: Vec<VagaroAppointment> = self
            .call(Method::GET, "/appointments", |builder| {
                builder.query(&[("startDate", start.as_str()), ("endDate", end.as_str())])
            })
            .await?
            .unwrap_or_default();

        let mut appointments = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.to_string();
            match self.translate(item) {
                Ok(appointment) if range.contains(appointment.date) => appointments.push(appointment),
                Ok(_) => {}
                Err(err) => warn!(external_id = %id, error = %err, "skipping Vagaro appointment"),
            }
        }
        Ok(appointments)
    }

    #[instrument(skip(self), fields(tenant = %self.ctx.tenant_id()))]
    async fn cancel_appointment(&self, external_id: &str) -> Result<()> {
        let path = format!("/appointments/{external_id}/cancel");
        let _: Option<Value> = self.call(Method::POST, &path, |builder| builder).await?;
        Ok(())
    }
}

impl VagaroBackend {
    /// Local start time of one availability entry, when it falls on `date`.
    fn slot_time(&self, slot: &Value, date: NaiveDate) -> Result<Option<NaiveTime>> {
        let raw = match slot {
            Value::String(raw) => raw.as_str(),
            Value::Object(fields) => match ["time", "startTime", "start"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
            {
                Some(raw) => raw,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        if raw.contains('T') {
            let local = to_local(self.ctx.timezone, parse_instant(raw)?);
            return Ok((local.date() == date).then(|| local.time()));
        }
        parse_time(raw).map(Some)
    }
}

/// Vagaro appointment status to the canonical status.
#[must_use]
pub fn vagaro_status(raw: &str) -> AppointmentStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "confirmed" => AppointmentStatus::Confirmed,
        "completed" => AppointmentStatus::Completed,
        "cancelled" | "canceled" => AppointmentStatus::Cancelled,
        "no_show" | "noshow" | "no-show" => AppointmentStatus::NoShow,
        _ => AppointmentStatus::Scheduled,
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Option::default")]
    data: Option<T>,
}

/// Vagaro ids arrive as strings or numbers depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum VagaroId {
    Text(String),
    Number(i64),
}

impl fmt::Display for VagaroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(id) => f.write_str(id),
            Self::Number(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VagaroCustomer {
    id: VagaroId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl VagaroCustomer {
    fn into_info(self) -> CustomerInfo {
        let name = self.name.filter(|name| !name.trim().is_empty()).unwrap_or_else(|| {
            [self.first_name.as_deref(), self.last_name.as_deref()]
                .into_iter()
                .flatten()
                .filter(|part| !part.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        });
        CustomerInfo { name, phone: self.phone.unwrap_or_default(), email: self.email }
    }
}

#[derive(Debug, Deserialize)]
struct VagaroService {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VagaroAppointment {
    id: VagaroId,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    service: Option<VagaroService>,
    #[serde(default)]
    customer: Option<VagaroCustomer>,
}
