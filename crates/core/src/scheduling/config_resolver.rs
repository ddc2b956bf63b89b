//! Tenant configuration resolution
//!
//! Turns a stored tenant plus its credentials into one validated
//! [`BookingConfig`]. Precedence for the system of record: explicit tenant
//! setting, then inference from which credentials exist, then local-only.

use std::sync::Arc;

use bookline_domain::{
    BackendCredential, BackendKind, BookingConfig, BooklineError, ConfigSource, Result,
    SystemOfRecord, Tenant, TenantId,
};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use super::ports::{CredentialStore, TenantRepository};

/// Backends that can act as system of record, in inference priority order.
const RECORD_CANDIDATES: [BackendKind; 3] = [BackendKind::HubSpot, BackendKind::Ghl, BackendKind::Vagaro];

/// Calendar-only backends inferred as busy sources.
const SHADOW_CANDIDATES: [BackendKind; 2] = [BackendKind::Zoho, BackendKind::Google];

const MIN_SLOT_MINUTES: u32 = 5;
const MAX_SLOT_MINUTES: u32 = 240;

pub struct ConfigResolver {
    tenants: Arc<dyn TenantRepository>,
    credentials: Arc<dyn CredentialStore>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(tenants: Arc<dyn TenantRepository>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { tenants, credentials }
    }

    /// Resolve the booking configuration for `tenant_id`. Pure read.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown tenant and `Validation` for an
    /// inconsistent configuration.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn get_booking_config(&self, tenant_id: &TenantId) -> Result<BookingConfig> {
        let tenant = self
            .tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| BooklineError::NotFound(format!("tenant {tenant_id}")))?;
        let credentials = self.credentials.credentials_for(tenant_id).await?;

        let config = resolve(tenant, credentials)?;
        debug!(
            system = %config.system_of_record,
            source = ?config.system_source,
            shadows = ?config.shadows,
            "booking config resolved"
        );
        Ok(config)
    }
}

/// Validate and combine a tenant record with its credentials.
///
/// # Errors
/// Returns `Validation` if the slot length, timezone, or business hours
/// are invalid.
pub fn resolve(tenant: Tenant, credentials: Vec<BackendCredential>) -> Result<BookingConfig> {
    let timezone: Tz = tenant.timezone.parse().map_err(|_| {
        BooklineError::Config(format!("tenant {} has unknown timezone {}", tenant.id, tenant.timezone))
    })?;
    tenant.hours.validate()?;
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&tenant.slot_minutes) {
        return Err(BooklineError::Config(format!(
            "slot length {} is outside {MIN_SLOT_MINUTES}..={MAX_SLOT_MINUTES} minutes",
            tenant.slot_minutes
        )));
    }
    if tenant.deposit.required && tenant.deposit.amount_cents.is_some_and(|amount| amount < 0) {
        return Err(BooklineError::Config("deposit amount cannot be negative".to_string()));
    }

    let (system_of_record, system_source) = match tenant.booking_system {
        Some(explicit) => (explicit, ConfigSource::Explicit),
        None => RECORD_CANDIDATES
            .iter()
            .find(|kind| is_usable(&credentials, **kind))
            .map(|kind| (SystemOfRecord::Remote(*kind), ConfigSource::Inferred))
            .unwrap_or((SystemOfRecord::Local, ConfigSource::Default)),
    };

    let record = system_of_record.remote();
    let shadow_pool: Vec<BackendKind> = if tenant.shadow_backends.is_empty() {
        SHADOW_CANDIDATES.iter().copied().filter(|kind| is_usable(&credentials, *kind)).collect()
    } else {
        tenant.shadow_backends.clone()
    };
    let mut shadows: Vec<BackendKind> = Vec::new();
    for kind in shadow_pool {
        if Some(kind) != record && !shadows.contains(&kind) {
            shadows.push(kind);
        }
    }

    let credentials = credentials
        .into_iter()
        .filter(|credential| Some(credential.kind) == record || shadows.contains(&credential.kind))
        .collect();

    Ok(BookingConfig {
        tenant_id: tenant.id,
        business_name: tenant.business_name,
        timezone,
        hours: tenant.hours,
        slot_minutes: tenant.slot_minutes,
        system_of_record,
        system_source,
        shadows,
        credentials,
        deposit: tenant.deposit,
    })
}

/// A credential counts toward inference when it carries at least one secret.
/// GoHighLevel additionally needs the calendar to book against.
fn is_usable(credentials: &[BackendCredential], kind: BackendKind) -> bool {
    credentials.iter().any(|credential| {
        credential.kind == kind
            && credential.secrets.values().any(|value| !value.trim().is_empty())
            && (kind != BackendKind::Ghl
                || credential.calendar_id.as_deref().is_some_and(|id| !id.trim().is_empty()))
    })
}
