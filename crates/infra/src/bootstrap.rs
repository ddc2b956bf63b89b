//! Wiring of the concrete adapters behind the scheduling service

use std::sync::Arc;
use std::time::Duration;

use bookline_core::{RemoteCallPolicy, SchedulingService};
use bookline_domain::{Config, Result};
use tracing::info;

use crate::database::{DbManager, SqliteAppointmentRepository, SqliteTenantRepository};
use crate::integrations::HttpBackendFactory;

/// Fully wired application context.
///
/// Owns the database pool and exposes the scheduling service together with
/// the tenant repository used for onboarding and credential management.
pub struct BooklineContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub tenants: Arc<SqliteTenantRepository>,
    pub appointments: Arc<SqliteAppointmentRepository>,
    pub backends: Arc<HttpBackendFactory>,
    pub scheduling: Arc<SchedulingService>,
}

impl BooklineContext {
    /// Load configuration from the environment or a config file, install the
    /// tracing subscriber, and build.
    ///
    /// # Errors
    /// Returns `Config` if no configuration source loads, and any error from
    /// [`Self::from_config`].
    pub fn new() -> Result<Self> {
        let config = crate::config::load()?;
        crate::observability::init_tracing(&config.logging)?;
        Self::from_config(config)
    }

    /// Open the database, apply the schema, and wire every port.
    ///
    /// # Errors
    /// Returns `Database` if the database cannot be opened or migrated, and
    /// `Config` for an invalid backend URL override.
    pub fn from_config(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let tenants = Arc::new(SqliteTenantRepository::new(Arc::clone(&db)));
        let appointments = Arc::new(SqliteAppointmentRepository::new(Arc::clone(&db)));
        let backends = Arc::new(HttpBackendFactory::new(&config.http)?);

        let policy = RemoteCallPolicy::new(Duration::from_secs(config.http.timeout_secs), &config.retry);
        let scheduling = Arc::new(
            SchedulingService::new(
                tenants.clone(),
                tenants.clone(),
                appointments.clone(),
                backends.clone(),
            )
            .with_policy(policy),
        );

        info!(
            db_path = %db.path().display(),
            http_timeout_secs = config.http.timeout_secs,
            read_attempts = config.retry.max_attempts,
            "bookline context ready"
        );

        Ok(Self { config, db, tenants, appointments, backends, scheduling })
    }
}
