//! # Bookline Infrastructure
//!
//! Infrastructure implementations of the scheduling ports.
//!
//! This crate contains:
//! - SQLite repositories for tenants, credentials, and appointments
//! - HTTP adapters for the supported calendar backends
//! - Configuration loading and tracing setup
//! - [`BooklineContext`], which wires everything behind `SchedulingService`
//!
//! ## Architecture
//! - Implements traits defined in `bookline-core`
//! - Depends on `bookline-common` and `bookline-domain`
//! - Contains all "impure" code (I/O, network, clock)

pub mod bootstrap;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

pub use bootstrap::BooklineContext;
pub use database::{DbManager, SqliteAppointmentRepository, SqliteTenantRepository};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::HttpBackendFactory;
