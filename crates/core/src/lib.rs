//! # Bookline Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage and remote calendars
//! - Availability aggregation, booking orchestration, and reconciliation
//! - The `SchedulingService` facade used by booking front-ends
//!
//! ## Architecture Principles
//! - Only depends on `bookline-domain` and `bookline-common`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod scheduling;

// Re-export specific items to avoid ambiguity
pub use scheduling::ports::{
    AppointmentRepository, BackendFactory, CalendarBackend, CredentialStore, TenantRepository,
};
pub use scheduling::{
    AvailabilityAggregator, BookingOrchestrator, CodeGenerator, ConfigResolver, DashboardService,
    RandomCodeGenerator, ReconciliationSync, RemoteCallPolicy, SchedulingService,
};
