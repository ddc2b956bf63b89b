//! Scheduling: availability, booking, reconciliation, and dashboards

pub mod availability;
pub mod booking;
pub mod codes;
pub mod config_resolver;
pub mod dashboard;
pub mod ports;
pub mod remote;
pub mod service;
pub mod slots;
pub mod sync;

pub use availability::AvailabilityAggregator;
pub use booking::BookingOrchestrator;
pub use codes::{CodeGenerator, RandomCodeGenerator};
pub use config_resolver::ConfigResolver;
pub use dashboard::DashboardService;
pub use remote::RemoteCallPolicy;
pub use service::SchedulingService;
pub use sync::ReconciliationSync;
