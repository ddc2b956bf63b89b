//! SQLite persistence

pub mod appointment_repository;
pub mod manager;
pub mod tenant_repository;

pub use appointment_repository::SqliteAppointmentRepository;
pub use manager::DbManager;
pub use tenant_repository::SqliteTenantRepository;
