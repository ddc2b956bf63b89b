//! Domain types and models

pub mod appointment;
pub mod availability;
pub mod backend;
pub mod booking;
pub mod dashboard;
pub mod sync;
pub mod tenant;

pub use appointment::{
    Appointment, AppointmentId, AppointmentSource, AppointmentStatus, CustomerInfo,
    DepositStatus, ExternalIds, NewAppointment, SourceBadge, SyncedFields,
};
pub use availability::{
    format_date_display, format_time_display, parse_date, parse_time, AvailabilityMode,
    AvailabilityReport, BusyInterval, Slot, SlotSource,
};
pub use backend::{BackendCredential, BackendKind};
pub use booking::{
    AppointmentDraft, BookingConfirmation, BookingRequest, RemoteAppointment, RemoteCustomer,
};
pub use dashboard::{DashboardEntry, DashboardQuery, DashboardView};
pub use sync::{DateRange, SyncConflict, SyncFailure, SyncReport};
pub use tenant::{
    BookingConfig, BusinessHours, ConfigSource, DayHours, DepositPolicy, SystemOfRecord, Tenant,
    TenantId,
};
