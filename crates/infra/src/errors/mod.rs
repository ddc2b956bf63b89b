//! Infrastructure error handling
//!
//! Driver and transport errors are translated into [`BooklineError`]
//! (re-exported from the domain crate) at the infrastructure boundary.

mod conversions;

pub use bookline_domain::BooklineError;
pub use conversions::{status_error, InfraError};
