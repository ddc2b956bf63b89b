//! External service integrations
//!
//! Remote calendar backends are the only integrations: see [`backends`].

pub mod backends;

pub use backends::{BackendContext, HttpBackendFactory, TokenCache};
