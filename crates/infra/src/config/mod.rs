//! Configuration loading
//!
//! Application configuration comes from environment variables or a JSON/TOML
//! file. Tenant booking settings live in the database instead.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, find_config_path};
