//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Confirmation codes
pub const CONFIRMATION_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CONFIRMATION_CODE_LENGTH: usize = 6;
pub const CONFIRMATION_CODE_MAX_ATTEMPTS: usize = 5;

// Scheduling defaults
pub const DEFAULT_SLOT_MINUTES: u32 = 30;
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_PURPOSE: &str = "General consultation";

// Dashboard
pub const DEFAULT_DASHBOARD_DAYS: u32 = 14;
pub const MAX_DASHBOARD_DAYS: u32 = 90;

// Customers
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "voice.booking";
pub const MAX_CUSTOMER_NAME_LENGTH: usize = 100;
