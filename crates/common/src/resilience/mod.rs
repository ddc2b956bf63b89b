//! Resilience patterns for transient failures
//!
//! Provides a generic retry executor with configurable backoff and jitter.
//! The executor is generic over the error type and hands the last error back
//! to the caller, so domain code can keep its own error taxonomy.

pub mod retry;

pub use retry::{
    Backoff, Jitter, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
