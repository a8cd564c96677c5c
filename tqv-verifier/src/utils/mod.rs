//! Utility modules for tqv-verifier

pub mod retry;

pub use retry::{retry_with_backoff, retry_with_backoff_if, RetryPolicy};
