//! Call policy around the model endpoint.
//!
//! - [`retry`]: exponential backoff for transient failures (429, 5xx,
//!   transport errors). Disabled by default so a failed model call surfaces
//!   to the caller on the first attempt.

pub mod retry;

pub use retry::{RetryConfig, retry_api_call};
