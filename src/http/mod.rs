//! HTTP client module with retry logic and error normalization.

mod client;
mod retry;
mod transport;

pub use client::{ApiClient, ReadOptions, WriteOptions, query_pairs};
pub use retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRYABLE_STATUS_CODES, GiveUp, RetryConfig, RetryDecision,
    RetryOverrides, RetryState, is_idempotent,
};
#[cfg(test)]
pub use transport::MockTransport;
pub use transport::{ApiRequest, REQUEST_ID_HEADER, ReqwestTransport, Transport};
