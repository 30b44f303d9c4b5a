//! Retry policy for idempotent requests with exponential backoff.

use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::error::HttpFailure;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Default upper bound on any single delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Server errors that are worth retrying by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 4] = [500, 502, 503, 504];

/// Retry policy for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry `retry_index` (0-based):
    /// `ceil(min(initial_delay * backoff_multiplier^i, max_delay))` ms.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let initial = self.initial_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);

        // f64::min returns `max` when the product is NaN
        let millis = (initial * self.backoff_multiplier.powi(exponent))
            .min(max)
            .max(0.0)
            .ceil();
        Duration::from_millis(millis as u64)
    }

    /// Network failures (status 0) are always retryable; HTTP failures only
    /// when their status is listed. Requests that were never sent are not.
    pub fn is_retryable(&self, failure: &HttpFailure) -> bool {
        if failure.local {
            return false;
        }
        failure.is_network() || self.retryable_status_codes.contains(&failure.status)
    }

    /// Applies per-call overrides on top of this policy.
    pub fn merge(&self, overrides: &RetryOverrides) -> RetryConfig {
        RetryConfig {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            initial_delay: overrides
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.initial_delay),
            max_delay: overrides
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.max_delay),
            backoff_multiplier: overrides
                .backoff_multiplier
                .unwrap_or(self.backoff_multiplier),
            retryable_status_codes: overrides
                .retryable_status_codes
                .as_ref()
                .map(|codes| codes.iter().copied().collect())
                .unwrap_or_else(|| self.retryable_status_codes.clone()),
        }
    }
}

/// Partial retry policy supplied per call. Unset fields keep the client
/// default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOverrides {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub retryable_status_codes: Option<Vec<u16>>,
}

impl RetryOverrides {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn initial_delay_ms(mut self, millis: u64) -> Self {
        self.initial_delay_ms = Some(millis);
        self
    }

    pub fn max_delay_ms(mut self, millis: u64) -> Self {
        self.max_delay_ms = Some(millis);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = Some(codes.into_iter().collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == RetryOverrides::default()
    }
}

/// Only reads are safe to repeat.
pub fn is_idempotent(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Why a request stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUp {
    /// Writes are attempted exactly once.
    NotIdempotent,
    /// The failure status is not in the retryable set.
    NotRetryable,
    /// All retries were used.
    Exhausted,
}

impl fmt::Display for GiveUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUp::NotIdempotent => write!(f, "request is not idempotent"),
            GiveUp::NotRetryable => write!(f, "failure is not retryable"),
            GiveUp::Exhausted => write!(f, "retries exhausted"),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make retry number `attempt` (1-based).
    Retry { attempt: u32, delay: Duration },
    GiveUp(GiveUp),
}

/// Retry bookkeeping owned by a single request.
///
/// A request is attempted, and on failure either waits and is attempted
/// again or fails for good; success ends the loop. Writes carry no policy
/// and therefore never wait.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: Option<RetryConfig>,
    retries: u32,
}

impl RetryState {
    pub fn new(method: &Method, policy: RetryConfig) -> Self {
        Self {
            policy: is_idempotent(method).then_some(policy),
            retries: 0,
        }
    }

    /// A state that never retries.
    pub fn once() -> Self {
        Self {
            policy: None,
            retries: 0,
        }
    }

    /// Attempts made so far, counting the one in flight.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    pub fn max_retries(&self) -> u32 {
        self.policy.as_ref().map_or(0, |p| p.max_retries)
    }

    pub fn on_failure(&mut self, failure: &HttpFailure) -> RetryDecision {
        let Some(policy) = &self.policy else {
            return RetryDecision::GiveUp(GiveUp::NotIdempotent);
        };
        if !policy.is_retryable(failure) {
            return RetryDecision::GiveUp(GiveUp::NotRetryable);
        }
        if self.retries >= policy.max_retries {
            return RetryDecision::GiveUp(GiveUp::Exhausted);
        }

        let delay = policy.delay_for(self.retries);
        self.retries += 1;
        RetryDecision::Retry {
            attempt: self.retries,
            delay,
        }
    }
}
