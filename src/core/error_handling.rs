//! Error classification and retry machinery for transcript fetches
//!
//! YouTube rate-limits aggressively, so every fetch goes through a
//! [`RetryExecutor`]: retryable failures back off exponentially with jitter,
//! permanent ones (captions disabled, video gone) fail on the first attempt,
//! and a per-category [`CircuitBreaker`] stops a batch from hammering a
//! service that is already refusing requests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Maximum retry attempts allowed
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Maximum delay cap for exponential backoff
pub const MAX_DELAY_CAP: Duration = Duration::from_secs(30);

/// Circuit breaker failure threshold
pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Circuit breaker recovery timeout
pub const CIRCUIT_BREAKER_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Error categories for fetch failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// DNS, connection and timeout failures
    Network,
    /// The video or its captions cannot be served (disabled, removed, private)
    Unavailable,
    /// Rate limiting, IP blocks, upstream server errors
    ExternalService,
    /// Pages or responses that could not be understood
    Parsing,
}

/// Classified fetch failure
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum FetchError {
    #[error("Network error: {message}")]
    Network { message: String, is_retryable: bool },

    #[error("Transcript unavailable for {video_id}: {message}")]
    Unavailable { video_id: String, message: String },

    #[error("External service error ({service}): {message}")]
    ExternalService {
        message: String,
        service: String,
        is_retryable: bool,
        backoff_multiplier: f64,
    },

    #[error("Parsing error: {message}")]
    Parsing { message: String, is_retryable: bool },

    /// Rejected without an attempt because the breaker for `category` is open
    #[error("Circuit breaker open for {category:?}, retry in {retry_after_ms} ms")]
    CircuitOpen {
        category: ErrorCategory,
        retry_after_ms: u64,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { is_retryable, .. } => *is_retryable,
            Self::Unavailable { .. } => false,
            Self::ExternalService { is_retryable, .. } => *is_retryable,
            Self::Parsing { is_retryable, .. } => *is_retryable,
            Self::CircuitOpen { .. } => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } => ErrorCategory::Network,
            Self::Unavailable { .. } => ErrorCategory::Unavailable,
            Self::ExternalService { .. } => ErrorCategory::ExternalService,
            Self::Parsing { .. } => ErrorCategory::Parsing,
            Self::CircuitOpen { category, .. } => *category,
        }
    }

    pub fn backoff_multiplier(&self) -> f64 {
        match self {
            Self::ExternalService {
                backoff_multiplier, ..
            } => *backoff_multiplier,
            _ => 2.0,
        }
    }
}

/// Retry strategy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Used when the error does not carry its own multiplier
    pub backoff_multiplier: f64,
    pub jitter_enabled: bool,
    /// Jitter spread as a fraction of the delay (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Open a circuit breaker per category after repeated failures
    pub circuit_breaker_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: MAX_DELAY_CAP,
            backoff_multiplier: 2.0,
            jitter_enabled: true,
            jitter_factor: 0.1,
            circuit_breaker_enabled: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with `retry_attempts` retries after the first attempt
    pub fn with_retries(retry_attempts: u32) -> Self {
        Self {
            max_attempts: retry_attempts.saturating_add(1).min(MAX_RETRY_ATTEMPTS),
            ..Self::default()
        }
    }
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    /// Successes needed to close again from half-open
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            success_threshold: 2,
            recovery_timeout: CIRCUIT_BREAKER_RECOVERY_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct BreakerCounters {
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker for one error category
#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<CircuitBreakerState>,
    counters: Mutex<BreakerCounters>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(CircuitBreakerState::Closed),
            counters: Mutex::new(BreakerCounters {
                failures: 0,
                successes: 0,
                last_failure: None,
            }),
            config,
        }
    }

    /// Whether a call may go through right now.
    ///
    /// An open breaker moves to half-open once the recovery timeout elapsed.
    pub async fn allows_call(&self) -> bool {
        // Lock order is always state, then counters
        let mut state = self.state.write().await;
        if *state != CircuitBreakerState::Open {
            return true;
        }

        let mut counters = self.counters.lock().await;
        let recovered = counters
            .last_failure
            .map(|t| t.elapsed() >= self.config.recovery_timeout)
            .unwrap_or(true);
        if recovered {
            counters.successes = 0;
            *state = CircuitBreakerState::HalfOpen;
            info!("Circuit breaker transitioning to half-open state");
        }
        recovered
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        let mut counters = self.counters.lock().await;
        match *state {
            CircuitBreakerState::HalfOpen => {
                counters.successes += 1;
                if counters.successes >= self.config.success_threshold {
                    *state = CircuitBreakerState::Closed;
                    counters.failures = 0;
                    info!("Circuit breaker closed after recovery");
                }
            }
            CircuitBreakerState::Closed => counters.failures = 0,
            CircuitBreakerState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        let mut counters = self.counters.lock().await;
        counters.failures += 1;
        counters.last_failure = Some(Instant::now());

        let should_open = *state == CircuitBreakerState::HalfOpen
            || counters.failures >= self.config.failure_threshold;
        if should_open && *state != CircuitBreakerState::Open {
            *state = CircuitBreakerState::Open;
            warn!(
                failures = counters.failures,
                "Circuit breaker opening, rejecting further calls"
            );
        }
    }

    /// Time left until an open breaker lets a trial call through
    pub async fn retry_after(&self) -> Duration {
        if *self.state.read().await != CircuitBreakerState::Open {
            return Duration::ZERO;
        }
        match self.counters.lock().await.last_failure {
            Some(t) => self.config.recovery_timeout.saturating_sub(t.elapsed()),
            None => Duration::ZERO,
        }
    }

    pub async fn state(&self) -> CircuitBreakerState {
        *self.state.read().await
    }

    pub async fn failure_count(&self) -> u32 {
        self.counters.lock().await.failures
    }
}

/// Context handed to each attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryContext {
    pub attempt_id: String,
    /// 1-based
    pub attempt_number: u32,
    pub total_elapsed: Duration,
    pub previous_error: Option<String>,
}

/// Retry execution statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub failures_by_category: HashMap<ErrorCategory, u64>,
    /// Calls turned away by an open breaker
    pub breaker_rejections: u64,
}

/// Runs fallible async operations under a [`RetryPolicy`]
pub struct RetryExecutor {
    policy: RetryPolicy,
    circuit_breakers: HashMap<ErrorCategory, Arc<CircuitBreaker>>,
    stats: Arc<RwLock<RetryStats>>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        let mut circuit_breakers = HashMap::new();
        if policy.circuit_breaker_enabled {
            for category in [ErrorCategory::Network, ErrorCategory::ExternalService] {
                circuit_breakers.insert(
                    category,
                    Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
                );
            }
        }

        Self {
            policy,
            circuit_breakers,
            stats: Arc::new(RwLock::new(RetryStats::default())),
        }
    }

    /// Execute `f` until it succeeds, fails permanently or attempts run out
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T, FetchError>
    where
        F: FnMut(RetryContext) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let start_time = Instant::now();
        let attempt_id = Uuid::new_v4().to_string();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut previous_error: Option<String> = None;

        for attempt in 1..=max_attempts {
            if let Some((category, retry_after)) = self.open_breaker().await {
                self.stats.write().await.breaker_rejections += 1;
                debug!(?category, attempt, "Circuit breaker open, not attempting");
                return Err(FetchError::CircuitOpen {
                    category,
                    retry_after_ms: retry_after.as_millis() as u64,
                });
            }

            let context = RetryContext {
                attempt_id: attempt_id.clone(),
                attempt_number: attempt,
                total_elapsed: start_time.elapsed(),
                previous_error: previous_error.take(),
            };
            self.stats.write().await.total_attempts += 1;
            debug!(attempt, %attempt_id, "Executing attempt");

            match f(context).await {
                Ok(value) => {
                    for breaker in self.circuit_breakers.values() {
                        breaker.record_success().await;
                    }
                    self.stats.write().await.total_successes += 1;
                    return Ok(value);
                }
                Err(error) => {
                    if let Some(breaker) = self.circuit_breakers.get(&error.category()) {
                        breaker.record_failure().await;
                    }

                    if !error.is_retryable() || attempt >= max_attempts {
                        warn!(attempt, %error, "Giving up");
                        self.record_final_failure(&error).await;
                        return Err(error);
                    }

                    let delay = self.calculate_delay(&error, attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    previous_error = Some(error.to_string());
                }
            }
        }

        unreachable!("retry loop returns on success, permanent failure or last attempt")
    }

    async fn open_breaker(&self) -> Option<(ErrorCategory, Duration)> {
        for (category, breaker) in &self.circuit_breakers {
            if !breaker.allows_call().await {
                return Some((*category, breaker.retry_after().await));
            }
        }
        None
    }

    async fn record_final_failure(&self, error: &FetchError) {
        let mut stats = self.stats.write().await;
        stats.total_failures += 1;
        *stats
            .failures_by_category
            .entry(error.category())
            .or_default() += 1;
    }

    /// Delay before attempt `attempt + 1`
    pub fn calculate_delay(&self, error: &FetchError, attempt: u32) -> Duration {
        let multiplier = match error {
            FetchError::ExternalService { .. } => error.backoff_multiplier(),
            _ => self.policy.backoff_multiplier,
        };
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.policy.base_delay.as_millis() as f64 * multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.policy.max_delay.as_millis() as f64);

        let jittered_ms = if self.policy.jitter_enabled {
            let jitter = capped_ms * self.policy.jitter_factor * (rand::random::<f64>() - 0.5);
            (capped_ms + jitter).max(0.0)
        } else {
            capped_ms
        };

        Duration::from_millis(jittered_ms as u64)
    }

    pub async fn get_stats(&self) -> RetryStats {
        self.stats.read().await.clone()
    }
}

/// Convenience constructors
pub mod errors {
    use super::*;

    pub fn network_error(message: impl Into<String>, is_retryable: bool) -> FetchError {
        FetchError::Network {
            message: message.into(),
            is_retryable,
        }
    }

    pub fn unavailable_error(video_id: impl Into<String>, message: impl Into<String>) -> FetchError {
        FetchError::Unavailable {
            video_id: video_id.into(),
            message: message.into(),
        }
    }

    pub fn rate_limited_error(message: impl Into<String>) -> FetchError {
        FetchError::ExternalService {
            message: message.into(),
            service: "youtube".to_string(),
            is_retryable: true,
            backoff_multiplier: 3.0,
        }
    }

    pub fn parsing_error(message: impl Into<String>, is_retryable: bool) -> FetchError {
        FetchError::Parsing {
            message: message.into(),
            is_retryable,
        }
    }
}
