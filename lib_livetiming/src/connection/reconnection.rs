//! # Reconnection Strategy
//!
//! Exponential backoff without jitter: attempt `n` (0-indexed) waits
//! `min(initial_delay * multiplier^n, max_delay)`.
//!
//! At most one timer is pending at any time. Timers run as tokio tasks guarded
//! by a `CancellationToken`; every cancellation happens under the strategy
//! lock and a fired timer re-checks its token under the same lock before it
//! bumps the retry counter, so a `stop_reconnecting()` that returns has
//! already prevented the callback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::runtime::Handle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::types::ConnectionOptions;
use crate::loggers::Logger;
use crate::sync::lock;

/// Backoff parameters, derived from [`ConnectionOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectionConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl From<&ConnectionOptions> for ReconnectionConfig {
    fn from(options: &ConnectionOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            initial_delay: options.initial_retry_delay(),
            max_delay: options.max_retry_delay(),
            multiplier: options.retry_multiplier,
        }
    }
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self::from(&ConnectionOptions::default())
    }
}

#[derive(Debug)]
struct RetryState {
    retry_count: u32,
    enabled: bool,
    pending: Option<CancellationToken>,
}

impl RetryState {
    fn clear_timer(&mut self) -> bool {
        match self.pending.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// # Reconnection Strategy
///
/// Tracks the retry counter and the single pending reconnect timer for one
/// connection.
#[derive(Debug)]
pub struct ReconnectionStrategy {
    config: ReconnectionConfig,
    state: Arc<Mutex<RetryState>>,
    logger: Arc<Logger>,
}

impl ReconnectionStrategy {
    pub fn new(config: ReconnectionConfig, logger: Arc<Logger>) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(RetryState {
                retry_count: 0,
                enabled: true,
                pending: None,
            })),
            logger,
        }
    }

    /// Delay for the given 0-indexed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_delay.as_millis() as f64;
        let max = self.config.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (initial * self.config.multiplier.powi(exponent)).min(max);
        Duration::from_millis(delay.max(0.0) as u64)
    }

    /// Delay the next scheduled attempt would wait.
    pub fn next_delay(&self) -> Duration {
        self.delay_for_attempt(self.retry_count())
    }

    /// Reconnection is enabled and the retry budget is not spent.
    pub fn can_reconnect(&self) -> bool {
        let state = lock(&self.state);
        state.enabled && state.retry_count < self.config.max_retries
    }

    pub fn is_max_retries_reached(&self) -> bool {
        lock(&self.state).retry_count >= self.config.max_retries
    }

    /// Arms a timer that increments the retry counter and then calls
    /// `callback`. Any previously pending timer is cancelled first.
    ///
    /// Returns `false` (and schedules nothing) when reconnection is disabled,
    /// the budget is spent, or no tokio runtime is available.
    pub fn schedule_reconnect<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);

        if !(state.enabled && state.retry_count < self.config.max_retries) {
            self.logger.error(
                "Cannot reconnect",
                Some(&json!({
                    "retryCount": state.retry_count,
                    "maxRetries": self.config.max_retries,
                    "shouldReconnect": state.enabled,
                })),
            );
            return false;
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.logger
                    .warn("No async runtime available, reconnect not scheduled", None);
                return false;
            }
        };

        let delay = self.delay_for_attempt(state.retry_count);
        self.logger.info(
            &format!("Scheduling reconnect in {}ms", delay.as_millis()),
            Some(&json!({
                "attempt": state.retry_count + 1,
                "maxRetries": self.config.max_retries,
            })),
        );

        state.clear_timer();
        let token = CancellationToken::new();
        state.pending = Some(token.clone());
        drop(state);

        let shared = Arc::clone(&self.state);
        let logger = Arc::clone(&self.logger);
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    logger.debug("Pending reconnect cancelled", None);
                }
                _ = sleep(delay) => {
                    let attempt = {
                        let mut state = lock(&shared);
                        if token.is_cancelled() || !state.enabled {
                            None
                        } else {
                            state.pending = None;
                            state.retry_count += 1;
                            Some(state.retry_count)
                        }
                    };
                    if let Some(attempt) = attempt {
                        logger.info(&format!("Attempting reconnection #{}", attempt), None);
                        callback();
                    }
                }
            }
        });

        true
    }

    /// Zeroes the retry counter and cancels any pending timer.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.retry_count = 0;
        state.clear_timer();
        drop(state);
        self.logger.debug("Reconnection state reset", None);
    }

    /// Disables automatic reconnection and cancels any pending timer. The
    /// retry counter is left untouched.
    pub fn stop_reconnecting(&self) {
        let mut state = lock(&self.state);
        state.enabled = false;
        state.clear_timer();
        drop(state);
        self.logger.info("Auto-reconnection stopped", None);
    }

    pub fn enable_reconnecting(&self) {
        lock(&self.state).enabled = true;
        self.logger.info("Auto-reconnection enabled", None);
    }

    pub fn retry_count(&self) -> u32 {
        lock(&self.state).retry_count
    }

    pub fn config(&self) -> ReconnectionConfig {
        self.config
    }

    pub fn is_reconnect_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn has_pending_timer(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Cancels the timer, zeroes the counter and disables reconnection.
    pub fn destroy(&self) {
        let mut state = lock(&self.state);
        state.clear_timer();
        state.retry_count = 0;
        state.enabled = false;
        drop(state);
        self.logger.debug("ReconnectionStrategy destroyed", None);
    }
}

impl Drop for ReconnectionStrategy {
    fn drop(&mut self) {
        lock(&self.state).clear_timer();
    }
}
