//! Reconnection backoff policy and its runtime state machine.
//!
//! The session consults this after every connection failure or
//! unexpected close:
//!
//! ```text
//!   no strategy ──→ stay closed (reconnection disabled)
//!   exhausted   ──→ reset the counter, stay closed (a manual connect
//!                   starts a fresh cycle)
//!   armed       ──→ sleep next_interval(), record the attempt, connect
//! ```
//!
//! A successful open resets the attempt counter unconditionally, so each
//! outage gets the full budget. One timer exists per attempt; the
//! session's single engine loop guarantees attempts never overlap.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Configuration for reconnection backoff.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// How many reconnect attempts to make per outage before giving up.
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt. 1.0 = constant interval.
    pub multiplier: f64,
    /// Random jitter as a fraction of the computed delay (0.0–1.0).
    /// Desynchronizes clients reconnecting after a shared outage.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with a specific attempt budget and default timing.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Clamp any out-of-range values so the policy is safe to use.
    ///
    /// Called automatically by [`ReconnectStrategy::new`]. Rules:
    /// - `multiplier` below 1.0 would shrink the backoff — raised to 1.0.
    /// - `jitter` clamped to `0.0..=1.0`.
    /// - `max_delay` raised to at least `initial_delay`.
    pub fn validated(mut self) -> Self {
        if self.multiplier < 1.0 {
            warn!(
                multiplier = self.multiplier,
                "reconnect multiplier below 1.0 — clamping"
            );
            self.multiplier = 1.0;
        }
        self.jitter = self.jitter.clamp(0.0, 1.0);
        if self.max_delay < self.initial_delay {
            self.max_delay = self.initial_delay;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Runtime reconnection state: the policy plus the attempts made so far
/// in the current outage.
#[derive(Debug)]
pub struct ReconnectStrategy {
    policy: ReconnectPolicy,
    attempts_made: u32,
}

impl ReconnectStrategy {
    /// Creates a strategy with zero attempts made.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy: policy.validated(),
            attempts_made: 0,
        }
    }

    /// Attempts made in the current cycle.
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Whether the attempt budget for this cycle is spent.
    pub fn exhausted(&self) -> bool {
        self.attempts_made >= self.policy.max_attempts
    }

    /// Computes the delay before the next attempt:
    /// `initial_delay * multiplier^attempts_made`, capped at `max_delay`,
    /// with uniform random jitter of ±`jitter` applied.
    pub fn next_interval(&self) -> Duration {
        let base = self.policy.initial_delay.as_secs_f64()
            * self.policy.multiplier.powi(self.attempts_made as i32);
        let capped = base.min(self.policy.max_delay.as_secs_f64());

        let spread = capped * self.policy.jitter;
        let jittered = if spread > 0.0 {
            capped + rand::rng().random_range(-spread..=spread)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Records that an attempt was made. Call after the backoff timer
    /// fires, immediately before connecting.
    pub fn record_attempt(&mut self) {
        self.attempts_made += 1;
    }

    /// Resets the attempt counter. Called on every successful open, and
    /// when an exhausted cycle ends.
    pub fn reset(&mut self) {
        self.attempts_made = 0;
    }
}

// =========================================================================
// Tests
// =========================================================================
