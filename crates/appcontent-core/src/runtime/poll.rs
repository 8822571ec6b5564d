// crates/appcontent-core/src/runtime/poll.rs
// ============================================================================
// Module: Deadline-Bounded Polling
// Description: Explicit poll loop over a tri-state attempt result.
// Purpose: Drive backend state machines without hidden retry control flow.
// Dependencies: crate::runtime::deadline
// ============================================================================

//! ## Overview
//! [`poll_until`] calls an attempt function until it returns
//! [`PollStep::Ready`] or [`PollStep::Fatal`], or the shared [`Deadline`] runs
//! out. The deadline is checked before every attempt, and sleeps between
//! attempts never exceed the remaining budget, so a backend stuck in a
//! pending state fails within one poll interval of the deadline.
//! Invariants:
//! - `Fatal` stops the loop immediately; no further attempts are made.
//! - Exhaustion is reported separately from `Fatal`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use crate::runtime::deadline::Deadline;
use crate::runtime::deadline::Exhaustion;

// ============================================================================
// SECTION: Poll Policy
// ============================================================================

/// Default delay between poll attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default ceiling for the backed-off poll delay.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll cadence with light multiplicative backoff.
///
/// # Invariants
/// - `max_interval >= interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after the first attempt.
    interval: Duration,
    /// Ceiling for the delay between attempts.
    max_interval: Duration,
}

impl PollPolicy {
    /// Creates a policy; `max_interval` is raised to `interval` when smaller.
    #[must_use]
    pub fn new(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
        }
    }

    /// Creates a policy that never backs off.
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
        }
    }

    /// Returns the initial delay.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the delay ceiling.
    #[must_use]
    pub const fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Returns the delay to use after `current` (x1.5, capped).
    #[must_use]
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_add(current / 2).min(self.max_interval)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_POLL_INTERVAL)
    }
}

// ============================================================================
// SECTION: Poll Results
// ============================================================================

/// Result of a single poll attempt.
#[derive(Debug)]
pub enum PollStep<T, E> {
    /// Not done yet; carries an optional label of what was observed.
    Pending(Option<String>),
    /// Done; stop polling with a value.
    Ready(T),
    /// Unrecoverable; stop polling with an error.
    Fatal(E),
}

/// Successful poll outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSuccess<T> {
    /// Value returned by the final attempt.
    pub value: T,
    /// Number of attempts made, including the final one.
    pub attempts: u32,
}

/// Failed poll outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    /// An attempt returned [`PollStep::Fatal`].
    Fatal {
        /// Number of attempts made, including the fatal one.
        attempts: u32,
        /// Error returned by the attempt.
        error: E,
    },
    /// The deadline ran out while attempts were still pending.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Whether the budget expired or was cancelled.
        reason: Exhaustion,
        /// Last label reported through [`PollStep::Pending`].
        last_observed: Option<String>,
    },
}

// ============================================================================
// SECTION: Poll Loop
// ============================================================================

/// Polls `attempt` until it is ready, fails fatally, or the deadline runs out.
///
/// The attempt function receives the 1-based attempt number.
///
/// # Errors
///
/// Returns [`PollError::Fatal`] when an attempt fails fatally and
/// [`PollError::Exhausted`] when the deadline runs out first.
pub fn poll_until<T, E, F>(
    deadline: &Deadline,
    policy: &PollPolicy,
    mut attempt: F,
) -> Result<PollSuccess<T>, PollError<E>>
where
    F: FnMut(u32) -> PollStep<T, E>,
{
    let mut attempts: u32 = 0;
    let mut interval = policy.interval();
    let mut last_observed = None;
    loop {
        if let Some(reason) = deadline.exhaustion() {
            return Err(PollError::Exhausted {
                attempts,
                reason,
                last_observed,
            });
        }
        attempts = attempts.saturating_add(1);
        match attempt(attempts) {
            PollStep::Ready(value) => {
                return Ok(PollSuccess {
                    value,
                    attempts,
                });
            }
            PollStep::Fatal(error) => {
                return Err(PollError::Fatal {
                    attempts,
                    error,
                });
            }
            PollStep::Pending(observed) => {
                if observed.is_some() {
                    last_observed = observed;
                }
            }
        }
        deadline.sleep(interval);
        interval = policy.next_interval(interval);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
