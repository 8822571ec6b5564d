// crates/appcontent-core/src/runtime/deadline.rs
// ============================================================================
// Module: Shared Deadline
// Description: One decreasing time budget per pipeline invocation.
// Purpose: Bound every network call and poll loop by the same deadline.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`Deadline`] is computed once at pipeline entry (`now + timeout`) and
//! passed by reference to every stage. Remaining budget only decreases; it is
//! never reset per stage. Cancellation is folded into the same mechanism: a
//! cancelled [`CancellationToken`] makes the remaining budget zero.
//!
//! Time is read through a [`Clock`] so tests can drive polling with
//! [`ManualClock`] instead of sleeping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Longest budget a deadline accepts; larger timeouts are clamped.
pub const MAX_DEADLINE: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Longest uninterrupted sleep before cancellation is re-checked.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(200);

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source used by deadlines and poll loops.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant::now`] and [`thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Virtual clock whose time only advances on `sleep` or `advance`.
///
/// # Invariants
/// - `now()` is monotonic.
#[derive(Debug)]
pub struct ManualClock {
    /// Instant the clock was created at.
    origin: Instant,
    /// Virtual time elapsed since `origin`.
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a manual clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Advances virtual time.
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset = offset.saturating_add(duration);
        }
    }

    /// Returns the virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map_or(Duration::ZERO, |offset| *offset)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Shared flag a caller sets to abandon an in-flight pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Deadline
// ============================================================================

/// Why a deadline has no budget left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// The time budget ran out.
    Expired,
    /// The caller cancelled the invocation.
    Cancelled,
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("deadline expired"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Shared, decreasing time budget for one pipeline invocation.
///
/// # Invariants
/// - `expires_at` is fixed at construction.
/// - `remaining()` is zero after cancellation.
#[derive(Clone)]
pub struct Deadline {
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Instant the budget was computed.
    started_at: Instant,
    /// Instant the budget runs out.
    expires_at: Instant,
    /// Caller cancellation flag.
    cancel: CancellationToken,
}

impl Deadline {
    /// Creates a wall-clock deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self::with_clock(Arc::new(SystemClock), timeout)
    }

    /// Creates a deadline `timeout` from now on the provided clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        let started_at = clock.now();
        let budget = timeout.min(MAX_DEADLINE);
        Self {
            expires_at: started_at + budget,
            started_at,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the clock driving this deadline.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the remaining budget (zero when expired or cancelled).
    #[must_use]
    pub fn remaining(&self) -> Duration {
        if self.cancel.is_cancelled() {
            return Duration::ZERO;
        }
        self.expires_at.saturating_duration_since(self.clock.now())
    }

    /// Returns why the budget is exhausted, or `None` while time remains.
    #[must_use]
    pub fn exhaustion(&self) -> Option<Exhaustion> {
        if self.cancel.is_cancelled() {
            return Some(Exhaustion::Cancelled);
        }
        if self.remaining().is_zero() {
            return Some(Exhaustion::Expired);
        }
        None
    }

    /// Returns true when no budget remains.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhaustion().is_some()
    }

    /// Returns the time spent since the deadline was computed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }

    /// Returns the per-request timeout: `min(cap, remaining)`, or `None` when exhausted.
    #[must_use]
    pub fn request_timeout(&self, cap: Duration) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return None;
        }
        Some(cap.min(remaining))
    }

    /// Sleeps for `duration` or until the budget runs out, whichever is first.
    ///
    /// Returns `true` when budget remains after sleeping.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut left = duration.min(self.remaining());
        while !left.is_zero() {
            if self.cancel.is_cancelled() {
                return false;
            }
            let step = left.min(CANCEL_CHECK_SLICE);
            self.clock.sleep(step);
            left = left.saturating_sub(step);
        }
        !self.is_exhausted()
    }
}

impl fmt::Debug for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deadline")
            .field("remaining", &self.remaining())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
