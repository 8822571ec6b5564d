// crates/appcontent-core/src/runtime/mod.rs
// ============================================================================
// Module: App Content Runtime
// Description: Deadline, clock, and poll-loop primitives.
// Purpose: Share one time budget and one polling discipline across stages.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Runtime helpers bound every blocking wait in the pipeline by a single
//! caller-supplied deadline.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod deadline;
pub mod poll;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use deadline::CancellationToken;
pub use deadline::Clock;
pub use deadline::Deadline;
pub use deadline::Exhaustion;
pub use deadline::MAX_DEADLINE;
pub use deadline::ManualClock;
pub use deadline::SystemClock;
pub use poll::DEFAULT_MAX_POLL_INTERVAL;
pub use poll::DEFAULT_POLL_INTERVAL;
pub use poll::PollError;
pub use poll::PollPolicy;
pub use poll::PollStep;
pub use poll::PollSuccess;
pub use poll::poll_until;
