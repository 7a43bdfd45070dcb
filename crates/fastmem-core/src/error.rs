//! Error taxonomy for the allocator subsystem.
//!
//! Configuration problems are detected at context initialization and returned
//! as `Error` values; resource exhaustion on the allocation path surfaces as
//! `None` rather than an error. Reclaim has its own three-way outcome so
//! callers can tell "try again later" apart from "truly full".

use thiserror::Error;

/// Errors surfaced by context initialization and budget enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A context was configured with an empty region list.
    #[error("no regions configured")]
    EmptyRegions,

    /// A region does not start where the previous one ended.
    #[error("invalid region start {start}: expected previous end {previous_end}")]
    RegionGap { start: usize, previous_end: usize },

    /// A region's byte interval is empty or inverted.
    #[error("invalid region bounds: start {start} >= end {end}")]
    InvalidBounds { start: usize, end: usize },

    /// A region step is zero or wider than the region itself.
    #[error("invalid region step {step} for span {span}")]
    InvalidStep { step: usize, span: usize },

    /// A multi-bucket region step must be a power of two.
    #[error("invalid region step {step}: expected power of 2")]
    StepNotPowerOfTwo { step: usize },

    /// A multi-bucket region start must be a multiple of its step.
    #[error("invalid region start {start}: must be multiple of step {step}")]
    MisalignedStart { start: usize, step: usize },

    /// A multi-bucket region end must be a multiple of its step.
    #[error("invalid region end {end}: must be multiple of step {step}")]
    MisalignedEnd { end: usize, step: usize },

    /// Growth would push outstanding bytes past the configured budget.
    #[error("byte budget exceeded: outstanding {outstanding} + growth {growth} > budget {budget}")]
    BudgetExceeded {
        outstanding: i64,
        growth: i64,
        budget: i64,
    },

    /// Growth would push committed trunk bytes past the derived ceiling.
    #[error("commit ceiling exceeded: committed {committed} + growth {growth} > limit {limit}")]
    CommitCeilingExceeded {
        committed: i64,
        growth: i64,
        limit: i64,
    },
}

/// Result of a reclaim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// Idle trunk memory was released; the payload is the byte count.
    Reclaimed(u64),
    /// The rate-limit window has not elapsed (or another thread owns it).
    TooSoon,
    /// Usage is at or above target, or the sweep found nothing idle.
    NothingToDo,
}

impl ReclaimOutcome {
    /// Bytes released by this attempt (zero unless `Reclaimed`).
    #[must_use]
    pub fn bytes(self) -> u64 {
        match self {
            ReclaimOutcome::Reclaimed(bytes) => bytes,
            ReclaimOutcome::TooSoon | ReclaimOutcome::NothingToDo => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = Error::RegionGap {
            start: 512,
            previous_end: 256,
        };
        let text = err.to_string();
        assert!(text.contains("512"));
        assert!(text.contains("256"));
    }

    #[test]
    fn reclaim_outcome_bytes() {
        assert_eq!(ReclaimOutcome::Reclaimed(4096).bytes(), 4096);
        assert_eq!(ReclaimOutcome::TooSoon.bytes(), 0);
        assert_eq!(ReclaimOutcome::NothingToDo.bytes(), 0);
    }
}
