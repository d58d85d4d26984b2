//! Stall detection.
//!
//! The detector compares each cycle's snapshot against the previous one and
//! tracks how many consecutive cycles the primary node has reported exactly
//! the same tick state. A node is considered stalled after
//! [`STALL_THRESHOLD`] unchanged cycles, or immediately when its status could
//! not be read.

use crate::recovery::LoopState;
use crate::snapshot::{CycleInput, TickSnapshot};
use serde::Serialize;

/// Consecutive unchanged cycles after which a node counts as stalled.
pub const STALL_THRESHOLD: u32 = 3;

/// Result of classifying one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// Effective snapshot for this cycle (the previous one on error cycles)
    pub snapshot: Option<TickSnapshot>,
    /// Whether the effective snapshot equals the previous one
    pub tick_unchanged: bool,
    /// Streak length after this cycle
    pub unchanged_count: u32,
    /// Whether recovery should run this cycle
    pub stalled: bool,
    /// Reason this cycle is an error cycle, if it is one
    pub error: Option<String>,
}

impl Observation {
    /// Whether the status for this cycle could not be read.
    #[must_use]
    pub fn is_error_cycle(&self) -> bool {
        self.error.is_some()
    }
}

/// Classifies cycles as stalled or progressing.
#[derive(Debug, Clone, Copy)]
pub struct StallDetector {
    threshold: u32,
}

impl Default for StallDetector {
    fn default() -> Self {
        Self {
            threshold: STALL_THRESHOLD,
        }
    }
}

impl StallDetector {
    /// Create a detector with the standard threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the current cycle against the carried-over state.
    ///
    /// On an error cycle the previous snapshot stands in for the current
    /// one, so a repeated failure keeps extending an existing streak. An
    /// absent snapshot never extends the streak.
    #[must_use]
    pub fn observe(&self, input: CycleInput, state: &LoopState) -> Observation {
        let (snapshot, error) = match input {
            CycleInput::Snapshot(snapshot) => (Some(snapshot), None),
            CycleInput::QueryFailed(reason) | CycleInput::ParseFailed(reason) => {
                (state.previous_snapshot, Some(reason))
            }
        };

        let tick_unchanged = snapshot.is_some() && snapshot == state.previous_snapshot;
        let unchanged_count = if tick_unchanged {
            state.consecutive_unchanged_count.saturating_add(1)
        } else {
            0
        };
        let stalled = unchanged_count >= self.threshold || error.is_some();

        Observation {
            snapshot,
            tick_unchanged,
            unchanged_count,
            stalled,
            error,
        }
    }
}
