//! Loop state carried between watch cycles.

use crate::snapshot::TickSnapshot;
use serde::{Deserialize, Serialize};

/// Memory of the previous cycle.
///
/// A fresh value is produced by the orchestrator at the end of every cycle;
/// the previous value is never modified in place.
///
/// # Example
///
/// ```
/// use tickwatch::recovery::LoopState;
///
/// let state = LoopState::new();
/// assert!(state.previous_snapshot.is_none());
/// assert_eq!(state.consecutive_unchanged_count, 0);
/// assert!(!state.recovery_in_progress());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    /// Effective snapshot of the previous cycle
    pub previous_snapshot: Option<TickSnapshot>,
    /// Number of consecutive cycles with an unchanged snapshot
    pub consecutive_unchanged_count: u32,
    /// Whether the previous cycle fired the epoch-advance broadcast
    pub last_cycle_fired_escalation: bool,
    /// Whether the previous cycle fired the vote reissue
    pub last_cycle_fired_reissue: bool,
}

impl LoopState {
    /// Create the empty state used at process start.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the previous cycle ran any stall response.
    #[must_use]
    pub fn recovery_in_progress(&self) -> bool {
        self.last_cycle_fired_escalation || self.last_cycle_fired_reissue
    }
}
