//! The recovery state machine.
//!
//! [`RecoveryOrchestrator::plan`] is a pure function of the cycle's
//! [`Observation`] and the carried-over [`LoopState`]. It decides which
//! corrective actions run this cycle, in which order, how long to wait
//! before the next cycle, and what the next cycle will remember.
//!
//! On a stalled cycle the steps are evaluated in a fixed order:
//!
//! ```text
//! 1. escalate   latest tick > end tick       5x broadcast to next epoch (primary)
//! 2. toggle     escalate fired this cycle    role toggle on every node
//! 3. refresh    previous cycle intervened    peer-list refresh on every node
//!               and the tick is unchanged
//! 4. reissue    always                       vote reissue on every node
//! ```

use super::action::RecoveryAction;
use super::state::LoopState;
use crate::config::NodeEndpoint;
use crate::schedule::Cadence;
use crate::stall::Observation;
use serde::Serialize;

/// Number of times the epoch-advance broadcast is sent per escalation.
pub const BROADCAST_REPEATS: usize = 5;

/// What one cycle should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CyclePlan {
    /// Actions to dispatch, in order
    pub actions: Vec<RecoveryAction>,
    /// Delay before the next cycle
    pub cadence: Cadence,
    /// State to carry into the next cycle
    pub next_state: LoopState,
    /// Whether the epoch-advance broadcast fired
    pub escalation_fired: bool,
    /// Whether the peer-list refresh fired
    pub refresh_fired: bool,
    /// Whether the vote reissue fired
    pub reissue_fired: bool,
}

/// Decides the corrective actions for each cycle.
#[derive(Debug, Clone)]
pub struct RecoveryOrchestrator {
    endpoints: Vec<NodeEndpoint>,
    ticks_per_epoch: u64,
    toggle_roles: [String; 2],
}

impl RecoveryOrchestrator {
    /// Create an orchestrator for the given nodes.
    ///
    /// The first endpoint is the primary.
    #[must_use]
    pub fn new(endpoints: Vec<NodeEndpoint>, ticks_per_epoch: u64, toggle_roles: [String; 2]) -> Self {
        Self {
            endpoints,
            ticks_per_epoch,
            toggle_roles,
        }
    }

    /// The primary endpoint, if any node is configured.
    #[must_use]
    pub fn primary(&self) -> Option<&NodeEndpoint> {
        self.endpoints.first()
    }

    /// Plan one cycle.
    #[must_use]
    pub fn plan(&self, observation: &Observation, state: &LoopState) -> CyclePlan {
        let carry = |escalation: bool, reissue: bool| LoopState {
            previous_snapshot: observation.snapshot,
            consecutive_unchanged_count: observation.unchanged_count,
            last_cycle_fired_escalation: escalation,
            last_cycle_fired_reissue: reissue,
        };

        if !observation.stalled {
            return CyclePlan {
                actions: Vec::new(),
                cadence: Cadence::Poll,
                next_state: carry(false, false),
                escalation_fired: false,
                refresh_fired: false,
                reissue_fired: false,
            };
        }

        let mut actions = Vec::new();

        // An absent snapshot leaves the end tick unknown; no escalation then.
        let escalation_target = observation
            .snapshot
            .filter(|snapshot| snapshot.has_passed_end_tick(self.ticks_per_epoch))
            .and_then(|snapshot| self.primary().map(|primary| (primary, snapshot.next_epoch())));

        let escalation_fired = escalation_target.is_some();
        if let Some((primary, epoch)) = escalation_target {
            actions.extend((0..BROADCAST_REPEATS).map(|_| RecoveryAction::BroadcastEpoch {
                endpoint: primary.clone(),
                epoch,
            }));
            actions.extend(self.endpoints.iter().map(|endpoint| RecoveryAction::ToggleMainAux {
                endpoint: endpoint.clone(),
                roles: self.toggle_roles.clone(),
            }));
        }

        let refresh_fired = state.recovery_in_progress() && observation.tick_unchanged;
        if refresh_fired {
            actions.extend(
                self.endpoints
                    .iter()
                    .map(|endpoint| RecoveryAction::RefreshPeerList {
                        endpoint: endpoint.clone(),
                    }),
            );
        }

        actions.extend(self.endpoints.iter().map(|endpoint| RecoveryAction::ReissueVote {
            endpoint: endpoint.clone(),
        }));

        CyclePlan {
            actions,
            cadence: if refresh_fired {
                Cadence::Cooldown
            } else {
                Cadence::Retry
            },
            next_state: carry(escalation_fired, true),
            escalation_fired,
            refresh_fired,
            reissue_fired: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::ActionKind;
    use crate::snapshot::TickSnapshot;

    fn endpoints() -> Vec<NodeEndpoint> {
        vec![
            NodeEndpoint::new("10.0.0.1", 31841),
            NodeEndpoint::new("10.0.0.2", 31841),
            NodeEndpoint::new("10.0.0.3", 21841),
        ]
    }

    fn orchestrator() -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(
            endpoints(),
            1000,
            ["MAIN".to_string(), "MAIN".to_string()],
        )
    }

    fn stalled(snapshot: Option<TickSnapshot>, tick_unchanged: bool) -> Observation {
        Observation {
            snapshot,
            tick_unchanged,
            unchanged_count: if tick_unchanged { 3 } else { 0 },
            stalled: true,
            error: None,
        }
    }

    fn count(plan: &CyclePlan, kind: ActionKind) -> usize {
        plan.actions.iter().filter(|a| a.kind() == kind).count()
    }

    #[test]
    fn test_not_stalled_does_nothing_and_clears_flags() {
        let observation = Observation {
            snapshot: Some(TickSnapshot::new(960, 1, 0)),
            tick_unchanged: true,
            unchanged_count: 2,
            stalled: false,
            error: None,
        };
        let state = LoopState {
            last_cycle_fired_escalation: true,
            last_cycle_fired_reissue: true,
            ..LoopState::default()
        };

        let plan = orchestrator().plan(&observation, &state);
        assert!(plan.actions.is_empty());
        assert_eq!(plan.cadence, Cadence::Poll);
        assert!(!plan.next_state.last_cycle_fired_escalation);
        assert!(!plan.next_state.last_cycle_fired_reissue);
        assert_eq!(plan.next_state.previous_snapshot, observation.snapshot);
        assert_eq!(plan.next_state.consecutive_unchanged_count, 2);
    }

    #[test]
    fn test_stall_below_end_tick_only_reissues() {
        let plan = orchestrator().plan(
            &stalled(Some(TickSnapshot::new(100, 1, 1)), true),
            &LoopState::new(),
        );

        assert!(!plan.escalation_fired);
        assert!(!plan.refresh_fired);
        assert!(plan.reissue_fired);
        assert_eq!(count(&plan, ActionKind::BroadcastEpoch), 0);
        assert_eq!(count(&plan, ActionKind::ToggleMainAux), 0);
        assert_eq!(count(&plan, ActionKind::ReissueVote), 3);
        assert_eq!(plan.cadence, Cadence::Retry);
        assert!(plan.next_state.last_cycle_fired_reissue);
        assert!(!plan.next_state.last_cycle_fired_escalation);
    }

    #[test]
    fn test_escalation_broadcasts_five_times_to_next_epoch_then_toggles() {
        let plan = orchestrator().plan(
            &stalled(Some(TickSnapshot::new(960, 1, 0)), true),
            &LoopState::new(),
        );

        assert!(plan.escalation_fired);
        let broadcasts: Vec<_> = plan.actions[..BROADCAST_REPEATS].to_vec();
        for action in &broadcasts {
            assert_eq!(
                action,
                &RecoveryAction::BroadcastEpoch {
                    endpoint: NodeEndpoint::new("10.0.0.1", 31841),
                    epoch: 2,
                }
            );
        }
        let toggled: Vec<_> = plan.actions[BROADCAST_REPEATS..BROADCAST_REPEATS + 3]
            .iter()
            .map(|a| (a.kind(), a.endpoint().clone()))
            .collect();
        assert_eq!(
            toggled,
            endpoints()
                .into_iter()
                .map(|e| (ActionKind::ToggleMainAux, e))
                .collect::<Vec<_>>()
        );
        assert_eq!(count(&plan, ActionKind::ReissueVote), 3);
        assert_eq!(plan.actions.len(), BROADCAST_REPEATS + 3 + 3);
        assert_eq!(plan.cadence, Cadence::Retry);
        assert!(plan.next_state.last_cycle_fired_escalation);
    }

    #[test]
    fn test_toggle_uses_configured_roles() {
        let orchestrator = RecoveryOrchestrator::new(
            endpoints(),
            1000,
            ["MAIN".to_string(), "AUX".to_string()],
        );
        let plan = orchestrator.plan(
            &stalled(Some(TickSnapshot::new(960, 1, 0)), false),
            &LoopState::new(),
        );
        assert!(plan.actions.iter().any(|a| matches!(
            a,
            RecoveryAction::ToggleMainAux { roles, .. } if roles[1] == "AUX"
        )));
    }

    #[test]
    fn test_end_tick_boundary_does_not_escalate() {
        let plan = orchestrator().plan(
            &stalled(Some(TickSnapshot::new(950, 1, 0)), true),
            &LoopState::new(),
        );
        assert!(!plan.escalation_fired);
    }

    #[test]
    fn test_refresh_after_previous_escalation() {
        let state = LoopState {
            last_cycle_fired_escalation: true,
            ..LoopState::default()
        };
        let plan = orchestrator().plan(&stalled(Some(TickSnapshot::new(100, 1, 1)), true), &state);

        assert!(plan.refresh_fired);
        assert_eq!(count(&plan, ActionKind::RefreshPeerList), 3);
        assert_eq!(plan.cadence, Cadence::Cooldown);
    }

    #[test]
    fn test_refresh_after_previous_reissue() {
        let state = LoopState {
            last_cycle_fired_reissue: true,
            ..LoopState::default()
        };
        let plan = orchestrator().plan(&stalled(Some(TickSnapshot::new(100, 1, 1)), true), &state);

        assert!(plan.refresh_fired);
        assert_eq!(plan.cadence, Cadence::Cooldown);
    }

    #[test]
    fn test_no_refresh_when_tick_changed() {
        let state = LoopState {
            last_cycle_fired_escalation: true,
            last_cycle_fired_reissue: true,
            ..LoopState::default()
        };
        let plan = orchestrator().plan(&stalled(Some(TickSnapshot::new(100, 1, 1)), false), &state);

        assert!(!plan.refresh_fired);
        assert_eq!(count(&plan, ActionKind::RefreshPeerList), 0);
        assert_eq!(count(&plan, ActionKind::ReissueVote), 3);
        assert_eq!(plan.cadence, Cadence::Retry);
    }

    #[test]
    fn test_refresh_precedes_reissue() {
        let state = LoopState {
            last_cycle_fired_reissue: true,
            ..LoopState::default()
        };
        let plan = orchestrator().plan(&stalled(Some(TickSnapshot::new(960, 1, 0)), true), &state);

        let kinds: Vec<_> = plan.actions.iter().map(RecoveryAction::kind).collect();
        let first_refresh = kinds.iter().position(|k| *k == ActionKind::RefreshPeerList).unwrap();
        let last_toggle = kinds.iter().rposition(|k| *k == ActionKind::ToggleMainAux).unwrap();
        let first_reissue = kinds.iter().position(|k| *k == ActionKind::ReissueVote).unwrap();
        assert!(last_toggle < first_refresh);
        assert!(first_refresh < first_reissue);
        assert_eq!(plan.actions.len(), BROADCAST_REPEATS + 3 * 3);
    }

    #[test]
    fn test_unknown_end_tick_skips_escalation() {
        let observation = Observation {
            snapshot: None,
            tick_unchanged: false,
            unchanged_count: 0,
            stalled: true,
            error: Some("Failed to connect".to_string()),
        };
        let plan = orchestrator().plan(&observation, &LoopState::new());

        assert!(!plan.escalation_fired);
        assert_eq!(count(&plan, ActionKind::ReissueVote), 3);
        assert!(plan.next_state.previous_snapshot.is_none());
    }
}
