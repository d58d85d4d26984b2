//! Corrective actions the orchestrator can schedule.

use crate::config::NodeEndpoint;
use serde::{Deserialize, Serialize};

/// Kind of a recovery action, without its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Epoch-advance broadcast from the primary node
    BroadcastEpoch,
    /// Main/auxiliary role toggle
    ToggleMainAux,
    /// Peer-list refresh
    RefreshPeerList,
    /// Vote reissue
    ReissueVote,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::BroadcastEpoch => write!(f, "broadcast-epoch"),
            ActionKind::ToggleMainAux => write!(f, "toggle-main-aux"),
            ActionKind::RefreshPeerList => write!(f, "refresh-peer-list"),
            ActionKind::ReissueVote => write!(f, "reissue-vote"),
        }
    }
}

/// One administrative operation against one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RecoveryAction {
    /// Broadcast the move to `epoch`
    BroadcastEpoch { endpoint: NodeEndpoint, epoch: u64 },
    /// Switch the node's main/aux roles to `roles`
    ToggleMainAux {
        endpoint: NodeEndpoint,
        roles: [String; 2],
    },
    /// Rebuild the node's peer list
    RefreshPeerList { endpoint: NodeEndpoint },
    /// Ask the node to reissue its vote
    ReissueVote { endpoint: NodeEndpoint },
}

impl RecoveryAction {
    /// The kind of this action.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            RecoveryAction::BroadcastEpoch { .. } => ActionKind::BroadcastEpoch,
            RecoveryAction::ToggleMainAux { .. } => ActionKind::ToggleMainAux,
            RecoveryAction::RefreshPeerList { .. } => ActionKind::RefreshPeerList,
            RecoveryAction::ReissueVote { .. } => ActionKind::ReissueVote,
        }
    }

    /// The node this action targets.
    #[must_use]
    pub fn endpoint(&self) -> &NodeEndpoint {
        match self {
            RecoveryAction::BroadcastEpoch { endpoint, .. }
            | RecoveryAction::ToggleMainAux { endpoint, .. }
            | RecoveryAction::RefreshPeerList { endpoint }
            | RecoveryAction::ReissueVote { endpoint } => endpoint,
        }
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::BroadcastEpoch { endpoint, epoch } => {
                write!(f, "broadcast-epoch {} -> epoch {}", endpoint, epoch)
            }
            RecoveryAction::ToggleMainAux { endpoint, roles } => {
                write!(f, "toggle-main-aux {} {} {}", endpoint, roles[0], roles[1])
            }
            RecoveryAction::RefreshPeerList { endpoint } => {
                write!(f, "refresh-peer-list {}", endpoint)
            }
            RecoveryAction::ReissueVote { endpoint } => write!(f, "reissue-vote {}", endpoint),
        }
    }
}
