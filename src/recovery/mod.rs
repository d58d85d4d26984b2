//! Recovery planning.
//!
//! - [`state`] - Loop state carried between cycles
//! - [`action`] - Administrative actions and their kinds
//! - [`orchestrator`] - The state machine that plans each cycle
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────┐     ┌─────────────┐
//! │ Observation │────>│ RecoveryOrchestrator │────>│  CyclePlan  │
//! └─────────────┘     └──────────────────────┘     └─────────────┘
//!                                ^                        │
//!                                │       next_state       │
//!                          ┌───────────┐                  │
//!                          │ LoopState │<─────────────────┘
//!                          └───────────┘
//! ```

pub mod action;
pub mod orchestrator;
pub mod state;

pub use action::{ActionKind, RecoveryAction};
pub use orchestrator::{CyclePlan, RecoveryOrchestrator, BROADCAST_REPEATS};
pub use state::LoopState;
