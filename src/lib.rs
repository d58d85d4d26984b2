//! tickwatch - epoch-transition watchdog
//!
//! Polls the primary node of a ledger cluster for its tick status, detects
//! when tick progress stalls, and drives a sequence of administrative
//! recovery actions until the cluster advances again.
//!
//! # Architecture
//!
//! - [`snapshot`] - Status report parsing into tick snapshots
//! - [`stall`] - Unchanged-streak tracking and stall classification
//! - [`recovery`] - Loop state, recovery actions, and the orchestrator
//! - [`schedule`] - Poll cadence and sleeping between cycles
//! - [`watchdog`] - The cycle driver that ties everything together
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Collaborator traits and mocks
//!
//! # Example
//!
//! ```rust,ignore
//! use tickwatch::testing::{MockDispatcher, MockSleeper, MockStatusSource};
//! use tickwatch::{Watchdog, WatchdogConfig};
//!
//! let config = WatchdogConfig::load(Path::new("tickwatch.toml"))?;
//! let mut watchdog = Watchdog::new(config, source, dispatcher, sleeper)?;
//! watchdog.run(None).await;
//! ```

pub mod config;
pub mod error;
pub mod recovery;
pub mod schedule;
pub mod snapshot;
pub mod stall;
pub mod testing;
pub mod watchdog;

// Re-export commonly used types
pub use error::{Result, WatchdogError};

pub use config::{endpoints_from_lists, ConfigOverrides, NodeEndpoint, WatchdogConfig};
pub use recovery::{ActionKind, CyclePlan, LoopState, RecoveryAction, RecoveryOrchestrator};
pub use schedule::{Cadence, TokioSleeper};
pub use snapshot::{CycleInput, SnapshotError, StatusParser, TickSnapshot};
pub use stall::{Observation, StallDetector};
pub use watchdog::{CycleReport, Watchdog};
