//! Poll scheduling.
//!
//! Each cycle ends with a single sleep whose length depends on what the
//! orchestrator did: the configured poll interval while the node is
//! progressing, a short retry delay while recovery is under way, and a long
//! cooldown after a peer-list refresh.

use crate::testing::Sleeper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between cycles while recovery actions are being retried.
pub const RETRY_DELAY: Duration = Duration::from_secs(2 * 60);

/// Delay after a peer-list refresh.
pub const COOLDOWN_DELAY: Duration = Duration::from_secs(45 * 60);

/// Which delay applies before the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Node is progressing; use the configured poll interval
    Poll,
    /// Stall response ran without a refresh
    Retry,
    /// Peer-list refresh ran
    Cooldown,
}

impl Cadence {
    /// Resolve the cadence against the configured poll interval.
    #[must_use]
    pub fn duration(&self, poll_interval: Duration) -> Duration {
        match self {
            Cadence::Poll => poll_interval,
            Cadence::Retry => RETRY_DELAY,
            Cadence::Cooldown => COOLDOWN_DELAY,
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Poll => write!(f, "poll"),
            Cadence::Retry => write!(f, "retry"),
            Cadence::Cooldown => write!(f, "cooldown"),
        }
    }
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
