//! Trait definitions for the watchdog's external collaborators.
//!
//! These traits abstract the node tooling so the watch loop can be tested
//! without spawning processes or waiting on real timers.

use crate::config::NodeEndpoint;
use crate::recovery::RecoveryAction;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Abstraction for the node status query.
///
/// # Example
///
/// ```rust,ignore
/// use tickwatch::testing::StatusSource;
///
/// async fn primary_report(source: &impl StatusSource, node: &NodeEndpoint) -> String {
///     source.query_status(node).await.unwrap_or_default()
/// }
/// ```
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Query the tick status report of a node.
    ///
    /// Output from a command that ran but reported a problem is returned as
    /// `Ok`; the parser recognizes the error marker in the text.
    ///
    /// # Errors
    ///
    /// Returns an error if the query could not be run at all or timed out.
    async fn query_status(&self, endpoint: &NodeEndpoint) -> Result<String>;
}

/// Abstraction for administrative action execution.
///
/// Actions are fire-and-forget: the caller only logs the outcome.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Execute one action against its node.
    ///
    /// # Errors
    ///
    /// Returns an error if the action could not be run or reported failure.
    async fn dispatch(&self, action: &RecoveryAction) -> Result<()>;
}

/// Abstraction for the pause between cycles.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}
