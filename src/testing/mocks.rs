//! Mock implementations of the collaborator traits.
//!
//! These mocks provide scripted, recording test doubles so watch cycles can
//! be driven deterministically.

use super::traits::{ActionDispatcher, Sleeper, StatusSource};
use crate::config::NodeEndpoint;
use crate::recovery::{ActionKind, RecoveryAction};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a status report in the node tool's format.
#[must_use]
pub fn status_report(tick: u64, epoch: u64, initial_tick: u64) -> String {
    format!("Tick: {tick}\nEpoch: {epoch}\nInitial tick: {initial_tick}\n")
}

/// Scripted status source.
///
/// Responses are returned in order; once the script runs out the last
/// response repeats.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockStatusSource::new()
///     .with_report(100, 1, 1)
///     .with_query_error("timed out");
/// ```
#[derive(Debug, Default)]
pub struct MockStatusSource {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    last: Mutex<Option<std::result::Result<String, String>>>,
    queried: Mutex<Vec<NodeEndpoint>>,
    call_count: AtomicU32,
}

impl MockStatusSource {
    /// Create a source with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw text response.
    #[must_use]
    pub fn with_output(self, text: &str) -> Self {
        lock(&self.script).push_back(Ok(text.to_string()));
        self
    }

    /// Append a well-formed status report.
    #[must_use]
    pub fn with_report(self, tick: u64, epoch: u64, initial_tick: u64) -> Self {
        self.with_output(&status_report(tick, epoch, initial_tick))
    }

    /// Append the same report `times` times.
    #[must_use]
    pub fn with_repeated_report(mut self, tick: u64, epoch: u64, initial_tick: u64, times: usize) -> Self {
        for _ in 0..times {
            self = self.with_report(tick, epoch, initial_tick);
        }
        self
    }

    /// Append a failed query.
    #[must_use]
    pub fn with_query_error(self, error: &str) -> Self {
        lock(&self.script).push_back(Err(error.to_string()));
        self
    }

    /// Number of queries made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Endpoints queried, in order.
    pub fn queried(&self) -> Vec<NodeEndpoint> {
        lock(&self.queried).clone()
    }
}

#[async_trait]
impl StatusSource for MockStatusSource {
    async fn query_status(&self, endpoint: &NodeEndpoint) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.queried).push(endpoint.clone());

        let next = lock(&self.script).pop_front();
        let response = match next {
            Some(response) => {
                *lock(&self.last) = Some(response.clone());
                response
            }
            None => lock(&self.last)
                .clone()
                .unwrap_or_else(|| Err("no scripted status".to_string())),
        };

        match response {
            Ok(text) => Ok(text),
            Err(error) => bail!("{}", error),
        }
    }
}

/// Recording action dispatcher.
///
/// Every dispatched action is recorded, including the ones configured to
/// fail.
#[derive(Debug, Default)]
pub struct MockDispatcher {
    dispatched: Mutex<Vec<RecoveryAction>>,
    failing_kinds: HashSet<ActionKind>,
    failing_endpoints: HashSet<NodeEndpoint>,
}

impl MockDispatcher {
    /// Create a dispatcher where every action succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every action of `kind` fail.
    #[must_use]
    pub fn failing_kind(mut self, kind: ActionKind) -> Self {
        self.failing_kinds.insert(kind);
        self
    }

    /// Make every action against `endpoint` fail.
    #[must_use]
    pub fn failing_endpoint(mut self, endpoint: NodeEndpoint) -> Self {
        self.failing_endpoints.insert(endpoint);
        self
    }

    /// All dispatched actions, in order.
    pub fn dispatched(&self) -> Vec<RecoveryAction> {
        lock(&self.dispatched).clone()
    }

    /// Number of dispatched actions of `kind`.
    pub fn count(&self, kind: ActionKind) -> usize {
        lock(&self.dispatched)
            .iter()
            .filter(|action| action.kind() == kind)
            .count()
    }

    /// Forget recorded actions.
    pub fn clear(&self) {
        lock(&self.dispatched).clear();
    }
}

#[async_trait]
impl ActionDispatcher for MockDispatcher {
    async fn dispatch(&self, action: &RecoveryAction) -> Result<()> {
        lock(&self.dispatched).push(action.clone());

        if self.failing_kinds.contains(&action.kind())
            || self.failing_endpoints.contains(action.endpoint())
        {
            bail!("{} failed", action)
        }
        Ok(())
    }
}

/// Sleeper that records requested durations and returns immediately.
#[derive(Debug, Default)]
pub struct MockSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl MockSleeper {
    /// Create a sleeper with no recorded sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

#[async_trait]
impl Sleeper for MockSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
    }
}
