//! The watch loop.
//!
//! [`Watchdog`] wires the collaborators together and runs one cycle at a
//! time:
//!
//! ```text
//! StatusSource ──> StatusParser ──> StallDetector ──> RecoveryOrchestrator
//!                                                            │
//!        Sleeper <── LoopState update <── ActionDispatcher <─┘
//! ```
//!
//! Actions within a cycle are dispatched strictly in plan order, each one
//! awaited before the next starts. A failed action is logged and counted;
//! it is never retried within the cycle and never changes the plan. The
//! next cycle is the retry mechanism.

use crate::config::WatchdogConfig;
use crate::error::Result;
use crate::recovery::{CyclePlan, LoopState, RecoveryOrchestrator};
use crate::schedule::Cadence;
use crate::snapshot::{StatusParser, TickSnapshot};
use crate::stall::{Observation, StallDetector};
use crate::testing::{ActionDispatcher, Sleeper, StatusSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 1-indexed cycle number
    pub cycle: u64,
    /// When the status was read
    pub observed_at: DateTime<Utc>,
    /// Effective snapshot
    pub snapshot: Option<TickSnapshot>,
    /// End tick of the current epoch, unknown without a snapshot
    pub end_tick: Option<u64>,
    /// Ticks left until the end tick (negative once passed)
    pub distance_to_end_tick: Option<i128>,
    /// Whether the snapshot equals the previous cycle's
    pub tick_unchanged: bool,
    /// Consecutive unchanged cycles
    pub unchanged_count: u32,
    /// Whether the cycle ran the stall response
    pub stalled: bool,
    /// Why the status could not be read, on error cycles
    pub error: Option<String>,
    pub escalation_fired: bool,
    pub refresh_fired: bool,
    pub reissue_fired: bool,
    /// Actions attempted this cycle
    pub actions_dispatched: usize,
    /// Actions that reported failure
    pub dispatch_failures: usize,
    /// Which delay follows this cycle
    pub cadence: Cadence,
    /// Length of that delay in seconds
    pub sleep_secs: u64,
}

impl CycleReport {
    fn new(
        cycle: u64,
        observed_at: DateTime<Utc>,
        observation: &Observation,
        plan: &CyclePlan,
        ticks_per_epoch: u64,
        sleep: Duration,
    ) -> Self {
        Self {
            cycle,
            observed_at,
            snapshot: observation.snapshot,
            end_tick: observation.snapshot.map(|s| s.end_tick(ticks_per_epoch)),
            distance_to_end_tick: observation
                .snapshot
                .map(|s| s.distance_to_end_tick(ticks_per_epoch)),
            tick_unchanged: observation.tick_unchanged,
            unchanged_count: observation.unchanged_count,
            stalled: observation.stalled,
            error: observation.error.clone(),
            escalation_fired: plan.escalation_fired,
            refresh_fired: plan.refresh_fired,
            reissue_fired: plan.reissue_fired,
            actions_dispatched: plan.actions.len(),
            dispatch_failures: 0,
            cadence: plan.cadence,
            sleep_secs: sleep.as_secs(),
        }
    }
}

/// Supervises the primary node and drives recovery.
pub struct Watchdog<S, D, Z> {
    config: WatchdogConfig,
    parser: StatusParser,
    detector: StallDetector,
    orchestrator: RecoveryOrchestrator,
    state: LoopState,
    cycles: u64,
    source: S,
    dispatcher: D,
    sleeper: Z,
}

impl<S, D, Z> Watchdog<S, D, Z>
where
    S: StatusSource,
    D: ActionDispatcher,
    Z: Sleeper,
{
    /// Create a watchdog with empty loop state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WatchdogConfig, source: S, dispatcher: D, sleeper: Z) -> Result<Self> {
        config.validate()?;
        let orchestrator = RecoveryOrchestrator::new(
            config.endpoints.clone(),
            config.ticks_per_epoch,
            config.role_pair()?,
        );

        Ok(Self {
            parser: StatusParser::new()?,
            detector: StallDetector::new(),
            orchestrator,
            state: LoopState::new(),
            cycles: 0,
            config,
            source,
            dispatcher,
            sleeper,
        })
    }

    /// State carried into the next cycle.
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Number of completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The active configuration.
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// The status source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The action dispatcher.
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// The sleeper.
    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    /// Run one cycle without the trailing sleep.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let status = match self.config.primary() {
            Some(primary) => self.source.query_status(primary).await,
            None => Err(anyhow::anyhow!("no primary node configured")),
        };
        let observed_at = Utc::now();

        let input = self.parser.read(status);
        let observation = self.detector.observe(input, &self.state);
        let plan = self.orchestrator.plan(&observation, &self.state);
        let sleep = plan.cadence.duration(self.config.poll_interval());

        let mut report = CycleReport::new(
            self.cycles + 1,
            observed_at,
            &observation,
            &plan,
            self.config.ticks_per_epoch,
            sleep,
        );
        self.log_observation(&report);

        if observation.stalled {
            warn!(
                unchanged = observation.unchanged_count,
                error_cycle = observation.is_error_cycle(),
                escalate = plan.escalation_fired,
                refresh = plan.refresh_fired,
                "Tick progress stalled, running recovery"
            );
        }

        for action in &plan.actions {
            info!("Executing: {}", action);
            if let Err(err) = self.dispatcher.dispatch(action).await {
                report.dispatch_failures += 1;
                let detail = format!("{err:#}");
                warn!(action = %action, error = %detail, "Action failed");
            }
        }

        self.state = plan.next_state;
        self.cycles += 1;

        debug!(
            cycle = report.cycle,
            cadence = %report.cadence,
            sleep_secs = report.sleep_secs,
            failures = report.dispatch_failures,
            "Cycle complete"
        );
        report
    }

    /// Run cycles, sleeping between them.
    ///
    /// With `max_cycles` of `None` this never returns. Otherwise it returns
    /// the number of cycles run once the bound is reached, without sleeping
    /// after the last one.
    pub async fn run(&mut self, max_cycles: Option<u64>) -> u64 {
        info!(
            nodes = self.config.endpoints.len(),
            ticks_per_epoch = self.config.ticks_per_epoch,
            interval_minutes = self.config.poll_interval_minutes,
            "Watchdog started"
        );

        let mut completed = 0;
        loop {
            let report = self.run_cycle().await;
            completed += 1;

            if max_cycles.is_some_and(|max| completed >= max) {
                info!(cycles = completed, "Cycle limit reached");
                return completed;
            }

            self.sleeper.sleep(Duration::from_secs(report.sleep_secs)).await;
        }
    }

    fn log_observation(&self, report: &CycleReport) {
        if let Some(error) = &report.error {
            warn!(cycle = report.cycle, error = %error, "Status unavailable");
        }

        match (report.snapshot, report.end_tick, report.distance_to_end_tick) {
            (Some(snapshot), Some(end_tick), Some(distance)) => info!(
                cycle = report.cycle,
                tick = snapshot.latest_tick,
                epoch = snapshot.current_epoch,
                initial_tick = snapshot.initial_tick,
                end_tick,
                exceeded = distance < 0,
                distance = %distance,
                unchanged = report.unchanged_count,
                "Current info"
            ),
            _ => info!(
                cycle = report.cycle,
                unchanged = report.unchanged_count,
                "Current info unknown, end tick unknown"
            ),
        }
    }
}
