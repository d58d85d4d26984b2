//! Tick status snapshots and the status report parser.
//!
//! The node tool prints its tick status as free-form text. Three lines carry
//! the values the watchdog cares about:
//!
//! ```text
//! Tick: 15200431
//! Epoch: 142
//! Initial tick: 15190000
//! ```
//!
//! [`StatusParser`] turns such a report into a [`TickSnapshot`] on an
//! all-or-nothing basis: either every field is present, or the report is a
//! parse failure. Reports carrying an error marker are classified as query
//! errors before any parsing is attempted.
//!
//! # Example
//!
//! ```
//! use tickwatch::snapshot::StatusParser;
//!
//! let parser = StatusParser::new().unwrap();
//! let snapshot = parser.parse("Tick: 960\nEpoch: 1\nInitial tick: 1\n").unwrap();
//! assert_eq!(snapshot.latest_tick, 960);
//! assert_eq!(snapshot.end_tick(1000), 951);
//! ```

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Distance before the nominal epoch boundary at which the primary node is
/// considered overdue for an epoch rollover.
pub const END_TICK_MARGIN: u64 = 50;

/// Substrings that mark a status report as a failed query.
pub const ERROR_MARKERS: &[&str] = &["Error", "Failed"];

/// One node's reported progress at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Most recent tick reported by the node
    pub latest_tick: u64,
    /// Active epoch index
    pub current_epoch: u64,
    /// Tick at which the current epoch began
    pub initial_tick: u64,
}

impl TickSnapshot {
    /// Create a snapshot from its three fields.
    #[must_use]
    pub fn new(latest_tick: u64, current_epoch: u64, initial_tick: u64) -> Self {
        Self {
            latest_tick,
            current_epoch,
            initial_tick,
        }
    }

    /// Tick past which the epoch should already have rolled over.
    ///
    /// `ticks_per_epoch` must exceed [`END_TICK_MARGIN`]; configuration
    /// validation guarantees this for the running watchdog.
    #[must_use]
    pub fn end_tick(&self, ticks_per_epoch: u64) -> u64 {
        self.initial_tick
            .saturating_add(ticks_per_epoch)
            .saturating_sub(END_TICK_MARGIN)
    }

    /// Whether the latest tick has moved beyond the end tick.
    #[must_use]
    pub fn has_passed_end_tick(&self, ticks_per_epoch: u64) -> bool {
        self.latest_tick > self.end_tick(ticks_per_epoch)
    }

    /// Signed number of ticks remaining until the end tick.
    ///
    /// Negative once the end tick has been passed.
    #[must_use]
    pub fn distance_to_end_tick(&self, ticks_per_epoch: u64) -> i128 {
        i128::from(self.end_tick(ticks_per_epoch)) - i128::from(self.latest_tick)
    }

    /// The epoch the cluster should be advanced to.
    #[must_use]
    pub fn next_epoch(&self) -> u64 {
        self.current_epoch.saturating_add(1)
    }
}

impl std::fmt::Display for TickSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tick {} (epoch {}, initial tick {})",
            self.latest_tick, self.current_epoch, self.initial_tick
        )
    }
}

/// Fields a status report must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    Tick,
    Epoch,
    InitialTick,
}

impl StatusField {
    /// Label as printed by the node tool.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            StatusField::Tick => "Tick",
            StatusField::Epoch => "Epoch",
            StatusField::InitialTick => "Initial tick",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "Tick" => Some(StatusField::Tick),
            "Epoch" => Some(StatusField::Epoch),
            "Initial tick" => Some(StatusField::InitialTick),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Why a status report did not yield a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// One or more required lines were absent or unreadable
    #[error("status report is missing {}", format_fields(.0))]
    MissingFields(Vec<StatusField>),
}

fn format_fields(fields: &[StatusField]) -> String {
    fields
        .iter()
        .map(StatusField::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of reading one status query, as consumed by the stall detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleInput {
    /// A fully populated snapshot
    Snapshot(TickSnapshot),
    /// The query failed or its output carried an error marker
    QueryFailed(String),
    /// The query answered but the report lacked required fields
    ParseFailed(String),
}

impl CycleInput {
    /// Whether this input makes the current cycle an error cycle.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(self, CycleInput::Snapshot(_))
    }
}

/// Check whether a status report carries an error marker.
#[must_use]
pub fn contains_error_marker(text: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Parser for the node tool's status reports.
#[derive(Debug, Clone)]
pub struct StatusParser {
    line_re: Regex,
}

impl StatusParser {
    /// Build a parser.
    ///
    /// # Errors
    ///
    /// Returns an error if the line pattern fails to compile.
    pub fn new() -> crate::Result<Self> {
        // Label pattern: "<label>: <value>" at the start of a trimmed line
        let line_re = Regex::new(r"^(Tick|Epoch|Initial tick):\s*(.*)$")
            .context("Failed to compile status line regex")?;
        Ok(Self { line_re })
    }

    /// Parse a status report into a snapshot.
    ///
    /// Unrecognized lines are ignored and the last occurrence of a repeated
    /// label wins. A label whose value is not an unsigned integer counts as
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingFields`] naming every field that
    /// could not be read.
    pub fn parse(&self, text: &str) -> std::result::Result<TickSnapshot, SnapshotError> {
        let mut tick = None;
        let mut epoch = None;
        let mut initial_tick = None;

        for line in text.lines() {
            let Some(caps) = self.line_re.captures(line.trim()) else {
                continue;
            };
            let Some(field) = StatusField::from_label(&caps[1]) else {
                continue;
            };
            let value = caps[2].trim().parse::<u64>().ok();
            if value.is_none() {
                tracing::debug!(field = %field, raw = &caps[2], "Unreadable status value");
            }
            match field {
                StatusField::Tick => tick = value,
                StatusField::Epoch => epoch = value,
                StatusField::InitialTick => initial_tick = value,
            }
        }

        match (tick, epoch, initial_tick) {
            (Some(latest_tick), Some(current_epoch), Some(initial_tick)) => {
                Ok(TickSnapshot::new(latest_tick, current_epoch, initial_tick))
            }
            _ => {
                let missing = [
                    (StatusField::Tick, tick.is_none()),
                    (StatusField::Epoch, epoch.is_none()),
                    (StatusField::InitialTick, initial_tick.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
                Err(SnapshotError::MissingFields(missing))
            }
        }
    }

    /// Classify the raw result of a status query.
    ///
    /// A failed query, or output containing an error marker, becomes
    /// [`CycleInput::QueryFailed`]; output without every required field
    /// becomes [`CycleInput::ParseFailed`].
    #[must_use]
    pub fn read(&self, status: anyhow::Result<String>) -> CycleInput {
        let text = match status {
            Ok(text) => text,
            Err(err) => return CycleInput::QueryFailed(format!("{err:#}")),
        };

        if contains_error_marker(&text) {
            return CycleInput::QueryFailed(text.trim().to_string());
        }

        match self.parse(&text) {
            Ok(snapshot) => CycleInput::Snapshot(snapshot),
            Err(err) => CycleInput::ParseFailed(err.to_string()),
        }
    }
}
