//! Stage tracking for a run
//!
//! A run moves forward through a fixed list of stages and never goes back.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

/// Lifecycle stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    Start,
    Install,
    Credentials,
    Netrc,
    Sequence,
    Extract,
    Transform,
    Done,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Start => "start",
            RunStage::Install => "install",
            RunStage::Credentials => "credentials",
            RunStage::Netrc => "netrc",
            RunStage::Sequence => "sequence",
            RunStage::Extract => "extract",
            RunStage::Transform => "transform",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Failed)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTransition {
    pub from: RunStage,
    pub to: RunStage,
    pub timestamp: DateTime<Utc>,
}

/// Records the stages a run passes through
#[derive(Debug)]
pub struct StageTracker {
    current: RunStage,
    transitions: Vec<StageTransition>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: RunStage::Start,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RunStage {
        self.current
    }

    /// Move to `to`
    ///
    /// Only forward moves are recorded; `Failed` is reachable from any
    /// non-terminal stage. Returns whether the transition was applied.
    pub fn advance(&mut self, to: RunStage) -> bool {
        if self.current.is_terminal() || to <= self.current {
            return false;
        }

        info!(from = %self.current, to = %to, "stage");
        self.transitions.push(StageTransition {
            from: self.current,
            to,
            timestamp: Utc::now(),
        });
        self.current = to;
        true
    }

    pub fn fail(&mut self) -> bool {
        self.advance(RunStage::Failed)
    }

    /// Stages visited, starting with `Start`
    pub fn path(&self) -> Vec<RunStage> {
        std::iter::once(RunStage::Start)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    /// Milliseconds between the first and the last transition
    pub fn elapsed_ms(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Transition history as human-readable lines
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| format!("{}: {} → {}", t.timestamp.to_rfc3339(), t.from, t.to))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
