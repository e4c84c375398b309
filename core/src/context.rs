//! Evaluation context captured once per selection run.

use chrono::{DateTime, Utc};

/// Per-run evaluation state.
///
/// Relative time specs (`newer_than(-7d)`) resolve against [`now`](Self::now), which is
/// captured once so that every comparison in a run sees the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    now: DateTime<Utc>,
}

impl EvalContext {
    /// Capture the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Use a fixed current time.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// The captured current time.
    #[must_use]
    pub fn current_time(&self) -> DateTime<Utc> {
        self.now
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::now()
    }
}
