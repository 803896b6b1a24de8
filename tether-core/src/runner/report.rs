//! Terminal record of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The computation finished without reporting an error.
    Completed { value: Option<String> },
    /// The computation reported a semantic failure.
    Failed { text: String },
    /// The computation unwound after a stop request.
    Cancelled { text: String },
    /// The entry point broke outside its error channel (error or panic).
    HostFault { text: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::Failed { .. } => "failed",
            RunOutcome::Cancelled { .. } => "cancelled",
            RunOutcome::HostFault { .. } => "host_fault",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub session: SessionId,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunReport {
    pub fn new(session: SessionId, outcome: RunOutcome, started_at: DateTime<Utc>) -> Self {
        let finished_at = Utc::now();
        Self {
            session,
            outcome,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }
    }
}
