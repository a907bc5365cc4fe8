use serde::{Deserialize, Serialize};

use opt_types::{BestSnapshot, MetricBag, ParameterVector};

/// One observable event in a session's lifetime, published on the
/// [`crate::EventBus`] independent of the client channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { session_id: String },
    TrialRequested { session_id: String, trial: u32, params: ParameterVector },
    TrialCompleted {
        session_id: String,
        trial: u32,
        metrics: MetricBag,
        objective: f64,
        filters_passed: bool,
    },
    BestUpdated { session_id: String, best: BestSnapshot },
    Terminated { session_id: String, reason: String },
}
