use serde::{Deserialize, Serialize};
use thiserror::Error;

use opt_types::{BestSnapshot, MetricBag, ParameterVector};

use crate::config::OptimisationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResultPayload {
    pub metrics: MetricBag,
    #[serde(default, rename = "passedFilters", skip_serializing_if = "Option::is_none")]
    pub passed_filters: Option<bool>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageValidationError {
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("metric `{0}` has a non-finite value")]
    NonFiniteMetric(String),
    #[error("message is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Messages sent from the evaluator client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Start {
        config: OptimisationConfig,
    },
    #[serde(rename = "trial-result")]
    TrialResult {
        trial: u32,
        payload: TrialResultPayload,
    },
    Stop,
}

impl ClientMessage {
    /// Validates that every metric value in a `trial-result` payload is
    /// finite; `start`/`stop` always validate (spec.md §4.5: "Payload
    /// numbers must be finite; NaN/∞ is an error").
    pub fn validate(&self) -> Result<(), MessageValidationError> {
        if let ClientMessage::TrialResult { payload, .. } = self {
            for (metric, value) in &payload.metrics {
                if !value.is_finite() {
                    return Err(MessageValidationError::NonFiniteMetric(metric.clone()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
}

/// Messages sent from the server to the evaluator client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Status {
        message: String,
    },
    #[serde(rename = "trial-request")]
    TrialRequest {
        trial: u32,
        params: ParameterVector,
    },
    #[serde(rename = "trial-complete")]
    TrialComplete {
        trial: u32,
        params: ParameterVector,
        metrics: MetricBag,
        #[serde(rename = "passedFilters")]
        passed_filters: bool,
        #[serde(rename = "filterReasons", skip_serializing_if = "Vec::is_empty", default)]
        filter_reasons: Vec<String>,
        objective: f64,
        progress: Progress,
        best: Option<BestSnapshot>,
    },
    Complete {
        reason: TerminationReason,
        best: Option<BestSnapshot>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Finished,
    Stopped,
    Error,
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        ServerMessage::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
