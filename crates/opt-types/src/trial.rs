use serde::{Deserialize, Serialize};

use crate::parameter::{MetricBag, ParameterVector};

/// One proposal/result pair in a session, identified by a dense monotonic
/// integer assigned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub number: u32,
    pub params: ParameterVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricBag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    #[serde(default)]
    pub filters_passed: bool,
    #[serde(default)]
    pub filter_reasons: Vec<String>,
    #[serde(default)]
    pub is_best: bool,
}

impl Trial {
    pub fn proposed(number: u32, params: ParameterVector) -> Self {
        Self {
            number,
            params,
            metrics: None,
            objective: None,
            filters_passed: false,
            filter_reasons: Vec::new(),
            is_best: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.metrics.is_some()
    }
}

/// Large negative constant assigned to invalid trials so they are never
/// selected as best (spec.md GLOSSARY: Penalty score).
pub const PENALTY_SCORE: f64 = -1.0e9;
