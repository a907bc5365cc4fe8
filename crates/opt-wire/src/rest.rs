use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// REST variant of `start`: bounds plus sampler parameters, one call per
/// optimisation run. Mirrors the evaluator-facing `/init` contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitRequest {
    pub pbounds: BTreeMap<String, (f64, f64)>,
    pub init_points: u32,
    pub n_iter: u32,
    #[serde(default = "default_acquisition_type")]
    pub acquisition_type: String,
    #[serde(default = "default_kappa")]
    pub kappa: f64,
    #[serde(default = "default_xi")]
    pub xi: f64,
    #[serde(default)]
    pub parameter_types: BTreeMap<String, String>,
    #[serde(default)]
    pub categorical_mappings: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_target_metrics")]
    pub target_metrics: Vec<String>,
}

fn default_acquisition_type() -> String {
    "ucb".to_string()
}

fn default_kappa() -> f64 {
    2.576
}

fn default_xi() -> f64 {
    0.01
}

fn default_target_metrics() -> Vec<String> {
    vec!["net_profit".to_string()]
}

/// REST variant of `trial-result`: one observed trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserveRequest {
    pub params: BTreeMap<String, f64>,
    pub target: f64,
    #[serde(default)]
    pub additional_metrics: BTreeMap<String, f64>,
}

/// REST variant of `trial-request`/`complete`: the next suggestion, or a
/// `done` signal when the trial budget is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub params: BTreeMap<String, f64>,
    pub done: bool,
    /// Acquisition function value at the suggested point; populated for
    /// surrogate-driven suggestions, `None` during the initial design phase
    /// where points are drawn without an acquisition evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestResponse {
    pub params: BTreeMap<String, f64>,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub iteration: u32,
    pub total_iterations: u32,
    pub best_target: f64,
    pub current_exploration_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: u32,
    pub params: BTreeMap<String, f64>,
    pub target: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_request_defaults_to_ucb() {
        let raw = r#"{"pbounds":{"x":[0.0,1.0]},"init_points":3,"n_iter":7}"#;
        let req: InitRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.acquisition_type, "ucb");
        assert_eq!(req.kappa, 2.576);
        assert_eq!(req.target_metrics, vec!["net_profit".to_string()]);
    }

    #[test]
    fn suggest_response_omits_acquisition_value_when_absent() {
        let response = SuggestResponse {
            params: BTreeMap::new(),
            done: false,
            acquisition_value: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("acquisition_value").is_none());
    }

    #[test]
    fn health_response_reports_crate_version() {
        let health = HealthResponse::default();
        assert_eq!(health.status, "healthy");
        assert!(!health.version.is_empty());
    }
}
