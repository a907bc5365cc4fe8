use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// The target-metric/budget/filter configuration for one optimisation
/// session. `target_metrics` has exactly one entry in the common
/// single-objective case; two or more entries enable the multi-objective
/// scalarization path (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub target_metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    pub trials: u32,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub use_custom_range: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("no target metric declared")]
    NoTargetMetric,
    #[error("trials must be between 1 and 5000, got {0}")]
    TrialsOutOfRange(u32),
    #[error("weights length ({weights}) does not match target_metrics length ({metrics})")]
    WeightsMismatch { weights: usize, metrics: usize },
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.target_metrics.is_empty() {
            return Err(SettingsError::NoTargetMetric);
        }
        if self.trials < 1 || self.trials > 5000 {
            return Err(SettingsError::TrialsOutOfRange(self.trials));
        }
        if let Some(weights) = &self.weights {
            if weights.len() != self.target_metrics.len() {
                return Err(SettingsError::WeightsMismatch {
                    weights: weights.len(),
                    metrics: self.target_metrics.len(),
                });
            }
        }
        Ok(())
    }

    pub fn is_multi_objective(&self) -> bool {
        self.target_metrics.len() >= 2
    }

    /// Per-metric weights normalized to sum to 1, defaulting to an equal
    /// split when the caller did not supply explicit weights.
    pub fn normalized_weights(&self) -> Vec<f64> {
        let n = self.target_metrics.len().max(1);
        let raw = self
            .weights
            .clone()
            .unwrap_or_else(|| vec![1.0 / n as f64; n]);
        let sum: f64 = raw.iter().sum();
        if sum <= 0.0 {
            return vec![1.0 / n as f64; n];
        }
        raw.iter().map(|w| w / sum).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings {
            target_metrics: vec!["net-profit".to_string()],
            weights: None,
            trials: 10,
            filters: Vec::new(),
            use_custom_range: false,
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn rejects_no_target_metric() {
        let mut settings = base();
        settings.target_metrics.clear();
        assert_eq!(settings.validate(), Err(SettingsError::NoTargetMetric));
    }

    #[test]
    fn rejects_trials_out_of_range() {
        let mut settings = base();
        settings.trials = 0;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::TrialsOutOfRange(0))
        );
        settings.trials = 5001;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::TrialsOutOfRange(5001))
        );
    }

    #[test]
    fn normalized_weights_sum_to_one() {
        let mut settings = base();
        settings.target_metrics = vec!["a".into(), "b".into(), "c".into()];
        settings.weights = Some(vec![1.0, 1.0, 2.0]);
        let weights = settings.normalized_weights();
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((weights[2] - 0.5).abs() < 1e-9);
    }
}
