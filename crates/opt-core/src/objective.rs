use serde::{Deserialize, Serialize};

use opt_types::{Filter, MetricBag, Settings, PENALTY_SCORE};

/// Optional per-target-metric transform, applied only to the scalar
/// objective; `metric_value` in [`Evaluation`] always carries the raw value
/// (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricTransform {
    /// `log(x + 1)` for `x > 0`; identity otherwise.
    Log,
    /// Minimization target encoded as `-x`.
    SignFlip,
    /// Clamp to `[-cap, cap]`.
    OutlierCap(f64),
}

impl MetricTransform {
    fn apply(self, x: f64) -> f64 {
        match self {
            MetricTransform::Log => {
                if x > 0.0 {
                    (x + 1.0).ln()
                } else {
                    x
                }
            }
            MetricTransform::SignFlip => -x,
            MetricTransform::OutlierCap(cap) => x.clamp(-cap, cap),
        }
    }
}

/// Result of scoring one trial's reported metrics against a target metric
/// and a filter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metric_value: Option<f64>,
    pub filters_passed: bool,
    pub filter_reasons: Vec<String>,
    pub objective: f64,
    /// Raw per-target values in `Settings::target_metrics` order, under
    /// maximization convention, for Pareto-front dominance checks. Empty
    /// unless multi-objective.
    pub objectives: Vec<f64>,
}

/// Scores a reported metric bag against one target metric and a filter
/// list, producing a scalar objective with penalty quarantine (spec.md
/// §4.3). Single-target use; `ObjectiveBuilder::evaluate_multi` handles the
/// ≥2-target scalarization path.
pub struct ObjectiveBuilder {
    pub target_metric: String,
    pub filters: Vec<Filter>,
    pub transform: Option<MetricTransform>,
}

impl ObjectiveBuilder {
    pub fn new(target_metric: impl Into<String>, filters: Vec<Filter>) -> Self {
        ObjectiveBuilder {
            target_metric: target_metric.into(),
            filters,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: MetricTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn evaluate(&self, metrics: &MetricBag) -> Evaluation {
        let Some(&raw) = metrics.get(&self.target_metric) else {
            return Evaluation {
                metric_value: None,
                filters_passed: false,
                filter_reasons: vec![format!("{} unavailable", self.target_metric)],
                objective: PENALTY_SCORE,
                objectives: Vec::new(),
            };
        };

        let (filters_passed, filter_reasons) = evaluate_filters(&self.filters, metrics);
        let objective = if filters_passed {
            self.transform.map(|t| t.apply(raw)).unwrap_or(raw)
        } else {
            PENALTY_SCORE
        };

        Evaluation {
            metric_value: Some(raw),
            filters_passed,
            filter_reasons,
            objective,
            objectives: Vec::new(),
        }
    }

    /// Multi-objective scalarization: weighted sum of per-target raw values
    /// (normalized weights), Pareto-tracked independently via `objectives`.
    pub fn evaluate_multi(&self, settings: &Settings, metrics: &MetricBag) -> Evaluation {
        if settings.target_metrics.len() < 2 {
            return self.evaluate(metrics);
        }

        let mut objectives = Vec::with_capacity(settings.target_metrics.len());
        let mut missing = Vec::new();
        for metric_id in &settings.target_metrics {
            match metrics.get(metric_id) {
                Some(&v) => objectives.push(v),
                None => {
                    missing.push(format!("{metric_id} unavailable"));
                    objectives.push(0.0);
                }
            }
        }

        if !missing.is_empty() {
            return Evaluation {
                metric_value: None,
                filters_passed: false,
                filter_reasons: missing,
                objective: PENALTY_SCORE,
                objectives: Vec::new(),
            };
        }

        let (filters_passed, mut filter_reasons) = evaluate_filters(&self.filters, metrics);
        if !filters_passed {
            return Evaluation {
                metric_value: Some(objectives[0]),
                filters_passed,
                filter_reasons: std::mem::take(&mut filter_reasons),
                objective: PENALTY_SCORE,
                objectives: Vec::new(),
            };
        }

        let weights = settings.normalized_weights();
        let scalarized: f64 = objectives.iter().zip(&weights).map(|(v, w)| v * w).sum();

        Evaluation {
            metric_value: Some(objectives[0]),
            filters_passed: true,
            filter_reasons,
            objective: scalarized,
            objectives,
        }
    }
}

fn evaluate_filters(filters: &[Filter], metrics: &MetricBag) -> (bool, Vec<String>) {
    let mut passed = true;
    let mut reasons = Vec::new();
    for filter in filters {
        match metrics.get(&filter.metric) {
            None => {
                passed = false;
                reasons.push(format!("{} unavailable", filter.metric));
            }
            Some(&value) => {
                if !filter.comparator.evaluate(value, filter.threshold) {
                    passed = false;
                    reasons.push(format!(
                        "{} {} {} failed ({} = {})",
                        filter.metric,
                        filter.comparator.as_str(),
                        filter.threshold,
                        filter.metric,
                        value
                    ));
                }
            }
        }
    }
    (passed, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;

    use opt_types::FilterComparator;

    fn metrics(pairs: &[(&str, f64)]) -> MetricBag {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn missing_target_metric_is_penalized() {
        let builder = ObjectiveBuilder::new("net-profit", Vec::new());
        let eval = builder.evaluate(&metrics(&[]));
        assert_eq!(eval.metric_value, None);
        assert!(!eval.filters_passed);
        assert_eq!(eval.objective, PENALTY_SCORE);
        assert_eq!(eval.filter_reasons, vec!["net-profit unavailable"]);
    }

    #[test]
    fn passing_trial_uses_raw_metric_as_objective() {
        let builder = ObjectiveBuilder::new("net-profit", Vec::new());
        let eval = builder.evaluate(&metrics(&[("net-profit", 5.0)]));
        assert_eq!(eval.metric_value, Some(5.0));
        assert!(eval.filters_passed);
        assert_eq!(eval.objective, 5.0);
    }

    #[test]
    fn failing_filter_penalizes_even_with_present_target() {
        let builder = ObjectiveBuilder::new(
            "net-profit",
            vec![Filter {
                metric: "win-rate".to_string(),
                comparator: FilterComparator::Gte,
                threshold: 60.0,
            }],
        );
        let eval = builder.evaluate(&metrics(&[("net-profit", 100.0), ("win-rate", 40.0)]));
        assert!(!eval.filters_passed);
        assert_eq!(eval.objective, PENALTY_SCORE);
        assert_eq!(eval.metric_value, Some(100.0));
    }

    #[test]
    fn sign_flip_transform_negates_objective_only() {
        let builder =
            ObjectiveBuilder::new("cost", Vec::new()).with_transform(MetricTransform::SignFlip);
        let eval = builder.evaluate(&metrics(&[("cost", 3.0)]));
        assert_eq!(eval.metric_value, Some(3.0));
        assert_eq!(eval.objective, -3.0);
    }

    #[test]
    fn multi_objective_scalarizes_with_normalized_weights() {
        let settings = Settings {
            target_metrics: vec!["a".into(), "b".into()],
            weights: Some(vec![1.0, 3.0]),
            trials: 10,
            filters: Vec::new(),
            use_custom_range: false,
            start_date: None,
            end_date: None,
        };
        let builder = ObjectiveBuilder::new("a", Vec::new());
        let eval = builder.evaluate_multi(&settings, &metrics(&[("a", 4.0), ("b", 8.0)]));
        assert_eq!(eval.objectives, vec![4.0, 8.0]);
        assert_eq!(eval.objective, 0.25 * 4.0 + 0.75 * 8.0);
    }

    #[test]
    fn multi_objective_missing_target_is_penalized() {
        let settings = Settings {
            target_metrics: vec!["a".into(), "b".into()],
            weights: None,
            trials: 10,
            filters: Vec::new(),
            use_custom_range: false,
            start_date: None,
            end_date: None,
        };
        let builder = ObjectiveBuilder::new("a", Vec::new());
        let eval = builder.evaluate_multi(&settings, &metrics(&[("a", 4.0)]));
        assert_eq!(eval.objective, PENALTY_SCORE);
        assert!(eval.objectives.is_empty());
    }
}
