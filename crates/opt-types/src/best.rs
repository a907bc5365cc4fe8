use serde::{Deserialize, Serialize};

use crate::parameter::{MetricBag, ParameterVector};

/// The best trial observed so far, by raw target-metric value. Exists iff
/// at least one trial has passed all filters; monotonically improving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestSnapshot {
    pub metric: f64,
    pub trial_number: u32,
    pub params: ParameterVector,
    pub metrics: MetricBag,
}

impl BestSnapshot {
    /// Replaces `current` with `candidate` iff the candidate strictly
    /// improves on it (or none exists yet), per spec.md §4.3 "Best-snapshot
    /// maintenance: update iff filters_passed ∧ metric_value > best.metric
    /// (strict)".
    pub fn consider(
        current: Option<BestSnapshot>,
        candidate_metric: f64,
        trial_number: u32,
        params: &ParameterVector,
        metrics: &MetricBag,
    ) -> Option<BestSnapshot> {
        let improves = match &current {
            None => true,
            Some(best) => candidate_metric > best.metric,
        };
        if improves {
            Some(BestSnapshot {
                metric: candidate_metric,
                trial_number,
                params: params.clone(),
                metrics: metrics.clone(),
            })
        } else {
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_always_becomes_best() {
        let best = BestSnapshot::consider(None, 5.0, 0, &ParameterVector::new(), &MetricBag::new());
        assert_eq!(best.unwrap().metric, 5.0);
    }

    #[test]
    fn strictly_worse_candidate_is_rejected() {
        let current = BestSnapshot {
            metric: 10.0,
            trial_number: 0,
            params: ParameterVector::new(),
            metrics: MetricBag::new(),
        };
        let best = BestSnapshot::consider(
            Some(current),
            10.0,
            1,
            &ParameterVector::new(),
            &MetricBag::new(),
        );
        assert_eq!(best.unwrap().trial_number, 0);
    }

    #[test]
    fn strictly_better_candidate_replaces_best() {
        let current = BestSnapshot {
            metric: 10.0,
            trial_number: 0,
            params: ParameterVector::new(),
            metrics: MetricBag::new(),
        };
        let best = BestSnapshot::consider(
            Some(current),
            10.1,
            1,
            &ParameterVector::new(),
            &MetricBag::new(),
        );
        assert_eq!(best.unwrap().trial_number, 1);
    }
}
