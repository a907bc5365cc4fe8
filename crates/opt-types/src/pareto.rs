use serde::{Deserialize, Serialize};

use crate::parameter::{MetricBag, ParameterVector};

pub const PARETO_FRONT_MAX: usize = 20;

/// One non-dominated solution in a Pareto front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoSolution {
    pub params: ParameterVector,
    pub metrics: MetricBag,
    pub scalarized: f64,
    /// Raw per-objective values, in `Settings::target_metrics` order,
    /// under maximization convention (used for dominance checks).
    pub objectives: Vec<f64>,
}

/// Set of at most [`PARETO_FRONT_MAX`] non-dominated solutions. Domination
/// assumes maximization; a solution already on the front is removed when a
/// newly added one dominates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParetoFront {
    solutions: Vec<ParetoSolution>,
}

fn dominates(a: &[f64], b: &[f64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).all(|(x, y)| *x >= y) && a.iter().zip(b).any(|(x, y)| *x > y)
}

impl ParetoFront {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solutions(&self) -> &[ParetoSolution] {
        &self.solutions
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Inserts `candidate` if it is not dominated by any current member,
    /// removing any current members it dominates, then caps the front at
    /// [`PARETO_FRONT_MAX`] by dropping the weakest (lowest `scalarized`)
    /// entries.
    pub fn offer(&mut self, candidate: ParetoSolution) {
        if self
            .solutions
            .iter()
            .any(|existing| dominates(&existing.objectives, &candidate.objectives))
        {
            return;
        }
        self.solutions
            .retain(|existing| !dominates(&candidate.objectives, &existing.objectives));
        self.solutions.push(candidate);
        if self.solutions.len() > PARETO_FRONT_MAX {
            self.solutions
                .sort_by(|a, b| b.scalarized.partial_cmp(&a.scalarized).unwrap());
            self.solutions.truncate(PARETO_FRONT_MAX);
        }
    }

    /// `true` iff no element of the front is dominated by another element
    /// of the front (the antichain property, spec.md §8 invariant 8).
    pub fn is_antichain(&self) -> bool {
        for (i, a) in self.solutions.iter().enumerate() {
            for (j, b) in self.solutions.iter().enumerate() {
                if i != j && dominates(&b.objectives, &a.objectives) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sol(objectives: Vec<f64>, scalarized: f64) -> ParetoSolution {
        ParetoSolution {
            params: ParameterVector::new(),
            metrics: MetricBag::new(),
            scalarized,
            objectives,
        }
    }

    #[test]
    fn dominated_candidate_is_rejected() {
        let mut front = ParetoFront::new();
        front.offer(sol(vec![5.0, 5.0], 10.0));
        front.offer(sol(vec![1.0, 1.0], 2.0));
        assert_eq!(front.len(), 1);
        assert_eq!(front.solutions()[0].objectives, vec![5.0, 5.0]);
    }

    #[test]
    fn dominating_candidate_evicts_existing() {
        let mut front = ParetoFront::new();
        front.offer(sol(vec![1.0, 1.0], 2.0));
        front.offer(sol(vec![5.0, 5.0], 10.0));
        assert_eq!(front.len(), 1);
        assert_eq!(front.solutions()[0].objectives, vec![5.0, 5.0]);
    }

    #[test]
    fn non_dominated_solutions_coexist() {
        let mut front = ParetoFront::new();
        front.offer(sol(vec![5.0, 1.0], 3.0));
        front.offer(sol(vec![1.0, 5.0], 3.0));
        assert_eq!(front.len(), 2);
        assert!(front.is_antichain());
    }

    #[test]
    fn front_is_capped_at_max_size() {
        let mut front = ParetoFront::new();
        for i in 0..(PARETO_FRONT_MAX + 10) {
            let value = i as f64;
            front.offer(sol(vec![value, (PARETO_FRONT_MAX as f64 * 2.0) - value], value));
        }
        assert!(front.len() <= PARETO_FRONT_MAX);
        assert!(front.is_antichain());
    }
}
