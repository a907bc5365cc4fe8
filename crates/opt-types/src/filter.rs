use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterComparator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
}

impl FilterComparator {
    pub fn evaluate(self, value: f64, threshold: f64) -> bool {
        match self {
            FilterComparator::Gte => value >= threshold,
            FilterComparator::Lte => value <= threshold,
            FilterComparator::Gt => value > threshold,
            FilterComparator::Lt => value < threshold,
            FilterComparator::Eq => (value - threshold).abs() < f64::EPSILON,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterComparator::Gte => ">=",
            FilterComparator::Lte => "<=",
            FilterComparator::Gt => ">",
            FilterComparator::Lt => "<",
            FilterComparator::Eq => "=",
        }
    }
}

/// A single filter predicate: `metric <comparator> threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub metric: String,
    pub comparator: FilterComparator,
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparators_evaluate_correctly() {
        assert!(FilterComparator::Gte.evaluate(60.0, 60.0));
        assert!(!FilterComparator::Gt.evaluate(60.0, 60.0));
        assert!(FilterComparator::Lte.evaluate(59.9, 60.0));
        assert!(FilterComparator::Eq.evaluate(1.0, 1.0));
    }
}
