use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A typed search dimension as declared by the caller.
///
/// Mirrors the `ParameterConfig`/`ParameterRange` pair from the original
/// wire schema but collapses them into the internal shape the sampler and
/// objective builder actually operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: DimensionKind,
    pub bounds: Bounds,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Int,
    Float,
    Bool,
    Categorical,
    Ordinal,
}

/// Bounds for a dimension. Numeric kinds use `min`/`max`/`step`; the
/// categorical/ordinal kinds use `labels`. Both fields are present on the
/// wire so a single struct round-trips through JSON regardless of kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DimensionError {
    #[error("dimension `{0}` has min >= max")]
    InvalidRange(String),
    #[error("dimension `{0}` has non-positive step")]
    InvalidStep(String),
    #[error("dimension `{0}` has an empty label list")]
    EmptyLabels(String),
    #[error("dimension `{0}` is missing numeric bounds")]
    MissingNumericBounds(String),
}

impl Dimension {
    /// Validates the invariants from spec.md §3: `min < max` for numeric
    /// kinds, `step > 0` when present, non-empty label list for
    /// categorical/ordinal kinds.
    pub fn validate(&self) -> Result<(), DimensionError> {
        match self.kind {
            DimensionKind::Int | DimensionKind::Float => {
                let (Some(min), Some(max)) = (self.bounds.min, self.bounds.max) else {
                    return Err(DimensionError::MissingNumericBounds(self.id.clone()));
                };
                if !(min < max) {
                    return Err(DimensionError::InvalidRange(self.id.clone()));
                }
                if let Some(step) = self.bounds.step {
                    if !(step > 0.0) {
                        return Err(DimensionError::InvalidStep(self.id.clone()));
                    }
                }
            }
            DimensionKind::Bool => {}
            DimensionKind::Categorical | DimensionKind::Ordinal => {
                if self.bounds.labels.is_empty() {
                    return Err(DimensionError::EmptyLabels(self.id.clone()));
                }
            }
        }
        Ok(())
    }

    /// The arity of a categorical/ordinal dimension's label list; `0` for
    /// numeric/bool kinds.
    pub fn arity(&self) -> usize {
        self.bounds.labels.len()
    }

    /// The range of the dimension's encoded (continuous) form, as used by
    /// the sampler and the GP surrogate.
    pub fn encoded_range(&self) -> (f64, f64) {
        match self.kind {
            DimensionKind::Float | DimensionKind::Int => {
                (self.bounds.min.unwrap_or(0.0), self.bounds.max.unwrap_or(1.0))
            }
            DimensionKind::Bool => (0.0, 1.0),
            DimensionKind::Categorical | DimensionKind::Ordinal => {
                (0.0, (self.arity().saturating_sub(1)) as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(id: &str, min: f64, max: f64, step: Option<f64>) -> Dimension {
        Dimension {
            id: id.to_string(),
            label: None,
            kind: DimensionKind::Float,
            bounds: Bounds {
                min: Some(min),
                max: Some(max),
                step,
                labels: Vec::new(),
            },
            enabled: true,
        }
    }

    #[test]
    fn rejects_inverted_range() {
        let dim = numeric("x", 10.0, 0.0, None);
        assert_eq!(dim.validate(), Err(DimensionError::InvalidRange("x".into())));
    }

    #[test]
    fn rejects_non_positive_step() {
        let dim = numeric("x", 0.0, 10.0, Some(0.0));
        assert_eq!(dim.validate(), Err(DimensionError::InvalidStep("x".into())));
    }

    #[test]
    fn rejects_empty_categorical_labels() {
        let dim = Dimension {
            id: "mode".to_string(),
            label: None,
            kind: DimensionKind::Categorical,
            bounds: Bounds::default(),
            enabled: true,
        };
        assert_eq!(
            dim.validate(),
            Err(DimensionError::EmptyLabels("mode".into()))
        );
    }

    #[test]
    fn categorical_encoded_range_matches_arity() {
        let dim = Dimension {
            id: "mode".to_string(),
            label: None,
            kind: DimensionKind::Categorical,
            bounds: Bounds {
                min: None,
                max: None,
                step: None,
                labels: vec!["a".into(), "b".into(), "c".into()],
            },
            enabled: true,
        };
        assert_eq!(dim.encoded_range(), (0.0, 2.0));
    }
}
