use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use opt_types::{Dimension, DimensionError, DimensionKind, EncodedVector, ParamValue, ParameterVector};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpaceError {
    #[error("no enabled dimension")]
    NoEnabledDimension,
    #[error(transparent)]
    Dimension(#[from] DimensionError),
}

/// A pure projection applied after decode to enforce inter-parameter
/// invariants the individual dimensions cannot express on their own.
pub trait ConstraintHook: Send + Sync {
    fn apply(&self, params: ParameterVector) -> ParameterVector;
}

/// The built, validated parameter space for one session: the enabled
/// dimensions plus the encode/decode/sample operations over them
/// (spec.md §4.1).
#[derive(Clone)]
pub struct Space {
    dimensions: Vec<Dimension>,
    constraints: Option<Arc<dyn ConstraintHook>>,
}

impl Space {
    /// Builds a space from a caller-declared dimension list. Rejects an
    /// empty enabled set or any dimension failing its own validation.
    pub fn build(dimensions: Vec<Dimension>) -> Result<Self, SpaceError> {
        let enabled: Vec<Dimension> = dimensions.into_iter().filter(|d| d.enabled).collect();
        if enabled.is_empty() {
            return Err(SpaceError::NoEnabledDimension);
        }
        for dim in &enabled {
            dim.validate()?;
        }
        Ok(Space {
            dimensions: enabled,
            constraints: None,
        })
    }

    pub fn with_constraints(mut self, hook: Arc<dyn ConstraintHook>) -> Self {
        self.constraints = Some(hook);
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Encodes a user-form vector into the sampler's continuous domain.
    /// Unknown dimensions in `user` are ignored; dimensions absent from
    /// `user` are skipped.
    pub fn encode(&self, user: &ParameterVector) -> EncodedVector {
        let mut encoded = EncodedVector::new();
        for dim in &self.dimensions {
            let Some(value) = user.get(&dim.id) else {
                continue;
            };
            let x = match dim.kind {
                DimensionKind::Float | DimensionKind::Int | DimensionKind::Bool => {
                    value.as_f64().unwrap_or(0.0)
                }
                DimensionKind::Categorical | DimensionKind::Ordinal => value
                    .as_label()
                    .and_then(|label| dim.bounds.labels.iter().position(|l| l == label))
                    .map(|idx| idx as f64)
                    .unwrap_or(0.0),
            };
            encoded.insert(dim.id.clone(), x);
        }
        encoded
    }

    /// Decodes an encoded vector back to the user-facing representation,
    /// per the canonical table in spec.md §4.1.
    pub fn decode(&self, encoded: &EncodedVector) -> ParameterVector {
        let mut user = ParameterVector::new();
        for dim in &self.dimensions {
            let Some(&x) = encoded.get(&dim.id) else {
                continue;
            };
            let value = decode_one(dim, x);
            user.insert(dim.id.clone(), value);
        }
        if let Some(hook) = &self.constraints {
            user = hook.apply(user);
        }
        user
    }

    /// Draws an independent uniform sample within each dimension's encoded
    /// range.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> EncodedVector {
        let mut encoded = EncodedVector::new();
        for dim in &self.dimensions {
            let (lo, hi) = dim.encoded_range();
            let x = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            encoded.insert(dim.id.clone(), x);
        }
        encoded
    }

    /// Applies any registered constraint hook to a user-form vector
    /// directly, without a round trip through the encoded domain.
    pub fn apply_constraints(&self, user: ParameterVector) -> ParameterVector {
        match &self.constraints {
            Some(hook) => hook.apply(user),
            None => user,
        }
    }
}

fn snap_to_step(x: f64, min: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return x;
    }
    let k = ((x - min) / step).round();
    min + k * step
}

fn decode_one(dim: &Dimension, x: f64) -> ParamValue {
    match dim.kind {
        DimensionKind::Float => {
            let min = dim.bounds.min.unwrap_or(0.0);
            let max = dim.bounds.max.unwrap_or(1.0);
            let clipped = x.clamp(min, max);
            let snapped = match dim.bounds.step {
                Some(step) if step > 0.0 => snap_to_step(clipped, min, step).clamp(min, max),
                _ => clipped,
            };
            ParamValue::Float(snapped)
        }
        DimensionKind::Int => {
            let min = dim.bounds.min.unwrap_or(0.0);
            let max = dim.bounds.max.unwrap_or(1.0);
            let clipped = x.clamp(min, max).round();
            let snapped = match dim.bounds.step {
                Some(step) if step > 0.0 => snap_to_step(clipped, min, step).clamp(min, max),
                _ => clipped,
            };
            ParamValue::Int(snapped.round() as i64)
        }
        DimensionKind::Bool => ParamValue::Bool(x > 0.5),
        DimensionKind::Categorical | DimensionKind::Ordinal => {
            let k = dim.bounds.labels.len();
            let idx = if k == 0 {
                0
            } else {
                (x.round() as i64).clamp(0, (k - 1) as i64) as usize
            };
            ParamValue::Label(dim.bounds.labels.get(idx).cloned().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opt_types::Bounds;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn float_dim(id: &str, min: f64, max: f64) -> Dimension {
        Dimension {
            id: id.to_string(),
            label: None,
            kind: DimensionKind::Float,
            bounds: Bounds {
                min: Some(min),
                max: Some(max),
                step: None,
                labels: Vec::new(),
            },
            enabled: true,
        }
    }

    fn categorical_dim(id: &str, labels: &[&str]) -> Dimension {
        Dimension {
            id: id.to_string(),
            label: None,
            kind: DimensionKind::Categorical,
            bounds: Bounds {
                min: None,
                max: None,
                step: None,
                labels: labels.iter().map(|s| s.to_string()).collect(),
            },
            enabled: true,
        }
    }

    #[test]
    fn build_rejects_empty_enabled_set() {
        let dim = float_dim("x", 0.0, 1.0);
        let mut disabled = dim;
        disabled.enabled = false;
        assert_eq!(
            Space::build(vec![disabled]),
            Err(SpaceError::NoEnabledDimension)
        );
    }

    #[test]
    fn float_round_trip_holds_for_values_in_range() {
        let space = Space::build(vec![float_dim("x", 0.0, 10.0)]).unwrap();
        let mut user = ParameterVector::new();
        user.insert("x".to_string(), ParamValue::Float(4.25));
        let encoded = space.encode(&user);
        let decoded = space.decode(&encoded);
        assert_eq!(decoded.get("x"), Some(&ParamValue::Float(4.25)));
    }

    #[test]
    fn categorical_round_trip_holds_for_every_label() {
        let space = Space::build(vec![categorical_dim("mode", &["a", "b", "c"])]).unwrap();
        for label in ["a", "b", "c"] {
            let mut user = ParameterVector::new();
            user.insert("mode".to_string(), ParamValue::Label(label.to_string()));
            let encoded = space.encode(&user);
            let decoded = space.decode(&encoded);
            assert_eq!(decoded.get("mode").and_then(|v| v.as_label()), Some(label));
        }
    }

    #[test]
    fn float_step_snaps_to_nearest_grid_point() {
        let mut dim = float_dim("x", 0.0, 10.0);
        dim.bounds.step = Some(2.0);
        let space = Space::build(vec![dim]).unwrap();
        let mut encoded = EncodedVector::new();
        encoded.insert("x".to_string(), 5.1);
        let decoded = space.decode(&encoded);
        assert_eq!(decoded.get("x"), Some(&ParamValue::Float(6.0)));
    }

    #[test]
    fn sample_uniform_stays_within_encoded_range() {
        let space = Space::build(vec![float_dim("x", -5.0, 5.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let encoded = space.sample_uniform(&mut rng);
            let x = encoded["x"];
            assert!((-5.0..=5.0).contains(&x));
        }
    }
}
