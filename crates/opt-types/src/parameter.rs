use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single parameter's value in its natural, user-facing type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Label(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            ParamValue::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            ParamValue::Label(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Int(v) => Value::from(*v),
            ParamValue::Float(v) => Value::from(*v),
            ParamValue::Bool(v) => Value::from(*v),
            ParamValue::Label(s) => Value::from(s.clone()),
        }
    }
}

/// A mapping from enabled dimension id to its typed value, in the
/// user-facing representation used on the wire and for display.
pub type ParameterVector = BTreeMap<String, ParamValue>;

/// An encoded parameter vector: every enabled dimension mapped to a real
/// number in its encoded range, in the representation the sampler and the
/// GP surrogate operate on.
pub type EncodedVector = BTreeMap<String, f64>;

/// A metric bag as reported by the remote evaluator.
pub type MetricBag = BTreeMap<String, f64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_value_as_f64_rounds_to_zero_or_one() {
        assert_eq!(ParamValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(ParamValue::Bool(false).as_f64(), Some(0.0));
    }

    #[test]
    fn label_value_has_no_numeric_form() {
        assert_eq!(ParamValue::Label("a".into()).as_f64(), None);
    }
}
