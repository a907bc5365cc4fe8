use serde::{Deserialize, Serialize};

use opt_types::{Bounds, Dimension, DimensionKind, Filter, FilterComparator, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireParameterKind {
    Int,
    Float,
    Bool,
    Categorical,
    Ordinal,
}

impl From<WireParameterKind> for DimensionKind {
    fn from(kind: WireParameterKind) -> Self {
        match kind {
            WireParameterKind::Int => DimensionKind::Int,
            WireParameterKind::Float => DimensionKind::Float,
            WireParameterKind::Bool => DimensionKind::Bool,
            WireParameterKind::Categorical => DimensionKind::Categorical,
            WireParameterKind::Ordinal => DimensionKind::Ordinal,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireParameterRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireParameterConfig {
    #[serde(rename = "paramId")]
    pub param_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: WireParameterKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub range: WireParameterRange,
}

fn default_true() -> bool {
    true
}

impl From<WireParameterConfig> for Dimension {
    fn from(config: WireParameterConfig) -> Self {
        Dimension {
            id: config.param_id,
            label: config.label,
            kind: config.kind.into(),
            bounds: Bounds {
                min: config.range.min,
                max: config.range.max,
                step: config.range.step,
                labels: config.range.labels,
            },
            enabled: config.enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFilterComparator {
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

impl From<WireFilterComparator> for FilterComparator {
    fn from(c: WireFilterComparator) -> Self {
        match c {
            WireFilterComparator::Gte => FilterComparator::Gte,
            WireFilterComparator::Lte => FilterComparator::Lte,
            WireFilterComparator::Gt => FilterComparator::Gt,
            WireFilterComparator::Lt => FilterComparator::Lt,
            WireFilterComparator::Eq => FilterComparator::Eq,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFilterConfig {
    pub metric: String,
    pub comparator: WireFilterComparator,
    pub value: f64,
}

impl From<WireFilterConfig> for Filter {
    fn from(config: WireFilterConfig) -> Self {
        Filter {
            metric: config.metric,
            comparator: config.comparator.into(),
            threshold: config.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOptimisationSettings {
    /// Single-objective target metric id; ignored when `metrics` is
    /// non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    /// Multi-objective target metric ids (spec.md §4.3).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    pub trials: u32,
    #[serde(default, rename = "useCustomRange")]
    pub use_custom_range: bool,
    #[serde(default, rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub filters: Vec<WireFilterConfig>,
}

impl From<WireOptimisationSettings> for Settings {
    fn from(settings: WireOptimisationSettings) -> Self {
        let target_metrics = if !settings.metrics.is_empty() {
            settings.metrics
        } else {
            settings.metric.into_iter().collect()
        };
        Settings {
            target_metrics,
            weights: settings.weights,
            trials: settings.trials,
            filters: settings.filters.into_iter().map(Into::into).collect(),
            use_custom_range: settings.use_custom_range,
            start_date: settings.start_date,
            end_date: settings.end_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimisationConfig {
    #[serde(rename = "strategyId")]
    pub strategy_id: String,
    pub params: Vec<WireParameterConfig>,
    pub settings: WireOptimisationSettings,
}

impl OptimisationConfig {
    pub fn enabled_dimensions(&self) -> Vec<Dimension> {
        self.params
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .map(Into::into)
            .collect()
    }

    pub fn settings(&self) -> Settings {
        self.settings.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_metric_settings_convert_to_one_target() {
        let wire = WireOptimisationSettings {
            metric: Some("net-profit".into()),
            metrics: Vec::new(),
            weights: None,
            trials: 10,
            use_custom_range: false,
            start_date: None,
            end_date: None,
            filters: Vec::new(),
        };
        let settings: Settings = wire.into();
        assert_eq!(settings.target_metrics, vec!["net-profit".to_string()]);
        assert!(!settings.is_multi_objective());
    }

    #[test]
    fn multi_metric_settings_take_priority_over_single() {
        let wire = WireOptimisationSettings {
            metric: Some("ignored".into()),
            metrics: vec!["sharpe".into(), "win-rate".into()],
            weights: None,
            trials: 10,
            use_custom_range: false,
            start_date: None,
            end_date: None,
            filters: Vec::new(),
        };
        let settings: Settings = wire.into();
        assert_eq!(settings.target_metrics, vec!["sharpe", "win-rate"]);
        assert!(settings.is_multi_objective());
    }
}
