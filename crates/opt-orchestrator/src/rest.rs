use std::collections::{BTreeMap, HashMap};

use chrono::Utc;

use opt_core::{EngineConfig, ObjectiveBuilder, Space};
use opt_sampler::{AcquisitionKind, BayesSampler, InitialDesignKind, Proposal, Sampler};
use opt_types::{
    BestSnapshot, Bounds, Dimension, DimensionKind, EncodedVector, MetricBag, ParamValue, ParameterVector,
    Settings, Trial, PENALTY_SCORE,
};
use opt_wire::{
    BestResponse, HistoryEntry, HistoryResponse, InitRequest, ObserveRequest, OptimizationStatus, SuggestResponse,
};

use crate::error::SessionError;

/// Drives the REST ask/tell variant of the protocol (spec.md §4.7): one
/// optimisation run at a time, called via direct `suggest`/`observe`
/// request/response pairs instead of the streaming message loop
/// [`crate::Session`] drives. Mirrors the single global optimiser instance
/// of the original evaluator-facing service.
pub struct RestOptimiser {
    space: Space,
    sampler: BayesSampler,
    objective_builder: ObjectiveBuilder,
    settings: Settings,
    completed: u32,
    best: Option<BestSnapshot>,
    history: Vec<Trial>,
    timestamps: Vec<String>,
    pending: Option<EncodedVector>,
}

impl RestOptimiser {
    pub fn init(req: &InitRequest, engine_config: &EngineConfig) -> Result<Self, SessionError> {
        let dimensions: Vec<Dimension> = req
            .pbounds
            .iter()
            .map(|(id, (min, max))| {
                let kind = match req.parameter_types.get(id).map(String::as_str) {
                    Some("int") => DimensionKind::Int,
                    Some("bool") => DimensionKind::Bool,
                    Some("categorical") | Some("ordinal") => DimensionKind::Categorical,
                    _ => DimensionKind::Float,
                };
                let labels = req.categorical_mappings.get(id).cloned().unwrap_or_default();
                Dimension {
                    id: id.clone(),
                    label: None,
                    kind,
                    bounds: Bounds {
                        min: Some(*min),
                        max: Some(*max),
                        step: None,
                        labels,
                    },
                    enabled: true,
                }
            })
            .collect();

        let space = Space::build(dimensions).map_err(SessionError::InvalidSpace)?;

        let settings = Settings {
            target_metrics: req.target_metrics.clone(),
            weights: None,
            trials: (req.init_points + req.n_iter).max(1),
            filters: Vec::new(),
            use_custom_range: false,
            start_date: None,
            end_date: None,
        };
        settings.validate().map_err(SessionError::InvalidSettings)?;

        let dim_ids: Vec<String> = space.dimensions().iter().map(|d| d.id.clone()).collect();
        let ranges: HashMap<String, (f64, f64)> = space
            .dimensions()
            .iter()
            .map(|d| (d.id.clone(), d.encoded_range()))
            .collect();

        let acquisition_kind = match req.acquisition_type.as_str() {
            "ei" => AcquisitionKind::Ei,
            "poi" => AcquisitionKind::Poi,
            "mixed" => AcquisitionKind::Mixed,
            _ => AcquisitionKind::Ucb,
        };

        let sampler = BayesSampler::new(
            dim_ids,
            ranges,
            settings.trials,
            engine_config.optuna_sampler_seed,
            acquisition_kind,
            InitialDesignKind::LatinHypercube,
            None,
            false,
            false,
            Some(req.init_points),
        )
        .map_err(SessionError::Sampler)?
        .with_kappa_xi(req.kappa, req.xi);

        let target_metric = settings
            .target_metrics
            .first()
            .cloned()
            .ok_or_else(|| SessionError::Internal("no target metric after validation".into()))?;

        Ok(RestOptimiser {
            space,
            sampler,
            objective_builder: ObjectiveBuilder::new(target_metric, Vec::new()),
            settings,
            completed: 0,
            best: None,
            history: Vec::new(),
            timestamps: Vec::new(),
            pending: None,
        })
    }

    pub fn suggest(&mut self) -> Result<SuggestResponse, SessionError> {
        match self.sampler.next_proposal().map_err(SessionError::Sampler)? {
            Proposal::Done => Ok(SuggestResponse {
                params: BTreeMap::new(),
                done: true,
                acquisition_value: None,
            }),
            Proposal::Point(encoded) => {
                self.pending = Some(encoded.clone());
                let decoded = self.space.decode(&encoded);
                let params: BTreeMap<String, f64> = decoded
                    .iter()
                    .filter_map(|(id, value)| value.as_f64().map(|v| (id.clone(), v)))
                    .collect();
                Ok(SuggestResponse {
                    params,
                    done: false,
                    acquisition_value: self.sampler.last_acquisition_value(),
                })
            }
        }
    }

    pub fn observe(&mut self, req: &ObserveRequest) -> Result<(), SessionError> {
        let encoded = self
            .pending
            .take()
            .ok_or_else(|| SessionError::Protocol("observe called before suggest".into()))?;

        let user: ParameterVector = req
            .params
            .iter()
            .map(|(id, value)| (id.clone(), ParamValue::Float(*value)))
            .collect();

        let mut metrics: MetricBag = req.additional_metrics.clone();
        metrics.insert(self.objective_builder.target_metric.clone(), req.target);

        let evaluation = self.objective_builder.evaluate(&metrics);
        self.sampler.observe(encoded, evaluation.objective);

        let mut is_best = false;
        if evaluation.filters_passed {
            if let Some(raw) = evaluation.metric_value {
                let updated = BestSnapshot::consider(self.best.take(), raw, self.completed, &user, &metrics);
                is_best = updated
                    .as_ref()
                    .map(|b| b.trial_number == self.completed)
                    .unwrap_or(false);
                self.best = updated;
            }
        }

        self.history.push(Trial {
            number: self.completed,
            params: user,
            metrics: Some(metrics),
            objective: Some(evaluation.objective),
            filters_passed: evaluation.filters_passed,
            filter_reasons: evaluation.filter_reasons,
            is_best,
        });
        self.timestamps.push(Utc::now().to_rfc3339());
        self.completed += 1;
        Ok(())
    }

    pub fn best(&self) -> Option<BestResponse> {
        self.best.as_ref().map(|snapshot| BestResponse {
            params: snapshot
                .params
                .iter()
                .filter_map(|(id, value)| value.as_f64().map(|v| (id.clone(), v)))
                .collect(),
            target: snapshot.metric,
        })
    }

    pub fn status(&self) -> OptimizationStatus {
        let total = self.settings.trials;
        let design_len = self.sampler.design_length();
        let exploration_ratio = if self.completed < design_len {
            1.0
        } else {
            let exploitation_iterations = self.completed - design_len;
            let max_exploitation_iterations = (total - design_len).max(1);
            (0.1_f64).max(1.0 - (exploitation_iterations as f64 / max_exploitation_iterations as f64))
        };

        OptimizationStatus {
            iteration: self.completed,
            total_iterations: total,
            best_target: self.best.as_ref().map(|b| b.metric).unwrap_or(PENALTY_SCORE),
            current_exploration_ratio: exploration_ratio,
        }
    }

    pub fn history(&self) -> HistoryResponse {
        let history = self
            .history
            .iter()
            .zip(&self.timestamps)
            .map(|(trial, timestamp)| HistoryEntry {
                iteration: trial.number,
                params: trial
                    .params
                    .iter()
                    .filter_map(|(id, value)| value.as_f64().map(|v| (id.clone(), v)))
                    .collect(),
                target: trial.objective.unwrap_or(PENALTY_SCORE),
                timestamp: timestamp.clone(),
            })
            .collect();
        HistoryResponse { history }
    }
}
