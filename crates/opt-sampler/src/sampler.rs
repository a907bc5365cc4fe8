use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use opt_types::EncodedVector;

use crate::acquisition::Acquisition;
use crate::error::SamplerError;
use crate::gp::GaussianProcess;
use crate::sequence::{generate_unit_cube, initial_design_length, scale_to_ranges, InitialDesignKind};

const ADAPTIVE_KAPPA_WINDOW: usize = 20;
const ADAPTIVE_KAPPA_THRESHOLD: f64 = 0.002;
const PLATEAU_WINDOW: usize = 10;
const KAPPA_DECAY: f64 = 0.92;
const KAPPA_GROWTH: f64 = 1.1;
const DEFAULT_KAPPA_MIN: f64 = 0.5;
const DEFAULT_KAPPA_MAX: f64 = 10.0;
const DEFAULT_ALPHA: f64 = 1e-6;
const ADAPTIVE_BOUNDS_MIN_OBSERVATIONS: usize = 20;
const ADAPTIVE_BOUNDS_TOP_FRACTION: f64 = 0.7;
const ADAPTIVE_BOUNDS_GAMMA: f64 = 0.8;
const ADAPTIVE_BOUNDS_SHRINK_CEILING: f64 = 0.8;
const ACQUISITION_CANDIDATES: usize = 256;

/// The base acquisition strategy a session is configured with; `Mixed`
/// derives its schedule parameter from the observation count internally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquisitionKind {
    Ucb,
    Ei,
    Poi,
    Mixed,
}

#[derive(Debug, Clone, Copy)]
pub struct EarlyStopConfig {
    pub warmup: u32,
    pub threshold: f64,
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Point(EncodedVector),
    Done,
}

/// Uniform façade over the initial-design and surrogate-model phases
/// (spec.md §4.2), hiding the GP/acquisition numerics from callers.
pub trait Sampler: Send {
    fn next_proposal(&mut self) -> Result<Proposal, SamplerError>;
    fn observe(&mut self, encoded: EncodedVector, objective: f64);
    fn update_bounds(&mut self, _new_bounds: HashMap<String, (f64, f64)>) {}
    fn observe_duration(&mut self, _duration_secs: f64) {}
    fn request_stop(&mut self);
    /// The encoded-space bounds currently in effect, reflecting any
    /// adaptive-bounds narrowing applied so far. Used to persist a
    /// resumable snapshot of the search (spec.md §4.6).
    fn working_ranges(&self) -> HashMap<String, (f64, f64)> {
        HashMap::new()
    }
}

enum Phase {
    InitialDesign(VecDeque<EncodedVector>),
    Surrogate,
}

pub struct BayesSampler {
    dim_ids: Vec<String>,
    original_ranges: HashMap<String, (f64, f64)>,
    working_ranges: HashMap<String, (f64, f64)>,
    trials: u32,
    design_len: u32,
    phase: Phase,
    observations: Vec<(EncodedVector, f64)>,
    kappa: f64,
    kappa_min: f64,
    kappa_max: f64,
    xi: f64,
    acquisition_kind: AcquisitionKind,
    plateau_active: bool,
    rng: StdRng,
    stop_requested: bool,
    early_stop: Option<EarlyStopConfig>,
    adaptive_bounds_enabled: bool,
    adaptive_bounds_applied: bool,
    recent_durations: VecDeque<f64>,
    cost_aware_enabled: bool,
    strategy_cost_multiplier: f64,
    last_acquisition_value: Option<f64>,
}

impl BayesSampler {
    pub fn new(
        dim_ids: Vec<String>,
        ranges: HashMap<String, (f64, f64)>,
        trials: u32,
        seed: Option<u64>,
        acquisition_kind: AcquisitionKind,
        init_design_kind: InitialDesignKind,
        early_stop: Option<EarlyStopConfig>,
        adaptive_bounds_enabled: bool,
        cost_aware_enabled: bool,
        design_len_override: Option<u32>,
    ) -> Result<Self, SamplerError> {
        if dim_ids.is_empty() {
            return Err(SamplerError::EmptySpace);
        }
        for id in &dim_ids {
            let (lo, hi) = ranges.get(id).copied().unwrap_or((0.0, 1.0));
            if !(hi > lo) {
                return Err(SamplerError::DegenerateRange(id.clone()));
            }
        }

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let design_len = design_len_override
            .unwrap_or_else(|| initial_design_length(trials))
            .min(trials.max(1));
        let unit_points = generate_unit_cube(init_design_kind, &dim_ids, design_len, &mut rng);
        let dim_ranges: Vec<(f64, f64)> = dim_ids
            .iter()
            .map(|id| ranges.get(id).copied().unwrap_or((0.0, 1.0)))
            .collect();
        let queue: VecDeque<EncodedVector> =
            scale_to_ranges(&dim_ids, &dim_ranges, unit_points).into();

        Ok(BayesSampler {
            dim_ids,
            original_ranges: ranges.clone(),
            working_ranges: ranges,
            trials,
            design_len,
            phase: Phase::InitialDesign(queue),
            observations: Vec::new(),
            kappa: 2.576,
            kappa_min: DEFAULT_KAPPA_MIN,
            kappa_max: DEFAULT_KAPPA_MAX,
            xi: 0.01,
            acquisition_kind,
            plateau_active: false,
            rng,
            stop_requested: false,
            early_stop,
            adaptive_bounds_enabled,
            adaptive_bounds_applied: false,
            recent_durations: VecDeque::with_capacity(20),
            cost_aware_enabled,
            strategy_cost_multiplier: 1.0,
            last_acquisition_value: None,
        })
    }

    /// Overrides the initial UCB exploration weight and the EI/POI margin,
    /// for callers (the REST ask/tell variant) that take these as explicit
    /// request parameters rather than the defaults.
    pub fn with_kappa_xi(mut self, kappa: f64, xi: f64) -> Self {
        self.kappa = kappa;
        self.xi = xi;
        self
    }

    /// The acquisition function's value at the most recently proposed
    /// point, if that proposal came from the surrogate phase; `None` during
    /// the initial design, where points are drawn without scoring.
    pub fn last_acquisition_value(&self) -> Option<f64> {
        self.last_acquisition_value
    }

    /// The number of random-exploration points this sampler was built with,
    /// whether taken directly from a caller's explicit override or derived
    /// from `initial_design_length(trials)`.
    pub fn design_length(&self) -> u32 {
        self.design_len
    }

    fn best_objective(&self) -> f64 {
        self.observations
            .iter()
            .map(|(_, y)| *y)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn window_improvement(&self, window: usize) -> f64 {
        let n = self.observations.len();
        if n == 0 {
            return f64::INFINITY;
        }
        let start = n.saturating_sub(window);
        let slice = &self.observations[start..];
        let max = slice.iter().map(|(_, y)| *y).fold(f64::MIN, f64::max);
        let min = slice.iter().map(|(_, y)| *y).fold(f64::MAX, f64::min);
        max - min
    }

    fn update_kappa(&mut self) {
        if self.observations.len() < 5 {
            return;
        }
        let improvement = self.window_improvement(ADAPTIVE_KAPPA_WINDOW);
        if improvement < ADAPTIVE_KAPPA_THRESHOLD {
            self.kappa = (self.kappa * KAPPA_GROWTH).min(self.kappa_max);
        } else {
            self.kappa = (self.kappa * KAPPA_DECAY).max(self.kappa_min);
        }

        let plateau_improvement = self.window_improvement(PLATEAU_WINDOW);
        self.plateau_active = plateau_improvement < ADAPTIVE_KAPPA_THRESHOLD / 2.0;
        if self.plateau_active {
            self.kappa = (self.kappa * KAPPA_GROWTH).min(self.kappa_max);
        }
    }

    fn maybe_update_bounds(&mut self) {
        if !self.adaptive_bounds_enabled
            || self.adaptive_bounds_applied
            || self.observations.len() < ADAPTIVE_BOUNDS_MIN_OBSERVATIONS
        {
            return;
        }

        let mut sorted = self.observations.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let keep = ((sorted.len() as f64) * ADAPTIVE_BOUNDS_TOP_FRACTION).ceil() as usize;
        let top = &sorted[..keep.max(1).min(sorted.len())];

        let expand = (1.0 - ADAPTIVE_BOUNDS_GAMMA) / 2.0;
        for id in self.dim_ids.clone() {
            let coords: Vec<f64> = top.iter().filter_map(|(p, _)| p.get(&id).copied()).collect();
            if coords.is_empty() {
                continue;
            }
            let min = coords.iter().cloned().fold(f64::MAX, f64::min);
            let max = coords.iter().cloned().fold(f64::MIN, f64::max);
            let width = (max - min).max(1e-9);
            let padded_min = min - width * expand;
            let padded_max = max + width * expand;

            let (orig_lo, orig_hi) = self.original_ranges.get(&id).copied().unwrap_or((0.0, 1.0));
            let orig_width = orig_hi - orig_lo;
            let new_width = (padded_max - padded_min).min(orig_width);
            if orig_width > 0.0 && new_width <= orig_width * ADAPTIVE_BOUNDS_SHRINK_CEILING {
                let new_lo = padded_min.max(orig_lo);
                let new_hi = padded_max.min(orig_hi);
                self.working_ranges.insert(id, (new_lo, new_hi));
            }
        }
        self.adaptive_bounds_applied = true;
        debug!("adaptive bounds applied after {} observations", self.observations.len());
    }

    fn is_converged(&self) -> bool {
        let n = self.observations.len() as u32;
        if n >= self.trials || self.stop_requested {
            return true;
        }
        if let Some(cfg) = self.early_stop {
            if n >= cfg.warmup && !self.plateau_active {
                return self.window_improvement(cfg.window) < cfg.threshold;
            }
        }
        false
    }

    fn cost_estimate(&self) -> Option<f64> {
        if !self.cost_aware_enabled || self.recent_durations.is_empty() {
            return None;
        }
        let mean: f64 = self.recent_durations.iter().sum::<f64>() / self.recent_durations.len() as f64;
        Some((mean * self.strategy_cost_multiplier).max(1e-6))
    }

    fn propose_via_surrogate(&mut self) -> EncodedVector {
        let points: Vec<Vec<f64>> = self
            .observations
            .iter()
            .map(|(p, _)| self.dim_ids.iter().map(|id| p[id]).collect())
            .collect();
        let targets: Vec<f64> = self.observations.iter().map(|(_, y)| *y).collect();
        let gp = GaussianProcess::fit(points, &targets, 1.0, DEFAULT_ALPHA);
        let best = self.best_objective();
        let n_observations = self.observations.len() as u32;

        let acquisition = match self.acquisition_kind {
            AcquisitionKind::Ucb => Acquisition::Ucb { kappa: self.kappa },
            AcquisitionKind::Ei => Acquisition::Ei { xi: self.xi },
            AcquisitionKind::Poi => Acquisition::Poi { xi: self.xi },
            AcquisitionKind::Mixed => Acquisition::Mixed {
                kappa: self.kappa,
                xi: self.xi,
                n_observations,
            },
        };
        let cost = self.cost_estimate();

        let mut best_candidate: Option<(f64, f64, Vec<f64>)> = None;
        for _ in 0..ACQUISITION_CANDIDATES {
            let candidate: Vec<f64> = self
                .dim_ids
                .iter()
                .map(|id| {
                    let (lo, hi) = self.working_ranges.get(id).copied().unwrap_or((0.0, 1.0));
                    self.rng.gen_range(lo..=hi)
                })
                .collect();
            let prediction = gp.predict(&candidate);
            let raw_value = acquisition.value(prediction, best);
            let mut value = raw_value;
            if let Some(cost) = cost {
                value /= cost;
            }
            if best_candidate.as_ref().map(|(v, _, _)| value > *v).unwrap_or(true) {
                best_candidate = Some((value, raw_value, candidate));
            }
        }

        let (_, raw_value, coords) = best_candidate.expect("candidate pool is non-empty");
        self.last_acquisition_value = Some(raw_value);
        self.dim_ids
            .iter()
            .cloned()
            .zip(coords)
            .collect::<EncodedVector>()
    }
}

impl Sampler for BayesSampler {
    fn next_proposal(&mut self) -> Result<Proposal, SamplerError> {
        if self.is_converged() {
            return Ok(Proposal::Done);
        }

        if let Phase::InitialDesign(queue) = &mut self.phase {
            if let Some(point) = queue.pop_front() {
                self.last_acquisition_value = None;
                return Ok(Proposal::Point(point));
            }
            self.phase = Phase::Surrogate;
        }

        Ok(Proposal::Point(self.propose_via_surrogate()))
    }

    fn observe(&mut self, encoded: EncodedVector, objective: f64) {
        self.observations.push((encoded, objective));
        self.update_kappa();
        self.maybe_update_bounds();
    }

    fn update_bounds(&mut self, new_bounds: HashMap<String, (f64, f64)>) {
        for (id, range) in new_bounds {
            self.working_ranges.insert(id, range);
        }
        self.adaptive_bounds_applied = true;
    }

    fn observe_duration(&mut self, duration_secs: f64) {
        if self.recent_durations.len() >= 20 {
            self.recent_durations.pop_front();
        }
        self.recent_durations.push_back(duration_secs);
    }

    fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    fn working_ranges(&self) -> HashMap<String, (f64, f64)> {
        self.working_ranges.clone()
    }
}
