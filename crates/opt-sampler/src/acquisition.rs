use crate::gp::Prediction;

/// Acquisition strategy, selected per spec.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    Ucb { kappa: f64 },
    Ei { xi: f64 },
    Poi { xi: f64 },
    /// `alpha * UCB + (1 - alpha) * EI`, `alpha = max(0.1, 1 - n/30)`.
    Mixed { kappa: f64, xi: f64, n_observations: u32 },
}

impl Acquisition {
    pub fn value(&self, prediction: Prediction, best: f64) -> f64 {
        match *self {
            Acquisition::Ucb { kappa } => ucb(prediction, kappa),
            Acquisition::Ei { xi } => ei(prediction, best, xi),
            Acquisition::Poi { xi } => poi(prediction, best, xi),
            Acquisition::Mixed { kappa, xi, n_observations } => {
                let alpha = (1.0 - n_observations as f64 / 30.0).max(0.1);
                alpha * ucb(prediction, kappa) + (1.0 - alpha) * ei(prediction, best, xi)
            }
        }
    }
}

fn ucb(prediction: Prediction, kappa: f64) -> f64 {
    prediction.mean + kappa * prediction.std
}

fn ei(prediction: Prediction, best: f64, xi: f64) -> f64 {
    if prediction.std <= 1e-12 {
        return 0.0;
    }
    let z = (prediction.mean - best - xi) / prediction.std;
    (prediction.mean - best - xi) * normal_cdf(z) + prediction.std * normal_pdf(z)
}

fn poi(prediction: Prediction, best: f64, xi: f64) -> f64 {
    if prediction.std <= 1e-12 {
        return 0.0;
    }
    let z = (prediction.mean - best - xi) / prediction.std;
    normal_cdf(z)
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26 approximation (max error ~1.5e-7).
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ucb_rewards_uncertainty() {
        let low = Prediction { mean: 1.0, std: 0.1 };
        let high = Prediction { mean: 1.0, std: 1.0 };
        assert!(Acquisition::Ucb { kappa: 2.0 }.value(high, 0.0) > Acquisition::Ucb { kappa: 2.0 }.value(low, 0.0));
    }

    #[test]
    fn ei_is_zero_with_no_uncertainty() {
        let prediction = Prediction { mean: 5.0, std: 0.0 };
        assert_eq!(Acquisition::Ei { xi: 0.01 }.value(prediction, 1.0), 0.0);
    }

    #[test]
    fn poi_increases_as_mean_exceeds_best() {
        let near = Prediction { mean: 1.0, std: 1.0 };
        let far = Prediction { mean: 5.0, std: 1.0 };
        assert!(
            Acquisition::Poi { xi: 0.0 }.value(far, 0.0) > Acquisition::Poi { xi: 0.0 }.value(near, 0.0)
        );
    }

    #[test]
    fn mixed_schedule_favors_exploration_early_and_ei_later() {
        let prediction = Prediction { mean: 2.0, std: 1.0 };
        let early = Acquisition::Mixed { kappa: 2.0, xi: 0.01, n_observations: 0 };
        let late = Acquisition::Mixed { kappa: 2.0, xi: 0.01, n_observations: 30 };
        assert_ne!(early.value(prediction, 0.0), late.value(prediction, 0.0));
    }
}
