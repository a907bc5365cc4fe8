use crate::kernel::Matern52;

/// Gaussian-process regressor over the Matern-5/2 kernel, fit by a Cholesky
/// factorization of the (noisy) covariance matrix. Zero-mean prior.
pub struct GaussianProcess {
    kernel: Matern52,
    alpha: f64,
    points: Vec<Vec<f64>>,
    /// Lower-triangular Cholesky factor of `K + alpha*I`, row-major.
    chol: Vec<Vec<f64>>,
    /// `K^-1 y`, precomputed once per fit.
    weights: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub mean: f64,
    pub std: f64,
}

impl GaussianProcess {
    /// Fits the GP to `points`/`targets`. `alpha` is the observation-noise
    /// variance added to the kernel diagonal (mirrors `bayes_opt`'s
    /// `alpha` GP parameter, default `1e-6`).
    pub fn fit(points: Vec<Vec<f64>>, targets: &[f64], length_scale: f64, alpha: f64) -> Self {
        let kernel = Matern52::new(length_scale.max(1e-6));
        let n = points.len();
        if n == 0 {
            return GaussianProcess {
                kernel,
                alpha,
                points,
                chol: Vec::new(),
                weights: Vec::new(),
            };
        }

        let mut k = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                k[i][j] = kernel.covariance(&points[i], &points[j]);
            }
            k[i][i] += alpha;
        }

        let chol = cholesky(&k);
        let z = forward_substitute(&chol, targets);
        let weights = back_substitute_transpose(&chol, &z);

        GaussianProcess {
            kernel,
            alpha,
            points,
            chol,
            weights,
        }
    }

    pub fn predict(&self, x: &[f64]) -> Prediction {
        if self.points.is_empty() {
            return Prediction { mean: 0.0, std: 1.0 };
        }

        let k_star: Vec<f64> = self.points.iter().map(|p| self.kernel.covariance(p, x)).collect();
        let mean: f64 = k_star.iter().zip(&self.weights).map(|(k, w)| k * w).sum();

        let v = forward_substitute(&self.chol, &k_star);
        let k_xx = self.kernel.covariance(x, x) + self.alpha;
        let variance = (k_xx - v.iter().map(|vi| vi * vi).sum::<f64>()).max(0.0);

        Prediction {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Cholesky factorization of a symmetric positive-definite matrix,
/// returning its lower-triangular factor `L` such that `L L^T == matrix`.
fn cholesky(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                l[i][j] = sum.max(1e-12).sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    l
}

/// Solves `L x = b` for lower-triangular `L`.
fn forward_substitute(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = l.len();
    let mut x = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * x[j];
        }
        x[i] = sum / l[i][i];
    }
    x
}

/// Solves `L^T x = b` for lower-triangular `L`.
fn back_substitute_transpose(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = l.len();
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicting_at_a_training_point_recovers_its_target_closely() {
        let points = vec![vec![0.0], vec![1.0], vec![2.0]];
        let targets = vec![0.0, 1.0, 0.0];
        let gp = GaussianProcess::fit(points, &targets, 1.0, 1e-6);
        let prediction = gp.predict(&[1.0]);
        assert!((prediction.mean - 1.0).abs() < 0.05);
        assert!(prediction.std < 0.2);
    }

    #[test]
    fn far_from_training_data_uncertainty_grows() {
        let points = vec![vec![0.0], vec![1.0]];
        let targets = vec![0.5, 0.6];
        let gp = GaussianProcess::fit(points, &targets, 1.0, 1e-6);
        let near = gp.predict(&[0.5]).std;
        let far = gp.predict(&[50.0]).std;
        assert!(far > near);
    }

    #[test]
    fn empty_training_set_returns_prior() {
        let gp = GaussianProcess::fit(Vec::new(), &[], 1.0, 1e-6);
        let prediction = gp.predict(&[0.0]);
        assert_eq!(prediction.mean, 0.0);
        assert_eq!(prediction.std, 1.0);
    }
}
