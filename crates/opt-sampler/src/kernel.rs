/// Matern-5/2 covariance with unit signal variance, the kernel spec.md's
/// originating service configures explicitly (`Matern(nu=2.5)`).
#[derive(Debug, Clone, Copy)]
pub struct Matern52 {
    pub length_scale: f64,
}

impl Matern52 {
    pub fn new(length_scale: f64) -> Self {
        Matern52 { length_scale }
    }

    pub fn covariance(&self, a: &[f64], b: &[f64]) -> f64 {
        let r = euclidean(a, b) / self.length_scale;
        let sqrt5 = 5f64.sqrt();
        (1.0 + sqrt5 * r + (5.0 / 3.0) * r * r) * (-sqrt5 * r).exp()
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
