use nalgebra::DVector;
use rand::Rng;
use std::f64::consts::PI;

/// Draws `size` samples from N(mean, std_dev) with the Box-Muller transform.
pub fn normal<R: Rng + ?Sized>(rng: &mut R, size: usize, mean: f64, std_dev: f64) -> Vec<f64> {
    (0..size)
        .map(|_| {
            // shift to (0, 1] so ln never sees zero
            let u1: f64 = 1.0 - rng.gen::<f64>();
            let u2: f64 = rng.gen();
            let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
            mean + z0 * std_dev
        })
        .collect()
}

/// One factor vector per row, each drawn from N(mean, std_dev).
pub fn normal_factors<R: Rng + ?Sized>(
    rng: &mut R,
    rows: usize,
    dimension: usize,
    mean: f64,
    std_dev: f64,
) -> Vec<DVector<f64>> {
    (0..rows)
        .map(|_| DVector::from_vec(normal(rng, dimension, mean, std_dev)))
        .collect()
}
