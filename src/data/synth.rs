//! Deterministic synthetic exponential-decay samples.
//!
//! Useful for exercising the fitting machinery without real measurements:
//! a noiseless curve lets tests assert exact ground-truth recovery, and a
//! seeded Gaussian-noise variant produces reproducible "measured" data.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

/// Ground-truth parameters of a single-exponential curve.
#[derive(Debug, Clone, Copy)]
pub struct ExpCurveSpec {
    pub offset: f64,
    pub amplitude: f64,
    pub rate: f64,
}

impl ExpCurveSpec {
    /// Evaluate `offset + amplitude * exp(-rate * t)`.
    pub fn eval(&self, t: f64) -> f64 {
        self.offset + self.amplitude * (-self.rate * t).exp()
    }
}

/// `n` evenly spaced points over `[start, end]` (both endpoints included).
pub fn linspace(start: f64, end: f64, n: usize) -> DVector<f64> {
    if n == 1 {
        return DVector::from_element(1, start);
    }
    let step = (end - start) / (n as f64 - 1.0);
    DVector::from_fn(n, |i, _| start + step * i as f64)
}

/// Noiseless samples of an exponential curve over a time grid.
pub fn exp_decay_samples(spec: &ExpCurveSpec, t: &DVector<f64>) -> DVector<f64> {
    t.map(|ti| spec.eval(ti))
}

/// Samples with seeded additive Gaussian noise of standard deviation `sigma`.
///
/// Returns `None` when `sigma` is not a usable standard deviation (negative,
/// NaN or infinite).
pub fn noisy_exp_decay_samples(
    spec: &ExpCurveSpec,
    t: &DVector<f64>,
    sigma: f64,
    seed: u64,
) -> Option<DVector<f64>> {
    if sigma == 0.0 {
        return Some(exp_decay_samples(spec, t));
    }
    if !(sigma.is_finite() && sigma > 0.0) {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).ok()?;
    Some(t.map(|ti| spec.eval(ti) + rng.sample(normal)))
}
