//! Pluggable noise transform, applied after filtering.

use contracts::{LidarError, NoiseConfig, RangeBounds};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// In-place range transform `f(range) -> range'`
///
/// Must leave `NaN` bins untouched and be safe to call with zero noise.
pub trait NoiseModel: Send {
    fn name(&self) -> &str;

    fn apply(&mut self, ranges: &mut [f64]);
}

/// Identity transform
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNoise;

impl NoiseModel for NoNoise {
    fn name(&self) -> &str {
        "none"
    }

    fn apply(&mut self, _ranges: &mut [f64]) {}
}

/// Additive gaussian noise clamped to the range envelope
///
/// Only returns inside the envelope are perturbed; zeroed or excluded
/// bins pass through.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    mean: f64,
    stddev: f64,
    bounds: RangeBounds,
    rng: SmallRng,
}

impl GaussianNoise {
    /// Seed 0 draws the seed from OS entropy
    pub fn new(mean: f64, stddev: f64, bounds: RangeBounds, seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_os_rng()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self {
            mean,
            stddev,
            bounds,
            rng,
        }
    }

    #[inline]
    fn sample(&mut self) -> f64 {
        if self.stddev == 0.0 {
            return self.mean;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        self.mean + n * self.stddev
    }
}

impl NoiseModel for GaussianNoise {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn apply(&mut self, ranges: &mut [f64]) {
        if self.mean == 0.0 && self.stddev == 0.0 {
            return;
        }
        for range in ranges.iter_mut() {
            if !self.bounds.contains(*range) {
                continue;
            }
            let noisy = *range + self.sample();
            *range = self.bounds.clamp(noisy);
        }
    }
}

/// Build the noise model for a config
pub fn noise_from_config(
    config: &NoiseConfig,
    bounds: RangeBounds,
) -> Result<Box<dyn NoiseModel>, LidarError> {
    match *config {
        NoiseConfig::None => Ok(Box::new(NoNoise)),
        NoiseConfig::Gaussian { mean, stddev, seed } => {
            if !mean.is_finite() {
                return Err(LidarError::configuration("noise.mean", "must be finite"));
            }
            if !(stddev.is_finite() && stddev >= 0.0) {
                return Err(LidarError::configuration(
                    "noise.stddev",
                    format!("must be >= 0, got {stddev}"),
                ));
            }
            Ok(Box::new(GaussianNoise::new(mean, stddev, bounds, seed)))
        }
    }
}
