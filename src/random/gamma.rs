//! Gamma distributed random variates.
//!
//! Gamma distribution, not the gamma function. For shape `alpha > 0` and
//! scale `beta > 0` the density is
//!
//! ```text
//!            x^(alpha - 1) * exp(-x / beta)
//! pdf(x) = ----------------------------------
//!             Gamma(alpha) * beta^alpha
//! ```
//!
//! with mean `alpha * beta` and variance `alpha * beta^2`.
//!
//! Three regimes are sampled by rejection:
//!
//! | Shape           | Method                                              |
//! |-----------------|-----------------------------------------------------|
//! | `alpha > 1`     | R.C.H. Cheng, Applied Statistics 26(1), 1977, 71-74 |
//! | `alpha == 1`    | Exponential(1) by inversion                         |
//! | `0 < alpha < 1` | Algorithm GS, Kennedy & Gentle                      |
//!
//! None of the loops is bounded. The acceptance probability per iteration is
//! high in every regime, so they terminate with overwhelming probability.

use std::f64::consts::E;

use super::{seeded_rng, uniform, SimRng};
use crate::error::{Result, SimError};

/// Seed used when a sampler is created without an explicit run seed.
pub const DEFAULT_GAMMA_SEED: u64 = 1337;

/// `ln(4)`
const LOG4: f64 = 1.386_294_361_119_890_6;

/// `1 + ln(4.5)`
const SG_MAGICCONST: f64 = 2.504_077_396_776_274;

/// Gamma variate sampler wrapping a seeded generator.
///
/// The same generator also serves Bernoulli draws, so a simulator that owns
/// one `Gamma` has exactly one run-level random stream.
#[derive(Debug, Clone)]
pub struct Gamma {
    rng: SimRng,
}

impl Default for Gamma {
    fn default() -> Self {
        Self::seeded(DEFAULT_GAMMA_SEED)
    }
}

impl Gamma {
    /// Create a sampler drawing from the given generator
    pub fn new(rng: SimRng) -> Self {
        Self { rng }
    }

    /// Create a sampler from a seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(seeded_rng(seed))
    }

    /// Sample a gamma variate with shape `alpha` and scale `beta`.
    ///
    /// Fails with [`SimError::InvalidParameter`] unless both are strictly
    /// positive (NaN is rejected too).
    pub fn sample(&mut self, alpha: f64, beta: f64) -> Result<f64> {
        if !(alpha > 0.0 && beta > 0.0) {
            return Err(SimError::InvalidParameter(format!(
                "gamma: alpha and beta must be > 0.0 (alpha={alpha}, beta={beta})"
            )));
        }

        let x = if alpha > 1.0 {
            self.cheng(alpha)
        } else if alpha == 1.0 {
            self.exponential()
        } else {
            self.algorithm_gs(alpha)
        };

        Ok(x * beta)
    }

    /// Returns 1.0 with probability `p`, otherwise 0.0.
    pub fn bernoulli(&mut self, p: f64) -> f64 {
        if uniform(&mut self.rng) < p {
            1.0
        } else {
            0.0
        }
    }

    /// Draw a uniform variate in `[0, 1)` from the shared stream.
    pub fn uniform(&mut self) -> f64 {
        uniform(&mut self.rng)
    }

    // alpha > 1
    fn cheng(&mut self, alpha: f64) -> f64 {
        let ainv = (2.0 * alpha - 1.0).sqrt();
        let bbb = alpha - LOG4;
        let ccc = alpha + ainv;

        loop {
            let u1 = uniform(&mut self.rng);
            if !(1e-7 < u1 && u1 < 0.999_999_9) {
                continue;
            }

            let u2 = 1.0 - uniform(&mut self.rng);
            let v = (u1 / (1.0 - u1)).ln() / ainv;
            let x = alpha * v.exp();
            let z = u1 * u1 * u2;
            let r = bbb + ccc * v - x;

            if r + SG_MAGICCONST - 4.5 * z >= 0.0 || r >= z.ln() {
                return x;
            }
        }
    }

    // alpha == 1
    fn exponential(&mut self) -> f64 {
        let mut u = uniform(&mut self.rng);
        while u <= 1e-7 {
            u = uniform(&mut self.rng);
        }
        -u.ln()
    }

    // 0 < alpha < 1
    fn algorithm_gs(&mut self, alpha: f64) -> f64 {
        let b = (E + alpha) / E;

        loop {
            let u = uniform(&mut self.rng);
            let p = b * u;

            let x = if p <= 1.0 {
                p.powf(1.0 / alpha)
            } else {
                -((b - p) / alpha).ln()
            };

            let u1 = uniform(&mut self.rng);
            let accept = if p > 1.0 {
                u1 <= x.powf(alpha - 1.0)
            } else {
                u1 <= (-x).exp()
            };

            if accept {
                return x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments(gamma: &mut Gamma, alpha: f64, beta: f64, n: usize) -> (f64, f64) {
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let x = gamma.sample(alpha, beta).unwrap();
            sum += x;
            sum_sq += x * x;
        }
        let mean = sum / n as f64;
        let variance = sum_sq / n as f64 - mean * mean;
        (mean, variance)
    }

    #[test]
    fn test_constants() {
        assert!((LOG4 - 4.0f64.ln()).abs() < 1e-15);
        assert!((SG_MAGICCONST - (1.0 + 4.5f64.ln())).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_non_positive_parameters() {
        let mut gamma = Gamma::default();
        assert!(matches!(
            gamma.sample(0.0, 1.0),
            Err(SimError::InvalidParameter(_))
        ));
        assert!(matches!(
            gamma.sample(1.0, -1.0),
            Err(SimError::InvalidParameter(_))
        ));
        assert!(matches!(
            gamma.sample(-2.0, 0.0),
            Err(SimError::InvalidParameter(_))
        ));
        assert!(gamma.sample(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_moments_alpha_two() {
        let mut gamma = Gamma::seeded(2024);
        let (mean, variance) = moments(&mut gamma, 2.0, 1.0, 1_000_000);
        assert!((mean - 2.0).abs() < 0.04, "mean {mean}");
        assert!((variance - 2.0).abs() < 0.04, "variance {variance}");
    }

    #[test]
    fn test_moments_exponential() {
        let mut gamma = Gamma::seeded(99);
        let (mean, variance) = moments(&mut gamma, 1.0, 2.0, 200_000);
        assert!((mean - 2.0).abs() < 0.05, "mean {mean}");
        assert!((variance - 4.0).abs() < 0.2, "variance {variance}");
    }

    #[test]
    fn test_moments_small_shape() {
        let mut gamma = Gamma::seeded(5);
        let (mean, variance) = moments(&mut gamma, 0.5, 2.0, 200_000);
        // mean 1.0, variance 2.0
        assert!((mean - 1.0).abs() < 0.03, "mean {mean}");
        assert!((variance - 2.0).abs() < 0.15, "variance {variance}");
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Gamma::seeded(11);
        let mut b = Gamma::seeded(11);
        for alpha in [0.3, 1.0, 2.5] {
            for _ in 0..50 {
                assert_eq!(
                    a.sample(alpha, 1.5).unwrap().to_bits(),
                    b.sample(alpha, 1.5).unwrap().to_bits()
                );
            }
        }
    }

    #[test]
    fn test_bernoulli_extremes() {
        let mut gamma = Gamma::seeded(3);
        for _ in 0..1000 {
            assert_eq!(gamma.bernoulli(1.0), 1.0);
            assert_eq!(gamma.bernoulli(0.0), 0.0);
        }
    }
}
