//! Seeded random sampling for uncertainty analysis.
//!
//! One generator instance owns a single seeded stream shared by every
//! distribution, so a fixed seed and trial order reproduce results exactly.

use rand::distributions::WeightedIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Distribution as Sample;
use rand_distr::{Beta, Exp, Gamma, LogNormal, Normal, Poisson, Triangular, Weibull};

use crate::model::Distribution;

/// Random number generators for the supported distributions.
///
/// Parameters are assumed valid; descriptors are validated when attached to
/// a basic event, so the constructors here cannot fail.
pub struct Random {
    rng: ChaCha8Rng,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws from the given descriptor.
    pub fn sample(&mut self, distribution: &Distribution) -> f64 {
        match distribution {
            Distribution::Uniform { min, max } => self.uniform(*min, *max),
            Distribution::Triangular { lower, mode, upper } => {
                self.triangular(*lower, *mode, *upper)
            }
            Distribution::PiecewiseLinear { points, weights } => {
                self.piecewise_linear(points, weights)
            }
            Distribution::Histogram { boundaries, weights } => {
                self.histogram(boundaries, weights)
            }
            Distribution::Normal { mean, sigma } => self.normal(*mean, *sigma),
            Distribution::LogNormal { mean, sigma } => self.lognormal(*mean, *sigma),
            Distribution::Gamma { shape, scale } => self.gamma(*shape, *scale),
            Distribution::Beta { alpha, beta } => self.beta(*alpha, *beta),
            Distribution::Weibull { shape, scale } => self.weibull(*shape, *scale),
            Distribution::Exponential { rate } => self.exponential(*rate),
            Distribution::Poisson { mean } => self.poisson(*mean),
        }
    }

    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        self.rng.gen_range(min..max)
    }

    pub fn triangular(&mut self, lower: f64, mode: f64, upper: f64) -> f64 {
        Triangular::new(lower, upper, mode)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    /// Inverse-transform sampling of a piecewise-linear density through
    /// `(points[i], weights[i])`. A segment is chosen by its trapezoid area,
    /// then the linear density within the segment is inverted analytically.
    pub fn piecewise_linear(&mut self, points: &[f64], weights: &[f64]) -> f64 {
        let areas: Vec<f64> = points
            .windows(2)
            .enumerate()
            .map(|(i, w)| (weights[i] + weights[i + 1]) / 2.0 * (w[1] - w[0]))
            .collect();
        let segment = self.discrete(&areas);

        let x0 = points[segment];
        let dx = points[segment + 1] - x0;
        let w0 = weights[segment];
        let w1 = weights[segment + 1];
        let u = self.rng.gen::<f64>() * areas[segment];

        // Solve w0*t + (w1-w0)/(2*dx)*t^2 = u for t in [0, dx].
        let c = (w1 - w0) / (2.0 * dx);
        let t = if c.abs() < 1e-12 {
            u / w0
        } else {
            (-w0 + (w0 * w0 + 4.0 * c * u).sqrt()) / (2.0 * c)
        };
        x0 + t.clamp(0.0, dx)
    }

    /// Samples a histogram: an interval chosen by weight, uniform within it.
    pub fn histogram(&mut self, boundaries: &[f64], weights: &[f64]) -> f64 {
        let interval = self.discrete(&weights[..boundaries.len() - 1]);
        self.uniform(boundaries[interval], boundaries[interval + 1])
    }

    pub fn normal(&mut self, mean: f64, sigma: f64) -> f64 {
        Normal::new(mean, sigma)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    pub fn lognormal(&mut self, mean: f64, sigma: f64) -> f64 {
        LogNormal::new(mean, sigma)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    pub fn gamma(&mut self, shape: f64, scale: f64) -> f64 {
        Gamma::new(shape, scale)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    pub fn beta(&mut self, alpha: f64, beta: f64) -> f64 {
        Beta::new(alpha, beta)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    pub fn weibull(&mut self, shape: f64, scale: f64) -> f64 {
        Weibull::new(scale, shape)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    pub fn exponential(&mut self, rate: f64) -> f64 {
        Exp::new(rate)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    pub fn poisson(&mut self, mean: f64) -> f64 {
        Poisson::new(mean)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }

    /// Index in `[0, weights.len())` drawn proportionally to the weights.
    fn discrete(&mut self, weights: &[f64]) -> usize {
        WeightedIndex::new(weights)
            .expect("parameters checked at load")
            .sample(&mut self.rng)
    }
}
