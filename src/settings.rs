//! Analysis settings.
//!
//! A plain value object configured with chained setters before any analysis
//! starts; the engines treat it as immutable. Setters with numeric limits
//! validate eagerly so a bad configuration fails before any work is done.

use crate::error::{Error, Result};

/// The approximation used for the top-event probability.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Approximation {
    /// Truncated Sylvester-Poincare expansion with `num_sums` terms.
    #[default]
    Default,
    /// Sum of cut-set probabilities. May exceed 1; a warning is recorded.
    RareEvent,
    /// Min-Cut Upper Bound: `1 - prod(1 - P(C_i))`.
    Mcub,
}

#[derive(Debug, Clone)]
pub struct Settings {
    probability_analysis: bool,
    importance_analysis: bool,
    uncertainty_analysis: bool,
    ccf_analysis: bool,
    approximation: Approximation,
    limit_order: usize,
    cut_off: f64,
    num_sums: usize,
    mission_time: f64,
    num_trials: usize,
    seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probability_analysis: false,
            importance_analysis: false,
            uncertainty_analysis: false,
            ccf_analysis: false,
            approximation: Approximation::Default,
            limit_order: 20,
            cut_off: 1e-8,
            num_sums: 7,
            mission_time: 8760.0,
            num_trials: 1000,
            seed: 0,
        }
    }
}

// Toggles and unchecked setters
impl Settings {
    pub fn probability_analysis(mut self, flag: bool) -> Self {
        self.probability_analysis = flag;
        self
    }

    pub fn importance_analysis(mut self, flag: bool) -> Self {
        self.importance_analysis = flag;
        // Importance is derived from the probability machinery.
        if flag {
            self.probability_analysis = true;
        }
        self
    }

    pub fn uncertainty_analysis(mut self, flag: bool) -> Self {
        self.uncertainty_analysis = flag;
        self
    }

    pub fn ccf_analysis(mut self, flag: bool) -> Self {
        self.ccf_analysis = flag;
        self
    }

    pub fn approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// Validated setters
impl Settings {
    pub fn limit_order(mut self, limit: usize) -> Result<Self> {
        if limit < 1 {
            return Err(Error::InvalidSetting {
                name: "limit_order",
                reason: format!("{} is below 1", limit),
            });
        }
        self.limit_order = limit;
        Ok(self)
    }

    pub fn cut_off(mut self, cut_off: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&cut_off) {
            return Err(Error::InvalidSetting {
                name: "cut_off",
                reason: format!("{} is outside [0, 1]", cut_off),
            });
        }
        self.cut_off = cut_off;
        Ok(self)
    }

    pub fn num_sums(mut self, num_sums: usize) -> Result<Self> {
        if num_sums < 1 {
            return Err(Error::InvalidSetting {
                name: "num_sums",
                reason: format!("{} is below 1", num_sums),
            });
        }
        self.num_sums = num_sums;
        Ok(self)
    }

    pub fn mission_time(mut self, time: f64) -> Result<Self> {
        if time <= 0.0 {
            return Err(Error::InvalidSetting {
                name: "mission_time",
                reason: format!("{} is not positive", time),
            });
        }
        self.mission_time = time;
        Ok(self)
    }

    pub fn num_trials(mut self, trials: usize) -> Result<Self> {
        if trials < 1 {
            return Err(Error::InvalidSetting {
                name: "num_trials",
                reason: format!("{} is below 1", trials),
            });
        }
        self.num_trials = trials;
        Ok(self)
    }
}

// Getters
impl Settings {
    pub fn is_probability_analysis(&self) -> bool {
        self.probability_analysis
    }

    pub fn is_importance_analysis(&self) -> bool {
        self.importance_analysis
    }

    pub fn is_uncertainty_analysis(&self) -> bool {
        self.uncertainty_analysis
    }

    pub fn is_ccf_analysis(&self) -> bool {
        self.ccf_analysis
    }

    pub fn get_approximation(&self) -> Approximation {
        self.approximation
    }

    pub fn get_limit_order(&self) -> usize {
        self.limit_order
    }

    pub fn get_cut_off(&self) -> f64 {
        self.cut_off
    }

    pub fn get_num_sums(&self) -> usize {
        self.num_sums
    }

    pub fn get_mission_time(&self) -> f64 {
        self.mission_time
    }

    pub fn get_num_trials(&self) -> usize {
        self.num_trials
    }

    pub fn get_seed(&self) -> u64 {
        self.seed
    }
}
