//! Monte-Carlo uncertainty analysis of the top-event probability.
//!
//! The probability series over the minimal cut sets is built once; basic
//! events without a distribution are factored out of every term into fixed
//! multipliers, so each trial only re-samples the uncertain events and
//! re-evaluates the stripped terms. Statistics are computed over the sample
//! vector: mean, variance, a 95% confidence interval, a 20-bin density
//! estimate, and 20 evenly spaced quantiles.

use std::collections::BTreeSet;
use std::time::Instant;

use log::{debug, warn};

use crate::mcs::CutSet;
use crate::model::BasicEvent;
use crate::prob::{prob_and, ProbabilitySeries};
use crate::random::Random;
use crate::result::UncertaintyResult;
use crate::settings::{Approximation, Settings};

const NUM_BINS: usize = 20;
const NUM_QUANTILES: usize = 20;

pub struct UncertaintyAnalysis {
    settings: Settings,
}

/// Signed term lists with the constant-event multipliers factored out.
struct FactoredSeries {
    pos_terms: Vec<CutSet>,
    pos_const: Vec<f64>,
    neg_terms: Vec<CutSet>,
    neg_const: Vec<f64>,
}

impl UncertaintyAnalysis {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Runs the Monte-Carlo simulation over the cut sets.
    ///
    /// `events` holds the basic events so that index `i + 1` in the cut set
    /// literals refers to `events[i]`.
    pub fn analyze(&self, sets: &[CutSet], events: &[BasicEvent]) -> UncertaintyResult {
        let start = Instant::now();
        let mut warnings = Vec::new();

        // The guaranteed-failure tree needs no sampling.
        if sets.len() == 1 && sets[0].is_unity() {
            warn!("uncertainty analysis of a UNITY tree");
            warnings.push("Uncertainty for UNITY case.".to_string());
            return UncertaintyResult {
                mean: 1.0,
                sigma: 0.0,
                confidence_interval: (1.0, 1.0),
                distribution: vec![(1.0, 1.0)],
                quantiles: vec![1.0; NUM_QUANTILES],
                analysis_time: start.elapsed().as_secs_f64(),
                warnings,
            };
        }

        let mut probs = vec![0.0; events.len() + 1];
        for (i, event) in events.iter().enumerate() {
            probs[i + 1] = event.probability();
        }

        let retained: Vec<CutSet> = sets
            .iter()
            .filter(|set| prob_and(set, &probs) > self.settings.get_cut_off())
            .cloned()
            .collect();

        let num_sums = match self.settings.get_approximation() {
            Approximation::RareEvent => 1,
            _ => self.settings.get_num_sums(),
        };
        let series = ProbabilitySeries::build(&retained, num_sums);

        // Partition the referenced events into constant and uncertain.
        let referenced: BTreeSet<i32> = retained
            .iter()
            .flat_map(|set| set.literals().iter().map(|lit| lit.var()))
            .collect();
        let uncertain: Vec<i32> = referenced
            .iter()
            .copied()
            .filter(|&index| !events[index as usize - 1].is_constant())
            .collect();
        debug!(
            "{} uncertain of {} referenced events, {} terms",
            uncertain.len(),
            referenced.len(),
            series.pos_terms.len() + series.neg_terms.len()
        );
        let factored = Self::factor_constants(&series, &uncertain, &probs);

        let samples = self.sample(&factored, &uncertain, events, &probs);
        let mut result = Self::statistics(&samples);
        result.analysis_time = start.elapsed().as_secs_f64();
        result.warnings = warnings;
        result
    }

    /// Splits each term into its uncertain literals and a fixed multiplier
    /// over the constant ones.
    fn factor_constants(
        series: &ProbabilitySeries,
        uncertain: &[i32],
        probs: &[f64],
    ) -> FactoredSeries {
        let split = |terms: &[CutSet]| -> (Vec<CutSet>, Vec<f64>) {
            let mut stripped = Vec::with_capacity(terms.len());
            let mut constants = Vec::with_capacity(terms.len());
            for term in terms {
                let mut multiplier = 1.0;
                let kept = CutSet::from_lits(term.literals().iter().copied().filter(|lit| {
                    if uncertain.contains(&lit.var()) {
                        true
                    } else {
                        multiplier *= if lit.is_negated() {
                            1.0 - probs[lit.var() as usize]
                        } else {
                            probs[lit.var() as usize]
                        };
                        false
                    }
                }))
                .expect("a valid term has no complement pair");
                stripped.push(kept);
                constants.push(multiplier);
            }
            (stripped, constants)
        };
        let (pos_terms, pos_const) = split(&series.pos_terms);
        let (neg_terms, neg_const) = split(&series.neg_terms);
        FactoredSeries {
            pos_terms,
            pos_const,
            neg_terms,
            neg_const,
        }
    }

    /// The Monte-Carlo loop: re-sample every uncertain event, then evaluate
    /// the factored series.
    fn sample(
        &self,
        factored: &FactoredSeries,
        uncertain: &[i32],
        events: &[BasicEvent],
        probs: &[f64],
    ) -> Vec<f64> {
        let mut rng = Random::new(self.settings.get_seed());
        let mut iprobs = probs.to_vec();
        let num_trials = self.settings.get_num_trials();
        let mut samples = Vec::with_capacity(num_trials);
        for _ in 0..num_trials {
            for &index in uncertain {
                let distribution = events[index as usize - 1]
                    .distribution()
                    .expect("uncertain events carry a distribution");
                iprobs[index as usize] = rng.sample(distribution).clamp(0.0, 1.0);
            }
            let pos: f64 = factored
                .pos_terms
                .iter()
                .zip(&factored.pos_const)
                .map(|(term, c)| prob_and(term, &iprobs) * c)
                .sum();
            let neg: f64 = factored
                .neg_terms
                .iter()
                .zip(&factored.neg_const)
                .map(|(term, c)| prob_and(term, &iprobs) * c)
                .sum();
            samples.push(pos - neg);
        }
        samples
    }

    /// Mean, population variance, 95% CI, density estimate, and quantiles.
    fn statistics(samples: &[f64]) -> UncertaintyResult {
        let n = samples.len();
        assert!(n > 0);
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        let sigma = variance.sqrt();
        let margin = 1.96 * sigma / (n as f64).sqrt();
        let confidence_interval = (mean - margin, mean + margin);

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("samples are finite"));
        let min = sorted[0];
        let max = sorted[n - 1];

        let distribution = if max > min {
            let width = (max - min) / NUM_BINS as f64;
            let mut counts = vec![0usize; NUM_BINS];
            for &x in samples {
                let bin = (((x - min) / width) as usize).min(NUM_BINS - 1);
                counts[bin] += 1;
            }
            counts
                .iter()
                .enumerate()
                .map(|(i, &count)| (min + i as f64 * width, count as f64 / n as f64))
                .collect()
        } else {
            vec![(min, 1.0)]
        };

        // Nearest-rank quantiles at 0.05, 0.10, ..., 1.00.
        let quantiles = (1..=NUM_QUANTILES)
            .map(|i| {
                let p = i as f64 / NUM_QUANTILES as f64;
                let rank = ((p * n as f64).ceil() as usize).clamp(1, n);
                sorted[rank - 1]
            })
            .collect();

        UncertaintyResult {
            mean,
            sigma,
            confidence_interval,
            distribution,
            quantiles,
            analysis_time: 0.0,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Distribution;
    use crate::node::Lit;

    fn cut(lits: &[i32]) -> CutSet {
        CutSet::from_lits(lits.iter().map(|&l| Lit::from_signed(l))).unwrap()
    }

    fn constant_event(id: &str, p: f64) -> BasicEvent {
        BasicEvent::new(id, p).unwrap()
    }

    fn uniform_event(id: &str, p: f64, min: f64, max: f64) -> BasicEvent {
        BasicEvent::new(id, p)
            .unwrap()
            .with_distribution(Distribution::Uniform { min, max })
            .unwrap()
    }

    fn settings(trials: usize, seed: u64) -> Settings {
        Settings::default()
            .uncertainty_analysis(true)
            .num_trials(trials)
            .unwrap()
            .seed(seed)
    }

    #[test]
    fn test_unity_case() {
        let analysis = UncertaintyAnalysis::new(&settings(100, 1));
        let result = analysis.analyze(&[CutSet::unity()], &[]);
        assert_eq!(result.mean, 1.0);
        assert_eq!(result.sigma, 0.0);
        assert_eq!(result.confidence_interval, (1.0, 1.0));
        assert_eq!(result.quantiles, vec![1.0; 20]);
        assert_eq!(result.distribution, vec![(1.0, 1.0)]);
        assert!(result.warnings.iter().any(|w| w.contains("UNITY")));
    }

    #[test]
    fn test_all_constant_events_reproduce_point_probability() {
        // AND(a, b) with constant events: every sample equals p(a) * p(b).
        let events = vec![constant_event("a", 0.1), constant_event("b", 0.2)];
        let analysis = UncertaintyAnalysis::new(&settings(50, 3));
        let result = analysis.analyze(&[cut(&[1, 2])], &events);
        assert!((result.mean - 0.02).abs() < 1e-12);
        assert!(result.sigma < 1e-15);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let events = vec![
            uniform_event("a", 0.1, 0.05, 0.15),
            constant_event("b", 0.2),
        ];
        let sets = [cut(&[1, 2])];
        let first = UncertaintyAnalysis::new(&settings(200, 42)).analyze(&sets, &events);
        let second = UncertaintyAnalysis::new(&settings(200, 42)).analyze(&sets, &events);
        assert_eq!(first.mean, second.mean);
        assert_eq!(first.sigma, second.sigma);
        assert_eq!(first.confidence_interval, second.confidence_interval);
        assert_eq!(first.quantiles, second.quantiles);
    }

    #[test]
    fn test_uniform_mean_converges() {
        // OR of a single uniform event: the sample mean approaches the
        // distribution mean 0.1.
        let events = vec![uniform_event("a", 0.1, 0.0, 0.2)];
        let result = UncertaintyAnalysis::new(&settings(2000, 7)).analyze(&[cut(&[1])], &events);
        assert!((result.mean - 0.1).abs() < 4.0 * result.sigma / (2000f64).sqrt() + 1e-3);
        assert!(result.sigma > 0.0);
        assert_eq!(result.quantiles.len(), 20);
        assert_eq!(result.distribution.len(), 20);
        // Quantiles are non-decreasing and the last is the sample maximum.
        for pair in result.quantiles.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_samples_clamped_to_unit_interval() {
        // A wide normal distribution would wander outside [0, 1] without
        // clamping; the mean must stay inside regardless.
        let event = BasicEvent::new("a", 0.5)
            .unwrap()
            .with_distribution(Distribution::Normal { mean: 0.5, sigma: 2.0 })
            .unwrap();
        let result =
            UncertaintyAnalysis::new(&settings(500, 11)).analyze(&[cut(&[1])], &[event]);
        assert!(result.mean >= 0.0 && result.mean <= 1.0);
        assert!(result.quantiles.iter().all(|&q| (0.0..=1.0).contains(&q)));
    }
}
