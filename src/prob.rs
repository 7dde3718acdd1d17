//! Top-event probability over a collection of minimal cut sets.
//!
//! Three evaluations are supported: the rare-event sum, the Min-Cut Upper
//! Bound, and the default truncated Sylvester-Poincare expansion. The
//! expansion is materialized as positive and negative term lists of literal
//! conjunctions, so it can be re-evaluated cheaply against different
//! probability vectors; the uncertainty engine samples through the very same
//! representation.

use std::collections::BTreeSet;

use crate::mcs::CutSet;
use crate::settings::Approximation;

/// The probability of a conjunction of literals: `p` for a positive literal,
/// `1 - p` for a complement. The empty (unity) set yields 1.
///
/// `probs` is indexed by basic-event index; slot 0 is unused.
pub fn prob_and(set: &CutSet, probs: &[f64]) -> f64 {
    set.literals()
        .iter()
        .map(|lit| {
            let p = probs[lit.var() as usize];
            if lit.is_negated() {
                1.0 - p
            } else {
                p
            }
        })
        .product()
}

/// The rare-event approximation: the plain sum of cut-set probabilities.
/// The result may exceed 1 for non-rare events.
pub fn prob_rare_event(sets: &[CutSet], probs: &[f64]) -> f64 {
    sets.iter().map(|set| prob_and(set, probs)).sum()
}

/// The Min-Cut Upper Bound: `1 - prod(1 - P(C_i))`.
pub fn prob_mcub(sets: &[CutSet], probs: &[f64]) -> f64 {
    1.0 - sets
        .iter()
        .map(|set| 1.0 - prob_and(set, probs))
        .product::<f64>()
}

/// The truncated Sylvester-Poincare expansion of `P(C_1 | ... | C_n)` as
/// signed term lists.
///
/// Terms of the k-wise intersections up to `num_sums` levels are collected
/// into `pos_terms` and `neg_terms`; intersections holding a literal and its
/// complement vanish and are dropped during construction. Cut sets enter the
/// recursion in their canonical size-then-lexicographic order, which makes
/// the truncation reproducible.
#[derive(Debug, Clone, Default)]
pub struct ProbabilitySeries {
    pub pos_terms: Vec<CutSet>,
    pub neg_terms: Vec<CutSet>,
}

impl ProbabilitySeries {
    pub fn build(sets: &[CutSet], num_sums: usize) -> Self {
        assert!(num_sums >= 1);
        let mut series = Self::default();
        let mut working: BTreeSet<CutSet> = sets.iter().cloned().collect();
        Self::expand(true, num_sums, &mut working, &mut series);
        series
    }

    /// One level of the expansion:
    /// `P(A | rest) = P(A) + P(rest) - P(A & rest)`, the last term with the
    /// opposite sign and one truncation level less.
    fn expand(positive: bool, nsums: usize, sets: &mut BTreeSet<CutSet>, out: &mut Self) {
        if nsums == 0 {
            return;
        }
        while let Some(first) = pop_first(sets) {
            if positive {
                out.pos_terms.push(first.clone());
            } else {
                out.neg_terms.push(first.clone());
            }
            let mut combined: BTreeSet<CutSet> =
                sets.iter().filter_map(|set| first.merge(set)).collect();
            Self::expand(!positive, nsums - 1, &mut combined, out);
        }
    }

    /// Evaluates the series against a probability vector.
    pub fn evaluate(&self, probs: &[f64]) -> f64 {
        let positive: f64 = self.pos_terms.iter().map(|t| prob_and(t, probs)).sum();
        let negative: f64 = self.neg_terms.iter().map(|t| prob_and(t, probs)).sum();
        positive - negative
    }
}

fn pop_first(sets: &mut BTreeSet<CutSet>) -> Option<CutSet> {
    let first = sets.iter().next()?.clone();
    sets.remove(&first);
    Some(first)
}

/// The top-event probability under the configured approximation.
pub fn top_probability(
    sets: &[CutSet],
    probs: &[f64],
    approximation: Approximation,
    num_sums: usize,
) -> f64 {
    match approximation {
        Approximation::RareEvent => prob_rare_event(sets, probs),
        Approximation::Mcub => prob_mcub(sets, probs),
        Approximation::Default => ProbabilitySeries::build(sets, num_sums).evaluate(probs),
    }
}
