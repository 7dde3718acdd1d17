//! Analysis result objects.
//!
//! These are the append-only outputs handed to external reporters: cut-set
//! listings with per-order accounting, the probability summary with the
//! importance table, and the uncertainty statistics. Warnings accumulate on
//! the result they concern instead of aborting the analysis.

use std::fmt::{Display, Formatter};

use crate::settings::Approximation;

/// A reported literal: an event by display id, possibly complemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub event_id: String,
    pub complement: bool,
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.complement {
            write!(f, "not {}", self.event_id)
        } else {
            write!(f, "{}", self.event_id)
        }
    }
}

/// One minimal cut set with its probability when probability analysis ran.
#[derive(Debug, Clone)]
pub struct McsSet {
    pub literals: Vec<Literal>,
    pub probability: Option<f64>,
}

impl Display for McsSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, literal) in self.literals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", literal)?;
        }
        write!(f, "}}")
    }
}

/// The outcome of fault tree analysis: the minimal cut sets plus the
/// counters a reporter prints in its header.
#[derive(Debug, Clone)]
pub struct FtaResult {
    /// Display id of the top event.
    pub top_id: String,
    /// Number of primary (basic and house) events in the tree.
    pub primary_count: usize,
    /// Number of gates in the tree, the top gate included.
    pub gate_count: usize,
    /// The configured limit on cut set order.
    pub limit_order: usize,
    /// The largest produced order.
    pub max_order: usize,
    /// Minimal cut sets in canonical order (size, then lexicographic).
    pub mcs: Vec<McsSet>,
    /// Time spent indexing and preprocessing, in seconds.
    pub preprocess_time: f64,
    /// Time spent generating minimal cut sets, in seconds.
    pub mcs_time: f64,
    pub warnings: Vec<String>,
}

impl FtaResult {
    /// Cut sets per order: index 0 counts order-1 sets, and so on up to
    /// `max_order`.
    pub fn distribution(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_order];
        for set in &self.mcs {
            if !set.literals.is_empty() {
                counts[set.literals.len() - 1] += 1;
            }
        }
        counts
    }
}

/// Fussell-Vesely importance of one basic event.
#[derive(Debug, Clone)]
pub struct ImportanceRecord {
    pub event_id: String,
    /// Probability of the union of cut sets containing the event.
    pub contribution: f64,
    /// `contribution / p_total`.
    pub relative: f64,
}

/// The outcome of probability analysis.
#[derive(Debug, Clone)]
pub struct ProbResult {
    pub approximation: Approximation,
    pub num_sums: usize,
    pub cut_off: f64,
    /// Cut sets that survived the cut-off filter.
    pub num_prob_mcs: usize,
    pub p_total: f64,
    /// Importance records in event-id order; empty unless importance
    /// analysis was requested.
    pub importance: Vec<ImportanceRecord>,
    pub warnings: Vec<String>,
}

/// The outcome of Monte-Carlo uncertainty analysis.
#[derive(Debug, Clone)]
pub struct UncertaintyResult {
    pub mean: f64,
    pub sigma: f64,
    /// 95% confidence interval of the mean.
    pub confidence_interval: (f64, f64),
    /// Density estimate: (bin lower bound, fraction of samples) per bin.
    pub distribution: Vec<(f64, f64)>,
    /// 20 evenly spaced quantiles at probabilities 0.05, 0.10, ..., 1.00.
    pub quantiles: Vec<f64>,
    /// Wall-clock duration of the analysis, in seconds.
    pub analysis_time: f64,
    pub warnings: Vec<String>,
}
