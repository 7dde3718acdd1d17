//! Domain model of a fault tree: events, gates, formulas, and the container
//! tying them together.
//!
//! Identifiers are case-insensitive: every named object keeps a lower-cased
//! `id` used for lookups and uniqueness, plus the original spelling in
//! `orig_id` for display.

use std::collections::HashMap;

use crate::ccf::CcfGroup;
use crate::error::{Error, Result};
use crate::node::GateType;

/// Canonical form of an identifier.
pub(crate) fn normalize_id(name: &str) -> String {
    name.to_lowercase()
}

/// A probability distribution descriptor attached to a basic event.
///
/// Parameters are validated when the descriptor is attached; sampled values
/// are clamped to [0, 1] by the uncertainty engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Uniform { min: f64, max: f64 },
    Triangular { lower: f64, mode: f64, upper: f64 },
    /// Piecewise-linear density through `(point, weight)` pairs with
    /// strictly increasing points.
    PiecewiseLinear { points: Vec<f64>, weights: Vec<f64> },
    /// Histogram over interval boundaries; one weight per interval.
    Histogram { boundaries: Vec<f64>, weights: Vec<f64> },
    Normal { mean: f64, sigma: f64 },
    LogNormal { mean: f64, sigma: f64 },
    Gamma { shape: f64, scale: f64 },
    Beta { alpha: f64, beta: f64 },
    Weibull { shape: f64, scale: f64 },
    Exponential { rate: f64 },
    Poisson { mean: f64 },
}

impl Distribution {
    /// Checks the distribution parameters.
    pub fn validate(&self) -> Result<()> {
        let fail = |name: &'static str, reason: String| {
            Err(Error::InvalidDistribution { name, reason })
        };
        match self {
            Distribution::Uniform { min, max } => {
                if min >= max {
                    return fail("uniform", format!("min {} is not below max {}", min, max));
                }
            }
            Distribution::Triangular { lower, mode, upper } => {
                if !(lower <= mode && mode <= upper && lower < upper) {
                    return fail(
                        "triangular",
                        format!("bounds ({}, {}, {}) are not ordered", lower, mode, upper),
                    );
                }
            }
            Distribution::PiecewiseLinear { points, weights } => {
                if points.len() < 2 || weights.len() < points.len() {
                    return fail("piecewise-linear", "needs at least two weighted points".into());
                }
                if !points.windows(2).all(|w| w[0] < w[1]) {
                    return fail("piecewise-linear", "points must be strictly increasing".into());
                }
                if weights.iter().any(|&w| w < 0.0) || weights.iter().all(|&w| w == 0.0) {
                    return fail("piecewise-linear", "weights must be non-negative, not all zero".into());
                }
            }
            Distribution::Histogram { boundaries, weights } => {
                if boundaries.len() < 2 || weights.len() < boundaries.len() - 1 {
                    return fail("histogram", "needs at least one weighted interval".into());
                }
                if !boundaries.windows(2).all(|w| w[0] < w[1]) {
                    return fail("histogram", "boundaries must be strictly increasing".into());
                }
                if weights.iter().any(|&w| w < 0.0) || weights.iter().all(|&w| w == 0.0) {
                    return fail("histogram", "weights must be non-negative, not all zero".into());
                }
            }
            Distribution::Normal { sigma, .. } => {
                if *sigma <= 0.0 {
                    return fail("normal", format!("sigma {} is not positive", sigma));
                }
            }
            Distribution::LogNormal { sigma, .. } => {
                if *sigma <= 0.0 {
                    return fail("lognormal", format!("sigma {} is not positive", sigma));
                }
            }
            Distribution::Gamma { shape, scale } => {
                if *shape <= 0.0 || *scale <= 0.0 {
                    return fail("gamma", format!("shape {} and scale {} must be positive", shape, scale));
                }
            }
            Distribution::Beta { alpha, beta } => {
                if *alpha <= 0.0 || *beta <= 0.0 {
                    return fail("beta", format!("alpha {} and beta {} must be positive", alpha, beta));
                }
            }
            Distribution::Weibull { shape, scale } => {
                if *shape <= 0.0 || *scale <= 0.0 {
                    return fail("weibull", format!("shape {} and scale {} must be positive", shape, scale));
                }
            }
            Distribution::Exponential { rate } => {
                if *rate <= 0.0 {
                    return fail("exponential", format!("rate {} is not positive", rate));
                }
            }
            Distribution::Poisson { mean } => {
                if *mean <= 0.0 {
                    return fail("poisson", format!("mean {} is not positive", mean));
                }
            }
        }
        Ok(())
    }
}

/// A basic failure event with a point probability and an optional
/// distribution for uncertainty analysis.
#[derive(Debug, Clone)]
pub struct BasicEvent {
    id: String,
    orig_id: String,
    probability: f64,
    distribution: Option<Distribution>,
}

impl BasicEvent {
    pub fn new(name: &str, probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::ProbabilityRange {
                id: name.to_string(),
                value: probability,
            });
        }
        Ok(Self {
            id: normalize_id(name),
            orig_id: name.to_string(),
            probability,
            distribution: None,
        })
    }

    /// Attaches a validated distribution descriptor.
    pub fn with_distribution(mut self, distribution: Distribution) -> Result<Self> {
        distribution.validate()?;
        self.distribution = Some(distribution);
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn orig_id(&self) -> &str {
        &self.orig_id
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution.as_ref()
    }

    /// A basic event without a distribution contributes a fixed probability
    /// to every Monte-Carlo trial.
    pub fn is_constant(&self) -> bool {
        self.distribution.is_none()
    }
}

/// A house event: a Boolean constant chosen by the analyst.
#[derive(Debug, Clone)]
pub struct HouseEvent {
    id: String,
    orig_id: String,
    state: bool,
}

impl HouseEvent {
    pub fn new(name: &str, state: bool) -> Self {
        Self {
            id: normalize_id(name),
            orig_id: name.to_string(),
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn orig_id(&self) -> &str {
        &self.orig_id
    }

    pub fn state(&self) -> bool {
        self.state
    }
}

/// An argument of a formula: an event or gate referenced by name, or a
/// nested formula.
#[derive(Debug, Clone)]
pub enum FormulaArg {
    Basic(String),
    House(String),
    Gate(String),
    Formula(Box<Formula>),
}

impl FormulaArg {
    pub fn basic(name: &str) -> Self {
        FormulaArg::Basic(name.to_string())
    }

    pub fn house(name: &str) -> Self {
        FormulaArg::House(name.to_string())
    }

    pub fn gate(name: &str) -> Self {
        FormulaArg::Gate(name.to_string())
    }

    pub fn formula(formula: Formula) -> Self {
        FormulaArg::Formula(Box::new(formula))
    }
}

/// A Boolean formula over events, gates, and nested formulas.
///
/// Arity rules: NOT and NULL take exactly one argument, XOR exactly two,
/// ATLEAST at least two with `1 <= vote < #args`, everything else at least
/// two.
#[derive(Debug, Clone)]
pub struct Formula {
    kind: GateType,
    vote_number: Option<usize>,
    args: Vec<FormulaArg>,
}

impl Formula {
    pub fn new(kind: GateType, args: Vec<FormulaArg>) -> Result<Self> {
        let arity_error = |kind: &'static str, expected: &'static str, actual: usize| {
            Err(Error::InvalidArity {
                kind,
                expected,
                actual,
            })
        };
        match kind {
            GateType::Not | GateType::Null => {
                if args.len() != 1 {
                    return arity_error(kind_name(kind), "exactly one", args.len());
                }
            }
            GateType::Xor => {
                if args.len() != 2 {
                    return arity_error("XOR", "exactly two", args.len());
                }
            }
            GateType::Atleast => {
                return Err(Error::Validation(
                    "ATLEAST formulas must be built with Formula::atleast".into(),
                ));
            }
            _ => {
                if args.len() < 2 {
                    return arity_error(kind_name(kind), "at least two", args.len());
                }
            }
        }
        Ok(Self {
            kind,
            vote_number: None,
            args,
        })
    }

    /// Builds an ATLEAST (vote) formula.
    pub fn atleast(vote: usize, args: Vec<FormulaArg>) -> Result<Self> {
        if args.len() < 2 {
            return Err(Error::InvalidArity {
                kind: "ATLEAST",
                expected: "at least two",
                actual: args.len(),
            });
        }
        if vote < 1 || vote >= args.len() {
            return Err(Error::InvalidVote {
                vote,
                children: args.len(),
            });
        }
        Ok(Self {
            kind: GateType::Atleast,
            vote_number: Some(vote),
            args,
        })
    }

    pub fn kind(&self) -> GateType {
        self.kind
    }

    pub fn vote_number(&self) -> Option<usize> {
        self.vote_number
    }

    pub fn args(&self) -> &[FormulaArg] {
        &self.args
    }
}

fn kind_name(kind: GateType) -> &'static str {
    match kind {
        GateType::And => "AND",
        GateType::Or => "OR",
        GateType::Atleast => "ATLEAST",
        GateType::Xor => "XOR",
        GateType::Not => "NOT",
        GateType::Nand => "NAND",
        GateType::Nor => "NOR",
        GateType::Null => "NULL",
    }
}

/// A named gate holding one formula.
#[derive(Debug, Clone)]
pub struct Gate {
    id: String,
    orig_id: String,
    formula: Formula,
}

impl Gate {
    pub fn new(name: &str, formula: Formula) -> Self {
        Self {
            id: normalize_id(name),
            orig_id: name.to_string(),
            formula,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn orig_id(&self) -> &str {
        &self.orig_id
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

/// The fault tree container: all named objects plus the top event.
///
/// Gates, basic events, and house events share one identifier namespace, so
/// a formula argument name resolves to at most one object.
#[derive(Debug, Default)]
pub struct FaultTree {
    name: String,
    top_event: Option<String>,
    gates: HashMap<String, Gate>,
    basic_events: HashMap<String, BasicEvent>,
    house_events: HashMap<String, HouseEvent>,
    ccf_groups: Vec<CcfGroup>,
}

impl FaultTree {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_unique(&self, id: &str, orig: &str) -> Result<()> {
        if self.gates.contains_key(id)
            || self.basic_events.contains_key(id)
            || self.house_events.contains_key(id)
        {
            return Err(Error::DuplicateId(orig.to_string()));
        }
        Ok(())
    }

    pub fn add_gate(&mut self, gate: Gate) -> Result<()> {
        self.check_unique(gate.id(), gate.orig_id())?;
        self.gates.insert(gate.id().to_string(), gate);
        Ok(())
    }

    pub fn add_basic_event(&mut self, event: BasicEvent) -> Result<()> {
        self.check_unique(event.id(), event.orig_id())?;
        self.basic_events.insert(event.id().to_string(), event);
        Ok(())
    }

    pub fn add_house_event(&mut self, event: HouseEvent) -> Result<()> {
        self.check_unique(event.id(), event.orig_id())?;
        self.house_events.insert(event.id().to_string(), event);
        Ok(())
    }

    pub fn add_ccf_group(&mut self, group: CcfGroup) -> Result<()> {
        if self.ccf_groups.iter().any(|g| g.id() == group.id()) {
            return Err(Error::DuplicateId(group.orig_id().to_string()));
        }
        self.ccf_groups.push(group);
        Ok(())
    }

    /// Declares the top gate. The gate must already be defined.
    pub fn set_top_event(&mut self, name: &str) -> Result<()> {
        let id = normalize_id(name);
        if !self.gates.contains_key(&id) {
            return Err(Error::UnknownRef(name.to_string()));
        }
        self.top_event = Some(id);
        Ok(())
    }

    pub fn top_event(&self) -> Option<&Gate> {
        self.top_event.as_deref().and_then(|id| self.gates.get(id))
    }

    pub fn gate(&self, name: &str) -> Option<&Gate> {
        self.gates.get(&normalize_id(name))
    }

    pub fn basic_event(&self, name: &str) -> Option<&BasicEvent> {
        self.basic_events.get(&normalize_id(name))
    }

    pub fn house_event(&self, name: &str) -> Option<&HouseEvent> {
        self.house_events.get(&normalize_id(name))
    }

    pub fn gates(&self) -> &HashMap<String, Gate> {
        &self.gates
    }

    pub fn basic_events(&self) -> &HashMap<String, BasicEvent> {
        &self.basic_events
    }

    pub fn house_events(&self) -> &HashMap<String, HouseEvent> {
        &self.house_events
    }

    pub fn ccf_groups(&self) -> &[CcfGroup] {
        &self.ccf_groups
    }
}
