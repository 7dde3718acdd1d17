//! Common-cause failure groups and their expansion.
//!
//! A CCF group ties basic events that share a failure cause. Before
//! indexing, each member event is substituted by a small OR sub-tree over an
//! independent-failure part and a common-cause event shared by the group.
//! The indexed-tree builder consumes the substitution map and never sees the
//! original member events.
//!
//! The beta-factor parametrization is used: a member with total failure
//! probability p fails independently with `(1 - beta) * p` and together with
//! the whole group with `beta * p`.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{normalize_id, BasicEvent, FaultTree, Formula, FormulaArg};
use crate::node::GateType;

/// A group of basic events with a common failure cause.
#[derive(Debug, Clone)]
pub struct CcfGroup {
    id: String,
    orig_id: String,
    beta: f64,
    members: Vec<String>,
}

/// The artifacts of expanding CCF groups: fresh basic events and a
/// substitution formula per member event id.
#[derive(Debug, Default)]
pub struct CcfExpansion {
    pub events: Vec<BasicEvent>,
    pub substitutions: HashMap<String, Formula>,
}

impl CcfGroup {
    pub fn new(name: &str, beta: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&beta) {
            return Err(Error::Validation(format!(
                "beta factor {} of CCF group '{}' is outside [0, 1]",
                beta, name
            )));
        }
        Ok(Self {
            id: normalize_id(name),
            orig_id: name.to_string(),
            beta,
            members: Vec::new(),
        })
    }

    pub fn add_member(&mut self, name: &str) {
        self.members.push(normalize_id(name));
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn orig_id(&self) -> &str {
        &self.orig_id
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Validates the group against the model: at least two members, all
    /// defined, all with the same point probability (the beta-factor model
    /// assumes identical components).
    pub fn validate(&self, tree: &FaultTree) -> Result<()> {
        if self.members.len() < 2 {
            return Err(Error::Validation(format!(
                "CCF group '{}' needs at least two members",
                self.orig_id
            )));
        }
        let mut probability = None;
        for member in &self.members {
            let event = tree
                .basic_event(member)
                .ok_or_else(|| Error::UnknownRef(member.clone()))?;
            match probability {
                None => probability = Some(event.probability()),
                Some(p) if (p - event.probability()).abs() > 1e-12 => {
                    return Err(Error::Validation(format!(
                        "members of CCF group '{}' have unequal probabilities",
                        self.orig_id
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Expands the group into fresh events and member substitutions.
    ///
    /// The generated event ids follow the bracketed convention: `[a]` for
    /// the independent part of member `a`, `[a b c]` for the common-cause
    /// event of the whole group.
    pub fn expand(&self, tree: &FaultTree) -> Result<CcfExpansion> {
        self.validate(tree)?;
        let mut expansion = CcfExpansion::default();

        let originals: Vec<&BasicEvent> = self
            .members
            .iter()
            .map(|m| tree.basic_event(m).expect("validated member"))
            .collect();
        let probability = originals[0].probability();

        let common_id = format!(
            "[{}]",
            originals.iter().map(|e| e.orig_id()).collect::<Vec<_>>().join(" ")
        );
        expansion
            .events
            .push(BasicEvent::new(&common_id, self.beta * probability)?);

        for original in originals {
            let independent_id = format!("[{}]", original.orig_id());
            expansion.events.push(BasicEvent::new(
                &independent_id,
                (1.0 - self.beta) * original.probability(),
            )?);
            let formula = Formula::new(
                GateType::Or,
                vec![
                    FormulaArg::basic(&independent_id),
                    FormulaArg::basic(&common_id),
                ],
            )?;
            expansion.substitutions.insert(original.id().to_string(), formula);
        }
        Ok(expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_pump_tree() -> FaultTree {
        let mut ft = FaultTree::new("pumps");
        ft.add_basic_event(BasicEvent::new("pump-a", 0.01).unwrap()).unwrap();
        ft.add_basic_event(BasicEvent::new("pump-b", 0.01).unwrap()).unwrap();
        ft
    }

    #[test]
    fn test_beta_factor_expansion() {
        let ft = two_pump_tree();
        let mut group = CcfGroup::new("pumps-ccf", 0.1).unwrap();
        group.add_member("pump-a");
        group.add_member("pump-b");

        let expansion = group.expand(&ft).unwrap();
        assert_eq!(expansion.events.len(), 3);
        assert_eq!(expansion.substitutions.len(), 2);

        let common = &expansion.events[0];
        assert_eq!(common.orig_id(), "[pump-a pump-b]");
        assert!((common.probability() - 0.001).abs() < 1e-15);

        let independent = &expansion.events[1];
        assert!((independent.probability() - 0.009).abs() < 1e-15);

        assert!(expansion.substitutions.contains_key("pump-a"));
        assert!(expansion.substitutions.contains_key("pump-b"));
    }

    #[test]
    fn test_validation_failures() {
        let ft = two_pump_tree();

        let mut small = CcfGroup::new("solo", 0.1).unwrap();
        small.add_member("pump-a");
        assert!(small.validate(&ft).is_err());

        let mut unknown = CcfGroup::new("ghost", 0.1).unwrap();
        unknown.add_member("pump-a");
        unknown.add_member("pump-z");
        assert!(unknown.validate(&ft).is_err());

        assert!(CcfGroup::new("bad-beta", 1.5).is_err());
    }
}
