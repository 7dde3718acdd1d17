//! Analysis orchestration.
//!
//! The pipeline is strictly sequential: the domain model is indexed into a
//! graph, the preprocessor rewrites it in place, the cut set generator and
//! the probability and uncertainty engines consume it read-only. Each stage
//! appends its own result; nothing mutates an earlier stage's output.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::mcs::{CutSet, McsGenerator};
use crate::model::{BasicEvent, FaultTree, Formula, FormulaArg, Gate};
use crate::prob::{prob_and, top_probability};
use crate::preprocess::Preprocessor;
use crate::result::{FtaResult, ImportanceRecord, Literal, McsSet, ProbResult, UncertaintyResult};
use crate::settings::Settings;
use crate::tree::IndexedFaultTree;
use crate::uncertainty::UncertaintyAnalysis;

/// Indexed minimal cut sets with their event table: literal index `i + 1`
/// refers to `events[i]`.
#[derive(Debug)]
pub struct McsCollection {
    pub sets: Vec<CutSet>,
    pub events: Vec<BasicEvent>,
}

impl McsCollection {
    /// The point-probability vector the engines consume; slot 0 is unused.
    pub fn probabilities(&self) -> Vec<f64> {
        let mut probs = vec![0.0; self.events.len() + 1];
        for (i, event) in self.events.iter().enumerate() {
            probs[i + 1] = event.probability();
        }
        probs
    }
}

/// Names reachable from the top gate of the domain model.
#[derive(Debug, Default)]
struct ModelScope {
    basic: BTreeSet<String>,
    house: BTreeSet<String>,
    gates: BTreeSet<String>,
}

fn collect_scope(model: &FaultTree, top: &Gate, scope: &mut ModelScope) {
    scope.gates.insert(top.id().to_string());
    collect_formula(model, top.formula(), scope);
}

fn collect_formula(model: &FaultTree, formula: &Formula, scope: &mut ModelScope) {
    for arg in formula.args() {
        match arg {
            FormulaArg::Basic(name) => {
                scope.basic.insert(crate::model::normalize_id(name));
            }
            FormulaArg::House(name) => {
                scope.house.insert(crate::model::normalize_id(name));
            }
            FormulaArg::Gate(name) => {
                let id = crate::model::normalize_id(name);
                if scope.gates.insert(id.clone()) {
                    if let Some(gate) = model.gate(&id) {
                        collect_formula(model, gate.formula(), scope);
                    }
                }
            }
            FormulaArg::Formula(sub) => collect_formula(model, sub, scope),
        }
    }
}

/// Fault tree analysis: model indexing, preprocessing, and minimal cut set
/// generation.
pub struct FaultTreeAnalysis {
    settings: Settings,
}

impl FaultTreeAnalysis {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Runs the analysis, returning the reportable result plus the indexed
    /// collection the probability and uncertainty engines consume.
    pub fn analyze(&self, model: &FaultTree) -> Result<(FtaResult, McsCollection)> {
        let top = model
            .top_event()
            .ok_or_else(|| Error::Validation("fault tree has no top event".into()))?;

        let mut scope = ModelScope::default();
        collect_scope(model, top, &mut scope);

        // Expand CCF groups into substitution formulas and fresh events.
        let mut substitutions: HashMap<String, Formula> = HashMap::new();
        let mut ccf_events: Vec<BasicEvent> = Vec::new();
        if self.settings.is_ccf_analysis() {
            for group in model.ccf_groups() {
                let expansion = group.expand(model)?;
                ccf_events.extend(expansion.events);
                substitutions.extend(expansion.substitutions);
            }
        }

        // Index assignment: referenced events in id order, then the CCF
        // events, so indices are deterministic for a given model.
        let mut events: Vec<BasicEvent> = Vec::new();
        for id in &scope.basic {
            if substitutions.contains_key(id) {
                continue;
            }
            let event = model
                .basic_event(id)
                .ok_or_else(|| Error::UnknownRef(id.clone()))?;
            events.push(event.clone());
        }
        events.extend(ccf_events);
        let event_index: HashMap<String, i32> = events
            .iter()
            .enumerate()
            .map(|(i, event)| (event.id().to_string(), i as i32 + 1))
            .collect();

        let start = Instant::now();
        let mut tree = IndexedFaultTree::index(model, top, &event_index, &substitutions)?;
        Preprocessor::new(&mut tree).run();
        let preprocess_time = start.elapsed().as_secs_f64();
        debug!(
            "preprocessed '{}' down to {} gates in {:.3}s",
            top.orig_id(),
            tree.reachable_gates().len(),
            preprocess_time
        );

        let start = Instant::now();
        let sets = McsGenerator::new(&tree, self.settings.get_limit_order()).generate();
        let mcs_time = start.elapsed().as_secs_f64();
        debug!("{} minimal cut sets in {:.3}s", sets.len(), mcs_time);

        let mut warnings = Vec::new();
        let orphans: Vec<&str> = {
            let mut ids: Vec<&str> = model
                .basic_events()
                .keys()
                .filter(|id| !scope.basic.contains(*id))
                .map(String::as_str)
                .collect();
            ids.sort_unstable();
            ids
        };
        if !orphans.is_empty() {
            warnings.push(format!("unused primary events: {}", orphans.join(", ")));
        }

        let max_order = sets.iter().map(CutSet::order).max().unwrap_or(0);
        let mcs = sets
            .iter()
            .map(|set| McsSet {
                literals: set
                    .literals()
                    .iter()
                    .map(|lit| Literal {
                        event_id: events[lit.var() as usize - 1].orig_id().to_string(),
                        complement: lit.is_negated(),
                    })
                    .collect(),
                probability: None,
            })
            .collect();

        let result = FtaResult {
            top_id: top.orig_id().to_string(),
            primary_count: scope.basic.len() + scope.house.len(),
            gate_count: scope.gates.len(),
            limit_order: self.settings.get_limit_order(),
            max_order,
            mcs,
            preprocess_time,
            mcs_time,
            warnings,
        };
        Ok((result, McsCollection { sets, events }))
    }
}

/// Probability analysis over an indexed cut set collection.
pub struct ProbabilityAnalysis {
    settings: Settings,
}

impl ProbabilityAnalysis {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn analyze(&self, collection: &McsCollection) -> ProbResult {
        let probs = collection.probabilities();
        let cut_off = self.settings.get_cut_off();
        let retained: Vec<CutSet> = collection
            .sets
            .iter()
            .filter(|set| prob_and(set, &probs) > cut_off)
            .cloned()
            .collect();
        if retained.len() < collection.sets.len() {
            debug!(
                "cut-off {} dropped {} cut sets",
                cut_off,
                collection.sets.len() - retained.len()
            );
        }

        let approximation = self.settings.get_approximation();
        let num_sums = self.settings.get_num_sums();
        let p_total = top_probability(&retained, &probs, approximation, num_sums);

        let mut warnings = Vec::new();
        if p_total > 1.0 {
            warn!("total probability {} exceeds 1", p_total);
            warnings.push(format!(
                "the {:?} approximation produced probability {} above 1",
                approximation, p_total
            ));
        }

        let importance = if self.settings.is_importance_analysis() {
            self.importance(collection, &retained, &probs, p_total)
        } else {
            Vec::new()
        };

        ProbResult {
            approximation,
            num_sums,
            cut_off,
            num_prob_mcs: retained.len(),
            p_total,
            importance,
            warnings,
        }
    }

    /// Fussell-Vesely importance: the probability mass of cut sets holding
    /// the positive literal of each event, under the same approximation.
    fn importance(
        &self,
        collection: &McsCollection,
        retained: &[CutSet],
        probs: &[f64],
        p_total: f64,
    ) -> Vec<ImportanceRecord> {
        let mut records = Vec::new();
        for (i, event) in collection.events.iter().enumerate() {
            let lit = crate::node::Lit::pos(i as i32 + 1);
            let with_event: Vec<CutSet> = retained
                .iter()
                .filter(|set| set.contains(lit))
                .cloned()
                .collect();
            // An event outside every retained cut set still gets a row, so
            // consumers can tell a zero contribution from a missing one.
            if with_event.is_empty() {
                records.push(ImportanceRecord {
                    event_id: event.orig_id().to_string(),
                    contribution: 0.0,
                    relative: 0.0,
                });
                continue;
            }
            let contribution = top_probability(
                &with_event,
                probs,
                self.settings.get_approximation(),
                self.settings.get_num_sums(),
            );
            let relative = if p_total > 0.0 {
                contribution / p_total
            } else {
                0.0
            };
            records.push(ImportanceRecord {
                event_id: event.orig_id().to_string(),
                contribution,
                relative,
            });
        }
        records
    }
}

/// The analysis facade: runs the stages selected by the settings.
pub struct RiskAnalysis {
    settings: Settings,
    pub fta: Option<FtaResult>,
    pub prob: Option<ProbResult>,
    pub uncertainty: Option<UncertaintyResult>,
}

impl RiskAnalysis {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            fta: None,
            prob: None,
            uncertainty: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analyzes the model: cut sets always, probability, importance, and
    /// uncertainty per the settings toggles.
    pub fn analyze(&mut self, model: &FaultTree) -> Result<()> {
        let (mut fta, collection) =
            FaultTreeAnalysis::new(self.settings.clone()).analyze(model)?;

        if self.settings.is_probability_analysis() {
            let prob = ProbabilityAnalysis::new(self.settings.clone()).analyze(&collection);
            let probs = collection.probabilities();
            for (record, set) in fta.mcs.iter_mut().zip(&collection.sets) {
                record.probability = Some(prob_and(set, &probs));
            }
            self.prob = Some(prob);
        }

        if self.settings.is_uncertainty_analysis() {
            let uncertainty = UncertaintyAnalysis::new(&self.settings)
                .analyze(&collection.sets, &collection.events);
            self.uncertainty = Some(uncertainty);
        }

        self.fta = Some(fta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccf::CcfGroup;
    use crate::node::GateType;
    use crate::settings::Approximation;

    fn or_of(events: &[(&str, f64)]) -> FaultTree {
        let mut ft = FaultTree::new("test");
        for (id, p) in events {
            ft.add_basic_event(BasicEvent::new(id, *p).unwrap()).unwrap();
        }
        let args = events.iter().map(|(id, _)| FormulaArg::basic(id)).collect();
        ft.add_gate(Gate::new("top", Formula::new(GateType::Or, args).unwrap()))
            .unwrap();
        ft.set_top_event("top").unwrap();
        ft
    }

    #[test]
    fn test_fta_result_counters() {
        let ft = or_of(&[("a", 0.1), ("b", 0.2)]);
        let (result, collection) = FaultTreeAnalysis::new(Settings::default())
            .analyze(&ft)
            .unwrap();
        assert_eq!(result.top_id, "top");
        assert_eq!(result.primary_count, 2);
        assert_eq!(result.gate_count, 1);
        assert_eq!(result.max_order, 1);
        assert_eq!(result.mcs.len(), 2);
        assert_eq!(result.distribution(), vec![2]);
        assert_eq!(collection.sets.len(), 2);
        assert_eq!(collection.events.len(), 2);
    }

    #[test]
    fn test_missing_top_event() {
        let ft = FaultTree::new("empty");
        let result = FaultTreeAnalysis::new(Settings::default()).analyze(&ft);
        assert!(result.is_err());
    }

    #[test]
    fn test_orphan_events_warned() {
        let mut ft = or_of(&[("a", 0.1), ("b", 0.2)]);
        ft.add_basic_event(BasicEvent::new("unused", 0.3).unwrap())
            .unwrap();
        let (result, _) = FaultTreeAnalysis::new(Settings::default())
            .analyze(&ft)
            .unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("unused")));
    }

    #[test]
    fn test_probability_and_importance() {
        let ft = or_of(&[("a", 0.1), ("b", 0.1)]);
        let settings = Settings::default()
            .importance_analysis(true)
            .num_sums(2)
            .unwrap()
            .cut_off(0.0)
            .unwrap();
        let mut analysis = RiskAnalysis::new(settings);
        analysis.analyze(&ft).unwrap();

        let prob = analysis.prob.as_ref().unwrap();
        assert!((prob.p_total - 0.19).abs() < 1e-12);
        assert_eq!(prob.num_prob_mcs, 2);
        assert_eq!(prob.importance.len(), 2);
        for record in &prob.importance {
            assert!((record.contribution - 0.1).abs() < 1e-12);
            assert!((record.relative - 0.1 / 0.19).abs() < 1e-12);
        }

        // Per-MCS probabilities are attached for the reporter.
        let fta = analysis.fta.as_ref().unwrap();
        for set in &fta.mcs {
            assert!((set.probability.unwrap() - 0.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cut_off_filter_counts() {
        let ft = or_of(&[("a", 0.1), ("b", 1e-9)]);
        let settings = Settings::default().probability_analysis(true);
        let mut analysis = RiskAnalysis::new(settings);
        analysis.analyze(&ft).unwrap();
        // The default cut-off 1e-8 drops the tiny cut set from aggregation,
        // but the MCS listing still has both.
        assert_eq!(analysis.prob.as_ref().unwrap().num_prob_mcs, 1);
        assert_eq!(analysis.fta.as_ref().unwrap().mcs.len(), 2);
    }

    #[test]
    fn test_rare_event_warning_above_one() {
        let ft = or_of(&[("a", 0.9), ("b", 0.9)]);
        let settings = Settings::default()
            .probability_analysis(true)
            .approximation(Approximation::RareEvent);
        let mut analysis = RiskAnalysis::new(settings);
        analysis.analyze(&ft).unwrap();
        let prob = analysis.prob.as_ref().unwrap();
        assert!(prob.p_total > 1.0);
        assert!(prob.warnings.iter().any(|w| w.contains("RareEvent")));
    }

    #[test]
    fn test_warning_above_one_names_configured_approximation() {
        // A one-level truncation of the series is the plain sum, which also
        // overshoots 1; the warning must blame the configured
        // approximation, not rare-event.
        let ft = or_of(&[("a", 0.9), ("b", 0.9)]);
        let settings = Settings::default()
            .probability_analysis(true)
            .num_sums(1)
            .unwrap();
        let mut analysis = RiskAnalysis::new(settings);
        analysis.analyze(&ft).unwrap();
        let prob = analysis.prob.as_ref().unwrap();
        assert!(prob.p_total > 1.0);
        assert!(prob.warnings.iter().any(|w| w.contains("Default")));
        assert!(!prob.warnings.iter().any(|w| w.contains("RareEvent")));
    }

    #[test]
    fn test_importance_records_zero_for_filtered_events() {
        // "b" survives into the MCS listing but its cut set falls under the
        // cut-off, so its importance row reports a zero contribution
        // instead of disappearing from the table.
        let ft = or_of(&[("a", 0.1), ("b", 1e-9)]);
        let settings = Settings::default().importance_analysis(true);
        let mut analysis = RiskAnalysis::new(settings);
        analysis.analyze(&ft).unwrap();
        let prob = analysis.prob.as_ref().unwrap();
        assert_eq!(prob.num_prob_mcs, 1);
        assert_eq!(prob.importance.len(), 2);

        let a = &prob.importance[0];
        assert_eq!(a.event_id, "a");
        assert!((a.contribution - 0.1).abs() < 1e-12);
        assert!((a.relative - 1.0).abs() < 1e-12);

        let b = &prob.importance[1];
        assert_eq!(b.event_id, "b");
        assert_eq!(b.contribution, 0.0);
        assert_eq!(b.relative, 0.0);
    }

    #[test]
    fn test_ccf_expansion_reaches_mcs() {
        let mut ft = FaultTree::new("ccf");
        ft.add_basic_event(BasicEvent::new("pump-a", 0.01).unwrap()).unwrap();
        ft.add_basic_event(BasicEvent::new("pump-b", 0.01).unwrap()).unwrap();
        ft.add_gate(Gate::new(
            "top",
            Formula::new(
                GateType::And,
                vec![FormulaArg::basic("pump-a"), FormulaArg::basic("pump-b")],
            )
            .unwrap(),
        ))
        .unwrap();
        ft.set_top_event("top").unwrap();
        let mut group = CcfGroup::new("pumps", 0.1).unwrap();
        group.add_member("pump-a");
        group.add_member("pump-b");
        ft.add_ccf_group(group).unwrap();

        let settings = Settings::default().ccf_analysis(true);
        let (result, collection) = FaultTreeAnalysis::new(settings).analyze(&ft).unwrap();

        // The common-cause event alone fails both pumps: a cut set of
        // order 1 must exist alongside the independent pair.
        assert_eq!(result.max_order, 2);
        assert!(result
            .mcs
            .iter()
            .any(|set| set.literals.len() == 1 && set.literals[0].event_id.contains(' ')));
        assert_eq!(collection.events.len(), 3);

        // Without the toggle the tree is analyzed as modeled.
        let (plain, _) = FaultTreeAnalysis::new(Settings::default()).analyze(&ft).unwrap();
        assert_eq!(plain.mcs.len(), 1);
        assert_eq!(plain.max_order, 2);
    }
}
