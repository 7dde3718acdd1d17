//! # fta-rs: fault tree analysis in Rust
//!
//! **`fta-rs`** is a probabilistic risk-analysis engine. Given a fault tree
//! --- a Boolean formula over basic failure events with AND/OR/XOR/NOT/
//! NAND/NOR/ATLEAST gates --- it computes:
//!
//! - the **minimal cut sets** (MCS): inclusion-minimal conjunctions of
//!   event literals that fail the top event;
//! - the **top-event probability** from per-event probabilities, under the
//!   rare-event or Min-Cut-Upper-Bound approximation or a truncated
//!   inclusion-exclusion series;
//! - per-event **Fussell-Vesely importance**;
//! - an **uncertainty distribution** of the top probability via Monte-Carlo
//!   sampling of event-probability distributions.
//!
//! ## How it works
//!
//! The pipeline is strictly sequential. The domain model
//! ([`model`]) is indexed into a graph of integer-indexed nodes with signed
//! edges ([`tree`]); the preprocessor ([`preprocess`]) rewrites the graph
//! into a normalized AND/OR form with complements pushed onto event
//! literals and independent modules marked; cut sets are generated
//! bottom-up ([`mcs`]); the probability and uncertainty engines ([`prob`],
//! [`uncertainty`]) operate on the cut sets alone. [`analysis`] ties the
//! stages together behind [`RiskAnalysis`][crate::analysis::RiskAnalysis].
//!
//! ## Quick Start
//!
//! ```rust
//! use fta_rs::analysis::RiskAnalysis;
//! use fta_rs::model::{BasicEvent, FaultTree, Formula, FormulaArg, Gate};
//! use fta_rs::node::GateType;
//! use fta_rs::settings::Settings;
//!
//! // 1. Describe the system: TOP = AND(pump-a, pump-b).
//! let mut ft = FaultTree::new("two-pumps");
//! ft.add_basic_event(BasicEvent::new("pump-a", 0.1).unwrap()).unwrap();
//! ft.add_basic_event(BasicEvent::new("pump-b", 0.2).unwrap()).unwrap();
//! let formula = Formula::new(
//!     GateType::And,
//!     vec![FormulaArg::basic("pump-a"), FormulaArg::basic("pump-b")],
//! )
//! .unwrap();
//! ft.add_gate(Gate::new("TOP", formula)).unwrap();
//! ft.set_top_event("TOP").unwrap();
//!
//! // 2. Configure and run.
//! let settings = Settings::default().probability_analysis(true);
//! let mut analysis = RiskAnalysis::new(settings);
//! analysis.analyze(&ft).unwrap();
//!
//! // 3. Inspect the results.
//! let fta = analysis.fta.as_ref().unwrap();
//! assert_eq!(fta.mcs.len(), 1); // one minimal cut set: {pump-a, pump-b}
//! let prob = analysis.prob.as_ref().unwrap();
//! assert!((prob.p_total - 0.02).abs() < 1e-12);
//! ```
//!
//! ## Determinism
//!
//! Every reported collection follows the canonical cut-set order (size,
//! then lexicographic over literals), and the Monte-Carlo loop draws from a
//! single seeded stream, so results are bit-stable for a fixed model,
//! settings, and seed.

pub mod analysis;
pub mod ccf;
pub mod error;
pub mod mcs;
pub mod model;
pub mod node;
pub mod preprocess;
pub mod prob;
pub mod random;
pub mod result;
pub mod settings;
pub mod tree;
pub mod uncertainty;
