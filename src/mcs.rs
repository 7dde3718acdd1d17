//! Minimal cut set generation from the preprocessed graph.
//!
//! Every gate maps, bottom-up, to a set of cut sets: OR gates union their
//! children's sets, AND gates form the cartesian product with clash
//! filtering, and an order limit caps candidate growth. Module gates are
//! expanded once, independently, and spliced wherever they appear. The final
//! collection is an antichain: no set is a superset of another.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use log::debug;

use crate::node::{GateState, GateType, Lit};
use crate::tree::IndexedFaultTree;

/// A conjunction of basic-event literals in canonical order: ascending by
/// event index, positive before negative. The empty set is the unity set
/// (always true).
///
/// Cut sets order by size first, then lexicographically, which is the
/// canonical order of every reported collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CutSet(Vec<Lit>);

impl CutSet {
    /// The unity set: an empty conjunction, always true.
    pub fn unity() -> Self {
        Self(Vec::new())
    }

    pub fn singleton(lit: Lit) -> Self {
        Self(vec![lit])
    }

    /// Builds a cut set from arbitrary literals. Returns None when a literal
    /// and its complement are both present.
    pub fn from_lits(lits: impl IntoIterator<Item = Lit>) -> Option<Self> {
        let mut lits: Vec<Lit> = lits.into_iter().collect();
        lits.sort();
        lits.dedup();
        for pair in lits.windows(2) {
            if pair[0].var() == pair[1].var() {
                return None;
            }
        }
        Some(Self(lits))
    }

    /// The number of literals.
    pub fn order(&self) -> usize {
        self.0.len()
    }

    pub fn is_unity(&self) -> bool {
        self.0.is_empty()
    }

    pub fn literals(&self) -> &[Lit] {
        &self.0
    }

    pub fn contains(&self, lit: Lit) -> bool {
        self.0.binary_search(&lit).is_ok()
    }

    /// True if every literal of `self` appears in `other`.
    pub fn is_subset_of(&self, other: &CutSet) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        let mut it = other.0.iter();
        'outer: for lit in &self.0 {
            for candidate in it.by_ref() {
                if candidate == lit {
                    continue 'outer;
                }
                if candidate > lit {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// The union of two conjunctions, or None when they contain a literal
    /// and its complement.
    pub fn merge(&self, other: &CutSet) -> Option<CutSet> {
        let mut merged = Vec::with_capacity(self.0.len() + other.0.len());
        let mut a = self.0.iter().peekable();
        let mut b = other.0.iter().peekable();
        loop {
            match (a.peek(), b.peek()) {
                (Some(&&x), Some(&&y)) => {
                    if x.var() == y.var() && x.is_negated() != y.is_negated() {
                        return None;
                    }
                    if x == y {
                        merged.push(x);
                        a.next();
                        b.next();
                    } else if x < y {
                        merged.push(x);
                        a.next();
                    } else {
                        merged.push(y);
                        b.next();
                    }
                }
                (Some(&&x), None) => {
                    merged.push(x);
                    a.next();
                }
                (None, Some(&&y)) => {
                    merged.push(y);
                    b.next();
                }
                (None, None) => break,
            }
        }
        Some(CutSet(merged))
    }
}

impl Ord for CutSet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.len(), &self.0).cmp(&(other.0.len(), &other.0))
    }
}

impl PartialOrd for CutSet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for CutSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, lit) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", lit)?;
        }
        write!(f, "}}")
    }
}

/// Removes every set that is a strict superset of another in the
/// collection, returning the antichain in canonical order.
pub fn minimize(mut sets: Vec<CutSet>) -> Vec<CutSet> {
    sets.sort();
    sets.dedup();
    let mut minimal: Vec<CutSet> = Vec::with_capacity(sets.len());
    for candidate in sets {
        if minimal.iter().any(|kept| kept.is_subset_of(&candidate)) {
            continue;
        }
        minimal.push(candidate);
    }
    minimal
}

/// Bottom-up minimal cut set generation over a preprocessed tree.
pub struct McsGenerator<'a> {
    tree: &'a IndexedFaultTree,
    limit_order: usize,
    cache: HashMap<i32, Vec<CutSet>>,
}

impl<'a> McsGenerator<'a> {
    pub fn new(tree: &'a IndexedFaultTree, limit_order: usize) -> Self {
        assert!(limit_order >= 1);
        Self {
            tree,
            limit_order,
            cache: HashMap::new(),
        }
    }

    /// Generates the minimal cut sets of the top gate, each of size at most
    /// `limit_order`, in canonical order.
    pub fn generate(&mut self) -> Vec<CutSet> {
        let top = self.tree.top_index();
        match self.tree.gate(top).state() {
            GateState::Null => Vec::new(),
            GateState::Unity => vec![CutSet::unity()],
            GateState::Normal => self.expand(top),
        }
    }

    /// The minimized cut sets of one gate. Shared gates and modules are
    /// computed once and spliced by reference.
    fn expand(&mut self, index: i32) -> Vec<CutSet> {
        if let Some(cached) = self.cache.get(&index) {
            return cached.clone();
        }
        let (kind, children) = {
            let gate = self.tree.gate(index);
            let children: Vec<Lit> = gate.children().iter().copied().collect();
            (gate.kind(), children)
        };
        let sets = match kind {
            GateType::Or => {
                let mut union = Vec::new();
                for child in children {
                    union.extend(self.child_sets(child));
                }
                union
            }
            GateType::And => {
                let mut product = vec![CutSet::unity()];
                for child in children {
                    let child_sets = self.child_sets(child);
                    let mut next = Vec::with_capacity(product.len() * child_sets.len());
                    for left in &product {
                        for right in &child_sets {
                            if let Some(merged) = left.merge(right) {
                                if merged.order() <= self.limit_order {
                                    next.push(merged);
                                }
                            }
                        }
                    }
                    product = minimize(next);
                    if product.is_empty() {
                        break;
                    }
                }
                product
            }
            kind => unreachable!("{:?} gate after preprocessing", kind),
        };
        let sets = minimize(sets);
        debug!("gate {}: {} cut sets", index, sets.len());
        self.cache.insert(index, sets.clone());
        sets
    }

    fn child_sets(&mut self, child: Lit) -> Vec<CutSet> {
        if child.is_gate() {
            assert!(!child.is_negated(), "gate edges are positive after preprocessing");
            self.expand(child.var())
        } else {
            vec![CutSet::singleton(child)]
        }
    }
}

/// Counts cut sets per order, index 0 holding the count of order-1 sets.
pub fn order_distribution(sets: &[CutSet]) -> Vec<usize> {
    let max_order = sets.iter().map(CutSet::order).max().unwrap_or(0);
    let mut distribution = vec![0; max_order];
    for set in sets {
        if set.order() > 0 {
            distribution[set.order() - 1] += 1;
        }
    }
    distribution
}
