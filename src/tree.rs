//! The indexed fault tree: an arena of integer-indexed nodes with signed
//! edges.
//!
//! All nodes live in one `index -> Node` table owned by the tree; edges and
//! parent back-links are bare indices, so traversal is iterative and there
//! are no ownership cycles. Structural edits go through the tree so that
//! child edges and parent links stay consistent.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{Error, Result};
use crate::model::{normalize_id, FaultTree, Formula, FormulaArg, Gate};
use crate::node::{BasicNode, Constant, GateType, IGate, Lit, Node, GATE_INDEX};

#[derive(Debug)]
pub struct IndexedFaultTree {
    top_index: i32,
    nodes: HashMap<i32, Node>,
    new_gate_index: i32,
    new_constant_index: i32,
}

// Accessors
impl IndexedFaultTree {
    pub fn top_index(&self) -> i32 {
        self.top_index
    }

    pub fn set_top_index(&mut self, index: i32) {
        assert!(self.nodes.contains_key(&index), "unknown top index");
        self.top_index = index;
    }

    /// The top gate.
    pub fn top(&self) -> &IGate {
        self.gate(self.top_index)
    }

    pub fn is_gate_index(&self, index: i32) -> bool {
        assert!(index > 0);
        index >= GATE_INDEX
    }

    pub fn contains(&self, index: i32) -> bool {
        self.nodes.contains_key(&index)
    }

    pub fn node(&self, index: i32) -> &Node {
        self.nodes.get(&index).expect("unknown node index")
    }

    pub fn node_mut(&mut self, index: i32) -> &mut Node {
        self.nodes.get_mut(&index).expect("unknown node index")
    }

    pub fn gate(&self, index: i32) -> &IGate {
        self.node(index).as_gate().expect("index is not a gate")
    }

    pub fn gate_mut(&mut self, index: i32) -> &mut IGate {
        self.node_mut(index).as_gate_mut().expect("index is not a gate")
    }

    /// All gate indices in ascending order.
    pub fn gate_indices(&self) -> Vec<i32> {
        let mut indices: Vec<i32> = self
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node, Node::Gate(_)))
            .map(|(&index, _)| index)
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn num_gates(&self) -> usize {
        self.nodes
            .values()
            .filter(|node| matches!(node, Node::Gate(_)))
            .count()
    }
}

// Construction and structural edits
impl IndexedFaultTree {
    pub fn new() -> Self {
        Self {
            top_index: 0,
            nodes: HashMap::new(),
            new_gate_index: GATE_INDEX - 1,
            new_constant_index: GATE_INDEX / 2,
        }
    }

    /// Creates a gate with a fresh sequential index and adds it to the
    /// arena.
    pub fn create_gate(&mut self, kind: GateType) -> i32 {
        self.new_gate_index += 1;
        let index = self.new_gate_index;
        self.nodes.insert(index, Node::Gate(IGate::new(index, kind)));
        index
    }

    /// Creates a constant node with a fresh index below the gate range.
    pub fn create_constant(&mut self, state: bool) -> i32 {
        self.new_constant_index += 1;
        let index = self.new_constant_index;
        assert!(index < GATE_INDEX, "constant index range overflow");
        self.nodes.insert(index, Node::Constant(Constant::new(index, state)));
        index
    }

    /// Registers a basic event node if it is not in the arena yet.
    pub fn ensure_basic(&mut self, index: i32) {
        assert!(index < GATE_INDEX / 2, "basic event index range overflow");
        self.nodes
            .entry(index)
            .or_insert_with(|| Node::Basic(BasicNode::new(index)));
    }

    /// Adds a child edge to a gate and links the parent back-reference.
    ///
    /// If the new child is the complement of an existing one, the gate
    /// resolves to Null or Unity; all its former children are unlinked and
    /// false is returned so the caller can re-examine the gate's parents.
    pub fn add_child(&mut self, gate_index: i32, child: Lit) -> bool {
        let prior: Vec<Lit> = self.gate(gate_index).children().iter().copied().collect();
        let ok = self.gate_mut(gate_index).add_child(child);
        if ok {
            self.node_mut(child.var()).base_mut().add_parent(gate_index);
        } else {
            debug!("complement clash on {} in gate {}", child, gate_index);
            for c in prior {
                self.node_mut(c.var()).base_mut().erase_parent(gate_index);
            }
        }
        ok
    }

    /// Removes a child edge and, when no other edge of the gate references
    /// the same node, the parent back-link.
    pub fn erase_child(&mut self, gate_index: i32, child: Lit) {
        self.gate_mut(gate_index).erase_child(child);
        if !self.gate(gate_index).has_child(-child) {
            self.node_mut(child.var()).base_mut().erase_parent(gate_index);
        }
    }

    /// Replaces `existing` with `new` in the gate's child set.
    pub fn swap_child(&mut self, gate_index: i32, existing: Lit, new: Lit) -> bool {
        self.erase_child(gate_index, existing);
        self.add_child(gate_index, new)
    }

    /// Resolves the gate to constant false, unlinking its children.
    pub fn nullify(&mut self, gate_index: i32) {
        self.unlink_children(gate_index);
        self.gate_mut(gate_index).nullify();
    }

    /// Resolves the gate to constant true, unlinking its children.
    pub fn make_unity(&mut self, gate_index: i32) {
        self.unlink_children(gate_index);
        self.gate_mut(gate_index).make_unity();
    }

    fn unlink_children(&mut self, gate_index: i32) {
        let children: Vec<Lit> = self.gate(gate_index).children().iter().copied().collect();
        for child in children {
            self.node_mut(child.var()).base_mut().erase_parent(gate_index);
        }
    }

    /// Flips the sign of every parent edge referencing the given gate.
    /// Helper for rewriting NAND/NOR into AND/OR with a complemented output.
    pub fn invert_gate_references(&mut self, target: i32) {
        let parents: Vec<i32> = self.node(target).base().parents().iter().copied().collect();
        for parent in parents {
            let has_pos = self.gate(parent).has_child(Lit::pos(target));
            let has_neg = self.gate(parent).has_child(Lit::neg(target));
            if has_pos == has_neg {
                continue; // both or neither present, flipping is a no-op
            }
            let (from, to) = if has_pos {
                (Lit::pos(target), Lit::neg(target))
            } else {
                (Lit::neg(target), Lit::pos(target))
            };
            let gate = self.gate_mut(parent);
            gate.erase_child(from);
            gate.add_child(to);
        }
    }

    /// Gate indices reachable from the top gate, in depth-first preorder.
    /// The order is deterministic because child sets iterate canonically.
    pub fn reachable_gates(&self) -> Vec<i32> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![self.top_index];
        while let Some(index) = stack.pop() {
            if !visited.insert(index) {
                continue;
            }
            if let Some(gate) = self.node(index).as_gate() {
                order.push(index);
                // Reverse so the stack pops children in canonical order.
                for child in gate.children().iter().rev() {
                    if child.is_gate() {
                        stack.push(child.var());
                    }
                }
            }
        }
        order
    }

    /// Resets the visit triple of every node.
    pub fn clear_visits(&mut self) {
        for node in self.nodes.values_mut() {
            node.base_mut().visits_mut().clear();
        }
    }

    /// Drops nodes not reachable from the top gate and rebuilds the parent
    /// relation from the surviving edges.
    pub fn prune_unreachable(&mut self) {
        let mut reachable = HashSet::new();
        let mut stack = vec![self.top_index];
        while let Some(index) = stack.pop() {
            if !reachable.insert(index) {
                continue;
            }
            if let Some(gate) = self.node(index).as_gate() {
                for child in gate.children() {
                    stack.push(child.var());
                }
            }
        }
        self.nodes.retain(|index, _| reachable.contains(index));

        for node in self.nodes.values_mut() {
            node.base_mut().parents_clear();
        }
        let indices = self.gate_indices();
        for gate_index in indices {
            let children: Vec<Lit> = self.gate(gate_index).children().iter().copied().collect();
            for child in children {
                self.node_mut(child.var()).base_mut().add_parent(gate_index);
            }
        }
    }
}

impl Default for IndexedFaultTree {
    fn default() -> Self {
        Self::new()
    }
}

/// State of the recursive descent from the domain model.
struct Builder<'a> {
    tree: IndexedFaultTree,
    model: &'a FaultTree,
    event_index: &'a HashMap<String, i32>,
    substitutions: &'a HashMap<String, Formula>,
    gate_of: HashMap<String, i32>,
    in_progress: HashSet<String>,
    substitution_gates: HashMap<String, i32>,
    constants: HashMap<String, i32>,
}

impl IndexedFaultTree {
    /// Builds the indexed graph from the domain model.
    ///
    /// `event_index` maps every basic event id (including CCF-expanded
    /// events) to its index; `substitutions` maps member event ids of CCF
    /// groups to their replacement formulas. House events fold into constant
    /// nodes immediately.
    pub fn index(
        model: &FaultTree,
        top: &Gate,
        event_index: &HashMap<String, i32>,
        substitutions: &HashMap<String, Formula>,
    ) -> Result<Self> {
        debug_assert!(event_index.values().all(|&i| i > 0 && i < GATE_INDEX / 2));
        let mut builder = Builder {
            tree: IndexedFaultTree::new(),
            model,
            event_index,
            substitutions,
            gate_of: HashMap::new(),
            in_progress: HashSet::new(),
            substitution_gates: HashMap::new(),
            constants: HashMap::new(),
        };
        let top_index = builder.process_gate(top)?;
        builder.tree.top_index = top_index;
        Ok(builder.tree)
    }
}

impl Builder<'_> {
    fn process_gate(&mut self, gate: &Gate) -> Result<i32> {
        if let Some(&index) = self.gate_of.get(gate.id()) {
            return Ok(index);
        }
        if !self.in_progress.insert(gate.id().to_string()) {
            return Err(Error::CyclicTree(gate.orig_id().to_string()));
        }
        let index = self.allocate(gate.formula())?;
        self.in_progress.remove(gate.id());
        self.gate_of.insert(gate.id().to_string(), index);
        Ok(index)
    }

    /// Allocates an indexed gate mirroring the formula and attaches its
    /// children.
    fn allocate(&mut self, formula: &Formula) -> Result<i32> {
        let index = self.tree.create_gate(formula.kind());
        if let Some(vote) = formula.vote_number() {
            self.tree.gate_mut(index).set_vote_number(vote);
        }
        for arg in formula.args() {
            let child = self.resolve(arg)?;
            self.tree.add_child(index, child);
        }
        Ok(index)
    }

    fn resolve(&mut self, arg: &FormulaArg) -> Result<Lit> {
        match arg {
            FormulaArg::Basic(name) => {
                let id = normalize_id(name);
                if self.substitutions.contains_key(&id) {
                    let index = self.substitution_gate(&id)?;
                    return Ok(Lit::pos(index));
                }
                let &index = self
                    .event_index
                    .get(&id)
                    .ok_or_else(|| Error::UnknownRef(name.clone()))?;
                self.tree.ensure_basic(index);
                Ok(Lit::pos(index))
            }
            FormulaArg::House(name) => {
                let id = normalize_id(name);
                if let Some(&index) = self.constants.get(&id) {
                    return Ok(Lit::pos(index));
                }
                let event = self
                    .model
                    .house_event(&id)
                    .ok_or_else(|| Error::UnknownRef(name.clone()))?;
                let index = self.tree.create_constant(event.state());
                self.constants.insert(id, index);
                Ok(Lit::pos(index))
            }
            FormulaArg::Gate(name) => {
                let gate = self
                    .model
                    .gate(name)
                    .ok_or_else(|| Error::UnknownRef(name.clone()))?
                    .clone();
                let index = self.process_gate(&gate)?;
                Ok(Lit::pos(index))
            }
            FormulaArg::Formula(sub) => {
                // NOT over a plain basic event folds into a negative edge
                // instead of a synthetic gate.
                if sub.kind() == GateType::Not {
                    if let [FormulaArg::Basic(name)] = sub.args() {
                        let id = normalize_id(name);
                        if !self.substitutions.contains_key(&id) {
                            let &index = self
                                .event_index
                                .get(&id)
                                .ok_or_else(|| Error::UnknownRef(name.clone()))?;
                            self.tree.ensure_basic(index);
                            return Ok(Lit::neg(index));
                        }
                    }
                }
                let index = self.allocate(sub)?;
                Ok(Lit::pos(index))
            }
        }
    }

    /// A memoized synthetic gate for a CCF-substituted event.
    fn substitution_gate(&mut self, id: &str) -> Result<i32> {
        if let Some(&index) = self.substitution_gates.get(id) {
            return Ok(index);
        }
        let formula = self.substitutions.get(id).expect("caller checked").clone();
        let index = self.allocate(&formula)?;
        self.substitution_gates.insert(id.to_string(), index);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BasicEvent, HouseEvent};
    use crate::node::GateState;

    fn event_index(ids: &[&str]) -> HashMap<String, i32> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), i as i32 + 1))
            .collect()
    }

    fn simple_model() -> FaultTree {
        let mut ft = FaultTree::new("test");
        ft.add_basic_event(BasicEvent::new("a", 0.1).unwrap()).unwrap();
        ft.add_basic_event(BasicEvent::new("b", 0.2).unwrap()).unwrap();
        let formula = Formula::new(
            GateType::And,
            vec![FormulaArg::basic("a"), FormulaArg::basic("b")],
        )
        .unwrap();
        ft.add_gate(Gate::new("top", formula)).unwrap();
        ft.set_top_event("top").unwrap();
        ft
    }

    #[test]
    fn test_index_simple_and() {
        let ft = simple_model();
        let index = event_index(&["a", "b"]);
        let tree =
            IndexedFaultTree::index(&ft, ft.top_event().unwrap(), &index, &HashMap::new()).unwrap();

        let top = tree.top();
        assert_eq!(top.kind(), GateType::And);
        assert_eq!(top.children().len(), 2);
        assert!(top.has_child(Lit::pos(1)));
        assert!(top.has_child(Lit::pos(2)));
        // Parent back-links are in place.
        assert!(tree.node(1).base().parents().contains(&tree.top_index()));
    }

    #[test]
    fn test_nested_formula_becomes_gate() {
        let mut ft = FaultTree::new("test");
        ft.add_basic_event(BasicEvent::new("a", 0.1).unwrap()).unwrap();
        ft.add_basic_event(BasicEvent::new("b", 0.1).unwrap()).unwrap();
        ft.add_basic_event(BasicEvent::new("c", 0.1).unwrap()).unwrap();
        let inner = Formula::new(
            GateType::Or,
            vec![FormulaArg::basic("b"), FormulaArg::basic("c")],
        )
        .unwrap();
        let outer = Formula::new(
            GateType::And,
            vec![FormulaArg::basic("a"), FormulaArg::formula(inner)],
        )
        .unwrap();
        ft.add_gate(Gate::new("top", outer)).unwrap();
        ft.set_top_event("top").unwrap();

        let index = event_index(&["a", "b", "c"]);
        let tree =
            IndexedFaultTree::index(&ft, ft.top_event().unwrap(), &index, &HashMap::new()).unwrap();
        assert_eq!(tree.num_gates(), 2);
    }

    #[test]
    fn test_not_of_basic_folds_to_negative_edge() {
        let mut ft = FaultTree::new("test");
        ft.add_basic_event(BasicEvent::new("a", 0.1).unwrap()).unwrap();
        ft.add_basic_event(BasicEvent::new("b", 0.1).unwrap()).unwrap();
        let not_b = Formula::new(GateType::Not, vec![FormulaArg::basic("b")]).unwrap();
        let formula = Formula::new(
            GateType::And,
            vec![FormulaArg::basic("a"), FormulaArg::formula(not_b)],
        )
        .unwrap();
        ft.add_gate(Gate::new("top", formula)).unwrap();
        ft.set_top_event("top").unwrap();

        let index = event_index(&["a", "b"]);
        let tree =
            IndexedFaultTree::index(&ft, ft.top_event().unwrap(), &index, &HashMap::new()).unwrap();
        assert_eq!(tree.num_gates(), 1);
        assert!(tree.top().has_child(Lit::neg(2)));
    }

    #[test]
    fn test_house_event_folds_to_constant() {
        let mut ft = FaultTree::new("test");
        ft.add_basic_event(BasicEvent::new("a", 0.1).unwrap()).unwrap();
        ft.add_house_event(HouseEvent::new("maintenance", true)).unwrap();
        let formula = Formula::new(
            GateType::And,
            vec![FormulaArg::basic("a"), FormulaArg::house("maintenance")],
        )
        .unwrap();
        ft.add_gate(Gate::new("top", formula)).unwrap();
        ft.set_top_event("top").unwrap();

        let index = event_index(&["a"]);
        let tree =
            IndexedFaultTree::index(&ft, ft.top_event().unwrap(), &index, &HashMap::new()).unwrap();
        let constant_child = tree
            .top()
            .children()
            .iter()
            .find(|c| c.var() != 1)
            .copied()
            .unwrap();
        assert!(tree.node(constant_child.var()).as_constant().unwrap().state());
    }

    #[test]
    fn test_cycle_detection() {
        let mut ft = FaultTree::new("test");
        ft.add_basic_event(BasicEvent::new("a", 0.1).unwrap()).unwrap();
        let f1 = Formula::new(
            GateType::Or,
            vec![FormulaArg::basic("a"), FormulaArg::gate("g2")],
        )
        .unwrap();
        let f2 = Formula::new(
            GateType::Or,
            vec![FormulaArg::basic("a"), FormulaArg::gate("top")],
        )
        .unwrap();
        ft.add_gate(Gate::new("top", f1)).unwrap();
        ft.add_gate(Gate::new("g2", f2)).unwrap();
        ft.set_top_event("top").unwrap();

        let index = event_index(&["a"]);
        let result = IndexedFaultTree::index(&ft, ft.top_event().unwrap(), &index, &HashMap::new());
        assert!(matches!(result, Err(Error::CyclicTree(_))));
    }

    #[test]
    fn test_unknown_reference() {
        let ft = simple_model();
        let index = event_index(&["a"]); // "b" is missing
        let result = IndexedFaultTree::index(&ft, ft.top_event().unwrap(), &index, &HashMap::new());
        assert!(matches!(result, Err(Error::UnknownRef(_))));
    }

    #[test]
    fn test_complement_clash_resolves_gate() {
        let mut tree = IndexedFaultTree::new();
        tree.ensure_basic(1);
        let g = tree.create_gate(GateType::And);
        assert!(tree.add_child(g, Lit::pos(1)));
        assert!(!tree.add_child(g, Lit::neg(1)));
        assert_eq!(tree.gate(g).state(), GateState::Null);
        assert!(tree.node(1).base().parents().is_empty());
    }

    #[test]
    fn test_shared_gate_has_two_parents() {
        let mut tree = IndexedFaultTree::new();
        tree.ensure_basic(1);
        let shared = tree.create_gate(GateType::Or);
        tree.add_child(shared, Lit::pos(1));
        let p1 = tree.create_gate(GateType::And);
        let p2 = tree.create_gate(GateType::And);
        tree.add_child(p1, Lit::pos(shared));
        tree.add_child(p2, Lit::pos(shared));
        assert_eq!(tree.node(shared).base().parents().len(), 2);
        tree.erase_child(p1, Lit::pos(shared));
        assert_eq!(tree.node(shared).base().parents().len(), 1);
    }
}
