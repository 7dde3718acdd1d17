//! Boolean preprocessing of the indexed fault tree.
//!
//! The preprocessor rewrites the graph in place until every reachable gate
//! is a plain AND or OR with positive edges to child gates and signed edges
//! to basic events, then marks independent modules. The passes, applied to
//! fixpoint:
//!
//! 1. constant folding (house events, resolved gate states);
//! 2. normalization: XOR and ATLEAST expansion, NOT/NAND/NOR rewrites;
//! 3. NULL (pass-through) gate elimination;
//! 4. complement propagation by De Morgan's laws;
//! 5. coalescing of same-type child gates;
//! 6. module detection via DFS timestamps.
//!
//! Downstream analysis treats the result as read-only.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use crate::node::{GateState, GateType, Lit};
use crate::tree::IndexedFaultTree;

pub struct Preprocessor<'a> {
    tree: &'a mut IndexedFaultTree,
    /// Memoized complement gates, mapped in both directions so shared
    /// subgraphs are complemented once.
    complements: HashMap<i32, i32>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(tree: &'a mut IndexedFaultTree) -> Self {
        Self {
            tree,
            complements: HashMap::new(),
        }
    }

    /// Runs the full pipeline.
    pub fn run(mut self) {
        self.propagate_constants();
        if self.top_resolved() {
            return;
        }
        self.normalize();
        self.eliminate_nulls();
        self.propagate_complements();
        // Rebuild the parent relation before coalescing: gates replaced by
        // their complements would otherwise count as extra parents.
        self.tree.prune_unreachable();
        loop {
            let changed = self.propagate_constants() | self.eliminate_nulls() | self.coalesce();
            if !changed || self.top_resolved() {
                break;
            }
        }
        if self.top_resolved() {
            return;
        }
        self.tree.prune_unreachable();
        self.detect_modules();
    }

    fn top_resolved(&self) -> bool {
        self.tree.top().state() != GateState::Normal
    }

    // ----- constant folding -------------------------------------------------

    /// Absorbs constant children (house constants and Null/Unity gates) into
    /// their parents, transitively.
    fn propagate_constants(&mut self) -> bool {
        let mut changed = false;
        let mut queue: VecDeque<i32> = self.tree.reachable_gates().into();
        while let Some(index) = queue.pop_front() {
            if self.tree.gate(index).state() != GateState::Normal {
                continue;
            }
            let child = self
                .tree
                .gate(index)
                .children()
                .iter()
                .copied()
                .find(|&c| self.constant_value(c).is_some());
            match child {
                Some(child) => {
                    let value = self.constant_value(child).expect("just found");
                    debug!("gate {}: folding constant child {} = {}", index, child, value);
                    self.absorb_constant(index, child, value, &mut queue);
                    changed = true;
                    // Re-examine this gate for further constants.
                    queue.push_front(index);
                }
                None => changed |= self.fix_arity(index, &mut queue),
            }
        }
        changed
    }

    /// The Boolean value a child edge contributes if it is constant.
    fn constant_value(&self, child: Lit) -> Option<bool> {
        let value = match self.tree.node(child.var()) {
            crate::node::Node::Constant(c) => c.state(),
            crate::node::Node::Gate(g) => match g.state() {
                GateState::Null => false,
                GateState::Unity => true,
                GateState::Normal => return None,
            },
            crate::node::Node::Basic(_) => return None,
        };
        Some(value ^ child.is_negated())
    }

    /// Applies the truth-table absorption rule for one constant child.
    fn absorb_constant(&mut self, index: i32, child: Lit, value: bool, queue: &mut VecDeque<i32>) {
        let kind = self.tree.gate(index).kind();
        match (kind, value) {
            (GateType::And, true) | (GateType::Or, false) => self.tree.erase_child(index, child),
            (GateType::And, false) => self.resolve(index, false, queue),
            (GateType::Or, true) => self.resolve(index, true, queue),
            (GateType::Not, v) | (GateType::Nor, v) if v => self.resolve(index, false, queue),
            (GateType::Not, _) => self.resolve(index, true, queue),
            (GateType::Nor, _) => self.tree.erase_child(index, child),
            (GateType::Null, v) => self.resolve(index, v, queue),
            (GateType::Nand, true) => self.tree.erase_child(index, child),
            (GateType::Nand, false) => self.resolve(index, true, queue),
            (GateType::Xor, v) => {
                self.tree.erase_child(index, child);
                // XOR(true, x) = NOT x; XOR(false, x) = x.
                let gate = self.tree.gate_mut(index);
                gate.set_kind(if v { GateType::Not } else { GateType::Null });
            }
            (GateType::Atleast, true) => {
                self.tree.erase_child(index, child);
                let vote = self.tree.gate(index).vote_number() - 1;
                self.tree.gate_mut(index).set_vote_number(vote);
                if vote == 0 {
                    self.resolve(index, true, queue);
                } else {
                    self.adjust_vote_kind(index);
                }
            }
            (GateType::Atleast, false) => {
                self.tree.erase_child(index, child);
                let gate = self.tree.gate(index);
                if gate.children().len() < gate.vote_number() {
                    self.resolve(index, false, queue);
                } else {
                    self.adjust_vote_kind(index);
                }
            }
        }
    }

    /// Degenerate ATLEAST gates collapse into OR or AND.
    fn adjust_vote_kind(&mut self, index: i32) {
        let gate = self.tree.gate(index);
        if gate.kind() != GateType::Atleast {
            return;
        }
        let vote = gate.vote_number();
        let len = gate.children().len();
        if vote == 1 {
            self.tree.gate_mut(index).set_kind(GateType::Or);
        } else if vote == len {
            self.tree.gate_mut(index).set_kind(GateType::And);
        }
    }

    /// Resolves a gate to a constant state and schedules its parents.
    fn resolve(&mut self, index: i32, value: bool, queue: &mut VecDeque<i32>) {
        debug!("gate {} resolved to {}", index, value);
        if value {
            self.tree.make_unity(index);
        } else {
            self.tree.nullify(index);
        }
        queue.extend(self.tree.node(index).base().parents().iter().copied());
    }

    /// Handles gates whose children were consumed by constant folding.
    fn fix_arity(&mut self, index: i32, queue: &mut VecDeque<i32>) -> bool {
        let gate = self.tree.gate(index);
        let kind = gate.kind();
        match gate.children().len() {
            0 => {
                match kind {
                    // An empty conjunction is true, an empty disjunction false.
                    GateType::And => self.resolve(index, true, queue),
                    GateType::Or => self.resolve(index, false, queue),
                    GateType::Nand => self.resolve(index, false, queue),
                    GateType::Nor => self.resolve(index, true, queue),
                    GateType::Atleast => self.resolve(index, false, queue),
                    kind => unreachable!("empty {:?} gate", kind),
                }
                true
            }
            1 if matches!(kind, GateType::Nand | GateType::Nor) => {
                self.tree.gate_mut(index).set_kind(GateType::Not);
                true
            }
            _ => false,
        }
    }

    // ----- normalization ----------------------------------------------------

    /// Rewrites XOR, ATLEAST, NOT, NAND, and NOR gates in terms of AND/OR
    /// with signed edges. Applied bottom-up from the top gate.
    fn normalize(&mut self) {
        let mut visited = HashSet::new();
        self.normalize_gate(self.tree.top_index(), &mut visited);
    }

    fn normalize_gate(&mut self, index: i32, visited: &mut HashSet<i32>) {
        if !visited.insert(index) {
            return;
        }
        if self.tree.gate(index).state() != GateState::Normal {
            return;
        }
        let children: Vec<Lit> = self.tree.gate(index).children().iter().copied().collect();
        for child in &children {
            if child.is_gate() {
                self.normalize_gate(child.var(), visited);
            }
        }
        match self.tree.gate(index).kind() {
            GateType::And | GateType::Or | GateType::Null => {}
            GateType::Not => {
                // NOT(x) becomes a pass-through over the complement of x.
                let child = *self
                    .tree
                    .gate(index)
                    .children()
                    .iter()
                    .next()
                    .expect("NOT gate has one child");
                self.tree.gate_mut(index).set_kind(GateType::Null);
                self.tree.swap_child(index, child, -child);
            }
            GateType::Nand => self.rewrite_complement_output(index, GateType::And),
            GateType::Nor => self.rewrite_complement_output(index, GateType::Or),
            GateType::Xor => self.expand_xor(index),
            GateType::Atleast => {
                // A degenerate vote collapses to OR/AND without expansion.
                self.adjust_vote_kind(index);
                if self.tree.gate(index).kind() == GateType::Atleast {
                    self.expand_atleast(index);
                }
            }
        }
    }

    /// NAND/NOR keep their children but the gate's output is complemented:
    /// the kind becomes AND/OR and every referencing edge flips sign.
    fn rewrite_complement_output(&mut self, index: i32, kind: GateType) {
        self.tree.gate_mut(index).set_kind(kind);
        if index == self.tree.top_index() {
            let complement = self.complement_gate(index);
            self.tree.set_top_index(complement);
        } else {
            self.tree.invert_gate_references(index);
        }
    }

    /// `XOR(a, b) = OR(AND(a, ~b), AND(~a, b))`.
    fn expand_xor(&mut self, index: i32) {
        let children: Vec<Lit> = self.tree.gate(index).children().iter().copied().collect();
        if children.len() == 1 {
            // XOR of an argument with itself.
            self.tree.nullify(index);
            return;
        }
        assert_eq!(children.len(), 2, "XOR arity after folding");
        let (a, b) = (children[0], children[1]);
        for child in children {
            self.tree.erase_child(index, child);
        }
        self.tree.gate_mut(index).set_kind(GateType::Or);
        let left = self.tree.create_gate(GateType::And);
        self.tree.add_child(left, a);
        self.tree.add_child(left, -b);
        let right = self.tree.create_gate(GateType::And);
        self.tree.add_child(right, -a);
        self.tree.add_child(right, b);
        self.tree.add_child(index, Lit::pos(left));
        self.tree.add_child(index, Lit::pos(right));
    }

    /// Expands an ATLEAST gate with the recursive decomposition
    /// `K/k(x1..xn) = OR(AND(x1, K/k-1(x2..xn)), K/k(x2..xn))`,
    /// memoizing sub-terms over the suffix.
    fn expand_atleast(&mut self, index: i32) {
        let children: Vec<Lit> = self.tree.gate(index).children().iter().copied().collect();
        let vote = self.tree.gate(index).vote_number();
        assert!(vote > 1 && vote < children.len(), "ATLEAST bounds after folding");
        for child in &children {
            self.tree.erase_child(index, *child);
        }
        self.tree.gate_mut(index).set_kind(GateType::Or);

        let mut memo = HashMap::new();
        let left_rest = self.atleast_term(vote - 1, 1, &children, &mut memo);
        let left = self.tree.create_gate(GateType::And);
        self.tree.add_child(left, children[0]);
        self.tree.add_child(left, left_rest);
        let right = self.atleast_term(vote, 1, &children, &mut memo);
        self.tree.add_child(index, Lit::pos(left));
        self.tree.add_child(index, right);
    }

    /// A literal for "at least k of the suffix starting at `offset`".
    fn atleast_term(
        &mut self,
        k: usize,
        offset: usize,
        children: &[Lit],
        memo: &mut HashMap<(usize, usize), Lit>,
    ) -> Lit {
        if let Some(&lit) = memo.get(&(k, offset)) {
            return lit;
        }
        let rest = &children[offset..];
        assert!(k >= 1 && k <= rest.len());
        let lit = if rest.len() == 1 {
            rest[0]
        } else if k == rest.len() {
            let gate = self.tree.create_gate(GateType::And);
            for &child in rest {
                self.tree.add_child(gate, child);
            }
            Lit::pos(gate)
        } else if k == 1 {
            let gate = self.tree.create_gate(GateType::Or);
            for &child in rest {
                self.tree.add_child(gate, child);
            }
            Lit::pos(gate)
        } else {
            let left_rest = self.atleast_term(k - 1, offset + 1, children, memo);
            let left = self.tree.create_gate(GateType::And);
            self.tree.add_child(left, children[offset]);
            self.tree.add_child(left, left_rest);
            let right = self.atleast_term(k, offset + 1, children, memo);
            let gate = self.tree.create_gate(GateType::Or);
            self.tree.add_child(gate, Lit::pos(left));
            self.tree.add_child(gate, right);
            Lit::pos(gate)
        };
        memo.insert((k, offset), lit);
        lit
    }

    // ----- pass-through elimination ------------------------------------------

    /// Dissolves pass-through gates: NULL-kind gates and single-child
    /// AND/OR gates. Parent edges are re-pointed at the child with sign
    /// composition.
    fn eliminate_nulls(&mut self) -> bool {
        let mut changed = false;
        loop {
            let targets: Vec<i32> = self
                .tree
                .reachable_gates()
                .into_iter()
                .filter(|&g| g != self.tree.top_index() && self.is_pass_through(g))
                .collect();
            if targets.is_empty() {
                break;
            }
            for index in targets {
                if !self.is_pass_through(index) {
                    continue; // a parent swap may have resolved it meanwhile
                }
                let child = *self
                    .tree
                    .gate(index)
                    .children()
                    .iter()
                    .next()
                    .expect("pass-through has one child");
                debug!("dissolving pass-through gate {} into {}", index, child);
                let parents: Vec<i32> =
                    self.tree.node(index).base().parents().iter().copied().collect();
                for parent in parents {
                    for edge in [Lit::pos(index), Lit::neg(index)] {
                        if self.tree.gate(parent).state() == GateState::Normal
                            && self.tree.gate(parent).has_child(edge)
                        {
                            let new = if edge.is_negated() { -child } else { child };
                            self.tree.swap_child(parent, edge, new);
                        }
                    }
                }
                changed = true;
            }
        }
        changed |= self.collapse_top_pass_through();
        changed
    }

    fn is_pass_through(&self, index: i32) -> bool {
        let gate = self.tree.gate(index);
        gate.state() == GateState::Normal
            && (gate.kind() == GateType::Null
                || (matches!(gate.kind(), GateType::And | GateType::Or)
                    && gate.children().len() == 1))
    }

    /// Walks the top index down through pass-through gates.
    fn collapse_top_pass_through(&mut self) -> bool {
        let mut changed = false;
        loop {
            let top = self.tree.top_index();
            if !self.is_pass_through(top) {
                break;
            }
            let child = *self.tree.gate(top).children().iter().next().expect("one child");
            if child.is_gate() {
                let target = if child.is_negated() {
                    self.complement_gate(child.var())
                } else {
                    child.var()
                };
                self.tree.set_top_index(target);
                changed = true;
            } else {
                // A single-literal tree; keep a proper OR gate on top.
                if self.tree.gate(top).kind() == GateType::Null {
                    self.tree.gate_mut(top).set_kind(GateType::Or);
                    changed = true;
                }
                break;
            }
        }
        changed
    }

    // ----- complement propagation --------------------------------------------

    /// Pushes complements on gate edges down to basic events by De Morgan's
    /// laws. After this pass every gate-to-gate edge is positive.
    fn propagate_complements(&mut self) {
        let mut visited = HashSet::new();
        self.propagate_complements_gate(self.tree.top_index(), &mut visited);
    }

    fn propagate_complements_gate(&mut self, index: i32, visited: &mut HashSet<i32>) {
        if !visited.insert(index) {
            return;
        }
        let children: Vec<Lit> = self.tree.gate(index).children().iter().copied().collect();
        for child in children {
            if !child.is_gate() {
                continue;
            }
            let target = if child.is_negated() {
                let complement = self.complement_gate(child.var());
                debug!("gate {}: edge {} becomes {}", index, child, complement);
                if self.tree.gate(index).state() != GateState::Normal
                    || !self.tree.gate(index).has_child(child)
                {
                    continue;
                }
                if !self.tree.swap_child(index, child, Lit::pos(complement)) {
                    return; // the swap resolved this gate
                }
                complement
            } else {
                child.var()
            };
            self.propagate_complements_gate(target, visited);
        }
    }

    /// The memoized complement of a gate: the dual connective over inverted
    /// child edges.
    fn complement_gate(&mut self, index: i32) -> i32 {
        if let Some(&complement) = self.complements.get(&index) {
            return complement;
        }
        let gate = self.tree.gate(index);
        let state = gate.state();
        let kind = match gate.kind() {
            GateType::And => GateType::Or,
            GateType::Or => GateType::And,
            GateType::Null => GateType::Null,
            kind => unreachable!("complement of non-normalized {:?} gate", kind),
        };
        let children: Vec<Lit> = gate.children().iter().copied().collect();
        let complement = self.tree.create_gate(kind);
        match state {
            GateState::Normal => {
                for child in children {
                    self.tree.add_child(complement, -child);
                }
            }
            GateState::Null => self.tree.make_unity(complement),
            GateState::Unity => self.tree.nullify(complement),
        }
        self.complements.insert(index, complement);
        self.complements.insert(complement, index);
        complement
    }

    // ----- coalescing ---------------------------------------------------------

    /// Inlines child gates of the same connective reached by a positive edge
    /// and owned by a single parent. Complement clashes surfacing during the
    /// merge resolve the parent's state.
    fn coalesce(&mut self) -> bool {
        let mut changed = false;
        loop {
            let mut joined = false;
            for index in self.tree.reachable_gates() {
                if self.tree.gate(index).state() != GateState::Normal {
                    continue;
                }
                let kind = self.tree.gate(index).kind();
                if !matches!(kind, GateType::And | GateType::Or) {
                    continue;
                }
                let children: Vec<Lit> = self.tree.gate(index).children().iter().copied().collect();
                for child in children {
                    if !child.is_gate() || child.is_negated() {
                        continue;
                    }
                    let sub = self.tree.gate(child.var());
                    if sub.state() != GateState::Normal || sub.kind() != kind {
                        continue;
                    }
                    if self.tree.node(child.var()).base().parents().len() != 1 {
                        continue;
                    }
                    debug!("coalescing gate {} into {}", child.var(), index);
                    self.join_gate(index, child.var());
                    joined = true;
                    changed = true;
                    if self.tree.gate(index).state() != GateState::Normal {
                        break;
                    }
                }
            }
            if !joined {
                break;
            }
        }
        changed
    }

    /// Moves the children of `child` into `parent` and detaches `child`.
    fn join_gate(&mut self, parent: i32, child: i32) {
        self.tree.erase_child(parent, Lit::pos(child));
        let grandchildren: Vec<Lit> = self.tree.gate(child).children().iter().copied().collect();
        self.tree.gate_mut(child).erase_all_children();
        for grandchild in grandchildren {
            self.tree.node_mut(grandchild.var()).base_mut().erase_parent(child);
            if !self.tree.add_child(parent, grandchild) {
                break; // complement clash resolved the parent
            }
        }
    }

    // ----- module detection ---------------------------------------------------

    /// Finds gates whose subgraphs share no node with the rest of the tree:
    /// after a timed DFS, a gate is a module iff every descendant's visit
    /// window lies strictly inside the gate's own enter/exit window.
    fn detect_modules(&mut self) {
        self.tree.clear_visits();
        let mut time = 0;
        self.assign_timing(&mut time, self.tree.top_index());
        let mut processed = HashMap::new();
        self.find_modules(self.tree.top_index(), &mut processed);
        let top = self.tree.top_index();
        if !self.tree.gate(top).is_module() {
            self.tree.gate_mut(top).turn_module();
        }
    }

    fn assign_timing(&mut self, time: &mut i32, index: i32) {
        let first = !self.tree.node(index).base().visits().visited();
        *time += 1;
        self.tree.node_mut(index).base_mut().visits_mut().visit(*time);
        if !first {
            return;
        }
        if let Some(gate) = self.tree.node(index).as_gate() {
            let children: Vec<Lit> = gate.children().iter().copied().collect();
            for child in children {
                self.assign_timing(time, child.var());
            }
        }
        *time += 1;
        self.tree.node_mut(index).base_mut().visits_mut().visit(*time);
    }

    /// Post-order min/max visit times over each gate's subtree.
    fn find_modules(&mut self, index: i32, processed: &mut HashMap<i32, (i32, i32)>) -> (i32, i32) {
        if let Some(&window) = processed.get(&index) {
            return window;
        }
        let visits = self.tree.node(index).base().visits();
        let enter = visits.enter_time();
        let exit = visits.exit_time();
        let last = visits.last_visit();

        let children: Vec<Lit> = self.tree.gate(index).children().iter().copied().collect();
        let mut min = i32::MAX;
        let mut max = 0;
        for child in &children {
            let (child_min, child_max) = if child.is_gate() {
                self.find_modules(child.var(), processed)
            } else {
                let leaf = self.tree.node(child.var()).base().visits();
                (leaf.enter_time(), leaf.last_visit())
            };
            min = min.min(child_min);
            max = max.max(child_max);
        }
        if !children.is_empty() && min > enter && max < exit {
            debug!("gate {} is a module ({} < [{}, {}] < {})", index, enter, min, max, exit);
            self.tree.gate_mut(index).turn_module();
        }
        let window = (min.min(enter), max.max(last));
        processed.insert(index, window);
        window
    }
}
