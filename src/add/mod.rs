//! Reduced ordered decision diagrams with real-valued terminals.
//!
//! The arena mirrors the teacher BDD package's "vector of nodes addressed by
//! index" layout, generalized from the fixed 0/1 terminal pair to arbitrary real
//! terminals: a node is either `Terminal(value)` or `Internal { var, low, high }`,
//! and structural canonicalization ("hash-cons") is a reverse lookup from the
//! node's content to its id.

use crate::cache::{CacheKey, CacheValue, OperationCache};
use crate::error::{DdError, DdResult};
use crate::node_id::{fresh_store_tag, NodeId};
use crate::ops::{approx_eq, Op};
use crate::order::VariableOrder;
use crate::prune::PruneInfo;
use crate::special::{self, SharedSpecialSet};
use crate::NodeGuard;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum AddNode {
    Terminal(f64),
    Internal { var: u32, low: NodeId, high: NodeId },
}

/// A node's shape, exposed read-only to callers outside this module (the
/// propagator's DFS traversal needs to walk the structure directly rather
/// than through `apply`/`restrict`).
#[derive(Copy, Clone, Debug)]
pub enum NodeShape {
    Terminal(f64),
    Internal { var: u32, low: NodeId, high: NodeId },
}

/// Node store + ADD engine. One `AddStore` owns one arena; every [`NodeId`] it
/// hands out is tagged with this store's `store_tag` so a foreign id from another
/// store (even one over the same variable order) is rejected rather than silently
/// misinterpreted.
pub struct AddStore {
    tag: u32,
    order: VariableOrder,
    /// `None` marks a freed slot, reusable via `free_list`.
    nodes: Vec<Option<AddNode>>,
    free_list: Vec<u32>,
    internal_index: HashMap<(u32, NodeId, NodeId), NodeId>,
    /// Linear table for terminal hash-consing: exact hashing would defeat the
    /// relative-tolerance equality the node store contract requires (invariant 5),
    /// so lookups scan this small table and compare with `approx_eq`.
    terminal_table: Vec<(f64, NodeId)>,
    specials: SharedSpecialSet,
    cache: OperationCache,
    min_cache: HashMap<NodeId, f64>,
    max_cache: HashMap<NodeId, f64>,
    prune_info: Option<PruneInfo>,
}

impl AddStore {
    pub fn new(order: VariableOrder) -> AddStore {
        log::debug!("allocating new ADD store over {} variables", order.len());
        AddStore {
            tag: fresh_store_tag(),
            order,
            nodes: Vec::new(),
            free_list: Vec::new(),
            internal_index: HashMap::new(),
            terminal_table: Vec::new(),
            specials: special::new_shared(),
            cache: OperationCache::new(),
            min_cache: HashMap::new(),
            max_cache: HashMap::new(),
            prune_info: None,
        }
    }

    pub fn order(&self) -> &VariableOrder {
        &self.order
    }

    pub fn set_prune_info(&mut self, info: PruneInfo) {
        self.prune_info = Some(info);
    }

    // ---- arena plumbing -------------------------------------------------

    fn alloc(&mut self, node: AddNode) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            self.nodes[index as usize] = Some(node);
            NodeId::new(index, self.tag)
        } else {
            let index = self.nodes.len() as u32;
            self.nodes.push(Some(node));
            NodeId::new(index, self.tag)
        }
    }

    fn check_owned(&self, id: NodeId) -> DdResult<()> {
        if id.store_tag != self.tag {
            return Err(DdError::ForeignNodeId(id));
        }
        match self.nodes.get(id.index()) {
            Some(Some(_)) => Ok(()),
            _ => Err(DdError::UnknownNodeId(id)),
        }
    }

    /// Internal, panic-on-bug accessor: every id reaching here was either
    /// validated by a public entry point or produced by this store's own
    /// recursion, so a miss means an engine bug, not caller misuse.
    fn node(&self, id: NodeId) -> &AddNode {
        self.nodes[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling node id inside ADD store: {:?}", id))
    }

    fn is_terminal(&self, id: NodeId) -> bool {
        matches!(self.node(id), AddNode::Terminal(_))
    }

    fn terminal_value(&self, id: NodeId) -> f64 {
        match self.node(id) {
            AddNode::Terminal(v) => *v,
            AddNode::Internal { .. } => panic!("terminal_value called on internal node"),
        }
    }

    fn level_of_node(&self, id: NodeId) -> u32 {
        match self.node(id) {
            AddNode::Terminal(_) => self.order.terminal_level(),
            AddNode::Internal { var, .. } => self.order.level_of(*var),
        }
    }

    fn children(&self, id: NodeId) -> (NodeId, NodeId) {
        match self.node(id) {
            AddNode::Internal { low, high, .. } => (*low, *high),
            AddNode::Terminal(_) => panic!("children called on terminal node"),
        }
    }

    /// Read-only structural introspection for callers outside this module
    /// (the ADD propagator's support-DFS, diagnostics).
    pub fn node_shape(&self, id: NodeId) -> DdResult<NodeShape> {
        self.check_owned(id)?;
        Ok(match self.node(id) {
            AddNode::Terminal(v) => NodeShape::Terminal(*v),
            AddNode::Internal { var, low, high } => {
                NodeShape::Internal { var: *var, low: *low, high: *high }
            }
        })
    }

    // ---- construction primitives ----------------------------------------

    /// Canonical terminal for `value`, within `ε` of any existing terminal.
    pub fn get_constant(&mut self, value: f64) -> NodeId {
        for &(v, id) in &self.terminal_table {
            if approx_eq(v, value) {
                return id;
            }
        }
        let id = self.alloc(AddNode::Terminal(value));
        self.terminal_table.push((value, id));
        id
    }

    /// `getVar`: the leaf-valued indicator `lowVal` / `highVal` for variable
    /// `var_id`. Collapses to the constant if both leaves coincide.
    pub fn get_var(&mut self, var_id: u32, low_val: f64, high_val: f64) -> NodeId {
        if approx_eq(low_val, high_val) {
            return self.get_constant(low_val);
        }
        let low = self.get_constant(low_val);
        let high = self.get_constant(high_val);
        self.get_internal(var_id, low, high)
    }

    /// The 0/1 indicator DD for variable `var_id`.
    pub fn indicator(&mut self, var_id: u32) -> NodeId {
        self.get_var(var_id, 0.0, 1.0)
    }

    /// `getInternal`: returns an existing node for `(var_id, low, high)` if one is
    /// already registered, else allocates it. Enforces the two reduction rules.
    pub fn get_internal(&mut self, var_id: u32, low: NodeId, high: NodeId) -> NodeId {
        if low == high {
            return low; // redundant-node elimination
        }
        debug_assert!(
            low != high,
            "{}",
            DdError::LowHighEqualAfterReduction(var_id)
        );
        let key = (var_id, low, high);
        if let Some(&existing) = self.internal_index.get(&key) {
            return existing;
        }
        debug_assert!(
            self.order.level_of(var_id) < self.level_of_node(low)
                && self.order.level_of(var_id) < self.level_of_node(high),
            "order violated constructing internal node for var {}",
            var_id
        );
        let id = self.alloc(AddNode::Internal { var: var_id, low, high });
        self.internal_index.insert(key, id);
        id
    }

    // ---- apply ------------------------------------------------------------

    /// `applyBinary`. Both operands must belong to this store.
    pub fn apply(&mut self, f: NodeId, g: NodeId, op: Op) -> DdResult<NodeId> {
        self.check_owned(f)?;
        self.check_owned(g)?;
        if op == Op::Div && self.reachable_zero(g) {
            return Err(DdError::DivisionByZero);
        }
        Ok(self.apply_rec(f, g, op))
    }

    /// Does any terminal reachable from `id` equal zero? Used to reject `DIV` up
    /// front the way the spec mandates ("division by a DD that contains terminal
    /// zero is reported as fatal").
    fn reachable_zero(&self, id: NodeId) -> bool {
        let mut stack = vec![id];
        let mut seen = std::collections::HashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            match self.node(cur) {
                AddNode::Terminal(v) if approx_eq(*v, 0.0) => return true,
                AddNode::Terminal(_) => {}
                AddNode::Internal { low, high, .. } => {
                    stack.push(*low);
                    stack.push(*high);
                }
            }
        }
        false
    }

    fn algebraic_shortcut(&mut self, f: NodeId, g: NodeId, op: Op) -> Option<NodeId> {
        match op {
            Op::Prod => {
                if self.is_terminal(f) && self.terminal_value(f) == 0.0 {
                    return Some(f);
                }
                if self.is_terminal(g) && self.terminal_value(g) == 0.0 {
                    return Some(g);
                }
                if self.is_terminal(f) && self.terminal_value(f) == 1.0 {
                    return Some(g);
                }
                if self.is_terminal(g) && self.terminal_value(g) == 1.0 {
                    return Some(f);
                }
                None
            }
            Op::Sum => {
                if self.is_terminal(f) && self.terminal_value(f) == 0.0 {
                    return Some(g);
                }
                if self.is_terminal(g) && self.terminal_value(g) == 0.0 {
                    return Some(f);
                }
                None
            }
            Op::Minus if f == g => Some(self.get_constant(0.0)),
            _ => None,
        }
    }

    fn apply_rec(&mut self, f: NodeId, g: NodeId, op: Op) -> NodeId {
        if let Some(result) = self.algebraic_shortcut(f, g, op) {
            return result;
        }
        let key = CacheKey::add(op, f, g);
        if let Some(cached) = self.cache.get(&key) {
            return cached.as_add();
        }
        let result = if self.is_terminal(f) && self.is_terminal(g) {
            self.get_constant(op.eval(self.terminal_value(f), self.terminal_value(g)))
        } else {
            let lvl_f = self.level_of_node(f);
            let lvl_g = self.level_of_node(g);
            let lvl = lvl_f.min(lvl_g);
            let var = self.order.var_at(lvl);
            let (f_lo, f_hi) = if lvl_f == lvl { self.children(f) } else { (f, f) };
            let (g_lo, g_hi) = if lvl_g == lvl { self.children(g) } else { (g, g) };
            let low = self.apply_rec(f_lo, g_lo, op);
            let high = self.apply_rec(f_hi, g_hi, op);
            self.get_internal(var, low, high)
        };
        self.cache.insert(key, CacheValue::Add(result));
        result
    }

    // ---- restrict -----------------------------------------------------------

    /// Substitutes `var_id` by the literal `value`, leaving the rest of the
    /// structure untouched.
    pub fn restrict(&mut self, f: NodeId, var_id: u32, value: bool) -> DdResult<NodeId> {
        self.check_owned(f)?;
        let target_level = self.order.level_of(var_id);
        Ok(self.restrict_rec(f, target_level, value))
    }

    fn restrict_rec(&mut self, f: NodeId, target_level: u32, value: bool) -> NodeId {
        if self.is_terminal(f) {
            return f;
        }
        let lvl = self.level_of_node(f);
        if lvl > target_level {
            // Past the target's level: this variable never appears below here.
            return f;
        }
        let (var, low, high) = match self.node(f) {
            AddNode::Internal { var, low, high } => (*var, *low, *high),
            AddNode::Terminal(_) => unreachable!(),
        };
        if lvl == target_level {
            return if value { high } else { low };
        }
        let new_low = self.restrict_rec(low, target_level, value);
        let new_high = self.restrict_rec(high, target_level, value);
        self.get_internal(var, new_low, new_high)
    }

    // ---- bounds ---------------------------------------------------------

    pub fn min_value(&mut self, id: NodeId) -> DdResult<f64> {
        self.check_owned(id)?;
        Ok(self.min_rec(id))
    }

    pub fn max_value(&mut self, id: NodeId) -> DdResult<f64> {
        self.check_owned(id)?;
        Ok(self.max_rec(id))
    }

    fn min_rec(&mut self, id: NodeId) -> f64 {
        if let Some(&v) = self.min_cache.get(&id) {
            return v;
        }
        let v = match self.node(id) {
            AddNode::Terminal(v) => *v,
            AddNode::Internal { low, high, .. } => {
                let (low, high) = (*low, *high);
                self.min_rec(low).min(self.min_rec(high))
            }
        };
        self.min_cache.insert(id, v);
        v
    }

    fn max_rec(&mut self, id: NodeId) -> f64 {
        if let Some(&v) = self.max_cache.get(&id) {
            return v;
        }
        let v = match self.node(id) {
            AddNode::Terminal(v) => *v,
            AddNode::Internal { low, high, .. } => {
                let (low, high) = (*low, *high);
                self.max_rec(low).max(self.max_rec(high))
            }
        };
        self.max_cache.insert(id, v);
        v
    }

    /// Complete evaluation of the function rooted at `id` under assignment `ω`,
    /// given as `var_id -> bool`. Used only by tests to check the structural
    /// `id1 == id2 ⇒ eval(id1,ω) == eval(id2,ω)` invariant and algebraic laws.
    pub fn eval(&self, id: NodeId, assignment: &HashMap<u32, bool>) -> f64 {
        match self.node(id) {
            AddNode::Terminal(v) => *v,
            AddNode::Internal { var, low, high } => {
                let b = *assignment
                    .get(var)
                    .unwrap_or_else(|| panic!("assignment missing variable {}", var));
                self.eval(if b { *high } else { *low }, assignment)
            }
        }
    }

    // ---- pruning -------------------------------------------------------

    /// `pruneNodes`: bottom-up bounded-error sub-diagram replacement, per the
    /// globally configured `PruneInfo`. Panics if no `PruneInfo` was set — a
    /// caller bug (`setPruneInfo` must precede a prune call).
    pub fn prune_nodes(&mut self, id: NodeId) -> DdResult<NodeId> {
        self.check_owned(id)?;
        let info = self
            .prune_info
            .expect("prune_nodes called before set_prune_info");
        let mut memo = HashMap::new();
        Ok(self.prune_rec(id, &info, &mut memo))
    }

    fn prune_rec(&mut self, id: NodeId, info: &PruneInfo, memo: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&v) = memo.get(&id) {
            return v;
        }
        let result = if self.is_terminal(id) {
            id
        } else {
            let lo = self.min_rec(id);
            let hi = self.max_rec(id);
            if info.collapses(lo, hi) {
                self.get_constant(info.replacement_value(lo, hi))
            } else {
                let (low, high, var) = match self.node(id) {
                    AddNode::Internal { low, high, var } => (*low, *high, *var),
                    AddNode::Terminal(_) => unreachable!(),
                };
                let new_low = self.prune_rec(low, info, memo);
                let new_high = self.prune_rec(high, info, memo);
                self.get_internal(var, new_low, new_high)
            }
        };
        memo.insert(id, result);
        result
    }

    // ---- root anchoring ---------------------------------------------------

    pub fn add_special_node(&mut self, id: NodeId) {
        self.specials.borrow_mut().add(id);
    }

    pub fn remove_special_node(&mut self, id: NodeId) {
        self.specials.borrow_mut().remove(id);
    }

    /// RAII variant of `add_special_node`: the returned [`NodeGuard`]
    /// unregisters `id` automatically when dropped. Prefer this over the raw
    /// pair for a root held across one lexical scope (a demo, a test, a
    /// short-lived query); the propagator keeps using the raw pair since its
    /// root changes across trail boundaries a destructor cannot see.
    pub fn add_special_node_guarded(&mut self, id: NodeId) -> NodeGuard {
        NodeGuard::new(id, self.specials.clone())
    }

    // ---- cache & GC --------------------------------------------------------

    /// Garbage-collects every node unreachable from a special root, empties the
    /// operation cache and the bounds caches, and optionally rebuilds the
    /// hash-cons tables from the survivors.
    pub fn flush_caches(&mut self, also_rebuild_hash_cons: bool) {
        log::debug!("flushing ADD store (rebuild hash-cons = {})", also_rebuild_hash_cons);
        self.cache.clear();
        self.min_cache.clear();
        self.max_cache.clear();

        let mut reachable = std::collections::HashSet::new();
        let mut stack: Vec<NodeId> = self.specials.borrow().roots().collect();
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let AddNode::Internal { low, high, .. } = self.node(id) {
                stack.push(*low);
                stack.push(*high);
            }
        }

        for index in 0..self.nodes.len() {
            let id = NodeId::new(index as u32, self.tag);
            if self.nodes[index].is_some() && !reachable.contains(&id) {
                self.nodes[index] = None;
                self.free_list.push(index as u32);
            }
        }

        self.terminal_table.retain(|&(_, id)| self.nodes[id.index()].is_some());
        self.internal_index.retain(|_, &mut id| self.nodes[id.index()].is_some());

        if also_rebuild_hash_cons {
            self.terminal_table.clear();
            self.internal_index.clear();
            for (index, slot) in self.nodes.iter().enumerate() {
                let id = NodeId::new(index as u32, self.tag);
                match slot {
                    Some(AddNode::Terminal(v)) => self.terminal_table.push((*v, id)),
                    Some(AddNode::Internal { var, low, high }) => {
                        self.internal_index.insert((*var, *low, *high), id);
                    }
                    None => {}
                }
            }
        }
    }

    // ---- diagnostics --------------------------------------------------------

    /// `countExactNodes`: number of distinct nodes reachable from `id`.
    pub fn count_exact_nodes(&self, id: NodeId) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let AddNode::Internal { low, high, .. } = self.node(cur) {
                stack.push(*low);
                stack.push(*high);
            }
        }
        seen.len()
    }

    /// `printNode`: one-line structural dump of a single node.
    pub fn print_node(&self, id: NodeId) -> String {
        match self.node(id) {
            AddNode::Terminal(v) => format!("[{}] terminal({})", id.index, v),
            AddNode::Internal { var, low, high } => {
                format!("[{}] var={} low=[{}] high=[{}]", id.index, var, low.index, high.index)
            }
        }
    }

    /// `getGraph`: DAG export as Graphviz `dot` text, generalized from the
    /// teacher's `dot_printer` module to arbitrary real terminals.
    pub fn to_dot(&self, id: NodeId) -> String {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![id];
        let mut out = String::from("digraph G {\n");
        out.push_str("init__ [label=\"\", style=invis, height=0, width=0];\n");
        out.push_str(&format!("init__ -> n{};\n", id.index));
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            match self.node(cur) {
                AddNode::Terminal(v) => {
                    out.push_str(&format!(
                        "n{}[shape=box, label=\"{}\", style=filled, height=0.3, width=0.3];\n",
                        cur.index, v
                    ));
                }
                AddNode::Internal { var, low, high } => {
                    out.push_str(&format!("n{}[label=\"x{}\"];\n", cur.index, var));
                    out.push_str(&format!("n{} -> n{} [style=filled];\n", cur.index, high.index));
                    out.push_str(&format!("n{} -> n{} [style=dotted];\n", cur.index, low.index));
                    stack.push(*low);
                    stack.push(*high);
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::{PruneInfo, PruneMode};

    fn sum_of_five(store: &mut AddStore) -> NodeId {
        let mut acc = store.get_constant(0.0);
        for v in 1..=5u32 {
            let ind = store.indicator(v);
            acc = store.apply(acc, ind, Op::Sum).unwrap();
        }
        acc
    }

    #[test]
    fn reduction_collapses_equal_children() {
        let mut store = AddStore::new(VariableOrder::anonymous(2));
        let c = store.get_constant(3.0);
        let internal = store.get_internal(0, c, c);
        assert_eq!(c, internal);
    }

    #[test]
    fn hash_cons_shares_identical_subfunctions() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let a = store.indicator(0);
        let b = store.indicator(0);
        assert_eq!(a, b);
    }

    #[test]
    fn sum_indicator_bounds_and_size() {
        let mut store = AddStore::new(VariableOrder::anonymous(10));
        let f = sum_of_five(&mut store);
        assert_eq!(0.0, store.min_value(f).unwrap());
        assert_eq!(5.0, store.max_value(f).unwrap());
        // The minimal reduced ADD for a fully symmetric sum of n indicators has
        // sum_{i=0}^{n-1}(i+1) internal nodes (the running count 0..i is a
        // distinct node at every level, none of which can be shared with another
        // count at the same level) plus n+1 terminals: for n=5, 15 + 6 = 21.
        assert_eq!(21, store.count_exact_nodes(f));
    }

    #[test]
    fn threshold_scenario() {
        let mut store = AddStore::new(VariableOrder::anonymous(10));
        let f = sum_of_five(&mut store);
        let three = store.get_constant(3.0);
        let g = store.apply(f, three, Op::GreaterEq).unwrap();

        let mut assignment = HashMap::new();
        for v in 0..10u32 {
            assignment.insert(v, false);
        }
        assignment.insert(1, true);
        assignment.insert(2, true);
        assert_eq!(0.0, store.eval(g, &assignment));

        assignment.insert(3, true);
        assert_eq!(1.0, store.eval(g, &assignment));
    }

    #[test]
    fn apply_sum_is_commutative_and_associative() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let f = store.indicator(0);
        let g = store.indicator(1);
        let h = store.indicator(2);

        let fg = store.apply(f, g, Op::Sum).unwrap();
        let gf = store.apply(g, f, Op::Sum).unwrap();
        assert_eq!(fg, gf);

        let gh = store.apply(g, h, Op::Sum).unwrap();
        let left = store.apply(f, gh, Op::Sum).unwrap();
        let right = store.apply(fg, h, Op::Sum).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn apply_identity_elements() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let f = store.indicator(0);
        let zero = store.get_constant(0.0);
        let one = store.get_constant(1.0);
        assert_eq!(f, store.apply(f, zero, Op::Sum).unwrap());
        assert_eq!(f, store.apply(f, one, Op::Prod).unwrap());
    }

    #[test]
    fn restrict_commutes_with_apply() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let f = store.indicator(0);
        let g = store.indicator(1);
        let combined = store.apply(f, g, Op::Sum).unwrap();

        let lhs = store.restrict(combined, 0, true).unwrap();
        let rf = store.restrict(f, 0, true).unwrap();
        let rg = store.restrict(g, 0, true).unwrap();
        let rhs = store.apply(rf, rg, Op::Sum).unwrap();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn double_restrict_same_variable_is_a_no_op() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let f = store.indicator(0);
        let once = store.restrict(f, 0, false).unwrap();
        let twice = store.restrict(once, 0, true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn prune_lower_bound_never_exceeds_original() {
        let mut store = AddStore::new(VariableOrder::anonymous(10));
        let f = sum_of_five(&mut store);
        store.set_prune_info(PruneInfo::new(PruneMode::Min, 2.0));
        let lb = store.prune_nodes(f).unwrap();

        let mut all_ones = HashMap::new();
        for v in 0..10u32 {
            all_ones.insert(v, v < 5);
        }
        assert!(store.eval(lb, &all_ones) <= 5.0);

        let all_zeros: HashMap<u32, bool> = (0..10u32).map(|v| (v, false)).collect();
        assert!(store.eval(lb, &all_zeros) <= 0.0);
    }

    #[test]
    fn prune_upper_bound_allows_over_relaxed_threshold() {
        let mut store = AddStore::new(VariableOrder::anonymous(10));
        let f = sum_of_five(&mut store);
        store.set_prune_info(PruneInfo::new(PruneMode::Max, 2.0));
        let ub = store.prune_nodes(f).unwrap();
        let three = store.get_constant(3.0);
        let g_over = store.apply(ub, three, Op::GreaterEq).unwrap();

        let all_ones: HashMap<u32, bool> = (0..10u32).map(|v| (v, v < 5)).collect();
        assert_eq!(1.0, store.eval(g_over, &all_ones));
    }

    #[test]
    fn flush_caches_keeps_special_nodes_alive() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let f = store.indicator(0);
        store.add_special_node(f);
        let scratch = store.indicator(1);
        assert!(store.count_exact_nodes(scratch) > 0);

        store.flush_caches(false);

        // f is still valid and structurally unchanged.
        assert_eq!(3, store.count_exact_nodes(f));
        // Re-deriving the same indicator gives back the same id (hash-cons intact).
        let f_again = store.indicator(0);
        assert_eq!(f, f_again);
    }

    #[test]
    fn guarded_special_node_is_released_on_drop() {
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let f = store.indicator(0);
        {
            let _guard = store.add_special_node_guarded(f);
            store.flush_caches(false);
            // Still anchored by the guard: the flush above did not reclaim it.
            assert_eq!(3, store.count_exact_nodes(f));
        }
        // The guard dropped, so f is no longer anchored: a flush now reclaims it.
        store.flush_caches(false);
        assert!(matches!(store.node_shape(f), Err(DdError::UnknownNodeId(_))));
    }

    #[test]
    fn foreign_node_id_is_rejected() {
        let mut a = AddStore::new(VariableOrder::anonymous(2));
        let mut b = AddStore::new(VariableOrder::anonymous(2));
        let fa = a.indicator(0);
        let fb = b.indicator(0);
        assert!(matches!(a.apply(fa, fb, Op::Sum), Err(DdError::ForeignNodeId(_))));
    }

    #[test]
    fn division_by_zero_containing_dd_is_rejected() {
        let mut store = AddStore::new(VariableOrder::anonymous(2));
        let f = store.get_constant(1.0);
        let zero = store.get_constant(0.0);
        assert!(matches!(store.apply(f, zero, Op::Div), Err(DdError::DivisionByZero)));
    }
}
