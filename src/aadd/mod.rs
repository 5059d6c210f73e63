//! Affine ADDs: every edge carries a `(c, b)` affine pair so that isomorphic
//! sub-functions canonicalize modulo a scale-and-offset, giving broader sharing
//! than the plain ADD engine (see [`crate::add`]) at the cost of every lookup and
//! `apply` threading an affine reference instead of a bare node id.

use crate::cache::{CacheKey, CacheValue, OperationCache};
use crate::error::{DdError, DdResult};
use crate::node_id::{fresh_store_tag, NodeId};
use crate::ops::{approx_eq, Op, EPS};
use crate::order::VariableOrder;
use crate::prune::PruneInfo;
use crate::special::{self, SharedSpecialSet};
use crate::NodeGuard;
use std::collections::HashMap;

/// An AADD reference: the function `c * f_node + b`. Two references are the same
/// function iff they have the same `id` and the same `(c, b)` (exactly — both
/// components are always produced by `mk`'s deterministic arithmetic, never by
/// raw user input, so exact float equality is the correct notion of "same edge").
#[derive(Copy, Clone, Debug)]
pub struct AadRef {
    pub c: f64,
    pub b: f64,
    pub id: NodeId,
}

impl AadRef {
    fn bits(self) -> (u64, u64, NodeId) {
        (self.c.to_bits(), self.b.to_bits(), self.id)
    }
}

impl PartialEq for AadRef {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

#[derive(Clone, Debug)]
enum AadNode {
    /// The single canonical terminal; a reference's own `(c, b)` carries the
    /// concrete value `c * 1 + b`.
    Terminal,
    Internal { var: u32, low: AadRef, high: AadRef },
}

/// Node store + AADD engine. Mirrors [`crate::add::AddStore`]'s arena/hash-cons
/// plumbing; the node shape and the canonicalization in `mk` are what's new.
pub struct AadStore {
    tag: u32,
    order: VariableOrder,
    nodes: Vec<Option<AadNode>>,
    free_list: Vec<u32>,
    terminal: NodeId,
    internal_index: HashMap<(u32, (u64, u64, NodeId), (u64, u64, NodeId)), NodeId>,
    specials: SharedSpecialSet,
    cache: OperationCache,
    min_cache: HashMap<NodeId, (f64, f64)>, // (c, b) -> value relative to the node itself is folded at call site
    prune_info: Option<PruneInfo>,
}

impl AadStore {
    pub fn new(order: VariableOrder) -> AadStore {
        log::debug!("allocating new AADD store over {} variables", order.len());
        let mut nodes = Vec::new();
        nodes.push(Some(AadNode::Terminal));
        let tag = fresh_store_tag();
        AadStore {
            tag,
            order,
            nodes,
            free_list: Vec::new(),
            terminal: NodeId::new(0, tag),
            internal_index: HashMap::new(),
            specials: special::new_shared(),
            cache: OperationCache::new(),
            min_cache: HashMap::new(),
            prune_info: None,
        }
    }

    pub fn order(&self) -> &VariableOrder {
        &self.order
    }

    pub fn set_prune_info(&mut self, info: PruneInfo) {
        self.prune_info = Some(info);
    }

    // ---- arena plumbing ---------------------------------------------------

    fn alloc(&mut self, node: AadNode) -> NodeId {
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

    fn node(&self, id: NodeId) -> &AadNode {
        self.nodes[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling node id inside AADD store: {:?}", id))
    }

    fn is_terminal_id(&self, id: NodeId) -> bool {
        matches!(self.node(id), AadNode::Terminal)
    }

    fn level_of_ref(&self, r: AadRef) -> u32 {
        if self.is_terminal_id(r.id) {
            self.order.terminal_level()
        } else {
            match self.node(r.id) {
                AadNode::Internal { var, .. } => self.order.level_of(*var),
                AadNode::Terminal => unreachable!(),
            }
        }
    }

    /// Compose an outer reference with one of its node's own edges: if `outer`
    /// denotes `c*f_node+b` and `edge` is `f_node`'s low/high edge `c2*f_child+b2`,
    /// the child as seen from the top is `(c*c2)*f_child + (c*b2+b)`.
    fn compose(outer: AadRef, edge: AadRef) -> AadRef {
        AadRef { c: outer.c * edge.c, b: outer.c * edge.b + outer.b, id: edge.id }
    }

    fn children_of_ref(&self, r: AadRef) -> (AadRef, AadRef) {
        match self.node(r.id) {
            AadNode::Internal { low, high, .. } => (Self::compose(r, *low), Self::compose(r, *high)),
            AadNode::Terminal => panic!("children_of_ref called on a terminal reference"),
        }
    }

    // ---- construction -------------------------------------------------------

    /// The canonical terminal reference's raw node id, exposed for the rare
    /// caller that needs to test `id == terminal_node_id()` directly (the
    /// propagator's entailment check does not; it goes through `min_value`).
    pub fn terminal_node_id(&self) -> NodeId {
        self.terminal
    }

    pub fn get_constant(&self, value: f64) -> AadRef {
        AadRef { c: 0.0, b: value, id: self.terminal }
    }

    pub fn get_var(&mut self, var_id: u32, low_val: f64, high_val: f64) -> AadRef {
        if approx_eq(low_val, high_val) {
            return self.get_constant(low_val);
        }
        let low = self.get_constant(low_val);
        let high = self.get_constant(high_val);
        self.mk(var_id, low, high)
    }

    pub fn indicator(&mut self, var_id: u32) -> AadRef {
        self.get_var(var_id, 0.0, 1.0)
    }

    /// `mk(v, (c_l,b_l,lo), (c_h,b_h,hi)) -> (c,b,id)`: the AADD normalization
    /// from the component design (§4.3). Produces a reference satisfying the
    /// canonical form `b_low == 0`, modulo the returned outer `(c,b)`.
    ///
    /// A node whose two children are both the terminal (the base case when
    /// folding a fresh variable's two constant branches into the diagram) is a
    /// special shape: the terminal's own value is fixed at `1`, so `c_low`/`c_high`
    /// carry no information there and normalizing by `max(c_low,c_high)` would
    /// divide by zero. Such a node depends on its variable purely through the
    /// additive span between the branches, so that span becomes the outer scale
    /// instead, and the node itself collapses to the canonical 0/1 indicator
    /// shape (already shared across every variable that is ever folded this way).
    pub fn mk(&mut self, var_id: u32, low: AadRef, high: AadRef) -> AadRef {
        if low == high {
            return low; // reduction: redundant node
        }
        debug_assert!(
            low != high,
            "{}",
            DdError::LowHighEqualAfterReduction(var_id)
        );
        if low.id == self.terminal && high.id == self.terminal {
            let outer_b = low.b;
            let span = high.b - low.b;
            let low_edge = AadRef { c: 0.0, b: 0.0, id: self.terminal };
            let high_edge = AadRef { c: 0.0, b: 1.0, id: self.terminal };
            let key = (var_id, low_edge.bits(), high_edge.bits());
            let node_id = if let Some(&existing) = self.internal_index.get(&key) {
                existing
            } else {
                let id = self.alloc(AadNode::Internal { var: var_id, low: low_edge, high: high_edge });
                self.internal_index.insert(key, id);
                id
            };
            return AadRef { c: span, b: outer_b, id: node_id };
        }

        let b = low.b;
        let b_high_shifted = high.b - low.b;
        let c = low.c.max(high.c);
        if c.abs() < EPS {
            log::debug!(
                "AADD canonicalization underflow at variable {} (c={:.3e}): clamping to constant {}",
                var_id,
                c,
                b
            );
            return AadRef { c: 0.0, b, id: self.terminal };
        }
        let low_edge = AadRef { c: low.c / c, b: 0.0, id: low.id };
        let high_edge = AadRef { c: high.c / c, b: b_high_shifted / c, id: high.id };

        debug_assert!(
            self.order.level_of(var_id) < self.level_of_ref(low_edge)
                && self.order.level_of(var_id) < self.level_of_ref(high_edge),
            "order violated constructing AADD node for var {}",
            var_id
        );

        let key = (var_id, low_edge.bits(), high_edge.bits());
        let node_id = if let Some(&existing) = self.internal_index.get(&key) {
            existing
        } else {
            let id = self.alloc(AadNode::Internal { var: var_id, low: low_edge, high: high_edge });
            self.internal_index.insert(key, id);
            id
        };
        AadRef { c, b, id: node_id }
    }

    // ---- apply --------------------------------------------------------------

    pub fn apply(&mut self, f: AadRef, g: AadRef, op: Op) -> DdResult<AadRef> {
        self.check_owned(f.id)?;
        self.check_owned(g.id)?;
        if op == Op::Div && self.reachable_zero(g) {
            return Err(DdError::DivisionByZero);
        }
        Ok(self.apply_rec(f, g, op))
    }

    fn reachable_zero(&self, r: AadRef) -> bool {
        if self.is_terminal_id(r.id) {
            return approx_eq(r.c * 1.0 + r.b, 0.0) || (approx_eq(r.c, 0.0) && approx_eq(r.b, 0.0));
        }
        let (low, high) = self.children_of_ref(r);
        self.reachable_zero(low) || self.reachable_zero(high)
    }

    fn algebraic_shortcut(&mut self, f: AadRef, g: AadRef, op: Op) -> Option<AadRef> {
        match op {
            Op::Prod => {
                if self.is_terminal_id(f.id) && approx_eq(f.c, 0.0) && approx_eq(f.b, 0.0) {
                    return Some(f);
                }
                if self.is_terminal_id(g.id) && approx_eq(g.c, 0.0) && approx_eq(g.b, 0.0) {
                    return Some(g);
                }
                if self.is_terminal_id(f.id) && approx_eq(f.c, 0.0) && approx_eq(f.b, 1.0) {
                    return Some(g);
                }
                if self.is_terminal_id(g.id) && approx_eq(g.c, 0.0) && approx_eq(g.b, 1.0) {
                    return Some(f);
                }
                None
            }
            Op::Sum => {
                if self.is_terminal_id(f.id) && approx_eq(f.c, 0.0) && approx_eq(f.b, 0.0) {
                    return Some(g);
                }
                if self.is_terminal_id(g.id) && approx_eq(g.c, 0.0) && approx_eq(g.b, 0.0) {
                    return Some(f);
                }
                None
            }
            Op::Minus if f == g => Some(self.get_constant(0.0)),
            _ => None,
        }
    }

    fn apply_rec(&mut self, f: AadRef, g: AadRef, op: Op) -> AadRef {
        if let Some(result) = self.algebraic_shortcut(f, g, op) {
            return result;
        }
        let key = CacheKey::aadd(op, (f.c, f.b, f.id), (g.c, g.b, g.id));
        if let Some(cached) = self.cache.get(&key) {
            let (c, b, id) = cached.as_aadd();
            return AadRef { c, b, id };
        }
        let result = if self.is_terminal_id(f.id) && self.is_terminal_id(g.id) {
            let value = op.eval(f.c * 1.0 + f.b, g.c * 1.0 + g.b);
            self.get_constant(value)
        } else {
            let lvl_f = self.level_of_ref(f);
            let lvl_g = self.level_of_ref(g);
            let lvl = lvl_f.min(lvl_g);
            let var = self.order.var_at(lvl);
            let (f_lo, f_hi) = if lvl_f == lvl { self.children_of_ref(f) } else { (f, f) };
            let (g_lo, g_hi) = if lvl_g == lvl { self.children_of_ref(g) } else { (g, g) };
            let low = self.apply_rec(f_lo, g_lo, op);
            let high = self.apply_rec(f_hi, g_hi, op);
            self.mk(var, low, high)
        };
        self.cache.insert(key, CacheValue::aadd(result.c, result.b, result.id));
        result
    }

    // ---- restrict -----------------------------------------------------------

    pub fn restrict(&mut self, f: AadRef, var_id: u32, value: bool) -> DdResult<AadRef> {
        self.check_owned(f.id)?;
        let target_level = self.order.level_of(var_id);
        Ok(self.restrict_rec(f, target_level, value))
    }

    fn restrict_rec(&mut self, f: AadRef, target_level: u32, value: bool) -> AadRef {
        if self.is_terminal_id(f.id) {
            return f;
        }
        let lvl = self.level_of_ref(f);
        if lvl > target_level {
            return f;
        }
        if lvl == target_level {
            let (low, high) = self.children_of_ref(f);
            return if value { high } else { low };
        }
        let (low, high) = self.children_of_ref(f);
        let var = match self.node(f.id) {
            AadNode::Internal { var, .. } => *var,
            AadNode::Terminal => unreachable!(),
        };
        let new_low = self.restrict_rec(low, target_level, value);
        let new_high = self.restrict_rec(high, target_level, value);
        self.mk(var, new_low, new_high)
    }

    // ---- bounds ---------------------------------------------------------------

    /// Symbolic bounds via the node's affine factors (§4.3): the min/max of the
    /// unscaled sub-function are cached per node id, and the outer reference's
    /// `(c, b)` is folded in at the call site (flipping min/max when `c < 0`,
    /// though `c` is always non-negative by construction here).
    pub fn min_value(&mut self, r: AadRef) -> DdResult<f64> {
        self.check_owned(r.id)?;
        Ok(self.outer_bounds(r).0)
    }

    pub fn max_value(&mut self, r: AadRef) -> DdResult<f64> {
        self.check_owned(r.id)?;
        Ok(self.outer_bounds(r).1)
    }

    /// Applies a reference's own `(c, b)` to its node's unscaled bounds. `c` is
    /// always non-negative for edges internal to the diagram, but an outer
    /// reference built from a subtracting `apply` (e.g. `x - y`) can carry a
    /// negative `c`, which flips which endpoint is the minimum.
    fn outer_bounds(&mut self, r: AadRef) -> (f64, f64) {
        let (lo, hi) = self.bounds_rec(r.id);
        let at_lo = r.c * lo + r.b;
        let at_hi = r.c * hi + r.b;
        (at_lo.min(at_hi), at_lo.max(at_hi))
    }

    /// Bounds of the *unscaled* function at `id` (i.e. as if referenced by
    /// `(1.0, 0.0, id)`), cached per node id since the node's own shape is fixed.
    fn bounds_rec(&mut self, id: NodeId) -> (f64, f64) {
        if let Some(&cached) = self.min_cache.get(&id) {
            return cached;
        }
        let result = match self.node(id) {
            AadNode::Terminal => (1.0, 1.0),
            AadNode::Internal { low, high, .. } => {
                let (low, high) = (*low, *high);
                let (lo_lo, lo_hi) = self.bounds_rec(low.id);
                let (hi_lo, hi_hi) = self.bounds_rec(high.id);
                let low_min = low.c * lo_lo + low.b;
                let low_max = low.c * lo_hi + low.b;
                let high_min = high.c * hi_lo + high.b;
                let high_max = high.c * hi_hi + high.b;
                (low_min.min(high_min), low_max.max(high_max))
            }
        };
        self.min_cache.insert(id, result);
        result
    }

    /// Full evaluation under a complete assignment; used by tests to check the
    /// "equal modulo reference affine factors" structural invariant and the
    /// algebraic laws.
    pub fn eval(&self, r: AadRef, assignment: &HashMap<u32, bool>) -> f64 {
        r.c * self.eval_unscaled(r.id, assignment) + r.b
    }

    fn eval_unscaled(&self, id: NodeId, assignment: &HashMap<u32, bool>) -> f64 {
        match self.node(id) {
            AadNode::Terminal => 1.0,
            AadNode::Internal { var, low, high } => {
                let b = *assignment
                    .get(var)
                    .unwrap_or_else(|| panic!("assignment missing variable {}", var));
                let edge = if b { *high } else { *low };
                edge.c * self.eval_unscaled(edge.id, assignment) + edge.b
            }
        }
    }

    // ---- pruning --------------------------------------------------------------

    pub fn prune_nodes(&mut self, r: AadRef) -> DdResult<AadRef> {
        self.check_owned(r.id)?;
        let info = self.prune_info.expect("prune_nodes called before set_prune_info");
        let lo = self.min_value(r).unwrap();
        let hi = self.max_value(r).unwrap();
        if info.collapses(lo, hi) {
            return Ok(self.get_constant(info.replacement_value(lo, hi)));
        }
        if self.is_terminal_id(r.id) {
            return Ok(r);
        }
        let mut memo = HashMap::new();
        Ok(self.prune_rec(r, &info, &mut memo))
    }

    fn prune_rec(&mut self, r: AadRef, info: &PruneInfo, memo: &mut HashMap<(u64, u64, NodeId), AadRef>) -> AadRef {
        if let Some(&cached) = memo.get(&r.bits()) {
            return cached;
        }
        let result = if self.is_terminal_id(r.id) {
            r
        } else {
            let lo = self.min_value(r).unwrap();
            let hi = self.max_value(r).unwrap();
            if info.collapses(lo, hi) {
                self.get_constant(info.replacement_value(lo, hi))
            } else {
                let (low, high) = self.children_of_ref(r);
                let var = match self.node(r.id) {
                    AadNode::Internal { var, .. } => *var,
                    AadNode::Terminal => unreachable!(),
                };
                let new_low = self.prune_rec(low, info, memo);
                let new_high = self.prune_rec(high, info, memo);
                self.mk(var, new_low, new_high)
            }
        };
        memo.insert(r.bits(), result);
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
    /// unregisters `id` automatically when dropped. See
    /// [`crate::add::AddStore::add_special_node_guarded`] for when to prefer
    /// this over the raw pair.
    pub fn add_special_node_guarded(&mut self, id: NodeId) -> NodeGuard {
        NodeGuard::new(id, self.specials.clone())
    }

    // ---- cache & GC ---------------------------------------------------------

    pub fn flush_caches(&mut self, also_rebuild_hash_cons: bool) {
        log::debug!("flushing AADD store (rebuild hash-cons = {})", also_rebuild_hash_cons);
        self.cache.clear();
        self.min_cache.clear();

        let mut reachable = std::collections::HashSet::new();
        reachable.insert(self.terminal);
        let mut stack: Vec<NodeId> = self.specials.borrow().roots().collect();
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            if let AadNode::Internal { low, high, .. } = self.node(id) {
                stack.push(low.id);
                stack.push(high.id);
            }
        }

        for index in 0..self.nodes.len() {
            let id = NodeId::new(index as u32, self.tag);
            if id == self.terminal {
                continue;
            }
            if self.nodes[index].is_some() && !reachable.contains(&id) {
                self.nodes[index] = None;
                self.free_list.push(index as u32);
            }
        }

        self.internal_index.retain(|_, &mut id| self.nodes[id.index()].is_some());

        if also_rebuild_hash_cons {
            self.internal_index.clear();
            for (index, slot) in self.nodes.iter().enumerate() {
                if let Some(AadNode::Internal { var, low, high }) = slot {
                    let id = NodeId::new(index as u32, self.tag);
                    self.internal_index.insert((*var, low.bits(), high.bits()), id);
                }
            }
        }
    }

    // ---- diagnostics --------------------------------------------------------

    pub fn count_exact_nodes(&self, r: AadRef) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![r.id];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if let AadNode::Internal { low, high, .. } = self.node(cur) {
                stack.push(low.id);
                stack.push(high.id);
            }
        }
        seen.len()
    }

    pub fn print_node(&self, id: NodeId) -> String {
        match self.node(id) {
            AadNode::Terminal => format!("[{}] terminal", id.index),
            AadNode::Internal { var, low, high } => format!(
                "[{}] var={} low=({:.4},{:.4},[{}]) high=({:.4},{:.4},[{}])",
                id.index, var, low.c, low.b, low.id.index, high.c, high.b, high.id.index
            ),
        }
    }

    pub fn to_dot(&self, r: AadRef) -> String {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![r.id];
        let mut out = String::from("digraph G {\n");
        out.push_str("init__ [label=\"\", style=invis, height=0, width=0];\n");
        out.push_str(&format!("init__ -> n{} [label=\"c={:.4},b={:.4}\"];\n", r.id.index, r.c, r.b));
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            match self.node(cur) {
                AadNode::Terminal => {
                    out.push_str(&format!(
                        "n{}[shape=box, label=\"1\", style=filled, height=0.3, width=0.3];\n",
                        cur.index
                    ));
                }
                AadNode::Internal { var, low, high } => {
                    out.push_str(&format!("n{}[label=\"x{}\"];\n", cur.index, var));
                    out.push_str(&format!(
                        "n{} -> n{} [style=filled, label=\"{:.2},{:.2}\"];\n",
                        cur.index, high.id.index, high.c, high.b
                    ));
                    out.push_str(&format!(
                        "n{} -> n{} [style=dotted, label=\"{:.2},{:.2}\"];\n",
                        cur.index, low.id.index, low.c, low.b
                    ));
                    stack.push(low.id);
                    stack.push(high.id);
                }
            }
        }
        out.push_str("}\n");
        out
    }
}
