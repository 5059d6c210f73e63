//! The ADD-variant propagator (§4.6 "Alternative propagator"): folds
//! instantiated host variables in via `restrict` instead of `apply`, then
//! proves value consistency with a single depth-first traversal rather than
//! the AADD variant's per-variable double `apply`.

use crate::add::{AddStore, NodeShape};
use crate::host::{BoolVar, Contradiction, Domains, Restorer};
use crate::node_id::NodeId;
use crate::ops::EPS;
use crate::propagator::PropagatorState;
use std::collections::{HashMap, HashSet};

/// A DD-based propagator over an [`AddStore`]. Same entailment contract as
/// [`crate::propagator::DdPropagator`], reached by `restrict` + a support DFS
/// instead of repeated `apply`.
pub struct AddPropagator {
    vars: Vec<BoolVar>,
    r: NodeId,
    seen: Vec<bool>,
    state: PropagatorState,
}

impl AddPropagator {
    pub fn new(store: &mut AddStore, vars: Vec<BoolVar>, root: NodeId) -> AddPropagator {
        store.add_special_node(root);
        let n = vars.len();
        AddPropagator { vars, r: root, seen: vec![false; n], state: PropagatorState::Idle }
    }

    pub fn state(&self) -> PropagatorState {
        self.state
    }

    pub fn root(&self) -> NodeId {
        self.r
    }

    pub fn propagate(&mut self, store: &mut AddStore, domains: &mut Domains) -> Result<(), Contradiction> {
        log::trace!("ADD propagator: Idle -> Propagating");
        self.state = PropagatorState::Propagating;
        match self.propagate_inner(store, domains) {
            Ok(()) => {
                let min = store.min_value(self.r).expect("propagator root must belong to its store");
                self.state = if min >= 1.0 - EPS { PropagatorState::Entailed } else { PropagatorState::Idle };
                log::trace!("ADD propagator: Propagating -> {:?}", self.state);
                Ok(())
            }
            Err(e) => {
                log::debug!("ADD propagator contradiction at root {:?}", self.r);
                self.state = PropagatorState::Failed;
                Err(e)
            }
        }
    }

    fn propagate_inner(&mut self, store: &mut AddStore, domains: &mut Domains) -> Result<(), Contradiction> {
        if store.max_value(self.r).expect("propagator root must belong to its store") <= EPS {
            return Err(Contradiction);
        }
        loop {
            let mut acknowledged = false;
            for k in 0..self.vars.len() {
                if self.seen[k] {
                    continue;
                }
                if let Some(value) = domains.value(self.vars[k]) {
                    self.fold_variable(store, domains, k, value)?;
                    acknowledged = true;
                }
            }
            let forced = self.shave(store, domains)?;
            if !acknowledged && !forced {
                break;
            }
        }
        store.flush_caches(false);
        Ok(())
    }

    /// Restricts `r` at variable `k` to the host's known value. If the
    /// diagram does not depend on `k` at all below the current root,
    /// `restrict` is a no-op (`new_root == r`) and only `seen` needs trailing.
    fn fold_variable(
        &mut self,
        store: &mut AddStore,
        domains: &mut Domains,
        k: usize,
        value: bool,
    ) -> Result<(), Contradiction> {
        let old_root = self.r;
        let new_root = store.restrict(self.r, k as u32, value).expect("restrict over this store's own id cannot fail");

        if new_root == old_root {
            domains.save(Restorer::ClearSeen { var_index: k });
        } else {
            store.add_special_node(new_root);
            domains.save(Restorer::RestoreRoot { var_index: k, old_root, old_c: 1.0, old_b: 0.0 });
            store.remove_special_node(old_root);
            self.r = new_root;
        }
        self.seen[k] = true;

        if store.max_value(self.r).expect("propagator root must belong to its store") <= EPS {
            return Err(Contradiction);
        }
        Ok(())
    }

    /// Single DFS below `r` computing, for every unseen variable still
    /// present in the diagram, whether each of its two values sits on some
    /// path that can still reach a terminal-1. A value with no supporting
    /// path is inconsistent and forced to the other one. Variables that do
    /// not appear below `r` at all are left alone — the function does not
    /// depend on them, so both values remain consistent (this is exactly the
    /// "skipped levels" case the spec calls out).
    fn shave(&mut self, store: &mut AddStore, domains: &mut Domains) -> Result<bool, Contradiction> {
        let mut reach_memo: HashMap<NodeId, bool> = HashMap::new();
        let mut encountered = vec![false; self.vars.len()];
        let mut support0 = vec![false; self.vars.len()];
        let mut support1 = vec![false; self.vars.len()];

        let mut visited = HashSet::new();
        let mut stack = vec![self.r];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let NodeShape::Internal { var, low, high } = store.node_shape(id).expect("node belongs to this store") {
                let k = var as usize;
                if k < self.vars.len() && !self.seen[k] {
                    encountered[k] = true;
                    if can_reach_one(store, low, &mut reach_memo) {
                        support0[k] = true;
                    }
                    if can_reach_one(store, high, &mut reach_memo) {
                        support1[k] = true;
                    }
                }
                stack.push(low);
                stack.push(high);
            }
        }

        let mut forced = false;
        for k in 0..self.vars.len() {
            if self.seen[k] || !encountered[k] {
                continue;
            }
            match (support0[k], support1[k]) {
                (true, true) => {}
                (true, false) => {
                    domains.instantiate_to(self.vars[k], false)?;
                    forced = true;
                }
                (false, true) => {
                    domains.instantiate_to(self.vars[k], true)?;
                    forced = true;
                }
                (false, false) => return Err(Contradiction),
            }
        }
        Ok(forced)
    }

    pub fn apply_restorer(&mut self, store: &mut AddStore, restorer: Restorer) {
        match restorer {
            Restorer::RestoreRoot { var_index, old_root, .. } => {
                store.add_special_node(old_root);
                store.remove_special_node(self.r);
                self.r = old_root;
                self.seen[var_index] = false;
            }
            Restorer::ClearSeen { var_index } => {
                self.seen[var_index] = false;
            }
        }
        self.state = PropagatorState::Idle;
    }
}

/// Whether any terminal reachable from `id` has value `1` (within `ε`).
/// Memoized per node id: a node's own reachability to a terminal-1 never
/// depends on how it was reached, so this is safe to share across every path
/// that visits it.
fn can_reach_one(store: &AddStore, id: NodeId, memo: &mut HashMap<NodeId, bool>) -> bool {
    if let Some(&cached) = memo.get(&id) {
        return cached;
    }
    let result = match store.node_shape(id).expect("node belongs to this store") {
        NodeShape::Terminal(v) => (v - 1.0).abs() < EPS,
        NodeShape::Internal { low, high, .. } => can_reach_one(store, low, memo) || can_reach_one(store, high, memo),
    };
    memo.insert(id, result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Op;
    use crate::order::VariableOrder;

    fn sum_of_five(store: &mut AddStore) -> NodeId {
        let mut acc = store.get_constant(0.0);
        for v in 1..=5u32 {
            let ind = store.indicator(v);
            acc = store.apply(acc, ind, Op::Sum).unwrap();
        }
        acc
    }

    #[test]
    fn domain_encoding_detects_infeasibility() {
        // x = 1 + b0 + 2*b1 + 4*b2, constraint x <= 5, i.e. b0+2b1+4b2 <= 4.
        let mut store = AddStore::new(VariableOrder::anonymous(3));
        let b0 = store.indicator(0);
        let b1 = store.indicator(1);
        let b2 = store.indicator(2);
        let two = store.get_constant(2.0);
        let four = store.get_constant(4.0);
        let b1_scaled = store.apply(b1, two, Op::Prod).unwrap();
        let b2_scaled = store.apply(b2, four, Op::Prod).unwrap();
        let sum01 = store.apply(b0, b1_scaled, Op::Sum).unwrap();
        let sum = store.apply(sum01, b2_scaled, Op::Sum).unwrap();
        let four_const = store.get_constant(4.0);
        let g = store.apply(sum, four_const, Op::LessEq).unwrap();

        let mut domains = Domains::new(3);
        let vars: Vec<BoolVar> = (0..3).map(BoolVar::from_index).collect();
        let mut prop = AddPropagator::new(&mut store, vars, g);

        prop.propagate(&mut store, &mut domains).unwrap();
        assert!(!domains.is_instantiated(BoolVar::from_index(0)));
        assert!(!domains.is_instantiated(BoolVar::from_index(1)));
        assert!(!domains.is_instantiated(BoolVar::from_index(2)));

        domains.instantiate_to(BoolVar::from_index(2), true).unwrap();
        domains.instantiate_to(BoolVar::from_index(1), true).unwrap();
        let result = prop.propagate(&mut store, &mut domains);
        assert!(result.is_err());
    }

    #[test]
    fn backtracking_restores_root_and_seen_bitwise() {
        let mut store = AddStore::new(VariableOrder::anonymous(2));
        let f = store.indicator(0);
        let mut domains = Domains::new(2);
        let vars: Vec<BoolVar> = (0..2).map(BoolVar::from_index).collect();
        let mut prop = AddPropagator::new(&mut store, vars, f);

        let root_before = prop.root();
        let seen_before = prop.seen.clone();

        let mark = domains.push_world();
        domains.instantiate_to(BoolVar::from_index(0), false).unwrap();
        prop.propagate(&mut store, &mut domains).unwrap();
        assert_ne!(root_before, prop.root());

        let propagator = &mut prop;
        domains.backtrack_to(mark - 1, |record| propagator.apply_restorer(&mut store, record));

        assert_eq!(root_before, prop.root());
        assert_eq!(seen_before, prop.seen);
    }

    #[test]
    fn shaving_forces_the_last_variable_when_all_others_are_set() {
        // g is true only when all five of x1..x5 are 1; fixing four of them
        // forces the fifth.
        let mut store = AddStore::new(VariableOrder::anonymous(10));
        let f = sum_of_five(&mut store);
        let five = store.get_constant(5.0);
        let g = store.apply(f, five, crate::ops::Op::GreaterEq).unwrap();

        let mut domains = Domains::new(10);
        let vars: Vec<BoolVar> = (0..10).map(BoolVar::from_index).collect();
        let mut prop = AddPropagator::new(&mut store, vars, g);

        for k in 1..=4 {
            domains.instantiate_to(BoolVar::from_index(k), true).unwrap();
        }
        prop.propagate(&mut store, &mut domains).unwrap();
        assert_eq!(Some(true), domains.value(BoolVar::from_index(5)));
    }
}
