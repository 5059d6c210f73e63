//! The primary DD propagator (§4.6): folds freshly instantiated host variables
//! into the AADD root by multiplying in the variable's indicator, then shaves
//! the remaining unseen variables by testing `apply(r, idNotX[k]/idX[k], PROD)`
//! against zero.

use crate::aadd::{AadRef, AadStore};
use crate::host::{BoolVar, Contradiction, Domains, Restorer};
use crate::ops::{Op, EPS};
use crate::propagator::PropagatorState;

/// A DD-based propagator over an [`AadStore`]. Represents the constraint
/// "`r` evaluates to 1 under the current partial assignment" (§4.6 contract).
pub struct DdPropagator {
    vars: Vec<BoolVar>,
    r: AadRef,
    seen: Vec<bool>,
    id_x: Vec<AadRef>,
    id_not_x: Vec<AadRef>,
    state: PropagatorState,
}

impl DdPropagator {
    /// Posts a propagator over `root`, whose variable order must match `vars`
    /// index-for-index (DD variable id `k` corresponds to `vars[k]`). Registers
    /// `root` as a special node; the caller must not anchor it separately.
    pub fn new(store: &mut AadStore, vars: Vec<BoolVar>, root: AadRef) -> DdPropagator {
        store.add_special_node(root.id);
        // id_x/id_not_x are persistent state read by every future shave, not
        // scratch results — anchor them so a `flush_caches` triggered by
        // another propagation (or this one's own step 4) never reclaims them.
        let id_x: Vec<AadRef> = (0..vars.len() as u32).map(|k| store.indicator(k)).collect();
        let id_not_x: Vec<AadRef> = (0..vars.len() as u32).map(|k| store.get_var(k, 1.0, 0.0)).collect();
        for r in id_x.iter().chain(id_not_x.iter()) {
            store.add_special_node(r.id);
        }
        let n = vars.len();
        DdPropagator {
            vars,
            r: root,
            seen: vec![false; n],
            id_x,
            id_not_x,
            state: PropagatorState::Idle,
        }
    }

    pub fn state(&self) -> PropagatorState {
        self.state
    }

    pub fn root(&self) -> AadRef {
        self.r
    }

    /// Runs propagation to a fixed point (§4.6, single call, but iterated
    /// internally until nothing new is acknowledged or shaved).
    pub fn propagate(&mut self, store: &mut AadStore, domains: &mut Domains) -> Result<(), Contradiction> {
        log::trace!("AADD propagator: Idle -> Propagating");
        self.state = PropagatorState::Propagating;
        match self.propagate_inner(store, domains) {
            Ok(()) => {
                let min = store.min_value(self.r).expect("propagator root must belong to its store");
                self.state = if min >= 1.0 - EPS {
                    PropagatorState::Entailed
                } else {
                    PropagatorState::Idle
                };
                log::trace!("AADD propagator: Propagating -> {:?}", self.state);
                Ok(())
            }
            Err(e) => {
                log::debug!("AADD propagator contradiction at root {:?}", self.r.id);
                self.state = PropagatorState::Failed;
                Err(e)
            }
        }
    }

    fn propagate_inner(&mut self, store: &mut AadStore, domains: &mut Domains) -> Result<(), Contradiction> {
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

    /// Multiplies `x_k`'s (or `1-x_k`'s) indicator into `r`, trailing the
    /// change. Anchoring is folded into the trail transaction per the resolved
    /// policy in the design notes: the new root is registered special before
    /// the restorer is pushed, and the restorer un-registers whichever root is
    /// current and re-registers the one it restores — so a flush can never
    /// observe a root that is live but unanchored.
    fn fold_variable(
        &mut self,
        store: &mut AadStore,
        domains: &mut Domains,
        k: usize,
        value: bool,
    ) -> Result<(), Contradiction> {
        let old_root = self.r;
        let factor = if value { self.id_x[k] } else { self.id_not_x[k] };
        let new_root = store.apply(self.r, factor, Op::Prod).expect("apply over one store's own refs cannot fail");

        if new_root == old_root {
            // The variable was already folded in by construction (e.g. it does
            // not appear below `r` at all); nothing to re-anchor, only `seen`
            // needs to flip back on backtrack.
            domains.save(Restorer::ClearSeen { var_index: k });
        } else {
            store.add_special_node(new_root.id);
            domains.save(Restorer::RestoreRoot {
                var_index: k,
                old_root: old_root.id,
                old_c: old_root.c,
                old_b: old_root.b,
            });
            store.remove_special_node(old_root.id);
            self.r = new_root;
        }
        self.seen[k] = true;

        if store.max_value(self.r).expect("propagator root must belong to its store") <= EPS {
            return Err(Contradiction);
        }
        Ok(())
    }

    /// The shaving loop (§4.6 step 3): for each unseen variable, test both
    /// values against zero via a scratch `apply`. Scratch results are never
    /// anchored; they live only until the next `flush_caches`.
    fn shave(&mut self, store: &mut AadStore, domains: &mut Domains) -> Result<bool, Contradiction> {
        let mut forced = false;
        for k in 0..self.vars.len() {
            if self.seen[k] {
                continue;
            }
            let t0 = store.apply(self.r, self.id_not_x[k], Op::Prod).expect("apply cannot fail here");
            if store.max_value(t0).expect("t0 belongs to this store") <= EPS {
                domains.instantiate_to(self.vars[k], true)?;
                forced = true;
                continue;
            }
            let t1 = store.apply(self.r, self.id_x[k], Op::Prod).expect("apply cannot fail here");
            if store.max_value(t1).expect("t1 belongs to this store") <= EPS {
                domains.instantiate_to(self.vars[k], false)?;
                forced = true;
            }
        }
        Ok(forced)
    }

    /// Applies one trail restorer produced by this propagator. The host's
    /// `Domains::backtrack_to` calls this, in reverse trail order, for every
    /// record at a world strictly greater than the target.
    pub fn apply_restorer(&mut self, store: &mut AadStore, restorer: Restorer) {
        match restorer {
            Restorer::RestoreRoot { var_index, old_root, old_c, old_b } => {
                store.add_special_node(old_root);
                store.remove_special_node(self.r.id);
                self.r = AadRef { c: old_c, b: old_b, id: old_root };
                self.seen[var_index] = false;
            }
            Restorer::ClearSeen { var_index } => {
                self.seen[var_index] = false;
            }
        }
        self.state = PropagatorState::Idle;
    }
}
