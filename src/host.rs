//! A minimal stand-in for the external CP solver collaborator a propagator
//! would normally be posted against: Boolean variables with three-valued
//! domains, a trail, and the handful of operations `DdPropagator` needs.
//! Scaled down from the shape the retrieved Munchkin-style propagator exposes
//! through its `Propagator`/`PropagationContextMut` split — no search
//! procedure, no other constraint kinds, a single event mask.

use thiserror::Error;

/// The host's contradiction signal: raised when a variable would need two
/// different values, or its domain is emptied by `remove_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("host domain contradiction")]
pub struct Contradiction;

/// Three-valued Boolean domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolDomain {
    Unknown,
    True,
    False,
}

/// A handle into a [`Domains`] store. Opaque outside this module beyond
/// equality and the accessors `Domains` exposes for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoolVar(usize);

impl BoolVar {
    /// Wraps a raw variable index. Used by a propagator built directly over
    /// `0..n` DD variable ids rather than variables minted via `new_var`.
    pub fn from_index(index: usize) -> BoolVar {
        BoolVar(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// The single event this harness' propagator cares about: re-run propagation
/// whenever any watched variable's domain changed since the last call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagateMask {
    DomainChanged,
}

/// A trail record produced by `DdPropagator` and replayed, in reverse, on
/// backtrack. A tagged record rather than a boxed closure, per the trail
/// design: `apply_restorer` is the only thing that interprets it.
#[derive(Debug, Clone, Copy)]
pub enum Restorer {
    /// Restores the propagator's root. `old_c`/`old_b` are the affine factors
    /// of the restored reference for the AADD propagator; the ADD propagator
    /// (whose roots are bare node ids) leaves both at `(1.0, 0.0)`.
    RestoreRoot { var_index: usize, old_root: crate::node_id::NodeId, old_c: f64, old_b: f64 },
    ClearSeen { var_index: usize },
}

struct TrailEntry {
    world: usize,
    record: Restorer,
}

/// Owns every Boolean variable's domain plus the trail of assignments and
/// propagator restorers. `world` is the "world index" from §6: `1` is the
/// root, anything greater means backtracking is meaningful.
pub struct Domains {
    values: Vec<BoolDomain>,
    assignment_trail: Vec<(BoolVar, usize)>,
    restorer_trail: Vec<TrailEntry>,
    world: usize,
}

impl Domains {
    pub fn new(num_vars: usize) -> Domains {
        Domains {
            values: vec![BoolDomain::Unknown; num_vars],
            assignment_trail: Vec::new(),
            restorer_trail: Vec::new(),
            world: 1,
        }
    }

    pub fn new_var(&mut self) -> BoolVar {
        self.values.push(BoolDomain::Unknown);
        BoolVar(self.values.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn world(&self) -> usize {
        self.world
    }

    pub fn is_instantiated(&self, var: BoolVar) -> bool {
        self.values[var.0] != BoolDomain::Unknown
    }

    pub fn value(&self, var: BoolVar) -> Option<bool> {
        match self.values[var.0] {
            BoolDomain::Unknown => None,
            BoolDomain::True => Some(true),
            BoolDomain::False => Some(false),
        }
    }

    /// Opens a new backtrackable world; returns the mark to later pass to
    /// [`Domains::backtrack_to`].
    pub fn push_world(&mut self) -> usize {
        self.world += 1;
        self.world
    }

    /// `instantiateTo` from §6: assigns `var` to `value`, or raises
    /// [`Contradiction`] if it was already assigned to the opposite value.
    pub fn instantiate_to(&mut self, var: BoolVar, value: bool) -> Result<(), Contradiction> {
        match self.values[var.0] {
            BoolDomain::Unknown => {
                self.values[var.0] = if value { BoolDomain::True } else { BoolDomain::False };
                self.assignment_trail.push((var, self.world));
                Ok(())
            }
            BoolDomain::True if value => Ok(()),
            BoolDomain::False if !value => Ok(()),
            _ => {
                log::debug!("host contradiction: variable {:?} re-instantiated to opposite value", var);
                Err(Contradiction)
            }
        }
    }

    /// `removeValue` from §6: ruling out `value` forces the variable to the
    /// other one, or raises [`Contradiction`] if it was already the excluded one.
    pub fn remove_value(&mut self, var: BoolVar, value: bool) -> Result<(), Contradiction> {
        self.instantiate_to(var, !value)
    }

    /// Schedules a restorer to run, in LIFO order, when the current world is
    /// unwound past. Mirrors the host trail's `save(restorer)`.
    pub fn save(&mut self, record: Restorer) {
        self.restorer_trail.push(TrailEntry { world: self.world, record });
    }

    /// Unwinds every trail record and every variable assignment made at a
    /// world strictly greater than `mark`, leaving `mark` itself as the
    /// current world. Each propagator-owned restorer is applied to `apply_to`.
    pub fn backtrack_to<F: FnMut(Restorer)>(&mut self, mark: usize, mut apply_to: F) {
        while let Some(entry) = self.restorer_trail.last() {
            if entry.world <= mark {
                break;
            }
            let entry = self.restorer_trail.pop().unwrap();
            apply_to(entry.record);
        }
        while let Some(&(var, world)) = self.assignment_trail.last() {
            if world <= mark {
                break;
            }
            self.assignment_trail.pop();
            self.values[var.0] = BoolDomain::Unknown;
        }
        self.world = mark;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiate_then_backtrack_restores_unknown() {
        let mut domains = Domains::new(2);
        let v = BoolVar(0);
        let mark = domains.push_world();
        domains.instantiate_to(v, true).unwrap();
        assert_eq!(Some(true), domains.value(v));

        domains.backtrack_to(mark - 1, |_| {});
        assert!(!domains.is_instantiated(v));
    }

    #[test]
    fn conflicting_instantiation_is_a_contradiction() {
        let mut domains = Domains::new(1);
        let v = BoolVar(0);
        domains.instantiate_to(v, true).unwrap();
        assert_eq!(Err(Contradiction), domains.instantiate_to(v, false));
    }

    #[test]
    fn remove_value_forces_the_other_one() {
        let mut domains = Domains::new(1);
        let v = BoolVar(0);
        domains.remove_value(v, false).unwrap();
        assert_eq!(Some(true), domains.value(v));
    }
}
