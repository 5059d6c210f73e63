use crate::node_id::NodeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Reference-counted set of root anchors ("special nodes"). A node registered `N`
/// times must be removed `N` times before it becomes eligible for collection by
/// `flushCaches`.
#[derive(Default)]
pub(crate) struct SpecialSet {
    counts: HashMap<NodeId, u32>,
}

impl SpecialSet {
    pub(crate) fn new() -> SpecialSet {
        SpecialSet { counts: HashMap::new() }
    }

    pub(crate) fn add(&mut self, id: NodeId) {
        *self.counts.entry(id).or_insert(0) += 1;
    }

    /// Removes one reference. Panics if `id` was not special — mirroring the
    /// engine's "fatal on caller bug" error policy, since this only happens if a
    /// root was unregistered more times than it was registered.
    pub(crate) fn remove(&mut self, id: NodeId) {
        match self.counts.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.counts.remove(&id);
            }
            None => panic!("removeSpecialNode called on a node that is not special: {:?}", id),
        }
    }

    pub(crate) fn is_special(&self, id: NodeId) -> bool {
        self.counts.contains_key(&id)
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.counts.keys().copied()
    }
}

/// Shared handle to one store's special-node set, so a [`NodeGuard`] can
/// de-anchor its node on drop without holding a `&mut` borrow of the whole
/// store. Every `AddStore`/`AadStore` owns one of these and hands out clones
/// to the guards it mints.
pub(crate) type SharedSpecialSet = Rc<RefCell<SpecialSet>>;

pub(crate) fn new_shared() -> SharedSpecialSet {
    Rc::new(RefCell::new(SpecialSet::new()))
}

/// RAII root anchor: registers `id` as special on construction and
/// unregisters it on drop, so a lexically-scoped root never needs a matching
/// hand-written `removeSpecialNode` call. Cloning re-registers the same id
/// (the refcount semantics `addSpecialNode`/`removeSpecialNode` already
/// have), so two guards for the same id behave exactly like two manual
/// registrations.
///
/// Not a replacement for the raw `add_special_node`/`remove_special_node`
/// pair: a propagator's root changes at points that are not lexically nested
/// (folded in at `propagate`, restored from a trail record possibly several
/// stack frames away), which a guard's destructor cannot express. Use the raw
/// pair there; use `NodeGuard` for a root held for one straightforward scope.
pub struct NodeGuard {
    id: NodeId,
    specials: SharedSpecialSet,
}

impl NodeGuard {
    pub(crate) fn new(id: NodeId, specials: SharedSpecialSet) -> NodeGuard {
        specials.borrow_mut().add(id);
        NodeGuard { id, specials }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Clone for NodeGuard {
    fn clone(&self) -> NodeGuard {
        self.specials.borrow_mut().add(self.id);
        NodeGuard { id: self.id, specials: self.specials.clone() }
    }
}

impl std::fmt::Debug for NodeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGuard").field("id", &self.id).finish()
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        self.specials.borrow_mut().remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_anchors_on_construction_and_releases_on_drop() {
        let specials = new_shared();
        let id = NodeId::new(0, 1);
        {
            let guard = NodeGuard::new(id, specials.clone());
            assert!(specials.borrow().is_special(guard.id()));
        }
        assert!(!specials.borrow().is_special(id));
    }

    #[test]
    fn cloned_guard_keeps_node_anchored_until_both_drop() {
        let specials = new_shared();
        let id = NodeId::new(0, 1);
        let guard = NodeGuard::new(id, specials.clone());
        let cloned = guard.clone();
        drop(guard);
        assert!(specials.borrow().is_special(id));
        drop(cloned);
        assert!(!specials.borrow().is_special(id));
    }
}
