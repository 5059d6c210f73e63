use crate::node_id::NodeId;
use crate::ops::Op;
use std::collections::HashMap;

/// Affine edge factor bits, as stored in an AADD cache key. `f64` is not `Eq`/`Hash`,
/// so factors are compared and hashed through their bit pattern — safe here because
/// the only values ever placed in a key are ones the AADD engine itself produced via
/// `mk`, never raw user input.
pub(crate) type Bits = u64;

/// Key shape for the single operation cache shared, at the type level, by both
/// engines. `flushCaches` drops the whole map regardless of which shape is inside.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum CacheKey {
    Add { op: Op, left: NodeId, right: NodeId },
    Aadd {
        op: Op,
        left: (Bits, Bits, NodeId),
        right: (Bits, Bits, NodeId),
    },
}

impl CacheKey {
    /// Build an ADD key, imposing a canonical (smaller-first) ordering on the two
    /// operands for commutative operators so that `apply(f,g,op)` and
    /// `apply(g,f,op)` share one cache entry.
    pub(crate) fn add(op: Op, left: NodeId, right: NodeId) -> CacheKey {
        if op.is_commutative() && cmp_node_id(right, left) {
            CacheKey::Add { op, left: right, right: left }
        } else {
            CacheKey::Add { op, left, right }
        }
    }

    pub(crate) fn aadd(op: Op, left: (f64, f64, NodeId), right: (f64, f64, NodeId)) -> CacheKey {
        let l = (left.0.to_bits(), left.1.to_bits(), left.2);
        let r = (right.0.to_bits(), right.1.to_bits(), right.2);
        if op.is_commutative() && cmp_node_id(r.2, l.2) {
            CacheKey::Aadd { op, left: r, right: l }
        } else {
            CacheKey::Aadd { op, left: l, right: r }
        }
    }
}

fn cmp_node_id(a: NodeId, b: NodeId) -> bool {
    (a.index, a.store_tag) < (b.index, b.store_tag)
}

/// A cached result: either a plain id (ADD) or an affine reference (AADD). Kept as
/// one enum so ADD and AADD share a single map type, matching the key shape above.
#[derive(Clone, Copy)]
pub(crate) enum CacheValue {
    Add(NodeId),
    Aadd(Bits, Bits, NodeId),
}

impl CacheValue {
    pub(crate) fn aadd(c: f64, b: f64, id: NodeId) -> CacheValue {
        CacheValue::Aadd(c.to_bits(), b.to_bits(), id)
    }

    pub(crate) fn as_add(self) -> NodeId {
        match self {
            CacheValue::Add(id) => id,
            CacheValue::Aadd(..) => panic!("operation cache shape mismatch: expected Add entry"),
        }
    }

    pub(crate) fn as_aadd(self) -> (f64, f64, NodeId) {
        match self {
            CacheValue::Aadd(c, b, id) => (f64::from_bits(c), f64::from_bits(b), id),
            CacheValue::Add(_) => panic!("operation cache shape mismatch: expected Aadd entry"),
        }
    }
}

/// Memoization of binary operations, keyed by `(op, left-id, right-id)` (plus
/// affine factors for AADD). `flushCaches` empties it unconditionally: entries
/// never keep a node alive, so a dangling id left behind after a flush is simply
/// dropped along with the rest of the map.
#[derive(Default)]
pub(crate) struct OperationCache {
    entries: HashMap<CacheKey, CacheValue>,
}

impl OperationCache {
    pub(crate) fn new() -> OperationCache {
        OperationCache { entries: HashMap::new() }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.get(key).copied()
    }

    pub(crate) fn insert(&mut self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
