use std::sync::atomic::{AtomicU32, Ordering};

/// Global counter handing out a fresh `store_tag` to every store constructed in the
/// process. Two stores never share a tag, so a [`NodeId`] minted by one store can
/// never be silently accepted by another (the "operations on identifiers from
/// different stores are forbidden" rule from the node store contract).
static NEXT_STORE_TAG: AtomicU32 = AtomicU32::new(1);

pub(crate) fn fresh_store_tag() -> u32 {
    NEXT_STORE_TAG.fetch_add(1, Ordering::Relaxed)
}

/// An opaque handle to a node inside one specific store's arena.
///
/// Identifiers are never meaningful across stores: `index` is a position in the
/// arena and `store_tag` pins it to the store that allocated it. Equality of two
/// `NodeId`s (same index, same tag) implies semantic equality of the sub-function
/// they root.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) store_tag: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, store_tag: u32) -> NodeId {
        NodeId { index, store_tag }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }
}
