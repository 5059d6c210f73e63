use crate::node_id::NodeId;

/// Engine-level failures: everything in here indicates a caller bug (a foreign or
/// stale node id) except [`DdError::DivisionByZero`], which is a genuine runtime
/// condition a caller can trigger with a legitimate DD.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DdError {
    /// The id does not belong to this store's arena at all.
    #[error("node id {0:?} is not known to this store")]
    UnknownNodeId(NodeId),

    /// The id belongs to a different store instance (different `store_tag`).
    #[error("node id {0:?} was built by a different store")]
    ForeignNodeId(NodeId),

    /// `applyBinary(f, g, DIV)` where `g` contains a terminal zero reachable
    /// under some assignment.
    #[error("division by a DD containing terminal zero")]
    DivisionByZero,

    /// An internal-only paranoia check: a node about to be inserted into the
    /// hash-cons table has identical low and high children, which the
    /// redundant-node elimination rule in `getInternal`/`mk` should have
    /// caught before allocation ever happens. Never observed in practice —
    /// surfaced only via `debug_assert!` at the construction sites, never
    /// returned from a public entry point — but kept as a named variant so
    /// the invariant it guards is spelled out rather than a bare `assert!`
    /// with an inline string.
    #[error("internal bug: node for var {0} would have identical low and high children")]
    LowHighEqualAfterReduction(u32),
}

pub type DdResult<T> = Result<T, DdError>;
