//! Reduced ordered decision diagrams (ADD and AADD) and a trail-based
//! constraint propagator built on top of them.
//!
//! [`add`] and [`aadd`] are the two node stores (§4.2, §4.3): arenas of
//! hash-consed nodes with a shared `apply`/`restrict`/bounds/pruning surface.
//! [`propagator`] folds a store's root into a host search's trail, proving
//! values of instantiated variables inconsistent against the diagram
//! ("shaving", §4.6). [`host`] is the minimal in-crate stand-in for the
//! external CP solver collaborator (§4.7) that makes the propagator runnable
//! and testable on its own.

pub mod aadd;
pub mod add;
mod cache;
pub mod error;
pub mod host;
pub mod node_id;
pub mod ops;
pub mod order;
pub mod propagator;
pub mod prune;
mod special;

pub use special::NodeGuard;
