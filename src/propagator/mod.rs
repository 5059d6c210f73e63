//! Propagators that fold a decision diagram's root into a host CP solver's
//! trail, proving values of instantiated variables consistent or inconsistent
//! ("shaving") against the diagram.

pub mod add_propagator;
pub mod dd_propagator;

/// Lifecycle of a posted propagator (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatorState {
    Unposted,
    Idle,
    Propagating,
    Entailed,
    Failed,
}

pub use add_propagator::AddPropagator;
pub use dd_propagator::DdPropagator;
