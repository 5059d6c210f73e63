/// Which bound a pruned sub-diagram collapses to when its error span fits the
/// configured tolerance.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PruneMode {
    /// Replace with `min(sub)` — always a pointwise lower bound of the original.
    Min,
    /// Replace with `max(sub)` — always a pointwise upper bound of the original.
    Max,
    /// Replace with `(min(sub) + max(sub)) / 2` — minimizes worst-case deviation.
    Avg,
}

/// Global pruning configuration set via `setPruneInfo` and consulted by
/// `pruneNodes`.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PruneInfo {
    pub mode: PruneMode,
    pub max_error: f64,
}

impl PruneInfo {
    pub fn new(mode: PruneMode, max_error: f64) -> PruneInfo {
        PruneInfo { mode, max_error }
    }

    /// A sub-diagram whose span `max - min` is within `2 * max_error` may be
    /// collapsed to a single terminal without exceeding the configured error.
    pub(crate) fn collapses(&self, lo: f64, hi: f64) -> bool {
        hi - lo <= 2.0 * self.max_error
    }

    /// The terminal value a collapsed sub-diagram is replaced with.
    pub(crate) fn replacement_value(&self, lo: f64, hi: f64) -> f64 {
        match self.mode {
            PruneMode::Min => lo,
            PruneMode::Max => hi,
            PruneMode::Avg => (lo + hi) / 2.0,
        }
    }
}
