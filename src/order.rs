/// The level beyond which every terminal node lives, for an order of `len` variables.
///
/// Level `ℓ(v)` of a variable is its position in the declared order; terminals sit
/// one level past the last variable so that "order respected on every edge" can be
/// checked uniformly by comparing levels.
pub fn terminal_level(order_len: usize) -> u32 {
    order_len as u32
}

/// A fixed sequence of positive integer variable identifiers defining the order in
/// which a family of diagrams branches. Shared by every DD built against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableOrder {
    /// `levels[i]` is the level of variable `vars[i]`; since a `VariableOrder` is
    /// simply the sequence itself, the level of `vars[i]` is `i`.
    vars: Vec<u32>,
}

impl VariableOrder {
    /// Build an order from an explicit sequence of variable identifiers. Variables
    /// are assumed distinct; this is a construction-time contract, not re-checked
    /// on every lookup.
    pub fn new(vars: Vec<u32>) -> VariableOrder {
        VariableOrder { vars }
    }

    /// Build an order of `count` anonymous variables numbered `0..count`.
    pub fn anonymous(count: u32) -> VariableOrder {
        VariableOrder { vars: (0..count).collect() }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Level at which terminal nodes live for this order.
    pub fn terminal_level(&self) -> u32 {
        terminal_level(self.vars.len())
    }

    /// Level of a variable id, i.e. its position in the order.
    ///
    /// Panics if the variable id is not part of the order — this is always a
    /// caller bug (the order is fixed at construction time and every variable the
    /// engine touches must have been declared in it).
    pub fn level_of(&self, var_id: u32) -> u32 {
        self.vars
            .iter()
            .position(|&v| v == var_id)
            .unwrap_or_else(|| panic!("variable {} is not part of this order", var_id)) as u32
    }

    /// Variable id occupying a given level. Panics on an out-of-range level for the
    /// same reason as `level_of`.
    pub fn var_at(&self, level: u32) -> u32 {
        self.vars[level as usize]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.vars
    }
}
