/// Binary operators understood by `applyBinary` / AADD `apply`.
///
/// Comparisons (`Greater` .. `NotEq`) always produce a 0/1-valued result.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Op {
    Sum,
    Minus,
    Prod,
    Div,
    Min,
    Max,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Eq,
    NotEq,
}

impl Op {
    /// `true` for operators whose result is always 0/1, i.e. comparisons.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Op::Greater | Op::GreaterEq | Op::Less | Op::LessEq | Op::Eq | Op::NotEq
        )
    }

    /// `true` for operators where `apply(f, g, op) == apply(g, f, op)` for every
    /// `f`, `g` — used to impose a canonical (left, right) ordering on cache keys.
    pub fn is_commutative(self) -> bool {
        matches!(self, Op::Sum | Op::Prod | Op::Min | Op::Max | Op::Eq | Op::NotEq)
    }

    /// Evaluate the operator on two concrete terminal values.
    pub fn eval(self, l: f64, r: f64) -> f64 {
        match self {
            Op::Sum => l + r,
            Op::Minus => l - r,
            Op::Prod => l * r,
            Op::Div => l / r,
            Op::Min => l.min(r),
            Op::Max => l.max(r),
            Op::Greater => bool_val(l > r),
            Op::GreaterEq => bool_val(l >= r),
            Op::Less => bool_val(l < r),
            Op::LessEq => bool_val(l <= r),
            Op::Eq => bool_val(approx_eq(l, r)),
            Op::NotEq => bool_val(!approx_eq(l, r)),
        }
    }
}

fn bool_val(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Relative tolerance used everywhere two terminal values are compared for
/// canonicalization purposes (node store invariant 5).
pub const EPS: f64 = 1e-10;

/// Relative-tolerance equality used for terminal hash-consing.
pub fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= EPS * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons_are_the_only_zero_one_operators() {
        for op in [Op::Greater, Op::GreaterEq, Op::Less, Op::LessEq, Op::Eq, Op::NotEq] {
            assert!(op.is_comparison());
        }
        for op in [Op::Sum, Op::Minus, Op::Prod, Op::Div, Op::Min, Op::Max] {
            assert!(!op.is_comparison());
        }
    }

    #[test]
    fn commutative_ops_match_spec_list() {
        assert!(Op::Sum.is_commutative());
        assert!(Op::Prod.is_commutative());
        assert!(!Op::Minus.is_commutative());
        assert!(!Op::Div.is_commutative());
        assert!(!Op::GreaterEq.is_commutative());
    }

    #[test]
    fn approx_eq_honors_relative_tolerance() {
        assert!(approx_eq(1.0, 1.0 + EPS / 2.0));
        assert!(!approx_eq(1.0, 1.1));
        assert!(approx_eq(0.0, 0.0));
    }

    #[test]
    fn eval_matches_expected_arithmetic_and_comparisons() {
        assert_eq!(5.0, Op::Sum.eval(2.0, 3.0));
        assert_eq!(1.0, Op::GreaterEq.eval(3.0, 3.0));
        assert_eq!(0.0, Op::Less.eval(3.0, 3.0));
        assert_eq!(1.0, Op::Eq.eval(1.0, 1.0 + EPS / 2.0));
    }
}
