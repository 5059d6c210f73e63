//! Small demo wiring the AADD engine, a propagator, and the in-crate host
//! harness together: the domain-encoding scenario from the component design
//! (§8 scenario 5), `x in [1,5]` encoded as `x = 1 + b0 + 2*b1 + 4*b2` with
//! `x <= 5` posted as a constraint over the three bits.
//!
//! This is illustrative only; the engine and propagator are libraries, not a
//! CLI (§6 "CLI / environment: None for the core").

use dd_propagator::aadd::AadStore;
use dd_propagator::host::{BoolVar, Domains};
use dd_propagator::ops::Op;
use dd_propagator::order::VariableOrder;
use dd_propagator::propagator::DdPropagator;

fn main() {
    let mut store = AadStore::new(VariableOrder::anonymous(3));
    let b0 = store.indicator(0);
    let b1 = store.indicator(1);
    let b2 = store.indicator(2);

    let two = store.get_constant(2.0);
    let four = store.get_constant(4.0);
    let five = store.get_constant(5.0);

    let b1_scaled = store.apply(b1, two, Op::Prod).unwrap();
    let b2_scaled = store.apply(b2, four, Op::Prod).unwrap();
    let sum = store.apply(store.apply(b0, b1_scaled, Op::Sum).unwrap(), b2_scaled, Op::Sum).unwrap();
    // x = 1 + sum, constraint x <= 5 iff sum <= 4 iff NOT(sum >= 5).
    let overflow = store.apply(sum, five, Op::GreaterEq).unwrap();
    let one = store.get_constant(1.0);
    let g = store.apply(one, overflow, Op::Minus).unwrap();

    let mut domains = Domains::new(3);
    let vars: Vec<BoolVar> = (0..3).map(BoolVar::from_index).collect();
    let mut propagator = DdPropagator::new(&mut store, vars, g);

    propagator.propagate(&mut store, &mut domains).unwrap();
    println!("no assignments: state = {:?}", propagator.state());

    domains.instantiate_to(BoolVar::from_index(2), true).unwrap();
    domains.instantiate_to(BoolVar::from_index(1), true).unwrap();
    match propagator.propagate(&mut store, &mut domains) {
        Ok(()) => println!("b1=1, b2=1: state = {:?}", propagator.state()),
        Err(_) => println!("b1=1, b2=1: infeasible (x >= 7), as expected"),
    }
}
