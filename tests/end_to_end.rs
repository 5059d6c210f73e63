//! End-to-end scenarios crossing store + propagator + host module
//! boundaries (§8). Unit-level structural/algebraic checks live in each
//! module's own `#[cfg(test)]` block instead.

use dd_propagator::aadd::AadStore;
use dd_propagator::add::AddStore;
use dd_propagator::host::{BoolVar, Domains};
use dd_propagator::ops::Op;
use dd_propagator::order::VariableOrder;
use dd_propagator::propagator::{AddPropagator, DdPropagator, PropagatorState};
use dd_propagator::prune::{PruneInfo, PruneMode};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sum_of_five_add(store: &mut AddStore) -> dd_propagator::node_id::NodeId {
    let mut acc = store.get_constant(0.0);
    for v in 1..=5u32 {
        let ind = store.indicator(v);
        acc = store.apply(acc, ind, Op::Sum).unwrap();
    }
    acc
}

fn sum_of_five_aadd(store: &mut AadStore) -> dd_propagator::aadd::AadRef {
    let mut acc = store.get_constant(0.0);
    for v in 1..=5u32 {
        let ind = store.indicator(v);
        acc = store.apply(acc, ind, Op::Sum).unwrap();
    }
    acc
}

#[test]
fn scenario_1_sum_indicator_bounds_and_size() {
    init_log();
    let mut add_store = AddStore::new(VariableOrder::anonymous(10));
    let f_add = sum_of_five_add(&mut add_store);
    assert_eq!(0.0, add_store.min_value(f_add).unwrap());
    assert_eq!(5.0, add_store.max_value(f_add).unwrap());
    assert_eq!(21, add_store.count_exact_nodes(f_add));

    let mut aadd_store = AadStore::new(VariableOrder::anonymous(10));
    let f_aadd = sum_of_five_aadd(&mut aadd_store);
    assert_eq!(0.0, aadd_store.min_value(f_aadd).unwrap());
    assert_eq!(5.0, aadd_store.max_value(f_aadd).unwrap());
    assert!(aadd_store.count_exact_nodes(f_aadd) < add_store.count_exact_nodes(f_add));
}

#[test]
fn scenario_2_threshold() {
    init_log();
    let mut store = AddStore::new(VariableOrder::anonymous(10));
    let f = sum_of_five_add(&mut store);
    let three = store.get_constant(3.0);
    let g = store.apply(f, three, Op::GreaterEq).unwrap();

    let mut two_ones: std::collections::HashMap<u32, bool> = (0..10u32).map(|v| (v, false)).collect();
    two_ones.insert(1, true);
    two_ones.insert(2, true);
    assert_eq!(0.0, store.eval(g, &two_ones));

    two_ones.insert(3, true);
    assert_eq!(1.0, store.eval(g, &two_ones));
}

#[test]
fn scenario_3_prune_lower_bound() {
    init_log();
    let mut store = AddStore::new(VariableOrder::anonymous(10));
    let f = sum_of_five_add(&mut store);
    store.set_prune_info(PruneInfo::new(PruneMode::Min, 2.0));
    let lb = store.prune_nodes(f).unwrap();

    let all_ones: std::collections::HashMap<u32, bool> = (0..10u32).map(|v| (v, v >= 1 && v <= 5)).collect();
    assert!(store.eval(lb, &all_ones) <= 5.0);

    let all_zeros: std::collections::HashMap<u32, bool> = (0..10u32).map(|v| (v, false)).collect();
    assert!(store.eval(lb, &all_zeros) <= 0.0);
}

#[test]
fn scenario_4_over_relaxed_comparison() {
    init_log();
    let mut store = AddStore::new(VariableOrder::anonymous(10));
    let f = sum_of_five_add(&mut store);
    store.set_prune_info(PruneInfo::new(PruneMode::Max, 2.0));
    let ub = store.prune_nodes(f).unwrap();
    let three = store.get_constant(3.0);
    let g_over = store.apply(ub, three, Op::GreaterEq).unwrap();

    let all_ones: std::collections::HashMap<u32, bool> = (0..10u32).map(|v| (v, v >= 1 && v <= 5)).collect();
    assert_eq!(1.0, store.eval(g_over, &all_ones));
}

#[test]
fn scenario_5_domain_encoding_via_aadd_propagator() {
    init_log();
    // x in [1,5] as x = 1 + b0 + 2*b1 + 4*b2, posted as x <= 5.
    let mut store = AadStore::new(VariableOrder::anonymous(3));
    let b0 = store.indicator(0);
    let b1 = store.indicator(1);
    let b2 = store.indicator(2);
    let two = store.get_constant(2.0);
    let four = store.get_constant(4.0);
    let five = store.get_constant(5.0);
    let one = store.get_constant(1.0);

    let b1_scaled = store.apply(b1, two, Op::Prod).unwrap();
    let b2_scaled = store.apply(b2, four, Op::Prod).unwrap();
    let sum = store.apply(store.apply(b0, b1_scaled, Op::Sum).unwrap(), b2_scaled, Op::Sum).unwrap();
    let overflow = store.apply(sum, five, Op::GreaterEq).unwrap();
    let g = store.apply(one, overflow, Op::Minus).unwrap();

    let mut domains = Domains::new(3);
    let vars: Vec<BoolVar> = (0..3).map(BoolVar::from_index).collect();
    let mut propagator = DdPropagator::new(&mut store, vars, g);

    propagator.propagate(&mut store, &mut domains).unwrap();
    assert!(!domains.is_instantiated(BoolVar::from_index(0)));
    assert!(!domains.is_instantiated(BoolVar::from_index(1)));
    assert!(!domains.is_instantiated(BoolVar::from_index(2)));

    domains.instantiate_to(BoolVar::from_index(2), true).unwrap();
    domains.instantiate_to(BoolVar::from_index(1), true).unwrap();
    let result = propagator.propagate(&mut store, &mut domains);
    assert!(result.is_err());
    assert_eq!(PropagatorState::Failed, propagator.state());
}

#[test]
fn scenario_6_backtracking_restores_root_and_seen() {
    init_log();
    // OR(x0, x1): stays satisfiable after folding x0=false, so the fold
    // actually changes the root instead of failing outright.
    let mut store = AadStore::new(VariableOrder::anonymous(2));
    let x0 = store.indicator(0);
    let x1 = store.indicator(1);
    let f = store.apply(x0, x1, Op::Max).unwrap();
    let mut domains = Domains::new(2);
    let vars: Vec<BoolVar> = (0..2).map(BoolVar::from_index).collect();
    let mut propagator = DdPropagator::new(&mut store, vars, f);

    let root_before = propagator.root();
    let mark = domains.push_world();
    domains.instantiate_to(BoolVar::from_index(0), false).unwrap();
    propagator.propagate(&mut store, &mut domains).unwrap();
    assert_ne!(root_before, propagator.root());

    domains.backtrack_to(mark - 1, |record| propagator.apply_restorer(&mut store, record));
    assert_eq!(root_before, propagator.root());
    assert!(!domains.is_instantiated(BoolVar::from_index(0)));

    let r_before_second = propagator.root();
    propagator.propagate(&mut store, &mut domains).unwrap();
    assert_eq!(r_before_second, propagator.root());
}

#[test]
fn scenario_5_add_variant_matches_aadd_variant() {
    init_log();
    let mut store = AddStore::new(VariableOrder::anonymous(3));
    let b0 = store.indicator(0);
    let b1 = store.indicator(1);
    let b2 = store.indicator(2);
    let two = store.get_constant(2.0);
    let four = store.get_constant(4.0);

    let b1_scaled = store.apply(b1, two, Op::Prod).unwrap();
    let b2_scaled = store.apply(b2, four, Op::Prod).unwrap();
    let sum = store.apply(store.apply(b0, b1_scaled, Op::Sum).unwrap(), b2_scaled, Op::Sum).unwrap();
    let four_const = store.get_constant(4.0);
    let g = store.apply(sum, four_const, Op::LessEq).unwrap();

    let mut domains = Domains::new(3);
    let vars: Vec<BoolVar> = (0..3).map(BoolVar::from_index).collect();
    let mut propagator = AddPropagator::new(&mut store, vars, g);

    propagator.propagate(&mut store, &mut domains).unwrap();
    domains.instantiate_to(BoolVar::from_index(2), true).unwrap();
    domains.instantiate_to(BoolVar::from_index(1), true).unwrap();
    let result = propagator.propagate(&mut store, &mut domains);
    assert!(result.is_err());
}
