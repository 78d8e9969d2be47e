//! Property-based tests for the universally-quantified invariants of the BDD kernel: canonicity
//! of the unique table, the variable-order invariant on internal nodes, double negation, and the
//! `satcount` inclusion-exclusion identity.

use proptest::prelude::*;

use sharpd::{Engine, EngineConfig, Flavor, Handle};

const NUM_VARS: u32 = 4;
const DOMAIN: [u32; NUM_VARS as usize] = [0, 1, 2, 3];

fn new_engine() -> Engine {
    let config = EngineConfig::builder().workers(1).build().expect("valid config");
    Engine::init(config).expect("engine init")
}

/// Build the DD for the boolean function whose minterm `value` (0..2^NUM_VARS) is true exactly
/// when the corresponding bit of `mask` is set.
fn build_from_mask(engine: &mut Engine, mask: u32) -> Handle {
    let mut dd = engine.dd_false();
    for value in 0..(1u32 << NUM_VARS) {
        if (mask >> value) & 1 == 1 {
            let mut cube = engine.dd_true();
            for (i, &v) in DOMAIN.iter().enumerate() {
                let bit = (value >> (DOMAIN.len() - 1 - i)) & 1 == 1;
                let lit = if bit { engine.ithvar(Flavor::Bdd, v) } else { engine.nithvar(Flavor::Bdd, v) };
                cube = engine.and(Flavor::Bdd, cube, lit);
            }
            dd = engine.or(Flavor::Bdd, dd, cube);
        }
    }
    dd
}

/// Walk every internal node reachable from `dd` and assert its own variable precedes both of its
/// children's variables (§3.1 variable-order invariant), using `nodecount`'s own iterative-stack
/// idiom rather than native recursion.
fn assert_variable_order_respected(engine: &mut Engine, dd: Handle) {
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![dd];
    while let Some(h) = stack.pop() {
        if engine.isleaf(h) || !seen.insert(h.raw()) {
            continue;
        }
        let v = engine.var(h).expect("internal node has a variable");
        let low = engine.low(Flavor::Bdd, h);
        let high = engine.high(Flavor::Bdd, h);
        for child in [low, high] {
            if !engine.isleaf(child) {
                let cv = engine.var(child).expect("internal node has a variable");
                prop_assert_var_order(v, cv);
            }
        }
        stack.push(low);
        stack.push(high);
    }
}

fn prop_assert_var_order(parent: u32, child: u32) {
    assert!(parent < child, "variable order invariant violated: parent var {parent} >= child var {child}");
}

fn mask_strategy() -> impl Strategy<Value = u32> {
    0u32..(1u32 << (1u32 << NUM_VARS))
}

proptest! {
    #[test]
    fn variable_order_is_respected_for_any_function(mask in mask_strategy()) {
        let mut engine = new_engine();
        let dd = build_from_mask(&mut engine, mask);
        assert_variable_order_respected(&mut engine, dd);
    }

    #[test]
    fn same_function_built_two_ways_is_the_identical_handle(mask in mask_strategy()) {
        let mut engine = new_engine();
        let forward = build_from_mask(&mut engine, mask);

        // Rebuild by OR-ing minterms in reverse order: canonicity means the unique table must
        // still land on the same handle regardless of construction order.
        let mut backward = engine.dd_false();
        for value in (0..(1u32 << NUM_VARS)).rev() {
            if (mask >> value) & 1 == 1 {
                let mut cube = engine.dd_true();
                for (i, &v) in DOMAIN.iter().enumerate() {
                    let bit = (value >> (DOMAIN.len() - 1 - i)) & 1 == 1;
                    let lit = if bit { engine.ithvar(Flavor::Bdd, v) } else { engine.nithvar(Flavor::Bdd, v) };
                    cube = engine.and(Flavor::Bdd, cube, lit);
                }
                backward = engine.or(Flavor::Bdd, backward, cube);
            }
        }
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn double_negation_is_identity(mask in mask_strategy()) {
        let mut engine = new_engine();
        let dd = build_from_mask(&mut engine, mask);
        let doubled = engine.not(Flavor::Bdd, engine.not(Flavor::Bdd, dd));
        prop_assert_eq!(dd, doubled);
    }

    #[test]
    fn satcount_obeys_inclusion_exclusion(mask_a in mask_strategy(), mask_b in mask_strategy()) {
        let mut engine = new_engine();
        let a = build_from_mask(&mut engine, mask_a);
        let b = build_from_mask(&mut engine, mask_b);
        let union = engine.or(Flavor::Bdd, a, b);
        let intersection = engine.and(Flavor::Bdd, a, b);

        let lhs = engine.satcount(Flavor::Bdd, union, &DOMAIN) + engine.satcount(Flavor::Bdd, intersection, &DOMAIN);
        let rhs = engine.satcount(Flavor::Bdd, a, &DOMAIN) + engine.satcount(Flavor::Bdd, b, &DOMAIN);
        prop_assert_eq!(lhs, rhs);
    }
}
