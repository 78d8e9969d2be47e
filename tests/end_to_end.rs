//! Integration tests for the six end-to-end scenarios: build small functions through the
//! `Engine` façade and check them against known-good counts/evaluations rather than against the
//! kernel's own recursive structure (that is what the `#[cfg(test)]` unit tests next to each
//! kernel module are for).

use sharpd::config::MIN_NODE_CAPACITY;
use sharpd::{Engine, EngineConfig, Flavor, Handle};

fn new_engine(workers: usize) -> Engine {
    let config = EngineConfig::builder().workers(workers).build().expect("valid config");
    Engine::init(config).expect("engine init")
}

/// Walk `dd` down to a terminal following `assignment` (indexed by variable number), returning
/// whether the function is true under that assignment.
fn eval(engine: &mut Engine, dd: Handle, assignment: &[bool]) -> bool {
    let mut node = dd;
    loop {
        if engine.isleaf(node) {
            return node.is_true();
        }
        let v = engine.var(node).expect("internal node has a variable") as usize;
        node = if assignment[v] { engine.high(Flavor::Bdd, node) } else { engine.low(Flavor::Bdd, node) };
    }
}

fn all_assignments(n: usize) -> Vec<Vec<bool>> {
    (0..(1u32 << n)).map(|mask| (0..n).map(|i| (mask >> i) & 1 == 1).collect()).collect()
}

/// The minterm selecting exactly `value` (read MSB-first across `vars`).
fn minterm(engine: &mut Engine, vars: &[u32], value: u32) -> Handle {
    let mut cube = engine.dd_true();
    for (i, &v) in vars.iter().enumerate() {
        let bit = (value >> (vars.len() - 1 - i)) & 1 == 1;
        let lit = if bit { engine.ithvar(Flavor::Bdd, v) } else { engine.nithvar(Flavor::Bdd, v) };
        cube = engine.and(Flavor::Bdd, cube, lit);
    }
    cube
}

fn range_dd(engine: &mut Engine, vars: &[u32], lo: u32, hi: u32) -> Handle {
    let mut acc = engine.dd_false();
    for value in lo..=hi {
        let m = minterm(engine, vars, value);
        acc = engine.or(Flavor::Bdd, acc, m);
    }
    acc
}

/// The variable order a `support` cube visits, read off by walking its high edges.
fn support_vars(engine: &mut Engine, dd: Handle) -> Vec<u32> {
    let cube = engine.support(Flavor::Bdd, dd);
    let mut vars = Vec::new();
    let mut node = cube;
    while !engine.isleaf(node) {
        vars.push(engine.var(node).expect("internal node has a variable"));
        node = engine.high(Flavor::Bdd, node);
    }
    vars
}

#[test]
fn conjunction_of_three_variables_has_satcount_one_and_three_nodes() {
    let mut engine = new_engine(1);
    let x0 = engine.ithvar(Flavor::Bdd, 0);
    let x1 = engine.ithvar(Flavor::Bdd, 1);
    let x2 = engine.ithvar(Flavor::Bdd, 2);
    let a = engine.and(Flavor::Bdd, x0, x1);
    let dd = engine.and(Flavor::Bdd, a, x2);

    assert_eq!(engine.satcount(Flavor::Bdd, dd, &[0, 1, 2]), 1);
    assert_eq!(engine.nodecount(&[dd]), 3);
}

#[test]
fn xor_chain_has_satcount_four_and_evaluates_correctly() {
    let mut engine = new_engine(1);
    let x0 = engine.ithvar(Flavor::Bdd, 0);
    let x1 = engine.ithvar(Flavor::Bdd, 1);
    let x2 = engine.ithvar(Flavor::Bdd, 2);
    let a = engine.xor(Flavor::Bdd, x0, x1);
    let dd = engine.xor(Flavor::Bdd, a, x2);

    assert_eq!(engine.satcount(Flavor::Bdd, dd, &[0, 1, 2]), 4);
    assert!(!eval(&mut engine, dd, &[true, false, true]));
}

#[test]
fn relnext_of_negation_relation_reaches_every_state_in_one_step() {
    let mut engine = new_engine(1);
    let x = engine.ithvar(Flavor::Bdd, 0);
    let x_next = engine.ithvar(Flavor::Bdd, 1);
    // x xor x' is true exactly when x' = !x.
    let rel = engine.xor(Flavor::Bdd, x, x_next);
    let every_state = engine.dd_true();

    let reachable = engine.relnext(Flavor::Bdd, every_state, rel, &[0]);
    assert_eq!(reachable, engine.dd_true());
}

#[test]
fn intersection_of_overlapping_integer_ranges_has_satcount_four() {
    let mut engine = new_engine(1);
    let vars = [0u32, 1, 2, 3];
    let low_range = range_dd(&mut engine, &vars, 0, 7);
    let high_range = range_dd(&mut engine, &vars, 4, 11);

    let both = engine.and(Flavor::Bdd, low_range, high_range);
    assert_eq!(engine.satcount(Flavor::Bdd, both, &vars), 4);
}

#[test]
fn serialize_then_reload_preserves_satcount_and_support() {
    let mut engine = new_engine(1);
    let x0 = engine.ithvar(Flavor::Bdd, 0);
    let x1 = engine.ithvar(Flavor::Bdd, 1);
    let x2 = engine.ithvar(Flavor::Bdd, 2);
    let not_x0 = engine.not(Flavor::Bdd, x0);
    let a = engine.and(Flavor::Bdd, x0, x1);
    let b = engine.and(Flavor::Bdd, not_x0, x2);
    let dd = engine.or(Flavor::Bdd, a, b);

    let original_satcount = engine.satcount(Flavor::Bdd, dd, &[0, 1, 2]);
    let original_support = support_vars(&mut engine, dd);

    let mut writer = engine.writer_start();
    writer.add(dd);
    let mut bytes: Vec<u8> = Vec::new();
    engine.writer_write_binary(&writer, &mut bytes).expect("serialize");
    writer.end();
    engine.quit();

    let mut engine2 = new_engine(1);
    let mut cursor = bytes.as_slice();
    let reader = engine2.reader_read_binary(Flavor::Bdd, &mut cursor).expect("deserialize");
    let restored = reader.get(0).expect("root present");
    reader.end();

    assert_eq!(engine2.satcount(Flavor::Bdd, restored, &[0, 1, 2]), original_satcount);
    assert_eq!(support_vars(&mut engine2, restored), original_support);
}

#[test]
fn protected_roots_survive_ten_gc_cycles_under_churn() {
    let config = EngineConfig::builder()
        .workers(2)
        .node_bytes(MIN_NODE_CAPACITY * 16)
        .cache_bytes(4096 * 32)
        .table_ratio(0.2)
        .build()
        .expect("valid config");
    let mut engine = Engine::init(config).expect("engine init");

    let vars = [0u32, 1, 2, 3];
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    let mut next_rand = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };
    let mut random_function = |engine: &mut Engine, rng: &mut dyn FnMut() -> u64| -> Handle {
        let mut dd = engine.dd_false();
        for value in 0..(1u32 << vars.len()) {
            if rng() & 1 == 1 {
                let m = minterm(engine, &vars, value);
                dd = engine.or(Flavor::Bdd, dd, m);
            }
        }
        dd
    };

    let assignments = all_assignments(vars.len());
    let protected: Vec<Handle> = (0..4)
        .map(|_| {
            let dd = random_function(&mut engine, &mut next_rand);
            engine.protect(dd);
            dd
        })
        .collect();
    let expected: Vec<Vec<bool>> = protected
        .iter()
        .map(|&dd| assignments.iter().map(|a| eval(&mut engine, dd, a)).collect())
        .collect();

    let mut guard = 0;
    while engine.stats().gc_cycles() < 10 {
        random_function(&mut engine, &mut next_rand);
        engine.gc_now();
        guard += 1;
        assert!(guard < 10_000, "GC never reached 10 cycles");

        for (&dd, want) in protected.iter().zip(expected.iter()) {
            let got: Vec<bool> = assignments.iter().map(|a| eval(&mut engine, dd, a)).collect();
            assert_eq!(&got, want);
        }
    }

    for &dd in &protected {
        engine.unprotect(dd);
    }
}
