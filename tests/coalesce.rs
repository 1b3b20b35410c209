//! End-to-end tests for copy coalescing
//!
//! These run liveness, interference and the recoloring heuristic together on
//! small hand-built functions and check the properties every run must keep.

use std::collections::HashMap;

use ssa_coalesce::copy_opt::{
    AllOneCost, CopyHeuristic, Cost, CostModel, CostOracle, LoopDepthCost, PinnedSet,
    build_units, verify_coloring,
};
use ssa_coalesce::interference::{Interference, InterferenceGraph};
use ssa_coalesce::ir::{
    BlockId, OperandMask, PReg, RegClassId, RegSet, Requirement, ValueId, ValueKind,
};
use ssa_coalesce::liveness::{LiveFlags, Liveness};
use ssa_coalesce::{CoalesceError, Coloring, CopyOptConfig, Function, run_copy_opt};

/// Give every node the highest free admissible register, which leaves plenty
/// of copies for the coalescer to remove.
fn assign_registers(func: &Function, graph: &InterferenceGraph) -> Coloring {
    let class = func.class(graph.class()).unwrap();
    let mut coloring = Coloring::new();
    for value in graph.nodes() {
        let mut free = func.value(value).requirement.admissible(class);
        for neighbor in graph.neighbors(value) {
            if let Some(reg) = coloring.get(neighbor) {
                free.remove(reg);
            }
        }
        let reg = free.iter().last().expect("fixture needs more registers");
        coloring.set(value, reg);
    }
    coloring
}

fn set_phi_arg(func: &mut Function, phi: ValueId, pos: usize, arg: ValueId) {
    if let ValueKind::Phi { args } = &mut func.values[phi.index()].kind {
        args[pos] = arg;
    }
}

struct LoopKernel {
    func: Function,
    class: RegClassId,
    blocks: [BlockId; 4],
}

fn make_loop_kernel() -> LoopKernel {
    // bb0: n, acc0 = param; sp = param (ignored); k = param (r0 only)
    // bb1: i = phi(n, i2); acc = phi(acc0, acc2)
    // bb2: t = op acc, i (same as acc); pi, pt = perm(i, t)
    //      i2 = op pi (same as pi); acc2 = op pt, k (same as pt)
    //      d = op acc2, i2 (different from acc2); use d
    // bb3: use acc, k, sp
    let mut func = Function::with_name("loop_kernel");
    let class = func.add_class("gp", 8, RegSet::first_n(8));
    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    let bb2 = func.alloc_block();
    let bb3 = func.alloc_block();
    func.add_edge(bb0, bb1);
    func.add_edge(bb1, bb2);
    func.add_edge(bb2, bb1);
    func.add_edge(bb1, bb3);

    let same_first = Requirement::SameAs(OperandMask::from_positions(&[0]));

    let n = func.add_param(bb0, class);
    let acc0 = func.add_param(bb0, class);
    let sp = func.add_param(bb0, class);
    func.set_requirement(sp, Requirement::Ignore);
    let k = func.add_param(bb0, class);
    func.set_requirement(k, Requirement::Limited(RegSet::empty().with(PReg(0))));

    let i = func.add_phi(bb1, class, vec![n, n]);
    let acc = func.add_phi(bb1, class, vec![acc0, acc0]);

    let t = func.add_op(bb2, class, vec![acc, i]);
    func.set_requirement(t, same_first);
    let (_, projs) = func.add_perm(bb2, vec![i, t]);
    let (pi, pt) = (projs[0], projs[1]);
    let i2 = func.add_op(bb2, class, vec![pi]);
    func.set_requirement(i2, same_first);
    let acc2 = func.add_op(bb2, class, vec![pt, k]);
    func.set_requirement(acc2, same_first);
    let d = func.add_op(bb2, class, vec![acc2, i2]);
    func.set_requirement(d, Requirement::DifferentFrom(OperandMask::from_positions(&[0])));
    func.add_effect(bb2, vec![d]);
    func.add_effect(bb3, vec![acc, k, sp]);

    set_phi_arg(&mut func, i, 1, i2);
    set_phi_arg(&mut func, acc, 1, acc2);

    LoopKernel {
        func,
        class,
        blocks: [bb0, bb1, bb2, bb3],
    }
}

fn make_phi_chain(diamonds: usize) -> (Function, RegClassId) {
    // bb0: a, b = param
    // each diamond: left: x = op a; right: y = op b
    //               join: p = phi(x, y); q = phi(b, a)
    // and p, q become the next a, b; the last join uses both
    //
    // Every other x is two-address.
    let mut func = Function::with_name("phi_chain");
    let class = func.add_class("gp", 6, RegSet::first_n(6));
    let mut top = func.alloc_block();
    let mut a = func.add_param(top, class);
    let mut b = func.add_param(top, class);
    for round in 0..diamonds {
        let left = func.alloc_block();
        let right = func.alloc_block();
        let join = func.alloc_block();
        func.add_edge(top, left);
        func.add_edge(top, right);
        func.add_edge(left, join);
        func.add_edge(right, join);

        let x = func.add_op(left, class, vec![a]);
        if round % 2 == 0 {
            func.set_requirement(x, Requirement::SameAs(OperandMask::from_positions(&[0])));
        }
        let y = func.add_op(right, class, vec![b]);
        let p = func.add_phi(join, class, vec![x, y]);
        let q = func.add_phi(join, class, vec![b, a]);
        (top, a, b) = (join, p, q);
    }
    func.add_effect(top, vec![a, b]);
    (func, class)
}

#[test]
fn test_loop_kernel_is_well_formed() {
    let kernel = make_loop_kernel();
    assert!(kernel.func.validate().is_ok());
}

#[test]
fn test_liveness_soundness() {
    let kernel = make_loop_kernel();
    let func = &kernel.func;
    let mut liveness = Liveness::new();
    let info = liveness.compute(func);

    // A value is only ever live where its definition dominates
    for &block in &kernel.blocks {
        let Some(set) = info.block_set(block) else {
            continue;
        };
        for (value, flags) in set.iter() {
            let def_block = func.value(value).block;
            assert!(
                info.cfg.dominates(def_block, block),
                "{} live in {} ({:?}) but defined in {}",
                value,
                block,
                flags,
                def_block
            );
            if flags.contains(LiveFlags::IN) {
                assert_ne!(def_block, block, "{} live-in at its own definition", value);
            }
        }
    }

    // Every use is reached
    for value in &func.values {
        for (pos, &operand) in func.operands(value.id).iter().enumerate() {
            if func.value(operand).requirement.is_ignore() {
                continue;
            }
            if func.is_phi(value.id) {
                let pred = func.block(value.block).preds[pos];
                assert!(
                    info.is_live_end(pred, operand),
                    "{} not live at the end of {}",
                    operand,
                    pred
                );
            } else if func.value(operand).block != value.block {
                assert!(
                    info.is_live_in(value.block, operand),
                    "{} not live into {}",
                    operand,
                    value.block
                );
            }
        }
    }
}

#[test]
fn test_graph_matches_interference_predicate() {
    let kernel = make_loop_kernel();
    let func = &kernel.func;
    let mut liveness = Liveness::new();
    let info = liveness.compute(func);
    let interference = Interference::new(func, info);
    let graph = InterferenceGraph::build(func, info, kernel.class);

    let nodes: Vec<ValueId> = graph.nodes().collect();
    for &a in &nodes {
        for &b in &nodes {
            if a == b {
                continue;
            }
            assert_eq!(
                interference.values_interfere(a, b),
                interference.values_interfere(b, a)
            );
            if interference.values_interfere(a, b) {
                assert!(graph.interferes(a, b), "missing edge {} - {}", a, b);
            } else if graph.interferes(a, b) {
                // Only must-differ operands add edges beyond live-range overlap
                let differs = |x: ValueId, y: ValueId| {
                    matches!(
                        func.value(x).requirement,
                        Requirement::DifferentFrom(mask)
                            if mask.positions().any(|p| func.operands(x).get(p) == Some(&y))
                    )
                };
                assert!(differs(a, b) || differs(b, a), "extra edge {} - {}", a, b);
            }
        }
    }
}

#[test]
fn test_solve_keeps_properties() {
    let kernel = make_loop_kernel();
    let func = &kernel.func;
    let mut liveness = Liveness::new();
    let info = liveness.compute(func);
    let interference = Interference::new(func, info);
    let graph = InterferenceGraph::build(func, info, kernel.class);
    let class = func.class(kernel.class).unwrap();

    let mut coloring = assign_registers(func, &graph);
    assert!(verify_coloring(&graph, &coloring).is_ok());

    let cost = LoopDepthCost::new(&info.cfg);
    let units = build_units(func, &interference, kernel.class, &cost);
    assert!(!units.is_empty());

    let before = units.copy_costs(&coloring);
    let heuristic = CopyHeuristic::new(func, &graph).unwrap();
    let mut pinned = PinnedSet::new();
    let summary = heuristic.run(&units, &mut coloring, &mut pinned);

    // Interfering values never meet
    assert!(verify_coloring(&graph, &coloring).is_ok());
    for value in graph.nodes() {
        let reg = coloring.get(value).unwrap();
        assert!(func.value(value).requirement.admissible(class).contains(reg));
    }

    // Pinned partners that share a register really may share it
    for unit in &units {
        if !pinned.contains(unit.root()) {
            continue;
        }
        for (arg, _) in unit.args() {
            if pinned.contains(arg) && coloring.get(arg) == coloring.get(unit.root()) {
                assert!(!interference.values_interfere(unit.root(), arg));
            }
        }
    }

    // Costs only go down, never below what interference forces
    let after = units.copy_costs(&coloring);
    assert_eq!(summary.costs_before, before);
    assert_eq!(summary.costs_after, after);
    assert!(after <= before);
    assert!(after >= summary.lower_bound);
    assert!(summary.lower_bound >= units.inevitable_copy_costs());
}

#[test]
fn test_run_copy_opt_with_each_cost_model() {
    let kernel = make_loop_kernel();
    let mut liveness = Liveness::new();
    let info = liveness.compute(&kernel.func);
    let graph = InterferenceGraph::build(&kernel.func, info, kernel.class);
    let initial = assign_registers(&kernel.func, &graph);

    let [bb0, bb1, bb2, bb3] = kernel.blocks;
    let freq: HashMap<BlockId, Cost> = HashMap::from([(bb0, 1), (bb1, 10), (bb2, 10), (bb3, 1)]);
    for model in [
        CostModel::AllOne,
        CostModel::LoopDepth,
        CostModel::ExecFreq(freq),
    ] {
        let mut coloring = initial.clone();
        let config = CopyOptConfig::new().with_cost_model(model.clone());
        let report = run_copy_opt(&kernel.func, &mut coloring, kernel.class, &config).unwrap();

        assert!(report.costs_after <= report.costs_before, "{:?}", model);
        assert!(report.costs_after >= report.lower_bound, "{:?}", model);
        assert!(report.lower_bound >= report.inevitable_costs, "{:?}", model);
        assert!(report.max_costs >= report.costs_before, "{:?}", model);
        assert!(verify_coloring(&graph, &coloring).is_ok());

        // A second pass may still find something, but never makes it worse
        let solved = coloring.clone();
        let again = run_copy_opt(&kernel.func, &mut coloring, kernel.class, &config).unwrap();
        assert_eq!(again.costs_before, report.costs_after);
        assert!(again.costs_after <= again.costs_before);
        assert!(!again.restored, "{:?}", model);
        if again.costs_after == again.costs_before {
            assert_eq!(coloring, solved);
        }
    }
}

#[test]
fn test_perm_source_repainted() {
    // bb0: a, k = param; pa = perm(a); use pa, k
    let mut func = Function::new();
    let class = func.add_class("gp", 4, RegSet::first_n(4));
    let bb0 = func.alloc_block();
    let a = func.add_param(bb0, class);
    let k = func.add_param(bb0, class);
    let (_, projs) = func.add_perm(bb0, vec![a]);
    let pa = projs[0];
    func.add_effect(bb0, vec![pa, k]);

    let mut coloring: Coloring = [(a, PReg(0)), (k, PReg(1)), (pa, PReg(2))]
        .into_iter()
        .collect();
    let config = CopyOptConfig::new().with_cost_model(CostModel::AllOne);
    let report = run_copy_opt(&func, &mut coloring, class, &config).unwrap();

    assert_eq!(report.costs_before - report.costs_after, 1);
    assert_eq!(coloring.get(a), coloring.get(pa));
    assert_eq!(coloring.get(k), Some(PReg(1)));

    // Nothing left to do on a second pass
    let solved = coloring.clone();
    let again = run_copy_opt(&func, &mut coloring, class, &config).unwrap();
    assert_eq!(again.costs_before, again.costs_after);
    assert!(!again.restored);
    assert_eq!(coloring, solved);
}

#[test]
fn test_pinned_value_from_earlier_unit_is_kept() {
    // bb0: o = param (r0 only); r = op o (same as o); s = param
    //      q = perm(s); use r, q
    //
    // q's unit runs first and pins s and q to r0, the only register r could
    // share with o.
    let mut func = Function::new();
    let class = func.add_class("gp", 3, RegSet::first_n(3));
    let bb0 = func.alloc_block();
    let o = func.add_param(bb0, class);
    func.set_requirement(o, Requirement::Limited(RegSet::empty().with(PReg(0))));
    let r = func.add_op(bb0, class, vec![o]);
    func.set_requirement(r, Requirement::SameAs(OperandMask::from_positions(&[0])));
    let s = func.add_param(bb0, class);
    let (_, projs) = func.add_perm(bb0, vec![s]);
    let q = projs[0];
    func.add_effect(bb0, vec![r, q]);

    let mut coloring: Coloring = [(o, PReg(0)), (r, PReg(1)), (s, PReg(2)), (q, PReg(0))]
        .into_iter()
        .collect();

    let mut liveness = Liveness::new();
    let info = liveness.compute(&func);
    let interference = Interference::new(&func, info);
    let graph = InterferenceGraph::build(&func, info, class);
    let cost = move |_: &Function, root: ValueId, _: usize| -> Cost {
        if root == q { 10 } else { 1 }
    };
    let units = build_units(&func, &interference, class, &cost);
    let roots: Vec<ValueId> = units.iter().map(|u| u.root()).collect();
    assert_eq!(roots, vec![q, r]);

    let heuristic = CopyHeuristic::new(&func, &graph).unwrap();
    let mut pinned = PinnedSet::new();
    let summary = heuristic.run(&units, &mut coloring, &mut pinned);

    assert_eq!(summary.committed, 1);
    assert_eq!(summary.trivial, 1);
    assert_eq!(summary.costs_before, 11);
    assert_eq!(summary.costs_after, 1);
    assert!(pinned.contains(q) && pinned.contains(s));
    assert!(!pinned.contains(r));
    assert_eq!(coloring.get(s), Some(PReg(0)));
    assert_eq!(coloring.get(q), Some(PReg(0)));
    assert_eq!(coloring.get(r), Some(PReg(1)));
    assert_eq!(units.unit_of(r).unwrap().copy_costs(&coloring), 1);

    let solved = coloring.clone();
    let mut pinned = PinnedSet::new();
    let again = heuristic.run(&units, &mut coloring, &mut pinned);
    assert_eq!(again.costs_before, again.costs_after);
    assert_eq!(coloring, solved);
}

#[test]
fn test_invalid_input_rejected() {
    let mut func = Function::new();
    let class = func.add_class("gp", 2, RegSet::first_n(2));
    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    func.add_edge(bb0, bb1);
    let a = func.add_param(bb0, class);
    let phi = func.add_phi(bb1, class, vec![a, a]);

    let mut coloring: Coloring = [(a, PReg(0)), (phi, PReg(0))].into_iter().collect();
    let result = run_copy_opt(&func, &mut coloring, class, &CopyOptConfig::new());
    assert!(matches!(result, Err(CoalesceError::PhiArity { args: 2, preds: 1, .. })));
}

#[test]
fn test_unknown_class_rejected() {
    let mut func = Function::new();
    func.add_class("gp", 2, RegSet::first_n(2));
    let bb0 = func.alloc_block();
    func.add_effect(bb0, vec![]);

    let mut coloring = Coloring::new();
    let result = run_copy_opt(&func, &mut coloring, RegClassId(7), &CopyOptConfig::new());
    assert!(matches!(result, Err(CoalesceError::UnknownClass(RegClassId(7)))));
}

#[test]
fn test_all_one_units_count_copies() {
    let kernel = make_loop_kernel();
    let mut liveness = Liveness::new();
    let info = liveness.compute(&kernel.func);
    let interference = Interference::new(&kernel.func, info);
    let units = build_units(&kernel.func, &interference, kernel.class, &AllOneCost);

    for unit in &units {
        assert!(unit.node_count() >= 2);
        assert!(unit.costs.iter().skip(1).all(|&c| c >= 1));
        assert!(unit.min_nodes_costs <= unit.all_nodes_costs);
    }
    assert!(units.iter().zip(units.iter().skip(1)).all(|(a, b)| a.sort_key >= b.sort_key));
}

#[test]
fn test_resolving_never_recolors() {
    let kernel = make_loop_kernel();
    let mut fixtures = vec![(kernel.func, kernel.class)];
    fixtures.extend((1..=4).map(make_phi_chain));

    for (func, class) in &fixtures {
        let mut liveness = Liveness::new();
        let info = liveness.compute(func);
        let interference = Interference::new(func, info);
        let graph = InterferenceGraph::build(func, info, *class);
        let loop_depth = LoopDepthCost::new(&info.cfg);
        let oracles: [&dyn CostOracle; 2] = [&AllOneCost, &loop_depth];

        for cost in oracles {
            let units = build_units(func, &interference, *class, cost);
            let heuristic = CopyHeuristic::new(func, &graph).unwrap();
            let mut coloring = assign_registers(func, &graph);

            let first = heuristic.run(&units, &mut coloring, &mut PinnedSet::new());
            assert!(!first.restored, "{:?}", func.name);
            assert!(first.costs_after <= first.costs_before, "{:?}", func.name);

            // Every write pays off, so a second run never has to roll back
            let solved = coloring.clone();
            let again = heuristic.run(&units, &mut coloring, &mut PinnedSet::new());
            assert!(!again.restored, "{:?}", func.name);
            assert_eq!(again.costs_before, first.costs_after, "{:?}", func.name);
            assert!(again.costs_after <= again.costs_before, "{:?}", func.name);
            if again.costs_after == again.costs_before {
                assert_eq!(coloring, solved, "{:?}", func.name);
            }
            assert!(verify_coloring(&graph, &coloring).is_ok());
        }
    }
}
