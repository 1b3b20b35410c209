use super::*;

fn make_test_function() -> Function {
    // bb0 -> bb1, bb2
    // bb1 -> bb3
    // bb2 -> bb3
    let mut func = Function::new();
    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    let bb2 = func.alloc_block();
    let bb3 = func.alloc_block();
    func.add_edge(bb0, bb1);
    func.add_edge(bb0, bb2);
    func.add_edge(bb1, bb3);
    func.add_edge(bb2, bb3);
    func
}

fn make_nested_loop_function() -> Function {
    // bb0 -> bb1
    // bb1 -> bb2, bb4        (outer header)
    // bb2 -> bb3             (inner header)
    // bb3 -> bb2, bb1        (inner latch, outer latch)
    // bb4: exit
    let mut func = Function::new();
    let bb0 = func.alloc_block();
    let bb1 = func.alloc_block();
    let bb2 = func.alloc_block();
    let bb3 = func.alloc_block();
    let bb4 = func.alloc_block();
    func.add_edge(bb0, bb1);
    func.add_edge(bb1, bb2);
    func.add_edge(bb1, bb4);
    func.add_edge(bb2, bb3);
    func.add_edge(bb3, bb2);
    func.add_edge(bb3, bb1);
    func
}

#[test]
fn test_cfg_construction() {
    let func = make_test_function();
    let cfg = AnalysisCfg::build(&func);

    assert_eq!(cfg.successors.get(&BlockId(0)).unwrap().len(), 2);
    assert_eq!(cfg.successors.get(&BlockId(1)).unwrap(), &vec![BlockId(3)]);
    assert_eq!(cfg.successors.get(&BlockId(2)).unwrap(), &vec![BlockId(3)]);
    assert!(cfg.successors.get(&BlockId(3)).unwrap().is_empty());

    assert!(cfg.preds(BlockId(0)).is_empty());
    assert_eq!(cfg.preds(BlockId(3)), &[BlockId(1), BlockId(2)]);
}

#[test]
fn test_dominators() {
    let func = make_test_function();
    let cfg = AnalysisCfg::build(&func);

    // bb0 dominates everything
    for i in 0..4 {
        assert!(cfg.dominates(BlockId(0), BlockId(i)));
    }
    assert!(cfg.dominates(BlockId(1), BlockId(1)));
    assert!(!cfg.strictly_dominates(BlockId(1), BlockId(1)));
    // Neither branch dominates the join
    assert!(!cfg.dominates(BlockId(1), BlockId(3)));
    assert!(!cfg.dominates(BlockId(2), BlockId(3)));
    assert_eq!(cfg.idom.get(&BlockId(3)), Some(&BlockId(0)));
    assert!(!cfg.idom.contains_key(&BlockId(0)));
}

#[test]
fn test_rpo_starts_at_entry() {
    let func = make_test_function();
    let cfg = AnalysisCfg::build(&func);

    assert_eq!(cfg.rpo.len(), 4);
    assert_eq!(cfg.rpo[0], BlockId(0));
    assert_eq!(*cfg.rpo.last().unwrap(), BlockId(3));
    assert_eq!(cfg.post_order.first(), Some(&BlockId(3)));
}

#[test]
fn test_dom_subtree_preorder() {
    let func = make_test_function();
    let cfg = AnalysisCfg::build(&func);

    let subtree = cfg.dom_subtree(BlockId(0));
    assert_eq!(subtree.len(), 4);
    assert_eq!(subtree[0], BlockId(0));
    assert_eq!(cfg.dom_subtree(BlockId(1)), vec![BlockId(1)]);
}

#[test]
fn test_unreachable_block() {
    let mut func = make_test_function();
    let dead = func.alloc_block();
    func.add_edge(dead, BlockId(3));
    let cfg = AnalysisCfg::build(&func);

    assert!(!cfg.is_reachable(dead));
    assert!(cfg.is_reachable(BlockId(3)));
    assert!(!cfg.rpo.contains(&dead));
    // The unreachable predecessor does not disturb the join's dominator
    assert_eq!(cfg.idom.get(&BlockId(3)), Some(&BlockId(0)));
}

#[test]
fn test_loop_depth() {
    let func = make_nested_loop_function();
    let cfg = AnalysisCfg::build(&func);
    let loops = LoopInfo::compute(&cfg);

    assert!(loops.is_loop_header(BlockId(1)));
    assert!(loops.is_loop_header(BlockId(2)));
    assert!(!loops.is_loop_header(BlockId(3)));

    assert_eq!(loops.depth(BlockId(0)), 0);
    assert_eq!(loops.depth(BlockId(1)), 1);
    assert_eq!(loops.depth(BlockId(2)), 2);
    assert_eq!(loops.depth(BlockId(3)), 2);
    assert_eq!(loops.depth(BlockId(4)), 0);
}

#[test]
fn test_function_adapter() {
    let func = make_test_function();
    assert_eq!(CfgFunction::entry(&func), BlockId(0));
    assert_eq!(func.block_ids().len(), 4);
    assert_eq!(CfgFunction::predecessors(&func, BlockId(3)).len(), 2);
    assert!(CfgFunction::has_block(&func, BlockId(3)));
    assert!(!CfgFunction::has_block(&func, BlockId(9)));
}

#[test]
fn test_nested_dominance() {
    let func = make_nested_loop_function();
    let cfg = AnalysisCfg::build(&func);

    assert!(cfg.dominates(BlockId(1), BlockId(3)));
    assert!(cfg.strictly_dominates(BlockId(2), BlockId(3)));
    assert!(!cfg.dominates(BlockId(2), BlockId(4)));
    assert!(!cfg.dominates(BlockId(3), BlockId(2)));
    assert_eq!(cfg.idom.get(&BlockId(4)), Some(&BlockId(1)));
    // DFS finishes the inner loop first, so the exit precedes it in RPO
    assert_eq!(cfg.rpo, vec![BlockId(0), BlockId(1), BlockId(4), BlockId(2), BlockId(3)]);
    assert_eq!(
        cfg.dom_subtree(BlockId(1)),
        vec![BlockId(1), BlockId(4), BlockId(2), BlockId(3)]
    );
}
