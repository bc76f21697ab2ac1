//! Cross-pass scenarios: passes composed the way a driver would run them,
//! checked against the structural properties each one must re-establish.

use cadenza_ir::{
    verify::verify_graph, BlockId, CallGraph, Graph, InstData, IrBuilder, Opcode, ResultType, Rpo,
};
use cadenza_opt::{CheckElim, DominatorTree, Inliner, Peephole};

/// Inlining a foldable callee and then running the peephole collapses the
/// caller to a constant return.
#[test]
fn inline_then_fold_to_constant() {
    let mut call_graph = CallGraph::new();

    // bar() { return (6 ^ 4) << 1; }
    let mut bar = Graph::new();
    {
        let mut builder = IrBuilder::new(&mut bar);
        let b0 = builder.make_block();
        let b1 = builder.make_block();
        builder.switch_to_block(b0);
        let six = builder.const_int(6);
        let four = builder.const_int(4);
        let one = builder.const_int(1);
        builder.jump(b1);
        builder.switch_to_block(b1);
        let x = builder.xor(six, four);
        let s = builder.shl(x, one);
        builder.ret(s);
    }
    let bar = call_graph.link_graph("bar", bar);

    // foo() { return bar() + 4; }
    let mut foo = Graph::new();
    let ret;
    {
        let mut builder = IrBuilder::new(&mut foo);
        let b0 = builder.make_block();
        let b1 = builder.make_block();
        builder.switch_to_block(b0);
        let four = builder.const_int(4);
        builder.jump(b1);
        builder.switch_to_block(b1);
        let call = builder.call_static(bar, ResultType::S32, &[]);
        let sum = builder.add(call, four);
        ret = builder.ret(sum);
    }
    let foo = call_graph.link_graph("foo", foo);

    Inliner::new().run(&mut call_graph, foo);
    let graph = call_graph.graph_mut(foo);
    verify_graph(graph);

    Peephole::new().run(graph);
    verify_graph(graph);

    let eight = graph.inst(ret).input(0);
    assert!(matches!(
        graph.inst(eight).data(),
        InstData::Assign {
            op: Opcode::Constant,
            value: 8
        }
    ));
    assert_eq!(graph.inst_block(eight), graph.start_block());

    // Every block beyond the entry is reduced to its terminator.
    for block in graph.blocks().skip(1) {
        assert_eq!(graph.alive_inst_count(block), 1);
    }
}

/// The peephole turns `x + 0` into `x`, which makes two bound checks
/// equivalent; the check optimizer then removes the dominated one.
#[test]
fn fold_then_eliminate_checks() {
    let mut graph = Graph::new();
    let mut builder = IrBuilder::new(&mut graph);
    let b0 = builder.make_block();
    let b1 = builder.make_block();

    builder.switch_to_block(b0);
    let x = builder.param(ResultType::S32, 0);
    let zero = builder.const_int(0);
    let ten = builder.const_int(10);
    builder.jump(b1);

    builder.switch_to_block(b1);
    let mem = builder.mem(ResultType::U32, ten);
    let shifted = builder.add(x, zero);
    let bound_x = builder.bound_check(mem, x);
    builder.store(mem, x, zero);
    let bound_shifted = builder.bound_check(mem, shifted);
    let loaded = builder.load(mem, shifted);
    builder.ret(loaded);

    Peephole::new().run(&mut graph);
    verify_graph(&graph);
    assert!(!graph.is_inst_inserted(shifted));
    assert_eq!(graph.inst(bound_shifted).input(1), x);

    CheckElim::new().run(&mut graph);
    verify_graph(&graph);
    assert!(graph.is_inst_inserted(bound_x));
    assert!(!graph.is_inst_inserted(bound_shifted));
    assert_eq!(graph.inst(loaded).input(1), x);
}

/// 0→1; 1→{2,9}; 2→3; 3→{4,2}; 4→5; 5→{6,4}; 6→{7,8}; 7→1; 8→10.
fn loop_nest() -> (Graph, Vec<BlockId>) {
    let mut graph = Graph::new();
    let b: Vec<BlockId> = (0..11).map(|_| graph.make_block()).collect();

    graph.set_true_successor(b[0], b[1]);
    graph.set_true_successor(b[1], b[2]);
    graph.set_false_successor(b[1], b[9]);
    graph.set_true_successor(b[2], b[3]);
    graph.set_true_successor(b[3], b[4]);
    graph.set_false_successor(b[3], b[2]);
    graph.set_true_successor(b[4], b[5]);
    graph.set_true_successor(b[5], b[6]);
    graph.set_false_successor(b[5], b[4]);
    graph.set_true_successor(b[6], b[7]);
    graph.set_false_successor(b[6], b[8]);
    graph.set_true_successor(b[7], b[1]);
    graph.set_true_successor(b[8], b[10]);
    (graph, b)
}

/// RPO is a topological order of the CFG once back-edges (edges into a
/// dominator) are ignored.
#[test]
fn rpo_respects_forward_edges() {
    let (mut graph, _) = loop_nest();

    let mut tree = DominatorTree::new();
    tree.compute(&mut graph);
    let mut rpo = Rpo::new();
    rpo.run(&mut graph);

    let pos = |block: BlockId| rpo.order().iter().position(|&b| b == block).unwrap();
    for block in graph.blocks() {
        for succ in graph.succs_of(block) {
            if !tree.block_dominates(succ, block) {
                assert!(
                    pos(block) < pos(succ),
                    "BB.{} must precede BB.{} in RPO",
                    block.0,
                    succ.0
                );
            }
        }
    }
}

/// The immediate dominator is a dominator, and no dominator sits deeper in
/// the DFS preorder.
#[test]
fn idom_is_the_deepest_dominator() {
    let (mut graph, b) = loop_nest();

    let mut tree = DominatorTree::new();
    tree.compute(&mut graph);

    for &block in &b {
        let Some(idom) = tree.idom_of(block) else {
            continue;
        };
        let dominators = tree.dominators_of(block);
        assert!(dominators.contains(&idom));
        for &dom in &dominators {
            assert!(tree.dfs_order_of(dom) <= tree.dfs_order_of(idom));
        }
    }
}
