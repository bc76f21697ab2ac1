//! Building and inspecting a graph through the public surface only.

use cadenza_ir::{
    verify::verify_graph, CallGraph, Dfs, Graph, GraphWriter, IrBuilder, ResultType, Rpo,
};

/// abs-difference-flavored diamond: both arms compute, a φ merges.
#[test]
fn diamond_with_phi() {
    let mut graph = Graph::new();
    let mut builder = IrBuilder::new(&mut graph);

    let b0 = builder.make_block();
    let b1 = builder.make_block();
    let b2 = builder.make_block();
    let b3 = builder.make_block();

    builder.switch_to_block(b0);
    let a = builder.param(ResultType::S32, 0);
    let b = builder.param(ResultType::S32, 1);
    builder.jump(b1);

    builder.switch_to_block(b1);
    let le = builder.cmp_le(a, b);
    builder.br(le, b2, b3);

    builder.switch_to_block(b2);
    let doubled = builder.add(b, b);
    builder.jump(b3);

    builder.switch_to_block(b3);
    let merged = builder.phi(ResultType::S32);
    builder.append_phi_arg(merged, a, b1);
    builder.append_phi_arg(merged, doubled, b2);
    builder.ret(merged);

    verify_graph(&graph);

    assert_eq!(
        GraphWriter::new(&graph).dump_string(),
        "\
BB.0:
    0.s32 Parameter 0
    1.s32 Parameter 1
    2. Br BB.1
BB.1:
    3.b Compare LE v0, v1
    4. If v3, BB.2, BB.3
BB.2:
    5.s32 Add v1, v1
    6. Br BB.3
BB.3:
    7p.s32 Phi v0:BB.1, v5:BB.2
    8.s32 Return v7
"
    );

    // Def-use edges answer both directions.
    assert!(graph.users(a).contains(&le));
    assert!(graph.users(a).contains(&merged));
    assert!(graph.users(doubled).contains(&merged));
    assert_eq!(graph.inst(le).inputs().as_slice(), &[a, b]);

    // Traversals visit the true arm first and order the merge last.
    let mut dfs = Dfs::new();
    dfs.run(&mut graph);
    assert_eq!(dfs.order(), &[b0, b1, b2, b3]);

    let mut rpo = Rpo::new();
    rpo.run(&mut graph);
    assert_eq!(rpo.order().first(), Some(&b0));
    assert_eq!(rpo.order().last(), Some(&b3));
}

#[test]
fn call_graph_round_trip() {
    let mut call_graph = CallGraph::new();

    let mut callee = Graph::new();
    {
        let mut builder = IrBuilder::new(&mut callee);
        let b0 = builder.make_block();
        builder.switch_to_block(b0);
        let value = builder.const_int(42);
        builder.ret(value);
    }
    let callee = call_graph.link_graph("answer", callee);

    let mut caller = Graph::new();
    {
        let mut builder = IrBuilder::new(&mut caller);
        let b0 = builder.make_block();
        builder.switch_to_block(b0);
        let result = builder.call_static(callee, ResultType::S32, &[]);
        builder.ret(result);
    }
    let caller = call_graph.link_graph("main", caller);

    assert_eq!(call_graph.method_by_name("answer"), Some(callee));
    assert_eq!(call_graph.graph(caller).method_id(), caller);
    assert_eq!(
        GraphWriter::new(call_graph.graph(caller)).dump_string(),
        "\
BB.0:
    0.s32 CallSt id: 0 Ret: s32
    1.s32 Return v0
"
    );
}
