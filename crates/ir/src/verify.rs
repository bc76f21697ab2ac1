//! Structural well-formedness checks.
//!
//! These back the invariants every pass must re-establish: def-use
//! reciprocity in both directions, φ placement and φ predecessor discipline,
//! no references to retired instructions, and successor/predecessor edge
//! consistency. Violations are programmer errors and panic.

use crate::{Graph, InstData};

/// Panics if `graph` violates a structural invariant.
pub fn verify_graph(graph: &Graph) {
    for block in graph.blocks() {
        // Successor discipline and reverse edges.
        let succs = graph.succs_of(block);
        if succs.len() == 2 {
            assert_ne!(succs[0], succs[1], "BB.{}: duplicate successor", block.0);
        }
        for succ in succs {
            assert!(
                graph.preds_of(succ).contains(&block),
                "BB.{}: successor BB.{} misses the reverse edge",
                block.0,
                succ.0
            );
        }
        for &pred in graph.preds_of(block) {
            assert!(
                graph.succs_of(pred).contains(&block),
                "BB.{}: predecessor BB.{} has no forward edge",
                block.0,
                pred.0
            );
        }

        let mut seen_non_phi = false;
        for inst in graph.iter_insts(block) {
            assert_eq!(
                graph.inst_block(inst),
                block,
                "v{}: stale owner block",
                inst.0
            );

            if graph.inst(inst).is_phi() {
                assert!(
                    !seen_non_phi,
                    "v{}: phi below a non-phi in BB.{}",
                    inst.0, block.0
                );
            } else {
                seen_non_phi = true;
            }

            // Every def-use source knows this instruction as a user and is
            // itself still alive.
            graph.inst(inst).data().for_each_dep(|dep| {
                assert!(
                    graph.is_inst_inserted(dep),
                    "v{}: input v{} was eliminated",
                    inst.0,
                    dep.0
                );
                assert!(
                    graph.users(dep).contains(&inst),
                    "v{}: missing from users of v{}",
                    inst.0,
                    dep.0
                );
            });

            // φ predecessor tags stay within the block's predecessor set.
            if let InstData::Phi { deps } = graph.inst(inst).data() {
                for blocks in deps.values() {
                    for dep_block in blocks {
                        assert!(
                            graph.preds_of(block).contains(dep_block),
                            "v{}: phi names BB.{} which is not a predecessor of BB.{}",
                            inst.0,
                            dep_block.0,
                            block.0
                        );
                    }
                }
            }

            // Every registered user references this instruction back.
            for &user in graph.users(inst) {
                assert!(
                    graph.is_inst_inserted(user),
                    "v{}: eliminated user v{} still registered",
                    inst.0,
                    user.0
                );
                let references_back = match graph.inst(user).data() {
                    InstData::Phi { deps } => deps.contains_key(&inst),
                    data => data.inputs().contains(&inst),
                };
                assert!(
                    references_back,
                    "v{}: user v{} does not reference it",
                    inst.0,
                    user.0
                );
            }
        }
    }
}
