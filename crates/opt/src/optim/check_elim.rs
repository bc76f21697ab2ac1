//! Redundant runtime-check elimination.
//!
//! For every Mem allocation the checks guarding it are partitioned by kind
//! and reduced pairwise under the dominator tree: of two equivalent checks
//! the dominated one is dead.

use std::collections::VecDeque;

use cadenza_ir::{CheckKind, Graph, InstData, InstId, Opcode, Rpo};

use crate::domtree::DominatorTree;

#[derive(Debug, Default)]
pub struct CheckElim;

type CheckPredicate = fn(&Graph, InstId, InstId) -> bool;

impl CheckElim {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, graph: &mut Graph) {
        let mut domtree = DominatorTree::new();
        domtree.compute(graph);

        let mut rpo = Rpo::new();
        rpo.run(graph);

        // Collect the Mem instructions up front; eliminations must not run
        // under a live block cursor.
        let mut mems = Vec::new();
        for &block in rpo.order() {
            for inst in graph.iter_insts(block) {
                if graph.inst(inst).opcode() == Opcode::Mem {
                    mems.push(inst);
                }
            }
        }

        for mem in mems {
            Self::optimize_mem(graph, &domtree, mem);
        }
    }

    fn optimize_mem(graph: &mut Graph, domtree: &DominatorTree, mem: InstId) {
        let mut nil_checks = VecDeque::new();
        let mut bound_checks = VecDeque::new();
        for &user in graph.users(mem) {
            if let InstData::Check { kind, args } = graph.inst(user).data() {
                // A bound check on another mem can still use this one as its
                // index; partition by the guarded mem.
                if args[0] != mem {
                    continue;
                }
                match kind {
                    CheckKind::Nil => nil_checks.push_back(user),
                    CheckKind::Bound => bound_checks.push_back(user),
                }
            }
        }

        Self::eliminate_dominated(graph, domtree, nil_checks, Self::nil_equivalent);
        Self::eliminate_dominated(graph, domtree, bound_checks, Self::bound_equivalent);
    }

    fn eliminate_dominated(
        graph: &mut Graph,
        domtree: &DominatorTree,
        mut checks: VecDeque<InstId>,
        equivalent: CheckPredicate,
    ) {
        while let Some(check) = checks.pop_front() {
            let mut idx = 0;
            while idx < checks.len() {
                let other = checks[idx];
                if equivalent(graph, check, other) {
                    if domtree.inst_dominates(graph, check, other) {
                        graph.eliminate(other);
                        let _ = checks.remove(idx);
                        continue;
                    } else if domtree.inst_dominates(graph, other, check) {
                        graph.eliminate(check);
                        break;
                    }
                }
                idx += 1;
            }
        }
    }

    /// Two nil checks of one mem always guard the same condition.
    fn nil_equivalent(graph: &Graph, a: InstId, b: InstId) -> bool {
        debug_assert_eq!(graph.inst(a).input(0), graph.inst(b).input(0));
        true
    }

    /// Bound checks agree when the indices are the same SSA value or equal
    /// constant literals.
    fn bound_equivalent(graph: &Graph, a: InstId, b: InstId) -> bool {
        debug_assert_eq!(graph.inst(a).input(0), graph.inst(b).input(0));
        let idx_a = graph.inst(a).input(1);
        let idx_b = graph.inst(b).input(1);
        if idx_a == idx_b {
            return true;
        }
        match (graph.inst(idx_a).data(), graph.inst(idx_b).data()) {
            (
                InstData::Assign {
                    op: Opcode::Constant,
                    value: a,
                },
                InstData::Assign {
                    op: Opcode::Constant,
                    value: b,
                },
            ) => a == b,
            _ => false,
        }
    }
}
