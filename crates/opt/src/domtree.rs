//! Dominator tree construction and dominance queries.
//!
//! The tree is computed by reachability rather than Lengauer-Tarjan: for
//! each non-start block D, rerun a DFS with D blocked; everything no longer
//! reached (minus D itself) is dominated by D. The immediate dominator of a
//! block is its dominator with the largest DFS preorder index. O(V·(V+E)),
//! which is fine at the graph sizes this middle-end works on.

use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use cadenza_ir::{BlockId, Dfs, Graph, InstId};

#[derive(Debug, Default)]
pub struct DominatorTree {
    root: PackedOption<BlockId>,
    dfs_order: SecondaryMap<BlockId, u32>,
    idom: SecondaryMap<BlockId, PackedOption<BlockId>>,
    children: SecondaryMap<BlockId, Vec<BlockId>>,
}

impl DominatorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, graph: &mut Graph) {
        self.root = PackedOption::default();
        self.dfs_order = SecondaryMap::new();
        self.idom = SecondaryMap::new();
        self.children = SecondaryMap::new();

        let mut dfs = Dfs::new();
        dfs.run(graph);
        let order = dfs.order().to_vec();
        for (idx, &block) in order.iter().enumerate() {
            self.dfs_order[block] = idx as u32;
        }

        let start = graph.start_block();
        self.root = start.into();

        // The start block dominates every reachable block; the rest comes
        // from the pre-block-and-rerun probes.
        let mut dominators: SecondaryMap<BlockId, Vec<BlockId>> = SecondaryMap::new();
        for &block in &order {
            if block != start {
                dominators[block].push(start);
            }
        }
        for &blocked in &order {
            if blocked == start {
                continue;
            }
            dfs.run_blocked(graph, blocked);
            let reached: BTreeSet<BlockId> = dfs.order().iter().copied().collect();
            for &block in &order {
                if block != blocked && block != start && !reached.contains(&block) {
                    dominators[block].push(blocked);
                }
            }
        }

        for &block in &order {
            if block == start {
                continue;
            }
            let idom = dominators[block]
                .iter()
                .copied()
                .max_by_key(|&dom| self.dfs_order[dom])
                .expect("reachable block without a dominator");
            self.idom[block] = idom.into();
            self.children[idom].push(block);
        }
    }

    /// The tree root: the start block of the last computed graph.
    pub fn root(&self) -> Option<BlockId> {
        self.root.expand()
    }

    /// DFS preorder index assigned by the last [`Self::compute`].
    pub fn dfs_order_of(&self, block: BlockId) -> u32 {
        self.dfs_order[block]
    }

    /// The parent in the dominator tree; `None` for the start block and for
    /// blocks unreachable from it.
    pub fn idom_of(&self, block: BlockId) -> Option<BlockId> {
        self.idom[block].expand()
    }

    /// Blocks immediately dominated by `block`.
    pub fn dominatees_of(&self, block: BlockId) -> &[BlockId] {
        &self.children[block]
    }

    /// All strict dominators of `block`, unordered.
    pub fn dominators_of(&self, block: BlockId) -> BTreeSet<BlockId> {
        let mut dominators = BTreeSet::new();
        self.walk_dominators(block, |dom| {
            dominators.insert(dom);
        });
        dominators
    }

    /// All strict dominators of `block`, deepest first (the start block
    /// last).
    pub fn ordered_dominators_of(&self, block: BlockId) -> Vec<BlockId> {
        let mut dominators = Vec::new();
        self.walk_dominators(block, |dom| dominators.push(dom));
        dominators
    }

    fn walk_dominators(&self, block: BlockId, mut f: impl FnMut(BlockId)) {
        let mut current = self.idom_of(block);
        while let Some(dom) = current {
            f(dom);
            current = self.idom_of(dom);
        }
    }

    /// The lowest common ancestor of two blocks in the dominator tree,
    /// computed over the *strict* dominator chains: for a block and its own
    /// dominator this yields the dominator's parent.
    pub fn common_dominator(&self, b1: BlockId, b2: BlockId) -> Option<BlockId> {
        let doms1 = self.ordered_dominators_of(b1);
        let doms2 = self.ordered_dominators_of(b2);
        if doms1.is_empty() || doms2.is_empty() {
            return None;
        }

        let mut common = None;
        let mut iter = doms1.iter().rev().zip(doms2.iter().rev());
        while let Some((&d1, &d2)) = iter.next() {
            if d1 != d2 {
                break;
            }
            common = Some(d1);
        }
        common
    }

    /// The common dominator at instruction granularity: for instructions in
    /// different blocks, the last instruction of the blocks' common
    /// dominator; within one block, the last instruction strictly preceding
    /// both.
    pub fn common_inst_dominator(
        &self,
        graph: &Graph,
        i1: InstId,
        i2: InstId,
    ) -> Option<InstId> {
        let b1 = graph.inst_block(i1);
        let b2 = graph.inst_block(i2);
        if b1 != b2 {
            let lca = self.common_dominator(b1, b2)?;
            return graph.last_inst_of(lca);
        }

        let mut common = None;
        for inst in graph.iter_insts(b1) {
            if inst == i1 || inst == i2 {
                break;
            }
            common = Some(inst);
        }
        common
    }

    /// True iff `dominator` dominates `dominatee` (reflexively).
    pub fn block_dominates(&self, dominator: BlockId, dominatee: BlockId) -> bool {
        if dominator == dominatee {
            return true;
        }
        let mut current = dominatee;
        while let Some(idom) = self.idom_of(current) {
            if idom == dominator {
                return true;
            }
            current = idom;
        }
        false
    }

    /// True iff `dominator` dominates `dominatee` at instruction
    /// granularity: block-level dominance across blocks, strict program
    /// order within one. Irreflexive.
    pub fn inst_dominates(&self, graph: &Graph, dominator: InstId, dominatee: InstId) -> bool {
        let dominator_block = graph.inst_block(dominator);
        let dominatee_block = graph.inst_block(dominatee);
        if dominator_block != dominatee_block {
            return self.block_dominates(dominator_block, dominatee_block);
        }

        for inst in graph.iter_insts(dominator_block) {
            if inst == dominatee {
                return false;
            }
            if inst == dominator {
                return true;
            }
        }
        false
    }
}
