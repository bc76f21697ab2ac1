//! Depth-first and reverse post-order block traversals.

use crate::{BlockId, Graph, Marker};

/// Preorder depth-first search from the start block.
///
/// Each run draws a fresh marker, so repeated runs are free. The blocked
/// variant pre-marks one block, which makes everything only reachable
/// through it invisible; the dominator computation is built on this.
#[derive(Debug, Default)]
pub struct Dfs {
    order: Vec<BlockId>,
}

impl Dfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks in preorder, the start block first.
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    pub fn run(&mut self, graph: &mut Graph) {
        self.order.clear();
        let marker = graph.new_marker();
        let start = graph.start_block();
        self.visit(graph, start, marker);
    }

    /// Runs with `blocked` pre-marked, so the traversal never enters it.
    pub fn run_blocked(&mut self, graph: &mut Graph, blocked: BlockId) {
        self.order.clear();
        let marker = graph.new_marker();
        graph.mark_block(blocked, marker);
        let start = graph.start_block();
        self.visit(graph, start, marker);
    }

    fn visit(&mut self, graph: &mut Graph, block: BlockId, marker: Marker) {
        graph.mark_block(block, marker);
        self.order.push(block);
        for succ in graph.succs_of(block) {
            if !graph.block_is_marked(succ, marker) {
                self.visit(graph, succ, marker);
            }
        }
    }
}

/// Reverse post-order: every block precedes its forward-reachable successors
/// except across back-edges. This is the iteration order of the rewriting
/// passes.
#[derive(Debug, Default)]
pub struct Rpo {
    order: Vec<BlockId>,
}

impl Rpo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    pub fn run(&mut self, graph: &mut Graph) {
        self.order.clear();
        let marker = graph.new_marker();
        let start = graph.start_block();
        self.visit(graph, start, marker);
        self.order.reverse();
    }

    fn visit(&mut self, graph: &mut Graph, block: BlockId, marker: Marker) {
        graph.mark_block(block, marker);
        for succ in graph.succs_of(block) {
            if !graph.block_is_marked(succ, marker) {
                self.visit(graph, succ, marker);
            }
        }
        self.order.push(block);
    }
}
