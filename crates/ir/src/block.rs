//! Basic block data definition.

use std::collections::BTreeSet;

use cranelift_entity::packed_option::PackedOption;

use crate::{BlockId, InstId};

/// A node of the control-flow graph.
///
/// The instruction list itself is a doubly-linked chain threaded through the
/// graph's per-instruction link nodes; the block holds the chain ends plus a
/// cached pointer to the last φ so that φs stay contiguous at the top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub(crate) preds: BTreeSet<BlockId>,
    pub(crate) true_succ: PackedOption<BlockId>,
    pub(crate) false_succ: PackedOption<BlockId>,
    pub(crate) first_inst: PackedOption<InstId>,
    pub(crate) last_inst: PackedOption<InstId>,
    pub(crate) last_phi: PackedOption<InstId>,
    pub(crate) mark: u64,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preds(&self) -> &BTreeSet<BlockId> {
        &self.preds
    }

    pub fn true_succ(&self) -> Option<BlockId> {
        self.true_succ.expand()
    }

    pub fn false_succ(&self) -> Option<BlockId> {
        self.false_succ.expand()
    }
}
