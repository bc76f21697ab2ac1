//! The control-flow graph: block and instruction arenas, intra-block
//! instruction ordering, and def-use maintenance.

use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::{Block, BlockId, Inst, InstData, InstId, Marker, MethodId, PhiDeps, ResultType};

/// Ordering links of one instruction inside its block.
#[derive(Debug, Clone, Default, PartialEq)]
struct InstNode {
    block: PackedOption<BlockId>,
    prev: PackedOption<InstId>,
    next: PackedOption<InstId>,
}

/// A method body under construction or transformation.
///
/// Blocks and instructions are arena-allocated; eliminated instructions stay
/// in the arena but are unlinked from their block, so every live walk only
/// sees inserted instructions. The start block is the first created block.
#[derive(Debug, Default)]
pub struct Graph {
    method: PackedOption<MethodId>,
    blocks: PrimaryMap<BlockId, Block>,
    insts: PrimaryMap<InstId, Inst>,
    nodes: SecondaryMap<InstId, InstNode>,
    users: SecondaryMap<InstId, BTreeSet<InstId>>,
    epoch: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The method this graph implements; defined once the graph is linked
    /// into a call graph.
    pub fn method_id(&self) -> MethodId {
        self.method.expand().expect("graph is not linked to a call graph")
    }

    pub(crate) fn set_method_id(&mut self, method: MethodId) {
        debug_assert!(self.method.is_none());
        self.method = method.into();
    }

    // ---------------------------------------------------------------- blocks

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    pub fn start_block(&self) -> BlockId {
        self.blocks.keys().next().expect("graph has no blocks")
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in creation order. New blocks appended during a walk that
    /// re-reads [`Self::num_blocks`] are picked up by index iteration.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> {
        self.blocks.keys()
    }

    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    pub fn preds_of(&self, block: BlockId) -> &BTreeSet<BlockId> {
        &self.blocks[block].preds
    }

    /// Zero, one or two successors, the true successor first.
    pub fn succs_of(&self, block: BlockId) -> SmallVec<[BlockId; 2]> {
        let block = &self.blocks[block];
        let mut succs = SmallVec::new();
        if let Some(t) = block.true_succ.expand() {
            succs.push(t);
        }
        if let Some(f) = block.false_succ.expand() {
            succs.push(f);
        }
        succs
    }

    pub fn true_succ_of(&self, block: BlockId) -> Option<BlockId> {
        self.blocks[block].true_succ.expand()
    }

    pub fn false_succ_of(&self, block: BlockId) -> Option<BlockId> {
        self.blocks[block].false_succ.expand()
    }

    /// Sets the (empty) true-successor slot and registers the reverse edge.
    pub fn set_true_successor(&mut self, block: BlockId, succ: BlockId) {
        let node = &mut self.blocks[block];
        assert!(node.true_succ.is_none(), "true successor is already set");
        assert_ne!(node.false_succ.expand(), Some(succ), "successors must differ");
        node.true_succ = succ.into();
        self.blocks[succ].preds.insert(block);
    }

    /// Sets the (empty) false-successor slot and registers the reverse edge.
    pub fn set_false_successor(&mut self, block: BlockId, succ: BlockId) {
        let node = &mut self.blocks[block];
        assert!(node.false_succ.is_none(), "false successor is already set");
        assert_ne!(node.true_succ.expand(), Some(succ), "successors must differ");
        node.false_succ = succ.into();
        self.blocks[succ].preds.insert(block);
    }

    pub fn remove_predecessor(&mut self, block: BlockId, pred: BlockId) {
        self.blocks[block].preds.remove(&pred);
    }

    /// Redirects `block`'s control flow through `donor`: the donor inherits
    /// both current successors of `block`, then `block` adopts
    /// `(new_true, new_false)`. The donor must have no successors yet.
    pub fn update_control_flow(
        &mut self,
        block: BlockId,
        new_true: Option<BlockId>,
        new_false: Option<BlockId>,
        donor: BlockId,
    ) {
        assert!(self.blocks[donor].true_succ.is_none());
        assert!(self.blocks[donor].false_succ.is_none());

        if let Some(t) = self.blocks[block].true_succ.take() {
            self.blocks[t].preds.remove(&block);
            self.set_true_successor(donor, t);
        }
        if let Some(f) = self.blocks[block].false_succ.take() {
            self.blocks[f].preds.remove(&block);
            self.set_false_successor(donor, f);
        }

        if let Some(t) = new_true {
            self.blocks[block].true_succ = t.into();
            self.blocks[t].preds.insert(block);
        }
        if let Some(f) = new_false {
            self.blocks[block].false_succ = f.into();
            self.blocks[f].preds.insert(block);
        }
    }

    // --------------------------------------------------------------- markers

    /// Draws a fresh marker, invalidating every mark of earlier draws.
    pub fn new_marker(&mut self) -> Marker {
        self.epoch = self.epoch.checked_add(1).expect("marker supply exhausted");
        Marker(self.epoch)
    }

    pub fn mark_block(&mut self, block: BlockId, marker: Marker) {
        self.blocks[block].mark = marker.0;
    }

    pub fn block_is_marked(&self, block: BlockId, marker: Marker) -> bool {
        self.blocks[block].mark == marker.0
    }

    // ---------------------------------------------------------- instructions

    pub fn inst(&self, inst: InstId) -> &Inst {
        &self.insts[inst]
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Creates an instruction without linking it into a block or registering
    /// def-use edges. Callers rewiring cloned instructions link and
    /// [`Self::attach_users`] once the inputs are final.
    pub fn make_inst(&mut self, ty: ResultType, data: InstData) -> InstId {
        self.insts.push(Inst::new(ty, data))
    }

    /// Registers `inst` as a user of each of its def-use sources.
    pub fn attach_users(&mut self, inst: InstId) {
        let mut deps: SmallVec<[InstId; 4]> = SmallVec::new();
        self.insts[inst].data().for_each_dep(|dep| deps.push(dep));
        for dep in deps {
            self.users[dep].insert(inst);
        }
    }

    /// Creates a non-φ instruction at the back of `block`.
    pub fn insert_inst_back(&mut self, block: BlockId, ty: ResultType, data: InstData) -> InstId {
        assert!(!data.is_phi(), "phis go through `insert_phi_inst`");
        let inst = self.make_inst(ty, data);
        self.link_inst_back(inst, block);
        self.attach_users(inst);
        inst
    }

    /// Creates a φ with no dependencies yet, placed right after the block's
    /// last φ (or at the front).
    pub fn insert_phi_inst(&mut self, block: BlockId, ty: ResultType) -> InstId {
        assert_ne!(ty, ResultType::Void);
        let inst = self.make_inst(ty, InstData::Phi { deps: PhiDeps::new() });
        self.link_phi_inst(inst, block);
        inst
    }

    /// Creates a non-φ instruction immediately before `before`.
    pub fn insert_inst_before(&mut self, before: InstId, ty: ResultType, data: InstData) -> InstId {
        assert!(!data.is_phi(), "phis go through `insert_phi_inst`");
        let inst = self.make_inst(ty, data);
        self.link_inst_before(inst, before);
        self.attach_users(inst);
        inst
    }

    pub fn inst_block(&self, inst: InstId) -> BlockId {
        debug_assert!(self.is_inst_inserted(inst));
        self.nodes[inst].block.unwrap()
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.nodes[inst] != InstNode::default()
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block].first_inst.expand()
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block].last_inst.expand()
    }

    pub fn prev_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.nodes[inst].prev.expand()
    }

    pub fn next_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.nodes[inst].next.expand()
    }

    /// Instructions of `block` in order. The iterator reads the chain lazily,
    /// so the current instruction may be unlinked mid-walk as long as the
    /// caller pre-reads [`Self::next_inst_of`] first.
    pub fn iter_insts(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        InstIter {
            next: self.blocks[block].first_inst.expand(),
            nodes: &self.nodes,
        }
    }

    pub fn alive_inst_count(&self, block: BlockId) -> usize {
        self.iter_insts(block).count()
    }

    // ------------------------------------------------------- ordering links

    pub fn link_inst_back(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.insts[inst].is_phi());
        self.link_inst_back_raw(inst, block);
    }

    pub fn link_phi_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.is_inst_inserted(inst));
        debug_assert!(self.insts[inst].is_phi());

        match self.blocks[block].last_phi.expand() {
            Some(last_phi) => match self.nodes[last_phi].next.expand() {
                Some(next) => self.link_inst_before_raw(inst, next),
                None => self.link_inst_back_raw(inst, block),
            },
            None => self.link_inst_front(inst, block),
        }
        self.blocks[block].last_phi = inst.into();
    }

    pub fn link_inst_before(&mut self, inst: InstId, before: InstId) {
        debug_assert!(!self.insts[inst].is_phi());
        self.link_inst_before_raw(inst, before);
    }

    fn link_inst_front(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.is_inst_inserted(inst));

        let block_node = &mut self.blocks[block];
        let mut node = InstNode {
            block: block.into(),
            ..InstNode::default()
        };

        if let Some(first) = block_node.first_inst.expand() {
            node.next = first.into();
            self.nodes[first].prev = inst.into();
        } else {
            block_node.last_inst = inst.into();
        }

        self.blocks[block].first_inst = inst.into();
        self.nodes[inst] = node;
    }

    fn link_inst_back_raw(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.is_inst_inserted(inst));

        let block_node = &mut self.blocks[block];
        let mut node = InstNode {
            block: block.into(),
            ..InstNode::default()
        };

        if let Some(last) = block_node.last_inst.expand() {
            node.prev = last.into();
            self.nodes[last].next = inst.into();
        } else {
            block_node.first_inst = inst.into();
        }

        self.blocks[block].last_inst = inst.into();
        self.nodes[inst] = node;
    }

    fn link_inst_before_raw(&mut self, inst: InstId, before: InstId) {
        debug_assert!(self.is_inst_inserted(before));
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.nodes[before].block.unwrap();
        let mut node = InstNode {
            block: block.into(),
            ..InstNode::default()
        };

        match self.nodes[before].prev.expand() {
            Some(prev) => {
                node.prev = prev.into();
                self.nodes[prev].next = inst.into();
            }
            None => self.blocks[block].first_inst = inst.into(),
        }
        node.next = before.into();
        self.nodes[before].prev = inst.into();
        self.nodes[inst] = node;
    }

    /// Removes `inst` from its block's chain. Def-use edges are untouched;
    /// use [`Self::eliminate`] to retire an instruction for good.
    pub fn unlink_inst(&mut self, inst: InstId) {
        debug_assert!(self.is_inst_inserted(inst));

        let node = self.nodes[inst].clone();
        let block = node.block.unwrap();
        let (prev, next) = (node.prev.expand(), node.next.expand());

        match (prev, next) {
            (Some(prev), Some(next)) => {
                self.nodes[prev].next = next.into();
                self.nodes[next].prev = prev.into();
            }
            (Some(prev), None) => {
                self.nodes[prev].next = None.into();
                self.blocks[block].last_inst = prev.into();
            }
            (None, Some(next)) => {
                self.nodes[next].prev = None.into();
                self.blocks[block].first_inst = next.into();
            }
            (None, None) => {
                self.blocks[block].first_inst = None.into();
                self.blocks[block].last_inst = None.into();
            }
        }

        if self.blocks[block].last_phi.expand() == Some(inst) {
            self.blocks[block].last_phi = match prev {
                Some(prev) if self.insts[prev].is_phi() => prev.into(),
                _ => None.into(),
            };
        }

        self.nodes[inst] = InstNode::default();
    }

    /// Moves `inst` to the back of `block` (φ discipline respected) and
    /// rewrites the predecessor tag of this value inside every φ user.
    pub fn transfer_inst(&mut self, inst: InstId, block: BlockId) {
        let old_block = self.inst_block(inst);
        self.unlink_inst(inst);
        if self.insts[inst].is_phi() {
            self.link_phi_inst(inst, block);
        } else {
            self.link_inst_back(inst, block);
        }

        let users: SmallVec<[InstId; 4]> = self.users[inst].iter().copied().collect();
        for user in users {
            if self.insts[user].is_phi() {
                self.phi_update_value_block(user, inst, old_block, block);
            }
        }
    }

    // --------------------------------------------------------------- def-use

    pub fn users(&self, inst: InstId) -> &BTreeSet<InstId> {
        &self.users[inst]
    }

    pub fn add_user(&mut self, inst: InstId, user: InstId) {
        self.users[inst].insert(user);
    }

    pub fn remove_user(&mut self, inst: InstId, user: InstId) {
        self.users[inst].remove(&user);
    }

    /// Replaces the first occurrence of `old` in `user`'s input list.
    /// User-set maintenance is the caller's concern.
    pub fn update_inputs(&mut self, user: InstId, old: InstId, new: InstId) {
        let mut replaced = false;
        self.insts[user].data_mut().for_each_input_mut(|input| {
            if !replaced && *input == old {
                *input = new;
                replaced = true;
            }
        });
    }

    /// Rewrites every input of a non-φ instruction in place. Used when
    /// rewiring shallow copies; call [`Self::attach_users`] afterwards.
    pub fn rewrite_inputs(&mut self, inst: InstId, f: impl FnMut(&mut InstId)) {
        self.insts[inst].data_mut().for_each_input_mut(f);
    }

    /// Migrates `old`'s users onto `new` (φ users re-key their dependency),
    /// then eliminates `old`.
    pub fn update_users_and_eliminate(&mut self, old: InstId, new: InstId) {
        assert_ne!(old, new);

        let users = std::mem::take(&mut self.users[old]);
        for &user in &users {
            if self.insts[user].is_phi() {
                self.phi_update_dependencies(user, old, new);
            } else {
                self.update_inputs(user, old, new);
            }
        }
        self.users[new].extend(users);
        self.eliminate(old);
    }

    /// Detaches `inst` from the def-use web and unlinks it from its block.
    /// The instruction must have no remaining users.
    pub fn eliminate(&mut self, inst: InstId) {
        assert!(
            self.users[inst].is_empty(),
            "cannot eliminate an instruction with live users"
        );

        let mut deps: SmallVec<[InstId; 4]> = SmallVec::new();
        self.insts[inst].data().for_each_dep(|dep| deps.push(dep));
        for dep in deps {
            self.users[dep].remove(&inst);
        }
        self.unlink_inst(inst);
    }

    // ------------------------------------------------------------------ phis

    pub fn phi_deps(&self, phi: InstId) -> &PhiDeps {
        self.insts[phi].data().phi_deps()
    }

    /// Records that `value` flows into `phi` from predecessor `block`.
    pub fn resolve_phi_dependency(&mut self, phi: InstId, value: InstId, block: BlockId) {
        assert_eq!(
            self.insts[value].result_ty(),
            self.insts[phi].result_ty(),
            "phi dependency type mismatch"
        );
        self.insts[phi]
            .data_mut()
            .phi_deps_mut()
            .entry(value)
            .or_default()
            .push(block);
        self.users[value].insert(phi);
    }

    /// Re-keys a value dependency; if `new` is already a key the predecessor
    /// lists are merged.
    pub fn phi_update_dependencies(&mut self, phi: InstId, old: InstId, new: InstId) {
        let deps = self.insts[phi].data_mut().phi_deps_mut();
        let blocks = deps.remove(&old).expect("phi does not depend on this value");
        deps.entry(new).or_default().extend(blocks);
    }

    /// Rewrites the predecessor tag of `value`'s entry from `old_block` to
    /// `new_block`.
    pub fn phi_update_value_block(
        &mut self,
        phi: InstId,
        value: InstId,
        old_block: BlockId,
        new_block: BlockId,
    ) {
        let deps = self.insts[phi].data_mut().phi_deps_mut();
        let blocks = deps.get_mut(&value).expect("phi does not depend on this value");
        for block in blocks {
            if *block == old_block {
                *block = new_block;
            }
        }
    }

    /// True iff exactly one distinct value flows in, regardless of how many
    /// predecessors carry it.
    pub fn phi_has_only_one_dependency(&self, phi: InstId) -> bool {
        self.insts[phi].data().phi_deps().len() == 1
    }
}

struct InstIter<'a> {
    next: Option<InstId>,
    nodes: &'a SecondaryMap<InstId, InstNode>,
}

impl Iterator for InstIter<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let next = self.next?;
        self.next = self.nodes[next].next.expand();
        Some(next)
    }
}
