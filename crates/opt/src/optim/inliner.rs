//! Static-call inlining: clone the callee body and splice it between the
//! calling block and its post-call tail.
//!
//! The work is split into a read-only plan taken from the callee graph and
//! an apply step that mutates the caller, so the two graphs are never
//! borrowed at once. The caller's blocks are walked by index: spliced
//! regions are appended and get scanned in turn, which inlines nested calls
//! (a callee's own call sites travel with its clone).

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use cadenza_ir::{
    BlockId, CallGraph, Graph, InstData, InstId, MethodId, Opcode, ResultType,
};

use super::{append_branch, find_or_make_const};

#[derive(Debug, Default)]
pub struct Inliner;

impl Inliner {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, call_graph: &mut CallGraph, caller: MethodId) {
        let mut block_idx = 0;
        while block_idx < call_graph.graph(caller).num_blocks() {
            let block = BlockId(block_idx as u32);
            if let Some((call, callee)) = Self::find_call(call_graph.graph(caller), block) {
                assert_ne!(callee, caller, "recursive inlining is not supported");
                let plan = CalleePlan::build(call_graph.graph(callee));
                plan.inline_into(call_graph.graph_mut(caller), call);
            }
            block_idx += 1;
        }
    }

    /// The first static call of `block`, if any. Everything after a call is
    /// moved out when it is inlined, so one hit per block scan suffices.
    fn find_call(graph: &Graph, block: BlockId) -> Option<(InstId, MethodId)> {
        for inst in graph.iter_insts(block) {
            if let InstData::CallStatic { callee, .. } = graph.inst(inst).data() {
                return Some((inst, *callee));
            }
        }
        None
    }
}

/// A read-only snapshot of a callee body, sufficient to clone it into any
/// caller.
struct CalleePlan {
    /// Start-block constants: (callee inst, result type, literal).
    consts: Vec<(InstId, ResultType, i64)>,
    /// Start-block parameters: (callee inst, parameter index).
    params: Vec<(InstId, usize)>,
    /// The callee start block's true successor: the body entry.
    body_entry: BlockId,
    /// Every non-start block in creation order.
    blocks: Vec<PlannedBlock>,
}

struct PlannedBlock {
    old: BlockId,
    true_succ: Option<BlockId>,
    false_succ: Option<BlockId>,
    insts: Vec<PlannedInst>,
    /// The value returned by this block's terminator, if it is a `Return`
    /// with one.
    ret_value: Option<InstId>,
}

struct PlannedInst {
    old: InstId,
    ty: ResultType,
    kind: PlannedInstKind,
}

enum PlannedInstKind {
    /// Shallow-copy: the payload still names callee instructions and is
    /// remapped after all clones exist.
    Copy(InstData),
    /// A `Return` terminator, replaced by a branch to the post-call block.
    BranchFromReturn,
}

impl CalleePlan {
    fn build(callee: &Graph) -> Self {
        let start = callee.start_block();

        let mut consts = Vec::new();
        let mut params = Vec::new();
        for inst in callee.iter_insts(start) {
            match callee.inst(inst).data() {
                InstData::Assign {
                    op: Opcode::Constant,
                    value,
                } => consts.push((inst, callee.inst(inst).result_ty(), *value)),
                InstData::Assign {
                    op: Opcode::Parameter,
                    value,
                } => params.push((inst, *value as usize)),
                InstData::Branch => {}
                data => panic!(
                    "unexpected {} in a callee start block",
                    data.opcode()
                ),
            }
        }

        let body_entry = callee
            .true_succ_of(start)
            .expect("callee start block has no body successor");

        let mut blocks = Vec::new();
        for block in callee.blocks() {
            if block == start {
                continue;
            }
            let mut insts = Vec::new();
            let mut ret_value = None;
            for inst in callee.iter_insts(block) {
                let ty = callee.inst(inst).result_ty();
                let kind = match callee.inst(inst).data() {
                    InstData::Return { value } => {
                        ret_value = *value;
                        PlannedInstKind::BranchFromReturn
                    }
                    data => PlannedInstKind::Copy(data.clone()),
                };
                insts.push(PlannedInst {
                    old: inst,
                    ty,
                    kind,
                });
            }
            blocks.push(PlannedBlock {
                old: block,
                true_succ: callee.true_succ_of(block),
                false_succ: callee.false_succ_of(block),
                insts,
                ret_value,
            });
        }

        Self {
            consts,
            params,
            body_entry,
            blocks,
        }
    }

    fn inline_into(&self, graph: &mut Graph, call: InstId) {
        let call_args = graph.inst(call).inputs();
        let caller_block = graph.inst_block(call);

        // Callee constants dedup into the caller's start block; parameters
        // become the call arguments.
        let mut inst_map: FxHashMap<InstId, InstId> = FxHashMap::default();
        for &(old, ty, value) in &self.consts {
            inst_map.insert(old, find_or_make_const(graph, ty, value));
        }
        for &(old, index) in &self.params {
            inst_map.insert(old, call_args[index]);
        }

        // Shallow-copy every body block. Copied payloads still name callee
        // instructions; they are remapped below, once the map is complete.
        let mut block_map: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        for planned in &self.blocks {
            let new_block = graph.make_block();
            block_map.insert(planned.old, new_block);
            for inst in &planned.insts {
                let new_inst = match &inst.kind {
                    PlannedInstKind::Copy(data) if data.is_phi() => {
                        graph.insert_phi_inst(new_block, inst.ty)
                    }
                    PlannedInstKind::Copy(data) => {
                        let new_inst = graph.make_inst(inst.ty, data.clone());
                        graph.link_inst_back(new_inst, new_block);
                        new_inst
                    }
                    PlannedInstKind::BranchFromReturn => append_branch(graph, new_block),
                };
                inst_map.insert(inst.old, new_inst);
            }
        }

        // Translate successor edges; return blocks flow into a fresh
        // post-call block instead, accumulating their returned values.
        let post_call = graph.make_block();
        let mut returns: SmallVec<[(BlockId, InstId); 2]> = SmallVec::new();
        for planned in &self.blocks {
            let new_block = block_map[&planned.old];
            if let Some(f) = planned.false_succ {
                graph.set_false_successor(new_block, block_map[&f]);
            }
            match planned.true_succ {
                Some(t) => graph.set_true_successor(new_block, block_map[&t]),
                None => {
                    graph.set_true_successor(new_block, post_call);
                    if let Some(value) = planned.ret_value {
                        returns.push((new_block, inst_map[&value]));
                    }
                }
            }
        }

        // A single returned value replaces the call directly; several merge
        // in a φ over the return blocks; a void callee yields nothing.
        let replacement = match returns.as_slice() {
            [] => None,
            [(_, value)] => Some(*value),
            [(_, first), ..] => {
                let ty = graph.inst(*first).result_ty();
                let phi = graph.insert_phi_inst(post_call, ty);
                for &(block, value) in &returns {
                    graph.resolve_phi_dependency(phi, value, block);
                }
                Some(phi)
            }
        };

        // Rewire the clones through the maps and only then register them as
        // users of their final inputs.
        for planned in &self.blocks {
            for inst in &planned.insts {
                let new_inst = inst_map[&inst.old];
                match &inst.kind {
                    PlannedInstKind::Copy(data) if data.is_phi() => {
                        for (old_value, old_blocks) in data.phi_deps() {
                            let value = inst_map[old_value];
                            for old_block in old_blocks {
                                graph.resolve_phi_dependency(
                                    new_inst,
                                    value,
                                    block_map[old_block],
                                );
                            }
                        }
                    }
                    PlannedInstKind::Copy(_) => {
                        graph.rewrite_inputs(new_inst, |input| {
                            *input = *inst_map
                                .get(input)
                                .expect("cloned instruction input escapes the callee");
                        });
                        graph.attach_users(new_inst);
                    }
                    PlannedInstKind::BranchFromReturn => {}
                }
            }
        }

        // Move the post-call tail of the calling block out, then route the
        // caller through the cloned body.
        while let Some(inst) = graph.next_inst_of(call) {
            graph.transfer_inst(inst, post_call);
        }
        graph.update_control_flow(
            caller_block,
            Some(block_map[&self.body_entry]),
            None,
            post_call,
        );
        append_branch(graph, caller_block);

        match replacement {
            Some(replacement) => graph.update_users_and_eliminate(call, replacement),
            None => {
                assert_eq!(graph.inst(call).result_ty(), ResultType::Void);
                graph.eliminate(call);
            }
        }
    }
}
