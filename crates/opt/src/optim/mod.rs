//! Graph transformations.

pub mod check_elim;
pub mod inliner;
pub mod peephole;

pub use check_elim::CheckElim;
pub use inliner::Inliner;
pub use peephole::Peephole;

use cadenza_ir::{BlockId, Graph, InstData, InstId, Opcode, ResultType};

/// Returns a constant with the given literal from the start block, minting
/// one immediately before the block's terminator if none exists. The scan
/// matches on the literal alone, so an optimizer-wide value has one home.
pub(crate) fn find_or_make_const(graph: &mut Graph, ty: ResultType, value: i64) -> InstId {
    let start = graph.start_block();
    for inst in graph.iter_insts(start) {
        if let InstData::Assign {
            op: Opcode::Constant,
            value: existing,
        } = graph.inst(inst).data()
        {
            if *existing == value {
                return inst;
            }
        }
    }

    let terminator = graph
        .last_inst_of(start)
        .expect("start block has no terminator");
    graph.insert_inst_before(
        terminator,
        ty,
        InstData::Assign {
            op: Opcode::Constant,
            value,
        },
    )
}

/// Appends an unconditional branch to `block`; the target is whatever the
/// block's true successor is wired to.
pub(crate) fn append_branch(graph: &mut Graph, block: BlockId) -> InstId {
    graph.insert_inst_back(block, ResultType::Void, InstData::Branch)
}
