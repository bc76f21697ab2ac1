//! Textual dump of a graph, used by tests.

use std::fmt::{self, Write};

use crate::{BlockId, Graph, InstData, InstId};

/// Writes a graph in the line-oriented form
///
/// ```text
/// BB.<id>:
///     <inst-id>[p].<result-type> <mnemonic> <operands>
/// ```
///
/// The void result type is elided and φ instruction ids carry a trailing `p`.
pub struct GraphWriter<'a> {
    graph: &'a Graph,
}

impl<'a> GraphWriter<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    pub fn dump_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out).expect("writing to a string cannot fail");
        out
    }

    pub fn write(&self, w: &mut impl Write) -> fmt::Result {
        for block in self.graph.blocks() {
            self.write_block(w, block)?;
        }
        Ok(())
    }

    pub fn write_block(&self, w: &mut impl Write, block: BlockId) -> fmt::Result {
        writeln!(w, "BB.{}:", block.0)?;
        for inst in self.graph.iter_insts(block) {
            write!(w, "    ")?;
            self.write_inst(w, inst)?;
            writeln!(w)?;
        }
        Ok(())
    }

    pub fn write_inst(&self, w: &mut impl Write, inst: InstId) -> fmt::Result {
        let graph = self.graph;
        let data = graph.inst(inst).data();
        let phi_tag = if data.is_phi() { "p" } else { "" };
        write!(
            w,
            "{}{phi_tag}.{} {} ",
            inst.0,
            graph.inst(inst).result_ty(),
            data.opcode()
        )?;

        match data {
            InstData::Assign { value, .. } => write!(w, "{value}"),
            InstData::Arith { args, .. } | InstData::Load { args } => {
                write!(w, "v{}, v{}", args[0].0, args[1].0)
            }
            InstData::Compare { flag, args } => {
                write!(w, "{flag} v{}, v{}", args[0].0, args[1].0)
            }
            InstData::Branch => {
                let block = graph.inst_block(inst);
                let dest = graph.true_succ_of(block).expect("branch without successor");
                write!(w, "BB.{}", dest.0)
            }
            InstData::CondBranch { cond } => {
                let block = graph.inst_block(inst);
                let t = graph.true_succ_of(block).expect("branch without successor");
                let f = graph.false_succ_of(block).expect("branch without successor");
                write!(w, "v{}, BB.{}, BB.{}", cond.0, t.0, f.0)
            }
            InstData::Return { value } => match value {
                Some(value) => write!(w, "v{}", value.0),
                None => write!(w, "void"),
            },
            InstData::Phi { deps } => {
                let mut delim = "";
                for (value, blocks) in deps {
                    for block in blocks {
                        write!(w, "{delim}v{}:BB.{}", value.0, block.0)?;
                        delim = ", ";
                    }
                }
                Ok(())
            }
            InstData::Mem { count } => write!(w, "v{}", count.0),
            InstData::Store { args } => {
                write!(w, "v{}, v{}, v{}", args[0].0, args[1].0, args[2].0)
            }
            InstData::Check { kind, args } => {
                write!(w, "{kind}")?;
                let mut delim = " ";
                for arg in args {
                    write!(w, "{delim}v{}", arg.0)?;
                    delim = ", ";
                }
                Ok(())
            }
            InstData::CallStatic { callee, args } => {
                write!(
                    w,
                    "id: {} Ret: {}",
                    callee.0,
                    graph.inst(inst).result_ty()
                )?;
                let mut delim = " ";
                for arg in args {
                    write!(w, "{delim}v{}", arg.0)?;
                    delim = ", ";
                }
                Ok(())
            }
        }
    }
}
