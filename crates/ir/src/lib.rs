//! The Cadenza intermediate representation: an SSA control-flow graph of
//! basic blocks, the builder that composes it, and the traversals and
//! def-use machinery the optimization passes are built on.

pub mod block;
pub mod builder;
pub mod call_graph;
pub mod graph;
pub mod ids;
pub mod inst;
pub mod ir_writer;
pub mod marker;
pub mod traversal;
pub mod types;
pub mod verify;

pub use block::Block;
pub use builder::IrBuilder;
pub use call_graph::CallGraph;
pub use graph::Graph;
pub use ids::{BlockId, InstId, MethodId};
pub use inst::{Inst, InstData, PhiDeps};
pub use ir_writer::GraphWriter;
pub use marker::Marker;
pub use traversal::{Dfs, Rpo};
pub use types::{CheckKind, CmpFlag, Opcode, ResultType};
