//! Instruction data definitions.
//!
//! The instruction hierarchy is a single tagged enum with one variant per
//! opcode family; opcode-directed behavior is a `match` over the tag.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::{BlockId, CheckKind, CmpFlag, InstId, MethodId, Opcode, ResultType};

/// Value dependencies of a φ: incoming value → predecessor blocks it flows
/// in from. Keyed by instruction so that merges after rewrites are cheap and
/// iteration is deterministic.
pub type PhiDeps = BTreeMap<InstId, SmallVec<[BlockId; 2]>>;

/// An instruction: its result type plus the family payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    ty: ResultType,
    data: InstData,
}

impl Inst {
    pub fn new(ty: ResultType, data: InstData) -> Self {
        Self { ty, data }
    }

    pub fn result_ty(&self) -> ResultType {
        self.ty
    }

    pub fn data(&self) -> &InstData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut InstData {
        &mut self.data
    }

    pub fn opcode(&self) -> Opcode {
        self.data.opcode()
    }

    pub fn is_phi(&self) -> bool {
        self.data.is_phi()
    }

    /// Ordered inputs. A φ carries none; its def-use edges run through the
    /// value-dependency keys instead.
    pub fn inputs(&self) -> SmallVec<[InstId; 3]> {
        self.data.inputs()
    }

    pub fn input(&self, idx: usize) -> InstId {
        self.inputs()[idx]
    }
}

/// The family payload of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum InstData {
    /// `Parameter` or `Constant`: a parameter index or a literal.
    Assign { op: Opcode, value: i64 },

    /// `Add`, `Mul`, `Shl` or `Xor`.
    Arith { op: Opcode, args: [InstId; 2] },

    /// `Compare`; BOOL result.
    Compare { flag: CmpFlag, args: [InstId; 2] },

    /// Unconditional branch; targets the owning block's true successor.
    Branch,

    /// Conditional branch on a BOOL input; targets the owning block's
    /// true/false successors.
    CondBranch { cond: InstId },

    /// Return with an optional value.
    Return { value: Option<InstId> },

    /// SSA join.
    Phi { deps: PhiDeps },

    /// Allocate a buffer of `count` elements; the result type is the
    /// element type.
    Mem { count: InstId },

    /// `args = [mem, index]`.
    Load { args: [InstId; 2] },

    /// `args = [mem, index, value]`.
    Store { args: [InstId; 3] },

    /// Runtime check: `Nil` takes the mem, `Bound` the mem and an index.
    Check {
        kind: CheckKind,
        args: SmallVec<[InstId; 2]>,
    },

    /// Direct call of a method registered in the call graph.
    CallStatic {
        callee: MethodId,
        args: SmallVec<[InstId; 4]>,
    },
}

impl InstData {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Assign { op, .. } => {
                debug_assert!(matches!(op, Opcode::Parameter | Opcode::Constant));
                *op
            }
            Self::Arith { op, .. } => {
                debug_assert!(matches!(
                    op,
                    Opcode::Add | Opcode::Mul | Opcode::Shl | Opcode::Xor
                ));
                *op
            }
            Self::Compare { .. } => Opcode::Compare,
            Self::Branch => Opcode::Branch,
            Self::CondBranch { .. } => Opcode::CondBranch,
            Self::Return { .. } => Opcode::Return,
            Self::Phi { .. } => Opcode::Phi,
            Self::Mem { .. } => Opcode::Mem,
            Self::Load { .. } => Opcode::Load,
            Self::Store { .. } => Opcode::Store,
            Self::Check { .. } => Opcode::Check,
            Self::CallStatic { .. } => Opcode::CallStatic,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi { .. })
    }

    pub fn inputs(&self) -> SmallVec<[InstId; 3]> {
        match self {
            Self::Assign { .. } | Self::Branch | Self::Phi { .. } => SmallVec::new(),
            Self::Arith { args, .. } | Self::Compare { args, .. } | Self::Load { args } => {
                args.iter().copied().collect()
            }
            Self::CondBranch { cond } => [*cond].into_iter().collect(),
            Self::Return { value } => value.iter().copied().collect(),
            Self::Mem { count } => [*count].into_iter().collect(),
            Self::Store { args } => args.iter().copied().collect(),
            Self::Check { args, .. } => args.iter().copied().collect(),
            Self::CallStatic { args, .. } => args.iter().copied().collect(),
        }
    }

    /// Visits every def-use source of this instruction: the ordered inputs
    /// for a non-φ, the value-dependency keys for a φ.
    pub fn for_each_dep(&self, mut f: impl FnMut(InstId)) {
        match self {
            Self::Phi { deps } => {
                for &value in deps.keys() {
                    f(value);
                }
            }
            _ => {
                for input in self.inputs() {
                    f(input);
                }
            }
        }
    }

    /// Rewrites inputs in place. φ dependencies are re-keyed maps and must be
    /// rewritten through the φ-specific operations instead.
    pub fn for_each_input_mut(&mut self, mut f: impl FnMut(&mut InstId)) {
        match self {
            Self::Assign { .. } | Self::Branch => {}
            Self::Phi { .. } => panic!("phi inputs are value-dependency keys"),
            Self::Arith { args, .. } | Self::Compare { args, .. } | Self::Load { args } => {
                args.iter_mut().for_each(&mut f)
            }
            Self::CondBranch { cond } => f(cond),
            Self::Return { value } => {
                if let Some(value) = value {
                    f(value)
                }
            }
            Self::Mem { count } => f(count),
            Self::Store { args } => args.iter_mut().for_each(&mut f),
            Self::Check { args, .. } => args.iter_mut().for_each(&mut f),
            Self::CallStatic { args, .. } => args.iter_mut().for_each(&mut f),
        }
    }

    pub fn phi_deps(&self) -> &PhiDeps {
        match self {
            Self::Phi { deps } => deps,
            _ => panic!("instruction is not a phi"),
        }
    }

    pub(crate) fn phi_deps_mut(&mut self) -> &mut PhiDeps {
        match self {
            Self::Phi { deps } => deps,
            _ => panic!("instruction is not a phi"),
        }
    }
}
