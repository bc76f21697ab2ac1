//! A stateful façade for composing graphs.

use smallvec::SmallVec;

use crate::{
    BlockId, CheckKind, CmpFlag, Graph, InstData, InstId, MethodId, Opcode, ResultType,
};

/// Builds instructions at a block-local insertion point.
///
/// Non-φ instructions are appended to the current block; φs follow the
/// block's φ discipline. Branch constructors register the successor edges of
/// the current block at the same time. Every created instruction's inputs
/// learn it as a user.
pub struct IrBuilder<'a> {
    graph: &'a mut Graph,
    block: Option<BlockId>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(graph: &'a mut Graph) -> Self {
        Self { graph, block: None }
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub fn make_block(&mut self) -> BlockId {
        self.graph.make_block()
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.block = Some(block);
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.block
    }

    fn block(&self) -> BlockId {
        self.block.expect("no insertion point set")
    }

    fn ty_of(&self, inst: InstId) -> ResultType {
        self.graph.inst(inst).result_ty()
    }

    fn insert(&mut self, ty: ResultType, data: InstData) -> InstId {
        let block = self.block();
        self.graph.insert_inst_back(block, ty, data)
    }

    // ----------------------------------------------------------- assignments

    /// An S32 integer literal.
    pub fn const_int(&mut self, value: i64) -> InstId {
        self.insert(
            ResultType::S32,
            InstData::Assign {
                op: Opcode::Constant,
                value,
            },
        )
    }

    pub fn param(&mut self, ty: ResultType, index: u32) -> InstId {
        assert_ne!(ty, ResultType::Void);
        self.insert(
            ty,
            InstData::Assign {
                op: Opcode::Parameter,
                value: i64::from(index),
            },
        )
    }

    // ------------------------------------------------------------ arithmetic

    fn binary(&mut self, op: Opcode, lhs: InstId, rhs: InstId) -> InstId {
        let (lhs_ty, rhs_ty) = (self.ty_of(lhs), self.ty_of(rhs));
        assert!(lhs_ty != ResultType::Void && rhs_ty != ResultType::Void);
        self.insert(lhs_ty.combine(rhs_ty), InstData::Arith { op, args: [lhs, rhs] })
    }

    pub fn add(&mut self, lhs: InstId, rhs: InstId) -> InstId {
        self.binary(Opcode::Add, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: InstId, rhs: InstId) -> InstId {
        self.binary(Opcode::Mul, lhs, rhs)
    }

    pub fn shl(&mut self, lhs: InstId, rhs: InstId) -> InstId {
        self.binary(Opcode::Shl, lhs, rhs)
    }

    pub fn xor(&mut self, lhs: InstId, rhs: InstId) -> InstId {
        self.binary(Opcode::Xor, lhs, rhs)
    }

    fn cmp(&mut self, flag: CmpFlag, lhs: InstId, rhs: InstId) -> InstId {
        assert!(self.ty_of(lhs) != ResultType::Void && self.ty_of(rhs) != ResultType::Void);
        self.insert(
            ResultType::Bool,
            InstData::Compare {
                flag,
                args: [lhs, rhs],
            },
        )
    }

    pub fn cmp_le(&mut self, lhs: InstId, rhs: InstId) -> InstId {
        self.cmp(CmpFlag::Le, lhs, rhs)
    }

    pub fn cmp_lt(&mut self, lhs: InstId, rhs: InstId) -> InstId {
        self.cmp(CmpFlag::Lt, lhs, rhs)
    }

    // ---------------------------------------------------------- control flow

    /// Unconditional branch; `dest` becomes the current block's true
    /// successor.
    pub fn jump(&mut self, dest: BlockId) -> InstId {
        let block = self.block();
        self.graph.set_true_successor(block, dest);
        self.insert(ResultType::Void, InstData::Branch)
    }

    /// Conditional branch on a BOOL value.
    pub fn br(&mut self, cond: InstId, then_dest: BlockId, else_dest: BlockId) -> InstId {
        debug_assert_eq!(self.ty_of(cond), ResultType::Bool);
        let block = self.block();
        self.graph.set_true_successor(block, then_dest);
        self.graph.set_false_successor(block, else_dest);
        self.insert(ResultType::Void, InstData::CondBranch { cond })
    }

    pub fn ret(&mut self, value: InstId) -> InstId {
        let ty = self.ty_of(value);
        assert_ne!(ty, ResultType::Void);
        self.insert(ty, InstData::Return { value: Some(value) })
    }

    pub fn ret_void(&mut self) -> InstId {
        self.insert(ResultType::Void, InstData::Return { value: None })
    }

    // ------------------------------------------------------------------ phis

    pub fn phi(&mut self, ty: ResultType) -> InstId {
        let block = self.block();
        self.graph.insert_phi_inst(block, ty)
    }

    /// Records `value` flowing into `phi` from predecessor `block`.
    pub fn append_phi_arg(&mut self, phi: InstId, value: InstId, block: BlockId) {
        self.graph.resolve_phi_dependency(phi, value, block);
    }

    // ---------------------------------------------------------------- memory

    /// Allocates a buffer of `count` elements of `elem_ty`.
    pub fn mem(&mut self, elem_ty: ResultType, count: InstId) -> InstId {
        assert_ne!(elem_ty, ResultType::Void);
        assert_ne!(self.ty_of(count), ResultType::Void);
        self.insert(elem_ty, InstData::Mem { count })
    }

    pub fn load(&mut self, mem: InstId, index: InstId) -> InstId {
        debug_assert_eq!(self.graph.inst(mem).opcode(), Opcode::Mem);
        assert_ne!(self.ty_of(index), ResultType::Void);
        let elem_ty = self.ty_of(mem);
        self.insert(elem_ty, InstData::Load { args: [mem, index] })
    }

    pub fn store(&mut self, mem: InstId, index: InstId, value: InstId) -> InstId {
        debug_assert_eq!(self.graph.inst(mem).opcode(), Opcode::Mem);
        assert_ne!(self.ty_of(index), ResultType::Void);
        assert_ne!(self.ty_of(value), ResultType::Void);
        assert!(
            self.ty_of(value) <= self.ty_of(mem),
            "stored value must fit the element type"
        );
        self.insert(
            ResultType::Void,
            InstData::Store {
                args: [mem, index, value],
            },
        )
    }

    pub fn nil_check(&mut self, mem: InstId) -> InstId {
        debug_assert_eq!(self.graph.inst(mem).opcode(), Opcode::Mem);
        self.insert(
            ResultType::Void,
            InstData::Check {
                kind: CheckKind::Nil,
                args: [mem].into_iter().collect(),
            },
        )
    }

    pub fn bound_check(&mut self, mem: InstId, index: InstId) -> InstId {
        debug_assert_eq!(self.graph.inst(mem).opcode(), Opcode::Mem);
        assert_ne!(self.ty_of(index), ResultType::Void);
        self.insert(
            ResultType::Void,
            InstData::Check {
                kind: CheckKind::Bound,
                args: [mem, index].into_iter().collect(),
            },
        )
    }

    // ----------------------------------------------------------------- calls

    pub fn call_static(&mut self, callee: MethodId, ret_ty: ResultType, args: &[InstId]) -> InstId {
        let args: SmallVec<[InstId; 4]> = args.iter().copied().collect();
        self.insert(ret_ty, InstData::CallStatic { callee, args })
    }
}
