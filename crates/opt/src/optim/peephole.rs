//! Peephole and algebraic simplification.
//!
//! Blocks are visited in RPO; within a block the cursor pre-reads the next
//! link, so a handler may retire the current instruction. Every successful
//! match funnels through `update_users_and_eliminate`, which keeps the
//! def-use web consistent.

use cadenza_ir::{Graph, InstData, InstId, Opcode, ResultType, Rpo};

use super::find_or_make_const;

#[derive(Debug, Default)]
pub struct Peephole;

impl Peephole {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, graph: &mut Graph) {
        let mut rpo = Rpo::new();
        rpo.run(graph);

        for &block in rpo.order() {
            let mut cursor = graph.first_inst_of(block);
            while let Some(inst) = cursor {
                let next = graph.next_inst_of(inst);
                match graph.inst(inst).opcode() {
                    Opcode::Add => Self::optimize_add(graph, inst),
                    Opcode::Shl => Self::optimize_shl(graph, inst),
                    Opcode::Xor => Self::optimize_xor(graph, inst),
                    Opcode::Phi => Self::optimize_phi(graph, inst),
                    _ => {}
                }
                cursor = next;
            }
        }
    }

    fn const_value(graph: &Graph, inst: InstId) -> Option<i64> {
        match graph.inst(inst).data() {
            InstData::Assign {
                op: Opcode::Constant,
                value,
            } => Some(*value),
            _ => None,
        }
    }

    fn arith_args(graph: &Graph, inst: InstId) -> [InstId; 2] {
        match graph.inst(inst).data() {
            InstData::Arith { args, .. } => *args,
            _ => panic!("not an arithmetic instruction"),
        }
    }

    /// Folds both-constant operands into a reused or fresh constant of the
    /// combined operand type.
    fn fold(graph: &mut Graph, inst: InstId, lhs: InstId, rhs: InstId, value: i64) {
        let ty = graph
            .inst(lhs)
            .result_ty()
            .combine(graph.inst(rhs).result_ty());
        let folded = find_or_make_const(graph, ty, value);
        graph.update_users_and_eliminate(inst, folded);
    }

    fn optimize_add(graph: &mut Graph, inst: InstId) {
        let [lhs, rhs] = Self::arith_args(graph, inst);
        match (Self::const_value(graph, lhs), Self::const_value(graph, rhs)) {
            (Some(a), Some(b)) => Self::fold(graph, inst, lhs, rhs, a.wrapping_add(b)),
            (Some(0), None) => graph.update_users_and_eliminate(inst, rhs),
            (None, Some(0)) => graph.update_users_and_eliminate(inst, lhs),
            (Some(_), None) | (None, Some(_)) => {}
            (None, None) => {
                if lhs == rhs {
                    // x + x reads better as a shift.
                    let one = find_or_make_const(graph, ResultType::U8, 1);
                    let ty = graph.inst(inst).result_ty();
                    let shl = graph.insert_inst_before(
                        inst,
                        ty,
                        InstData::Arith {
                            op: Opcode::Shl,
                            args: [lhs, one],
                        },
                    );
                    graph.update_users_and_eliminate(inst, shl);
                }
            }
        }
    }

    fn optimize_shl(graph: &mut Graph, inst: InstId) {
        let [lhs, rhs] = Self::arith_args(graph, inst);
        match (Self::const_value(graph, lhs), Self::const_value(graph, rhs)) {
            (Some(a), Some(b)) => Self::fold(graph, inst, lhs, rhs, a.wrapping_shl(b as u32)),
            (Some(0), None) => {
                let zero = find_or_make_const(graph, ResultType::U8, 0);
                graph.update_users_and_eliminate(inst, zero);
            }
            (None, Some(0)) => graph.update_users_and_eliminate(inst, lhs),
            _ => {}
        }
    }

    fn optimize_xor(graph: &mut Graph, inst: InstId) {
        let [lhs, rhs] = Self::arith_args(graph, inst);
        match (Self::const_value(graph, lhs), Self::const_value(graph, rhs)) {
            (Some(a), Some(b)) => Self::fold(graph, inst, lhs, rhs, a ^ b),
            (Some(0), None) => graph.update_users_and_eliminate(inst, rhs),
            (None, Some(0)) => graph.update_users_and_eliminate(inst, lhs),
            (Some(_), None) | (None, Some(_)) => {}
            (None, None) => {
                if lhs == rhs {
                    let zero = find_or_make_const(graph, ResultType::U8, 0);
                    graph.update_users_and_eliminate(inst, zero);
                }
            }
        }
    }

    /// A φ fed by a single distinct value is that value.
    fn optimize_phi(graph: &mut Graph, inst: InstId) {
        if graph.phi_has_only_one_dependency(inst) {
            let value = *graph.phi_deps(inst).keys().next().unwrap();
            graph.update_users_and_eliminate(inst, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_ir::{verify::verify_graph, GraphWriter, IrBuilder};

    fn run(graph: &mut Graph) {
        Peephole::new().run(graph);
        verify_graph(graph);
    }

    /// `value + 0` collapses to the parameter.
    #[test]
    fn add_zero_identity() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let v0 = builder.param(ResultType::S32, 0);
        let v1 = builder.const_int(0);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v3 = builder.add(v0, v1);
        let v4 = builder.ret(v3);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 1);
        assert_eq!(graph.inst(v4).inputs().as_slice(), &[v0]);
        assert_eq!(graph.users(v0).iter().copied().collect::<Vec<_>>(), vec![v4]);
    }

    /// `value + value` becomes a shift by a fresh U8 one.
    #[test]
    fn add_same_value_becomes_shl() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let v0 = builder.param(ResultType::S32, 0);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v2 = builder.add(v0, v0);
        let v3 = builder.ret(v2);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 2);
        let shl = graph.inst(v3).input(0);
        assert_eq!(graph.inst(shl).opcode(), Opcode::Shl);
        assert_eq!(graph.inst(shl).result_ty(), ResultType::S32);
        assert_eq!(graph.inst(shl).input(0), v0);

        let one = graph.inst(shl).input(1);
        assert_eq!(graph.inst(one).opcode(), Opcode::Constant);
        assert_eq!(graph.inst(one).result_ty(), ResultType::U8);
        assert_eq!(graph.inst_block(one), b0);
        assert_eq!(
            graph.users(shl).iter().copied().collect::<Vec<_>>(),
            vec![v3]
        );
    }

    /// `0 << value` is the zero constant, reused from the start block.
    #[test]
    fn shl_first_operand_zero() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let v0 = builder.param(ResultType::S32, 0);
        let v1 = builder.const_int(0);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v3 = builder.shl(v1, v0);
        let v4 = builder.ret(v3);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 1);
        assert_eq!(graph.inst(v4).inputs().as_slice(), &[v1]);
        assert_eq!(graph.users(v1).iter().copied().collect::<Vec<_>>(), vec![v4]);
    }

    /// `value << 0` is the value itself.
    #[test]
    fn shl_second_operand_zero() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let v0 = builder.param(ResultType::S32, 0);
        let v1 = builder.const_int(0);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v3 = builder.shl(v0, v1);
        let v4 = builder.ret(v3);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 1);
        assert_eq!(graph.inst(v4).inputs().as_slice(), &[v0]);
    }

    /// `value ^ 0` is the value itself.
    #[test]
    fn xor_zero_identity() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let v0 = builder.param(ResultType::S32, 0);
        let v1 = builder.const_int(0);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v3 = builder.xor(v0, v1);
        let v4 = builder.ret(v3);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 1);
        assert_eq!(graph.inst(v4).inputs().as_slice(), &[v0]);
    }

    /// `value ^ value` is zero.
    #[test]
    fn xor_same_value_is_zero() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let v0 = builder.param(ResultType::S32, 0);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let v2 = builder.xor(v0, v0);
        let v3 = builder.ret(v2);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 1);
        let zero = graph.inst(v3).input(0);
        assert_eq!(graph.inst(zero).opcode(), Opcode::Constant);
        assert_eq!(
            graph.users(zero).iter().copied().collect::<Vec<_>>(),
            vec![v3]
        );
        assert!(graph.users(v0).is_empty());
    }

    /// `((6 ^ 4) << 1) + 4` folds all the way down to the constant 8.
    #[test]
    fn chain_folds_to_constant() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();

        builder.switch_to_block(b0);
        let one = builder.const_int(1);
        let four = builder.const_int(4);
        let six = builder.const_int(6);
        builder.jump(b1);

        builder.switch_to_block(b1);
        let x = builder.xor(six, four);
        let s = builder.shl(x, one);
        let sum = builder.add(s, four);
        let ret = builder.ret(sum);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b1), 1);
        let eight = graph.inst(ret).input(0);
        assert_eq!(graph.inst(eight).opcode(), Opcode::Constant);
        assert!(matches!(
            graph.inst(eight).data(),
            InstData::Assign { value: 8, .. }
        ));
        assert_eq!(graph.inst_block(eight), b0);
        assert_eq!(
            graph.users(eight).iter().copied().collect::<Vec<_>>(),
            vec![ret]
        );

        assert_eq!(
            GraphWriter::new(&graph).dump_string(),
            "\
BB.0:
    0.s32 Constant 1
    1.s32 Constant 4
    2.s32 Constant 6
    8.s32 Constant 2
    9.s32 Constant 8
    3. Br BB.1
BB.1:
    7.s32 Return v9
"
        );
    }

    /// A diamond whose conditional arm folds to the fall-through constant:
    /// the φ ends up with one distinct value and disappears.
    #[test]
    fn trivial_phi_after_folding() {
        let mut graph = Graph::new();
        let mut builder = IrBuilder::new(&mut graph);
        let b0 = builder.make_block();
        let b1 = builder.make_block();
        let b2 = builder.make_block();
        let b3 = builder.make_block();

        builder.switch_to_block(b0);
        let flag = builder.param(ResultType::Bool, 0);
        let zero = builder.const_int(0);
        let one = builder.const_int(1);
        let two = builder.const_int(2);
        builder.jump(b1);

        builder.switch_to_block(b1);
        builder.br(flag, b2, b3);

        builder.switch_to_block(b2);
        let s = builder.shl(one, one);
        let x = builder.xor(two, s);
        builder.jump(b3);

        builder.switch_to_block(b3);
        let phi = builder.phi(ResultType::S32);
        let ret = builder.ret(phi);
        builder.append_phi_arg(phi, zero, b1);
        builder.append_phi_arg(phi, x, b2);

        run(&mut graph);

        assert_eq!(graph.alive_inst_count(b2), 1);
        assert_eq!(graph.alive_inst_count(b3), 1);
        assert_eq!(
            graph.users(zero).iter().copied().collect::<Vec<_>>(),
            vec![ret]
        );
        assert_eq!(graph.inst(ret).inputs().as_slice(), &[zero]);
    }
}
