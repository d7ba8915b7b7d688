//! Demotion of constant expression operands into instructions.
use std::collections::VecDeque;

use ptrlift_ir::{FuncCursor, Function, InstId, Module, Value};
use tracing::{debug, trace};

use crate::site::operand_inserter;

/// Materializes every constant expression operand as an instruction placed
/// right before its user.
///
/// Every occurrence is demoted on its own, so an expression feeding two
/// operands yields two instructions. Nested expressions are demoted until no
/// constant expression is left as an operand.
#[derive(Debug, Default)]
pub struct ConstExprDemoter {
    worklist: VecDeque<InstId>,
    demoted: usize,
}

impl ConstExprDemoter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.worklist.clear();
        self.demoted = 0;
    }

    /// Returns `true` if any operand was demoted.
    pub fn run(&mut self, module: &mut Module) -> bool {
        let mut changed = false;
        for func in module.funcs.values_mut() {
            changed |= self.run_on_func(func);
        }
        changed
    }

    pub fn run_on_func(&mut self, func: &mut Function) -> bool {
        self.clear();
        self.worklist.extend(func.layout.iter_all_inst());

        while let Some(inst) = self.worklist.pop_front() {
            for idx in 0..func.dfg.inst(inst).args().len() {
                let arg = func.dfg.inst(inst).args()[idx];
                let Value::ConstExpr { expr, .. } = func.dfg.value(arg) else {
                    continue;
                };
                let data = expr.as_inst_data();

                let mut inserter = operand_inserter(func, inst, idx);
                let (demoted, result) = inserter.insert_inst_data_with_result(func, data);
                let Some(result) = result else {
                    continue;
                };
                func.dfg.set_inst_arg(inst, idx, result);
                trace!(?arg, ?demoted, "demoted constant expression");

                self.worklist.push_back(demoted);
                self.demoted += 1;
            }
        }

        if self.demoted > 0 {
            debug!(demoted = self.demoted, "constant expressions demoted");
        }
        self.demoted > 0
    }
}

#[cfg(test)]
mod tests {
    use ptrlift_ir::{
        builder::test_util::{dump_func, TestModuleBuilder},
        inst::CastOp,
        AddrSpace, GlobalVariableData, Linkage, Type,
    };

    use super::*;

    #[test]
    fn nested_expressions_are_demoted_in_order() {
        let mut builder = TestModuleBuilder::new();
        let arr = builder.module_builder.declare_array_type(Type::I32, 4);
        let gv = builder.module_builder.make_global(GlobalVariableData::new(
            "table".to_string(),
            arr,
            AddrSpace(1),
            Linkage::Private,
            false,
            None,
        ));

        let mut func_builder = builder.func_builder(&[], Type::I32);
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);

        let addr = func_builder.make_global_value(gv);
        let generic = func_builder.make_const_cast(CastOp::AddrSpaceCast, addr, Type::PTR);
        let zero = func_builder.make_imm_value(0i64);
        let two = func_builder.make_imm_value(2i64);
        let elem = func_builder.make_const_gep(arr, &[generic, zero, two]);
        let v = func_builder.load(elem, Type::I32);
        func_builder.ret(Some(v));
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let mut module = builder.build();

        assert!(ConstExprDemoter::new().run(&mut module));
        insta::assert_snapshot!(dump_func(&module, func_ref), @r"
        func public %test_func() -> i32 {
            block0:
                v7.ptr = addrspacecast %table;
                v6.ptr = gep [i32; 4] v7 0.i64 2.i64;
                v5.i32 = load v6;
                return v5;
        }
        ");

        assert!(!ConstExprDemoter::new().run(&mut module));
    }

    #[test]
    fn each_occurrence_is_demoted() {
        let mut builder = TestModuleBuilder::new();
        let gv = builder.module_builder.make_global(GlobalVariableData::new(
            "g".to_string(),
            Type::I64,
            AddrSpace::GENERIC,
            Linkage::Private,
            false,
            None,
        ));

        let mut func_builder = builder.func_builder(&[], Type::Unit);
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);

        let addr = func_builder.make_global_value(gv);
        let cast = func_builder.make_const_cast(CastOp::Bitcast, addr, Type::PTR);
        let v = func_builder.load(cast, Type::I64);
        func_builder.store(v, cast);
        func_builder.ret(None);
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let mut module = builder.build();

        assert!(ConstExprDemoter::new().run(&mut module));
        let func = &module.funcs[func_ref];
        let casts = func
            .layout
            .iter_all_inst()
            .filter(|inst| matches!(func.dfg.inst(*inst), ptrlift_ir::InstData::Cast { .. }))
            .count();
        assert_eq!(casts, 2);
        assert!(func
            .layout
            .iter_all_inst()
            .flat_map(|inst| func.dfg.inst(inst).args().to_vec())
            .all(|arg| !func.dfg.is_const_expr(arg)));
    }
}
