//! Reads the authoritative pointer type map off a marked module.
use ptrlift_ir::{
    ir_writer::{FuncWriter, WriteWithModule},
    FuncRef, Function, InstId, Module, Type,
};
use tracing::{debug, trace};

use crate::{
    analyze::{classify_ctor_table, classify_functions, seed_globals},
    marker::{func_name, sole_marker_user},
    site::{is_marker, marked_operand, PtrSite},
    AnnotatedSignatures, PointerTypeMap, PtrDesc, PtrKey, RetypeConfig, RetypeError,
};

/// Builds the final map from the sites wrapped by
/// [`crate::MarkerInserter`].
///
/// Every descriptor is read directly off the instruction that binds it, so
/// nothing is propagated. A binding site whose pointer is not wrapped by a
/// marker is reported as an error.
pub struct MarkerExtraction<'a> {
    module: &'a Module,
    config: &'a RetypeConfig,
    map: PointerTypeMap,
    callee_sigs: AnnotatedSignatures,
}

impl<'a> MarkerExtraction<'a> {
    pub fn new(module: &'a Module, config: &'a RetypeConfig) -> Self {
        Self {
            module,
            config,
            map: PointerTypeMap::new(),
            callee_sigs: AnnotatedSignatures::new(),
        }
    }

    pub fn run(mut self) -> Result<PointerTypeMap, RetypeError> {
        seed_globals(self.module, self.config, &mut self.map);

        for func_ref in self.module.iter_functions() {
            let func = &self.module.funcs[func_ref];
            if func.is_declaration() {
                continue;
            }
            self.extract_func(func_ref, func)?;
        }

        classify_functions(self.module, self.config, &mut self.map)?;
        classify_ctor_table(self.module, self.config, &mut self.map)?;

        debug!(entries = self.map.len(), "pointer types extracted");
        Ok(self.map)
    }

    fn extract_func(&mut self, func_ref: FuncRef, func: &Function) -> Result<(), RetypeError> {
        let dfg = &func.dfg;
        for inst in func.layout.iter_all_inst() {
            if is_marker(dfg, inst) {
                continue;
            }
            let site = PtrSite::classify(dfg.inst(inst));

            if let Some((ptr, elem)) = site.binding(dfg) {
                let Some(addr_space) = dfg.value_ty(ptr).addr_space() else {
                    return Err(RetypeError::NotPointer {
                        func: func_name(self.module, func_ref),
                        inst: FuncWriter::new(func_ref, func).dump_inst(inst),
                        ty: dfg.value_ty(ptr).dump_string(&self.module.ctx),
                    });
                };
                let Some(operand) = marked_operand(dfg, ptr) else {
                    return Err(RetypeError::UnmarkedOperand {
                        func: func_name(self.module, func_ref),
                        inst: FuncWriter::new(func_ref, func).dump_inst(inst),
                    });
                };

                let desc = PtrDesc::new(elem, addr_space);
                self.record(PtrKey::Value(func_ref, ptr), desc);
                self.record(PtrKey::of_value(func_ref, dfg, operand), desc);
            }

            let result_pointee = match site {
                PtrSite::Address { res_ty, .. } => Some(res_ty),
                PtrSite::Alloc { ty } => Some(ty),
                _ => None,
            };
            if let Some(pointee) = result_pointee {
                self.extract_result(func_ref, func, inst, pointee)?;
            }

            if let PtrSite::Call { func: callee, args } = site {
                let typed = self.callee_sigs.get(&self.module.ctx, callee)?.clone();
                for (idx, &arg) in args.iter().enumerate() {
                    let Some(desc) = typed.arg(idx) else {
                        continue;
                    };
                    if marked_operand(dfg, arg).is_none() {
                        return Err(RetypeError::UnmarkedOperand {
                            func: func_name(self.module, func_ref),
                            inst: FuncWriter::new(func_ref, func).dump_inst(inst),
                        });
                    }
                    self.record(PtrKey::Value(func_ref, arg), desc);
                }
            }
        }

        // Markers of symbol addresses that no binding site claimed.
        for inst in func.layout.iter_all_inst() {
            if !is_marker(dfg, inst) {
                continue;
            }
            let Some(gv) = dfg.value_gv(dfg.inst(inst).args()[0]) else {
                continue;
            };
            let Some(desc) = self.map.get(PtrKey::Global(gv)) else {
                continue;
            };
            let Some(result) = dfg.inst_result(inst) else {
                continue;
            };
            self.record(PtrKey::Value(func_ref, result), desc);
        }

        Ok(())
    }

    fn extract_result(
        &mut self,
        func_ref: FuncRef,
        func: &Function,
        inst: InstId,
        pointee: Type,
    ) -> Result<(), RetypeError> {
        let dfg = &func.dfg;
        let Some(value) = dfg.inst_result(inst) else {
            return Ok(());
        };
        let Some(addr_space) = dfg.value_ty(value).addr_space() else {
            return Err(RetypeError::NotPointer {
                func: func_name(self.module, func_ref),
                inst: FuncWriter::new(func_ref, func).dump_inst(inst),
                ty: dfg.value_ty(value).dump_string(&self.module.ctx),
            });
        };
        let Some(marker) = sole_marker_user(func, inst) else {
            return Err(RetypeError::UnmarkedResult {
                func: func_name(self.module, func_ref),
                inst: FuncWriter::new(func_ref, func).dump_inst(inst),
            });
        };

        let desc = PtrDesc::new(pointee, addr_space);
        self.record(PtrKey::Value(func_ref, value), desc);
        self.record(PtrKey::Value(func_ref, marker), desc);
        Ok(())
    }

    fn record(&mut self, key: PtrKey, desc: PtrDesc) {
        if self.map.insert(key, desc) {
            trace!(?key, desc = %desc.dump_string(&self.module.ctx), "pointer type extracted");
        }
    }
}

#[cfg(test)]
mod tests {
    use ptrlift_ir::{
        builder::test_util::TestModuleBuilder, inst::RmwOp, AddrSpace, Constant,
        ElemTypeAnnotation, InstData, Linkage, Signature,
    };

    use super::*;
    use crate::MarkerInserter;

    #[test]
    fn extraction_before_insertion_fails() {
        let mut builder = TestModuleBuilder::new();
        let mut func_builder = builder.func_builder(&[], Type::Unit);
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        func_builder.alloca(Type::I64);
        func_builder.ret(None);
        func_builder.finish();

        let module = builder.build();
        let config = RetypeConfig::default();
        assert_eq!(
            MarkerExtraction::new(&module, &config).run().err(),
            Some(RetypeError::UnmarkedResult {
                func: "test_func".to_string(),
                inst: "v0.ptr = alloca i64".to_string(),
            })
        );
    }

    #[test]
    fn call_arguments_take_annotated_types() {
        let mut builder = TestModuleBuilder::new();
        let callee = builder.module_builder.declare_function(
            Signature::new("fill", Linkage::External, &[Type::PTR, Type::I32], Type::Unit)
                .with_elem_types(ElemTypeAnnotation::new().with_arg(0, Constant::make_imm(0i32))),
        );

        let mut func_builder = builder.func_builder(&[Type::PTR], Type::Unit);
        let p = func_builder.args()[0];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        let n = func_builder.make_imm_value(4i32);
        func_builder.call(callee, &[p, n]);
        func_builder.ret(None);
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let mut module = builder.build();
        let config = RetypeConfig::default();
        assert_eq!(MarkerInserter::new().run(&mut module), Ok(true));
        let map = MarkerExtraction::new(&module, &config).run().unwrap();

        let func = &module.funcs[func_ref];
        let call = func
            .layout
            .iter_all_inst()
            .find(|inst| matches!(func.dfg.inst(*inst), InstData::Call { .. }))
            .unwrap();
        let marked = func.dfg.inst(call).args()[0];
        assert_eq!(marked_operand(&func.dfg, marked), Some(p));

        let i32_ptr = Some(PtrDesc::new(Type::I32, AddrSpace::GENERIC));
        assert_eq!(map.get(PtrKey::Value(func_ref, marked)), i32_ptr);
        assert_eq!(map.signature(callee).unwrap().arg(0), i32_ptr);
        assert_eq!(
            map.signature(func_ref).unwrap().arg(0),
            Some(PtrDesc::new(Type::I8, AddrSpace::GENERIC))
        );
    }

    #[test]
    fn unmarked_annotated_call_argument_fails() {
        let mut builder = TestModuleBuilder::new();
        let callee = builder.module_builder.declare_function(
            Signature::new("fill", Linkage::External, &[Type::PTR], Type::Unit)
                .with_elem_types(ElemTypeAnnotation::new().with_arg(0, Constant::make_imm(0i32))),
        );

        let mut func_builder = builder.func_builder(&[Type::PTR], Type::Unit);
        let p = func_builder.args()[0];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        func_builder.call(callee, &[p]);
        func_builder.ret(None);
        func_builder.finish();

        let module = builder.build();
        let config = RetypeConfig::default();
        let err = MarkerExtraction::new(&module, &config).run().err();
        assert!(
            matches!(&err, Some(RetypeError::UnmarkedOperand { func, .. }) if func == "test_func"),
            "{err:?}"
        );
    }

    #[test]
    fn atomics_are_marked_and_typed_by_their_value() {
        let mut builder = TestModuleBuilder::new();
        let mut func_builder =
            builder.func_builder(&[Type::PTR, Type::Ptr(AddrSpace(3))], Type::Unit);
        let [counter, flag] = [func_builder.args()[0], func_builder.args()[1]];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        let one = func_builder.make_imm_value(1i64);
        func_builder.atomic_rmw(RmwOp::Add, counter, one);
        let expected = func_builder.make_imm_value(0i32);
        let new = func_builder.make_imm_value(1i32);
        func_builder.cmpxchg(flag, expected, new);
        func_builder.ret(None);
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let mut module = builder.build();
        let config = RetypeConfig::default();
        assert_eq!(MarkerInserter::new().run(&mut module), Ok(true));
        let map = MarkerExtraction::new(&module, &config).run().unwrap();

        let func = &module.funcs[func_ref];
        let pointer_operand = |want: fn(&InstData) -> bool| {
            let inst = func
                .layout
                .iter_all_inst()
                .find(|inst| want(func.dfg.inst(*inst)))
                .unwrap();
            func.dfg.inst(inst).args()[0]
        };

        let rmw_ptr = pointer_operand(|data| matches!(data, InstData::AtomicRmw { .. }));
        assert_eq!(marked_operand(&func.dfg, rmw_ptr), Some(counter));
        let i64_ptr = Some(PtrDesc::new(Type::I64, AddrSpace::GENERIC));
        assert_eq!(map.get(PtrKey::Value(func_ref, rmw_ptr)), i64_ptr);
        assert_eq!(map.get(PtrKey::Value(func_ref, counter)), i64_ptr);

        let cas_ptr = pointer_operand(|data| matches!(data, InstData::CmpXchg { .. }));
        assert_eq!(marked_operand(&func.dfg, cas_ptr), Some(flag));
        let i32_ptr = Some(PtrDesc::new(Type::I32, AddrSpace(3)));
        assert_eq!(map.get(PtrKey::Value(func_ref, cas_ptr)), i32_ptr);
        assert_eq!(map.get(PtrKey::Value(func_ref, flag)), i32_ptr);
    }
}
