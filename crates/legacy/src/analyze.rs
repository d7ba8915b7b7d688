//! Non-mutating pointee inference used by the older writer.
//!
//! The analysis seeds descriptors at definitions whose own semantics fix a
//! pointee, propagates them forward through pass-through instructions, then
//! walks back from binding sites to values that reach them. Forward
//! propagation uses the map as its visited set and every backward walk keeps
//! its own, so loop-carried phis terminate. A value is written at most once.
use std::collections::VecDeque;

use ptrlift_ir::{
    ir_writer::WriteWithModule, Constant, DataFlowGraph, FuncRef, Function, GlobalVariableRef,
    InstId, Module, Type, Value, ValueId,
};
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::{
    site::{pass_through_operands, PtrSite},
    AnnotationOnly, MapResolver, PointerTypeMap, PtrDesc, PtrKey, RetypeConfig, RetypeError,
    SignatureReclassifier,
};

pub struct PointerTypeAnalysis<'a> {
    module: &'a Module,
    config: &'a RetypeConfig,
    map: PointerTypeMap,
    worklist: VecDeque<ValueId>,
    visited: FxHashSet<ValueId>,
}

impl<'a> PointerTypeAnalysis<'a> {
    pub fn new(module: &'a Module, config: &'a RetypeConfig) -> Self {
        Self {
            module,
            config,
            map: PointerTypeMap::new(),
            worklist: VecDeque::new(),
            visited: FxHashSet::default(),
        }
    }

    pub fn run(mut self) -> Result<PointerTypeMap, RetypeError> {
        seed_globals(self.module, self.config, &mut self.map);

        for func_ref in self.module.iter_functions() {
            let func = &self.module.funcs[func_ref];
            if func.is_declaration() {
                continue;
            }

            self.seed_annotated_args(func_ref, func);
            self.forward(func_ref, func);
            self.backward(func_ref, func);
        }

        classify_functions(self.module, self.config, &mut self.map)?;
        classify_ctor_table(self.module, self.config, &mut self.map)?;

        debug!(entries = self.map.len(), "pointer types inferred");
        Ok(self.map)
    }

    /// Annotated arguments are fixed before any inference touches them.
    /// Malformed annotations are left for the signature classification to
    /// report.
    fn seed_annotated_args(&mut self, func_ref: FuncRef, func: &Function) {
        let ctx = &self.module.ctx;
        let samples: Vec<(usize, Type)> = ctx.func_sig(func_ref, |sig| {
            sig.elem_types()
                .map(|annotation| {
                    annotation
                        .iter_args()
                        .map(|(idx, sample)| (idx, sample.ty(ctx)))
                        .collect()
                })
                .unwrap_or_default()
        });

        for (idx, pointee) in samples {
            let Some(&arg) = func.arg_values.get(idx) else {
                continue;
            };
            let Some(addr_space) = func.dfg.value_ty(arg).addr_space() else {
                continue;
            };
            self.map.insert(
                PtrKey::Value(func_ref, arg),
                PtrDesc::new(pointee, addr_space),
            );
        }
    }

    fn forward(&mut self, func_ref: FuncRef, func: &Function) {
        let dfg = &func.dfg;
        self.worklist.clear();

        // Symbol addresses are seeded module-wide; only their users are new.
        for (value, data) in dfg.values() {
            if matches!(data, Value::Global { .. }) && dfg.users_num(value) > 0 {
                self.worklist.push_back(value);
            }
        }
        for &arg in &func.arg_values {
            if self.map.contains(PtrKey::Value(func_ref, arg)) {
                self.worklist.push_back(arg);
            }
        }

        for inst in func.layout.iter_all_inst() {
            let Some(result) = dfg.inst_result(inst) else {
                continue;
            };
            let Some(addr_space) = dfg.value_ty(result).addr_space() else {
                continue;
            };

            let pointee = match PtrSite::classify(dfg.inst(inst)) {
                PtrSite::Alloc { ty } => ty,
                PtrSite::Address { res_ty, .. } if !res_ty.is_pointer() => res_ty,
                _ => continue,
            };
            if self.record(func_ref, result, PtrDesc::new(pointee, addr_space)) {
                self.worklist.push_back(result);
            }
        }

        while let Some(value) = self.worklist.pop_front() {
            let users: Vec<InstId> = dfg.users(value).copied().collect();
            for user in users {
                let Some(result) = dfg.inst_result(user) else {
                    continue;
                };
                let Some(addr_space) = dfg.value_ty(result).addr_space() else {
                    continue;
                };
                if self.map.contains(PtrKey::Value(func_ref, result)) {
                    continue;
                }

                let Some(desc) = self.agreed_desc(func_ref, dfg, user, value) else {
                    continue;
                };
                if self.record(func_ref, result, desc.in_addr_space(addr_space)) {
                    self.worklist.push_back(result);
                }
            }
        }
    }

    /// Returns the descriptor flowing into `user` if `value` is one of its
    /// pass-through operands and every resolved pass-through operand agrees.
    fn agreed_desc(
        &self,
        func_ref: FuncRef,
        dfg: &DataFlowGraph,
        user: InstId,
        value: ValueId,
    ) -> Option<PtrDesc> {
        let operands = pass_through_operands(dfg.inst(user));
        if !operands.contains(&value) {
            return None;
        }

        let mut agreed: Option<PtrDesc> = None;
        for operand in operands {
            let Some(desc) = self.map.value_desc(func_ref, dfg, operand) else {
                continue;
            };
            match agreed {
                None => agreed = Some(desc),
                Some(prev) if prev.pointee == desc.pointee => {}
                Some(_) => return None,
            }
        }
        agreed
    }

    fn backward(&mut self, func_ref: FuncRef, func: &Function) {
        let dfg = &func.dfg;
        for inst in func.layout.iter_all_inst() {
            let Some((ptr, elem)) = PtrSite::classify(dfg.inst(inst)).binding(dfg) else {
                continue;
            };
            if elem.is_pointer() {
                continue;
            }
            let Some(addr_space) = dfg.value_ty(ptr).addr_space() else {
                continue;
            };

            self.propagate_backward(func_ref, dfg, ptr, PtrDesc::new(elem, addr_space));
        }
    }

    /// Walks from a binding site's pointer operand to every value reaching
    /// it. Values mapped earlier keep their descriptor but are still walked
    /// through.
    fn propagate_backward(
        &mut self,
        func_ref: FuncRef,
        dfg: &DataFlowGraph,
        start: ValueId,
        desc: PtrDesc,
    ) {
        self.visited.clear();
        let mut worklist = vec![(start, desc)];
        while let Some((value, desc)) = worklist.pop() {
            if !matches!(dfg.value(value), Value::Inst { .. } | Value::Arg { .. }) {
                continue;
            }
            if !self.visited.insert(value) {
                continue;
            }
            self.record(func_ref, value, desc);

            let Some(inst) = dfg.value_inst(value) else {
                continue;
            };
            for operand in pass_through_operands(dfg.inst(inst)) {
                if let Some(addr_space) = dfg.value_ty(operand).addr_space() {
                    worklist.push((operand, desc.in_addr_space(addr_space)));
                }
            }
        }
    }

    fn record(&mut self, func_ref: FuncRef, value: ValueId, desc: PtrDesc) -> bool {
        let recorded = self.map.insert(PtrKey::Value(func_ref, value), desc);
        if recorded {
            trace!(
                ?func_ref,
                ?value,
                desc = %desc.dump_string(&self.module.ctx),
                "pointer type recorded"
            );
        }
        recorded
    }
}

/// Records every global's declared value type, except for the constructor
/// table which is retyped from its initializer.
pub(crate) fn seed_globals(module: &Module, config: &RetypeConfig, map: &mut PointerTypeMap) {
    let globals: Vec<(GlobalVariableRef, PtrDesc)> = module.ctx.with_gv_store(|s| {
        s.all_gvs()
            .filter(|(_, data)| data.symbol != config.ctor_table_symbol)
            .map(|(gv, data)| (gv, PtrDesc::new(data.ty, data.addr_space)))
            .collect()
    });

    for (gv, desc) in globals {
        map.insert(PtrKey::Global(gv), desc);
    }
}

/// Reclassifies every signature against `map` and records the descriptor of
/// each function's address.
pub(crate) fn classify_functions(
    module: &Module,
    config: &RetypeConfig,
    map: &mut PointerTypeMap,
) -> Result<(), RetypeError> {
    let reclassifier =
        SignatureReclassifier::new(&module.ctx).with_fallback(config.fallback_pointee);

    for func_ref in module.iter_functions() {
        let typed = reclassifier.reclassify(func_ref, &mut MapResolver::new(module, map))?;
        let sig = module.ctx.func_sig(func_ref, |sig| sig.clone());
        map.insert(PtrKey::Func(func_ref), typed.func_desc(&sig, &module.ctx));
        map.set_signature(func_ref, typed);
    }

    Ok(())
}

/// Retypes the initializer of the constructor table, if the module has one.
pub(crate) fn classify_ctor_table(
    module: &Module,
    config: &RetypeConfig,
    map: &mut PointerTypeMap,
) -> Result<(), RetypeError> {
    let ctx = &module.ctx;
    let Some(gv) = ctx.with_gv_store(|s| s.gv_by_symbol(&config.ctor_table_symbol)) else {
        return Ok(());
    };
    let (init, addr_space) = ctx.with_gv_store(|s| (s.init_data(gv).cloned(), s.addr_space(gv)));
    let Some(init) = init else {
        return Ok(());
    };

    let classifier = ConstantClassifier {
        module,
        config,
        map: &*map,
        symbol: &config.ctor_table_symbol,
    };
    let ty = classifier.classify(&init)?;
    debug!(ty = %ty.dump_string(ctx), "constructor table retyped");

    map.set_retyped_global(gv, ty);
    map.insert(PtrKey::Global(gv), PtrDesc::new(ty, addr_space));
    Ok(())
}

/// Rebuilds the type of a constant with typed pointers at its pointer
/// leaves.
struct ConstantClassifier<'a> {
    module: &'a Module,
    config: &'a RetypeConfig,
    map: &'a PointerTypeMap,
    symbol: &'a str,
}

impl ConstantClassifier<'_> {
    fn classify(&self, constant: &Constant) -> Result<Type, RetypeError> {
        let ctx = &self.module.ctx;
        let ty = match constant {
            Constant::Imm(imm) => imm.ty(),
            Constant::Null(addr_space) => self
                .config
                .fallback_desc(*addr_space)
                .typed_ptr_type(ctx),
            Constant::Undef(ty) | Constant::Zero(ty) => self.retype(*ty),
            Constant::Global(gv) => {
                let (pointee, addr_space) = ctx.with_gv_store(|s| (s.ty(*gv), s.addr_space(*gv)));
                PtrDesc::new(pointee, addr_space).typed_ptr_type(ctx)
            }
            Constant::Func(func_ref) => {
                // Functions are classified before the table.
                if let Some(desc) = self.map.get(PtrKey::Func(*func_ref)) {
                    return Ok(desc.typed_ptr_type(ctx));
                }
                let typed = SignatureReclassifier::new(ctx)
                    .with_fallback(self.config.fallback_pointee)
                    .reclassify(*func_ref, &mut AnnotationOnly)?;
                let sig = ctx.func_sig(*func_ref, |sig| sig.clone());
                typed.func_desc(&sig, ctx).typed_ptr_type(ctx)
            }
            Constant::Array { elem_ty, elems } => {
                let elem = self.uniform_elem(*elem_ty, elems)?;
                ctx.with_ty_store_mut(|s| s.make_array(elem, elems.len()))
            }
            Constant::Vector { elem_ty, elems } => {
                let elem = self.uniform_elem(*elem_ty, elems)?;
                ctx.with_ty_store_mut(|s| s.make_vector(elem, elems.len()))
            }
            Constant::Struct { ty, fields } => {
                let packed = ctx.with_ty_store(|s| s.struct_def(*ty).is_some_and(|d| d.packed));
                let mut field_tys = Vec::with_capacity(fields.len());
                for field in fields {
                    field_tys.push(self.classify(field)?);
                }
                ctx.with_ty_store_mut(|s| s.make_literal_struct(&field_tys, packed))
            }
        };

        Ok(ty)
    }

    /// Every element of an array or vector must retype the same way. An
    /// empty aggregate falls back to its declared element type.
    fn uniform_elem(&self, elem_ty: Type, elems: &[Constant]) -> Result<Type, RetypeError> {
        let mut uniform: Option<Type> = None;
        for (index, elem) in elems.iter().enumerate() {
            let ty = self.classify(elem)?;
            match uniform {
                None => uniform = Some(ty),
                Some(expected) if expected == ty => {}
                Some(expected) => {
                    let ctx = &self.module.ctx;
                    return Err(RetypeError::InconsistentAggregate {
                        symbol: self.symbol.to_string(),
                        index,
                        expected: expected.dump_string(ctx),
                        found: ty.dump_string(ctx),
                    });
                }
            }
        }

        Ok(uniform.unwrap_or_else(|| self.empty_elem(elem_ty)))
    }

    /// An empty constructor table still has `{i32, *() -> unit, *i8}`
    /// entries.
    fn empty_elem(&self, elem_ty: Type) -> Type {
        let ctx = &self.module.ctx;
        let Some(ptrlift_ir::types::CompoundType::Struct(data)) = elem_ty.resolve_compound(ctx)
        else {
            return self.retype(elem_ty);
        };
        let [prio, Type::Ptr(ctor_as), Type::Ptr(data_as)] = data.fields.as_slice() else {
            return self.retype(elem_ty);
        };
        if !prio.is_integral() {
            return self.retype(elem_ty);
        }

        let ctor = ctx.with_ty_store_mut(|s| s.make_func(&[], Type::Unit));
        let fields = [
            *prio,
            PtrDesc::new(ctor, *ctor_as).typed_ptr_type(ctx),
            self.config.fallback_desc(*data_as).typed_ptr_type(ctx),
        ];
        ctx.with_ty_store_mut(|s| s.make_literal_struct(&fields, data.packed))
    }

    /// Opaque pointers inside `undef` and `zero` become byte pointers.
    fn retype(&self, ty: Type) -> Type {
        let ctx = &self.module.ctx;
        if let Some(addr_space) = ty.addr_space() {
            return self.config.fallback_desc(addr_space).typed_ptr_type(ctx);
        }

        let Some(cmpd) = ty.resolve_compound(ctx) else {
            return ty;
        };
        match cmpd {
            ptrlift_ir::types::CompoundType::Array { elem, len } => {
                let elem = self.retype(elem);
                ctx.with_ty_store_mut(|s| s.make_array(elem, len))
            }
            ptrlift_ir::types::CompoundType::Vector { elem, len } => {
                let elem = self.retype(elem);
                ctx.with_ty_store_mut(|s| s.make_vector(elem, len))
            }
            ptrlift_ir::types::CompoundType::Struct(data) => {
                let fields: Vec<Type> = data.fields.iter().map(|f| self.retype(*f)).collect();
                ctx.with_ty_store_mut(|s| s.make_literal_struct(&fields, data.packed))
            }
            ptrlift_ir::types::CompoundType::Func { .. }
            | ptrlift_ir::types::CompoundType::TypedPtr { .. } => ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use ptrlift_ir::{
        builder::test_util::TestModuleBuilder, inst::RmwOp, AddrSpace, ElemTypeAnnotation,
        GlobalVariableData, InstInserter, Linkage, Signature,
    };

    use super::*;

    fn analyze(module: &Module) -> PointerTypeMap {
        let config = RetypeConfig::for_strategy(crate::StrategyKind::Analytical);
        PointerTypeAnalysis::new(module, &config).run().unwrap()
    }

    #[test]
    fn forward_through_addr_space_cast_and_select() {
        let mut builder = TestModuleBuilder::new();
        let mut func_builder = builder.func_builder(&[Type::I1], Type::Unit);
        let cond = func_builder.args()[0];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);

        let a = func_builder.alloca_in(Type::F64, AddrSpace(5));
        let generic = func_builder.addr_space_cast(a, AddrSpace::GENERIC);
        let b = func_builder.alloca(Type::F64);
        let picked = func_builder.select(cond, generic, b);
        func_builder.ret(None);
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let module = builder.build();
        let map = analyze(&module);

        let f64_in = |addr_space| Some(PtrDesc::new(Type::F64, addr_space));
        assert_eq!(map.get(PtrKey::Value(func_ref, a)), f64_in(AddrSpace(5)));
        assert_eq!(
            map.get(PtrKey::Value(func_ref, generic)),
            f64_in(AddrSpace::GENERIC)
        );
        assert_eq!(
            map.get(PtrKey::Value(func_ref, picked)),
            f64_in(AddrSpace::GENERIC)
        );
    }

    #[test]
    fn backward_reaches_through_loop_phi() {
        let mut builder = TestModuleBuilder::new();
        let mut func_builder = builder.func_builder(&[Type::PTR, Type::I64], Type::Unit);
        let [p, n] = [func_builder.args()[0], func_builder.args()[1]];
        let entry = func_builder.append_block();
        let header = func_builder.append_block();
        let exit = func_builder.append_block();

        func_builder.switch_to_block(entry);
        func_builder.jump(header);

        func_builder.switch_to_block(header);
        let cur = func_builder.phi(Type::PTR, &[(p, entry)]);
        func_builder.load(cur, Type::I16);
        let next = func_builder.gep(Type::I16, &[cur, n]);
        func_builder.append_phi_arg(cur, next, header);
        let cond = func_builder.make_imm_value(false);
        func_builder.br(cond, header, exit);

        func_builder.switch_to_block(exit);
        func_builder.ret(None);
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let module = builder.build();
        let map = analyze(&module);

        let i16_ptr = Some(PtrDesc::new(Type::I16, AddrSpace::GENERIC));
        assert_eq!(map.get(PtrKey::Value(func_ref, next)), i16_ptr);
        assert_eq!(map.get(PtrKey::Value(func_ref, cur)), i16_ptr);
        assert_eq!(map.get(PtrKey::Value(func_ref, p)), i16_ptr);

        let typed = map.signature(func_ref).unwrap();
        assert_eq!(typed.arg(0), i16_ptr);
        assert_eq!(typed.arg(1), None);
    }

    #[test]
    fn backward_from_atomics() {
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
        let module = builder.build();
        let map = analyze(&module);

        let typed = map.signature(func_ref).unwrap();
        assert_eq!(
            typed.arg(0),
            Some(PtrDesc::new(Type::I64, AddrSpace::GENERIC))
        );
        assert_eq!(typed.arg(1), Some(PtrDesc::new(Type::I32, AddrSpace(3))));
    }

    #[test]
    fn opaque_element_types_carry_no_information() {
        let mut builder = TestModuleBuilder::new();
        let mut func_builder = builder.func_builder(&[Type::PTR], Type::PTR);
        let p = func_builder.args()[0];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        let loaded = func_builder.load(p, Type::PTR);
        func_builder.ret(Some(loaded));
        func_builder.finish();

        let func_ref = builder.func_ref().unwrap();
        let module = builder.build();
        let map = analyze(&module);

        assert_eq!(map.get(PtrKey::Value(func_ref, p)), None);
        assert_eq!(map.get(PtrKey::Value(func_ref, loaded)), None);

        let byte_ptr = Some(PtrDesc::new(Type::I8, AddrSpace::GENERIC));
        let typed = map.signature(func_ref).unwrap();
        assert_eq!(typed.ret, byte_ptr);
        assert_eq!(typed.arg(0), byte_ptr);
    }

    #[test]
    fn ctor_table_is_retyped() {
        let mut builder = TestModuleBuilder::new();
        let init = builder.module_builder.declare_function(Signature::new(
            "init",
            Linkage::Private,
            &[],
            Type::Unit,
        ));
        let data = builder.module_builder.make_global(GlobalVariableData::new(
            "data".to_string(),
            Type::I32,
            AddrSpace::GENERIC,
            Linkage::Private,
            false,
            None,
        ));
        let entry_ty = builder
            .module_builder
            .declare_literal_struct_type(&[Type::I32, Type::PTR, Type::PTR]);
        let entry = |assoc: Constant| Constant::Struct {
            ty: entry_ty,
            fields: vec![Constant::make_imm(65535i32), Constant::Func(init), assoc],
        };
        let table_ty = builder.module_builder.declare_array_type(entry_ty, 2);
        let ctors = builder.module_builder.make_global(GlobalVariableData::new(
            "llvm.global_ctors".to_string(),
            table_ty,
            AddrSpace::GENERIC,
            Linkage::Public,
            false,
            Some(Constant::Array {
                elem_ty: entry_ty,
                elems: vec![
                    entry(Constant::Null(AddrSpace::GENERIC)),
                    entry(Constant::Null(AddrSpace::GENERIC)),
                ],
            }),
        ));
        let module = builder.build();
        let map = analyze(&module);

        let ty = map.retyped_global(ctors).unwrap();
        assert_eq!(ty.dump_string(&module.ctx), "[{i32, *() -> unit, *i8}; 2]");
        assert_eq!(
            map.get(PtrKey::Global(data)),
            Some(PtrDesc::new(Type::I32, AddrSpace::GENERIC))
        );
    }

    #[test]
    fn empty_ctor_table_keeps_entry_type() {
        let mut builder = TestModuleBuilder::new();
        let entry_ty = builder
            .module_builder
            .declare_literal_struct_type(&[Type::I32, Type::PTR, Type::PTR]);
        let table_ty = builder.module_builder.declare_array_type(entry_ty, 0);
        let ctors = builder.module_builder.make_global(GlobalVariableData::new(
            "llvm.global_ctors".to_string(),
            table_ty,
            AddrSpace::GENERIC,
            Linkage::Public,
            false,
            Some(Constant::Array {
                elem_ty: entry_ty,
                elems: vec![],
            }),
        ));
        let module = builder.build();
        let map = analyze(&module);

        let ty = map.retyped_global(ctors).unwrap();
        assert_eq!(ty.dump_string(&module.ctx), "[{i32, *() -> unit, *i8}; 0]");
    }

    #[test]
    fn ctor_entry_uses_classified_function() {
        let mut builder = TestModuleBuilder::new();
        let init = builder.module_builder.declare_function(Signature::new(
            "init",
            Linkage::Private,
            &[Type::PTR],
            Type::Unit,
        ));
        let mut func_builder = builder.module_builder.func_builder::<InstInserter>(init);
        let p = func_builder.args()[0];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        func_builder.load(p, Type::I32);
        func_builder.ret(None);
        func_builder.finish();

        let table_ty = builder.module_builder.declare_array_type(Type::PTR, 1);
        let ctors = builder.module_builder.make_global(GlobalVariableData::new(
            "llvm.global_ctors".to_string(),
            table_ty,
            AddrSpace::GENERIC,
            Linkage::Public,
            false,
            Some(Constant::Array {
                elem_ty: Type::PTR,
                elems: vec![Constant::Func(init)],
            }),
        ));
        let module = builder.build();
        let map = analyze(&module);

        assert_eq!(
            map.signature(init).unwrap().arg(0),
            Some(PtrDesc::new(Type::I32, AddrSpace::GENERIC))
        );
        let entry = map.get(PtrKey::Func(init)).unwrap().typed_ptr_type(&module.ctx);
        let ty = map.retyped_global(ctors).unwrap();
        assert_eq!(
            ty.dump_string(&module.ctx),
            format!("[{}; 1]", entry.dump_string(&module.ctx))
        );
    }

    #[test]
    fn inconsistent_ctor_table() {
        let mut builder = TestModuleBuilder::new();
        let data = builder.module_builder.make_global(GlobalVariableData::new(
            "data".to_string(),
            Type::I32,
            AddrSpace::GENERIC,
            Linkage::Private,
            false,
            None,
        ));
        let table_ty = builder.module_builder.declare_array_type(Type::PTR, 2);
        builder.module_builder.make_global(GlobalVariableData::new(
            "llvm.global_ctors".to_string(),
            table_ty,
            AddrSpace::GENERIC,
            Linkage::Public,
            false,
            Some(Constant::Array {
                elem_ty: Type::PTR,
                elems: vec![Constant::Global(data), Constant::Null(AddrSpace::GENERIC)],
            }),
        ));
        let module = builder.build();

        let config = RetypeConfig::for_strategy(crate::StrategyKind::Analytical);
        assert_eq!(
            PointerTypeAnalysis::new(&module, &config).run().err(),
            Some(RetypeError::InconsistentAggregate {
                symbol: "llvm.global_ctors".to_string(),
                index: 1,
                expected: "*i32".to_string(),
                found: "*i8".to_string(),
            })
        );
    }

    #[test]
    fn annotated_argument_wins_over_inference() {
        let mut builder = TestModuleBuilder::new();
        let sig = Signature::new(
            "kernel",
            Linkage::Public,
            &[Type::PTR, Type::PTR, Type::Ptr(AddrSpace(1))],
            Type::Unit,
        )
        .with_elem_types(ElemTypeAnnotation::new().with_arg(2, Constant::make_imm(0i64)));
        let func_ref = builder.module_builder.declare_function(sig);

        let mut func_builder = builder
            .module_builder
            .func_builder::<ptrlift_ir::InstInserter>(func_ref);
        let p = func_builder.args()[2];
        let b0 = func_builder.append_block();
        func_builder.switch_to_block(b0);
        func_builder.load(p, Type::F32);
        func_builder.ret(None);
        func_builder.finish();

        let module = builder.build();
        let map = analyze(&module);

        let i64_ptr = Some(PtrDesc::new(Type::I64, AddrSpace(1)));
        assert_eq!(map.get(PtrKey::Value(func_ref, p)), i64_ptr);
        assert_eq!(map.signature(func_ref).unwrap().arg(2), i64_ptr);
    }
}
