mod common;

use common::{all_insts, builder_for, find_inst, global_read, merged_addresses};
use ptrlift_ir::{
    builder::test_util::dump_func, inst::CastOp, AddrSpace, Constant, ElemTypeAnnotation,
    GlobalVariableData, InstData, Linkage, Module, Signature, Type, Value,
};
use ptrlift_legacy::{
    site::{is_marker, marked_operand, PtrSite},
    verify_coverage, ConstExprDemoter, LegacyRewriter, PointerTypeMap, PtrDesc, PtrKey,
    StrategyKind,
};

const OLD: &str = "air64-bitcode-5.0";
const NEW: &str = "air64-bitcode-7.0";

fn retype(module: &mut Module) -> PointerTypeMap {
    let rewriter = LegacyRewriter::for_target(&module.ctx.triple);
    rewriter.run(module).unwrap().map
}

#[test]
fn strategy_follows_triple() {
    let (module, _, _) = global_read(OLD);
    let rewriter = LegacyRewriter::for_target(&module.ctx.triple);
    assert_eq!(rewriter.config().strategy, StrategyKind::Analytical);

    let (module, _, _) = global_read(NEW);
    let rewriter = LegacyRewriter::for_target(&module.ctx.triple);
    assert_eq!(rewriter.config().strategy, StrategyKind::Eager);
}

#[test]
fn demotion_is_idempotent() {
    let mut builder = builder_for(NEW);
    let arr = builder.module_builder.declare_array_type(Type::I64, 8);
    let gv = builder.module_builder.make_global(GlobalVariableData::new(
        "slots".to_string(),
        arr,
        AddrSpace(1),
        Linkage::Private,
        false,
        None,
    ));

    let mut func_builder = builder.func_builder(&[Type::I64], Type::Unit);
    let v = func_builder.args()[0];
    let b0 = func_builder.append_block();
    func_builder.switch_to_block(b0);
    let addr = func_builder.make_global_value(gv);
    let generic = func_builder.make_const_cast(CastOp::AddrSpaceCast, addr, Type::PTR);
    let zero = func_builder.make_imm_value(0i64);
    let three = func_builder.make_imm_value(3i64);
    let slot = func_builder.make_const_gep(arr, &[generic, zero, three]);
    func_builder.store(v, slot);
    func_builder.store(v, generic);
    func_builder.ret(None);
    func_builder.finish();

    let func_ref = builder.func_ref().unwrap();
    let mut module = builder.build();
    let mut demoter = ConstExprDemoter::new();

    assert!(demoter.run(&mut module));
    let once = dump_func(&module, func_ref);
    for (func_ref, inst) in all_insts(&module) {
        let dfg = &module.funcs[func_ref].dfg;
        assert!(dfg
            .inst(inst)
            .args()
            .iter()
            .all(|arg| !matches!(dfg.value(*arg), Value::ConstExpr { .. })));
    }

    assert!(!demoter.run(&mut module));
    assert_eq!(dump_func(&module, func_ref), once);
}

#[test]
fn markers_are_transparent_and_cover_every_site() {
    for mut module in [global_read(NEW).0, merged_addresses(NEW).0] {
        retype(&mut module);
        assert_eq!(verify_coverage(&module), Ok(()));

        for (func_ref, inst) in all_insts(&module) {
            let dfg = &module.funcs[func_ref].dfg;
            if let InstData::Cast {
                code: CastOp::Bitcast,
                args,
                ty,
            } = dfg.inst(inst)
            {
                assert_eq!(dfg.value_ty(args[0]), *ty);
                assert!(is_marker(dfg, inst));
            }
        }
    }
}

#[test]
fn extraction_covers_every_marked_site() {
    let (mut module, _, _) = merged_addresses(NEW);
    let map = retype(&mut module);

    let mut checked = 0;
    for (func_ref, inst) in all_insts(&module) {
        let dfg = &module.funcs[func_ref].dfg;
        if is_marker(dfg, inst) {
            continue;
        }

        let site = PtrSite::classify(dfg.inst(inst));
        if let Some((ptr, _)) = site.binding(dfg) {
            let operand = marked_operand(dfg, ptr).unwrap();
            assert!(map.contains(PtrKey::Value(func_ref, ptr)));
            assert!(map.contains(PtrKey::of_value(func_ref, dfg, operand)));
            checked += 1;
        }
        if matches!(site, PtrSite::Address { .. } | PtrSite::Alloc { .. }) {
            let result = dfg.inst_result(inst).unwrap();
            assert!(map.contains(PtrKey::Value(func_ref, result)));
            checked += 1;
        }
    }

    // Both address computations count twice.
    assert_eq!(checked, 7);
}

#[test]
fn global_read_is_typed_at_both_ends() {
    let (mut module, func_ref, gv) = global_read(NEW);
    let map = retype(&mut module);

    let func = &module.funcs[func_ref];
    let markers: Vec<_> = func
        .layout
        .iter_all_inst()
        .filter(|inst| is_marker(&func.dfg, *inst))
        .collect();
    assert_eq!(markers.len(), 1);
    assert_eq!(func.dfg.value_gv(func.dfg.inst(markers[0]).args()[0]), Some(gv));

    let load = find_inst(&module, func_ref, |data| matches!(data, InstData::Load { .. }));
    let ptr = func.dfg.inst(load).args()[0];

    let expected = Some(PtrDesc::new(Type::I32, AddrSpace(3)));
    assert_eq!(map.get(PtrKey::Global(gv)), expected);
    assert_eq!(map.get(PtrKey::Value(func_ref, ptr)), expected);
}

#[test]
fn analytical_global_read_needs_no_patch() {
    let (mut module, func_ref, gv) = global_read(OLD);
    let before = dump_func(&module, func_ref);
    let retyped = LegacyRewriter::for_target(&module.ctx.triple)
        .run(&mut module)
        .unwrap();

    assert!(!retyped.changed);
    assert_eq!(dump_func(&module, func_ref), before);
    assert_eq!(
        retyped.map.get(PtrKey::Global(gv)),
        Some(PtrDesc::new(Type::I32, AddrSpace(3)))
    );
}

#[test]
fn merge_of_disagreeing_addresses_takes_read_type() {
    let i16_ptr = Some(PtrDesc::new(Type::I16, AddrSpace::GENERIC));

    for triple in [OLD, NEW] {
        let (mut module, func_ref, phi) = merged_addresses(triple);
        let map = retype(&mut module);
        assert_eq!(map.get(PtrKey::Value(func_ref, phi)), i16_ptr, "{triple}");
    }
}

#[test]
fn declaration_falls_back_to_byte_pointer() {
    for triple in [OLD, NEW] {
        let mut builder = builder_for(triple);
        let ext = builder.module_builder.declare_function(Signature::new(
            "ext",
            Linkage::External,
            &[Type::Ptr(AddrSpace(1)), Type::I32],
            Type::Ptr(AddrSpace(3)),
        ));
        let mut module = builder.build();
        let map = retype(&mut module);

        let typed = map.signature(ext).unwrap();
        assert_eq!(typed.ret, Some(PtrDesc::new(Type::I8, AddrSpace(3))));
        assert_eq!(typed.arg(0), Some(PtrDesc::new(Type::I8, AddrSpace(1))));
        assert_eq!(typed.arg(1), None);
        assert!(map.contains(PtrKey::Func(ext)));
    }
}

#[test]
fn annotation_wins_for_argument_two() {
    let mut builder = builder_for(OLD);
    let sig = Signature::new(
        "kernel",
        Linkage::Public,
        &[Type::PTR, Type::I32, Type::Ptr(AddrSpace(1))],
        Type::Unit,
    )
    .with_elem_types(ElemTypeAnnotation::new().with_arg(2, Constant::make_imm(0i64)));
    let kernel = builder.module_builder.declare_function(sig);

    let mut func_builder = builder
        .module_builder
        .func_builder::<ptrlift_ir::InstInserter>(kernel);
    let p = func_builder.args()[2];
    let b0 = func_builder.append_block();
    func_builder.switch_to_block(b0);
    func_builder.load(p, Type::F32);
    func_builder.ret(None);
    func_builder.finish();

    let mut module = builder.build();
    let retyped = LegacyRewriter::for_target(&module.ctx.triple)
        .run(&mut module)
        .unwrap();

    let i64_ptr = Some(PtrDesc::new(Type::I64, AddrSpace(1)));
    assert_eq!(retyped.map.get(PtrKey::Value(kernel, p)), i64_ptr);
    assert_eq!(retyped.map.signature(kernel).unwrap().arg(2), i64_ptr);

    // The `f32` read disagrees with the annotation and goes through a cast.
    assert!(retyped.changed);
    insta::assert_snapshot!(dump_func(&module, kernel), @r"
    func public %kernel(v0.ptr, v1.i32, v2.ptr(1)) !arg_eltypes(2 0.i64) {
        block0:
            v4.ptr(1) = bitcast v2;
            v3.f32 = load v4;
            return;
    }
    ");
}
