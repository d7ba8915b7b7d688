use ptrlift_ir::{
    builder::test_util::TestModuleBuilder, AddrSpace, FuncRef, GlobalVariableData,
    GlobalVariableRef, InstData, InstId, Linkage, Module, ModuleCtx, Type, ValueId,
};
use ptrlift_triple::TargetTriple;

pub fn ctx_for(triple: &str) -> ModuleCtx {
    ModuleCtx::new(TargetTriple::parse(triple).unwrap())
}

pub fn builder_for(triple: &str) -> TestModuleBuilder {
    TestModuleBuilder::with_ctx(ctx_for(triple))
}

/// Every instruction of every function, in declaration and layout order.
pub fn all_insts(module: &Module) -> Vec<(FuncRef, InstId)> {
    module
        .iter_functions()
        .flat_map(|func_ref| {
            module.funcs[func_ref]
                .layout
                .iter_all_inst()
                .map(move |inst| (func_ref, inst))
        })
        .collect()
}

pub fn find_inst(module: &Module, func_ref: FuncRef, pred: impl Fn(&InstData) -> bool) -> InstId {
    let func = &module.funcs[func_ref];
    func.layout
        .iter_all_inst()
        .find(|inst| pred(func.dfg.inst(*inst)))
        .unwrap()
}

/// `g: i32` in address space 3, read once by `load_g() -> i32`.
pub fn global_read(triple: &str) -> (Module, FuncRef, GlobalVariableRef) {
    let mut builder = builder_for(triple);
    let gv = builder.module_builder.make_global(GlobalVariableData::new(
        "g".to_string(),
        Type::I32,
        AddrSpace(3),
        Linkage::Private,
        false,
        None,
    ));

    let mut func_builder = builder.func_builder(&[], Type::I32);
    let b0 = func_builder.append_block();
    func_builder.switch_to_block(b0);
    let addr = func_builder.make_global_value(gv);
    let v = func_builder.load(addr, Type::I32);
    func_builder.ret(Some(v));
    func_builder.finish();

    let func_ref = builder.func_ref().unwrap();
    (builder.build(), func_ref, gv)
}

/// Two address computations with different result element types merged by
/// a phi and read as `i16`. Returns the phi.
pub fn merged_addresses(triple: &str) -> (Module, FuncRef, ValueId) {
    let mut builder = builder_for(triple);
    let pair = builder
        .module_builder
        .declare_literal_struct_type(&[Type::I64, Type::F32]);

    let mut func_builder = builder.func_builder(&[Type::I1, Type::I64], Type::I16);
    let [cond, n] = [func_builder.args()[0], func_builder.args()[1]];
    let entry = func_builder.append_block();
    let then = func_builder.append_block();
    let else_ = func_builder.append_block();
    let merge = func_builder.append_block();

    func_builder.switch_to_block(entry);
    let a = func_builder.alloca(pair);
    let b = func_builder.alloca(Type::I32);
    let zero = func_builder.make_imm_value(0i32);
    let one = func_builder.make_imm_value(1i32);
    let field = func_builder.gep(pair, &[a, zero, one]);
    let elem = func_builder.gep(Type::I32, &[b, n]);
    func_builder.br(cond, then, else_);

    func_builder.switch_to_block(then);
    func_builder.jump(merge);

    func_builder.switch_to_block(else_);
    func_builder.jump(merge);

    func_builder.switch_to_block(merge);
    let phi = func_builder.phi(Type::PTR, &[(field, then), (elem, else_)]);
    let v = func_builder.load(phi, Type::I16);
    func_builder.ret(Some(v));
    func_builder.finish();

    let func_ref = builder.func_ref().unwrap();
    (builder.build(), func_ref, phi)
}
