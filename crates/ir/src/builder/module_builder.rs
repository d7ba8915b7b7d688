use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use super::FunctionBuilder;
use crate::{
    func_cursor::{CursorLocation, FuncCursor},
    module::{FuncRef, ModuleCtx},
    AddrSpace, Function, GlobalVariableData, GlobalVariableRef, Module, Signature, Type,
};

#[derive(Debug)]
pub struct ModuleBuilder {
    pub ctx: ModuleCtx,

    funcs: PrimaryMap<FuncRef, Function>,

    /// Map function name -> FuncRef to avoid duplicated declaration.
    declared_funcs: FxHashMap<String, FuncRef>,
}

impl ModuleBuilder {
    pub fn new(ctx: ModuleCtx) -> Self {
        Self {
            ctx,
            funcs: PrimaryMap::default(),
            declared_funcs: FxHashMap::default(),
        }
    }

    /// Declares a function. A function stays a declaration until a
    /// [`FunctionBuilder`] for it is finished.
    ///
    /// Declaring the same name twice returns the first declaration.
    pub fn declare_function(&mut self, sig: Signature) -> FuncRef {
        if let Some(func_ref) = self.declared_funcs.get(sig.name()) {
            return *func_ref;
        }

        let func = Function::new(&self.ctx, &sig);
        let func_ref = self.funcs.push(func);
        self.declared_funcs.insert(sig.name().to_string(), func_ref);
        self.ctx.declared_funcs.insert(func_ref, sig);
        func_ref
    }

    pub fn make_global(&self, global: GlobalVariableData) -> GlobalVariableRef {
        self.ctx.with_gv_store_mut(|s| s.make_gv(global))
    }

    pub fn declare_struct_type(&self, name: &str, fields: &[Type], packed: bool) -> Type {
        self.ctx
            .with_ty_store_mut(|s| s.make_struct(name, fields, packed))
    }

    pub fn declare_literal_struct_type(&self, fields: &[Type]) -> Type {
        self.ctx
            .with_ty_store_mut(|s| s.make_literal_struct(fields, false))
    }

    pub fn declare_array_type(&self, elem: Type, len: usize) -> Type {
        self.ctx.with_ty_store_mut(|s| s.make_array(elem, len))
    }

    pub fn declare_vector_type(&self, elem: Type, len: usize) -> Type {
        self.ctx.with_ty_store_mut(|s| s.make_vector(elem, len))
    }

    pub fn ptr_type(&self, addr_space: AddrSpace) -> Type {
        Type::Ptr(addr_space)
    }

    pub fn func_builder<C>(&mut self, func: FuncRef) -> FunctionBuilder<'_, C>
    where
        C: FuncCursor,
    {
        let cursor = C::at_location(CursorLocation::NoWhere);
        FunctionBuilder::new(self, func, cursor)
    }

    pub(super) fn update_func(&mut self, func_ref: FuncRef, func: Function) {
        self.funcs[func_ref] = func;
    }

    pub fn build(self) -> Module {
        Module {
            funcs: self.funcs,
            ctx: self.ctx,
        }
    }
}
