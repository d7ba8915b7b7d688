use smallvec::SmallVec;

use super::ModuleBuilder;
use crate::{
    func_cursor::{CursorLocation, FuncCursor},
    inst::{BinaryOp, CastOp, InstData, RmwOp, UnaryOp},
    module::FuncRef,
    value::ConstExpr,
    AddrSpace, BlockId, Function, GlobalVariableRef, Immediate, Type, ValueId,
};

pub struct FunctionBuilder<'a, C> {
    pub module_builder: &'a mut ModuleBuilder,
    pub func: Function,
    func_ref: FuncRef,
    pub cursor: C,
}

impl<'a, C> FunctionBuilder<'a, C>
where
    C: FuncCursor,
{
    pub fn new(module_builder: &'a mut ModuleBuilder, func_ref: FuncRef, cursor: C) -> Self {
        let ctx = module_builder.ctx.clone();
        let func = ctx.func_sig(func_ref, |sig| Function::new(&ctx, sig));

        Self {
            module_builder,
            func,
            func_ref,
            cursor,
        }
    }

    pub fn finish(self) {
        let Self {
            module_builder,
            func,
            func_ref,
            ..
        } = self;

        module_builder.update_func(func_ref, func);
    }

    pub fn func_ref(&self) -> FuncRef {
        self.func_ref
    }

    pub fn args(&self) -> &[ValueId] {
        &self.func.arg_values
    }

    pub fn append_block(&mut self) -> BlockId {
        let block = self.cursor.make_block(&mut self.func);
        self.cursor.append_block(&mut self.func, block);
        block
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.cursor.set_location(CursorLocation::BlockBottom(block));
    }

    /// # Panic
    /// Panics if `phi_res` is not a result of a phi.
    pub fn append_phi_arg(&mut self, phi_res: ValueId, value: ValueId, block: BlockId) {
        let Some(phi_inst) = self.func.dfg.value_inst(phi_res) else {
            panic!("`phi_res` should be a result of phi inst");
        };

        self.func.dfg.append_phi_arg(phi_inst, value, block);
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        self.func.dfg.make_imm_value(imm)
    }

    pub fn make_undef_value(&mut self, ty: Type) -> ValueId {
        self.func.dfg.make_undef_value(ty)
    }

    pub fn make_null_value(&mut self, addr_space: AddrSpace) -> ValueId {
        self.func.dfg.make_null_value(addr_space)
    }

    /// Return pointer value to the global variable.
    pub fn make_global_value(&mut self, gv: GlobalVariableRef) -> ValueId {
        self.func.dfg.make_global_value(gv)
    }

    /// Return pointer value to the function.
    pub fn make_func_value(&mut self, func: FuncRef) -> ValueId {
        self.func.dfg.make_func_value(func)
    }

    /// Makes a constant address computation. `args` must be constants.
    pub fn make_const_gep(&mut self, src_ty: Type, args: &[ValueId]) -> ValueId {
        let res_ty = self.gep_res_ty(src_ty, args);
        self.func.dfg.make_const_expr(ConstExpr::Gep {
            src_ty,
            res_ty,
            args: args.iter().copied().collect(),
        })
    }

    /// Makes a constant cast. `arg` must be a constant.
    pub fn make_const_cast(&mut self, code: CastOp, arg: ValueId, ty: Type) -> ValueId {
        self.func
            .dfg
            .make_const_expr(ConstExpr::Cast { code, arg, ty })
    }

    pub fn unary(&mut self, code: UnaryOp, lhs: ValueId) -> ValueId {
        self.insert_inst(InstData::unary(code, lhs))
    }

    pub fn binary(&mut self, code: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.insert_inst(InstData::binary(code, lhs, rhs))
    }

    pub fn cast(&mut self, code: CastOp, arg: ValueId, ty: Type) -> ValueId {
        self.insert_inst(InstData::cast(code, arg, ty))
    }

    pub fn addr_space_cast(&mut self, arg: ValueId, addr_space: AddrSpace) -> ValueId {
        self.cast(CastOp::AddrSpaceCast, arg, Type::Ptr(addr_space))
    }

    pub fn load(&mut self, ptr: ValueId, ty: Type) -> ValueId {
        self.insert_inst(InstData::Load { args: [ptr], ty })
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        self.insert_inst_no_result(InstData::Store { args: [value, ptr] })
    }

    pub fn atomic_rmw(&mut self, code: RmwOp, ptr: ValueId, value: ValueId) -> ValueId {
        self.insert_inst(InstData::AtomicRmw {
            code,
            args: [ptr, value],
        })
    }

    pub fn cmpxchg(&mut self, ptr: ValueId, expected: ValueId, new: ValueId) -> ValueId {
        self.insert_inst(InstData::CmpXchg {
            args: [ptr, expected, new],
        })
    }

    /// Inserts an address computation; `args[0]` is the base pointer.
    pub fn gep(&mut self, src_ty: Type, args: &[ValueId]) -> ValueId {
        let res_ty = self.gep_res_ty(src_ty, args);
        self.insert_inst(InstData::Gep {
            src_ty,
            res_ty,
            args: args.iter().copied().collect(),
        })
    }

    pub fn alloca(&mut self, ty: Type) -> ValueId {
        self.alloca_in(ty, AddrSpace::GENERIC)
    }

    pub fn alloca_in(&mut self, ty: Type, addr_space: AddrSpace) -> ValueId {
        self.insert_inst(InstData::Alloca { ty, addr_space })
    }

    /// Returns `None` if the callee returns `unit`.
    pub fn call(&mut self, func: FuncRef, args: &[ValueId]) -> Option<ValueId> {
        let ret_ty = self.module_builder.ctx.func_sig(func, |sig| sig.ret_ty());
        let data = InstData::Call {
            func,
            args: args.iter().copied().collect(),
            ret_ty,
        };

        let (_, result) = self
            .cursor
            .insert_inst_data_with_result(&mut self.func, data);
        result
    }

    pub fn select(&mut self, cond: ValueId, then: ValueId, else_: ValueId) -> ValueId {
        self.insert_inst(InstData::Select {
            args: [cond, then, else_],
        })
    }

    pub fn phi(&mut self, ty: Type, args: &[(ValueId, BlockId)]) -> ValueId {
        let (values, blocks): (SmallVec<_>, SmallVec<_>) = args.iter().copied().unzip();
        self.insert_inst(InstData::Phi { values, blocks, ty })
    }

    pub fn jump(&mut self, dest: BlockId) {
        self.insert_inst_no_result(InstData::jump(dest))
    }

    pub fn br(&mut self, cond: ValueId, then: BlockId, else_: BlockId) {
        self.insert_inst_no_result(InstData::Branch {
            args: [cond],
            dests: [then, else_],
        })
    }

    pub fn ret(&mut self, arg: Option<ValueId>) {
        self.insert_inst_no_result(InstData::Return { args: arg })
    }

    /// Inserts an instruction into the current position and returns a
    /// `ValueId` for the result.
    ///
    /// # Panic
    /// Panics if the instruction has no result.
    pub fn insert_inst(&mut self, data: InstData) -> ValueId {
        let (inst, result) = self
            .cursor
            .insert_inst_data_with_result(&mut self.func, data);
        match result {
            Some(result) => result,
            None => panic!("{inst:?} doesn't have a result"),
        }
    }

    /// Inserts an instruction into the function without creating a result
    /// value.
    pub fn insert_inst_no_result(&mut self, data: InstData) {
        let inst = self.cursor.insert_inst_data(&mut self.func, data);
        self.cursor.set_location(CursorLocation::At(inst));
    }

    pub fn type_of(&self, value: ValueId) -> Type {
        self.func.dfg.value_ty(value)
    }

    fn gep_res_ty(&self, src_ty: Type, args: &[ValueId]) -> Type {
        let indices: SmallVec<[Option<usize>; 8]> = args[1..]
            .iter()
            .map(|arg| self.func.dfg.value_imm(*arg).and_then(Immediate::as_usize))
            .collect();
        self.func
            .dfg
            .ctx
            .with_ty_store(|s| s.gep_result_ty(src_ty, &indices))
    }
}
