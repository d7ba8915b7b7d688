//! This module contains ptrlift IR data flow graph.
use std::collections::BTreeSet;

use cranelift_entity::{entity_impl, packed_option::PackedOption, PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;

use crate::{
    inst::{InstData, InstId},
    module::{FuncRef, ModuleCtx},
    value::ConstExpr,
    AddrSpace, GlobalVariableRef,
};

use super::{Immediate, Type, Value, ValueId};

#[derive(Debug)]
pub struct DataFlowGraph {
    pub ctx: ModuleCtx,
    #[doc(hidden)]
    pub blocks: PrimaryMap<BlockId, Block>,
    #[doc(hidden)]
    pub values: PrimaryMap<ValueId, Value>,
    insts: PrimaryMap<InstId, InstData>,
    inst_results: SecondaryMap<InstId, PackedOption<ValueId>>,
    /// Interned immediates, symbol addresses, nulls and undefs.
    constants: FxHashMap<Value, ValueId>,
    users: SecondaryMap<ValueId, BTreeSet<InstId>>,
}

impl DataFlowGraph {
    pub fn new(ctx: ModuleCtx) -> Self {
        Self {
            ctx,
            blocks: PrimaryMap::default(),
            values: PrimaryMap::default(),
            insts: PrimaryMap::default(),
            inst_results: SecondaryMap::default(),
            constants: FxHashMap::default(),
            users: SecondaryMap::default(),
        }
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    pub fn make_value(&mut self, value: Value) -> ValueId {
        self.values.push(value)
    }

    pub fn make_inst(&mut self, data: InstData) -> InstId {
        let inst_id = self.insts.push(data);
        self.attach_user(inst_id);
        inst_id
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> ValueId
    where
        Imm: Into<Immediate>,
    {
        let imm: Immediate = imm.into();
        let ty = imm.ty();
        self.make_interned(Value::Immediate { imm, ty })
    }

    /// Returns the value standing for the address of `gv`.
    pub fn make_global_value(&mut self, gv: GlobalVariableRef) -> ValueId {
        let addr_space = self.ctx.with_gv_store(|s| s.addr_space(gv));
        self.make_interned(Value::Global {
            gv,
            ty: Type::Ptr(addr_space),
        })
    }

    /// Returns the value standing for the address of `func`.
    pub fn make_func_value(&mut self, func: FuncRef) -> ValueId {
        self.make_interned(Value::Func {
            func,
            ty: Type::PTR,
        })
    }

    pub fn make_null_value(&mut self, addr_space: AddrSpace) -> ValueId {
        self.make_interned(Value::Null {
            ty: Type::Ptr(addr_space),
        })
    }

    pub fn make_undef_value(&mut self, ty: Type) -> ValueId {
        self.make_interned(Value::Undef { ty })
    }

    /// Makes a constant expression operand. Every call makes a fresh value.
    pub fn make_const_expr(&mut self, expr: ConstExpr) -> ValueId {
        let ty = match &expr {
            ConstExpr::Gep { args, .. } => self.value_ty(args[0]),
            ConstExpr::Cast { ty, .. } => *ty,
        };
        self.make_value(Value::ConstExpr { expr, ty })
    }

    fn make_interned(&mut self, value: Value) -> ValueId {
        if let Some(&value_id) = self.constants.get(&value) {
            return value_id;
        }

        let value_id = self.values.push(value.clone());
        self.constants.insert(value, value_id);
        value_id
    }

    /// Makes the result value of the instruction if it has one.
    pub fn make_result(&self, inst_id: InstId) -> Option<Value> {
        let ty = self.insts[inst_id].result_type(self)?;
        Some(Value::Inst { inst: inst_id, ty })
    }

    pub fn make_arg_value(&mut self, ty: Type, idx: usize) -> ValueId {
        self.make_value(Value::Arg { ty, idx })
    }

    pub fn attach_result(&mut self, inst_id: InstId, value_id: ValueId) {
        debug_assert!(self.inst_results[inst_id].is_none());
        self.inst_results[inst_id] = value_id.into();
    }

    /// Replaces the whole instruction data, keeping the result value.
    pub fn replace_inst(&mut self, inst_id: InstId, new: InstData) {
        self.untrack_inst(inst_id);
        self.insts[inst_id] = new;
        self.attach_user(inst_id);
    }

    /// Rewrites a single operand of the instruction.
    pub fn set_inst_arg(&mut self, inst_id: InstId, idx: usize, new_arg: ValueId) {
        let old = self.insts[inst_id].args()[idx];
        if old == new_arg {
            return;
        }

        self.insts[inst_id].replace_arg(new_arg, idx);
        if !self.insts[inst_id].args().contains(&old) {
            self.remove_user(old, inst_id);
        }
        self.users[new_arg].insert(inst_id);
    }

    pub fn inst(&self, inst_id: InstId) -> &InstData {
        &self.insts[inst_id]
    }

    pub fn value(&self, value_id: ValueId) -> &Value {
        &self.values[value_id]
    }

    pub fn value_ty(&self, value_id: ValueId) -> Type {
        self.values[value_id].ty()
    }

    /// Returns the instruction that defines the value, if any.
    pub fn value_inst(&self, value_id: ValueId) -> Option<InstId> {
        match self.values[value_id] {
            Value::Inst { inst, .. } => Some(inst),
            _ => None,
        }
    }

    pub fn value_imm(&self, value_id: ValueId) -> Option<Immediate> {
        match self.values[value_id] {
            Value::Immediate { imm, .. } => Some(imm),
            _ => None,
        }
    }

    pub fn value_gv(&self, value_id: ValueId) -> Option<GlobalVariableRef> {
        match self.values[value_id] {
            Value::Global { gv, .. } => Some(gv),
            _ => None,
        }
    }

    pub fn is_const_expr(&self, value_id: ValueId) -> bool {
        matches!(self.values[value_id], Value::ConstExpr { .. })
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values.iter()
    }

    pub fn attach_user(&mut self, inst_id: InstId) {
        for &value in self.insts[inst_id].args() {
            self.users[value].insert(inst_id);
        }
    }

    pub fn untrack_inst(&mut self, inst_id: InstId) {
        for &value in self.insts[inst_id].args() {
            self.users[value].remove(&inst_id);
        }
    }

    pub fn remove_user(&mut self, value: ValueId, user: InstId) {
        self.users[value].remove(&user);
    }

    /// Returns the all instructions that use the `value_id`.
    pub fn users(&self, value_id: ValueId) -> impl Iterator<Item = &InstId> {
        self.users[value_id].iter()
    }

    /// Returns the number of instructions that use the `value_id`.
    pub fn users_num(&self, value_id: ValueId) -> usize {
        self.users[value_id].len()
    }

    pub fn inst_result(&self, inst_id: InstId) -> Option<ValueId> {
        self.inst_results[inst_id].expand()
    }

    pub fn is_terminator(&self, inst: InstId) -> bool {
        self.inst(inst).is_terminator()
    }

    pub fn is_phi(&self, inst: InstId) -> bool {
        self.inst(inst).is_phi()
    }

    pub fn append_phi_arg(&mut self, inst_id: InstId, value: ValueId, block: BlockId) {
        self.insts[inst_id].append_phi_arg(value, block);
        self.users[value].insert(inst_id);
    }
}

/// An opaque reference to [`Block`]
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A block data definition.
/// A Block data doesn't hold any information for layout of a program. It is managed by
/// [`super::layout::Layout`].
#[derive(Debug, Clone, Default)]
pub struct Block {}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }
}
