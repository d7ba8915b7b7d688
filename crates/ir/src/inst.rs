//! This module contains ptrlift IR instructions definitions.
use std::{fmt, io};

use smallvec::SmallVec;

use crate::{
    ir_writer::{FuncWriteCtx, WriteWithFunc, WriteWithModule},
    module::FuncRef,
    AddrSpace, BlockId, DataFlowGraph, Type, ValueId,
};

/// An opaque reference to [`InstData`]
#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);
cranelift_entity::entity_impl!(InstId);

/// An instruction data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstData {
    /// Unary instructions.
    Unary { code: UnaryOp, args: [ValueId; 1] },

    /// Binary instructions.
    Binary { code: BinaryOp, args: [ValueId; 2] },

    /// Cast operations.
    Cast {
        code: CastOp,
        args: [ValueId; 1],
        ty: Type,
    },

    /// Load a value of type `ty` through a pointer.
    Load { args: [ValueId; 1], ty: Type },

    /// Store a value through a pointer. `args` is `[value, ptr]`.
    Store { args: [ValueId; 2] },

    /// Atomic read-modify-write. `args` is `[ptr, value]`.
    AtomicRmw { code: RmwOp, args: [ValueId; 2] },

    /// Atomic compare and exchange. `args` is `[ptr, expected, new]`.
    CmpXchg { args: [ValueId; 3] },

    /// Address computation. `src_ty` is the type the base pointer is
    /// stepped over, `res_ty` the type the result points into.
    Gep {
        src_ty: Type,
        res_ty: Type,
        args: SmallVec<[ValueId; 8]>,
    },

    /// Allocate a memory on the stack frame for the given type.
    Alloca { ty: Type, addr_space: AddrSpace },

    /// Call a function in the module.
    Call {
        func: FuncRef,
        args: SmallVec<[ValueId; 8]>,
        ret_ty: Type,
    },

    /// `args` is `[cond, then, else]`.
    Select { args: [ValueId; 3] },

    /// Phi function.
    Phi {
        values: SmallVec<[ValueId; 8]>,
        blocks: SmallVec<[BlockId; 8]>,
        ty: Type,
    },

    /// Unconditional jump instruction.
    Jump { dests: [BlockId; 1] },

    /// Conditional jump instruction.
    Branch {
        args: [ValueId; 1],
        dests: [BlockId; 2],
    },

    /// Return.
    Return { args: Option<ValueId> },
}

impl InstData {
    pub fn unary(code: UnaryOp, lhs: ValueId) -> Self {
        Self::Unary { code, args: [lhs] }
    }

    pub fn binary(code: BinaryOp, lhs: ValueId, rhs: ValueId) -> Self {
        Self::Binary {
            code,
            args: [lhs, rhs],
        }
    }

    pub fn cast(code: CastOp, arg: ValueId, ty: Type) -> Self {
        Self::Cast {
            code,
            args: [arg],
            ty,
        }
    }

    /// Makes a no-op cast of `arg` to its own type.
    pub fn marker(arg: ValueId, ty: Type) -> Self {
        Self::cast(CastOp::Bitcast, arg, ty)
    }

    pub fn jump(dest: BlockId) -> Self {
        Self::Jump { dests: [dest] }
    }

    pub fn phi(ty: Type) -> Self {
        Self::Phi {
            values: SmallVec::new(),
            blocks: SmallVec::new(),
            ty,
        }
    }

    pub fn args(&self) -> &[ValueId] {
        match self {
            Self::Binary { args, .. }
            | Self::Store { args }
            | Self::AtomicRmw { args, .. } => args,

            Self::Unary { args, .. }
            | Self::Cast { args, .. }
            | Self::Load { args, .. }
            | Self::Branch { args, .. } => args,

            Self::CmpXchg { args } | Self::Select { args } => args,

            Self::Gep { args, .. } | Self::Call { args, .. } | Self::Phi { values: args, .. } => {
                args
            }

            Self::Return { args } => args.as_slice(),

            Self::Alloca { .. } | Self::Jump { .. } => &[],
        }
    }

    pub fn args_mut(&mut self) -> &mut [ValueId] {
        match self {
            Self::Binary { args, .. }
            | Self::Store { args }
            | Self::AtomicRmw { args, .. } => args,

            Self::Unary { args, .. }
            | Self::Cast { args, .. }
            | Self::Load { args, .. }
            | Self::Branch { args, .. } => args,

            Self::CmpXchg { args } | Self::Select { args } => args,

            Self::Gep { args, .. } | Self::Call { args, .. } | Self::Phi { values: args, .. } => {
                args
            }

            Self::Return { args } => args.as_mut_slice(),

            Self::Alloca { .. } | Self::Jump { .. } => &mut [],
        }
    }

    pub fn replace_arg(&mut self, new_arg: ValueId, idx: usize) {
        self.args_mut()[idx] = new_arg;
    }

    /// Returns the index of the operand that is dereferenced or offset by
    /// the instruction.
    pub fn pointer_operand_index(&self) -> Option<usize> {
        match self {
            Self::Load { .. } | Self::AtomicRmw { .. } | Self::CmpXchg { .. } | Self::Gep { .. } => {
                Some(0)
            }
            Self::Store { .. } => Some(1),
            _ => None,
        }
    }

    pub fn append_phi_arg(&mut self, value: ValueId, block: BlockId) {
        match self {
            Self::Phi { values, blocks, .. } => {
                values.push(value);
                blocks.push(block)
            }
            _ => panic!("expects `InstData::Phi` but got `{:?}`", self),
        }
    }

    pub fn phi_blocks(&self) -> &[BlockId] {
        match self {
            Self::Phi { blocks, .. } => blocks,
            _ => panic!("inst is not a phi function"),
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi { .. })
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. }
        )
    }

    pub fn result_type(&self, dfg: &DataFlowGraph) -> Option<Type> {
        match self {
            Self::Unary { args, .. } => Some(dfg.value_ty(args[0])),
            Self::Binary { code, args } => Some(code.result_type(dfg, args)),
            Self::Cast { ty, .. } | Self::Load { ty, .. } | Self::Phi { ty, .. } => Some(*ty),
            Self::AtomicRmw { args, .. } => Some(dfg.value_ty(args[1])),
            Self::CmpXchg { args } => Some(dfg.value_ty(args[2])),
            Self::Gep { args, .. } => Some(dfg.value_ty(args[0])),
            Self::Alloca { addr_space, .. } => Some(Type::Ptr(*addr_space)),
            Self::Call { ret_ty, .. } => (!ret_ty.is_unit()).then_some(*ret_ty),
            Self::Select { args } => Some(dfg.value_ty(args[1])),
            Self::Store { .. } | Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. } => {
                None
            }
        }
    }
}

impl WriteWithFunc for InstId {
    fn write(&self, ctx: &FuncWriteCtx, w: &mut impl io::Write) -> io::Result<()> {
        let dfg = &ctx.func.dfg;
        let module = ctx.module_ctx();
        if let Some(result) = dfg.inst_result(*self) {
            write!(w, "v{}.", result.0)?;
            dfg.value_ty(result).write(module, w)?;
            write!(w, " = ")?;
        }

        match dfg.inst(*self) {
            InstData::Unary { code, args } => {
                write!(w, "{code} ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::Binary { code, args } => {
                write!(w, "{code} ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::Cast { code, args, .. } => {
                write!(w, "{code} ")?;
                args[0].write(ctx, w)
            }
            InstData::Load { args, .. } => {
                write!(w, "load ")?;
                args[0].write(ctx, w)
            }
            InstData::Store { args } => {
                write!(w, "store ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::AtomicRmw { code, args } => {
                write!(w, "atomicrmw.{code} ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::CmpXchg { args } => {
                write!(w, "cmpxchg ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::Gep { src_ty, args, .. } => {
                write!(w, "gep ")?;
                src_ty.write(module, w)?;
                w.write_all(b" ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::Alloca { ty, .. } => {
                write!(w, "alloca ")?;
                ty.write(module, w)
            }
            InstData::Call { func, args, .. } => {
                let name = module.func_sig(*func, |sig| sig.name().to_string());
                write!(w, "call %{name}")?;
                for arg in args {
                    w.write_all(b" ")?;
                    arg.write(ctx, w)?;
                }
                Ok(())
            }
            InstData::Select { args } => {
                write!(w, "select ")?;
                ctx.write_iter_with_delim(args.iter(), " ", w)
            }
            InstData::Phi { values, blocks, .. } => {
                write!(w, "phi")?;
                for (value, block) in values.iter().zip(blocks.iter()) {
                    write!(w, " (")?;
                    value.write(ctx, w)?;
                    write!(w, " block{})", block.0)?;
                }
                Ok(())
            }
            InstData::Jump { dests } => write!(w, "jump block{}", dests[0].0),
            InstData::Branch { args, dests } => {
                write!(w, "br ")?;
                args[0].write(ctx, w)?;
                write!(w, " block{} block{}", dests[0].0, dests[1].0)
            }
            InstData::Return { args } => {
                write!(w, "return")?;
                if let Some(arg) = args {
                    w.write_all(b" ")?;
                    arg.write(ctx, w)?;
                }
                Ok(())
            }
        }
    }
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Neg => "neg",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Udiv,
    Sdiv,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    Ne,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Udiv => "udiv",
            Self::Sdiv => "sdiv",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Slt => "slt",
            Self::Sgt => "sgt",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }

    fn result_type(self, dfg: &DataFlowGraph, args: &[ValueId; 2]) -> Type {
        if self.is_cmp() {
            Type::I1
        } else {
            dfg.value_ty(args[0])
        }
    }

    fn is_cmp(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Gt | Self::Slt | Self::Sgt
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Sext,
    Zext,
    Trunc,
    Bitcast,
    AddrSpaceCast,
    PtrToInt,
    IntToPtr,
}

impl CastOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Sext => "sext",
            Self::Zext => "zext",
            Self::Trunc => "trunc",
            Self::Bitcast => "bitcast",
            Self::AddrSpaceCast => "addrspacecast",
            Self::PtrToInt => "ptrtoint",
            Self::IntToPtr => "inttoptr",
        }
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations of [`InstData::AtomicRmw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmwOp {
    Xchg,
    Add,
    Sub,
    And,
    Or,
    Xor,
}

impl RmwOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Xchg => "xchg",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }
}

impl fmt::Display for RmwOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
