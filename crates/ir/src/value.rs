//! This module contains ptrlift IR value definition.
use core::fmt;
use std::io;

use smallvec::SmallVec;

use super::Type;
use crate::{
    inst::{CastOp, InstData, InstId},
    ir_writer::{FuncWriteCtx, WriteWithFunc, WriteWithModule},
    module::FuncRef,
    GlobalVariableRef,
};

/// An opaque reference to [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct ValueId(pub u32);
cranelift_entity::entity_impl!(ValueId);

/// An value data definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// The value is defined by an instruction.
    Inst { inst: InstId, ty: Type },

    /// The value is a function argument.
    Arg { ty: Type, idx: usize },

    /// The value is immediate value.
    Immediate { imm: Immediate, ty: Type },

    /// The value is the address of a global variable.
    Global { gv: GlobalVariableRef, ty: Type },

    /// The value is the address of a function.
    Func { func: FuncRef, ty: Type },

    /// The null pointer.
    Null { ty: Type },

    Undef { ty: Type },

    /// The value is a compile-time expression over other values.
    ConstExpr { expr: ConstExpr, ty: Type },
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Self::Inst { ty, .. }
            | Self::Arg { ty, .. }
            | Self::Immediate { ty, .. }
            | Self::Global { ty, .. }
            | Self::Func { ty, .. }
            | Self::Null { ty }
            | Self::Undef { ty }
            | Self::ConstExpr { ty, .. } => *ty,
        }
    }
}

/// A constant expression embedded as an operand.
///
/// Only address computations and casts can be folded into an operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstExpr {
    Gep {
        src_ty: Type,
        res_ty: Type,
        args: SmallVec<[ValueId; 4]>,
    },
    Cast {
        code: CastOp,
        arg: ValueId,
        ty: Type,
    },
}

impl ConstExpr {
    /// Returns the equivalent standalone instruction.
    pub fn as_inst_data(&self) -> InstData {
        match self {
            Self::Gep {
                src_ty,
                res_ty,
                args,
            } => InstData::Gep {
                src_ty: *src_ty,
                res_ty: *res_ty,
                args: args.iter().copied().collect(),
            },
            Self::Cast { code, arg, ty } => InstData::Cast {
                code: *code,
                args: [*arg],
                ty: *ty,
            },
        }
    }

    pub fn args(&self) -> &[ValueId] {
        match self {
            Self::Gep { args, .. } => args,
            Self::Cast { arg, .. } => std::slice::from_ref(arg),
        }
    }
}

impl WriteWithFunc for ValueId {
    fn write(&self, ctx: &FuncWriteCtx, w: &mut impl io::Write) -> io::Result<()> {
        let module = ctx.module_ctx();
        match ctx.func.dfg.value(*self) {
            Value::Immediate { imm, ty } => {
                write!(w, "{imm}.")?;
                ty.write(module, w)
            }
            Value::Global { gv, .. } => {
                let symbol = module.with_gv_store(|s| s.gv_data(*gv).symbol.clone());
                write!(w, "%{symbol}")
            }
            Value::Func { func, .. } => {
                let name = module.func_sig(*func, |sig| sig.name().to_string());
                write!(w, "%{name}")
            }
            Value::Null { ty } => {
                write!(w, "null.")?;
                ty.write(module, w)
            }
            Value::Undef { ty } => {
                write!(w, "undef.")?;
                ty.write(module, w)
            }
            Value::ConstExpr { expr, .. } => {
                write!(w, "(")?;
                match expr {
                    ConstExpr::Gep { src_ty, args, .. } => {
                        write!(w, "gep ")?;
                        src_ty.write(module, w)?;
                        w.write_all(b" ")?;
                        ctx.write_iter_with_delim(args.iter(), " ", w)?;
                    }
                    ConstExpr::Cast { code, arg, ty } => {
                        write!(w, "{code} ")?;
                        arg.write(ctx, w)?;
                        w.write_all(b" ")?;
                        ty.write(module, w)?;
                    }
                }
                write!(w, ")")
            }
            Value::Inst { .. } | Value::Arg { .. } => {
                write!(w, "v{}", self.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    I1(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
}

impl Immediate {
    pub fn ty(&self) -> Type {
        match self {
            Self::I1(..) => Type::I1,
            Self::I8(..) => Type::I8,
            Self::I16(..) => Type::I16,
            Self::I32(..) => Type::I32,
            Self::I64(..) => Type::I64,
            Self::I128(..) => Type::I128,
        }
    }

    pub fn zero(ty: Type) -> Self {
        Self::from_i128(0, ty)
    }

    pub fn as_i128(self) -> i128 {
        match self {
            Self::I1(val) => val.into(),
            Self::I8(val) => val.into(),
            Self::I16(val) => val.into(),
            Self::I32(val) => val.into(),
            Self::I64(val) => val.into(),
            Self::I128(val) => val,
        }
    }

    /// Returns the immediate as an index, or `None` if it is negative or
    /// doesn't fit.
    pub fn as_usize(self) -> Option<usize> {
        usize::try_from(self.as_i128()).ok()
    }

    /// Makes an immediate of the given type, truncating `val` to fit.
    ///
    /// # Panic
    /// Panics if `ty` is not an integral type.
    pub fn from_i128(val: i128, ty: Type) -> Self {
        match ty {
            Type::I1 => Self::I1(val & 1 != 0),
            Type::I8 => Self::I8(val as i8),
            Type::I16 => Self::I16(val as i16),
            Type::I32 => Self::I32(val as i32),
            Type::I64 => Self::I64(val as i64),
            Type::I128 => Self::I128(val),
            _ => unreachable!("immediate of non-integral type"),
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_i128() == 0
    }
}

impl From<bool> for Immediate {
    fn from(val: bool) -> Self {
        Self::I1(val)
    }
}

impl From<i8> for Immediate {
    fn from(val: i8) -> Self {
        Self::I8(val)
    }
}

impl From<i16> for Immediate {
    fn from(val: i16) -> Self {
        Self::I16(val)
    }
}

impl From<i32> for Immediate {
    fn from(val: i32) -> Self {
        Self::I32(val)
    }
}

impl From<i64> for Immediate {
    fn from(val: i64) -> Self {
        Self::I64(val)
    }
}

impl From<i128> for Immediate {
    fn from(val: i128) -> Self {
        Self::I128(val)
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::I1(val) => write!(f, "{}", *val as u8),
            Self::I8(val) => write!(f, "{val}"),
            Self::I16(val) => write!(f, "{val}"),
            Self::I32(val) => write!(f, "{val}"),
            Self::I64(val) => write!(f, "{val}"),
            Self::I128(val) => write!(f, "{val}"),
        }
    }
}

