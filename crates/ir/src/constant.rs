//! Module level constants.
//!
//! Constants appear as global initializers and as samples in element type
//! annotations. Inside a function body they are lowered to [`crate::Value`]s.
use std::io;

use crate::{
    ir_writer::WriteWithModule, module::FuncRef, AddrSpace, GlobalVariableRef, Immediate,
    ModuleCtx, Type,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Imm(Immediate),

    /// The null pointer in the given address space.
    Null(AddrSpace),

    Undef(Type),

    /// The all-zero value of an arbitrary type.
    Zero(Type),

    /// The address of a global variable.
    Global(GlobalVariableRef),

    /// The address of a function.
    Func(FuncRef),

    Array {
        elem_ty: Type,
        elems: Vec<Constant>,
    },

    Vector {
        elem_ty: Type,
        elems: Vec<Constant>,
    },

    Struct {
        ty: Type,
        fields: Vec<Constant>,
    },
}

impl Constant {
    pub fn make_imm(data: impl Into<Immediate>) -> Self {
        Self::Imm(data.into())
    }

    pub fn ty(&self, ctx: &ModuleCtx) -> Type {
        match self {
            Self::Imm(imm) => imm.ty(),
            Self::Null(addr_space) => Type::Ptr(*addr_space),
            Self::Undef(ty) | Self::Zero(ty) => *ty,
            Self::Global(gv) => Type::Ptr(ctx.with_gv_store(|s| s.addr_space(*gv))),
            Self::Func(_) => Type::PTR,
            Self::Array { elem_ty, elems } => {
                ctx.with_ty_store_mut(|s| s.make_array(*elem_ty, elems.len()))
            }
            Self::Vector { elem_ty, elems } => {
                ctx.with_ty_store_mut(|s| s.make_vector(*elem_ty, elems.len()))
            }
            Self::Struct { ty, .. } => *ty,
        }
    }

    /// Returns the nested constants of an aggregate.
    pub fn elems(&self) -> &[Constant] {
        match self {
            Self::Array { elems, .. } | Self::Vector { elems, .. } => elems,
            Self::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::Array { .. } | Self::Vector { .. } | Self::Struct { .. }
        )
    }
}

impl WriteWithModule for Constant {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        match self {
            Self::Imm(imm) => {
                write!(w, "{imm}.")?;
                imm.ty().write(ctx, w)
            }
            Self::Null(addr_space) => {
                write!(w, "null.")?;
                Type::Ptr(*addr_space).write(ctx, w)
            }
            Self::Undef(ty) => {
                write!(w, "undef.")?;
                ty.write(ctx, w)
            }
            Self::Zero(ty) => {
                write!(w, "zero.")?;
                ty.write(ctx, w)
            }
            Self::Global(gv) => {
                let symbol = ctx.with_gv_store(|s| s.gv_data(*gv).symbol.clone());
                write!(w, "%{symbol}")
            }
            Self::Func(func) => {
                let name = ctx.func_sig(*func, |sig| sig.name().to_string());
                write!(w, "%{name}")
            }
            Self::Array { elems, .. } => {
                write!(w, "[")?;
                write_constants(ctx, w, elems)?;
                write!(w, "]")
            }
            Self::Vector { elems, .. } => {
                write!(w, "<")?;
                write_constants(ctx, w, elems)?;
                write!(w, ">")
            }
            Self::Struct { fields, .. } => {
                write!(w, "{{")?;
                write_constants(ctx, w, fields)?;
                write!(w, "}}")
            }
        }
    }
}

fn write_constants(ctx: &ModuleCtx, w: &mut impl io::Write, elems: &[Constant]) -> io::Result<()> {
    let mut delim = "";
    for elem in elems {
        w.write_all(delim.as_bytes())?;
        elem.write(ctx, w)?;
        delim = ", ";
    }
    Ok(())
}

impl From<Immediate> for Constant {
    fn from(imm: Immediate) -> Self {
        Self::Imm(imm)
    }
}
