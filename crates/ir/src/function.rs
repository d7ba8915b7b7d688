use std::io;

use smallvec::SmallVec;

use super::{DataFlowGraph, Layout, Type, ValueId};
use crate::{ir_writer::WriteWithModule, module::ModuleCtx, Constant, Linkage};

#[derive(Debug)]
pub struct Function {
    pub arg_values: SmallVec<[ValueId; 8]>,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
}

impl Function {
    pub fn new(ctx: &ModuleCtx, sig: &Signature) -> Self {
        let mut dfg = DataFlowGraph::new(ctx.clone());
        let arg_values = sig
            .args()
            .iter()
            .enumerate()
            .map(|(idx, arg_ty)| dfg.make_arg_value(*arg_ty, idx))
            .collect();

        Self {
            arg_values,
            dfg,
            layout: Layout::default(),
        }
    }

    pub fn ctx(&self) -> &ModuleCtx {
        &self.dfg.ctx
    }

    /// A function without any block is a declaration.
    pub fn is_declaration(&self) -> bool {
        self.layout.entry_block().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    /// Name of the function.
    name: String,

    /// Linkage of the function.
    linkage: Linkage,

    args: SmallVec<[Type; 8]>,
    ret_ty: Type,

    elem_types: Option<ElemTypeAnnotation>,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, args: &[Type], ret_ty: Type) -> Self {
        Self {
            name: name.to_string(),
            linkage,
            args: args.into(),
            ret_ty,
            elem_types: None,
        }
    }

    pub fn with_elem_types(mut self, elem_types: ElemTypeAnnotation) -> Self {
        self.elem_types = Some(elem_types);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn args(&self) -> &[Type] {
        &self.args
    }

    pub fn ret_ty(&self) -> Type {
        self.ret_ty
    }

    pub fn elem_types(&self) -> Option<&ElemTypeAnnotation> {
        self.elem_types.as_ref()
    }

    pub fn func_type(&self, ctx: &ModuleCtx) -> Type {
        ctx.with_ty_store_mut(|s| s.make_func(&self.args, self.ret_ty))
    }
}

impl WriteWithModule for Signature {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "func {} %{}(", self.linkage, self.name)?;
        crate::types::write_types_with_delim(ctx, w, &self.args, ", ")?;
        write!(w, ")")?;

        if !self.ret_ty.is_unit() {
            write!(w, " -> ")?;
            self.ret_ty.write(ctx, w)?;
        }

        if let Some(elem_types) = &self.elem_types {
            w.write_all(b" ")?;
            elem_types.write(ctx, w)?;
        }

        Ok(())
    }
}

/// Pointer element types attached to a function declaration.
///
/// Each entry carries a sample constant whose type is the element type of
/// the pointer at that position. The return entry is unindexed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElemTypeAnnotation {
    ret: Option<Constant>,
    args: SmallVec<[(usize, Constant); 4]>,
}

impl ElemTypeAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ret(mut self, sample: Constant) -> Self {
        self.ret = Some(sample);
        self
    }

    pub fn with_arg(mut self, idx: usize, sample: Constant) -> Self {
        self.args.push((idx, sample));
        self
    }

    pub fn ret(&self) -> Option<&Constant> {
        self.ret.as_ref()
    }

    /// Returns the first sample recorded for the argument.
    pub fn arg(&self, idx: usize) -> Option<&Constant> {
        self.args
            .iter()
            .find_map(|(i, sample)| (*i == idx).then_some(sample))
    }

    pub fn iter_args(&self) -> impl Iterator<Item = (usize, &Constant)> {
        self.args.iter().map(|(idx, sample)| (*idx, sample))
    }
}

impl WriteWithModule for ElemTypeAnnotation {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "!arg_eltypes(")?;
        let mut delim = "";
        if let Some(ret) = &self.ret {
            write!(w, "ret ")?;
            ret.write(ctx, w)?;
            delim = ", ";
        }
        for (idx, sample) in &self.args {
            write!(w, "{delim}{idx} ")?;
            sample.write(ctx, w)?;
            delim = ", ";
        }
        write!(w, ")")
    }
}
