//! Function signature reclassification shared by both strategies.
//!
//! Each pointer slot of a signature is resolved in priority order: the
//! element type annotation of the declaration, then a [`SlotResolver`], then
//! the optional fallback pointee. A slot left at `None` keeps its opaque
//! static type.
use ptrlift_ir::{
    AddrSpace, Constant, ElemTypeAnnotation, FuncRef, InstData, Module, ModuleCtx, Signature,
    Type,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    error::{AnnotatedSlot, RetypeError},
    PointerTypeMap, PtrDesc, PtrKey,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypedSignature {
    pub ret: Option<PtrDesc>,
    pub args: SmallVec<[Option<PtrDesc>; 8]>,
}

impl TypedSignature {
    pub fn arg(&self, idx: usize) -> Option<PtrDesc> {
        self.args.get(idx).copied().flatten()
    }

    /// Returns the function type of `sig` with every resolved slot typed.
    pub fn func_type(&self, sig: &Signature, ctx: &ModuleCtx) -> Type {
        let args: SmallVec<[Type; 8]> = sig
            .args()
            .iter()
            .enumerate()
            .map(|(idx, ty)| self.arg(idx).map_or(*ty, |desc| desc.typed_ptr_type(ctx)))
            .collect();
        let ret_ty = self
            .ret
            .map_or(sig.ret_ty(), |desc| desc.typed_ptr_type(ctx));

        ctx.with_ty_store_mut(|s| s.make_func(&args, ret_ty))
    }

    /// Descriptor of the function's own address.
    pub fn func_desc(&self, sig: &Signature, ctx: &ModuleCtx) -> PtrDesc {
        PtrDesc::new(self.func_type(sig, ctx), AddrSpace::GENERIC)
    }
}

/// Source of pointee types for slots without an annotation.
pub trait SlotResolver {
    fn resolve_ret(&mut self, func_ref: FuncRef) -> Option<PtrDesc>;
    fn resolve_arg(&mut self, func_ref: FuncRef, idx: usize) -> Option<PtrDesc>;
}

/// Resolves nothing, so only annotations and the fallback apply.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotationOnly;

impl SlotResolver for AnnotationOnly {
    fn resolve_ret(&mut self, _func_ref: FuncRef) -> Option<PtrDesc> {
        None
    }

    fn resolve_arg(&mut self, _func_ref: FuncRef, _idx: usize) -> Option<PtrDesc> {
        None
    }
}

/// Resolves slots from an already built map.
///
/// The return slot resolves only if every return site with a known
/// descriptor agrees.
pub struct MapResolver<'a> {
    module: &'a Module,
    map: &'a PointerTypeMap,
}

impl<'a> MapResolver<'a> {
    pub fn new(module: &'a Module, map: &'a PointerTypeMap) -> Self {
        Self { module, map }
    }
}

impl SlotResolver for MapResolver<'_> {
    fn resolve_ret(&mut self, func_ref: FuncRef) -> Option<PtrDesc> {
        let func = &self.module.funcs[func_ref];
        let mut resolved = None;
        for inst in func.layout.iter_all_inst() {
            let InstData::Return { args: Some(value) } = func.dfg.inst(inst) else {
                continue;
            };
            let Some(desc) = self.map.value_desc(func_ref, &func.dfg, *value) else {
                continue;
            };

            match resolved {
                None => resolved = Some(desc),
                Some(prev) if prev == desc => {}
                Some(_) => return None,
            }
        }

        resolved
    }

    fn resolve_arg(&mut self, func_ref: FuncRef, idx: usize) -> Option<PtrDesc> {
        let func = &self.module.funcs[func_ref];
        let arg = *func.arg_values.get(idx)?;
        self.map.get(PtrKey::Value(func_ref, arg))
    }
}

pub struct SignatureReclassifier<'a> {
    ctx: &'a ModuleCtx,
    fallback: Option<Type>,
}

impl<'a> SignatureReclassifier<'a> {
    pub fn new(ctx: &'a ModuleCtx) -> Self {
        Self {
            ctx,
            fallback: None,
        }
    }

    /// Makes every unresolved pointer slot fall back to `pointee`.
    pub fn with_fallback(mut self, pointee: Type) -> Self {
        self.fallback = Some(pointee);
        self
    }

    pub fn reclassify(
        &self,
        func_ref: FuncRef,
        resolver: &mut impl SlotResolver,
    ) -> Result<TypedSignature, RetypeError> {
        let sig = self.ctx.func_sig(func_ref, |sig| sig.clone());
        let annotation = sig.elem_types();
        if let Some(annotation) = annotation {
            validate_annotation(&sig, annotation)?;
        }

        let ret = match sig.ret_ty().addr_space() {
            Some(addr_space) => {
                let sample = annotation.and_then(|a| a.ret());
                self.resolve_slot(sample, addr_space, || resolver.resolve_ret(func_ref))
            }
            None => None,
        };

        let mut args = SmallVec::new();
        for (idx, ty) in sig.args().iter().enumerate() {
            let desc = match ty.addr_space() {
                Some(addr_space) => {
                    let sample = annotation.and_then(|a| a.arg(idx));
                    self.resolve_slot(sample, addr_space, || resolver.resolve_arg(func_ref, idx))
                }
                None => None,
            };
            args.push(desc);
        }

        Ok(TypedSignature { ret, args })
    }

    fn resolve_slot(
        &self,
        sample: Option<&Constant>,
        addr_space: AddrSpace,
        resolve: impl FnOnce() -> Option<PtrDesc>,
    ) -> Option<PtrDesc> {
        if let Some(sample) = sample {
            return Some(PtrDesc::new(sample.ty(self.ctx), addr_space));
        }

        resolve().or_else(|| self.fallback.map(|pointee| PtrDesc::new(pointee, addr_space)))
    }
}

/// Annotation-only signatures computed on first use of each callee.
#[derive(Debug, Default)]
pub struct AnnotatedSignatures {
    sigs: FxHashMap<FuncRef, TypedSignature>,
}

impl AnnotatedSignatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.sigs.clear();
    }

    pub fn get(
        &mut self,
        ctx: &ModuleCtx,
        callee: FuncRef,
    ) -> Result<&TypedSignature, RetypeError> {
        if !self.sigs.contains_key(&callee) {
            let typed = SignatureReclassifier::new(ctx).reclassify(callee, &mut AnnotationOnly)?;
            self.sigs.insert(callee, typed);
        }
        Ok(&self.sigs[&callee])
    }
}

fn validate_annotation(
    sig: &Signature,
    annotation: &ElemTypeAnnotation,
) -> Result<(), RetypeError> {
    if annotation.ret().is_some() && !sig.ret_ty().is_pointer() {
        return Err(RetypeError::AnnotationNotPointer {
            func: sig.name().to_string(),
            slot: AnnotatedSlot::Ret,
        });
    }

    let arity = sig.args().len();
    for (idx, _) in annotation.iter_args() {
        let Some(ty) = sig.args().get(idx) else {
            return Err(RetypeError::AnnotationOutOfRange {
                func: sig.name().to_string(),
                idx,
                arity,
            });
        };
        if !ty.is_pointer() {
            return Err(RetypeError::AnnotationNotPointer {
                func: sig.name().to_string(),
                slot: AnnotatedSlot::Arg(idx),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ptrlift_ir::{
        builder::test_util::test_ctx, ir_writer::WriteWithModule, Linkage, ModuleBuilder,
    };

    use super::*;

    #[test]
    fn declaration_falls_back_to_byte_pointee() {
        let mut mb = ModuleBuilder::new(test_ctx());
        let sig = Signature::new(
            "ext",
            Linkage::External,
            &[Type::I32, Type::Ptr(AddrSpace(1))],
            Type::Ptr(AddrSpace(3)),
        );
        let func_ref = mb.declare_function(sig);

        let reclassifier = SignatureReclassifier::new(&mb.ctx).with_fallback(Type::I8);
        let typed = reclassifier.reclassify(func_ref, &mut AnnotationOnly).unwrap();
        assert_eq!(typed.ret, Some(PtrDesc::new(Type::I8, AddrSpace(3))));
        assert_eq!(typed.arg(0), None);
        assert_eq!(typed.arg(1), Some(PtrDesc::new(Type::I8, AddrSpace(1))));

        let sig = mb.ctx.func_sig(func_ref, |sig| sig.clone());
        assert_eq!(
            typed.func_type(&sig, &mb.ctx).dump_string(&mb.ctx),
            "(i32, *(1)i8) -> *(3)i8"
        );
    }

    #[test]
    fn annotation_overrides_everything() {
        let mut mb = ModuleBuilder::new(test_ctx());
        let annotation = ElemTypeAnnotation::new()
            .with_ret(Constant::make_imm(0i64))
            .with_arg(1, Constant::make_imm(0i16));
        let sig = Signature::new("f", Linkage::External, &[Type::PTR, Type::PTR], Type::PTR)
            .with_elem_types(annotation);
        let func_ref = mb.declare_function(sig);

        let typed = SignatureReclassifier::new(&mb.ctx)
            .reclassify(func_ref, &mut AnnotationOnly)
            .unwrap();
        assert_eq!(typed.ret, Some(PtrDesc::new(Type::I64, AddrSpace::GENERIC)));
        assert_eq!(typed.arg(0), None);
        assert_eq!(typed.arg(1), Some(PtrDesc::new(Type::I16, AddrSpace::GENERIC)));
    }

    #[test]
    fn malformed_annotations() {
        let mut mb = ModuleBuilder::new(test_ctx());
        let out_of_range = mb.declare_function(
            Signature::new("oor", Linkage::External, &[Type::PTR], Type::Unit)
                .with_elem_types(ElemTypeAnnotation::new().with_arg(3, Constant::make_imm(0i8))),
        );
        let not_pointer = mb.declare_function(
            Signature::new("np", Linkage::External, &[Type::I32], Type::Unit)
                .with_elem_types(ElemTypeAnnotation::new().with_arg(0, Constant::make_imm(0i8))),
        );

        let reclassifier = SignatureReclassifier::new(&mb.ctx);
        assert_eq!(
            reclassifier.reclassify(out_of_range, &mut AnnotationOnly),
            Err(RetypeError::AnnotationOutOfRange {
                func: "oor".to_string(),
                idx: 3,
                arity: 1,
            })
        );
        let err = reclassifier.reclassify(not_pointer, &mut AnnotationOnly).unwrap_err();
        assert_eq!(
            err.to_string(),
            "element type annotation of `%np` targets the non-pointer argument 0"
        );
    }
}
