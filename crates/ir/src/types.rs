//! This module contains ptrlift IR types definitions.
use std::{fmt, io};

use cranelift_entity::PrimaryMap;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{ir_writer::WriteWithModule, module::ModuleCtx};

#[derive(Debug, Default)]
pub struct TypeStore {
    compounds: PrimaryMap<CompoundTypeRef, CompoundType>,
    rev_types: FxHashMap<CompoundType, CompoundTypeRef>,
    struct_types: IndexMap<String, CompoundTypeRef>,
}

impl TypeStore {
    pub fn make_array(&mut self, elem: Type, len: usize) -> Type {
        let ty = self.make_compound(CompoundType::Array { elem, len });
        Type::Compound(ty)
    }

    pub fn make_vector(&mut self, elem: Type, len: usize) -> Type {
        let ty = self.make_compound(CompoundType::Vector { elem, len });
        Type::Compound(ty)
    }

    /// Makes a named struct type. Named structs are unique by name.
    pub fn make_struct(&mut self, name: &str, fields: &[Type], packed: bool) -> Type {
        let compound_data = CompoundType::Struct(StructData {
            name: Some(name.to_string()),
            fields: fields.to_vec(),
            packed,
        });

        let cmpd_ref = self.make_compound(compound_data);
        Type::Compound(cmpd_ref)
    }

    /// Makes a literal struct type. Literal structs are unique by their
    /// fields.
    pub fn make_literal_struct(&mut self, fields: &[Type], packed: bool) -> Type {
        let compound_data = CompoundType::Struct(StructData {
            name: None,
            fields: fields.to_vec(),
            packed,
        });

        let cmpd_ref = self.make_compound(compound_data);
        Type::Compound(cmpd_ref)
    }

    pub fn make_func(&mut self, args: &[Type], ret_ty: Type) -> Type {
        let cmpd_ref = self.make_compound(CompoundType::Func {
            args: args.into(),
            ret_ty,
        });
        Type::Compound(cmpd_ref)
    }

    /// Makes a typed pointer type.
    ///
    /// Typed pointers never appear as the type of an IR value. They only
    /// live in side tables consumed by a legacy encoder.
    pub fn make_typed_ptr(&mut self, pointee: Type, addr_space: AddrSpace) -> Type {
        let cmpd_ref = self.make_compound(CompoundType::TypedPtr {
            pointee,
            addr_space,
        });
        Type::Compound(cmpd_ref)
    }

    /// Returns `[StructData]` if the given type is a struct type.
    pub fn struct_def(&self, ty: Type) -> Option<&StructData> {
        match ty {
            Type::Compound(cmpd_ref) => match self.compounds[cmpd_ref] {
                CompoundType::Struct(ref def) => Some(def),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn array_def(&self, ty: Type) -> Option<(Type, usize)> {
        match ty {
            Type::Compound(cmpd_ref) => match self.compounds[cmpd_ref] {
                CompoundType::Array { elem, len } => Some((elem, len)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn vector_def(&self, ty: Type) -> Option<(Type, usize)> {
        match ty {
            Type::Compound(cmpd_ref) => match self.compounds[cmpd_ref] {
                CompoundType::Vector { elem, len } => Some((elem, len)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn func_def(&self, ty: Type) -> Option<(&[Type], Type)> {
        match ty {
            Type::Compound(cmpd_ref) => match &self.compounds[cmpd_ref] {
                CompoundType::Func { args, ret_ty } => Some((args, *ret_ty)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn typed_ptr_def(&self, ty: Type) -> Option<(Type, AddrSpace)> {
        match ty {
            Type::Compound(cmpd_ref) => match self.compounds[cmpd_ref] {
                CompoundType::TypedPtr {
                    pointee,
                    addr_space,
                } => Some((pointee, addr_space)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Lookup the struct type by name.
    pub fn struct_type_by_name(&self, name: &str) -> Option<Type> {
        self.struct_types.get(name).copied().map(Type::Compound)
    }

    pub fn all_struct_data(&self) -> impl Iterator<Item = &StructData> {
        self.struct_types
            .values()
            .map(|compound_type| match self.compounds[*compound_type] {
                CompoundType::Struct(ref def) => def,
                _ => unreachable!(),
            })
    }

    /// Computes the element type an address computation lands on.
    ///
    /// The first index steps over the base pointer and keeps `src`; every
    /// following index steps into an aggregate. `None` stands for an index
    /// that is not a compile-time constant, which is only legal for arrays
    /// and vectors.
    ///
    /// # Panic
    /// Panics if an index steps into a non-aggregate type, or if a struct is
    /// indexed by a non-constant or out of range index.
    pub fn gep_result_ty(&self, src: Type, indices: &[Option<usize>]) -> Type {
        let mut current = src;
        for idx in indices.iter().skip(1) {
            current = match current {
                Type::Compound(cmpd_ref) => match &self.compounds[cmpd_ref] {
                    CompoundType::Array { elem, .. } | CompoundType::Vector { elem, .. } => *elem,
                    CompoundType::Struct(def) => {
                        let Some(idx) = idx else {
                            panic!("struct field must be indexed by a constant");
                        };
                        def.fields[*idx]
                    }
                    _ => panic!("address computation steps into a non-aggregate type"),
                },
                _ => panic!("address computation steps into a non-aggregate type"),
            };
        }

        current
    }

    pub fn is_array(&self, ty: Type) -> bool {
        match ty {
            Type::Compound(cmpd_ref) => self.compounds[cmpd_ref].is_array(),
            _ => false,
        }
    }

    pub fn is_struct(&self, ty: Type) -> bool {
        match ty {
            Type::Compound(cmpd_ref) => self.compounds[cmpd_ref].is_struct(),
            _ => false,
        }
    }

    pub fn is_func(&self, ty: Type) -> bool {
        match ty {
            Type::Compound(cmpd_ref) => self.compounds[cmpd_ref].is_func(),
            _ => false,
        }
    }

    pub fn make_compound(&mut self, data: CompoundType) -> CompoundTypeRef {
        match self.rev_types.get(&data) {
            Some(cmpd_ref) => *cmpd_ref,
            None => {
                let cmpd_ref = self.compounds.push(data.clone());
                if let CompoundType::Struct(StructData {
                    name: Some(name), ..
                }) = &data
                {
                    assert!(
                        !self.struct_types.contains_key(name),
                        "struct {name} is already defined"
                    );
                    self.struct_types.insert(name.to_string(), cmpd_ref);
                }

                self.rev_types.insert(data, cmpd_ref);
                cmpd_ref
            }
        }
    }

    pub fn resolve_compound(&self, cmpd_ref: CompoundTypeRef) -> &CompoundType {
        &self.compounds[cmpd_ref]
    }
}

/// An address space of a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AddrSpace(pub u32);

impl AddrSpace {
    pub const GENERIC: Self = Self(0);

    pub fn is_generic(self) -> bool {
        self == Self::GENERIC
    }
}

impl fmt::Display for AddrSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ptrlift IR types definition.
///
/// Pointers are opaque: `Ptr` only knows its address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Type {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    Ptr(AddrSpace),
    Compound(CompoundTypeRef),
    #[default]
    Unit,
}

impl Type {
    pub const PTR: Self = Self::Ptr(AddrSpace::GENERIC);

    pub fn ptr_in(addr_space: AddrSpace) -> Self {
        Self::Ptr(addr_space)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::I128
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Returns `true` if the type is an opaque pointer.
    pub fn is_pointer(self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    /// Returns the address space of an opaque pointer type.
    pub fn addr_space(self) -> Option<AddrSpace> {
        match self {
            Self::Ptr(addr_space) => Some(addr_space),
            _ => None,
        }
    }

    pub fn is_compound(self) -> bool {
        matches!(self, Type::Compound(_))
    }

    pub fn is_unit(self) -> bool {
        matches!(self, Self::Unit)
    }

    pub fn resolve_compound(self, ctx: &ModuleCtx) -> Option<CompoundType> {
        let Self::Compound(cmpd) = self else {
            return None;
        };

        Some(ctx.with_ty_store(|s| s.resolve_compound(cmpd).clone()))
    }
}

impl WriteWithModule for Type {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        match self {
            Type::I1 => write!(w, "i1"),
            Type::I8 => write!(w, "i8"),
            Type::I16 => write!(w, "i16"),
            Type::I32 => write!(w, "i32"),
            Type::I64 => write!(w, "i64"),
            Type::I128 => write!(w, "i128"),
            Type::F32 => write!(w, "f32"),
            Type::F64 => write!(w, "f64"),
            Type::Ptr(addr_space) => {
                if addr_space.is_generic() {
                    write!(w, "ptr")
                } else {
                    write!(w, "ptr({addr_space})")
                }
            }
            Type::Compound(cmpd_ty) => cmpd_ty.write(ctx, w),
            Type::Unit => write!(w, "unit"),
        }
    }
}

/// An opaque reference to [`CompoundType`].
#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct CompoundTypeRef(u32);
cranelift_entity::entity_impl!(CompoundTypeRef);

impl WriteWithModule for CompoundTypeRef {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        // Resolve first so that nested types don't re-enter the store.
        let cmpd = ctx.with_ty_store(|s| s.resolve_compound(*self).clone());
        match cmpd {
            CompoundType::Array { elem, len } => {
                write!(w, "[")?;
                elem.write(ctx, w)?;
                write!(w, "; {len}]")
            }
            CompoundType::Vector { elem, len } => {
                write!(w, "<")?;
                elem.write(ctx, w)?;
                write!(w, "; {len}>")
            }
            CompoundType::Struct(StructData {
                name: Some(name),
                packed,
                ..
            }) => {
                if packed {
                    write!(w, "@<{name}>")
                } else {
                    write!(w, "@{name}")
                }
            }
            CompoundType::Struct(StructData {
                name: None,
                fields,
                packed,
            }) => {
                write!(w, "{}", if packed { "<{" } else { "{" })?;
                write_types_with_delim(ctx, w, &fields, ", ")?;
                write!(w, "{}", if packed { "}>" } else { "}" })
            }
            CompoundType::Func { args, ret_ty } => {
                write!(w, "(")?;
                write_types_with_delim(ctx, w, &args, ", ")?;
                write!(w, ") -> ")?;
                ret_ty.write(ctx, w)
            }
            CompoundType::TypedPtr {
                pointee,
                addr_space,
            } => {
                if addr_space.is_generic() {
                    write!(w, "*")?;
                } else {
                    write!(w, "*({addr_space})")?;
                }
                pointee.write(ctx, w)
            }
        }
    }
}

pub(crate) fn write_types_with_delim(
    ctx: &ModuleCtx,
    w: &mut impl io::Write,
    tys: &[Type],
    delim: &str,
) -> io::Result<()> {
    let mut iter = tys.iter().peekable();
    while let Some(ty) = iter.next() {
        ty.write(ctx, w)?;
        if iter.peek().is_some() {
            w.write_all(delim.as_bytes())?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompoundType {
    Array {
        elem: Type,
        len: usize,
    },
    Vector {
        elem: Type,
        len: usize,
    },
    Struct(StructData),
    Func {
        args: SmallVec<[Type; 8]>,
        ret_ty: Type,
    },
    TypedPtr {
        pointee: Type,
        addr_space: AddrSpace,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructData {
    /// `None` for literal structs.
    pub name: Option<String>,
    pub fields: Vec<Type>,
    pub packed: bool,
}

impl CompoundType {
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Self::Struct(..))
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Self::Func { .. })
    }

    pub fn is_typed_ptr(&self) -> bool {
        matches!(self, Self::TypedPtr { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_util::test_ctx;

    #[test]
    fn compound_types_are_interned() {
        let ctx = test_ctx();
        let (a, b, c) = ctx.with_ty_store_mut(|s| {
            let a = s.make_array(Type::I32, 4);
            let b = s.make_array(Type::I32, 4);
            let c = s.make_array(Type::I32, 5);
            (a, b, c)
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn gep_result_ty_walks_aggregates() {
        let ctx = test_ctx();
        ctx.with_ty_store_mut(|s| {
            let arr = s.make_array(Type::F32, 8);
            let st = s.make_struct("pair", &[Type::I64, arr], false);

            assert_eq!(s.gep_result_ty(st, &[Some(0)]), st);
            assert_eq!(s.gep_result_ty(st, &[Some(0), Some(1)]), arr);
            assert_eq!(s.gep_result_ty(st, &[None, Some(1), None]), Type::F32);
        });
    }

    #[test]
    fn display_types() {
        let ctx = test_ctx();
        let (typed, func, lit, vec) = ctx.with_ty_store_mut(|s| {
            let arr = s.make_array(Type::I8, 3);
            let typed = s.make_typed_ptr(arr, AddrSpace(2));
            let func = s.make_func(&[typed, Type::PTR], Type::Unit);
            let lit = s.make_literal_struct(&[Type::I32, Type::Ptr(AddrSpace(1))], false);
            let vec = s.make_vector(Type::F32, 4);
            (typed, func, lit, vec)
        });

        assert_eq!(typed.dump_string(&ctx), "*(2)[i8; 3]");
        assert_eq!(
            func.dump_string(&ctx),
            "(*(2)[i8; 3], ptr) -> unit"
        );
        assert_eq!(lit.dump_string(&ctx), "{i32, ptr(1)}");
        assert_eq!(vec.dump_string(&ctx), "<f32; 4>");
    }
}
