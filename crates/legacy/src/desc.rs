//! Typed pointer descriptors and the map the legacy encoder reads them from.
use std::io;

use ptrlift_ir::{
    ir_writer::WriteWithModule, AddrSpace, DataFlowGraph, FuncRef, GlobalVariableRef, ModuleCtx,
    Type, Value, ValueId,
};
use rustc_hash::FxHashMap;

use crate::signature::TypedSignature;

/// The pointee type and address space recovered for an opaque pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PtrDesc {
    pub pointee: Type,
    pub addr_space: AddrSpace,
}

impl PtrDesc {
    pub fn new(pointee: Type, addr_space: AddrSpace) -> Self {
        Self {
            pointee,
            addr_space,
        }
    }

    /// Returns the same pointee seen through another address space.
    pub fn in_addr_space(self, addr_space: AddrSpace) -> Self {
        Self::new(self.pointee, addr_space)
    }

    /// Materializes the descriptor as a typed pointer type.
    pub fn typed_ptr_type(self, ctx: &ModuleCtx) -> Type {
        ctx.with_ty_store_mut(|s| s.make_typed_ptr(self.pointee, self.addr_space))
    }
}

impl WriteWithModule for PtrDesc {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        if self.addr_space.is_generic() {
            write!(w, "*")?;
        } else {
            write!(w, "*({})", self.addr_space)?;
        }
        self.pointee.write(ctx, w)
    }
}

/// Identity of a pointer value across the whole module.
///
/// Symbol addresses are keyed by the symbol itself so that every use of a
/// global or function, in every function, shares one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PtrKey {
    Value(FuncRef, ValueId),
    Global(GlobalVariableRef),
    Func(FuncRef),
}

impl PtrKey {
    pub fn of_value(func_ref: FuncRef, dfg: &DataFlowGraph, value: ValueId) -> Self {
        match dfg.value(value) {
            Value::Global { gv, .. } => Self::Global(*gv),
            Value::Func { func, .. } => Self::Func(*func),
            _ => Self::Value(func_ref, value),
        }
    }
}

/// Value identity to descriptor.
///
/// A descriptor is never revised once recorded; later writes to the same
/// key are dropped.
#[derive(Debug, Clone, Default)]
pub struct PointerTypeMap {
    descs: FxHashMap<PtrKey, PtrDesc>,
    signatures: FxHashMap<FuncRef, TypedSignature>,
    retyped_globals: FxHashMap<GlobalVariableRef, Type>,
}

impl PointerTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `desc` for `key` unless the key is already mapped.
    /// Returns `true` if the descriptor was recorded.
    pub fn insert(&mut self, key: PtrKey, desc: PtrDesc) -> bool {
        if self.descs.contains_key(&key) {
            return false;
        }
        self.descs.insert(key, desc);
        true
    }

    pub fn get(&self, key: PtrKey) -> Option<PtrDesc> {
        self.descs.get(&key).copied()
    }

    pub fn contains(&self, key: PtrKey) -> bool {
        self.descs.contains_key(&key)
    }

    /// Looks `value` up, canonicalizing symbol addresses.
    pub fn value_desc(
        &self,
        func_ref: FuncRef,
        dfg: &DataFlowGraph,
        value: ValueId,
    ) -> Option<PtrDesc> {
        self.get(PtrKey::of_value(func_ref, dfg, value))
    }

    /// Returns the recorded descriptor, or a single byte pointee in
    /// `addr_space` as the encoder does for values absent from the map.
    pub fn desc_or_fallback(&self, key: PtrKey, addr_space: AddrSpace, fallback: Type) -> PtrDesc {
        self.get(key).unwrap_or_else(|| PtrDesc::new(fallback, addr_space))
    }

    pub fn signature(&self, func_ref: FuncRef) -> Option<&TypedSignature> {
        self.signatures.get(&func_ref)
    }

    pub fn set_signature(&mut self, func_ref: FuncRef, sig: TypedSignature) {
        self.signatures.insert(func_ref, sig);
    }

    /// Returns the typed initializer type of a global whose initializer
    /// holds pointers, e.g. the constructor table.
    pub fn retyped_global(&self, gv: GlobalVariableRef) -> Option<Type> {
        self.retyped_globals.get(&gv).copied()
    }

    pub fn set_retyped_global(&mut self, gv: GlobalVariableRef, ty: Type) {
        self.retyped_globals.insert(gv, ty);
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// Returns every entry ordered by key.
    pub fn entries(&self) -> Vec<(PtrKey, PtrDesc)> {
        let mut entries: Vec<_> = self.descs.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        entries
    }
}
