use std::io;

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::{ir_writer::WriteWithModule, module::ModuleCtx, AddrSpace, Constant, Linkage, Type};

#[derive(Debug, Default)]
pub struct GlobalVariableStore {
    gv_data: PrimaryMap<GlobalVariableRef, GlobalVariableData>,
    symbols: FxHashMap<String, GlobalVariableRef>,
}

impl GlobalVariableStore {
    /// # Panic
    /// Panics if a global with the same symbol already exists.
    pub fn make_gv(&mut self, gv_data: GlobalVariableData) -> GlobalVariableRef {
        match self.symbols.entry(gv_data.symbol.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                panic!("duplicate global symbol `{}`", gv_data.symbol);
            }
            std::collections::hash_map::Entry::Vacant(v) => {
                let gv = self.gv_data.push(gv_data);
                v.insert(gv);
                gv
            }
        }
    }

    pub fn gv_data(&self, gv: GlobalVariableRef) -> &GlobalVariableData {
        &self.gv_data[gv]
    }

    pub fn gv_by_symbol(&self, symbol: &str) -> Option<GlobalVariableRef> {
        self.symbols.get(symbol).copied()
    }

    pub fn init_data(&self, gv: GlobalVariableRef) -> Option<&Constant> {
        self.gv_data[gv].init.as_ref()
    }

    pub fn is_const(&self, gv: GlobalVariableRef) -> bool {
        self.gv_data[gv].is_const
    }

    /// Returns the value type of the global, not the type of its address.
    pub fn ty(&self, gv: GlobalVariableRef) -> Type {
        self.gv_data[gv].ty
    }

    pub fn addr_space(&self, gv: GlobalVariableRef) -> AddrSpace {
        self.gv_data[gv].addr_space
    }

    /// Iterates globals in declaration order.
    pub fn all_gvs(&self) -> impl Iterator<Item = (GlobalVariableRef, &GlobalVariableData)> {
        self.gv_data.iter()
    }

    pub fn len(&self) -> usize {
        self.gv_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gv_data.is_empty()
    }
}

/// An opaque reference to [`GlobalVariableData`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct GlobalVariableRef(pub u32);
cranelift_entity::entity_impl!(GlobalVariableRef);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalVariableData {
    pub symbol: String,
    pub ty: Type,
    pub addr_space: AddrSpace,
    pub linkage: Linkage,
    pub is_const: bool,
    pub init: Option<Constant>,
}

impl GlobalVariableData {
    pub fn new(
        symbol: String,
        ty: Type,
        addr_space: AddrSpace,
        linkage: Linkage,
        is_const: bool,
        init: Option<Constant>,
    ) -> Self {
        Self {
            symbol,
            ty,
            addr_space,
            linkage,
            is_const,
            init,
        }
    }

    pub fn constant(symbol: String, ty: Type, linkage: Linkage, init: Constant) -> Self {
        Self {
            symbol,
            ty,
            addr_space: AddrSpace::GENERIC,
            linkage,
            is_const: true,
            init: Some(init),
        }
    }
}

impl WriteWithModule for GlobalVariableData {
    fn write(&self, ctx: &ModuleCtx, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "global {} ", self.linkage)?;
        if self.is_const {
            write!(w, "const ")?;
        }
        if !self.addr_space.is_generic() {
            write!(w, "addrspace({}) ", self.addr_space)?;
        }
        self.ty.write(ctx, w)?;

        write!(w, " %{}", self.symbol)?;
        if let Some(init) = &self.init {
            write!(w, " = ")?;
            init.write(ctx, w)?;
        }
        write!(w, ";")
    }
}
