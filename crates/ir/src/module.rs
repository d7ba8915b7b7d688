use std::sync::{Arc, PoisonError, RwLock};

use cranelift_entity::{entity_impl, PrimaryMap};
use dashmap::DashMap;
use ptrlift_triple::TargetTriple;

use crate::{
    global_variable::GlobalVariableStore, types::TypeStore, Function, Linkage, Signature,
};

#[derive(Debug)]
pub struct Module {
    /// Holds all function declared in the module.
    pub funcs: PrimaryMap<FuncRef, Function>,

    pub ctx: ModuleCtx,
}

impl Module {
    #[doc(hidden)]
    pub fn new(ctx: &ModuleCtx) -> Self {
        Self {
            funcs: PrimaryMap::default(),
            ctx: ctx.clone(),
        }
    }

    /// Returns `func_ref` in the module in declaration order.
    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    /// Returns `true` if the function has external linkage.
    pub fn is_external(&self, func_ref: FuncRef) -> bool {
        self.ctx.func_sig(func_ref, |sig| sig.linkage()) == Linkage::External
    }
}

/// State shared by every function of a module.
#[derive(Debug, Clone)]
pub struct ModuleCtx {
    pub triple: TargetTriple,
    type_store: Arc<RwLock<TypeStore>>,
    gv_store: Arc<RwLock<GlobalVariableStore>>,
    pub declared_funcs: Arc<DashMap<FuncRef, Signature>>,
}

impl ModuleCtx {
    pub fn new(triple: TargetTriple) -> Self {
        Self {
            triple,
            type_store: Arc::new(RwLock::new(TypeStore::default())),
            gv_store: Arc::new(RwLock::new(GlobalVariableStore::default())),
            declared_funcs: Arc::new(DashMap::new()),
        }
    }

    pub fn with_ty_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TypeStore) -> R,
    {
        f(&self.type_store.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn with_ty_store_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TypeStore) -> R,
    {
        f(&mut self.type_store.write().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn with_gv_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&GlobalVariableStore) -> R,
    {
        f(&self.gv_store.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn with_gv_store_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut GlobalVariableStore) -> R,
    {
        f(&mut self.gv_store.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// # Panic
    /// Panics if `func_ref` is not declared in the module.
    pub fn func_sig<F, R>(&self, func_ref: FuncRef, f: F) -> R
    where
        F: FnOnce(&Signature) -> R,
    {
        match self.declared_funcs.get(&func_ref) {
            Some(sig) => f(&sig),
            None => panic!("{func_ref:?} is not declared"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef);
