//! In-place patching of sites whose inferred pointer type disagrees with
//! the element type they access.
use ptrlift_ir::{
    inst::CastOp, FuncCursor, FuncRef, Function, InstData, InstId, InstInserter, Module,
};
use tracing::{debug, trace};

use crate::{site::PtrSite, PointerTypeMap, PtrKey, RetypeConfig};

/// For every binding site whose pointer operand is not known to point to
/// the accessed element type, casts the operand right before the site and
/// replaces the site so that it reads through the cast.
///
/// The cast is recorded with the fallback pointee; the encoder then emits a
/// cast from the inferred type to a byte pointer and the site's own typed
/// pointer from there.
pub struct MismatchPatcher<'a> {
    config: &'a RetypeConfig,
    patched: usize,
}

impl<'a> MismatchPatcher<'a> {
    pub fn new(config: &'a RetypeConfig) -> Self {
        Self { config, patched: 0 }
    }

    /// Returns `true` if any site was patched.
    pub fn run(&mut self, module: &mut Module, map: &mut PointerTypeMap) -> bool {
        self.patched = 0;
        let func_refs: Vec<FuncRef> = module.iter_functions().collect();
        for func_ref in func_refs {
            self.run_on_func(func_ref, &mut module.funcs[func_ref], map);
        }

        debug!(patched = self.patched, "mismatching sites patched");
        self.patched > 0
    }

    fn run_on_func(&mut self, func_ref: FuncRef, func: &mut Function, map: &mut PointerTypeMap) {
        let insts: Vec<InstId> = func.layout.iter_all_inst().collect();
        for inst in insts {
            let Some(idx) = func.dfg.inst(inst).pointer_operand_index() else {
                continue;
            };
            let Some((ptr, elem)) = PtrSite::classify(func.dfg.inst(inst)).binding(&func.dfg)
            else {
                continue;
            };
            let Some(addr_space) = func.dfg.value_ty(ptr).addr_space() else {
                continue;
            };
            if map.value_desc(func_ref, &func.dfg, ptr).map(|desc| desc.pointee) == Some(elem) {
                continue;
            }

            let ty = func.dfg.value_ty(ptr);
            let mut inserter = InstInserter::before(func, inst);
            let (_, cast) =
                inserter.insert_inst_data_with_result(func, InstData::cast(CastOp::Bitcast, ptr, ty));
            let Some(cast) = cast else {
                continue;
            };
            map.insert(
                PtrKey::Value(func_ref, cast),
                self.config.fallback_desc(addr_space),
            );

            let mut data = func.dfg.inst(inst).clone();
            data.replace_arg(cast, idx);
            func.dfg.replace_inst(inst, data);

            trace!(?inst, ?ptr, ?cast, "site patched");
            self.patched += 1;
        }
    }
}
