//! Marker insertion used by the newer writer.
//!
//! A marker is a `bitcast` of a pointer to its own type. It changes nothing
//! about the program but gives the encoder a dedicated instruction to hang
//! a typed pointer on.
use ptrlift_ir::{
    ir_writer::FuncWriter, FuncCursor, FuncRef, Function, InstData, InstId, InstInserter, Module,
    ModuleCtx, ValueId,
};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    site::{is_marker, marked_operand, operand_inserter, PtrSite},
    AnnotatedSignatures, RetypeError,
};

/// Wraps every typed pointer definition and use with a marker.
///
/// Running it twice wraps the markers themselves, so it must run exactly
/// once per module.
#[derive(Debug, Default)]
pub struct MarkerInserter {
    callee_sigs: AnnotatedSignatures,
    inserted: usize,
}

impl MarkerInserter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if any marker was inserted.
    pub fn run(&mut self, module: &mut Module) -> Result<bool, RetypeError> {
        self.callee_sigs.clear();
        self.inserted = 0;

        let ctx = module.ctx.clone();
        for func in module.funcs.values_mut() {
            self.run_on_func(&ctx, func)?;
        }

        debug!(markers = self.inserted, "markers inserted");
        Ok(self.inserted > 0)
    }

    fn run_on_func(&mut self, ctx: &ModuleCtx, func: &mut Function) -> Result<(), RetypeError> {
        let insts: Vec<InstId> = func.layout.iter_all_inst().collect();
        for inst in insts {
            let mut wrapped: SmallVec<[usize; 4]> = SmallVec::new();

            for idx in 0..func.dfg.inst(inst).args().len() {
                let arg = func.dfg.inst(inst).args()[idx];
                if func.dfg.value_gv(arg).is_some() {
                    self.wrap_operand(func, inst, idx);
                    wrapped.push(idx);
                }
            }

            if let Some(idx) = func.dfg.inst(inst).pointer_operand_index() {
                if !wrapped.contains(&idx) {
                    self.wrap_operand(func, inst, idx);
                    wrapped.push(idx);
                }
            }

            if let PtrSite::Call { func: callee, args } = PtrSite::classify(func.dfg.inst(inst)) {
                let arity = args.len();
                let typed = self.callee_sigs.get(ctx, callee)?;
                let retyped: SmallVec<[usize; 4]> = (0..arity)
                    .filter(|idx| typed.arg(*idx).is_some() && !wrapped.contains(idx))
                    .collect();
                for idx in retyped {
                    self.wrap_operand(func, inst, idx);
                }
            }

            if matches!(
                func.dfg.inst(inst),
                InstData::Gep { .. } | InstData::Alloca { .. }
            ) {
                self.wrap_result(func, inst);
            }
        }

        Ok(())
    }

    /// Inserts a marker of operand `idx` where the operand is computed and
    /// makes `user` consume the marker instead.
    fn wrap_operand(&mut self, func: &mut Function, user: InstId, idx: usize) {
        let arg = func.dfg.inst(user).args()[idx];
        let ty = func.dfg.value_ty(arg);

        let mut inserter = operand_inserter(func, user, idx);
        let (marker, result) =
            inserter.insert_inst_data_with_result(func, InstData::marker(arg, ty));
        if let Some(result) = result {
            func.dfg.set_inst_arg(user, idx, result);
        }

        trace!(?user, ?marker, idx, "operand marked");
        self.inserted += 1;
    }

    /// Inserts a marker of the result of `inst` right after it and makes
    /// every other user consume the marker.
    fn wrap_result(&mut self, func: &mut Function, inst: InstId) {
        let Some(value) = func.dfg.inst_result(inst) else {
            return;
        };
        let ty = func.dfg.value_ty(value);

        let mut inserter = InstInserter::after(inst);
        let (marker, result) =
            inserter.insert_inst_data_with_result(func, InstData::marker(value, ty));
        let Some(result) = result else {
            return;
        };

        let users: Vec<InstId> = func
            .dfg
            .users(value)
            .copied()
            .filter(|user| *user != marker)
            .collect();
        for user in users {
            for idx in 0..func.dfg.inst(user).args().len() {
                if func.dfg.inst(user).args()[idx] == value {
                    func.dfg.set_inst_arg(user, idx, result);
                }
            }
        }

        trace!(?inst, ?marker, "result marked");
        self.inserted += 1;
    }
}

/// Checks that every site the inserter is responsible for is wrapped.
///
/// A violation means the inserter did not run, or the module was changed
/// after it ran.
pub fn verify_coverage(module: &Module) -> Result<(), RetypeError> {
    let mut callee_sigs = AnnotatedSignatures::new();
    for func_ref in module.iter_functions() {
        let func = &module.funcs[func_ref];
        let dfg = &func.dfg;

        for inst in func.layout.iter_all_inst() {
            if is_marker(dfg, inst) {
                continue;
            }

            let unmarked = || RetypeError::UnmarkedOperand {
                func: func_name(module, func_ref),
                inst: FuncWriter::new(func_ref, func).dump_inst(inst),
            };
            if dfg.inst(inst).args().iter().any(|arg| dfg.value_gv(*arg).is_some()) {
                return Err(unmarked());
            }
            if let Some(idx) = dfg.inst(inst).pointer_operand_index() {
                if marked_operand(dfg, dfg.inst(inst).args()[idx]).is_none() {
                    return Err(unmarked());
                }
            }
            if let PtrSite::Call { func: callee, args } = PtrSite::classify(dfg.inst(inst)) {
                let typed = callee_sigs.get(&module.ctx, callee)?;
                let uncovered = args.iter().enumerate().any(|(idx, arg)| {
                    typed.arg(idx).is_some() && marked_operand(dfg, *arg).is_none()
                });
                if uncovered {
                    return Err(unmarked());
                }
            }

            if matches!(
                dfg.inst(inst),
                InstData::Gep { .. } | InstData::Alloca { .. }
            ) && !has_sole_marker_user(func, inst)
            {
                return Err(RetypeError::UnmarkedResult {
                    func: func_name(module, func_ref),
                    inst: FuncWriter::new(func_ref, func).dump_inst(inst),
                });
            }
        }
    }

    Ok(())
}

/// Returns the marker wrapping the result of `inst`, if it is the only
/// user of the result.
pub(crate) fn sole_marker_user(func: &Function, inst: InstId) -> Option<ValueId> {
    let dfg = &func.dfg;
    let value = dfg.inst_result(inst)?;
    if dfg.users_num(value) != 1 {
        return None;
    }

    let user = *dfg.users(value).next()?;
    if is_marker(dfg, user) {
        dfg.inst_result(user)
    } else {
        None
    }
}

fn has_sole_marker_user(func: &Function, inst: InstId) -> bool {
    sole_marker_user(func, inst).is_some()
}

pub(crate) fn func_name(module: &Module, func_ref: FuncRef) -> String {
    module.ctx.func_sig(func_ref, |sig| sig.name().to_string())
}
