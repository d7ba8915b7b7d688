//! Classification of instructions by what they tell about pointer types.
use ptrlift_ir::{
    inst::CastOp, CursorLocation, DataFlowGraph, FuncCursor, FuncRef, Function, InstData, InstId,
    InstInserter, Type, ValueId,
};

/// The pointer related role of an instruction.
#[derive(Debug, Clone, Copy)]
pub enum PtrSite<'a> {
    /// Reads `ty` through `ptr`.
    Read { ptr: ValueId, ty: Type },
    /// Writes `value` through `ptr`.
    Write { ptr: ValueId, value: ValueId },
    AtomicRmw { ptr: ValueId, value: ValueId },
    CmpXchg { ptr: ValueId, new: ValueId },
    /// Address computation over `ptr`.
    Address {
        ptr: ValueId,
        src_ty: Type,
        res_ty: Type,
    },
    Alloc { ty: Type },
    /// Control flow merge of values.
    Merge { incoming: &'a [ValueId] },
    /// Conditional select; the condition is not a pass-through operand.
    Select { then: ValueId, else_: ValueId },
    AddrSpaceCast { arg: ValueId },
    Call { func: FuncRef, args: &'a [ValueId] },
    Other,
}

impl<'a> PtrSite<'a> {
    pub fn classify(data: &'a InstData) -> Self {
        match data {
            InstData::Load { args, ty } => Self::Read {
                ptr: args[0],
                ty: *ty,
            },
            InstData::Store { args } => Self::Write {
                ptr: args[1],
                value: args[0],
            },
            InstData::AtomicRmw { args, .. } => Self::AtomicRmw {
                ptr: args[0],
                value: args[1],
            },
            InstData::CmpXchg { args } => Self::CmpXchg {
                ptr: args[0],
                new: args[2],
            },
            InstData::Gep {
                src_ty,
                res_ty,
                args,
            } => Self::Address {
                ptr: args[0],
                src_ty: *src_ty,
                res_ty: *res_ty,
            },
            InstData::Alloca { ty, .. } => Self::Alloc { ty: *ty },
            InstData::Phi { values, .. } => Self::Merge { incoming: values },
            InstData::Select { args } => Self::Select {
                then: args[1],
                else_: args[2],
            },
            InstData::Cast {
                code: CastOp::AddrSpaceCast,
                args,
                ..
            } => Self::AddrSpaceCast { arg: args[0] },
            InstData::Call { func, args, .. } => Self::Call { func: *func, args },

            InstData::Unary { .. }
            | InstData::Binary { .. }
            | InstData::Cast { .. }
            | InstData::Jump { .. }
            | InstData::Branch { .. }
            | InstData::Return { .. } => Self::Other,
        }
    }

    /// Returns the dereferenced or offset pointer operand and the element
    /// type the instruction accesses through it.
    pub fn binding(&self, dfg: &DataFlowGraph) -> Option<(ValueId, Type)> {
        match *self {
            Self::Read { ptr, ty } => Some((ptr, ty)),
            Self::Write { ptr, value } | Self::AtomicRmw { ptr, value } => {
                Some((ptr, dfg.value_ty(value)))
            }
            Self::CmpXchg { ptr, new } => Some((ptr, dfg.value_ty(new))),
            Self::Address { ptr, src_ty, .. } => Some((ptr, src_ty)),
            _ => None,
        }
    }
}

/// Operands of `data` whose value flows into its result unchanged.
pub fn pass_through_operands(data: &InstData) -> smallvec::SmallVec<[ValueId; 4]> {
    match PtrSite::classify(data) {
        PtrSite::Merge { incoming } => incoming.iter().copied().collect(),
        PtrSite::Select { then, else_ } => [then, else_].into_iter().collect(),
        PtrSite::AddrSpaceCast { arg } => [arg].into_iter().collect(),
        _ => smallvec::SmallVec::new(),
    }
}

/// Returns `true` if `inst` is a no-op cast whose operand and result types
/// are the same.
pub fn is_marker(dfg: &DataFlowGraph, inst: InstId) -> bool {
    match dfg.inst(inst) {
        InstData::Cast {
            code: CastOp::Bitcast,
            args,
            ty,
        } => dfg.value_ty(args[0]) == *ty,
        _ => false,
    }
}

/// Returns the operand of the marker defining `value`, if any.
pub fn marked_operand(dfg: &DataFlowGraph, value: ValueId) -> Option<ValueId> {
    let inst = dfg.value_inst(value)?;
    is_marker(dfg, inst).then(|| dfg.inst(inst).args()[0])
}

/// Returns an inserter placing new instructions where operand `idx` of
/// `user` must be computed.
///
/// Phi operands are computed at the exit of the incoming block, right
/// before its terminator.
pub fn operand_inserter(func: &Function, user: InstId, idx: usize) -> InstInserter {
    let data = func.dfg.inst(user);
    if !data.is_phi() {
        return InstInserter::before(func, user);
    }

    let pred = data.phi_blocks()[idx];
    match func.layout.last_inst_of(pred) {
        Some(last) if func.dfg.is_terminator(last) => InstInserter::before(func, last),
        _ => InstInserter::at_location(CursorLocation::BlockBottom(pred)),
    }
}
