use thiserror::Error;

/// Internal consistency violations detected while retyping a module.
///
/// Unresolvable pointee types are never reported here; they end up absent
/// from the map or mapped to the fallback descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetypeError {
    #[error("pointer operand of `{inst}` in `%{func}` is not defined by a marker")]
    UnmarkedOperand { func: String, inst: String },

    #[error("result of `{inst}` in `%{func}` is not consumed by exactly one marker")]
    UnmarkedResult { func: String, inst: String },

    #[error("element {index} of `%{symbol}` retypes to `{found}`, but `{expected}` was expected")]
    InconsistentAggregate {
        symbol: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("pointer operand of `{inst}` in `%{func}` has non-pointer type `{ty}`")]
    NotPointer {
        func: String,
        inst: String,
        ty: String,
    },

    #[error("element type annotation of `%{func}` names argument {idx}, but it takes {arity}")]
    AnnotationOutOfRange {
        func: String,
        idx: usize,
        arity: usize,
    },

    #[error("element type annotation of `%{func}` targets the non-pointer {slot}")]
    AnnotationNotPointer { func: String, slot: AnnotatedSlot },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatedSlot {
    Ret,
    Arg(usize),
}

impl std::fmt::Display for AnnotatedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ret => write!(f, "return value"),
            Self::Arg(idx) => write!(f, "argument {idx}"),
        }
    }
}
