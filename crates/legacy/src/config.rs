use ptrlift_ir::{AddrSpace, Type};
use ptrlift_triple::{BitcodeVersion, TargetTriple};

use crate::PtrDesc;

/// How pointer types are recovered for a legacy writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Wrap every typed pointer definition and use with a marker, then read
    /// the descriptors off the marked sites.
    Eager,
    /// Infer descriptors without touching the module, then patch only the
    /// sites that disagree with the inference.
    Analytical,
}

#[derive(Debug, Clone)]
pub struct RetypeConfig {
    pub strategy: StrategyKind,
    /// Symbol of the constructor registration table.
    pub ctor_table_symbol: String,
    /// Pointee used whenever nothing better is known.
    pub fallback_pointee: Type,
    /// Check marker coverage before the final extraction.
    pub check_markers: bool,
}

impl RetypeConfig {
    pub fn for_target(triple: &TargetTriple) -> Self {
        match triple.version.bitcode() {
            BitcodeVersion::V5_0 => Self::for_strategy(StrategyKind::Analytical),
            BitcodeVersion::V7_0 => Self::for_strategy(StrategyKind::Eager),
        }
    }

    pub fn for_strategy(strategy: StrategyKind) -> Self {
        match strategy {
            StrategyKind::Eager => Self {
                strategy,
                ctor_table_symbol: "llvm.global_ctors".to_string(),
                fallback_pointee: Type::I8,
                check_markers: true,
            },
            StrategyKind::Analytical => Self {
                strategy,
                ctor_table_symbol: "llvm.global_ctors".to_string(),
                fallback_pointee: Type::I8,
                check_markers: false,
            },
        }
    }

    pub fn fallback_desc(&self, addr_space: AddrSpace) -> PtrDesc {
        PtrDesc::new(self.fallback_pointee, addr_space)
    }

    /// Markers only exist under the eager strategy.
    pub fn should_check_markers(&self) -> bool {
        self.check_markers && matches!(self.strategy, StrategyKind::Eager)
    }
}

impl Default for RetypeConfig {
    fn default() -> Self {
        Self::for_strategy(StrategyKind::Eager)
    }
}
