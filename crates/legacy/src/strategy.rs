//! The two ways of recovering pointer types for a legacy writer.
//!
//! Both strategies start by demoting constant expressions so that every
//! pointer computation is an instruction with its own value, and both end
//! with a [`PointerTypeMap`] in which every pointer the encoder will see has
//! a descriptor:
//!
//! - [`EagerStrategy`] wraps every typed pointer definition and use with a
//!   marker and reads the descriptors directly off the marked sites.
//! - [`AnalyticalStrategy`] infers descriptors without touching the module
//!   and patches only the sites that disagree with the inference.
use tracing::debug;

use crate::{
    extract::MarkerExtraction, marker::verify_coverage, ConstExprDemoter, MarkerInserter,
    MismatchPatcher, PointerTypeAnalysis, PointerTypeMap, RetypeConfig, RetypeError,
};

/// Result of running a strategy on a module.
#[derive(Debug, Default)]
pub struct Retyped {
    pub map: PointerTypeMap,
    /// `true` if the module itself was rewritten.
    pub changed: bool,
}

pub trait PointerStrategy {
    fn run(&mut self, module: &mut ptrlift_ir::Module) -> Result<Retyped, RetypeError>;
}

pub struct EagerStrategy<'a> {
    config: &'a RetypeConfig,
    demoter: ConstExprDemoter,
    inserter: MarkerInserter,
}

impl<'a> EagerStrategy<'a> {
    pub fn new(config: &'a RetypeConfig) -> Self {
        Self {
            config,
            demoter: ConstExprDemoter::new(),
            inserter: MarkerInserter::new(),
        }
    }
}

impl PointerStrategy for EagerStrategy<'_> {
    fn run(&mut self, module: &mut ptrlift_ir::Module) -> Result<Retyped, RetypeError> {
        let demoted = self.demoter.run(module);
        let marked = self.inserter.run(module)?;
        if self.config.should_check_markers() {
            verify_coverage(module)?;
        }

        let map = MarkerExtraction::new(module, self.config).run()?;
        debug!(demoted, marked, entries = map.len(), "eager retyping done");
        Ok(Retyped {
            map,
            changed: demoted || marked,
        })
    }
}

pub struct AnalyticalStrategy<'a> {
    config: &'a RetypeConfig,
    demoter: ConstExprDemoter,
}

impl<'a> AnalyticalStrategy<'a> {
    pub fn new(config: &'a RetypeConfig) -> Self {
        Self {
            config,
            demoter: ConstExprDemoter::new(),
        }
    }
}

impl PointerStrategy for AnalyticalStrategy<'_> {
    fn run(&mut self, module: &mut ptrlift_ir::Module) -> Result<Retyped, RetypeError> {
        let demoted = self.demoter.run(module);

        let mut map = PointerTypeAnalysis::new(module, self.config).run()?;
        let patched = MismatchPatcher::new(self.config).run(module, &mut map);
        debug!(demoted, patched, entries = map.len(), "analytical retyping done");
        Ok(Retyped {
            map,
            changed: demoted || patched,
        })
    }
}
