use ptrlift_ir::Module;
use ptrlift_triple::TargetTriple;
use tracing::debug;

use crate::{
    strategy::{AnalyticalStrategy, EagerStrategy, PointerStrategy, Retyped},
    RetypeConfig, RetypeError, StrategyKind,
};

/// Entry point run on a module right before it is handed to a legacy
/// writer.
///
/// Targets whose format can represent opaque pointers are left untouched
/// and get an empty map.
#[derive(Debug, Clone, Default)]
pub struct LegacyRewriter {
    config: RetypeConfig,
}

impl LegacyRewriter {
    pub fn new(config: RetypeConfig) -> Self {
        Self { config }
    }

    pub fn for_target(triple: &TargetTriple) -> Self {
        Self::new(RetypeConfig::for_target(triple))
    }

    pub fn config(&self) -> &RetypeConfig {
        &self.config
    }

    pub fn run(&self, module: &mut Module) -> Result<Retyped, RetypeError> {
        if !module.ctx.triple.requires_typed_pointers() {
            debug!(triple = %module.ctx.triple, "typed pointers not required");
            return Ok(Retyped::default());
        }

        debug!(
            triple = %module.ctx.triple,
            strategy = ?self.config.strategy,
            "retyping pointers"
        );
        let mut strategy: Box<dyn PointerStrategy + '_> = match self.config.strategy {
            StrategyKind::Eager => Box::new(EagerStrategy::new(&self.config)),
            StrategyKind::Analytical => Box::new(AnalyticalStrategy::new(&self.config)),
        };
        strategy.run(module)
    }
}
