pub mod constructive;
pub mod placement;
pub mod post;
pub mod strip;

pub use constructive::{constructive_configs, Constructive, ConstructiveConfig, Sizing};
pub use strip::StripStrategy;

use crate::context::Context;

/// One way of building a full candidate layout from the initial state.
///
/// A strategy mutates the context in place; the orchestrator snapshots before
/// and scores after. Strategies must stop promptly once
/// [`Context::checkpoint`] answers false.
pub trait Strategy {
    /// Human-readable name for debugging, profiling and trace phases.
    fn name(&self) -> &str;

    /// Core strategies compete for the separate best-core candidate that the
    /// orchestrator also polishes.
    fn is_core(&self) -> bool {
        true
    }

    /// Quick check before running. Return false to skip this strategy.
    fn is_applicable(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &mut Context);
}

/// Build the default strategy list.
///
/// 1. StripStrategy -- repeating production strips in the largest free rectangle
/// 2. Constructive hero passes -- scan order, hero rotation, skip and height-class variants
/// 3. Constructive all-sizes passes -- every positive item, one at a time
/// 4. Constructive mixed passes -- all sizes compared in one search
/// 5. Deferred-secondary variants -- primary items first, then the rest
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(StripStrategy)];
    strategies.extend(
        constructive_configs()
            .into_iter()
            .map(|config| Box::new(Constructive::new(config)) as Box<dyn Strategy>),
    );
    strategies
}
