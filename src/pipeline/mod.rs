//! The optimization run: seed a door, stabilize, sweep the strategies, then
//! polish, finish and validate each surviving candidate under one or more
//! seeds and keep the best valid result.

pub mod finalize;
pub mod search;

use crate::context::{Context, FullSnapshot};
use crate::finish::{finish_layout, seed_door};
use crate::oracles::place_support_pillars;
use crate::polish::polish_layout;
use crate::stats::{score_layout, LayoutScore};
use crate::strategies::constructive::MIN_IMPROVEMENT;
use crate::strategies::Strategy;
use finalize::{finalize_layout, validate_layout, ValidationReport};
use log::*;
use search::{run_strategies, StrategyResult};
use std::cell::Cell;

/// Cooperative CPU budget. Phases call [`CpuBudget::has_budget`] at bounded
/// intervals; the host closure may yield to its scheduler before answering,
/// and a `false` answer cancels the run (latched, so later phases stop too).
pub struct CpuBudget {
    /// Function that returns true if the planner should continue working.
    should_continue: Box<dyn Fn() -> bool>,
    exhausted: Cell<bool>,
    checkpoints: Cell<u64>,
}

impl CpuBudget {
    pub fn new<F: Fn() -> bool + 'static>(should_continue: F) -> Self {
        CpuBudget {
            should_continue: Box::new(should_continue),
            exhausted: Cell::new(false),
            checkpoints: Cell::new(0),
        }
    }

    /// Unlimited budget (for offline/bench use).
    pub fn unlimited() -> Self {
        CpuBudget::new(|| true)
    }

    /// Returns true if there is budget remaining to continue work.
    pub fn has_budget(&self) -> bool {
        if self.exhausted.get() {
            return false;
        }
        self.checkpoints.set(self.checkpoints.get() + 1);
        if !(self.should_continue)() {
            self.exhausted.set(true);
            return false;
        }
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.get()
    }

    /// Number of checkpoints answered so far.
    pub fn checkpoints(&self) -> u64 {
        self.checkpoints.get()
    }
}

/// Offset between the seeds of successive polish attempts.
const POLISH_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// What a full run produced. The context holds the chosen layout.
#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    pub score: LayoutScore,
    pub report: ValidationReport,
    /// Strategy behind the chosen layout; `None` if the input was kept.
    pub strategy: Option<String>,
    pub results: Vec<StrategyResult>,
}

/// Polish attempts per candidate: two for small and medium rooms, one for
/// large ones, unless configured.
pub fn polish_seed_count(ctx: &Context) -> usize {
    let config = ctx.config();
    match config.polish_seeds {
        Some(seeds) => seeds.max(1),
        None if ctx.room_count() > config.large_room_tiles => 1,
        None => 2,
    }
}

struct Finished {
    score: f64,
    snapshot: FullSnapshot,
    strategy: String,
}

pub fn run_pipeline(ctx: &mut Context, strategies: &[Box<dyn Strategy>], seed: u64) -> PipelineOutcome {
    let input = ctx.snapshot_full();

    seed_door(ctx);
    if ctx.is_indoor() {
        let started = ctx.trace_start();
        let pillars = place_support_pillars(ctx);
        ctx.trace_finish("pillars", started);
        debug!("Placed {} support pillars before the sweep", pillars);
    }

    let sweep = run_strategies(ctx, strategies);
    let seeds = polish_seed_count(ctx);
    let rng = ctx.rng_state();
    let mut best: Option<Finished> = None;

    for candidate in sweep.candidates() {
        for attempt in 0..seeds {
            if attempt > 0 && !ctx.checkpoint() {
                break;
            }
            ctx.restore_full(&candidate.snapshot);
            ctx.set_rng_state(rng.clone());
            if attempt > 0 {
                ctx.reseed(seed.wrapping_add(attempt as u64 * POLISH_SEED_STRIDE));
            }

            polish_layout(ctx);
            finish_layout(ctx);
            let report = finalize_layout(ctx, &candidate.snapshot);
            let score = score_layout(ctx).total;
            debug!(
                "Candidate {} seed {}: {:.3}{}",
                candidate.strategy,
                attempt,
                score,
                if report.is_valid() { "" } else { " (invalid)" }
            );

            let better = match &best {
                Some(current) => score > current.score + MIN_IMPROVEMENT,
                None => true,
            };
            if report.is_valid() && better {
                best = Some(Finished {
                    score,
                    snapshot: ctx.snapshot_full(),
                    strategy: candidate.strategy.clone(),
                });
            }
        }
    }

    let strategy = match best {
        Some(finished) => {
            ctx.restore_full(&finished.snapshot);
            Some(finished.strategy)
        }
        None => {
            warn!("No candidate passed validation; keeping the input layout");
            ctx.restore_full(&input);
            None
        }
    };

    PipelineOutcome {
        score: score_layout(ctx),
        report: validate_layout(ctx),
        strategy,
        results: sweep.results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn exhaustion_is_latched() {
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        let budget = CpuBudget::new(move || {
            counter.set(counter.get() + 1);
            counter.get() < 3
        });

        assert!(budget.has_budget());
        assert!(budget.has_budget());
        assert!(!budget.has_budget());
        assert!(!budget.has_budget());
        assert_eq!(calls.get(), 3);
        assert!(budget.is_exhausted());
    }

    fn hall() -> crate::grid::RoomGrid {
        crate::fixtures::room_from_ascii(&[
            "#########",
            "#.......#",
            "#.......#",
            "#.......#",
            "#.......#",
            "#########",
        ])
    }

    #[test]
    fn seed_count_follows_room_size() {
        use crate::fixtures::*;
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let small = Context::new(&catalog, &building, &budget, hall(), &[], &[], 1, false);
        assert_eq!(polish_seed_count(&small), 2);
        let large = Context::new(&catalog, &building, &budget, crate::grid::RoomGrid::filled(20, 20), &[], &[], 1, false);
        assert_eq!(polish_seed_count(&large), 1);

        let mut config = crate::planner::PlannerConfig::default();
        config.polish_seeds = Some(3);
        let configured = Context::new(&catalog, &building, &budget, hall(), &[], &[], 1, false).with_config(config);
        assert_eq!(polish_seed_count(&configured), 3);
    }

    #[test]
    fn cancelled_run_keeps_the_input() {
        use crate::fixtures::*;
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::new(|| false);
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 1, false);
        let input = ctx.snapshot_full();

        let outcome = run_pipeline(&mut ctx, &crate::strategies::default_strategies(), 1);
        assert!(outcome.strategy.is_none());
        assert!(outcome.results.is_empty());
        assert_eq!(ctx.snapshot_full(), input);
        assert!(!outcome.report.is_valid());
    }

    #[test]
    fn chosen_layout_is_valid() {
        use crate::fixtures::*;
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut config = crate::planner::PlannerConfig::default();
        config.sa_iterations = 100;
        config.polish_seeds = Some(1);
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 5, false).with_config(config);

        let outcome = run_pipeline(&mut ctx, &crate::strategies::default_strategies(), 5);
        assert!(!outcome.results.is_empty());
        if outcome.strategy.is_some() {
            assert!(outcome.report.is_valid(), "{:?}", outcome.report.failures());
            assert!(ctx.group_count(crate::fixtures::STORAGE) >= 1);
        }
    }
}
