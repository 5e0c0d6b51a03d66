//! Strategy sweep.
//!
//! Every applicable strategy starts from the same snapshot, is followed by the
//! common post-processing, and is scored. The sweep keeps the best layout
//! overall and the best layout produced by a core strategy; both go on to
//! polishing.

use crate::context::{Context, FullSnapshot};
use crate::polish::layout_ok;
use crate::stats::score_layout;
use crate::strategies::post::post_process;
use crate::strategies::Strategy;
use crate::strategies::constructive::MIN_IMPROVEMENT;
use log::*;
use serde::{Deserialize, Serialize};

/// A scored layout kept for polishing.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub strategy: String,
    pub score: f64,
    pub snapshot: FullSnapshot,
}

/// Outcome of one strategy run, for diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategyResult {
    pub name: String,
    pub score: f64,
    pub placements: usize,
    /// False if the layout broke walkability or door access and was dropped.
    pub accepted: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SweepOutcome {
    pub best: Option<Candidate>,
    pub best_core: Option<Candidate>,
    pub results: Vec<StrategyResult>,
}

impl SweepOutcome {
    /// Candidates worth polishing, best first, without duplicates.
    pub fn candidates(&self) -> Vec<&Candidate> {
        let mut out: Vec<&Candidate> = self.best.iter().collect();
        if let Some(core) = &self.best_core {
            if out.iter().all(|c| c.snapshot != core.snapshot) {
                out.push(core);
            }
        }
        out
    }
}

fn keep_if_better(slot: &mut Option<Candidate>, name: &str, score: f64, ctx: &Context) {
    let better = match slot {
        Some(current) => score > current.score + MIN_IMPROVEMENT,
        None => true,
    };
    if better {
        *slot = Some(Candidate {
            strategy: name.to_string(),
            score,
            snapshot: ctx.snapshot_full(),
        });
    }
}

/// Run every strategy from the current state. The context is left at the
/// starting state.
pub fn run_strategies(ctx: &mut Context, strategies: &[Box<dyn Strategy>]) -> SweepOutcome {
    let initial = ctx.snapshot_full();
    let mut outcome = SweepOutcome::default();

    for strategy in strategies {
        if !ctx.checkpoint() {
            debug!("Budget exhausted; stopping strategy sweep");
            break;
        }
        if !strategy.is_applicable(ctx) {
            trace!("Skipping strategy {}", strategy.name());
            continue;
        }

        ctx.restore_full(&initial);
        let started = ctx.trace_start();
        strategy.run(ctx);
        post_process(ctx);
        ctx.trace_finish(&format!("strategy:{}", strategy.name()), started);

        let score = score_layout(ctx).total;
        let accepted = layout_ok(ctx);
        debug!(
            "Strategy {}: score {:.3}, {} placements{}",
            strategy.name(),
            score,
            ctx.placements().len(),
            if accepted { "" } else { " (rejected)" }
        );
        outcome.results.push(StrategyResult {
            name: strategy.name().to_string(),
            score,
            placements: ctx.placements().len(),
            accepted,
        });
        if !accepted {
            continue;
        }

        keep_if_better(&mut outcome.best, strategy.name(), score, ctx);
        if strategy.is_core() {
            keep_if_better(&mut outcome.best_core, strategy.name(), score, ctx);
        }
    }

    ctx.restore_full(&initial);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;
    use crate::strategies::{Constructive, ConstructiveConfig, Sizing};
    use std::cell::Cell;
    use std::rc::Rc;

    fn hall() -> crate::grid::RoomGrid {
        room_from_ascii(&[
            "#########",
            "#.......#",
            "#.......#",
            "#.......#",
            "#.......#",
            "#########",
        ])
    }

    fn two_strategies() -> Vec<Box<dyn Strategy>> {
        vec![
            Box::new(Constructive::new(ConstructiveConfig::new("all-sizes", Sizing::AllSizes))),
            Box::new(Constructive::new(ConstructiveConfig::new("mixed", Sizing::Mixed))),
        ]
    }

    #[test]
    fn sweep_restores_the_start() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 3, false);
        let start = ctx.snapshot_full();

        let outcome = run_strategies(&mut ctx, &two_strategies());
        assert_eq!(ctx.snapshot_full(), start);
        assert_eq!(outcome.results.len(), 2);

        let best = outcome.best.as_ref().expect("a best candidate");
        let top = outcome
            .results
            .iter()
            .filter(|r| r.accepted)
            .map(|r| r.score)
            .fold(f64::MIN, f64::max);
        assert!((best.score - top).abs() < 1e-6);
        assert!(!outcome.candidates().is_empty());
    }

    #[test]
    fn exhausted_budget_runs_nothing() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        let budget = CpuBudget::new(move || {
            counter.set(counter.get() + 1);
            false
        });
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 3, false);

        let outcome = run_strategies(&mut ctx, &two_strategies());
        assert!(outcome.best.is_none());
        assert!(outcome.results.is_empty());
        assert_eq!(calls.get(), 1);
    }
}
