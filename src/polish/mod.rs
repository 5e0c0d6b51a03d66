//! Local search over a constructed layout.
//!
//! The passes run in a fixed order, each keeping only changes that pass its
//! own acceptance rule and leave the layout walkable with a way in:
//!
//! 1. upgrade - larger item variants in place
//! 2. relative-aware upgrade - lift relative-only pieces, upgrade, re-place
//! 3. centroid squeeze - nudge pieces together
//! 4. rotate for neatness - wall and neighbor contact at equal score
//! 5. gap fill - anything that still raises the score
//! 6. remove and repack - swap the cheapest primary pieces for a refill
//! 7. simulated annealing

pub mod anneal;
pub mod repack;
pub mod squeeze;
pub mod upgrade;

pub use anneal::{anneal, AnnealSchedule, AnnealStats};
pub use repack::remove_and_repack;
pub use squeeze::{centroid_squeeze, rotate_for_neatness};
pub use upgrade::{relative_aware_upgrade, upgrade_items};

use crate::context::Context;
use crate::finish::has_door_access;
use crate::oracles::is_walkable;
use crate::stats::*;
use crate::strategies::post::gap_fill;
use log::*;

/// Small positional offsets tried around a placement, nearest first.
pub(crate) const JITTER: [(i32, i32); 9] = [
    (0, 0),
    (0, -1),
    (-1, 0),
    (0, 1),
    (1, 0),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// The layout is walkable and, indoors, can still take a door.
pub fn layout_ok(ctx: &Context) -> bool {
    is_walkable(ctx) && (!ctx.is_indoor() || has_door_access(ctx))
}

/// Apply `mutate` and keep the result if it reports success, `accept` approves
/// the before/after scores and the layout is still fine. Otherwise roll back.
pub(crate) fn attempt<'a>(
    ctx: &mut Context<'a>,
    mutate: impl FnOnce(&mut Context<'a>) -> bool,
    accept: impl FnOnce(&Context<'a>, &LayoutScore, &LayoutScore) -> bool,
) -> bool {
    let snapshot = ctx.snapshot_light();
    let before = score_layout(ctx);
    if mutate(ctx) {
        let after = score_layout(ctx);
        if accept(ctx, &before, &after) && layout_ok(ctx) {
            return true;
        }
    }
    ctx.restore_light(&snapshot);
    false
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolishReport {
    pub upgraded: usize,
    pub relative_upgrade: bool,
    pub squeezed: usize,
    pub rotated: usize,
    pub gap_filled: bool,
    pub repacked: bool,
    pub anneal: AnnealStats,
    pub gain: f64,
}

/// Run every polish pass in order. Cancellation leaves the layout at the
/// last accepted state.
pub fn polish_layout(ctx: &mut Context) -> PolishReport {
    let started = ctx.trace_start();
    let before = score_layout(ctx).total;
    let mut report = PolishReport {
        upgraded: upgrade_items(ctx),
        ..Default::default()
    };
    report.relative_upgrade = relative_aware_upgrade(ctx);
    report.squeezed = centroid_squeeze(ctx);
    report.rotated = rotate_for_neatness(ctx);
    report.gap_filled = ctx.checkpoint() && gap_fill(ctx);
    report.repacked = remove_and_repack(ctx);
    ctx.trace_finish("polish", started);

    let schedule = AnnealSchedule::for_context(ctx);
    report.anneal = anneal(ctx, &schedule);
    report.gain = score_layout(ctx).total - before;

    debug!(
        "Polish: +{:.3} ({} upgraded, {} squeezed, {} rotated, annealing kept {} of {})",
        report.gain,
        report.upgraded,
        report.squeezed,
        report.rotated,
        report.anneal.improved,
        report.anneal.accepted
    );
    report
}
