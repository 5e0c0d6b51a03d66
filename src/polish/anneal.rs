//! Simulated annealing over placements.
//!
//! Each iteration proposes one move: reinsert (remove one or two nearby pieces
//! and put them back, possibly resized, by best or random position), shift
//! (move a piece up to two tiles) or resize (another variant of the same group
//! with a small jitter). Better states are always accepted, worse ones with
//! probability `exp(delta / T)` under a linear cooling schedule. The best
//! state seen is restored at the end.

use super::layout_ok;
use crate::constants::*;
use crate::context::Context;
use crate::plan::Placement;
use crate::stats::score_layout;
use crate::strategies::constructive::MIN_IMPROVEMENT;
use crate::strategies::placement::*;
use log::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

const REINSERT_PROBABILITY: f64 = 0.4;
const SHIFT_PROBABILITY: f64 = 0.3;
const MAX_SHIFT: i32 = 2;
/// Random anchors tried before a random reinsertion gives up.
const RANDOM_INSERT_TRIES: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnealSchedule {
    pub iterations: usize,
    pub initial_temperature: f64,
}

impl AnnealSchedule {
    /// Iteration budget from the config, reduced for large rooms.
    pub fn for_context(ctx: &Context) -> AnnealSchedule {
        let config = ctx.config();
        let iterations = if ctx.room_count() > config.large_room_tiles {
            config.sa_iterations_large
        } else {
            config.sa_iterations
        };
        AnnealSchedule {
            iterations,
            initial_temperature: config.sa_initial_temperature,
        }
    }

    /// Linear from the initial temperature down to zero.
    pub fn temperature(&self, iteration: usize) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.initial_temperature * (1.0 - iteration as f64 / self.iterations as f64)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnealStats {
    pub iterations: usize,
    pub proposed: usize,
    pub accepted: usize,
    /// Accepted moves that set a new best.
    pub improved: usize,
}

fn chebyshev(a: &Placement, b: &Placement) -> usize {
    let dr = (a.row as i64 - b.row as i64).unsigned_abs() as usize;
    let dc = (a.col as i64 - b.col as i64).unsigned_abs() as usize;
    dr.max(dc)
}

/// Try a few random legal anchors near the window centre.
fn random_insert(ctx: &mut Context, group: usize, item: usize, options: &ScanOptions) -> bool {
    let mut candidates = scored_positions(ctx, group, item, options);
    for _ in 0..RANDOM_INSERT_TRIES {
        if candidates.is_empty() {
            return false;
        }
        let pick = ctx.rng().random_range(0..candidates.len());
        let candidate = candidates.swap_remove(pick);
        if ctx.try_place(candidate.placement) {
            return true;
        }
    }
    false
}

/// Move A: lift one piece (and maybe its nearest neighbor) and reinsert each
/// as a random variant of its group.
fn reinsert_move(ctx: &mut Context) -> bool {
    let count = ctx.placements().len();
    if count == 0 {
        return false;
    }
    let first = ctx.rng().random_range(0..count);
    let anchor = ctx.remove_placement(first);
    let mut lifted = vec![anchor];

    if ctx.rng().random_bool(0.5) {
        let radius = SA_REINSERT_RADIUS as usize;
        let nearest = ctx
            .placements()
            .iter()
            .enumerate()
            .map(|(i, p)| (i, chebyshev(&anchor, p)))
            .filter(|&(_, d)| d <= radius)
            .min_by_key(|&(i, d)| (d, i))
            .map(|(i, _)| i);
        if let Some(index) = nearest {
            lifted.push(ctx.remove_placement(index));
        }
    }

    for old in lifted {
        let variants = ctx.catalog().groups[old.group].items.len();
        let item = ctx.rng().random_range(0..variants);
        let options = ScanOptions {
            window: Some((old.row, old.col, SA_REINSERT_RADIUS)),
            ..Default::default()
        };
        if ctx.rng().random_bool(0.5) {
            if let Some(candidate) = find_best_position(ctx, old.group, item, &options) {
                ctx.add_placement(candidate.placement);
            }
        } else {
            random_insert(ctx, old.group, item, &options);
        }
    }

    true
}

/// Move B: shift one piece by up to `MAX_SHIFT` tiles.
fn shift_move(ctx: &mut Context) -> bool {
    let count = ctx.placements().len();
    if count == 0 {
        return false;
    }
    let index = ctx.rng().random_range(0..count);
    let dr = ctx.rng().random_range(-MAX_SHIFT..=MAX_SHIFT);
    let dc = ctx.rng().random_range(-MAX_SHIFT..=MAX_SHIFT);
    if dr == 0 && dc == 0 {
        return false;
    }
    match ctx.placement(index).shifted(dr, dc) {
        Some(candidate) => ctx.replace_placement(index, candidate),
        None => false,
    }
}

/// Move C: swap one piece for a random variant and rotation, jittered.
fn resize_move(ctx: &mut Context) -> bool {
    let count = ctx.placements().len();
    if count == 0 {
        return false;
    }
    let index = ctx.rng().random_range(0..count);
    let current = ctx.placement(index);
    let group = &ctx.catalog().groups[current.group];
    let rotations = group.rotation.rotations();

    let item = ctx.rng().random_range(0..group.items.len());
    let rotation = rotations[ctx.rng().random_range(0..rotations.len())];
    let dr = ctx.rng().random_range(-1..=1);
    let dc = ctx.rng().random_range(-1..=1);
    let candidate = match (Placement {
        item,
        rotation,
        ..current
    })
    .shifted(dr, dc)
    {
        Some(candidate) if candidate != current => candidate,
        _ => return false,
    };
    ctx.replace_placement(index, candidate)
}

/// Anneal from the current state and finish on the best state seen.
pub fn anneal(ctx: &mut Context, schedule: &AnnealSchedule) -> AnnealStats {
    let started = ctx.trace_start();
    let mut stats = AnnealStats::default();
    let mut current = score_layout(ctx).total;
    let mut best = current;
    let mut best_snapshot = ctx.snapshot_light();

    for iteration in 0..schedule.iterations {
        if iteration % SA_CHECKPOINT_INTERVAL == 0 && !ctx.checkpoint() {
            break;
        }
        stats.iterations += 1;
        let temperature = schedule.temperature(iteration);
        let before = ctx.snapshot_light();

        let roll: f64 = ctx.rng().random();
        let moved = if roll < REINSERT_PROBABILITY {
            reinsert_move(ctx)
        } else if roll < REINSERT_PROBABILITY + SHIFT_PROBABILITY {
            shift_move(ctx)
        } else {
            resize_move(ctx)
        };
        if !moved {
            continue;
        }
        stats.proposed += 1;

        if !layout_ok(ctx) {
            ctx.restore_light(&before);
            continue;
        }

        let score = score_layout(ctx).total;
        let delta = score - current;
        let accept = delta >= 0.0 || (temperature > 0.0 && ctx.rng().random::<f64>() < (delta / temperature).exp());
        if accept {
            current = score;
            stats.accepted += 1;
            if score > best + MIN_IMPROVEMENT {
                best = score;
                best_snapshot = ctx.snapshot_light();
                stats.improved += 1;
            }
        } else {
            ctx.restore_light(&before);
        }
    }

    ctx.restore_light(&best_snapshot);
    ctx.trace_finish("anneal", started);
    debug!(
        "Anneal: {} iterations, {} accepted, best {:.3}",
        stats.iterations, stats.accepted, best
    );
    stats
}
