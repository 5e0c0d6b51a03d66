//! Moves that tidy a layout without changing what is in it.

use super::{attempt, JITTER};
use crate::constants::*;
use crate::context::Context;
use crate::plan::Placement;
use crate::strategies::constructive::MIN_IMPROVEMENT;
use crate::strategies::placement::position_score;
use itertools::Itertools;

/// Weight of the shape bonus against the layout score when rotating.
const NEATNESS_WEIGHT: f64 = 0.01;

fn footprint_center(ctx: &Context, placement: &Placement) -> (f64, f64) {
    let fp = ctx.footprint_of(placement);
    (
        placement.row as f64 + (fp.height as f64 - 1.0) / 2.0,
        placement.col as f64 + (fp.width as f64 - 1.0) / 2.0,
    )
}

fn step_towards(delta: f64) -> i32 {
    if delta >= 1.0 {
        1
    } else if delta <= -1.0 {
        -1
    } else {
        0
    }
}

/// Nudge every placement one tile toward the centroid of all placements,
/// keeping moves that stay legal and do not cost score. Returns the moves.
pub fn centroid_squeeze(ctx: &mut Context) -> usize {
    let mut moves = 0;

    for _ in 0..MAX_SQUEEZE_ROUNDS {
        if !ctx.checkpoint() {
            break;
        }
        let count = ctx.placements().len();
        if count < 2 {
            break;
        }

        let (sum_row, sum_col) = ctx
            .placements()
            .iter()
            .map(|p| footprint_center(ctx, p))
            .fold((0.0, 0.0), |acc, c| (acc.0 + c.0, acc.1 + c.1));
        let centroid = (sum_row / count as f64, sum_col / count as f64);

        let mut moved = 0;
        for index in 0..count {
            let placement = ctx.placement(index);
            let center = footprint_center(ctx, &placement);
            let dr = step_towards(centroid.0 - center.0);
            let dc = step_towards(centroid.1 - center.1);

            let steps = [(dr, dc), (dr, 0), (0, dc)]
                .into_iter()
                .filter(|&step| step != (0, 0))
                .unique();
            for (sr, sc) in steps {
                let candidate = match placement.shifted(sr, sc) {
                    Some(candidate) => candidate,
                    None => continue,
                };
                if attempt(
                    ctx,
                    |ctx| ctx.replace_placement(index, candidate),
                    |_, before, after| after.total >= before.total - MIN_IMPROVEMENT,
                ) {
                    moved += 1;
                    break;
                }
            }
        }

        moves += moved;
        if moved == 0 {
            break;
        }
    }

    moves
}

/// Try every other allowed rotation of each placement with small offsets.
/// A change sticks if neither the primary stat nor efficiency regresses and
/// the score plus a small shape bonus improves. Returns the changes kept.
pub fn rotate_for_neatness(ctx: &mut Context) -> usize {
    let catalog = ctx.catalog();
    let mut rotated = 0;

    for index in 0..ctx.placements().len() {
        if !ctx.checkpoint() {
            break;
        }
        let current = ctx.placement(index);
        let neat_before = position_score(ctx, &current, 0.0);

        'search: for &rotation in catalog.groups[current.group].rotation.rotations() {
            if rotation == current.rotation {
                continue;
            }
            for (dr, dc) in JITTER {
                let candidate = match (Placement { rotation, ..current }).shifted(dr, dc) {
                    Some(candidate) => candidate,
                    None => continue,
                };
                let accepted = attempt(
                    ctx,
                    |ctx| ctx.replace_placement(index, candidate),
                    |ctx, before, after| {
                        let neat_after = position_score(ctx, &ctx.placement(index), 0.0);
                        after.primary >= before.primary - MIN_IMPROVEMENT
                            && after.efficiency_shortfall <= before.efficiency_shortfall + MIN_IMPROVEMENT
                            && after.total + NEATNESS_WEIGHT * neat_after
                                > before.total + NEATNESS_WEIGHT * neat_before + MIN_IMPROVEMENT
                    },
                );
                if accepted {
                    rotated += 1;
                    break 'search;
                }
            }
        }
    }

    rotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::grid::RoomGrid;
    use crate::pipeline::CpuBudget;
    use crate::stats::score_layout;

    #[test]
    fn step_needs_a_full_tile() {
        assert_eq!(step_towards(0.5), 0);
        assert_eq!(step_towards(-1.0), -1);
        assert_eq!(step_towards(3.2), 1);
    }

    #[test]
    fn squeeze_pulls_pieces_together() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(9, 3), &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(PLANT, 0, 0, 1, 0)));
        assert!(ctx.try_place(Placement::new(PLANT, 0, 0, 1, 8)));
        let before = score_layout(&ctx).total;

        assert!(centroid_squeeze(&mut ctx) > 0);
        let cols: Vec<usize> = ctx.placements().iter().map(|p| p.col).sorted().collect();
        assert!(cols[1] - cols[0] < 8);
        assert!((score_layout(&ctx).total - before).abs() < 1e-6);
    }

    #[test]
    fn rotation_only_adds_contact() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&[
            "#######",
            "#.....#",
            "#.....#",
            "#.....#",
            "#######",
        ]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        // A bench standing in the open, station facing the room's middle.
        assert!(ctx.try_place(Placement::new(BENCH, 0, 0, 2, 2)));
        let before = position_score(&ctx, &ctx.placement(0), 0.0);

        rotate_for_neatness(&mut ctx);
        assert!(position_score(&ctx, &ctx.placement(0), 0.0) >= before);
        assert!(crate::oracles::is_walkable(&ctx));
    }
}
