//! Remove the least valuable primary pieces and refill with larger items.

use super::layout_ok;
use crate::constants::*;
use crate::context::Context;
use crate::grid::TileSet;
use crate::plan::Placement;
use crate::stats::*;
use crate::strategies::constructive::{fill_while_improving, MIN_IMPROVEMENT};
use crate::strategies::post::gap_fill;
use itertools::Itertools;
use log::*;

/// Primary placements above their group minimum, cheapest first.
fn repack_victims(ctx: &Context) -> Vec<Placement> {
    let catalog = ctx.catalog();
    let building = ctx.building();
    ctx.placements()
        .iter()
        .filter(|p| group_role(catalog, building, p.group) == GroupRole::Primary)
        .filter(|p| ctx.group_count(p.group) > catalog.groups[p.group].min_count())
        .sorted_by(|a, b| {
            item_value(catalog, building, a.group, a.item)
                .partial_cmp(&item_value(catalog, building, b.group, b.item))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .take(MAX_REPACK_VICTIMS)
        .copied()
        .collect()
}

/// Refill primary groups, largest items first, then any gaps.
fn refill(ctx: &mut Context) -> bool {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let mut excluded = TileSet::new(ctx.grid().len());

    for group in (0..catalog.groups.len()).filter(|&g| group_role(catalog, building, g) == GroupRole::Primary) {
        let items = &catalog.groups[group].items;
        let by_size: Vec<usize> = (0..items.len())
            .sorted_by_key(|&i| std::cmp::Reverse(items[i].tile_count()))
            .collect();
        for item in by_size {
            if !fill_while_improving(ctx, group, &[item], false, None, &mut excluded) {
                return false;
            }
        }
    }
    gap_fill(ctx);
    true
}

/// Drop the 1..=N cheapest primary pieces and refill; keep the first
/// variant that raises the score.
pub fn remove_and_repack(ctx: &mut Context) -> bool {
    let victims = repack_victims(ctx);

    for count in 1..=victims.len() {
        if !ctx.checkpoint() {
            return false;
        }
        let snapshot = ctx.snapshot_light();
        let base = score_layout(ctx).total;

        for victim in &victims[..count] {
            if let Some(index) = ctx.placements().iter().position(|p| p == victim) {
                ctx.remove_placement(index);
            }
        }

        let finished = refill(ctx);
        let score = score_layout(ctx).total;
        if finished && score > base + MIN_IMPROVEMENT && layout_ok(ctx) {
            debug!("Repacked {} pieces: {:.3} -> {:.3}", count, base, score);
            return true;
        }
        ctx.restore_light(&snapshot);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;

    #[test]
    fn repack_replaces_small_benches() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&[
            "#####",
            "#...#",
            "#...#",
            "#...#",
            "#####",
        ]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 0, 0, 1, 1)));
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 3, 3)));

        let before = score_layout(&ctx).total;
        let victims = repack_victims(&ctx);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].group, BENCH);

        if remove_and_repack(&mut ctx) {
            assert!(score_layout(&ctx).total > before);
        } else {
            assert_eq!(score_layout(&ctx).total, before);
        }
        assert!(crate::oracles::is_walkable(&ctx));
    }
}
