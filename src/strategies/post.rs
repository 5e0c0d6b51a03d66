//! Post-processing shared by every strategy result: force mandatory groups to
//! their minimum, trade primary pieces for supporting stats where that pays,
//! then fill whatever space is left.

use super::constructive::*;
use super::placement::*;
use crate::constants::*;
use crate::context::Context;
use crate::grid::TileSet;
use crate::stats::*;
use itertools::Itertools;
use log::*;

/// Placement indices ordered by ascending item value, skipping groups that
/// would drop below their minimum.
fn eviction_order(ctx: &Context, protect_group: Option<usize>) -> Vec<usize> {
    let catalog = ctx.catalog();
    let building = ctx.building();
    ctx.placements()
        .iter()
        .enumerate()
        .filter(|(_, p)| Some(p.group) != protect_group)
        .filter(|(_, p)| ctx.group_count(p.group) > catalog.groups[p.group].min_count())
        .map(|(i, p)| (i, item_value(catalog, building, p.group, p.item)))
        .sorted_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .collect()
}

fn place_any(ctx: &mut Context, group: usize, items: &[usize]) -> bool {
    match find_best_among(ctx, group, items, &ScanOptions::default()) {
        Some(candidate) => ctx.add_placement(candidate.placement),
        None => false,
    }
}

/// Bring every mandatory group up to its minimum, evicting the cheapest
/// pieces when no free position exists. Returns true if all minimums hold.
pub fn fill_mandatory(ctx: &mut Context) -> bool {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let mut satisfied = true;

    for group in 0..catalog.groups.len() {
        let min = catalog.groups[group].min_count();
        let items = valued_items(catalog, building, group);

        while ctx.group_count(group) < min {
            if !ctx.checkpoint() {
                return false;
            }
            if place_any(ctx, group, &items) {
                continue;
            }

            let snapshot = ctx.snapshot_light();
            let mut placed = false;
            for _ in 0..MAX_MANDATORY_EVICTIONS {
                let victim = match eviction_order(ctx, Some(group)).first() {
                    Some(&victim) => victim,
                    None => break,
                };
                let removed = ctx.remove_placement(victim);
                trace!("Evicting {:?} for mandatory group {}", removed, group);
                if place_any(ctx, group, &items) {
                    placed = true;
                    break;
                }
            }

            if !placed {
                ctx.restore_light(&snapshot);
                debug!("Mandatory group {} stays below its minimum", catalog.groups[group].name);
                satisfied = false;
                break;
            }
        }
    }

    satisfied
}

/// Efficiency and relative groups still short of their targets.
fn short_groups(ctx: &Context) -> Vec<usize> {
    let catalog = ctx.catalog();
    let building = ctx.building();
    (0..catalog.groups.len())
        .filter(|&g| {
            matches!(
                group_role(catalog, building, g),
                GroupRole::Efficiency | GroupRole::Relative
            )
        })
        .filter(|&g| ctx.group_has_capacity(g))
        .collect()
}

/// Add supporting pieces while the score improves; when nothing fits, try
/// giving up the cheapest primary piece for them.
pub fn balance_stats(ctx: &mut Context) {
    let catalog = ctx.catalog();
    let building = ctx.building();

    for _ in 0..MAX_BALANCE_ROUNDS {
        if !ctx.checkpoint() {
            return;
        }
        let groups = short_groups(ctx);
        if groups.is_empty() {
            return;
        }

        let base = score_layout(ctx).total;
        let mut improved = false;
        for &group in &groups {
            let items = valued_items(catalog, building, group);
            let snapshot = ctx.snapshot_light();
            if place_any(ctx, group, &items) && score_layout(ctx).total > base + MIN_IMPROVEMENT {
                improved = true;
                break;
            }
            ctx.restore_light(&snapshot);
        }
        if improved {
            continue;
        }

        // Trade: drop the cheapest primary piece and refill with supporting ones.
        let snapshot = ctx.snapshot_light();
        let victim = ctx
            .placements()
            .iter()
            .enumerate()
            .filter(|(_, p)| group_role(catalog, building, p.group) == GroupRole::Primary)
            .filter(|(_, p)| ctx.group_count(p.group) > catalog.groups[p.group].min_count())
            .min_by(|a, b| {
                item_value(catalog, building, a.1.group, a.1.item)
                    .partial_cmp(&item_value(catalog, building, b.1.group, b.1.item))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);
        let victim = match victim {
            Some(victim) => victim,
            None => return,
        };
        ctx.remove_placement(victim);

        let mut excluded = TileSet::new(ctx.grid().len());
        for &group in &groups {
            let items = valued_items(catalog, building, group);
            if !fill_while_improving(ctx, group, &items, false, None, &mut excluded) {
                break;
            }
        }

        if score_layout(ctx).total > base + MIN_IMPROVEMENT {
            trace!("Traded a primary piece for supporting stats");
        } else {
            ctx.restore_light(&snapshot);
            return;
        }
    }
}

/// Fill remaining space with any item that raises the score, densest
/// groups first.
pub fn gap_fill(ctx: &mut Context) -> bool {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let mut excluded = TileSet::new(ctx.grid().len());
    let before = ctx.placements().len();

    let order = group_order(catalog, building, false);
    for group in order {
        for item in valued_items(catalog, building, group) {
            if !fill_while_improving(ctx, group, &[item], false, None, &mut excluded) {
                return ctx.placements().len() > before;
            }
        }
    }

    ctx.placements().len() > before
}

/// Mandatory fill, stat balancing and gap fill, in that order.
pub fn post_process(ctx: &mut Context) {
    let started = ctx.trace_start();
    fill_mandatory(ctx);
    balance_stats(ctx);
    gap_fill(ctx);
    ctx.trace_finish("post_process", started);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::grid::RoomGrid;
    use crate::pipeline::CpuBudget;
    use crate::plan::Placement;

    #[test]
    fn mandatory_fill_evicts_when_full() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["...", "..."]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        // Plants on every tile that can take one.
        for col in 0..3 {
            ctx.try_place(Placement::new(PLANT, 0, 0, 0, col));
        }
        assert_eq!(ctx.group_count(STORAGE), 0);

        assert!(fill_mandatory(&mut ctx));
        assert_eq!(ctx.group_count(STORAGE), 1);
        assert!(crate::oracles::is_walkable(&ctx));
    }

    #[test]
    fn balance_adds_supporting_pieces() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(6, 6), &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 1, 0, 0, 0)));
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 5, 5)));

        let before = score_layout(&ctx).total;
        balance_stats(&mut ctx);
        assert!(ctx.group_count(TOOLRACK) + ctx.group_count(PLANT) > 0);
        assert!(score_layout(&ctx).total > before);
    }

    #[test]
    fn gap_fill_never_lowers_score() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(5, 4), &[], &[], 1, false);
        let before = score_layout(&ctx).total;
        assert!(gap_fill(&mut ctx));
        assert!(score_layout(&ctx).total > before);
        assert!(crate::oracles::is_walkable(&ctx));
    }
}
