//! Swap placements for larger variants of the same group.

use super::{attempt, layout_ok, JITTER};
use crate::catalog::*;
use crate::context::Context;
use crate::plan::Placement;
use crate::stats::*;
use crate::strategies::constructive::{fill_while_improving, valued_items, MIN_IMPROVEMENT};
use crate::strategies::post::fill_mandatory;
use crate::grid::TileSet;
use itertools::Itertools;
use log::*;

/// Items of `group` with more tiles than `item`, largest first.
fn larger_items(catalog: &Catalog, group: usize, item: usize) -> Vec<usize> {
    let items = &catalog.groups[group].items;
    let size = items[item].tile_count();
    (0..items.len())
        .filter(|&i| items[i].tile_count() > size)
        .sorted_by_key(|&i| std::cmp::Reverse(items[i].tile_count()))
        .collect()
}

/// Efficiency stats this group feeds.
fn guarded_stats(catalog: &Catalog, building: &Building, group: usize) -> Vec<usize> {
    catalog
        .stats
        .iter()
        .enumerate()
        .filter(|(s, def)| def.kind == StatKind::Efficiency && building.stat(group, *s) > 0.0)
        .map(|(s, _)| s)
        .collect()
}

/// Try to swap placement `index` for a larger variant. The layout score may
/// not drop, and neither may the group's efficiency stats or storage tiles.
pub fn upgrade_placement(ctx: &mut Context, index: usize) -> bool {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let current = ctx.placement(index);
    let guarded = guarded_stats(catalog, building, current.group);
    let guard_storage = ctx.footprint_of(&current).storage > 0;
    let totals = ctx.stat_totals();

    for item in larger_items(catalog, current.group, current.item) {
        for &rotation in catalog.groups[current.group].rotation.rotations() {
            for (dr, dc) in JITTER {
                let candidate = match (Placement {
                    item,
                    rotation,
                    ..current
                })
                .shifted(dr, dc)
                {
                    Some(candidate) => candidate,
                    None => continue,
                };

                let accepted = attempt(
                    ctx,
                    |ctx| ctx.replace_placement(index, candidate),
                    |ctx, before, after| {
                        if after.total < before.total - MIN_IMPROVEMENT {
                            return false;
                        }
                        let now = ctx.stat_totals();
                        let stats_kept = guarded.iter().all(|&s| now.get(s) >= totals.get(s) - MIN_IMPROVEMENT);
                        stats_kept && (!guard_storage || now.storage_tiles >= totals.storage_tiles)
                    },
                );
                if accepted {
                    trace!("Upgraded {:?} to {:?}", current, candidate);
                    return true;
                }
            }
        }
    }

    false
}

/// Upgrade every placement of the given groups once. Returns the upgrades.
pub fn upgrade_groups(ctx: &mut Context, groups: &[usize]) -> usize {
    let mut upgraded = 0;
    for index in 0..ctx.placements().len() {
        if !ctx.checkpoint() {
            break;
        }
        if groups.contains(&ctx.placement(index).group) && upgrade_placement(ctx, index) {
            upgraded += 1;
        }
    }
    upgraded
}

pub fn upgrade_items(ctx: &mut Context) -> usize {
    let groups: Vec<usize> = (0..ctx.catalog().groups.len()).collect();
    upgrade_groups(ctx, &groups)
}

/// Lift every relative-only piece, upgrade the primary pieces into the
/// freed space and put relative pieces back. Kept only if the score improves.
pub fn relative_aware_upgrade(ctx: &mut Context) -> bool {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let roles: Vec<GroupRole> = (0..catalog.groups.len())
        .map(|g| group_role(catalog, building, g))
        .collect();
    let relative: Vec<usize> = (0..roles.len()).filter(|&g| roles[g] == GroupRole::Relative).collect();
    let primary: Vec<usize> = (0..roles.len()).filter(|&g| roles[g] == GroupRole::Primary).collect();

    if relative.is_empty() || primary.is_empty() || !ctx.placements().iter().any(|p| relative.contains(&p.group)) {
        return false;
    }
    if !ctx.checkpoint() {
        return false;
    }

    let snapshot = ctx.snapshot_light();
    let base = score_layout(ctx).total;

    let mut index = ctx.placements().len();
    while index > 0 {
        index -= 1;
        if relative.contains(&ctx.placement(index).group) {
            ctx.remove_placement(index);
        }
    }

    let upgraded = upgrade_groups(ctx, &primary);

    let mut excluded = TileSet::new(ctx.grid().len());
    for &group in &relative {
        let items = valued_items(catalog, building, group);
        if !fill_while_improving(ctx, group, &items, false, None, &mut excluded) {
            break;
        }
    }
    fill_mandatory(ctx);

    let score = score_layout(ctx).total;
    if score > base + MIN_IMPROVEMENT && layout_ok(ctx) {
        debug!("Relative-aware upgrade: {} upgrades, {:.3} -> {:.3}", upgraded, base, score);
        true
    } else {
        ctx.restore_light(&snapshot);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::grid::RoomGrid;
    use crate::pipeline::CpuBudget;

    #[test]
    fn larger_items_exclude_same_size() {
        let catalog = workshop_catalog();
        assert_eq!(larger_items(&catalog, BENCH, 0), vec![1]);
        assert!(larger_items(&catalog, BENCH, 1).is_empty());
        assert!(larger_items(&catalog, TOOLRACK, 0).is_empty());
    }

    #[test]
    fn small_bench_grows_in_place() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(6, 4), &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 0, 0, 0, 0)));
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 3, 5)));
        let before = score_layout(&ctx).total;

        assert_eq!(upgrade_items(&mut ctx), 1);
        assert_eq!(ctx.placements().iter().filter(|p| p.group == BENCH && p.item == 1).count(), 1);
        assert!(score_layout(&ctx).total >= before);
    }

    #[test]
    fn relative_upgrade_restores_when_no_gain() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(6, 4), &[], &[], 1, false);
        // Nothing to upgrade, and nothing relative placed.
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 3, 5)));
        let snapshot = ctx.snapshot_light();
        assert!(!relative_aware_upgrade(&mut ctx));
        assert_eq!(ctx.snapshot_light(), snapshot);
    }
}
