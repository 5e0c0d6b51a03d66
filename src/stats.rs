//! Stat totals and the layout objective.

use crate::catalog::*;
use crate::constants::*;
use crate::context::Context;
use crate::plan::PlanScore;

/// How a group serves the building, derived from its stat row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupRole {
    /// Contributes to the primary stat.
    Primary,
    Efficiency,
    Relative,
    /// Contributes only to other stats.
    Secondary,
    /// Contributes nothing.
    Decorative,
}

pub fn group_role(catalog: &Catalog, building: &Building, group: usize) -> GroupRole {
    if let Some(primary) = catalog.primary_stat() {
        if building.stat(group, primary) > 0.0 {
            return GroupRole::Primary;
        }
    }

    let contributes = |kind: StatKind| {
        catalog
            .stats
            .iter()
            .enumerate()
            .any(|(s, def)| def.kind == kind && building.stat(group, s) > 0.0)
    };

    if contributes(StatKind::Efficiency) {
        GroupRole::Efficiency
    } else if contributes(StatKind::Relative) {
        GroupRole::Relative
    } else if (0..catalog.stats.len()).any(|s| building.stat(group, s) > 0.0) {
        GroupRole::Secondary
    } else {
        GroupRole::Decorative
    }
}

/// Weighted value of one item: the primary stat counts fully, every other
/// stat at `SECONDARY_DENSITY_WEIGHT`.
pub fn item_value(catalog: &Catalog, building: &Building, group: usize, item: usize) -> f64 {
    let primary = catalog.primary_stat();
    let multiplier = building.multiplier(catalog, group, item);
    (0..catalog.stats.len())
        .map(|s| {
            let weight = if Some(s) == primary {
                1.0
            } else {
                SECONDARY_DENSITY_WEIGHT
            };
            weight * building.stat(group, s) * multiplier
        })
        .sum()
}

/// Item value per footprint tile.
pub fn item_density(catalog: &Catalog, building: &Building, group: usize, item: usize) -> f64 {
    let tiles = catalog.groups[group].items[item].tile_count().max(1);
    item_value(catalog, building, group, item) / tiles as f64
}

/// Primary stat contribution of one item.
pub fn item_primary(catalog: &Catalog, building: &Building, group: usize, item: usize) -> f64 {
    catalog
        .primary_stat()
        .map(|p| building.stat(group, p) * building.multiplier(catalog, group, item))
        .unwrap_or(0.0)
}

/// Items of a group whose density is within `ratio` of the group's best,
/// best first.
pub fn hero_items(catalog: &Catalog, building: &Building, group: usize, ratio: f64) -> Vec<usize> {
    let mut items: Vec<(usize, f64)> = (0..catalog.groups[group].items.len())
        .map(|i| (i, item_density(catalog, building, group, i)))
        .collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let best = items.first().map(|i| i.1).unwrap_or(0.0);
    items
        .into_iter()
        .filter(|&(_, d)| d >= best * ratio)
        .map(|(i, _)| i)
        .collect()
}

/// Summed stats of the current placements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatTotals {
    pub values: Vec<f64>,
    pub occupied_tiles: usize,
    pub storage_tiles: usize,
}

impl StatTotals {
    pub fn compute(ctx: &Context) -> StatTotals {
        let catalog = ctx.catalog();
        let building = ctx.building();
        let mut totals = StatTotals {
            values: vec![0.0; catalog.stats.len()],
            ..Default::default()
        };

        for placement in ctx.placements() {
            let multiplier = building.multiplier(catalog, placement.group, placement.item);
            for (s, value) in totals.values.iter_mut().enumerate() {
                *value += building.stat(placement.group, s) * multiplier;
            }
            let fp = ctx.footprint_of(placement);
            totals.occupied_tiles += fp.tile_count();
            totals.storage_tiles += fp.storage;
        }

        totals
    }

    pub fn get(&self, stat: usize) -> f64 {
        self.values.get(stat).copied().unwrap_or(0.0)
    }
}

/// Objective terms of one layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutScore {
    pub total: f64,
    pub primary: f64,
    /// Sum of squared efficiency shortfalls.
    pub efficiency_shortfall: f64,
    /// Sum of squared relative-stat shortfalls.
    pub relative_shortfall: f64,
    pub secondary: f64,
    pub density: f64,
    pub missing_mandatory: u32,
}

impl LayoutScore {
    pub fn to_plan_score(&self, isolation: f64) -> PlanScore {
        PlanScore {
            total: self.total,
            primary: self.primary,
            efficiency_shortfall: self.efficiency_shortfall,
            relative_shortfall: self.relative_shortfall,
            density: self.density,
            isolation,
        }
    }
}

/// Missing mandatory placements, counting a required but absent storage
/// tile as one.
pub fn missing_mandatory(ctx: &Context, totals: &StatTotals) -> u32 {
    let catalog = ctx.catalog();
    let mut missing: u32 = catalog
        .groups
        .iter()
        .enumerate()
        .map(|(g, group)| group.min_count().saturating_sub(ctx.group_count(g)))
        .sum();
    if ctx.building().requires_storage && totals.storage_tiles == 0 {
        missing += 1;
    }
    missing
}

pub fn score_layout(ctx: &Context) -> LayoutScore {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let totals = ctx.stat_totals();
    let primary_stat = ctx.primary_stat();
    let primary = primary_stat.map(|p| totals.get(p)).unwrap_or(0.0);

    let achievable = |stat: usize| (0..catalog.groups.len()).any(|g| building.stat(g, stat) > 0.0);

    let mut efficiency_shortfall = 0.0;
    let mut relative_shortfall = 0.0;
    let mut secondary = 0.0;
    for (s, def) in catalog.stats.iter().enumerate() {
        if Some(s) == primary_stat {
            continue;
        }
        let value = totals.get(s);
        match def.kind {
            StatKind::Efficiency => {
                if achievable(s) {
                    let short = (1.0 - value).clamp(0.0, 1.0);
                    efficiency_shortfall += short * short;
                }
            }
            StatKind::Relative => {
                if achievable(s) && primary > 0.0 {
                    let short = (1.0 - value / primary).clamp(0.0, 1.0);
                    relative_shortfall += short * short;
                }
            }
            _ => secondary += value,
        }
    }

    let density = if ctx.room_count() == 0 {
        0.0
    } else {
        totals.occupied_tiles as f64 / ctx.room_count() as f64
    };
    let missing = missing_mandatory(ctx, &totals);

    let w = &ctx.config().weights;
    let total = w.primary * primary
        - w.efficiency_penalty * primary * efficiency_shortfall
        - w.relative_penalty * primary * relative_shortfall
        + w.secondary * secondary
        + w.density_bonus * density
        - w.mandatory_penalty * missing as f64;

    LayoutScore {
        total,
        primary,
        efficiency_shortfall,
        relative_shortfall,
        secondary,
        density,
        missing_mandatory: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::grid::RoomGrid;
    use crate::pipeline::CpuBudget;
    use crate::plan::Placement;

    #[test]
    fn roles_follow_stat_rows() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        assert_eq!(group_role(&catalog, &building, BENCH), GroupRole::Primary);
        assert_eq!(group_role(&catalog, &building, TOOLRACK), GroupRole::Efficiency);
        assert_eq!(group_role(&catalog, &building, STORAGE), GroupRole::Decorative);
        assert_eq!(group_role(&catalog, &building, PLANT), GroupRole::Relative);
    }

    #[test]
    fn heroes_are_densest_items() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        // Both bench sizes have the same value per tile.
        assert_eq!(hero_items(&catalog, &building, BENCH, HERO_DENSITY_RATIO), vec![0, 1]);
    }

    #[test]
    fn empty_layout_pays_for_missing_storage() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(5, 5), &[], &[], 1, false);
        let score = score_layout(&ctx);
        // Storage group minimum plus the storage-tile requirement.
        assert_eq!(score.missing_mandatory, 2);
        assert_eq!(score.total, -50.0);
    }

    #[test]
    fn shortfalls_scale_with_primary() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(5, 5), &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 0, 0, 0, 0)));
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 4, 4)));

        let score = score_layout(&ctx);
        assert_eq!(score.primary, 1.0);
        assert_eq!(score.efficiency_shortfall, 1.0);
        assert_eq!(score.relative_shortfall, 1.0);
        assert_eq!(score.missing_mandatory, 0);
        let expected = 10.0 - 4.0 - 4.0 + 1.0 + 2.0 * 3.0 / 25.0;
        assert!((score.total - expected).abs() < 1e-9);
    }
}
