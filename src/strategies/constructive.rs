//! Parameterized greedy construction.
//!
//! Each configuration walks the groups in priority order and, per group,
//! repeatedly commits the single best-scoring legal position for its
//! candidate items until a further placement no longer improves the layout
//! score or the group reaches its maximum. The knobs only change which items
//! are tried, in what order and how the scan is biased; the scoring rule is
//! shared with every other greedy pass.

use super::placement::*;
use super::Strategy;
use crate::catalog::*;
use crate::context::Context;
use crate::grid::TileSet;
use crate::stats::*;
use itertools::Itertools;
use log::*;

/// Minimum score gain for a greedy commit to stick.
pub const MIN_IMPROVEMENT: f64 = 1e-9;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sizing {
    /// Only items within `HERO_DENSITY_RATIO` of the group's best density,
    /// followed by a filler pass over the rest.
    HeroOnly,
    /// Every item with positive value, one item exhausted at a time.
    AllSizes,
    /// Every item with positive value, compared in one search.
    Mixed,
}

#[derive(Clone, Debug)]
pub struct ConstructiveConfig {
    pub name: String,
    pub reverse_scan: bool,
    /// Rotate the item priority list left by this many places.
    pub hero_rotate: usize,
    /// Set aside every n-th best position instead of using it.
    pub skip_interval: Option<usize>,
    /// Work through one item height class at a time.
    pub height_class: bool,
    pub sizing: Sizing,
    /// Place primary groups before mandatory and supporting groups.
    pub deferred_secondary: bool,
}

impl ConstructiveConfig {
    pub fn new(name: &str, sizing: Sizing) -> ConstructiveConfig {
        ConstructiveConfig {
            name: name.to_string(),
            reverse_scan: false,
            hero_rotate: 0,
            skip_interval: None,
            height_class: false,
            sizing,
            deferred_secondary: false,
        }
    }

    fn reversed(mut self) -> Self {
        self.reverse_scan = true;
        self
    }

    fn rotated(mut self, by: usize) -> Self {
        self.hero_rotate = by;
        self
    }

    fn skipping(mut self, every: usize) -> Self {
        self.skip_interval = Some(every);
        self
    }

    fn by_height(mut self) -> Self {
        self.height_class = true;
        self
    }

    fn deferred(mut self) -> Self {
        self.deferred_secondary = true;
        self
    }
}

/// The default constructive configurations.
pub fn constructive_configs() -> Vec<ConstructiveConfig> {
    use Sizing::*;
    let c = ConstructiveConfig::new;
    vec![
        c("hero", HeroOnly),
        c("hero-reverse", HeroOnly).reversed(),
        c("hero-rot1", HeroOnly).rotated(1),
        c("hero-rot1-reverse", HeroOnly).rotated(1).reversed(),
        c("hero-skip3", HeroOnly).skipping(3),
        c("hero-skip5", HeroOnly).skipping(5),
        c("hero-height", HeroOnly).by_height(),
        c("hero-height-reverse", HeroOnly).by_height().reversed(),
        c("all", AllSizes),
        c("all-reverse", AllSizes).reversed(),
        c("all-rot1", AllSizes).rotated(1),
        c("all-skip4", AllSizes).skipping(4),
        c("all-height", AllSizes).by_height(),
        c("all-height-reverse", AllSizes).by_height().reversed(),
        c("mixed", Mixed),
        c("mixed-reverse", Mixed).reversed(),
        c("mixed-skip3", Mixed).skipping(3),
        c("mixed-height", Mixed).by_height(),
        c("deferred-hero", HeroOnly).deferred(),
        c("deferred-hero-reverse", HeroOnly).deferred().reversed(),
        c("deferred-all", AllSizes).deferred(),
        c("deferred-mixed", Mixed).deferred(),
        c("deferred-mixed-reverse", Mixed).deferred().reversed(),
        c("deferred-height", AllSizes).deferred().by_height(),
    ]
}

/// Group priority: mandatory groups, then primary contributors, then
/// efficiency, relative and secondary contributors, then decorative groups.
/// Deferred ordering moves primary contributors to the front.
pub fn group_order(catalog: &Catalog, building: &Building, deferred: bool) -> Vec<usize> {
    let rank = |group: usize| {
        let role = group_role(catalog, building, group);
        let mandatory = catalog.groups[group].is_mandatory();
        match (role, mandatory, deferred) {
            (GroupRole::Primary, _, true) => 0,
            (_, true, _) => 1,
            (GroupRole::Primary, false, false) => 2,
            (GroupRole::Efficiency, ..) => 3,
            (GroupRole::Relative, ..) => 4,
            (GroupRole::Secondary, ..) => 5,
            (GroupRole::Decorative, ..) => 6,
        }
    };
    (0..catalog.groups.len()).sorted_by_key(|&g| rank(g)).collect()
}

/// Items worth placing for a group: positive-value items by density, or every
/// item when none has value (plain mandatory groups).
pub fn valued_items(catalog: &Catalog, building: &Building, group: usize) -> Vec<usize> {
    let count = catalog.groups[group].items.len();
    let valued: Vec<usize> = (0..count)
        .filter(|&i| item_value(catalog, building, group, i) > 0.0)
        .sorted_by(|&a, &b| {
            item_density(catalog, building, group, b)
                .partial_cmp(&item_density(catalog, building, group, a))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .collect();
    if valued.is_empty() {
        (0..count).collect()
    } else {
        valued
    }
}

/// Greedily commit best positions of `items` while the layout score improves.
/// Returns false if the run was cancelled.
pub fn fill_while_improving(
    ctx: &mut Context,
    group: usize,
    items: &[usize],
    reverse: bool,
    skip_interval: Option<usize>,
    excluded: &mut TileSet,
) -> bool {
    let mut found = 0usize;
    loop {
        if !ctx.checkpoint() {
            return false;
        }
        let options = ScanOptions {
            reverse,
            window: None,
            excluded: Some(&*excluded),
        };
        let candidate = match items {
            [item] => find_best_position(ctx, group, *item, &options),
            _ => find_best_among(ctx, group, items, &options),
        };
        let candidate = match candidate {
            Some(candidate) => candidate,
            None => break,
        };

        found += 1;
        if let Some(every) = skip_interval {
            if every > 0 && found % every == 0 {
                let fp = ctx.footprint_of(&candidate.placement);
                if let Some(cell) = fp.tiles.first().and_then(|t| ctx.cell_of(&candidate.placement, t)) {
                    excluded.insert(cell);
                    continue;
                }
            }
        }

        let before = score_layout(ctx).total;
        if !ctx.add_placement(candidate.placement) {
            break;
        }
        if score_layout(ctx).total <= before + MIN_IMPROVEMENT {
            let last = ctx.placements().len() - 1;
            ctx.remove_placement(last);
            break;
        }
    }
    true
}

pub struct Constructive {
    config: ConstructiveConfig,
}

impl Constructive {
    pub fn new(config: ConstructiveConfig) -> Constructive {
        Constructive { config }
    }

    pub fn config(&self) -> &ConstructiveConfig {
        &self.config
    }

    /// Item batches for one group; each batch is searched as one pool.
    fn item_batches(&self, ctx: &Context, group: usize) -> Vec<Vec<usize>> {
        let catalog = ctx.catalog();
        let building = ctx.building();
        let mut items = match self.config.sizing {
            Sizing::HeroOnly => hero_items(catalog, building, group, ctx.config().hero_density_ratio),
            Sizing::AllSizes | Sizing::Mixed => valued_items(catalog, building, group),
        };
        if !items.is_empty() {
            let by = self.config.hero_rotate % items.len();
            items.rotate_left(by);
        }

        if self.config.height_class {
            let height = |i: usize| catalog.groups[group].items[i].height();
            let classes = items.iter().copied().sorted_by_key(|&i| height(i)).group_by(|&i| height(i));
            let mut batches = Vec::new();
            for (_, class) in &classes {
                batches.push(class.collect());
            }
            batches
        } else if self.config.sizing == Sizing::Mixed {
            vec![items]
        } else {
            items.into_iter().map(|i| vec![i]).collect()
        }
    }
}

impl Strategy for Constructive {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_core(&self) -> bool {
        !self.config.deferred_secondary
    }

    fn run(&self, ctx: &mut Context) {
        let catalog = ctx.catalog();
        let building = ctx.building();
        let order = group_order(catalog, building, self.config.deferred_secondary);
        let mut excluded = TileSet::new(ctx.grid().len());

        for &group in &order {
            for batch in self.item_batches(ctx, group) {
                if !fill_while_improving(
                    ctx,
                    group,
                    &batch,
                    self.config.reverse_scan,
                    self.config.skip_interval,
                    &mut excluded,
                ) {
                    return;
                }
            }
        }

        if self.config.sizing == Sizing::HeroOnly {
            let ratio = ctx.config().hero_density_ratio;
            for &group in &order {
                let heroes = hero_items(catalog, building, group, ratio);
                let fillers: Vec<usize> = valued_items(catalog, building, group)
                    .into_iter()
                    .filter(|i| !heroes.contains(i))
                    .collect();
                for item in fillers {
                    if !fill_while_improving(ctx, group, &[item], self.config.reverse_scan, None, &mut excluded) {
                        return;
                    }
                }
            }
        }

        debug!(
            "{}: {} placements, score {:.2}",
            self.config.name,
            ctx.placements().len(),
            score_layout(ctx).total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::grid::RoomGrid;
    use crate::oracles::is_walkable;
    use crate::pipeline::CpuBudget;

    #[test]
    fn mandatory_groups_come_first() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        assert_eq!(group_order(&catalog, &building, false), vec![STORAGE, BENCH, TOOLRACK, PLANT]);
        assert_eq!(group_order(&catalog, &building, true), vec![BENCH, STORAGE, TOOLRACK, PLANT]);
    }

    #[test]
    fn config_names_are_unique() {
        let configs = constructive_configs();
        assert!(configs.len() >= 20);
        assert_eq!(configs.iter().map(|c| c.name.as_str()).unique().count(), configs.len());
    }

    #[test]
    fn every_config_builds_a_legal_layout() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&[
            "#########",
            "#.......#",
            "#.......#",
            "#.......#",
            "#.......#",
            "#########",
        ]);

        for config in constructive_configs() {
            let mut ctx = Context::new(&catalog, &building, &budget, room.clone(), &[], &[], 3, false);
            let strategy = Constructive::new(config.clone());
            strategy.run(&mut ctx);
            assert!(is_walkable(&ctx), "{} left an unwalkable layout", config.name);
            assert!(ctx.group_count(BENCH) > 0, "{}", config.name);
            if !config.deferred_secondary {
                assert!(ctx.group_count(STORAGE) >= 1, "{}", config.name);
            }
        }
    }

    #[test]
    fn cancelled_run_stops_early() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::new(|| false);
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(6, 6), &[], &[], 3, false);
        Constructive::new(ConstructiveConfig::new("hero", Sizing::HeroOnly)).run(&mut ctx);
        assert!(ctx.placements().is_empty());
    }
}
