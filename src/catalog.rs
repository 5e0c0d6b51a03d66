//! Read-only furniture catalog and building stat table.
//!
//! The catalog is consumed, never produced, by the planner. A `Catalog`
//! declares tile types, furniture groups (each a set of size variants) and
//! the stat list; a `Building` maps every group onto that stat list.

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a furniture tile interacts with movement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    /// Walkable floor furniture.
    Room,
    /// Walkable but discouraged.
    Avoid,
    /// Impassable, but does not block light or sight.
    Penetrable,
    Solid,
    NotAccessible,
}

impl Availability {
    /// All impassable variants share one blocking predicate.
    pub fn is_blocking(self) -> bool {
        matches!(
            self,
            Availability::Penetrable | Availability::Solid | Availability::NotAccessible
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileType {
    pub name: String,
    pub availability: Availability,
    /// The tile needs at least one walkable 4-neighbor at all times.
    #[serde(default)]
    pub must_be_reachable: bool,
    #[serde(default)]
    pub data: u32,
}

impl TileType {
    pub fn is_blocking(&self) -> bool {
        self.availability.is_blocking()
    }

    pub fn is_storage(&self) -> bool {
        self.data == STORAGE_TILE_DATA
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationClass {
    None,
    TwoWay,
    FourWay,
}

impl RotationClass {
    /// Allowed rotations, in quarter turns clockwise.
    pub fn rotations(self) -> &'static [u8] {
        match self {
            RotationClass::None => &[0],
            RotationClass::TwoWay => &[0, 1],
            RotationClass::FourWay => &[0, 1, 2, 3],
        }
    }

    pub fn allows(self, rotation: u8) -> bool {
        self.rotations().contains(&rotation)
    }
}

/// One size/value variant of a group: a grid of optional tile-type indices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub tiles: Vec<Vec<Option<usize>>>,
}

impl Item {
    pub fn height(&self) -> usize {
        self.tiles.len()
    }

    pub fn width(&self) -> usize {
        self.tiles.iter().map(|row| row.len()).max().unwrap_or(0)
    }

    /// Number of non-null footprint tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles
            .iter()
            .flat_map(|row| row.iter())
            .filter(|t| t.is_some())
            .count()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub rotation: RotationClass,
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
    pub items: Vec<Item>,
}

impl Group {
    pub fn min_count(&self) -> u32 {
        self.min.unwrap_or(0)
    }

    pub fn max_count(&self) -> u32 {
        self.max.unwrap_or(u32::MAX)
    }

    pub fn is_mandatory(&self) -> bool {
        self.min_count() > 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Employees,
    Services,
    Efficiency,
    /// Measured relative to the primary stat.
    Relative,
    Custom,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatDef {
    pub name: String,
    pub kind: StatKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    pub tile_types: Vec<TileType>,
    pub groups: Vec<Group>,
    pub stats: Vec<StatDef>,
}

impl Catalog {
    /// Index of the stat the optimizer maximizes: the first services or custom
    /// stat, falling back to the first employees stat.
    pub fn primary_stat(&self) -> Option<usize> {
        self.stats
            .iter()
            .position(|s| matches!(s.kind, StatKind::Services | StatKind::Custom))
            .or_else(|| {
                self.stats
                    .iter()
                    .position(|s| s.kind == StatKind::Employees)
            })
    }

    pub fn stat_kind(&self, stat: usize) -> Option<StatKind> {
        self.stats.get(stat).map(|s| s.kind)
    }

    /// Check that every tile reference resolves and every group has items.
    pub fn validate(&self) -> Result<(), InputError> {
        for (group_index, group) in self.groups.iter().enumerate() {
            if group.items.is_empty() {
                return Err(InputError::EmptyGroup(group_index));
            }
            for item in &group.items {
                let bad_reference = item
                    .tiles
                    .iter()
                    .flat_map(|row| row.iter())
                    .flatten()
                    .any(|&tile| tile >= self.tile_types.len());
                if bad_reference {
                    return Err(InputError::BadTileReference(group_index));
                }
            }
        }
        Ok(())
    }
}

/// Stat contributions of one group, aligned with `Catalog::stats`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupStats {
    pub stats: Vec<f64>,
    /// Per-item multiplier. Missing entries scale with footprint size.
    #[serde(default)]
    pub multipliers: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub indoor: bool,
    #[serde(default)]
    pub requires_storage: bool,
    pub groups: Vec<GroupStats>,
}

impl Building {
    /// Raw contribution of `group` to `stat` before the item multiplier.
    pub fn stat(&self, group: usize, stat: usize) -> f64 {
        self.groups
            .get(group)
            .and_then(|g| g.stats.get(stat))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn multiplier(&self, catalog: &Catalog, group: usize, item: usize) -> f64 {
        if let Some(m) = self
            .groups
            .get(group)
            .and_then(|g| g.multipliers.get(item))
        {
            return *m;
        }

        let items = match catalog.groups.get(group) {
            Some(g) => &g.items,
            None => return 1.0,
        };
        let smallest = items
            .iter()
            .map(|i| i.tile_count())
            .filter(|&c| c > 0)
            .min()
            .unwrap_or(1);
        items
            .get(item)
            .map(|i| i.tile_count() as f64 / smallest as f64)
            .unwrap_or(1.0)
    }

    pub fn validate(&self, catalog: &Catalog) -> Result<(), InputError> {
        if self.groups.len() != catalog.groups.len() {
            return Err(InputError::StatTableMismatch);
        }
        if self
            .groups
            .iter()
            .any(|g| g.stats.len() > catalog.stats.len())
        {
            return Err(InputError::StatTableMismatch);
        }
        Ok(())
    }
}

/// Reasons a planning request cannot be worked on. The planner answers all of
/// them by returning its input unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    MissingBuilding,
    MissingCatalog,
    EmptyRoom,
    GridSizeMismatch,
    EmptyGroup(usize),
    BadTileReference(usize),
    StatTableMismatch,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::MissingBuilding => write!(f, "no building descriptor"),
            InputError::MissingCatalog => write!(f, "no furniture catalog"),
            InputError::EmptyRoom => write!(f, "room has no tiles"),
            InputError::GridSizeMismatch => write!(f, "room grid does not match its dimensions"),
            InputError::EmptyGroup(g) => write!(f, "furniture group {} has no items", g),
            InputError::BadTileReference(g) => {
                write!(f, "furniture group {} references an unknown tile type", g)
            }
            InputError::StatTableMismatch => {
                write!(f, "building stat table does not match the catalog")
            }
        }
    }
}

impl std::error::Error for InputError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    #[test]
    fn blocking_predicate_unifies_impassable_variants() {
        assert!(!Availability::Room.is_blocking());
        assert!(!Availability::Avoid.is_blocking());
        assert!(Availability::Penetrable.is_blocking());
        assert!(Availability::Solid.is_blocking());
        assert!(Availability::NotAccessible.is_blocking());
    }

    #[test]
    fn default_multiplier_scales_with_tiles() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        // Benches: 1x2 and 1x3 variants.
        assert_eq!(building.multiplier(&catalog, 0, 0), 1.0);
        assert_eq!(building.multiplier(&catalog, 0, 1), 1.5);
    }

    #[test]
    fn primary_stat_prefers_services() {
        let catalog = workshop_catalog();
        assert_eq!(catalog.primary_stat(), Some(1));
    }

    #[test]
    fn validate_rejects_dangling_tiles() {
        let mut catalog = workshop_catalog();
        catalog.groups[0].items[0].tiles[0][0] = Some(99);
        assert_eq!(catalog.validate(), Err(InputError::BadTileReference(0)));
    }
}
