//! Production strips.
//!
//! Primary-stat items are profiled per rotation to find the smallest
//! repeating unit ("pitch") that keeps every must-reach tile served:
//!
//! * Self-corridored and blocker-only items stack with no extra rows.
//! * Items with must-reach tiles on one edge pair up back to back with a
//!   half-turned copy, sharing one corridor row (period `1 + 2h`).
//! * Items with must-reach tiles on both edges take a corridor row per unit
//!   (period `h + 1`).
//! * Items with must-reach tiles only on their sides stack with a one-column
//!   gap between neighbors.
//!
//! The densest candidates are then stamped across the largest free
//! rectangle, in both strip orientations, and the variant with the highest
//! primary stat wins.

use super::Strategy;
use crate::context::{Context, LightSnapshot};
use crate::footprint::Footprint;
use crate::grid::*;
use crate::plan::Placement;
use crate::stats::*;
use itertools::Itertools;
use log::*;

/// Which footprint edges carry must-reach tiles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeMask {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileProfile {
    pub tiles: usize,
    pub blocking: usize,
    pub must_reach: usize,
    pub edges: EdgeMask,
    /// The footprint carries its own walkable tile on an edge.
    pub self_gap: bool,
}

impl TileProfile {
    pub fn new(fp: &Footprint) -> TileProfile {
        let mut edges = EdgeMask::default();
        let mut self_gap = false;
        for tile in &fp.tiles {
            let on_edge = tile.dr == 0 || tile.dc == 0 || tile.dr + 1 == fp.height || tile.dc + 1 == fp.width;
            if !tile.is_blocking() && on_edge {
                self_gap = true;
            }
            if tile.is_must_reach() {
                edges.top |= tile.dr == 0;
                edges.bottom |= tile.dr + 1 == fp.height;
                edges.left |= tile.dc == 0;
                edges.right |= tile.dc + 1 == fp.width;
            }
        }
        TileProfile {
            tiles: fp.tile_count(),
            blocking: fp.blocking,
            must_reach: fp.must_reach,
            edges,
            self_gap,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    /// Strips run along rows; the pitch repeats down the columns.
    Horizontal,
    Vertical,
}

/// Repeat unit along the pitch axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pitch {
    Stacked,
    /// Back to back with a half-turned copy around a shared corridor.
    Mirrored { facing_low: bool },
    /// One corridor row per unit, on the low side when `corridor_first`.
    Corridor { corridor_first: bool },
    /// Stacked, with a gap column between neighbors.
    SideGap,
}

/// Classify the repeat unit for one orientation. `low`/`high` are the edges
/// across the pitch axis, `sides` the edges along it.
pub fn classify(profile: &TileProfile, orientation: Orientation, can_mirror: bool) -> Pitch {
    if profile.must_reach == 0 || profile.self_gap {
        return Pitch::Stacked;
    }
    let e = profile.edges;
    let (low, high, sides) = match orientation {
        Orientation::Horizontal => (e.top, e.bottom, e.left || e.right),
        Orientation::Vertical => (e.left, e.right, e.top || e.bottom),
    };
    match (low, high) {
        (true, true) => Pitch::Corridor {
            corridor_first: true,
        },
        (true, false) | (false, true) if can_mirror => Pitch::Mirrored { facing_low: low },
        (true, false) => Pitch::Corridor {
            corridor_first: true,
        },
        (false, true) => Pitch::Corridor {
            corridor_first: false,
        },
        (false, false) if sides => Pitch::SideGap,
        (false, false) => Pitch::Corridor {
            corridor_first: true,
        },
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct StripCandidate {
    group: usize,
    item: usize,
    rotation: u8,
    density: f64,
}

/// Candidate triples for the primary groups, densest first.
fn strip_candidates(ctx: &Context) -> Vec<StripCandidate> {
    let catalog = ctx.catalog();
    let building = ctx.building();
    (0..catalog.groups.len())
        .filter(|&g| group_role(catalog, building, g) == GroupRole::Primary)
        .flat_map(|group| {
            let rotations = catalog.groups[group].rotation.rotations();
            (0..catalog.groups[group].items.len()).flat_map(move |item| {
                rotations.iter().map(move |&rotation| (group, item, rotation))
            })
        })
        .map(|(group, item, rotation)| StripCandidate {
            group,
            item,
            rotation,
            density: item_density(catalog, building, group, item),
        })
        .sorted_by(|a, b| b.density.partial_cmp(&a.density).unwrap_or(std::cmp::Ordering::Equal))
        .take(ctx.config().strip_candidates)
        .collect()
}

/// Lanes of one strip pattern: (offset along the pitch axis, rotation).
fn lanes(pitch: Pitch, rotation: u8, extent: usize, length: usize) -> Vec<(usize, u8)> {
    let half_turn = (rotation + 2) % 4;
    let mut lanes = Vec::new();
    match pitch {
        Pitch::Stacked | Pitch::SideGap => {
            let mut offset = 0;
            while offset + extent <= length {
                lanes.push((offset, rotation));
                offset += extent;
            }
        }
        Pitch::Mirrored { facing_low } => {
            // The first lane faces the corridor below it, the second the one above.
            let (first, second) = if facing_low {
                (half_turn, rotation)
            } else {
                (rotation, half_turn)
            };
            let mut offset = 0;
            while offset + extent <= length {
                lanes.push((offset, first));
                let next = offset + extent + 1;
                if next + extent <= length {
                    lanes.push((next, second));
                }
                offset += 2 * extent + 1;
            }
        }
        Pitch::Corridor { corridor_first } => {
            let mut offset = if corridor_first { 1 } else { 0 };
            while offset + extent <= length {
                lanes.push((offset, rotation));
                offset += extent + 1;
            }
        }
    }
    lanes
}

/// Stamp one strip pattern into `rect`. Returns the placements committed.
fn fill_rect(ctx: &mut Context, candidate: &StripCandidate, orientation: Orientation, rect: Rect) -> usize {
    let catalog = ctx.catalog();
    let group_rotation = catalog.groups[candidate.group].rotation;
    let fp = ctx.footprint(candidate.group, candidate.item, candidate.rotation);
    let profile = TileProfile::new(fp);
    let can_mirror = group_rotation.allows((candidate.rotation + 2) % 4);
    let pitch = classify(&profile, orientation, can_mirror);

    let (extent, across, length, breadth) = match orientation {
        Orientation::Horizontal => (fp.height, fp.width, rect.height, rect.width),
        Orientation::Vertical => (fp.width, fp.height, rect.width, rect.height),
    };
    let step = if pitch == Pitch::SideGap { across + 1 } else { across };

    let mut placed = 0;
    for (offset, rotation) in lanes(pitch, candidate.rotation, extent, length) {
        let mut along = 0;
        while along + across <= breadth {
            if !ctx.checkpoint() || !ctx.group_has_capacity(candidate.group) {
                return placed;
            }
            let (row, col) = match orientation {
                Orientation::Horizontal => (rect.row + offset, rect.col + along),
                Orientation::Vertical => (rect.row + along, rect.col + offset),
            };
            if ctx.try_place(Placement::new(candidate.group, candidate.item, rotation, row, col)) {
                placed += 1;
            }
            along += step;
        }
    }

    trace!(
        "Strip {:?} {:?} item {}/{} rot {}: {} placed",
        orientation,
        pitch,
        candidate.group,
        candidate.item,
        candidate.rotation,
        placed
    );
    placed
}

/// Largest all-free, unreserved rectangle of room tiles.
pub fn largest_free_rect(ctx: &Context) -> Option<Rect> {
    let grid = ctx.grid();
    largest_rectangle(grid.width(), grid.height(), |r, c| {
        let cell = grid.index(r, c);
        ctx.is_free(cell) && !ctx.reserved().contains(cell)
    })
}

pub struct StripStrategy;

impl Strategy for StripStrategy {
    fn name(&self) -> &str {
        "strip"
    }

    fn is_applicable(&self, ctx: &Context) -> bool {
        !strip_candidates(ctx).is_empty()
    }

    fn run(&self, ctx: &mut Context) {
        let rect = match largest_free_rect(ctx) {
            Some(rect) => rect,
            None => return,
        };
        let initial = ctx.snapshot_light();
        let mut best: Option<(f64, f64, LightSnapshot)> = None;

        for candidate in strip_candidates(ctx) {
            for orientation in [Orientation::Horizontal, Orientation::Vertical] {
                if !ctx.checkpoint() {
                    break;
                }
                ctx.restore_light(&initial);
                fill_rect(ctx, &candidate, orientation, rect);
                let score = score_layout(ctx);
                let better = best
                    .as_ref()
                    .map(|(primary, total, _)| (score.primary, score.total) > (*primary, *total))
                    .unwrap_or(true);
                if better {
                    best = Some((score.primary, score.total, ctx.snapshot_light()));
                }
            }
        }

        match best {
            Some((primary, _, snapshot)) => {
                ctx.restore_light(&snapshot);
                debug!("strip: primary {:.2} in {}x{} rectangle", primary, rect.height, rect.width);
            }
            None => {
                ctx.restore_light(&initial);
            }
        }
    }
}
