//! Shared position scoring and best-position search.
//!
//! Every greedy pass ranks legal positions the same way: item value density
//! dominates, then a handful of shape bonuses pull pieces against walls, into
//! corners and next to other furniture, and reward pieces that face each
//! other across a one-tile aisle.

use crate::constants::*;
use crate::context::Context;
use crate::footprint::Footprint;
use crate::grid::*;
use crate::plan::Placement;
use crate::stats::item_density;
use log::*;

const DENSITY_WEIGHT: f64 = 10.0;
const WALL_BONUS: f64 = 0.3;
const CORNER_BONUS: f64 = 0.5;
const FURNITURE_BONUS: f64 = 0.15;
const BLOCKER_FACING_WALL_BONUS: f64 = 0.2;
const SHARED_AISLE_BONUS: f64 = 0.4;

/// Restrictions on where a search may put the anchor.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScanOptions<'s> {
    /// Scan anchors bottom-right first.
    pub reverse: bool,
    /// Only anchors within Chebyshev `radius` of `(row, col)`.
    pub window: Option<(usize, usize, i32)>,
    /// Anchor cells a pass has set aside.
    pub excluded: Option<&'s TileSet>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub placement: Placement,
    pub score: f64,
}

fn covers(fp: &Footprint, placement: &Placement, row: i32, col: i32) -> bool {
    let dr = row - placement.row as i32;
    let dc = col - placement.col as i32;
    dr >= 0 && dc >= 0 && fp.tile_at(dr as usize, dc as usize).is_some()
}

/// Heuristic desirability of a (legal) position.
pub fn position_score(ctx: &Context, placement: &Placement, density: f64) -> f64 {
    let grid = ctx.grid();
    let fp = ctx.footprint_of(placement);
    let mut score = density * DENSITY_WEIGHT;
    let mut vertical_wall = false;
    let mut horizontal_wall = false;

    for tile in &fp.tiles {
        let cell = match ctx.cell_of(placement, tile) {
            Some(cell) => cell,
            None => continue,
        };
        let (row, col) = grid.coords(cell);

        for (dr, dc) in NEIGHBORS_4 {
            let (nr, nc) = (row as i32 + dr, col as i32 + dc);
            if !grid.is_room_at(nr, nc) {
                score += WALL_BONUS;
                if tile.is_blocking() {
                    score += BLOCKER_FACING_WALL_BONUS;
                }
                if dr != 0 {
                    horizontal_wall = true;
                } else {
                    vertical_wall = true;
                }
                continue;
            }

            let n = grid.index(nr as usize, nc as usize);
            if covers(fp, placement, nr, nc) {
                continue;
            }
            if ctx.owner(n).is_some() {
                score += FURNITURE_BONUS;
            }

            // Must-reach tiles facing another must-reach tile across one aisle tile.
            if tile.is_must_reach() && ctx.is_open(n) {
                let (fr, fc) = (nr + dr, nc + dc);
                if grid.is_room_at(fr, fc) && ctx.is_must_reach(grid.index(fr as usize, fc as usize)) {
                    score += SHARED_AISLE_BONUS;
                }
            }
        }
    }

    if vertical_wall && horizontal_wall {
        score += CORNER_BONUS;
    }
    score
}

/// Anchor rows and columns a footprint of the given size can take.
fn anchor_range(ctx: &Context, height: usize, width: usize, options: &ScanOptions) -> (Vec<usize>, Vec<usize>) {
    let grid = ctx.grid();
    if height > grid.height() || width > grid.width() {
        return (Vec::new(), Vec::new());
    }
    let (mut rows, mut cols): (Vec<usize>, Vec<usize>) = match options.window {
        Some((row, col, radius)) => {
            let lo = |v: usize| (v as i32 - radius).max(0) as usize;
            (
                (lo(row)..=(row + radius as usize).min(grid.height() - height)).collect(),
                (lo(col)..=(col + radius as usize).min(grid.width() - width)).collect(),
            )
        }
        None => ((0..=grid.height() - height).collect(), (0..=grid.width() - width).collect()),
    };
    if options.reverse {
        rows.reverse();
        cols.reverse();
    }
    (rows, cols)
}

/// Every position of `item` (any allowed rotation) that passes the local
/// checks, scored.
pub fn scored_positions(ctx: &Context, group: usize, item: usize, options: &ScanOptions) -> Vec<Candidate> {
    let catalog = ctx.catalog();
    let density = item_density(catalog, ctx.building(), group, item);
    let mut out = Vec::new();

    for &rotation in catalog.groups[group].rotation.rotations() {
        let fp = ctx.footprint(group, item, rotation);
        let first = match fp.tiles.first() {
            Some(t) => *t,
            None => continue,
        };
        let (rows, cols) = anchor_range(ctx, fp.height, fp.width, options);
        for &row in &rows {
            for &col in &cols {
                let anchor_cell = ctx.grid().index(row + first.dr, col + first.dc);
                if !ctx.is_free(anchor_cell) {
                    continue;
                }
                if options.excluded.map(|e| e.contains(anchor_cell)).unwrap_or(false) {
                    continue;
                }
                let placement = Placement::new(group, item, rotation, row, col);
                if ctx.check_placement_local(&placement, None).is_ok() {
                    out.push(Candidate {
                        placement,
                        score: position_score(ctx, &placement, density),
                    });
                }
            }
        }
    }

    out
}

/// Highest-scoring fully legal candidate among `candidates`. Every candidate
/// is tried before giving up.
pub fn best_valid(ctx: &Context, mut candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let total = candidates.len();
    for (attempt, candidate) in candidates.into_iter().enumerate() {
        if attempt == MAX_VALIDATION_ATTEMPTS {
            debug!("Top {} candidates rejected; scanning the other {}", attempt, total - attempt);
        }
        match ctx.check_placement(&candidate.placement, None) {
            Ok(()) => return Some(candidate),
            Err(reason) => trace!("Candidate {:?} rejected: {:?}", candidate.placement, reason),
        }
    }
    None
}

/// Best legal position for one item.
pub fn find_best_position(ctx: &Context, group: usize, item: usize, options: &ScanOptions) -> Option<Candidate> {
    if !ctx.group_has_capacity(group) {
        return None;
    }
    best_valid(ctx, scored_positions(ctx, group, item, options))
}

/// Best legal position over several items at once.
pub fn find_best_among(ctx: &Context, group: usize, items: &[usize], options: &ScanOptions) -> Option<Candidate> {
    if !ctx.group_has_capacity(group) {
        return None;
    }
    let candidates = items
        .iter()
        .flat_map(|&item| scored_positions(ctx, group, item, options))
        .collect();
    best_valid(ctx, candidates)
}

/// Find and commit the best position for one item.
pub fn place_best(ctx: &mut Context, group: usize, item: usize, options: &ScanOptions) -> Option<Placement> {
    let candidate = find_best_position(ctx, group, item, options)?;
    if ctx.add_placement(candidate.placement) {
        Some(candidate.placement)
    } else {
        None
    }
}
