//! Structural support for indoor rooms.
//!
//! A room tile is held up by nearby non-room tiles. Support is summed over a
//! fixed set of rays cast from the tile; each ray contributes through the
//! first non-room tile it meets, weighted by how close that tile is. Tiles
//! below the threshold need a support pillar: a room tile turned back into
//! solid ground somewhere close by.

use crate::constants::*;
use crate::context::Context;
use crate::finish::doors::doors_within_floor;
use crate::grid::*;
use crate::oracles::walkability::is_walkable;
use log::*;

/// Ray end points: the midpoints of the eight half-edges of the square of
/// radius `SUPPORT_RAY_RADIUS`.
fn ray_targets() -> [(i32, i32); 8] {
    let r = SUPPORT_RAY_RADIUS;
    let h = r / 2;
    [
        (-r, -h),
        (-r, h),
        (-h, r),
        (h, r),
        (r, h),
        (r, -h),
        (h, -r),
        (-h, -r),
    ]
}

/// DDA rasterization of a ray from the origin, origin excluded.
fn rasterize(target: (i32, i32)) -> Vec<(i32, i32)> {
    let steps = target.0.abs().max(target.1.abs());
    let mut cells: Vec<(i32, i32)> = Vec::with_capacity(steps as usize);
    for k in 1..=steps {
        let t = k as f64 / steps as f64;
        let cell = (
            (target.0 as f64 * t).round() as i32,
            (target.1 as f64 * t).round() as i32,
        );
        if cells.last() != Some(&cell) {
            cells.push(cell);
        }
    }
    cells
}

/// Precomputed support rays.
pub struct SupportRays {
    rays: Vec<Vec<(i32, i32)>>,
}

impl Default for SupportRays {
    fn default() -> Self {
        SupportRays::new()
    }
}

impl SupportRays {
    pub fn new() -> SupportRays {
        SupportRays {
            rays: ray_targets().iter().map(|&t| rasterize(t)).collect(),
        }
    }

    pub fn rays(&self) -> &[Vec<(i32, i32)>] {
        &self.rays
    }

    /// Support value of one tile.
    pub fn support(&self, grid: &RoomGrid, cell: usize) -> f64 {
        let (row, col) = grid.coords(cell);
        let (row, col) = (row as i32, col as i32);
        self.rays
            .iter()
            .map(|ray| {
                ray.iter()
                    .position(|&(dr, dc)| !grid.is_room_at(row + dr, col + dc))
                    .map(|index| ((SUPPORT_FALLOFF - index as f64) / SUPPORT_FALLOFF).max(0.0))
                    .unwrap_or(0.0)
            })
            .sum()
    }

    #[inline]
    pub fn is_supported(&self, grid: &RoomGrid, cell: usize) -> bool {
        self.support(grid, cell) >= 1.0 - STABILITY_EPSILON
    }

    /// Support of every tile; non-room tiles read as 0.
    pub fn support_map(&self, grid: &RoomGrid) -> GridArray<f64> {
        let mut map = GridArray::new(grid.width(), grid.height(), 0.0);
        for cell in grid.room_tiles() {
            map.set(cell, self.support(grid, cell));
        }
        map
    }

    pub fn unstable_tiles(&self, grid: &RoomGrid) -> Vec<usize> {
        grid.room_tiles()
            .filter(|&cell| !self.is_supported(grid, cell))
            .collect()
    }

    /// Unstable room tiles within Chebyshev `radius` of `center`.
    fn unstable_near(&self, grid: &RoomGrid, center: usize, radius: i32) -> usize {
        let (row, col) = grid.coords(center);
        let mut count = 0;
        for dr in -radius..=radius {
            for dc in -radius..=radius {
                let (r, c) = (row as i32 + dr, col as i32 + dc);
                if grid.is_room_at(r, c) {
                    let cell = grid.index(r as usize, c as usize);
                    if !self.is_supported(grid, cell) {
                        count += 1;
                    }
                }
            }
        }
        count
    }
}

pub fn is_stable(grid: &RoomGrid) -> bool {
    SupportRays::new().unstable_tiles(grid).is_empty()
}

/// Turn free room tiles near the weakest tile into pillars until every room
/// tile is supported or no removal helps. Returns the pillars placed.
pub fn place_support_pillars(ctx: &mut Context) -> usize {
    let rays = SupportRays::new();
    let mut placed = 0;
    let passes = pillar_passes(ctx);

    for _ in 0..passes {
        if !ctx.checkpoint() {
            break;
        }

        let grid = ctx.grid().clone();
        let unstable = rays.unstable_tiles(&grid);
        let weakest = match unstable.iter().copied().min_by(|&a, &b| {
            rays.support(&grid, a)
                .partial_cmp(&rays.support(&grid, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }) {
            Some(cell) => cell,
            None => break,
        };

        let mut candidates = pillar_candidates(ctx, &rays, &grid, weakest);
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut committed = false;
        for (cell, cured) in candidates {
            if cured == 0 {
                break;
            }
            if !ctx.remove_room_tile(cell) {
                continue;
            }
            if check_room_connectivity(ctx.grid()) && is_walkable(ctx) && doors_within_floor(ctx) {
                trace!("Pillar at {:?} cures {} tiles", ctx.grid().location(cell), cured);
                placed += 1;
                committed = true;
                break;
            }
            ctx.restore_room_tile(cell);
        }

        if !committed {
            debug!("No pillar improves stability; {} unstable tiles remain", unstable.len());
            break;
        }
    }

    placed
}

/// Pass bound for the pillar loop, growing with the room's area.
fn pillar_passes(ctx: &Context) -> usize {
    ctx.config()
        .max_pillar_iterations
        .max(ctx.room_count() / TILES_PER_PILLAR_PASS)
}

/// Free, unreserved room tiles near `weakest`, with the number of unstable
/// tiles their removal would cure.
fn pillar_candidates(
    ctx: &Context,
    rays: &SupportRays,
    grid: &RoomGrid,
    weakest: usize,
) -> Vec<(usize, usize)> {
    let (row, col) = grid.coords(weakest);
    let mut trial = grid.clone();
    let mut candidates = Vec::new();

    for dr in -PILLAR_SEARCH_RADIUS..=PILLAR_SEARCH_RADIUS {
        for dc in -PILLAR_SEARCH_RADIUS..=PILLAR_SEARCH_RADIUS {
            let (r, c) = (row as i32 + dr, col as i32 + dc);
            if !grid.is_room_at(r, c) {
                continue;
            }
            let cell = grid.index(r as usize, c as usize);
            if !ctx.is_free(cell) || ctx.reserved().contains(cell) {
                continue;
            }

            let before = rays.unstable_near(grid, cell, SUPPORT_RAY_RADIUS);
            trial.set_room(cell, false);
            let after = rays.unstable_near(&trial, cell, SUPPORT_RAY_RADIUS);
            trial.set_room(cell, true);

            candidates.push((cell, before.saturating_sub(after)));
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;

    #[test]
    fn rays_start_after_origin() {
        let rays = SupportRays::new();
        assert_eq!(rays.rays().len(), 8);
        for ray in rays.rays() {
            assert_eq!(ray.len(), 4);
            assert_ne!(ray[0], (0, 0));
        }
    }

    #[test]
    fn tile_against_wall_is_supported() {
        let grid = room_from_ascii(&["#####", "#...#", "#####"]);
        let rays = SupportRays::new();
        // Every ray from (1,2) leaves the room on its first step.
        assert!((rays.support(&grid, grid.index(1, 2)) - 8.0).abs() < 1e-9);
        assert!(is_stable(&grid));
    }

    #[test]
    fn open_hall_needs_pillars() {
        let grid = RoomGrid::filled(15, 15);
        let rays = SupportRays::new();
        let center = grid.index(7, 7);
        assert_eq!(rays.support(&grid, center), 0.0);
        assert!(!is_stable(&grid));
    }

    #[test]
    fn pillars_stabilize_hall() {
        let catalog = single_blocker_catalog();
        let building = single_blocker_building(true);
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(11, 11), &[], &[], 1, false);

        let placed = place_support_pillars(&mut ctx);
        assert!(placed > 0);
        assert!(is_stable(ctx.grid()));
        assert!(check_room_connectivity(ctx.grid()));
        assert_eq!(ctx.room_count(), 121 - placed);
    }

    #[test]
    fn large_hall_is_fully_supported() {
        let catalog = single_blocker_catalog();
        let building = single_blocker_building(true);
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(30, 30), &[], &[], 1, false);
        assert!(pillar_passes(&ctx) > MAX_PILLAR_ITERATIONS);

        let placed = place_support_pillars(&mut ctx);
        assert!(placed > MAX_PILLAR_ITERATIONS);
        assert!(is_stable(ctx.grid()));
        assert!(check_room_connectivity(ctx.grid()));
        assert!(is_walkable(&ctx));
    }
}
