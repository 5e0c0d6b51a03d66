//! Edge trimming: drop free room tiles that only leave thin wall stubs.

use crate::context::Context;
use crate::finish::doors::doors_within_floor;
use crate::grid::*;
use crate::oracles::is_walkable;
use log::*;

/// Room 4-neighbors of a cell, counting the grid edge as not room.
fn room_neighbors(grid: &RoomGrid, cell: usize) -> usize {
    grid.neighbors4(cell).filter(|&n| grid.is_room(n)).count()
}

/// A non-room cell poking into the room (three or more room neighbors).
fn is_thin(grid: &RoomGrid, cell: usize) -> bool {
    !grid.is_room(cell) && room_neighbors(grid, cell) >= 3
}

/// Thin cells removing `cell` would resolve, minus one if `cell` itself
/// would become thin.
pub fn trim_gain(grid: &RoomGrid, cell: usize) -> i32 {
    let resolved = grid
        .neighbors4(cell)
        .filter(|&n| is_thin(grid, n) && room_neighbors(grid, n) == 3)
        .count() as i32;
    // After removal `cell` has the same room neighbors it has now.
    let becomes_thin = room_neighbors(grid, cell) >= 3;
    resolved - becomes_thin as i32
}

/// Remove free, unreserved room tiles with positive trim gain, best first,
/// keeping the room connected and walkable. Doors must stay above the
/// isolation floor. Returns the tiles removed.
pub fn trim_room(ctx: &mut Context) -> usize {
    let started = ctx.trace_start();
    let mut removed = 0;

    for _ in 0..ctx.config().max_trim_passes {
        if !ctx.checkpoint() {
            break;
        }

        let grid = ctx.grid();
        let mut candidates: Vec<(usize, i32)> = grid
            .room_tiles()
            .filter(|&cell| ctx.is_free(cell) && !ctx.reserved().contains(cell))
            .map(|cell| (cell, trim_gain(grid, cell)))
            .filter(|&(_, gain)| gain > 0)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut pass = 0;
        for (cell, _) in candidates {
            // Earlier removals in this pass may have changed the gain.
            if trim_gain(ctx.grid(), cell) <= 0 || !ctx.remove_room_tile(cell) {
                continue;
            }
            if ctx.room_count() > 0
                && check_room_connectivity(ctx.grid())
                && is_walkable(ctx)
                && doors_within_floor(ctx)
            {
                pass += 1;
            } else {
                ctx.restore_room_tile(cell);
            }
        }

        removed += pass;
        if pass == 0 {
            break;
        }
    }

    if removed > 0 {
        debug!("Trimmed {} room tiles", removed);
    }
    ctx.trace_finish("trim", started);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;

    #[test]
    fn notch_is_filled() {
        let grid = room_from_ascii(&[
            "#######",
            "#..#..#",
            "#.....#",
            "#.....#",
            "#######",
        ]);
        // The stub at (1,3) has three room neighbors.
        assert!(is_thin(&grid, grid.index(1, 3)));
        assert_eq!(trim_gain(&grid, grid.index(1, 2)), 1);
        // An open-field tile only creates a stub.
        assert_eq!(trim_gain(&grid, grid.index(2, 2)), -1);
    }

    #[test]
    fn trimming_keeps_room_connected() {
        let catalog = single_blocker_catalog();
        let building = single_blocker_building(true);
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&[
            "#######",
            "#..#..#",
            "#.....#",
            "#.....#",
            "#######",
        ]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        let before = ctx.room_count();
        let removed = trim_room(&mut ctx);
        assert_eq!(removed, 1);
        assert_eq!(ctx.room_count(), before - 1);
        assert!(!is_thin(ctx.grid(), ctx.grid().index(1, 3)));
        assert!(check_room_connectivity(ctx.grid()));
        assert!(is_walkable(&ctx));
    }
}
