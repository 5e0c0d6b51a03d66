//! How well the room's outer edge is sealed.
//!
//! Every 4-edge between a room tile and a non-room tile is an exposed edge.
//! An edge against a wall is fully sealed, an edge against a door is mostly
//! sealed and an edge against the grid boundary is open.

use crate::constants::*;
use crate::grid::*;

/// Isolation with the current door set.
pub fn isolation_score(grid: &RoomGrid, doors: &TileSet) -> f64 {
    isolation_with(grid, |cell| doors.contains(cell))
}

/// Isolation as if `extra` were also a door.
pub fn isolation_with_door(grid: &RoomGrid, doors: &TileSet, extra: usize) -> f64 {
    isolation_with(grid, |cell| cell == extra || doors.contains(cell))
}

fn isolation_with(grid: &RoomGrid, is_door: impl Fn(usize) -> bool) -> f64 {
    let mut exposed = 0usize;
    let mut sealed = 0.0;

    for cell in grid.room_tiles() {
        for (dr, dc) in NEIGHBORS_4 {
            match grid.neighbor(cell, dr, dc) {
                Some(n) if grid.is_room(n) => {}
                Some(n) => {
                    exposed += 1;
                    sealed += if is_door(n) { DOOR_EDGE_SEAL } else { 1.0 };
                }
                None => exposed += 1,
            }
        }
    }

    if exposed == 0 {
        1.0
    } else {
        sealed / exposed as f64
    }
}

/// Number of exposed room edges. One door edge costs
/// `(1 - DOOR_EDGE_SEAL) / exposed_edges` of isolation.
pub fn exposed_edges(grid: &RoomGrid) -> usize {
    grid.room_tiles()
        .map(|cell| {
            NEIGHBORS_4
                .iter()
                .filter(|&&(dr, dc)| {
                    grid.neighbor(cell, dr, dc)
                        .map(|n| !grid.is_room(n))
                        .unwrap_or(true)
                })
                .count()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::room_from_ascii;

    fn walled() -> RoomGrid {
        room_from_ascii(&["#####", "#...#", "#...#", "#...#", "#####"])
    }

    #[test]
    fn sealed_room_is_fully_isolated() {
        let grid = walled();
        assert_eq!(isolation_score(&grid, &TileSet::new(grid.len())), 1.0);
    }

    #[test]
    fn one_door_costs_one_edge() {
        let grid = walled();
        let doors = TileSet::new(grid.len());
        let door = grid.index(0, 2);
        let with_door = isolation_with_door(&grid, &doors, door);
        let expected = 1.0 - (1.0 - DOOR_EDGE_SEAL) / exposed_edges(&grid) as f64;
        assert_eq!(exposed_edges(&grid), 12);
        assert!((with_door - expected).abs() < 1e-12);
    }

    #[test]
    fn grid_boundary_is_open() {
        let grid = RoomGrid::filled(2, 2);
        assert_eq!(isolation_score(&grid, &TileSet::new(4)), 0.0);
    }
}
