//! Small catalogs, buildings and room shapes for tests and benchmarks.

use crate::catalog::*;
use crate::constants::STORAGE_TILE_DATA;
use crate::grid::RoomGrid;

/// Parse a room from ASCII rows: `.` is a room tile, anything else is not.
pub fn room_from_ascii(rows: &[&str]) -> RoomGrid {
    let height = rows.len();
    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    let mut grid = RoomGrid::new(width, height);
    for (row, line) in rows.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            if ch == '.' {
                let index = grid.index(row, col);
                grid.set_room(index, true);
            }
        }
    }
    grid
}

fn tile(name: &str, availability: Availability, must_be_reachable: bool, data: u32) -> TileType {
    TileType {
        name: name.to_string(),
        availability,
        must_be_reachable,
        data,
    }
}

pub const FLOOR: usize = 0;
pub const BLOCK: usize = 1;
pub const STATION: usize = 2;
pub const CRATE: usize = 3;
pub const LAMP: usize = 4;

pub const BENCH: usize = 0;
pub const TOOLRACK: usize = 1;
pub const STORAGE: usize = 2;
pub const PLANT: usize = 3;

/// A workshop-style catalog: benches produce output, tool racks add
/// efficiency, storage is mandatory and plants raise a relative stat.
pub fn workshop_catalog() -> Catalog {
    Catalog {
        tile_types: vec![
            tile("floor", Availability::Room, false, 0),
            tile("block", Availability::Solid, false, 0),
            tile("station", Availability::Solid, true, 0),
            tile("crate", Availability::Solid, true, STORAGE_TILE_DATA),
            tile("lamp", Availability::Penetrable, false, 0),
        ],
        groups: vec![
            Group {
                name: "bench".to_string(),
                rotation: RotationClass::FourWay,
                min: None,
                max: None,
                items: vec![
                    Item {
                        tiles: vec![vec![Some(STATION), Some(BLOCK)]],
                    },
                    Item {
                        tiles: vec![vec![Some(STATION), Some(BLOCK), Some(BLOCK)]],
                    },
                ],
            },
            Group {
                name: "toolrack".to_string(),
                rotation: RotationClass::TwoWay,
                min: None,
                max: Some(4),
                items: vec![Item {
                    tiles: vec![vec![Some(BLOCK)]],
                }],
            },
            Group {
                name: "storage".to_string(),
                rotation: RotationClass::None,
                min: Some(1),
                max: Some(2),
                items: vec![Item {
                    tiles: vec![vec![Some(CRATE)]],
                }],
            },
            Group {
                name: "plant".to_string(),
                rotation: RotationClass::None,
                min: None,
                max: Some(6),
                items: vec![Item {
                    tiles: vec![vec![Some(LAMP)]],
                }],
            },
        ],
        stats: vec![
            StatDef {
                name: "workers".to_string(),
                kind: StatKind::Employees,
            },
            StatDef {
                name: "output".to_string(),
                kind: StatKind::Services,
            },
            StatDef {
                name: "tools".to_string(),
                kind: StatKind::Efficiency,
            },
            StatDef {
                name: "comfort".to_string(),
                kind: StatKind::Relative,
            },
        ],
    }
}

pub fn workshop_building() -> Building {
    Building {
        id: "workshop".to_string(),
        indoor: true,
        requires_storage: true,
        groups: vec![
            GroupStats {
                stats: vec![1.0, 1.0, 0.0, 0.0],
                multipliers: Vec::new(),
            },
            GroupStats {
                stats: vec![0.0, 0.0, 0.25, 0.0],
                multipliers: Vec::new(),
            },
            GroupStats::default(),
            GroupStats {
                stats: vec![0.0, 0.0, 0.0, 2.0],
                multipliers: Vec::new(),
            },
        ],
    }
}

/// One group holding a single 1x1 blocking item that must appear exactly once.
pub fn single_blocker_catalog() -> Catalog {
    Catalog {
        tile_types: vec![tile("block", Availability::Solid, false, 0)],
        groups: vec![Group {
            name: "pillar".to_string(),
            rotation: RotationClass::None,
            min: Some(1),
            max: Some(1),
            items: vec![Item {
                tiles: vec![vec![Some(0)]],
            }],
        }],
        stats: Vec::new(),
    }
}

pub fn single_blocker_building(indoor: bool) -> Building {
    Building {
        id: "pillar-room".to_string(),
        indoor,
        requires_storage: false,
        groups: vec![GroupStats::default()],
    }
}

/// One group holding a single 1x1 must-reach tile.
pub fn must_reach_catalog() -> Catalog {
    Catalog {
        tile_types: vec![tile("altar", Availability::Solid, true, 0)],
        groups: vec![Group {
            name: "altar".to_string(),
            rotation: RotationClass::None,
            min: None,
            max: None,
            items: vec![Item {
                tiles: vec![vec![Some(0)]],
            }],
        }],
        stats: vec![StatDef {
            name: "worship".to_string(),
            kind: StatKind::Services,
        }],
    }
}

pub fn must_reach_building() -> Building {
    Building {
        id: "shrine".to_string(),
        indoor: false,
        requires_storage: false,
        groups: vec![GroupStats {
            stats: vec![1.0],
            multipliers: Vec::new(),
        }],
    }
}
