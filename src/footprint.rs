//! Rotated tile cache. Every (group, item, rotation) footprint is resolved
//! once per run into flat offset lists so the validator and scorers never
//! touch the catalog's nested grids in a hot loop.

use crate::catalog::*;
use bitflags::*;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TileFlags: u8 {
        const NONE = 0;
        const BLOCKING = 1;
        const MUST_REACH = 2;
        const STORAGE = 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FootprintTile {
    pub dr: usize,
    pub dc: usize,
    pub flags: TileFlags,
}

impl FootprintTile {
    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.flags.contains(TileFlags::BLOCKING)
    }

    #[inline]
    pub fn is_must_reach(&self) -> bool {
        self.flags.contains(TileFlags::MUST_REACH)
    }
}

/// One item in one rotation, anchored at the top-left of its bounding box.
#[derive(Clone, Debug)]
pub struct Footprint {
    pub height: usize,
    pub width: usize,
    pub tiles: Vec<FootprintTile>,
    pub blocking: usize,
    pub must_reach: usize,
    pub storage: usize,
}

impl Footprint {
    pub fn new(item: &Item, rotation: u8, catalog: &Catalog) -> Footprint {
        let cells = rotate_cells(item, rotation);
        let (height, width) = if rotation % 2 == 0 {
            (item.height(), item.width())
        } else {
            (item.width(), item.height())
        };

        let mut tiles = Vec::with_capacity(cells.len());
        for (dr, dc, tile_type) in cells {
            let mut flags = TileFlags::NONE;
            if let Some(tt) = catalog.tile_types.get(tile_type) {
                if tt.is_blocking() {
                    flags |= TileFlags::BLOCKING;
                }
                if tt.must_be_reachable {
                    flags |= TileFlags::MUST_REACH;
                }
                if tt.is_storage() {
                    flags |= TileFlags::STORAGE;
                }
            }
            tiles.push(FootprintTile { dr, dc, flags });
        }
        tiles.sort_by_key(|t| (t.dr, t.dc));

        let count = |flag: TileFlags| tiles.iter().filter(|t| t.flags.contains(flag)).count();
        let blocking = count(TileFlags::BLOCKING);
        let must_reach = count(TileFlags::MUST_REACH);
        let storage = count(TileFlags::STORAGE);

        Footprint {
            height,
            width,
            tiles,
            blocking,
            must_reach,
            storage,
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn has_blocking(&self) -> bool {
        self.blocking > 0
    }

    /// Footprint tile at a local offset, if any.
    pub fn tile_at(&self, dr: usize, dc: usize) -> Option<&FootprintTile> {
        self.tiles
            .binary_search_by_key(&(dr, dc), |t| (t.dr, t.dc))
            .ok()
            .map(|i| &self.tiles[i])
    }
}

/// Rotate the non-null cells of an item `rotation` quarter turns clockwise.
fn rotate_cells(item: &Item, rotation: u8) -> Vec<(usize, usize, usize)> {
    let mut height = item.height();
    let mut width = item.width();
    let mut cells: Vec<(usize, usize, usize)> = item
        .tiles
        .iter()
        .enumerate()
        .flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter_map(move |(c, t)| t.map(|t| (r, c, t)))
        })
        .collect();

    for _ in 0..(rotation % 4) {
        for cell in cells.iter_mut() {
            let (r, c, t) = *cell;
            *cell = (c, height - 1 - r, t);
        }
        std::mem::swap(&mut height, &mut width);
    }

    cells
}

/// Footprints for every group, item and rotation of a catalog.
pub struct FootprintCache {
    entries: Vec<Vec<[Footprint; 4]>>,
}

impl FootprintCache {
    pub fn new(catalog: &Catalog) -> FootprintCache {
        let entries = catalog
            .groups
            .iter()
            .map(|group| {
                group
                    .items
                    .iter()
                    .map(|item| {
                        [
                            Footprint::new(item, 0, catalog),
                            Footprint::new(item, 1, catalog),
                            Footprint::new(item, 2, catalog),
                            Footprint::new(item, 3, catalog),
                        ]
                    })
                    .collect()
            })
            .collect();

        FootprintCache { entries }
    }

    #[inline]
    pub fn get(&self, group: usize, item: usize, rotation: u8) -> &Footprint {
        &self.entries[group][item][(rotation % 4) as usize]
    }
}
