//! Door placement for indoor rooms.
//!
//! A door site is a non-room tile that closes a straight passage: a room tile
//! on one side, a wall or the grid edge on the other, and no room tile to
//! either side of that axis. Doors are added greedily. The first one serves
//! the storage tiles (or, with no storage, the must-reach tiles); later ones
//! must cut the average walk to the must-reach tiles by at least
//! `MIN_DOOR_GAIN`. No door may push isolation under the configured floor,
//! so a room already leaking through the grid edge gets none.

use crate::constants::*;
use crate::context::Context;
use crate::footprint::TileFlags;
use crate::grid::*;
use crate::oracles::isolation::*;
use crate::stats::item_value;
use fnv::FnvHashMap;
use log::*;
use pathfinding::directed::dijkstra::dijkstra_all;

/// A geometrically valid door tile and the room tile it opens onto.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DoorSite {
    pub door: usize,
    pub inner: usize,
}

/// The room tile `cell` would open onto as a door, if it is a valid site.
pub fn door_site(grid: &RoomGrid, doors: &TileSet, cell: usize) -> Option<DoorSite> {
    if grid.is_room(cell) || doors.contains(cell) {
        return None;
    }

    let room = |n: Option<usize>| n.map(|n| grid.is_room(n)).unwrap_or(false);

    for (dr, dc) in NEIGHBORS_4 {
        let inner = match grid.neighbor(cell, dr, dc) {
            Some(n) if grid.is_room(n) => n,
            _ => continue,
        };
        let outer = grid.neighbor(cell, -dr, -dc);
        let outer_ok = outer.map(|n| !grid.is_room(n) && !doors.contains(n)).unwrap_or(true);
        if !outer_ok {
            continue;
        }
        if room(grid.neighbor(cell, dc, dr)) || room(grid.neighbor(cell, -dc, -dr)) {
            continue;
        }
        return Some(DoorSite { door: cell, inner });
    }

    None
}

/// Every valid door site in the room.
pub fn door_sites(ctx: &Context) -> Vec<DoorSite> {
    let grid = ctx.grid();
    (0..grid.len())
        .filter_map(|cell| door_site(grid, ctx.doors(), cell))
        .collect()
}

/// Whether the layout still leaves a way in: a door exists, a site with an
/// open inner tile exists, or the room has no door sites at all.
pub fn has_door_access(ctx: &Context) -> bool {
    if !ctx.doors().is_empty() {
        return true;
    }
    let sites = door_sites(ctx);
    sites.is_empty() || sites.iter().any(|site| ctx.is_open(site.inner))
}

/// Walk distances over open tiles from `start`.
fn walk_distances(ctx: &Context, start: usize) -> FnvHashMap<usize, u32> {
    let grid = ctx.grid();
    let mut distances: FnvHashMap<usize, u32> = dijkstra_all(&start, |&cell| {
        grid.neighbors4(cell)
            .filter(|&n| ctx.is_open(n))
            .map(|n| (n, 1u32))
            .collect::<Vec<_>>()
    })
    .into_iter()
    .map(|(cell, (_, cost))| (cell, cost))
    .collect();
    distances.insert(start, 0);
    distances
}

/// Steps from the door's inner tile to stand next to (or on) `target`.
fn reach_distance(ctx: &Context, distances: &FnvHashMap<usize, u32>, target: usize) -> Option<u32> {
    let on = distances.get(&target).copied();
    let beside = ctx
        .grid()
        .neighbors4(target)
        .filter_map(|n| distances.get(&n).map(|d| d + 1))
        .min();
    match (on, beside) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Average walk over `targets` when each is served by its nearest door.
/// Unreachable targets cost the grid size.
fn average_walk(ctx: &Context, doors: &[&FnvHashMap<usize, u32>], targets: &[usize]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let unreachable = ctx.grid().len() as u32;
    let total: u64 = targets
        .iter()
        .map(|&target| {
            doors
                .iter()
                .filter_map(|d| reach_distance(ctx, d, target))
                .min()
                .unwrap_or(unreachable) as u64
        })
        .sum();
    total as f64 / targets.len() as f64
}

fn storage_tiles(ctx: &Context) -> Vec<usize> {
    let mut tiles = Vec::new();
    for placement in ctx.placements() {
        for tile in &ctx.footprint_of(placement).tiles {
            if tile.flags.contains(TileFlags::STORAGE) {
                if let Some(cell) = ctx.cell_of(placement, tile) {
                    tiles.push(cell);
                }
            }
        }
    }
    tiles
}

fn must_reach_tiles(ctx: &Context) -> Vec<usize> {
    ctx.with_must_reach_tiles(|tiles| tiles.to_vec())
}

/// Lowest isolation a layout with doors may end at.
fn isolation_floor(ctx: &Context) -> f64 {
    ctx.config().min_isolation - STABILITY_EPSILON
}

/// Whether the doors keep the room above the isolation floor. A room with no
/// doors is measured by its shape alone and always passes.
pub fn doors_within_floor(ctx: &Context) -> bool {
    ctx.doors().is_empty() || isolation_score(ctx.grid(), ctx.doors()) >= isolation_floor(ctx)
}

fn sites_within_floor(ctx: &Context) -> Vec<DoorSite> {
    let floor = isolation_floor(ctx);
    door_sites(ctx)
        .into_iter()
        .filter(|site| isolation_with_door(ctx.grid(), ctx.doors(), site.door) >= floor)
        .collect()
}

/// Open up the cheapest blocked site by evicting the least valuable piece
/// covering its inner tile.
fn unblock_cheapest(ctx: &mut Context, sites: &[DoorSite]) -> Option<DoorSite> {
    let catalog = ctx.catalog();
    let building = ctx.building();
    let (site, victim) = sites
        .iter()
        .filter_map(|site| ctx.owner(site.inner).map(|owner| (*site, owner)))
        .min_by(|a, b| {
            let value = |owner: usize| {
                let p = ctx.placement(owner);
                item_value(catalog, building, p.group, p.item)
            };
            value(a.1)
                .partial_cmp(&value(b.1))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.door.cmp(&b.0.door))
        })?;

    let removed = ctx.remove_placement(victim);
    if ctx.is_open(site.inner) {
        debug!("Evicted {:?} to open a door", removed);
        Some(site)
    } else {
        ctx.add_placement(removed);
        None
    }
}

/// Add doors until none pays for itself. Returns the doors added.
pub fn place_doors(ctx: &mut Context) -> usize {
    if !ctx.is_indoor() {
        return 0;
    }
    let started = ctx.trace_start();
    let mut added = 0;

    while ctx.doors().len() < ctx.config().max_doors {
        if !ctx.checkpoint() {
            break;
        }

        let first = ctx.doors().is_empty();
        let sites = sites_within_floor(ctx);
        if sites.is_empty() {
            break;
        }

        let targets = if first {
            let storage = storage_tiles(ctx);
            if storage.is_empty() {
                must_reach_tiles(ctx)
            } else {
                storage
            }
        } else {
            must_reach_tiles(ctx)
        };

        let existing: Vec<FnvHashMap<usize, u32>> = ctx
            .doors()
            .iter()
            .filter_map(|door| door_inner(ctx, door))
            .map(|inner| walk_distances(ctx, inner))
            .collect();
        let existing_refs: Vec<&FnvHashMap<usize, u32>> = existing.iter().collect();
        let current = average_walk(ctx, &existing_refs, &targets);

        let mut best: Option<(f64, DoorSite)> = None;
        for site in sites.iter().filter(|site| ctx.is_open(site.inner)) {
            let distances = walk_distances(ctx, site.inner);
            let mut with_site = existing_refs.clone();
            with_site.push(&distances);
            let cost = average_walk(ctx, &with_site, &targets);
            if best.map(|(c, _)| cost < c).unwrap_or(true) {
                best = Some((cost, *site));
            }
        }

        let site = match best {
            Some((cost, site)) => {
                if !first && current - cost < MIN_DOOR_GAIN {
                    break;
                }
                site
            }
            None if first => match unblock_cheapest(ctx, &sites) {
                Some(site) => site,
                None => break,
            },
            None => break,
        };

        if ctx.add_door(site.door) {
            trace!("Door at {:?}", ctx.grid().location(site.door));
            added += 1;
        } else {
            break;
        }
    }

    ctx.trace_finish("doors", started);
    added
}

/// The room tile a placed door opens onto.
pub fn door_inner(ctx: &Context, door: usize) -> Option<usize> {
    let grid = ctx.grid();
    grid.neighbors4(door).find(|&n| grid.is_room(n))
}

/// Place one door on the bare room, as central as the walls allow.
pub fn seed_door(ctx: &mut Context) -> bool {
    if !ctx.is_indoor() || !ctx.doors().is_empty() {
        return false;
    }
    let targets: Vec<usize> = ctx.grid().room_tiles().collect();
    let best = sites_within_floor(ctx)
        .into_iter()
        .filter(|site| ctx.is_open(site.inner))
        .map(|site| {
            let distances = walk_distances(ctx, site.inner);
            (average_walk(ctx, &[&distances], &targets), site)
        })
        .min_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.door.cmp(&b.1.door))
        });

    match best {
        Some((_, site)) => ctx.add_door(site.door),
        None => false,
    }
}

/// Doors without an open room neighbor.
pub fn blocked_doors(ctx: &Context) -> usize {
    let grid = ctx.grid();
    ctx.doors()
        .iter()
        .filter(|&door| !grid.neighbors4(door).any(|n| ctx.is_open(n)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;
    use crate::plan::Placement;

    fn hall() -> RoomGrid {
        room_from_ascii(&[
            "#######",
            "#.....#",
            "#.....#",
            "#.....#",
            "#######",
        ])
    }

    #[test]
    fn corner_walls_are_not_sites() {
        let grid = hall();
        let doors = TileSet::new(grid.len());
        assert_eq!(door_site(&grid, &doors, grid.index(0, 0)), None);
        assert_eq!(
            door_site(&grid, &doors, grid.index(0, 3)),
            Some(DoorSite {
                door: grid.index(0, 3),
                inner: grid.index(1, 3)
            })
        );
        // Room tiles are never sites.
        assert_eq!(door_site(&grid, &doors, grid.index(2, 2)), None);
    }

    #[test]
    fn seeded_door_is_central() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 1, false);
        assert!(seed_door(&mut ctx));
        let door = ctx.doors().iter().next().unwrap();
        let (_, col) = ctx.grid().coords(door);
        assert_eq!(col, 3);
        assert!(isolation_score(ctx.grid(), ctx.doors()) >= MIN_ISOLATION);
    }

    #[test]
    fn first_door_serves_storage() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 2, 5)));

        assert!(place_doors(&mut ctx) >= 1);
        assert_eq!(blocked_doors(&ctx), 0);
        let nearest = ctx
            .doors()
            .iter()
            .map(|door| ctx.grid().location(door).manhattan_to(ctx.grid().location(ctx.grid().index(2, 5))))
            .min()
            .unwrap();
        assert!(nearest <= 2);
    }

    #[test]
    fn outdoor_rooms_get_no_doors() {
        let catalog = single_blocker_catalog();
        let building = single_blocker_building(false);
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, hall(), &[], &[], 1, false);
        assert_eq!(place_doors(&mut ctx), 0);
        assert!(!seed_door(&mut ctx));
    }

    #[test]
    fn blocked_sites_are_cleared_by_eviction() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&[
            "#######",
            "#.....#",
            "#.....#",
            "#.....#",
            "#.....#",
            "#.....#",
            "#######",
        ]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        // Racks on every tile along the walls, so no site opens onto a free tile.
        let mut racks = 0;
        for row in 1..6 {
            for col in 1..6 {
                if row == 1 || row == 5 || col == 1 || col == 5 {
                    assert!(ctx.add_placement(Placement::new(TOOLRACK, 0, 0, row, col)));
                    racks += 1;
                }
            }
        }

        assert_eq!(place_doors(&mut ctx), 1);
        assert_eq!(blocked_doors(&ctx), 0);
        assert_eq!(ctx.placements().len(), racks - 1);
        assert_eq!(ctx.doors().iter().next(), Some(ctx.grid().index(0, 1)));
    }

    #[test]
    fn small_rooms_stop_at_the_isolation_floor() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        // 16 and 18 exposed edges: one door fits, a second would not.
        for rows in [
            &["#######", "#.....#", "#.....#", "#.....#", "#######"][..],
            &["########", "#......#", "#......#", "#......#", "########"][..],
        ] {
            let mut ctx = Context::new(&catalog, &building, &budget, room_from_ascii(rows), &[], &[], 1, false);
            assert!(seed_door(&mut ctx));
            assert!(isolation_score(ctx.grid(), ctx.doors()) >= MIN_ISOLATION);
            assert!(sites_within_floor(&ctx).is_empty());

            place_doors(&mut ctx);
            assert_eq!(ctx.doors().len(), 1);
            assert!(doors_within_floor(&ctx));
        }
    }

    #[test]
    fn rooms_open_to_the_edge_get_no_doors() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["#####", "#....", "#...#", "#####"]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        assert!(isolation_score(ctx.grid(), ctx.doors()) < MIN_ISOLATION);
        assert!(!seed_door(&mut ctx));
        assert_eq!(place_doors(&mut ctx), 0);
        assert!(doors_within_floor(&ctx));
    }
}
