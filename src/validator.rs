//! Placement legality.
//!
//! Two interchangeable backends implement the same checks: `ExactValidator`
//! uses hash sets and a full rescan of the room and is the reference;
//! `StampedValidator` uses the context's generation-stamped scratch buffers
//! and the incrementally maintained open count, and never allocates.
//!
//! Checks run in order and stop at the first failure:
//!
//! * Local: rotation allowed, every tile in bounds and on a room tile, no
//!   overlap (ignoring the skipped placement), no blocking tile on a reserved
//!   door tile.
//! * Reach: no new must-reach tile is enclosed on all four sides, and no
//!   existing must-reach neighbor becomes enclosed.
//! * The piece keeps at least one open 4-neighbor outside itself.
//! * Global (only for pieces with blocking tiles): the open tiles stay one
//!   4-connected region, and no adjacent piece loses its last open neighbor.

use crate::context::{next_generation, Context};
use crate::grid::*;
use crate::plan::Placement;
use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};

/// Why a placement was refused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    UnknownItem,
    RotationNotAllowed,
    OutOfBounds,
    OffRoom,
    Overlap,
    Reserved,
    MustReachEnclosed,
    NeighborEnclosed,
    NoOpenNeighbor,
    Disconnects,
    StarvesNeighbor,
}

pub trait PlacementValidator {
    /// Local, reach and open-neighbor checks.
    fn check_local(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection>;

    /// Connectivity and neighbor-starvation checks. Assumes `check_local`
    /// passed.
    fn check_global(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection>;

    fn check(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        self.check_local(ctx, placement, skip)?;
        if ctx.footprint_of(placement).has_blocking() {
            self.check_global(ctx, placement, skip)?;
        }
        Ok(())
    }
}

fn check_header(ctx: &Context, placement: &Placement) -> Result<(), Rejection> {
    if !ctx.is_known_item(placement) {
        return Err(Rejection::UnknownItem);
    }
    if !ctx.catalog().groups[placement.group]
        .rotation
        .allows(placement.rotation)
    {
        return Err(Rejection::RotationNotAllowed);
    }
    Ok(())
}

/// Count of the four cardinal sides of `cell` that are blocked (off-grid
/// counts as blocked).
fn blocked_sides(grid: &RoomGrid, cell: usize, blocked: impl Fn(usize) -> bool) -> usize {
    NEIGHBORS_4
        .iter()
        .filter(|&&(dr, dc)| match grid.neighbor(cell, dr, dc) {
            Some(n) => blocked(n),
            None => true,
        })
        .count()
}

/// Hash-set reference implementation.
pub struct ExactValidator;

impl ExactValidator {
    fn collect(
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(FnvHashSet<usize>, FnvHashSet<usize>), Rejection> {
        let grid = ctx.grid();
        let mut own = FnvHashSet::default();
        let mut block = FnvHashSet::default();

        for tile in &ctx.footprint_of(placement).tiles {
            let cell = ctx.cell_of(placement, tile).ok_or(Rejection::OutOfBounds)?;
            if !grid.is_room(cell) {
                return Err(Rejection::OffRoom);
            }
            if ctx.occupied_by_other(cell, skip) {
                return Err(Rejection::Overlap);
            }
            if tile.is_blocking() && ctx.reserved().contains(cell) {
                return Err(Rejection::Reserved);
            }
            own.insert(cell);
            if tile.is_blocking() {
                block.insert(cell);
            }
        }

        Ok((own, block))
    }
}

impl PlacementValidator for ExactValidator {
    fn check_local(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        check_header(ctx, placement)?;
        let (own, block) = Self::collect(ctx, placement, skip)?;
        let grid = ctx.grid();
        let blocked =
            |cell: usize| !grid.is_room(cell) || block.contains(&cell) || ctx.existing_blocking(cell, skip);

        let fp = ctx.footprint_of(placement);
        for tile in fp.tiles.iter().filter(|t| t.is_must_reach()) {
            if let Some(cell) = ctx.cell_of(placement, tile) {
                if blocked_sides(grid, cell, &blocked) == 4 {
                    return Err(Rejection::MustReachEnclosed);
                }
            }
        }

        for &cell in &block {
            for n in grid.neighbors4(cell) {
                if !own.contains(&n)
                    && ctx.existing_must_reach(n, skip)
                    && blocked_sides(grid, n, &blocked) == 4
                {
                    return Err(Rejection::NeighborEnclosed);
                }
            }
        }

        let has_open = own
            .iter()
            .any(|&cell| grid.neighbors4(cell).any(|n| !own.contains(&n) && !blocked(n)));
        if !has_open {
            return Err(Rejection::NoOpenNeighbor);
        }

        Ok(())
    }

    fn check_global(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        let (_, block) = Self::collect(ctx, placement, skip)?;
        let grid = ctx.grid();
        let open = |cell: usize| {
            grid.is_room(cell) && !block.contains(&cell) && !ctx.existing_blocking(cell, skip)
        };

        let open_tiles: Vec<usize> = (0..grid.len()).filter(|&c| open(c)).collect();
        if let Some(&start) = open_tiles.first() {
            let mut seen = FnvHashSet::default();
            let mut queue = std::collections::VecDeque::new();
            seen.insert(start);
            queue.push_back(start);
            while let Some(cell) = queue.pop_front() {
                for n in grid.neighbors4(cell) {
                    if open(n) && seen.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
            if seen.len() != open_tiles.len() {
                return Err(Rejection::Disconnects);
            }
        }

        let mut pieces = FnvHashSet::default();
        for &cell in &block {
            for n in grid.neighbors4(cell) {
                if let Some(owner) = ctx.owner(n) {
                    if Some(owner) != skip {
                        pieces.insert(owner);
                    }
                }
            }
        }
        for piece in pieces {
            let other = ctx.placement(piece);
            let cells = ctx.placement_cells(&other);
            let reachable = cells.iter().any(|&cell| {
                grid.neighbors4(cell)
                    .any(|n| ctx.owner(n) != Some(piece) && open(n))
            });
            if !reachable {
                return Err(Rejection::StarvesNeighbor);
            }
        }

        Ok(())
    }
}

/// Allocation-free implementation over the context's scratch buffers.
pub struct StampedValidator;

impl StampedValidator {
    /// Stamp the placement's cells into the own/block buffers. Returns the
    /// generations used.
    fn stamp(
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(u32, u32), Rejection> {
        let grid = ctx.grid();
        let mut scratch = ctx.scratch_mut();
        let own_gen = scratch.next_own();
        let block_gen = scratch.next_block();

        for tile in &ctx.footprint_of(placement).tiles {
            let cell = ctx.cell_of(placement, tile).ok_or(Rejection::OutOfBounds)?;
            if !grid.is_room(cell) {
                return Err(Rejection::OffRoom);
            }
            if ctx.occupied_by_other(cell, skip) {
                return Err(Rejection::Overlap);
            }
            if tile.is_blocking() {
                if ctx.reserved().contains(cell) {
                    return Err(Rejection::Reserved);
                }
                scratch.block[cell] = block_gen;
            }
            scratch.own[cell] = own_gen;
        }

        Ok((own_gen, block_gen))
    }
}

impl PlacementValidator for StampedValidator {
    fn check_local(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        check_header(ctx, placement)?;
        let (own_gen, block_gen) = Self::stamp(ctx, placement, skip)?;
        let grid = ctx.grid();
        let guard = ctx.scratch_mut();
        let scratch = &*guard;
        let blocked = |cell: usize| {
            !grid.is_room(cell) || scratch.block[cell] == block_gen || ctx.existing_blocking(cell, skip)
        };

        let fp = ctx.footprint_of(placement);
        for tile in &fp.tiles {
            let cell = match ctx.cell_of(placement, tile) {
                Some(cell) => cell,
                None => continue,
            };
            if tile.is_must_reach() && blocked_sides(grid, cell, &blocked) == 4 {
                return Err(Rejection::MustReachEnclosed);
            }
        }

        for tile in fp.tiles.iter().filter(|t| t.is_blocking()) {
            if let Some(cell) = ctx.cell_of(placement, tile) {
                for n in grid.neighbors4(cell) {
                    if scratch.own[n] != own_gen
                        && ctx.existing_must_reach(n, skip)
                        && blocked_sides(grid, n, &blocked) == 4
                    {
                        return Err(Rejection::NeighborEnclosed);
                    }
                }
            }
        }

        let has_open = fp.tiles.iter().any(|tile| {
            ctx.cell_of(placement, tile)
                .map(|cell| {
                    grid.neighbors4(cell)
                        .any(|n| scratch.own[n] != own_gen && !blocked(n))
                })
                .unwrap_or(false)
        });
        if !has_open {
            return Err(Rejection::NoOpenNeighbor);
        }

        Ok(())
    }

    fn check_global(
        &self,
        ctx: &Context,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        let (own_gen, block_gen) = Self::stamp(ctx, placement, skip)?;
        let grid = ctx.grid();
        let fp = ctx.footprint_of(placement);
        let mut guard = ctx.scratch_mut();
        let scratch = &mut *guard;

        // Open tiles after the change, from the maintained count.
        let mut newly_blocked = 0usize;
        for tile in fp.tiles.iter().filter(|t| t.is_blocking()) {
            if let Some(cell) = ctx.cell_of(placement, tile) {
                if ctx.blocker_count(cell) == 0 {
                    newly_blocked += 1;
                }
            }
        }
        let mut freed = 0usize;
        if let Some(skipped) = skip {
            let old = ctx.placement(skipped);
            for tile in ctx.footprint_of(&old).tiles.iter().filter(|t| t.is_blocking()) {
                if let Some(cell) = ctx.cell_of(&old, tile) {
                    if ctx.blocker_count(cell) == 1 && scratch.block[cell] != block_gen {
                        freed += 1;
                    }
                }
            }
        }
        let expected = ctx.open_count() + freed - newly_blocked;

        let block = &scratch.block;
        let is_open = |cell: usize| {
            grid.is_room(cell) && block[cell] != block_gen && !ctx.existing_blocking(cell, skip)
        };

        // Seed the flood from an open neighbor of the piece.
        let mut start = None;
        'seed: for tile in &fp.tiles {
            if let Some(cell) = ctx.cell_of(placement, tile) {
                for n in grid.neighbors4(cell) {
                    if is_open(n) {
                        start = Some(n);
                        break 'seed;
                    }
                }
            }
        }

        if let Some(start) = start {
            let visit_gen = next_generation(&mut scratch.visit_gen, &mut scratch.visited);
            scratch.queue.clear();
            scratch.queue.push(start);
            scratch.visited[start] = visit_gen;
            let mut head = 0;
            while head < scratch.queue.len() {
                let cell = scratch.queue[head];
                head += 1;
                for (dr, dc) in NEIGHBORS_4 {
                    if let Some(n) = grid.neighbor(cell, dr, dc) {
                        if scratch.visited[n] != visit_gen && is_open(n) {
                            scratch.visited[n] = visit_gen;
                            scratch.queue.push(n);
                        }
                    }
                }
            }
            if scratch.queue.len() != expected {
                return Err(Rejection::Disconnects);
            }
        } else if expected > 0 {
            return Err(Rejection::Disconnects);
        }

        scratch.pieces.clear();
        for tile in fp.tiles.iter().filter(|t| t.is_blocking()) {
            if let Some(cell) = ctx.cell_of(placement, tile) {
                for n in grid.neighbors4(cell) {
                    if let Some(owner) = ctx.owner(n) {
                        if Some(owner) != skip
                            && scratch.own[n] != own_gen
                            && !scratch.pieces.contains(&(owner as u32))
                        {
                            scratch.pieces.push(owner as u32);
                        }
                    }
                }
            }
        }

        for i in 0..scratch.pieces.len() {
            let piece = scratch.pieces[i] as usize;
            let other = ctx.placement(piece);
            let reachable = ctx.footprint_of(&other).tiles.iter().any(|tile| {
                ctx.cell_of(&other, tile)
                    .map(|cell| {
                        grid.neighbors4(cell)
                            .any(|n| ctx.owner(n) != Some(piece) && is_open(n))
                    })
                    .unwrap_or(false)
            });
            if !reachable {
                return Err(Rejection::StarvesNeighbor);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;
    use test_case::test_case;

    fn both(ctx: &Context, placement: Placement, skip: Option<usize>) -> Result<(), Rejection> {
        let exact = ExactValidator.check(ctx, &placement, skip);
        let stamped = StampedValidator.check(ctx, &placement, skip);
        assert_eq!(exact, stamped, "backends disagree on {:?}", placement);
        exact
    }

    fn corridor_room() -> RoomGrid {
        room_from_ascii(&["...#...", ".......", "...#..."])
    }

    #[test_case(Placement::new(TOOLRACK, 0, 0, 1, 3), Err(Rejection::Disconnects); "corridor blocker")]
    #[test_case(Placement::new(TOOLRACK, 0, 0, 0, 0), Ok(()); "corner blocker")]
    #[test_case(Placement::new(TOOLRACK, 0, 0, 0, 3), Err(Rejection::OffRoom); "off room")]
    #[test_case(Placement::new(TOOLRACK, 0, 0, 3, 0), Err(Rejection::OutOfBounds); "out of bounds")]
    #[test_case(Placement::new(TOOLRACK, 0, 2, 0, 0), Err(Rejection::RotationNotAllowed); "bad rotation")]
    fn corridor_cases(placement: Placement, expected: Result<(), Rejection>) {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let ctx = Context::new(&catalog, &building, &budget, corridor_room(), &[], &[], 1, false);
        assert_eq!(both(&ctx, placement, None), expected);
    }

    #[test]
    fn enclosed_must_reach_is_rejected() {
        let catalog = must_reach_catalog();
        let building = must_reach_building();
        let budget = CpuBudget::unlimited();
        let ctx = Context::new(&catalog, &building, &budget, room_from_ascii(&["."]), &[], &[], 1, false);
        assert_eq!(
            both(&ctx, Placement::new(0, 0, 0, 0, 0), None),
            Err(Rejection::MustReachEnclosed)
        );
    }

    #[test]
    fn blocking_a_station_side_is_rejected() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        // Station at (0,0) faces only (1,0) once the bench body sits at (0,1).
        let room = room_from_ascii(&["...", "...", "..."]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 0, 0, 0, 0)));
        assert_eq!(
            both(&ctx, Placement::new(TOOLRACK, 0, 0, 1, 0), None),
            Err(Rejection::NeighborEnclosed)
        );
    }

    #[test]
    fn skip_lets_a_piece_move_over_itself() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(5, 4), &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 1, 0, 1, 1)));

        let shifted = Placement::new(BENCH, 1, 0, 1, 2);
        assert_eq!(both(&ctx, shifted, None), Err(Rejection::Overlap));
        assert_eq!(both(&ctx, shifted, Some(0)), Ok(()));
    }

    #[test]
    fn backends_agree_on_every_anchor() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["......#", ".......", "..#....", "......."]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        assert!(ctx.try_place(Placement::new(BENCH, 1, 1, 0, 3)));
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 3, 6)));

        for group in 0..catalog.groups.len() {
            for item in 0..catalog.groups[group].items.len() {
                for &rotation in catalog.groups[group].rotation.rotations() {
                    for row in 0..4 {
                        for col in 0..7 {
                            both(&ctx, Placement::new(group, item, rotation, row, col), None).ok();
                            both(&ctx, Placement::new(group, item, rotation, row, col), Some(0)).ok();
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn penetrable_tiles_block_walking() {
        assert!(Availability::Penetrable.is_blocking());
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let ctx = Context::new(&catalog, &building, &budget, corridor_room(), &[], &[], 1, false);
        assert_eq!(
            both(&ctx, Placement::new(PLANT, 0, 0, 1, 3), None),
            Err(Rejection::Disconnects)
        );
    }
}
