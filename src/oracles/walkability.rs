use crate::context::Context;
use crate::grid::*;

/// Result of one whole-room walkability flood.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub open_tiles: usize,
    pub reached: usize,
    /// Must-reach tiles without a reached 4-neighbor.
    pub stranded_must_reach: usize,
    /// Pieces without a reached 4-neighbor outside themselves.
    pub stranded_pieces: usize,
}

impl WalkReport {
    pub fn is_walkable(&self) -> bool {
        self.reached == self.open_tiles && self.stranded_must_reach == 0 && self.stranded_pieces == 0
    }
}

/// Flood the open tiles from one start and check that every open tile, every
/// must-reach tile and every piece is served by the walkable region.
pub fn walk_report(ctx: &Context) -> WalkReport {
    let grid = ctx.grid();
    let mut guard = ctx.scratch_mut();
    let scratch = &mut *guard;
    let generation = crate::context::next_generation(&mut scratch.visit_gen, &mut scratch.visited);

    let mut report = WalkReport {
        open_tiles: ctx.open_count(),
        ..Default::default()
    };

    scratch.queue.clear();
    if let Some(start) = (0..grid.len()).find(|&cell| ctx.is_open(cell)) {
        scratch.visited[start] = generation;
        scratch.queue.push(start);
        let mut head = 0;
        while head < scratch.queue.len() {
            let cell = scratch.queue[head];
            head += 1;
            for (dr, dc) in NEIGHBORS_4 {
                if let Some(n) = grid.neighbor(cell, dr, dc) {
                    if scratch.visited[n] != generation && ctx.is_open(n) {
                        scratch.visited[n] = generation;
                        scratch.queue.push(n);
                    }
                }
            }
        }
    }
    report.reached = scratch.queue.len();

    let visited = &scratch.visited;
    let reached = |cell: usize| visited[cell] == generation;

    report.stranded_must_reach = ctx.with_must_reach_tiles(|tiles| {
        tiles
            .iter()
            .filter(|&&cell| !grid.neighbors4(cell).any(|n| reached(n)))
            .count()
    });

    for (index, placement) in ctx.placements().iter().enumerate() {
        let served = ctx.placement_cells(placement).into_iter().any(|cell| {
            grid.neighbors4(cell)
                .any(|n| reached(n) && ctx.owner(n) != Some(index))
        });
        if !served {
            report.stranded_pieces += 1;
        }
    }

    report
}

pub fn is_walkable(ctx: &Context) -> bool {
    walk_report(ctx).is_walkable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::pipeline::CpuBudget;
    use crate::plan::Placement;

    #[test]
    fn empty_room_is_walkable() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(4, 3), &[], &[], 1, false);
        let report = walk_report(&ctx);
        assert_eq!(report.reached, 12);
        assert!(report.is_walkable());
    }

    #[test]
    fn unvalidated_wall_of_racks_splits_room() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(3, 3), &[], &[], 1, false);
        for row in 0..3 {
            assert!(ctx.add_placement(Placement::new(TOOLRACK, 0, 0, row, 1)));
        }
        let report = walk_report(&ctx);
        assert_eq!(report.open_tiles, 6);
        assert_eq!(report.reached, 3);
        assert!(!report.is_walkable());
    }

    #[test]
    fn boxed_in_station_is_stranded() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["..", ".."]);
        let mut ctx = Context::new(&catalog, &building, &budget, room, &[], &[], 1, false);
        assert!(ctx.add_placement(Placement::new(STORAGE, 0, 0, 0, 0)));
        assert!(ctx.add_placement(Placement::new(TOOLRACK, 0, 0, 0, 1)));
        assert!(ctx.add_placement(Placement::new(TOOLRACK, 0, 0, 1, 0)));
        let report = walk_report(&ctx);
        assert_eq!(report.stranded_must_reach, 1);
        assert_eq!(report.stranded_pieces, 1);
        assert!(!report.is_walkable());
    }
}
