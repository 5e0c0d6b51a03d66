//! The owned simulation state for one optimization run.
//!
//! `Context` owns the room grid, door set and placement list, plus every cache
//! derived from them (occupancy, blocker counts, must-reach counts, free-tile
//! bitmap, group counts, stat totals). The caches are only ever written from
//! inside this module, so every public mutation leaves them consistent.

use crate::catalog::*;
use crate::footprint::*;
use crate::grid::*;
use crate::location::*;
use crate::pipeline::CpuBudget;
use crate::plan::*;
use crate::planner::PlannerConfig;
use crate::stats::StatTotals;
use crate::trace::{PerfTrace, Tracer};
use crate::validator::*;
use log::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::cell::{RefCell, RefMut};
use std::time::Instant;

/// Occupancy value of an unoccupied tile.
pub const EMPTY: u32 = u32::MAX;

/// Saved RNG state. Restoring it replays the exact same random sequence.
pub type RngState = Xoshiro256PlusPlus;

/// Placements-only capture. Only valid while the room shape and doors are
/// unchanged, which is checked against the context's shape epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct LightSnapshot {
    placements: Vec<Placement>,
    epoch: u64,
}

impl LightSnapshot {
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }
}

/// Room, placements and doors.
#[derive(Clone, Debug, PartialEq)]
pub struct FullSnapshot {
    room: RoomGrid,
    placements: Vec<Placement>,
    doors: Vec<usize>,
}

impl FullSnapshot {
    pub fn room(&self) -> &RoomGrid {
        &self.room
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn door_keys(&self) -> &[usize] {
        &self.doors
    }
}

/// Reusable buffers for allocation-free checks. Generation counters replace
/// clearing: a slot is "set" when it holds the current generation.
pub(crate) struct Scratch {
    pub queue: Vec<usize>,
    pub visited: Vec<u32>,
    pub visit_gen: u32,
    pub own: Vec<u32>,
    pub own_gen: u32,
    pub block: Vec<u32>,
    pub block_gen: u32,
    pub pieces: Vec<u32>,
}

pub(crate) fn next_generation(generation: &mut u32, buffer: &mut [u32]) -> u32 {
    *generation = generation.wrapping_add(1);
    if *generation == 0 {
        buffer.iter_mut().for_each(|v| *v = 0);
        *generation = 1;
    }
    *generation
}

impl Scratch {
    fn new(size: usize) -> Scratch {
        Scratch {
            queue: Vec::with_capacity(size),
            visited: vec![0; size],
            visit_gen: 0,
            own: vec![0; size],
            own_gen: 0,
            block: vec![0; size],
            block_gen: 0,
            pieces: Vec::new(),
        }
    }

    pub fn next_own(&mut self) -> u32 {
        next_generation(&mut self.own_gen, &mut self.own)
    }

    pub fn next_block(&mut self) -> u32 {
        next_generation(&mut self.block_gen, &mut self.block)
    }
}

pub struct Context<'a> {
    catalog: &'a Catalog,
    building: &'a Building,
    budget: &'a CpuBudget,
    footprints: FootprintCache,
    primary_stat: Option<usize>,
    config: PlannerConfig,

    grid: RoomGrid,
    doors: TileSet,
    /// Room tiles directly inside a door; no blocking tile may cover them.
    reserved: TileSet,
    /// Bumped on every room or door change.
    epoch: u64,

    placements: Vec<Placement>,

    owner: Vec<u32>,
    cover: Vec<u8>,
    blockers: Vec<u8>,
    group_of: Vec<u32>,
    must_reach: Vec<u8>,
    free: TileSet,
    room_count: usize,
    /// Room tiles without a blocking tile.
    open_count: usize,
    group_counts: Vec<u32>,

    stats: RefCell<Option<StatTotals>>,
    must_reach_tiles: RefCell<Option<Vec<usize>>>,
    scratch: RefCell<Scratch>,

    rng: Xoshiro256PlusPlus,
    tracer: Tracer,
}

impl<'a> Context<'a> {
    /// Build a context from caller data. Initial placements that are out of the
    /// room, reference unknown items, use a rotation their group forbids or
    /// overlap earlier ones are dropped; doors on room tiles are ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: &'a Catalog,
        building: &'a Building,
        budget: &'a CpuBudget,
        room: RoomGrid,
        placements: &[Placement],
        doors: &[Location],
        seed: u64,
        trace: bool,
    ) -> Context<'a> {
        let size = room.len();
        let width = room.width();
        let mut ctx = Context {
            catalog,
            building,
            budget,
            footprints: FootprintCache::new(catalog),
            primary_stat: catalog.primary_stat(),
            config: PlannerConfig::default(),
            doors: TileSet::new(size),
            reserved: TileSet::new(size),
            epoch: 0,
            placements: Vec::new(),
            owner: vec![EMPTY; size],
            cover: vec![0; size],
            blockers: vec![0; size],
            group_of: vec![EMPTY; size],
            must_reach: vec![0; size],
            free: TileSet::new(size),
            room_count: 0,
            open_count: 0,
            group_counts: vec![0; catalog.groups.len()],
            stats: RefCell::new(None),
            must_reach_tiles: RefCell::new(None),
            scratch: RefCell::new(Scratch::new(size)),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            tracer: Tracer::new(trace),
            grid: room,
        };

        for door in doors {
            if door.row() < ctx.grid.height() && door.col() < width {
                let key = door.key(width);
                if !ctx.grid.is_room(key) {
                    ctx.doors.insert(key);
                }
            }
        }
        ctx.rebuild_caches();

        for placement in placements {
            if !ctx.add_placement(*placement) {
                warn!("Dropping invalid initial placement {:?}", placement);
            }
        }

        ctx
    }

    /// Replace the default tuning.
    pub fn with_config(mut self, config: PlannerConfig) -> Context<'a> {
        self.config = config;
        self
    }

    //
    // Read access
    //

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn building(&self) -> &'a Building {
        self.building
    }

    pub fn grid(&self) -> &RoomGrid {
        &self.grid
    }

    pub fn doors(&self) -> &TileSet {
        &self.doors
    }

    pub fn reserved(&self) -> &TileSet {
        &self.reserved
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement(&self, index: usize) -> Placement {
        self.placements[index]
    }

    pub fn primary_stat(&self) -> Option<usize> {
        self.primary_stat
    }

    pub fn is_indoor(&self) -> bool {
        self.building.indoor
    }

    #[inline]
    pub fn footprint(&self, group: usize, item: usize, rotation: u8) -> &Footprint {
        self.footprints.get(group, item, rotation)
    }

    #[inline]
    pub fn footprint_of(&self, placement: &Placement) -> &Footprint {
        self.footprints
            .get(placement.group, placement.item, placement.rotation)
    }

    pub fn room_count(&self) -> usize {
        self.room_count
    }

    pub fn open_count(&self) -> usize {
        self.open_count
    }

    pub fn group_count(&self, group: usize) -> u32 {
        self.group_counts[group]
    }

    /// True if the group can take one more placement.
    pub fn group_has_capacity(&self, group: usize) -> bool {
        self.group_counts[group] < self.catalog.groups[group].max_count()
    }

    #[inline]
    pub fn owner(&self, cell: usize) -> Option<usize> {
        let owner = self.owner[cell];
        if owner == EMPTY {
            None
        } else {
            Some(owner as usize)
        }
    }

    #[inline]
    pub fn group_at(&self, cell: usize) -> Option<usize> {
        let group = self.group_of[cell];
        if group == EMPTY {
            None
        } else {
            Some(group as usize)
        }
    }

    #[inline]
    pub fn is_free(&self, cell: usize) -> bool {
        self.free.contains(cell)
    }

    pub fn free_tiles(&self) -> &TileSet {
        &self.free
    }

    #[inline]
    pub fn blocker_count(&self, cell: usize) -> u8 {
        self.blockers[cell]
    }

    /// Room tile not covered by a blocking tile.
    #[inline]
    pub fn is_open(&self, cell: usize) -> bool {
        self.grid.is_room(cell) && self.blockers[cell] == 0
    }

    #[inline]
    pub fn is_must_reach(&self, cell: usize) -> bool {
        self.must_reach[cell] > 0
    }

    /// The tile is covered only by placement `skip`.
    #[inline]
    pub fn owned_solely_by(&self, cell: usize, skip: Option<usize>) -> bool {
        match skip {
            Some(s) => self.cover[cell] == 1 && self.owner[cell] == s as u32,
            None => false,
        }
    }

    #[inline]
    pub fn occupied_by_other(&self, cell: usize, skip: Option<usize>) -> bool {
        self.cover[cell] > 0 && !self.owned_solely_by(cell, skip)
    }

    #[inline]
    pub fn existing_blocking(&self, cell: usize, skip: Option<usize>) -> bool {
        self.blockers[cell] > 0 && !self.owned_solely_by(cell, skip)
    }

    #[inline]
    pub fn existing_must_reach(&self, cell: usize, skip: Option<usize>) -> bool {
        self.must_reach[cell] > 0 && !self.owned_solely_by(cell, skip)
    }

    /// Grid cell of a footprint tile for a placement, if it is in bounds.
    #[inline]
    pub fn cell_of(&self, placement: &Placement, tile: &FootprintTile) -> Option<usize> {
        let row = placement.row + tile.dr;
        let col = placement.col + tile.dc;
        if row < self.grid.height() && col < self.grid.width() {
            Some(self.grid.index(row, col))
        } else {
            None
        }
    }

    /// Cells covered by a placement (all assumed in bounds).
    pub fn placement_cells(&self, placement: &Placement) -> Vec<usize> {
        self.footprint_of(placement)
            .tiles
            .iter()
            .filter_map(|t| self.cell_of(placement, t))
            .collect()
    }

    pub fn is_known_item(&self, placement: &Placement) -> bool {
        self.catalog
            .groups
            .get(placement.group)
            .map(|g| placement.item < g.items.len())
            .unwrap_or(false)
    }

    /// The group's rotation class allows the placement's rotation.
    pub fn rotation_allowed(&self, placement: &Placement) -> bool {
        self.catalog
            .groups
            .get(placement.group)
            .map(|g| g.rotation.allows(placement.rotation))
            .unwrap_or(false)
    }

    /// Every footprint tile is in bounds and on a room tile.
    pub fn fits_in_room(&self, placement: &Placement) -> bool {
        self.footprint_of(placement).tiles.iter().all(|t| {
            self.cell_of(placement, t)
                .map(|cell| self.grid.is_room(cell))
                .unwrap_or(false)
        })
    }

    /// Cached list of tiles covered by a must-reach footprint tile.
    pub fn with_must_reach_tiles<R>(&self, f: impl FnOnce(&[usize]) -> R) -> R {
        let mut cache = self.must_reach_tiles.borrow_mut();
        let tiles = cache.get_or_insert_with(|| {
            (0..self.must_reach.len())
                .filter(|&c| self.must_reach[c] > 0)
                .collect()
        });
        f(tiles)
    }

    /// Stat totals of the current layout, cached until the next mutation.
    pub fn stat_totals(&self) -> StatTotals {
        let mut cache = self.stats.borrow_mut();
        cache
            .get_or_insert_with(|| StatTotals::compute(self))
            .clone()
    }

    pub(crate) fn scratch_mut(&self) -> RefMut<'_, Scratch> {
        self.scratch.borrow_mut()
    }

    //
    // Validation
    //

    /// Full legality check with the allocation-free validator.
    pub fn check_placement(
        &self,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        StampedValidator.check(self, placement, skip)
    }

    /// Local checks only (bounds, overlap, reach); no connectivity BFS.
    pub fn check_placement_local(
        &self,
        placement: &Placement,
        skip: Option<usize>,
    ) -> Result<(), Rejection> {
        StampedValidator.check_local(self, placement, skip)
    }

    pub fn can_place(&self, placement: &Placement, skip: Option<usize>) -> bool {
        self.check_placement(placement, skip).is_ok()
    }

    //
    // Placement mutation
    //

    /// Apply one placement's footprint. Returns true if it overlapped an
    /// existing placement, in which case the caller must roll back.
    fn set_occupancy(&mut self, index: usize) -> bool {
        let p = self.placements[index];
        let fp = self.footprints.get(p.group, p.item, p.rotation);
        let width = self.grid.width();
        let mut overlap = false;

        for t in &fp.tiles {
            let cell = (p.row + t.dr) * width + p.col + t.dc;
            if self.cover[cell] == 0 {
                self.owner[cell] = index as u32;
                self.group_of[cell] = p.group as u32;
                self.free.remove(cell);
            } else {
                overlap = true;
            }
            self.cover[cell] = self.cover[cell].saturating_add(1);

            if t.is_blocking() {
                if self.blockers[cell] == 0 && self.grid.is_room(cell) {
                    self.open_count -= 1;
                }
                self.blockers[cell] = self.blockers[cell].saturating_add(1);
            }
            if t.is_must_reach() {
                self.must_reach[cell] = self.must_reach[cell].saturating_add(1);
            }
        }

        self.group_counts[p.group] += 1;
        self.invalidate();
        overlap
    }

    /// Retract one placement's footprint.
    fn clear_occupancy(&mut self, index: usize) {
        let p = self.placements[index];
        let fp = self.footprints.get(p.group, p.item, p.rotation);
        let width = self.grid.width();

        for t in &fp.tiles {
            let cell = (p.row + t.dr) * width + p.col + t.dc;
            self.cover[cell] = self.cover[cell].saturating_sub(1);
            if self.owner[cell] == index as u32 {
                self.owner[cell] = EMPTY;
                self.group_of[cell] = EMPTY;
            }
            if self.cover[cell] == 0 && self.grid.is_room(cell) {
                self.free.insert(cell);
            }

            if t.is_blocking() {
                self.blockers[cell] = self.blockers[cell].saturating_sub(1);
                if self.blockers[cell] == 0 && self.grid.is_room(cell) {
                    self.open_count += 1;
                }
            }
            if t.is_must_reach() {
                self.must_reach[cell] = self.must_reach[cell].saturating_sub(1);
            }
        }

        self.group_counts[p.group] -= 1;
        self.invalidate();
    }

    /// Commit a placement without the reachability checks. Fails (and leaves
    /// the context untouched) if the item is unknown, the rotation is not
    /// allowed, it leaves the room or it overlaps.
    pub fn add_placement(&mut self, placement: Placement) -> bool {
        if !self.is_known_item(&placement)
            || !self.rotation_allowed(&placement)
            || !self.fits_in_room(&placement)
        {
            return false;
        }
        self.placements.push(placement);
        let index = self.placements.len() - 1;
        if self.set_occupancy(index) {
            self.clear_occupancy(index);
            self.placements.pop();
            return false;
        }
        true
    }

    /// Validate and commit.
    pub fn try_place(&mut self, placement: Placement) -> bool {
        if !self.group_has_capacity(placement.group) {
            return false;
        }
        match self.check_placement(&placement, None) {
            Ok(()) => self.add_placement(placement),
            Err(reason) => {
                trace!("Rejected {:?}: {:?}", placement, reason);
                false
            }
        }
    }

    /// Remove a placement. The last placement takes over its index.
    pub fn remove_placement(&mut self, index: usize) -> Placement {
        self.clear_occupancy(index);
        let removed = self.placements.swap_remove(index);

        if index < self.placements.len() {
            let moved = self.placements[index];
            let old_index = self.placements.len() as u32;
            let fp = self.footprints.get(moved.group, moved.item, moved.rotation);
            let width = self.grid.width();
            for t in &fp.tiles {
                let cell = (moved.row + t.dr) * width + moved.col + t.dc;
                if self.owner[cell] == old_index {
                    self.owner[cell] = index as u32;
                }
            }
        }

        self.invalidate();
        removed
    }

    /// Replace placement `index` with `replacement` (a move, a rotation or a
    /// resize) if the result is legal with the old footprint lifted.
    pub fn replace_placement(&mut self, index: usize, replacement: Placement) -> bool {
        let old = self.placements[index];
        if replacement.group != old.group && !self.group_has_capacity(replacement.group) {
            return false;
        }
        if let Err(reason) = self.check_placement(&replacement, Some(index)) {
            trace!("Rejected replacement {:?}: {:?}", replacement, reason);
            return false;
        }

        self.clear_occupancy(index);
        self.placements[index] = replacement;
        if self.set_occupancy(index) {
            self.clear_occupancy(index);
            self.placements[index] = old;
            self.set_occupancy(index);
            return false;
        }
        true
    }

    //
    // Room and door mutation (shape changes)
    //

    /// Turn a free, unreserved room tile into a non-room tile (a pillar or a
    /// trimmed edge).
    pub fn remove_room_tile(&mut self, cell: usize) -> bool {
        if !self.grid.is_room(cell) || self.cover[cell] > 0 || self.reserved.contains(cell) {
            return false;
        }
        self.grid.set_room(cell, false);
        self.free.remove(cell);
        self.room_count -= 1;
        self.open_count -= 1;
        self.shape_changed();
        true
    }

    /// Undo `remove_room_tile`.
    pub fn restore_room_tile(&mut self, cell: usize) -> bool {
        if self.grid.is_room(cell) || self.doors.contains(cell) {
            return false;
        }
        self.grid.set_room(cell, true);
        self.free.insert(cell);
        self.room_count += 1;
        self.open_count += 1;
        self.shape_changed();
        true
    }

    pub fn add_door(&mut self, cell: usize) -> bool {
        if self.grid.is_room(cell) || !self.doors.insert(cell) {
            return false;
        }
        self.shape_changed();
        true
    }

    pub fn remove_door(&mut self, cell: usize) -> bool {
        if !self.doors.remove(cell) {
            return false;
        }
        self.shape_changed();
        true
    }

    pub fn clear_doors(&mut self) {
        if !self.doors.is_empty() {
            self.doors.clear();
            self.shape_changed();
        }
    }

    fn shape_changed(&mut self) {
        self.epoch += 1;
        self.recompute_reserved();
        self.invalidate();
    }

    fn recompute_reserved(&mut self) {
        self.reserved.clear();
        let doors: Vec<usize> = self.doors.iter().collect();
        for door in doors {
            for (dr, dc) in NEIGHBORS_4 {
                if let Some(n) = self.grid.neighbor(door, dr, dc) {
                    if self.grid.is_room(n) {
                        self.reserved.insert(n);
                    }
                }
            }
        }
    }

    fn invalidate(&self) {
        *self.stats.borrow_mut() = None;
        *self.must_reach_tiles.borrow_mut() = None;
    }

    fn rebuild_caches(&mut self) {
        let size = self.grid.len();
        self.owner.iter_mut().for_each(|v| *v = EMPTY);
        self.group_of.iter_mut().for_each(|v| *v = EMPTY);
        self.cover.iter_mut().for_each(|v| *v = 0);
        self.blockers.iter_mut().for_each(|v| *v = 0);
        self.must_reach.iter_mut().for_each(|v| *v = 0);
        self.free = TileSet::from_keys(size, self.grid.room_tiles());
        self.room_count = self.grid.room_count();
        self.open_count = self.room_count;
        self.group_counts.iter_mut().for_each(|v| *v = 0);

        for index in 0..self.placements.len() {
            if self.set_occupancy(index) {
                warn!(
                    "Overlapping placement {:?} while rebuilding caches",
                    self.placements[index]
                );
            }
        }

        self.recompute_reserved();
        self.invalidate();
    }

    //
    // Snapshots
    //

    pub fn snapshot_light(&self) -> LightSnapshot {
        LightSnapshot {
            placements: self.placements.clone(),
            epoch: self.epoch,
        }
    }

    /// Restore placements. Refused (returns false) if the room or doors
    /// changed since the snapshot was taken.
    pub fn restore_light(&mut self, snapshot: &LightSnapshot) -> bool {
        if snapshot.epoch != self.epoch {
            warn!(
                "Refusing light snapshot from epoch {} in epoch {}",
                snapshot.epoch, self.epoch
            );
            return false;
        }
        if snapshot.placements == self.placements {
            return true;
        }
        self.placements = snapshot.placements.clone();
        self.rebuild_caches();
        true
    }

    pub fn snapshot_full(&self) -> FullSnapshot {
        FullSnapshot {
            room: self.grid.clone(),
            placements: self.placements.clone(),
            doors: self.doors.iter().collect(),
        }
    }

    pub fn restore_full(&mut self, snapshot: &FullSnapshot) {
        self.grid = snapshot.room.clone();
        self.doors = TileSet::from_keys(self.grid.len(), snapshot.doors.iter().copied());
        self.placements = snapshot.placements.clone();
        self.epoch += 1;
        self.rebuild_caches();
    }

    //
    // Randomness, budget and tracing
    //

    pub fn rng(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }

    pub fn rng_state(&self) -> RngState {
        self.rng.clone()
    }

    pub fn set_rng_state(&mut self, state: RngState) {
        self.rng = state;
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    }

    /// Cooperative yield/cancellation point. False means stop and unwind to
    /// the best state seen.
    pub fn checkpoint(&self) -> bool {
        self.budget.has_budget()
    }

    pub fn is_cancelled(&self) -> bool {
        self.budget.is_exhausted()
    }

    pub fn trace_start(&self) -> Option<Instant> {
        self.tracer.start()
    }

    pub fn trace_finish(&mut self, name: &str, started: Option<Instant>) {
        self.tracer.finish(name, started);
    }

    pub fn take_trace(&mut self) -> Option<PerfTrace> {
        self.tracer.take()
    }

    /// Final room, placements and doors.
    pub fn into_parts(self) -> (RoomGrid, Vec<Placement>, Vec<Location>) {
        let width = self.grid.width();
        let doors = self
            .doors
            .iter()
            .map(|key| Location::from_key(key, width))
            .collect();
        (self.grid, self.placements, doors)
    }

    #[cfg(test)]
    pub(crate) fn cache_fingerprint(&self) -> (Vec<u32>, Vec<u8>, Vec<u8>, Vec<u8>, Vec<usize>, usize) {
        (
            self.owner.clone(),
            self.cover.clone(),
            self.blockers.clone(),
            self.must_reach.clone(),
            self.free.iter().collect(),
            self.open_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    fn context<'a>(
        catalog: &'a Catalog,
        building: &'a Building,
        budget: &'a CpuBudget,
        room: RoomGrid,
    ) -> Context<'a> {
        Context::new(catalog, building, budget, room, &[], &[], 7, false)
    }

    #[test]
    fn clear_then_set_restores_caches() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = context(&catalog, &building, &budget, RoomGrid::filled(6, 5));

        assert!(ctx.try_place(Placement::new(BENCH, 1, 0, 1, 1)));
        assert!(ctx.try_place(Placement::new(STORAGE, 0, 0, 3, 4)));
        let before = ctx.cache_fingerprint();

        let removed = ctx.remove_placement(0);
        assert_ne!(ctx.cache_fingerprint(), before);
        assert!(ctx.add_placement(removed));

        // Index order changed (swap_remove), so compare everything but owners.
        let after = ctx.cache_fingerprint();
        assert_eq!(before.1, after.1);
        assert_eq!(before.2, after.2);
        assert_eq!(before.3, after.3);
        assert_eq!(before.4, after.4);
        assert_eq!(before.5, after.5);
    }

    #[test]
    fn remove_relabels_moved_owner() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = context(&catalog, &building, &budget, RoomGrid::filled(6, 5));

        assert!(ctx.try_place(Placement::new(TOOLRACK, 0, 0, 0, 0)));
        assert!(ctx.try_place(Placement::new(TOOLRACK, 0, 0, 0, 5)));
        ctx.remove_placement(0);
        assert_eq!(ctx.owner(5), Some(0));
        assert_eq!(ctx.owner(0), None);
        assert!(ctx.is_free(0));
    }

    #[test]
    fn overlap_is_rolled_back() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = context(&catalog, &building, &budget, RoomGrid::filled(6, 5));

        assert!(ctx.add_placement(Placement::new(BENCH, 0, 0, 2, 2)));
        let before = ctx.cache_fingerprint();
        assert!(!ctx.add_placement(Placement::new(TOOLRACK, 0, 0, 2, 3)));
        assert_eq!(ctx.cache_fingerprint(), before);
        assert_eq!(ctx.placements().len(), 1);
    }

    #[test]
    fn light_snapshot_refused_after_shape_change() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = context(&catalog, &building, &budget, RoomGrid::filled(6, 5));

        let snapshot = ctx.snapshot_light();
        assert!(ctx.try_place(Placement::new(TOOLRACK, 0, 0, 2, 2)));
        assert!(ctx.restore_light(&snapshot));
        assert!(ctx.placements().is_empty());

        assert!(ctx.remove_room_tile(0));
        assert!(!ctx.restore_light(&snapshot));
    }

    #[test]
    fn full_snapshot_round_trips_shape() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["#####", "#...#", "#...#", "#####"]);
        let mut ctx = context(&catalog, &building, &budget, room);

        let snapshot = ctx.snapshot_full();
        assert!(ctx.add_door(ctx.grid().index(0, 2)));
        assert!(ctx.reserved().contains(ctx.grid().index(1, 2)));
        assert!(ctx.remove_room_tile(ctx.grid().index(2, 3)));
        assert_eq!(ctx.room_count(), 5);

        ctx.restore_full(&snapshot);
        assert_eq!(ctx.room_count(), 6);
        assert!(ctx.doors().is_empty());
        assert!(ctx.reserved().is_empty());
    }

    #[test]
    fn reserved_tiles_reject_blockers() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["#####", "#...#", "#...#", "#####"]);
        let mut ctx = context(&catalog, &building, &budget, room);
        ctx.add_door(ctx.grid().index(0, 2));

        assert_eq!(
            ctx.check_placement(&Placement::new(TOOLRACK, 0, 0, 1, 2), None),
            Err(Rejection::Reserved)
        );
    }

    #[test]
    fn rng_state_replays() {
        use rand::Rng;
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let mut ctx = context(&catalog, &building, &budget, RoomGrid::filled(3, 3));

        let state = ctx.rng_state();
        let first: u64 = ctx.rng().random();
        ctx.set_rng_state(state);
        let second: u64 = ctx.rng().random();
        assert_eq!(first, second);
    }

    #[test]
    fn disallowed_rotations_are_dropped_on_input() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let initial = [
            Placement::new(STORAGE, 0, 1, 0, 0),
            Placement::new(TOOLRACK, 0, 1, 2, 2),
            Placement::new(TOOLRACK, 0, 3, 4, 4),
        ];
        let mut ctx = Context::new(&catalog, &building, &budget, RoomGrid::filled(6, 6), &initial, &[], 1, false);

        assert_eq!(ctx.placements(), &[Placement::new(TOOLRACK, 0, 1, 2, 2)]);
        assert_eq!(ctx.group_count(STORAGE), 0);
        assert!(!ctx.add_placement(Placement::new(PLANT, 0, 2, 5, 5)));
        assert!(ctx.add_placement(Placement::new(PLANT, 0, 0, 5, 5)));
    }

    #[test]
    fn reserved_tiles_stay_in_the_room() {
        let catalog = workshop_catalog();
        let building = workshop_building();
        let budget = CpuBudget::unlimited();
        let room = room_from_ascii(&["#####", "#...#", "#...#", "#####"]);
        let mut ctx = context(&catalog, &building, &budget, room);
        let door = ctx.grid().index(0, 2);
        let inner = ctx.grid().index(1, 2);
        assert!(ctx.add_door(door));
        assert!(ctx.reserved().contains(inner));

        assert!(!ctx.remove_room_tile(inner));
        assert!(ctx.grid().is_room(inner));
        assert!(ctx.remove_room_tile(ctx.grid().index(2, 1)));
    }
}
