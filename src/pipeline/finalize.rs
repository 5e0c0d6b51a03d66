//! Final validation of a finished layout, with the revert path for layouts
//! that fail it.

use crate::context::{Context, FullSnapshot};
use crate::finish::doors::{blocked_doors, doors_within_floor, place_doors};
use crate::grid::check_room_connectivity;
use crate::oracles::{is_stable, is_walkable};
use crate::plan::Placement;
use serde::{Deserialize, Serialize};
use log::*;

/// Which hard constraints a layout meets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overlap_free: bool,
    pub in_room: bool,
    pub rotations: bool,
    pub connected: bool,
    pub walkable: bool,
    pub stable: bool,
    pub storage: bool,
    pub group_bounds: bool,
    pub doors_walkable: bool,
    pub isolation: bool,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures().is_empty()
    }

    /// Names of the failed checks.
    pub fn failures(&self) -> Vec<&'static str> {
        [
            (self.overlap_free, "overlap"),
            (self.in_room, "in_room"),
            (self.rotations, "rotation"),
            (self.connected, "connected"),
            (self.walkable, "walkable"),
            (self.stable, "stable"),
            (self.storage, "storage"),
            (self.group_bounds, "group_bounds"),
            (self.doors_walkable, "doors"),
            (self.isolation, "isolation"),
        ]
        .iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, name)| *name)
        .collect()
    }
}

/// No cell is covered by two of `placements`, checked from scratch rather
/// than from the context's own occupancy counts.
fn overlap_free(ctx: &Context, placements: &[Placement]) -> bool {
    let mut covered = vec![false; ctx.grid().len()];
    for placement in placements {
        for cell in ctx.placement_cells(placement) {
            if covered[cell] {
                return false;
            }
            covered[cell] = true;
        }
    }
    true
}

pub fn validate_layout(ctx: &Context) -> ValidationReport {
    let catalog = ctx.catalog();
    let building = ctx.building();

    ValidationReport {
        overlap_free: overlap_free(ctx, ctx.placements()),
        in_room: ctx.placements().iter().all(|p| ctx.fits_in_room(p)),
        rotations: ctx.placements().iter().all(|p| ctx.rotation_allowed(p)),
        connected: ctx.room_count() == 0 || check_room_connectivity(ctx.grid()),
        walkable: is_walkable(ctx),
        stable: !building.indoor || is_stable(ctx.grid()),
        storage: !building.requires_storage || ctx.stat_totals().storage_tiles > 0,
        group_bounds: catalog.groups.iter().enumerate().all(|(g, group)| {
            let count = ctx.group_count(g);
            count >= group.min_count() && count <= group.max_count()
        }),
        doors_walkable: blocked_doors(ctx) == 0,
        isolation: doors_within_floor(ctx),
    }
}

/// Validate the current layout; on failure go back to `pre_polish`, redo
/// the doors and validate again.
pub fn finalize_layout(ctx: &mut Context, pre_polish: &FullSnapshot) -> ValidationReport {
    let started = ctx.trace_start();
    let mut report = validate_layout(ctx);

    if !report.is_valid() {
        warn!("Polished layout failed validation ({:?}); reverting", report.failures());
        ctx.restore_full(pre_polish);
        place_doors(ctx);
        report = validate_layout(ctx);
        if !report.is_valid() {
            debug!("Pre-polish layout also fails: {:?}", report.failures());
        }
    }

    ctx.trace_finish("finalize", started);
    report
}
