//! Shape passes that run once the furniture is settled.

pub mod doors;
pub mod trim;

pub use doors::{door_site, door_sites, has_door_access, place_doors, seed_door, DoorSite};
pub use trim::trim_room;

use crate::context::Context;
use crate::oracles::place_support_pillars;
use log::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FinishReport {
    pub trimmed: usize,
    pub pillars: usize,
    pub doors: usize,
}

/// Trim, then support pillars (indoor only), then doors.
pub fn finish_layout(ctx: &mut Context) -> FinishReport {
    let trimmed = trim_room(ctx);

    let pillars = if ctx.is_indoor() {
        let started = ctx.trace_start();
        let placed = place_support_pillars(ctx);
        ctx.trace_finish("pillars", started);
        placed
    } else {
        0
    };

    let doors = place_doors(ctx);

    let report = FinishReport {
        trimmed,
        pillars,
        doors,
    };
    debug!("Finish: {:?}", report);
    report
}
