//! Whole-layout checks re-run after accepted mutations.
//!
//! * **walkability** - one flood over the open tiles, plus the must-reach and
//!   per-piece service checks.
//! * **stability** - ray-cast structural support and support pillar placement.
//! * **isolation** - how well the room's perimeter is sealed by walls and doors.
//!
//! Room connectivity itself lives with the grid in `check_room_connectivity`.

pub mod isolation;
pub mod stability;
pub mod walkability;

pub use isolation::*;
pub use stability::*;
pub use walkability::*;
