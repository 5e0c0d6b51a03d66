pub mod catalog;
pub mod constants;
pub mod context;
pub mod finish;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod footprint;
pub mod grid;
pub mod location;
pub mod oracles;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod polish;
pub mod stats;
pub mod strategies;
pub mod trace;
pub mod validator;

pub use catalog::{Availability, Building, Catalog, Group, GroupStats, InputError, Item, RotationClass, StatDef, StatKind, TileType};
pub use grid::RoomGrid;
pub use location::Location;
pub use planner::*;
