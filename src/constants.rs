//! Tuning constants shared by the search phases. Most of these seed the
//! defaults in [`crate::planner::PlannerConfig`].

/// `TileType::data` value that marks a storage tile.
pub const STORAGE_TILE_DATA: u32 = 1;

/// Support below `1 - STABILITY_EPSILON` is unstable.
pub const STABILITY_EPSILON: f64 = 1e-6;
/// Half-size of the square the support rays are cast towards.
pub const SUPPORT_RAY_RADIUS: i32 = 4;
/// Distance (in ray steps) at which a wall stops contributing support.
pub const SUPPORT_FALLOFF: f64 = 3.5;
/// Chebyshev radius searched for a pillar around an unstable tile.
pub const PILLAR_SEARCH_RADIUS: i32 = 5;
/// Pillar passes for small rooms. Larger rooms get one pass per
/// `TILES_PER_PILLAR_PASS` room tiles.
pub const MAX_PILLAR_ITERATIONS: usize = 64;
pub const TILES_PER_PILLAR_PASS: usize = 4;

/// Items within this fraction of a group's best density are hero items.
pub const HERO_DENSITY_RATIO: f64 = 0.85;
/// Number of (group, item, rotation) triples tried by the strip strategy.
pub const STRIP_CANDIDATES: usize = 4;

/// Rejections after which a best-position search reports a deep scan.
pub const MAX_VALIDATION_ATTEMPTS: usize = 48;
/// Evictions tried while forcing a mandatory group to its minimum.
pub const MAX_MANDATORY_EVICTIONS: usize = 8;
pub const MAX_BALANCE_ROUNDS: usize = 32;

pub const SA_ITERATIONS: usize = 1600;
pub const SA_ITERATIONS_LARGE: usize = 600;
pub const SA_INITIAL_TEMPERATURE: f64 = 4.0;
/// Room tile count above which the annealing budget is reduced and only one
/// polish seed is used.
pub const LARGE_ROOM_TILES: usize = 300;
/// Window (Chebyshev radius) for reinsertion searches during annealing.
pub const SA_REINSERT_RADIUS: i32 = 4;
pub const SA_CHECKPOINT_INTERVAL: usize = 64;

pub const MAX_SQUEEZE_ROUNDS: usize = 8;
pub const MAX_REPACK_VICTIMS: usize = 4;
pub const MAX_TRIM_PASSES: usize = 6;

/// Isolation score that door placement must not drop below.
pub const MIN_ISOLATION: f64 = 0.995;
/// Seal contributed by a room edge that faces a door.
pub const DOOR_EDGE_SEAL: f64 = 0.95;
pub const MAX_DOORS: usize = 4;
/// Average walk distance a further door has to save to be worth adding.
pub const MIN_DOOR_GAIN: f64 = 1.0;

pub const PRIMARY_WEIGHT: f64 = 10.0;
pub const EFFICIENCY_PENALTY: f64 = 4.0;
pub const RELATIVE_PENALTY: f64 = 4.0;
pub const SECONDARY_WEIGHT: f64 = 1.0;
pub const DENSITY_BONUS: f64 = 2.0;
pub const MANDATORY_PENALTY: f64 = 25.0;
/// Weight of non-primary stats when ranking items by value density.
pub const SECONDARY_DENSITY_WEIGHT: f64 = 0.25;
