//! Public API for the room furnisher.
//!
//! The `PlannerBuilder` provides a fluent, append-only API for configuring a
//! run: tuning, tracing, the seed offset, the strategy list and the CPU
//! budget. `plan_room` runs with the defaults.

use crate::catalog::{Building, Catalog, InputError};
use crate::constants::*;
use crate::context::Context;
use crate::grid::RoomGrid;
use crate::location::Location;
use crate::oracles::isolation_score;
use crate::pipeline::{run_pipeline, CpuBudget};
use crate::strategies::{default_strategies, Strategy};
use fnv::FnvHasher;
use log::*;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

pub use crate::pipeline::finalize::ValidationReport;
pub use crate::plan::{Placement, Plan, PlanScore};

/// Weights of the layout objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub primary: f64,
    pub efficiency_penalty: f64,
    pub relative_penalty: f64,
    pub secondary: f64,
    pub density_bonus: f64,
    pub mandatory_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            primary: PRIMARY_WEIGHT,
            efficiency_penalty: EFFICIENCY_PENALTY,
            relative_penalty: RELATIVE_PENALTY,
            secondary: SECONDARY_WEIGHT,
            density_bonus: DENSITY_BONUS,
            mandatory_penalty: MANDATORY_PENALTY,
        }
    }
}

/// Every tunable of a run. Missing fields deserialize to their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub weights: ScoreWeights,
    pub hero_density_ratio: f64,
    pub strip_candidates: usize,
    pub sa_iterations: usize,
    pub sa_iterations_large: usize,
    pub sa_initial_temperature: f64,
    pub large_room_tiles: usize,
    /// Polish attempts per candidate. `None` picks by room size.
    pub polish_seeds: Option<usize>,
    pub max_trim_passes: usize,
    pub max_pillar_iterations: usize,
    pub min_isolation: f64,
    pub max_doors: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            weights: ScoreWeights::default(),
            hero_density_ratio: HERO_DENSITY_RATIO,
            strip_candidates: STRIP_CANDIDATES,
            sa_iterations: SA_ITERATIONS,
            sa_iterations_large: SA_ITERATIONS_LARGE,
            sa_initial_temperature: SA_INITIAL_TEMPERATURE,
            large_room_tiles: LARGE_ROOM_TILES,
            polish_seeds: None,
            max_trim_passes: MAX_TRIM_PASSES,
            max_pillar_iterations: MAX_PILLAR_ITERATIONS,
            min_isolation: MIN_ISOLATION,
            max_doors: MAX_DOORS,
        }
    }
}

/// Everything the planner consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanRequest {
    pub building: Option<Building>,
    pub catalog: Option<Catalog>,
    pub room: RoomGrid,
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default)]
    pub doors: Vec<Location>,
    #[serde(default)]
    pub trace: bool,
}

impl PlanRequest {
    pub fn new(building: Building, catalog: Catalog, room: RoomGrid) -> Self {
        PlanRequest {
            building: Some(building),
            catalog: Some(catalog),
            room,
            placements: Vec::new(),
            doors: Vec::new(),
            trace: false,
        }
    }

    pub fn validate(&self) -> Result<(&Building, &Catalog), InputError> {
        let building = self.building.as_ref().ok_or(InputError::MissingBuilding)?;
        let catalog = self.catalog.as_ref().ok_or(InputError::MissingCatalog)?;
        if self.room.len() != self.room.width() * self.room.height() {
            return Err(InputError::GridSizeMismatch);
        }
        if self.room.room_count() == 0 {
            return Err(InputError::EmptyRoom);
        }
        catalog.validate()?;
        building.validate(catalog)?;
        Ok((building, catalog))
    }

    /// The request echoed back as a plan, for inputs that cannot be worked on.
    fn unchanged(self) -> Plan {
        Plan {
            room: self.room,
            placements: self.placements,
            doors: self.doors,
            score: PlanScore::default(),
            valid: false,
            trace: None,
        }
    }
}

/// Deterministic run seed from the building id and the room's shape.
pub fn run_seed(building: &Building, room: &RoomGrid, offset: u64) -> u64 {
    let mut hasher = FnvHasher::default();
    building.id.hash(&mut hasher);
    room.width().hash(&mut hasher);
    room.height().hash(&mut hasher);
    room.room_count().hash(&mut hasher);
    hasher.finish().wrapping_add(offset)
}

/// Append-only builder for configuring a planning run.
pub struct PlannerBuilder {
    config: PlannerConfig,
    trace: Option<bool>,
    seed_offset: u64,
    strategies: Option<Vec<Box<dyn Strategy>>>,
    budget: Option<CpuBudget>,
}

impl PlannerBuilder {
    pub fn new() -> Self {
        PlannerBuilder {
            config: PlannerConfig::default(),
            trace: None,
            seed_offset: 0,
            strategies: None,
            budget: None,
        }
    }

    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Force the trace on or off regardless of the request.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = Some(enabled);
        self
    }

    /// Added to the derived seed, for reruns that should explore differently.
    pub fn seed_offset(mut self, offset: u64) -> Self {
        self.seed_offset = offset;
        self
    }

    /// Replace the default strategy list.
    pub fn strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn budget(mut self, budget: CpuBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Run the planner. Invalid input is returned unchanged.
    pub fn plan(self, request: PlanRequest) -> Plan {
        let validated = request
            .validate()
            .map(|(building, catalog)| (building.clone(), catalog.clone()));
        let (building, catalog) = match validated {
            Ok(inputs) => inputs,
            Err(err) => {
                warn!("Not planning room: {}", err);
                return request.unchanged();
            }
        };

        let budget = self.budget.unwrap_or_else(CpuBudget::unlimited);
        let strategies = self.strategies.unwrap_or_else(default_strategies);
        let trace = self.trace.unwrap_or(request.trace);
        let seed = run_seed(&building, &request.room, self.seed_offset);

        let mut ctx = Context::new(
            &catalog,
            &building,
            &budget,
            request.room,
            &request.placements,
            &request.doors,
            seed,
            trace,
        )
        .with_config(self.config);

        let outcome = run_pipeline(&mut ctx, &strategies, seed);
        let isolation = isolation_score(ctx.grid(), ctx.doors());
        let score = outcome.score.to_plan_score(isolation);
        let valid = outcome.report.is_valid();
        let perf = ctx.take_trace();
        let (room, placements, doors) = ctx.into_parts();

        info!(
            "Planned {} ({}x{}): {} placements, {} doors, score {:.3}, isolation {:.3}{}",
            building.id,
            room.width(),
            room.height(),
            placements.len(),
            doors.len(),
            score.total,
            isolation,
            if valid { "" } else { " (invalid)" }
        );

        Plan {
            room,
            placements,
            doors,
            score,
            valid,
            trace: perf,
        }
    }
}

impl Default for PlannerBuilder {
    fn default() -> Self {
        PlannerBuilder::new()
    }
}

/// Run planning to completion with the default configuration.
pub fn plan_room(request: PlanRequest) -> Plan {
    PlannerBuilder::new().plan(request)
}

/// Run planning with a cooperative budget (for hosts that need to yield).
pub fn plan_room_with_budget<F>(request: PlanRequest, should_continue: F) -> Plan
where
    F: Fn() -> bool + 'static,
{
    PlannerBuilder::new().budget(CpuBudget::new(should_continue)).plan(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;

    #[test]
    fn missing_catalog_returns_input() {
        let room = room_from_ascii(&["...", "..."]);
        let request = PlanRequest {
            building: Some(workshop_building()),
            catalog: None,
            room: room.clone(),
            placements: Vec::new(),
            doors: vec![Location::new(0, 0)],
            trace: false,
        };
        assert_eq!(request.validate().err(), Some(InputError::MissingCatalog));

        let plan = plan_room(request);
        assert_eq!(plan.room, room);
        assert_eq!(plan.doors, vec![Location::new(0, 0)]);
        assert!(plan.placements.is_empty());
        assert!(!plan.valid);
    }

    #[test]
    fn empty_room_is_rejected() {
        let request = PlanRequest::new(workshop_building(), workshop_catalog(), RoomGrid::new(3, 3));
        assert_eq!(request.validate().err(), Some(InputError::EmptyRoom));
    }

    #[test]
    fn malformed_room_is_returned_unchanged() {
        let room: RoomGrid = serde_json::from_str(r#"{"width": 4, "height": 4, "room": [true, true, true, true, true, true]}"#)
            .expect("room");
        let request = PlanRequest::new(workshop_building(), workshop_catalog(), room.clone());
        assert_eq!(request.validate().err(), Some(InputError::GridSizeMismatch));

        let plan = plan_room(request);
        assert_eq!(plan.room, room);
        assert!(plan.placements.is_empty());
        assert!(plan.doors.is_empty());
        assert!(!plan.valid);
    }

    #[test]
    fn seed_depends_on_room_shape() {
        let building = workshop_building();
        let a = run_seed(&building, &RoomGrid::filled(4, 4), 0);
        assert_eq!(a, run_seed(&building, &RoomGrid::filled(4, 4), 0));
        assert_ne!(a, run_seed(&building, &RoomGrid::filled(5, 4), 0));
        assert_eq!(a.wrapping_add(7), run_seed(&building, &RoomGrid::filled(4, 4), 7));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: PlannerConfig = serde_json::from_str(r#"{"max_doors": 2}"#).expect("config");
        assert_eq!(config.max_doors, 2);
        assert_eq!(config.sa_iterations, SA_ITERATIONS);
        assert_eq!(config.weights, ScoreWeights::default());
    }

    #[test]
    fn traced_run_records_phases() {
        let mut config = PlannerConfig::default();
        config.sa_iterations = 50;
        config.polish_seeds = Some(1);
        let request = PlanRequest::new(
            workshop_building(),
            workshop_catalog(),
            room_from_ascii(&["#######", "#.....#", "#.....#", "#.....#", "#######"]),
        );
        let plan = PlannerBuilder::new()
            .config(config)
            .trace(true)
            .strategies(vec![Box::new(crate::strategies::StripStrategy)])
            .plan(request);
        let trace = plan.trace.expect("trace enabled");
        assert!(trace.get("pillars").is_some());
    }
}
