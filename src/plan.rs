use crate::grid::RoomGrid;
use crate::location::*;
use crate::trace::PerfTrace;
use serde::{Deserialize, Serialize};

/// One concrete item instance at a room position. `row`/`col` address the
/// top-left corner of the rotated footprint's bounding box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    #[serde(rename = "g")]
    pub group: usize,
    #[serde(rename = "i")]
    pub item: usize,
    #[serde(rename = "r")]
    pub rotation: u8,
    pub row: usize,
    pub col: usize,
}

impl Placement {
    pub fn new(group: usize, item: usize, rotation: u8, row: usize, col: usize) -> Self {
        Placement {
            group,
            item,
            rotation,
            row,
            col,
        }
    }

    /// The same placement shifted by `(dr, dc)`, if that stays non-negative.
    pub fn shifted(&self, dr: i32, dc: i32) -> Option<Placement> {
        let row = self.row as i32 + dr;
        let col = self.col as i32 + dc;
        if row < 0 || col < 0 {
            return None;
        }
        Some(Placement {
            row: row as usize,
            col: col as usize,
            ..*self
        })
    }

    pub fn anchor(&self) -> Location {
        Location::new(self.row, self.col)
    }
}

/// Sub-scores for plan quality analysis.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanScore {
    pub total: f64,
    pub primary: f64,
    pub efficiency_shortfall: f64,
    pub relative_shortfall: f64,
    pub density: f64,
    pub isolation: f64,
}

/// The planner's output: the (possibly trimmed) room, its furniture and doors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub room: RoomGrid,
    pub placements: Vec<Placement>,
    pub doors: Vec<Location>,
    pub score: PlanScore,
    /// Whether the returned layout passed final validation.
    pub valid: bool,
    #[serde(default)]
    pub trace: Option<PerfTrace>,
}

impl Plan {
    /// Placements belonging to one group.
    pub fn group_placements(&self, group: usize) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(move |p| p.group == group)
    }

    pub fn group_count(&self, group: usize) -> usize {
        self.group_placements(group).count()
    }
}
