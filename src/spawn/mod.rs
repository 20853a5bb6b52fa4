//! Random spawning: placement sampling, live-item tracking, batch runs

mod coordinator;
mod registry;
mod transform;

pub use coordinator::SpawnCoordinator;
pub use registry::{ActiveItem, ActiveItemRegistry, ItemId};
pub use transform::{ordered, position_bounds, Placement, TransformSampler};

use serde::Serialize;

/// Why a spawn call did (or did not) materialize anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnOutcome {
    /// The unit loop ran; see `succeeded` for how many units made it
    Spawned,
    /// Catalog empty or folder not configured
    NoEligibleFiles,
    /// `max_active` items already live
    AtCapacity,
    /// Host has no scene to spawn into
    NoActiveScene,
}

/// Result of one spawn call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpawnResult {
    /// Units the batch tried to create
    pub attempted: usize,
    /// Units that made it into the scene
    pub succeeded: usize,
    /// Live items once the batch finished
    pub active_count_after: usize,
    pub outcome: SpawnOutcome,
}
