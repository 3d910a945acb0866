//! The open-world exploration variant: agents with their own AI, projectiles and contact damage.

pub mod ai;
pub mod components;
pub mod scene;
pub mod systems;

pub use ai::evaluate;
pub use components::{AiState, ExploreEvent, ExploreStage, Owner};
pub use scene::{AgentSpawn, ExplorationScene};
