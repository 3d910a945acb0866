//! The world navigation graph of unlockable levels.

pub mod graph;
pub mod scene;

pub use graph::{EdgeStyle, LevelConfig, LevelStart, NodeId, NodeState, WorldGraph, WorldNode};
pub use scene::{SelectOutcome, WorldMapScene};
