//! Centralized error types for the orchestration core.
//!
//! Only construction-time misuse is reported through these types. Runtime hiccups
//! (stale callbacks, out-of-phase answers, failed cosmetic effects, missing assets)
//! are recovered where they happen and only show up in the logs.

use crate::map::NodeId;

/// Main error type for the crate.
#[derive(thiserror::Error, Debug)]
pub enum GameError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("World map error: {0}")]
    Graph(#[from] GraphError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Effect error: {0}")]
    Effect(#[from] EffectError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Errors produced while decoding or validating launch configuration and tuning.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Malformed launch configuration: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to load tuning: {0}")]
    Tuning(String),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Tuning(error.to_string())
    }
}

/// Errors related to the world navigation graph.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node not found in world map: {0}")]
    NodeNotFound(NodeId),

    #[error("Connection already exists: from {from} to {to}")]
    DuplicateConnection { from: NodeId, to: NodeId },

    #[error("Node {0} cannot connect to itself")]
    SelfConnection(NodeId),

    #[error("World map has no nodes")]
    Empty,
}

/// A cosmetic effect could not be spawned. Never escapes a scene.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("Rendering surface is no longer available")]
    SurfaceReleased,

    #[error("Effect rejected: {0}")]
    Rejected(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),
}

/// Result type for fallible operations in this crate.
pub type GameResult<T> = Result<T, GameError>;
