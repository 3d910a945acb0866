//! Real-time orchestration core for educational mini-games.
//!
//! A host creates one [`events::EventBus`] and one [`scheduler::Scheduler`], wraps them in a
//! [`scene::SceneContext`] and lets a [`scene::SceneContainer`] own the running scene.

pub mod battle;
pub mod config;
pub mod constants;
pub mod effects;
pub mod error;
pub mod events;
pub mod explore;
pub mod lifecycle;
pub mod logging;
pub mod map;
pub mod scene;
pub mod scheduler;
pub mod score;
