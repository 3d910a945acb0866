use bevy_ecs::{bundle::Bundle, component::Component, entity::Entity, event::Event, resource::Resource};
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

/// World-space position.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

/// World units per second.
#[derive(Component, Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);

/// A tag component for the player-controlled entity.
#[derive(Component, Debug, Default)]
pub struct Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AiState {
    #[default]
    Patrol,
    Chase,
    Attack,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    /// Facing implied by a horizontal velocity; `None` when not moving sideways.
    pub fn from_velocity(velocity: Vec2) -> Option<Facing> {
        if velocity.x > f32::EPSILON {
            Some(Facing::Right)
        } else if velocity.x < -f32::EPSILON {
            Some(Facing::Left)
        } else {
            None
        }
    }
}

/// An enemy with its own AI state machine.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Agent {
    pub hp: u32,
    pub max_hp: u32,
    pub speed: f32,
    pub state: AiState,
    pub facing: Facing,
    pub patrol_target: Vec2,
    /// Patrol waypoints are picked around this point.
    pub home: Vec2,
    /// Simulation time of the last shot, if any.
    pub last_attack: Option<f32>,
    pub attack_cooldown: f32,
    /// Remaining wind-up before the pending shot leaves.
    pub telegraph: Option<f32>,
    pub elite: bool,
}

impl Agent {
    pub fn is_dead(&self) -> bool {
        self.state == AiState::Dead
    }

    /// Whether the per-agent cooldown has elapsed at time `now`.
    pub fn can_attack(&self, now: f32) -> bool {
        self.last_attack.map_or(true, |last| now - last >= self.attack_cooldown)
    }
}

#[derive(Bundle)]
pub struct AgentBundle {
    pub agent: Agent,
    pub position: Position,
    pub velocity: Velocity,
}

#[derive(Bundle)]
pub struct PlayerBundle {
    pub player: Player,
    pub position: Position,
    pub velocity: Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Player,
    Agent,
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub owner: Owner,
    pub age: f32,
    pub max_age: f32,
}

#[derive(Bundle)]
pub struct ProjectileBundle {
    pub projectile: Projectile,
    pub position: Position,
    pub velocity: Velocity,
}

/// Present on the player while a damage window is running.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Invulnerable {
    pub remaining: f32,
    pub flicker_timer: f32,
    pub visible: bool,
}

impl Invulnerable {
    pub fn new(duration: f32) -> Self {
        Self {
            remaining: duration,
            flicker_timer: 0.0,
            visible: false,
        }
    }
}

#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct DeltaTime {
    pub seconds: f32,
}

/// Simulation time in seconds since the scene started.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock(pub f32);

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::new(width, height),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn clamp(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min, self.max)
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHealth {
    pub lives: u8,
    pub max_lives: u8,
}

/// Victory condition bookkeeping.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefeatTally {
    pub defeated: u32,
    pub total: u32,
}

impl DefeatTally {
    pub fn all_defeated(&self) -> bool {
        self.total > 0 && self.defeated >= self.total
    }
}

#[derive(Resource)]
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

/// High-level stage of the exploration scene.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExploreStage {
    #[default]
    Playing,
    Victory,
    Defeated,
}

/// Movement and fire requests from the host, consumed by the next tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    pub direction: Vec2,
    pub fire: Option<Vec2>,
}

/// Facts produced by the simulation and drained by the scene after each tick.
#[derive(Event, Debug, Clone, PartialEq)]
pub enum ExploreEvent {
    StateChanged { agent: Entity, from: AiState, to: AiState },
    Telegraph { at: Vec2, duration: f32 },
    Fired { owner: Owner, at: Vec2 },
    AgentHit { agent: Entity, hp: u32 },
    AgentDefeated { agent: Entity, at: Vec2 },
    PlayerDamaged { lives: u8 },
    Flicker { visible: bool },
    StageChanged(ExploreStage),
}
