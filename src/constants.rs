//! This module contains all the default constants used by the scenes.
//!
//! Durations are in seconds, distances in world units. Every value here can be
//! overridden at runtime through [`crate::config::Tuning`].

/// Nominal simulation rate used by hosts that drive the core at a fixed step.
pub const TICK_RATE: f32 = 60.0;

/// Default number of player lives when the launch configuration omits it.
pub const DEFAULT_MAX_LIVES: u8 = 3;

/// Longest accepted tuning duration: one hour.
pub const MAX_TUNING_DURATION: f32 = 3600.0;

/// Battle animation legs.
pub mod battle {
    /// Time for the caster to wind up and release a projectile.
    pub const CAST: f32 = 0.45;
    /// Hurt animation played by the boss after an impact.
    pub const HURT: f32 = 0.5;
    /// Boss attack animation after a wrong answer.
    pub const ATTACK: f32 = 0.6;
    /// Pause after the boss attack before the next question is requested.
    pub const COOLDOWN: f32 = 0.4;
    /// Delay between the last life being lost and `game_over`.
    pub const DEATH_DELAY: f32 = 1.2;
    /// First leg of the finishing sequence.
    pub const APPROACH: f32 = 0.8;
    /// Second leg of the finishing sequence.
    pub const STRIKE: f32 = 0.5;
    /// Distance a projectile travels from the player to the boss.
    pub const ARENA_DISTANCE: f32 = 320.0;
    /// Answer window for the timed-runner variant.
    pub const RUNNER_ANSWER_LIMIT: f32 = 10.0;
}

/// Exploration AI and combat.
pub mod explore {
    pub const DETECTION_RANGE: f32 = 220.0;
    pub const ATTACK_RANGE: f32 = 90.0;
    /// Radius around the current waypoint at which a new one is picked.
    pub const WAYPOINT_RADIUS: f32 = 8.0;
    /// Maximum distance of a patrol waypoint from the agent's home point.
    pub const PATROL_RADIUS: f32 = 120.0;
    /// Fraction of full speed used while patrolling.
    pub const PATROL_SPEED_FACTOR: f32 = 0.5;
    pub const AGENT_SPEED: f32 = 70.0;
    pub const AGENT_HP: u32 = 2;
    pub const ATTACK_COOLDOWN: f32 = 1.8;
    /// Wind-up shown before an agent's shot leaves.
    pub const TELEGRAPH: f32 = 0.35;
    pub const ELITE_HP_MULTIPLIER: u32 = 3;
    pub const ELITE_SPEED_FACTOR: f32 = 0.6;
    pub const PLAYER_SPEED: f32 = 140.0;
    pub const PROJECTILE_SPEED: f32 = 260.0;
    pub const PROJECTILE_MAX_AGE: f32 = 2.5;
    /// Proximity at which a projectile counts as a hit.
    pub const HIT_RADIUS: f32 = 14.0;
    /// Proximity at which an agent touching the player deals damage.
    pub const CONTACT_RADIUS: f32 = 18.0;
    pub const INVULNERABILITY: f32 = 1.0;
    pub const FLICKER_INTERVAL: f32 = 0.1;
    pub const VICTORY_DELAY: f32 = 1.5;
    pub const DEATH_DELAY: f32 = 1.2;
    pub const WORLD_WIDTH: f32 = 960.0;
    pub const WORLD_HEIGHT: f32 = 640.0;
    /// Upper bound on agents placed from a launch config's `maxProgress`.
    pub const MAX_AGENTS: u32 = 64;
    /// Every n-th spawned agent is an elite.
    pub const ELITE_EVERY: usize = 4;
    /// Distance of the player's spawn point from the bottom edge.
    pub const PLAYER_SPAWN_MARGIN: f32 = 48.0;
    /// Seed used for agent placement and patrol waypoints when the launch config has none.
    pub const DEFAULT_SEED: u64 = 0x5EED;
}

/// World navigation map.
pub mod map {
    /// Marker travel speed in world units per second.
    pub const MARKER_SPEED: f32 = 240.0;
}

/// Scoring thresholds for the session summary.
pub mod scoring {
    /// Accuracy needed for a two-star rating.
    pub const TWO_STAR_ACCURACY: f32 = 0.80;
    /// Accuracy needed for a three-star rating.
    pub const THREE_STAR_ACCURACY: f32 = 1.0;
    /// Points awarded for each agent defeated in exploration.
    pub const POINTS_PER_DEFEAT: u32 = 10;
}
