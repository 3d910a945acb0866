//! Launch configuration and runtime tuning.
//!
//! The launch configuration is decoded once from the host's JSON and is read-only
//! afterwards. Tuning carries every timing and range knob, defaulting to
//! [`crate::constants`] and overridable through `PLAYFIELD_*` environment variables.

use bevy_ecs::resource::Resource;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::constants::{self, DEFAULT_MAX_LIVES, MAX_TUNING_DURATION};
use crate::error::ConfigError;

/// The three battle mini-game flavours. They share one state machine and differ only in timing data.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BattleVariant {
    /// A caster hurls spells at the boss from range.
    #[default]
    MeleeCaster,
    /// The player throws the session's item at the boss.
    RangedThrow,
    /// The player runs from the boss and must answer inside a time limit.
    TimedRunner,
}

/// Whether player lives reset when a battle is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LivesPolicy {
    /// Every launch and replay starts with full lives.
    #[default]
    PerBattle,
    /// A replay resumes with the lives left over from the previous attempt.
    CarryOver,
}

/// The kind of scene a launch configuration is played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SceneKind {
    Battle,
    Exploration,
}

/// Session configuration supplied once by the host when a mini-game launches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawLaunchConfig")]
pub struct LaunchConfig {
    pub theme: String,
    /// Boss or enemy archetype; selects the projectile profile.
    pub archetype: String,
    pub item_type: String,
    /// Amount of progress needed to win. For battles this is the boss's hit-points.
    pub max_progress: u32,
    pub max_lives: u8,
    pub variant: BattleVariant,
    pub lives_policy: LivesPolicy,
    /// Seed for deterministic AI waypoints; a fixed default is used when absent.
    pub seed: Option<u64>,
}

/// Raw configuration exactly as the host sends it.
/// This is an intermediate representation that gets validated and converted to [`LaunchConfig`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLaunchConfig {
    #[serde(default)]
    theme: String,
    archetype: String,
    #[serde(default)]
    item_type: String,
    max_progress: u32,
    #[serde(default)]
    max_lives: Option<u8>,
    #[serde(default)]
    variant: BattleVariant,
    #[serde(default)]
    lives_policy: LivesPolicy,
    #[serde(default)]
    seed: Option<u64>,
}

impl TryFrom<RawLaunchConfig> for LaunchConfig {
    type Error = ConfigError;

    fn try_from(raw: RawLaunchConfig) -> Result<Self, Self::Error> {
        if raw.max_progress == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxProgress",
                reason: "must be at least 1".to_string(),
            });
        }

        let max_lives = raw.max_lives.unwrap_or(DEFAULT_MAX_LIVES);
        if max_lives == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxLives",
                reason: "must be at least 1".to_string(),
            });
        }

        if raw.archetype.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "archetype",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(LaunchConfig {
            theme: raw.theme,
            archetype: raw.archetype,
            item_type: raw.item_type,
            max_progress: raw.max_progress,
            max_lives,
            variant: raw.variant,
            lives_policy: raw.lives_policy,
            seed: raw.seed,
        })
    }
}

impl LaunchConfig {
    /// Creates a configuration with default lives, variant and lives policy.
    pub fn new(theme: impl Into<String>, archetype: impl Into<String>, item_type: impl Into<String>, max_progress: u32) -> Self {
        Self {
            theme: theme.into(),
            archetype: archetype.into(),
            item_type: item_type.into(),
            max_progress: max_progress.max(1),
            max_lives: DEFAULT_MAX_LIVES,
            variant: BattleVariant::default(),
            lives_policy: LivesPolicy::default(),
            seed: None,
        }
    }

    /// Decodes and validates the host's launch JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawLaunchConfig = serde_json::from_str(json)?;
        raw.try_into()
    }

    pub fn with_max_lives(mut self, max_lives: u8) -> Self {
        self.max_lives = max_lives.max(1);
        self
    }

    pub fn with_variant(mut self, variant: BattleVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_lives_policy(mut self, lives_policy: LivesPolicy) -> Self {
        self.lives_policy = lives_policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Durations of each battle animation leg, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleTuning {
    pub cast: f32,
    pub hurt: f32,
    pub attack: f32,
    pub cooldown: f32,
    pub death_delay: f32,
    pub approach: f32,
    pub strike: f32,
    pub arena_distance: f32,
    pub runner_answer_limit: f32,
}

impl Default for BattleTuning {
    fn default() -> Self {
        use constants::battle::*;
        Self {
            cast: CAST,
            hurt: HURT,
            attack: ATTACK,
            cooldown: COOLDOWN,
            death_delay: DEATH_DELAY,
            approach: APPROACH,
            strike: STRIKE,
            arena_distance: ARENA_DISTANCE,
            runner_answer_limit: RUNNER_ANSWER_LIMIT,
        }
    }
}

/// AI ranges and combat knobs for the exploration simulation.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiTuning {
    pub detection_range: f32,
    pub attack_range: f32,
    pub waypoint_radius: f32,
    pub patrol_radius: f32,
    pub patrol_speed_factor: f32,
    pub agent_speed: f32,
    pub agent_hp: u32,
    pub attack_cooldown: f32,
    pub telegraph: f32,
    pub elite_hp_multiplier: u32,
    pub elite_speed_factor: f32,
    pub player_speed: f32,
    pub projectile_speed: f32,
    pub projectile_max_age: f32,
    pub hit_radius: f32,
    pub contact_radius: f32,
    pub invulnerability: f32,
    pub flicker_interval: f32,
    pub victory_delay: f32,
    pub death_delay: f32,
    pub world_width: f32,
    pub world_height: f32,
}

impl Default for AiTuning {
    fn default() -> Self {
        use constants::explore::*;
        Self {
            detection_range: DETECTION_RANGE,
            attack_range: ATTACK_RANGE,
            waypoint_radius: WAYPOINT_RADIUS,
            patrol_radius: PATROL_RADIUS,
            patrol_speed_factor: PATROL_SPEED_FACTOR,
            agent_speed: AGENT_SPEED,
            agent_hp: AGENT_HP,
            attack_cooldown: ATTACK_COOLDOWN,
            telegraph: TELEGRAPH,
            elite_hp_multiplier: ELITE_HP_MULTIPLIER,
            elite_speed_factor: ELITE_SPEED_FACTOR,
            player_speed: PLAYER_SPEED,
            projectile_speed: PROJECTILE_SPEED,
            projectile_max_age: PROJECTILE_MAX_AGE,
            hit_radius: HIT_RADIUS,
            contact_radius: CONTACT_RADIUS,
            invulnerability: INVULNERABILITY,
            flicker_interval: FLICKER_INTERVAL,
            victory_delay: VICTORY_DELAY,
            death_delay: DEATH_DELAY,
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapTuning {
    pub marker_speed: f32,
}

impl Default for MapTuning {
    fn default() -> Self {
        Self {
            marker_speed: constants::map::MARKER_SPEED,
        }
    }
}

/// Every timing and range knob used by the scenes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tuning {
    pub battle: BattleTuning,
    pub explore: AiTuning,
    pub map: MapTuning,
}

impl Tuning {
    /// Loads tuning from the defaults, overlaid with `PLAYFIELD_*` environment variables.
    ///
    /// Nested keys are separated by a double underscore, e.g. `PLAYFIELD_BATTLE__HURT=0.7`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::from(Serialized::defaults(Tuning::default())).merge(Env::prefixed("PLAYFIELD_").split("__")))
    }

    /// Extracts and validates tuning from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let tuning: Tuning = figment.extract()?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Checks that every duration lies within `0..=MAX_TUNING_DURATION` and every range is sensible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.battle;
        let durations = [
            ("battle.cast", b.cast),
            ("battle.hurt", b.hurt),
            ("battle.attack", b.attack),
            ("battle.cooldown", b.cooldown),
            ("battle.death_delay", b.death_delay),
            ("battle.approach", b.approach),
            ("battle.strike", b.strike),
            ("battle.runner_answer_limit", b.runner_answer_limit),
            ("explore.attack_cooldown", self.explore.attack_cooldown),
            ("explore.telegraph", self.explore.telegraph),
            ("explore.invulnerability", self.explore.invulnerability),
            ("explore.victory_delay", self.explore.victory_delay),
            ("explore.death_delay", self.explore.death_delay),
        ];
        for (field, value) in durations {
            if !value.is_finite() || !(0.0..=MAX_TUNING_DURATION).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("expected a duration between 0 and {MAX_TUNING_DURATION} seconds, got {value}"),
                });
            }
        }

        let positive = [
            ("battle.arena_distance", b.arena_distance),
            ("explore.projectile_speed", self.explore.projectile_speed),
            ("explore.projectile_max_age", self.explore.projectile_max_age),
            ("explore.flicker_interval", self.explore.flicker_interval),
            ("explore.detection_range", self.explore.detection_range),
            ("explore.hit_radius", self.explore.hit_radius),
            ("explore.contact_radius", self.explore.contact_radius),
            ("explore.agent_speed", self.explore.agent_speed),
            ("explore.player_speed", self.explore.player_speed),
            ("explore.patrol_speed_factor", self.explore.patrol_speed_factor),
            ("explore.elite_speed_factor", self.explore.elite_speed_factor),
            ("explore.world_width", self.explore.world_width),
            ("explore.world_height", self.explore.world_height),
            ("map.marker_speed", self.map.marker_speed),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("expected a positive value, got {value}"),
                });
            }
        }

        if self.explore.agent_hp == 0 {
            return Err(ConfigError::InvalidValue {
                field: "explore.agent_hp",
                reason: "agents need at least one hit-point".to_string(),
            });
        }

        if self.explore.attack_range >= self.explore.detection_range {
            return Err(ConfigError::InvalidValue {
                field: "explore.attack_range",
                reason: format!(
                    "attack range {} must be shorter than detection range {}",
                    self.explore.attack_range, self.explore.detection_range
                ),
            });
        }

        Ok(())
    }
}
