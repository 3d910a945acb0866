//! The turn-based micro-battle: phase machine, variant and archetype data, and the scene driving them.

pub mod phase;
pub mod profile;
pub mod scene;

pub use phase::{BattleInput, BattleMachine, BattlePhase, BattleStep, Reaction, ScheduledStep, StampedStep};
pub use profile::{projectile_profile, theme_style, ProjectileProfile, ThemeStyle, VariantTiming};
pub use scene::BattleScene;
