//! Data tables for the battle variants, boss archetypes and session themes.
//!
//! Archetypes and variants share one transition routine; everything that differs
//! between them lives in these records.

use phf::phf_map;
use tracing::warn;

use crate::config::{BattleTuning, BattleVariant};
use crate::effects::{Primitive, Rgb};

/// How an archetype's projectiles look and fly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileProfile {
    pub palette: Rgb,
    /// World units per second.
    pub speed: f32,
    pub arc_height: f32,
    /// Asset key of the projectile sprite.
    pub visual: &'static str,
}

impl ProjectileProfile {
    /// The primitive drawn when the projectile sprite is missing.
    pub fn fallback(&self) -> Primitive {
        Primitive::Circle {
            radius: 8.0,
            color: self.palette,
        }
    }
}

pub const DEFAULT_PROFILE: ProjectileProfile = ProjectileProfile {
    palette: [180, 120, 255],
    speed: 420.0,
    arc_height: 40.0,
    visual: "projectile_default",
};

static PROFILES: phf::Map<&'static str, ProjectileProfile> = phf_map! {
    "dark-sorcerer" => ProjectileProfile { palette: [140, 40, 200], speed: 480.0, arc_height: 20.0, visual: "projectile_hex" },
    "giant-golem" => ProjectileProfile { palette: [130, 110, 90], speed: 260.0, arc_height: 90.0, visual: "projectile_boulder" },
    "shadow-beast" => ProjectileProfile { palette: [40, 40, 60], speed: 520.0, arc_height: 0.0, visual: "projectile_shade" },
    "dragon" => ProjectileProfile { palette: [255, 110, 20], speed: 400.0, arc_height: 60.0, visual: "projectile_fireball" },
    "corrupted-knight" => ProjectileProfile { palette: [120, 150, 140], speed: 360.0, arc_height: 30.0, visual: "projectile_blade" },
};

/// Looks up the projectile profile for `archetype`, falling back to [`DEFAULT_PROFILE`].
pub fn projectile_profile(archetype: &str) -> ProjectileProfile {
    match PROFILES.get(archetype) {
        Some(profile) => *profile,
        None => {
            warn!(archetype, "Unknown archetype, using default projectile profile");
            DEFAULT_PROFILE
        }
    }
}

/// Palette and decoration for a student interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeStyle {
    pub color_palette: &'static str,
    pub decoration_style: &'static str,
}

pub const DEFAULT_THEME: ThemeStyle = ThemeStyle {
    color_palette: "default",
    decoration_style: "nature",
};

static THEMES: phf::Map<&'static str, ThemeStyle> = phf_map! {
    "dinosaurs" => ThemeStyle { color_palette: "warm", decoration_style: "prehistoric" },
    "space" => ThemeStyle { color_palette: "cosmic", decoration_style: "space" },
    "animals" => ThemeStyle { color_palette: "nature", decoration_style: "wildlife" },
    "music" => ThemeStyle { color_palette: "vibrant", decoration_style: "musical" },
    "sports" => ThemeStyle { color_palette: "energetic", decoration_style: "athletic" },
    "art" => ThemeStyle { color_palette: "rainbow", decoration_style: "creative" },
    "nature" => ThemeStyle { color_palette: "forest", decoration_style: "nature" },
    "ocean" => ThemeStyle { color_palette: "aquatic", decoration_style: "underwater" },
    "robots" => ThemeStyle { color_palette: "tech", decoration_style: "futuristic" },
    "fairy tales" => ThemeStyle { color_palette: "magical", decoration_style: "fantasy" },
    "cooking" => ThemeStyle { color_palette: "warm", decoration_style: "culinary" },
    "cars" => ThemeStyle { color_palette: "energetic", decoration_style: "racing" },
    "superheroes" => ThemeStyle { color_palette: "vibrant", decoration_style: "heroic" },
};

/// Looks up the style for `theme`, case-insensitively.
pub fn theme_style(theme: &str) -> ThemeStyle {
    let key = theme.trim().to_lowercase();
    match THEMES.get(key.as_str()) {
        Some(style) => *style,
        None => {
            if !key.is_empty() {
                warn!(theme, "Unknown theme, using default style");
            }
            DEFAULT_THEME
        }
    }
}

/// Per-variant animation timing, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantTiming {
    pub cast: f32,
    pub hurt: f32,
    pub attack: f32,
    pub cooldown: f32,
    pub death_delay: f32,
    pub approach: f32,
    pub strike: f32,
    /// Distance the projectile covers from the player to the boss.
    pub travel_distance: f32,
    /// Time the player has to answer before it counts as wrong.
    pub answer_limit: Option<f32>,
}

impl VariantTiming {
    pub fn for_variant(variant: BattleVariant, tuning: &BattleTuning) -> Self {
        let base = VariantTiming {
            cast: tuning.cast,
            hurt: tuning.hurt,
            attack: tuning.attack,
            cooldown: tuning.cooldown,
            death_delay: tuning.death_delay,
            approach: tuning.approach,
            strike: tuning.strike,
            travel_distance: tuning.arena_distance,
            answer_limit: None,
        };

        match variant {
            BattleVariant::MeleeCaster => base,
            // A throw has a shorter wind-up than a spell.
            BattleVariant::RangedThrow => VariantTiming {
                cast: base.cast * 0.6,
                ..base
            },
            // The runner keeps its distance, so shots travel further and the finisher takes longer to close.
            BattleVariant::TimedRunner => VariantTiming {
                travel_distance: base.travel_distance * 1.5,
                approach: base.approach * 1.5,
                answer_limit: Some(tuning.runner_answer_limit),
                ..base
            },
        }
    }

    /// Flight time of a projectile with the given profile.
    pub fn travel_time(&self, profile: &ProjectileProfile) -> f32 {
        if profile.speed <= 0.0 {
            return 0.0;
        }
        self.travel_distance / profile.speed
    }
}
