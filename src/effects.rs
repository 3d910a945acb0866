//! Fire-and-forget cosmetic effects and visual asset lookup.
//!
//! Nothing in here is allowed to gate a state transition. A failed spawn is logged and
//! dropped; a missing asset degrades to a plain primitive.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use strum_macros::IntoStaticStr;
use tracing::{trace, warn};

use crate::error::{AssetError, EffectError};

/// An RGB color.
pub type Rgb = [u8; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SoundCue {
    Cast,
    Throw,
    Impact,
    Hurt,
    BossAttack,
    PlayerHit,
    Telegraph,
    Shoot,
    AgentDown,
    Victory,
    Defeat,
}

/// A cosmetic effect requested by a scene.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum Effect {
    /// Rising text such as "+10" over a point in the world.
    FloatingText { text: String, at: Vec2 },
    CameraShake { intensity: f32, duration: f32 },
    Flash { color: Rgb, duration: f32 },
    Sound(SoundCue),
    /// A projectile sprite flying along an arc; purely visual in battles.
    ProjectileLaunch {
        from: Vec2,
        to: Vec2,
        palette: Rgb,
        arc_height: f32,
        duration: f32,
    },
    /// Wind-up marker shown before an agent fires.
    Telegraph { at: Vec2, duration: f32 },
    /// Toggles the player's visibility during an invulnerability window.
    Flicker { visible: bool },
    /// Burst shown where something was defeated.
    Burst { at: Vec2, color: Rgb },
}

/// Receives cosmetic effects, typically the host's renderer.
pub trait EffectSink {
    fn spawn(&mut self, effect: &Effect) -> Result<(), EffectError>;
}

/// Spawns `effect`, swallowing any failure. Returns whether the sink accepted it.
pub fn spawn_effect(sink: &mut dyn EffectSink, effect: Effect) -> bool {
    match sink.spawn(&effect) {
        Ok(()) => {
            trace!(effect = <&'static str>::from(&effect), "Effect spawned");
            true
        }
        Err(error) => {
            warn!(effect = <&'static str>::from(&effect), %error, "Dropping cosmetic effect");
            false
        }
    }
}

/// A sink shared between a scene and its deferred callbacks.
pub type SharedSink = Rc<RefCell<dyn EffectSink>>;

/// [`spawn_effect`] for a shared sink. A sink that is busy is treated like a failed spawn.
pub fn spawn_shared(sink: &SharedSink, effect: Effect) -> bool {
    match sink.try_borrow_mut() {
        Ok(mut sink) => spawn_effect(&mut *sink, effect),
        Err(_) => {
            warn!(effect = <&'static str>::from(&effect), "Effect sink busy, dropping effect");
            false
        }
    }
}

/// Discards every effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EffectSink for NullSink {
    fn spawn(&mut self, _effect: &Effect) -> Result<(), EffectError> {
        Ok(())
    }
}

/// Records effects into a shared log. Clones share the log and the surface state.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    log: Rc<RefCell<Vec<Effect>>>,
    released: Rc<Cell<bool>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the rendering surface going away; later spawns fail.
    pub fn release(&self) {
        self.released.set(true);
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.log.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Effect) -> bool) -> usize {
        self.log.borrow().iter().filter(|effect| predicate(effect)).count()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl EffectSink for RecordingSink {
    fn spawn(&mut self, effect: &Effect) -> Result<(), EffectError> {
        if self.released.get() {
            return Err(EffectError::SurfaceReleased);
        }
        self.log.borrow_mut().push(effect.clone());
        Ok(())
    }
}

/// A sprite sheet known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteRef {
    pub key: String,
    pub frames: u16,
}

/// Shape drawn when no sprite is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Circle { radius: f32, color: Rgb },
    Rect { size: Vec2, color: Rgb },
}

/// How an entity is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Sprite(SpriteRef),
    Primitive(Primitive),
}

impl Visual {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Visual::Primitive(_))
    }
}

/// Looks up visual assets by key.
pub trait AssetCatalog {
    fn lookup(&self, key: &str) -> Result<SpriteRef, AssetError>;
}

/// A catalog backed by an in-memory table, filled by the host at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    sprites: HashMap<String, SpriteRef>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sprite(mut self, key: impl Into<String>, frames: u16) -> Self {
        let key = key.into();
        self.sprites.insert(key.clone(), SpriteRef { key, frames });
        self
    }
}

impl AssetCatalog for StaticCatalog {
    fn lookup(&self, key: &str) -> Result<SpriteRef, AssetError> {
        self.sprites
            .get(key)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(key.to_string()))
    }
}

/// Resolves `key` to a sprite, or to `fallback` when the asset is missing.
pub fn resolve_visual(catalog: &dyn AssetCatalog, key: &str, fallback: Primitive) -> Visual {
    match catalog.lookup(key) {
        Ok(sprite) => Visual::Sprite(sprite),
        Err(error) => {
            warn!(key, %error, "Falling back to primitive visual");
            Visual::Primitive(fallback)
        }
    }
}
