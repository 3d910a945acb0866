//! The open-world exploration scene: an ECS world stepped once per host tick.

use std::cell::Cell;
use std::rc::Rc;

use bevy_ecs::{
    entity::Entity,
    event::{EventRegistry, Events},
    schedule::{common_conditions::resource_equals, ExecutorKind, IntoScheduleConfigs, Schedule, SystemSet},
    world::World,
};
use glam::Vec2;
use rand::Rng;
use tracing::{debug, info, trace, warn};

use crate::config::{AiTuning, LaunchConfig};
use crate::constants::explore::{DEFAULT_SEED, ELITE_EVERY, MAX_AGENTS, PLAYER_SPAWN_MARGIN};
use crate::constants::scoring::POINTS_PER_DEFEAT;
use crate::effects::{spawn_shared, Effect, SharedSink, SoundCue};
use crate::events::{Channel, EventBus, LivesUpdate, Payload, PhaseChange, ScoreUpdate, Subscriptions};
use crate::explore::ai::{agent_ai_system, agent_attack_system};
use crate::explore::components::{
    Agent, AgentBundle, AiState, DefeatTally, DeltaTime, ExploreEvent, ExploreStage, Facing, Player, PlayerBundle,
    PlayerHealth, PlayerInput, Position, SimClock, SimRng, Velocity, WorldBounds,
};
use crate::explore::systems::{
    bounds_system, contact_damage_system, integrate_system, invulnerability_system, player_movement_system,
    projectile_system, stage_system,
};
use crate::lifecycle::Lifecycle;
use crate::scene::SceneContext;
use crate::scheduler::{delay_from_secs, Scheduler, TaskSet};
use crate::score::{ScoreBoard, SessionSummary};

/// Systems that only run while the stage is [`ExploreStage::Playing`].
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameplaySet;

/// Where to place one agent at setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSpawn {
    pub position: Vec2,
    pub elite: bool,
}

fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.configure_sets(GameplaySet.run_if(resource_equals(ExploreStage::Playing)));
    schedule.add_systems(
        (
            player_movement_system,
            agent_ai_system,
            agent_attack_system,
            integrate_system,
            bounds_system,
            projectile_system,
            contact_damage_system,
            invulnerability_system,
            stage_system,
        )
            .chain()
            .in_set(GameplaySet),
    );
    schedule
}

/// Random agent placements in the upper half of the world, every `ELITE_EVERY`-th one elite.
fn random_layout(count: u32, bounds: &WorldBounds, rng: &mut impl Rng) -> Vec<AgentSpawn> {
    let margin = 32.0;
    let low = (bounds.min + Vec2::splat(margin)).min(bounds.center());
    let high = Vec2::new(bounds.max.x - margin, bounds.center().y).max(low);
    if count > MAX_AGENTS {
        warn!(count, limit = MAX_AGENTS, "Too many agents requested, clamping the layout");
    }
    (0..count.min(MAX_AGENTS) as usize)
        .map(|index| AgentSpawn {
            position: Vec2::new(rng.random_range(low.x..=high.x), rng.random_range(low.y..=high.y)),
            elite: index % ELITE_EVERY == ELITE_EVERY - 1,
        })
        .collect()
}

pub struct ExplorationScene {
    world: World,
    schedule: Schedule,
    lifecycle: Lifecycle,
    bus: EventBus,
    scheduler: Scheduler,
    effects: SharedSink,
    subscriptions: Subscriptions,
    timers: TaskSet,
    score: ScoreBoard,
    /// Set once the terminal event has been emitted.
    terminal_sent: Rc<Cell<bool>>,
    discarded: Rc<Cell<u32>>,
    config: LaunchConfig,
    player: Entity,
}

impl std::fmt::Debug for ExplorationScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorationScene")
            .field("alive", &self.is_alive())
            .field("stage", &self.stage())
            .field("lives", &self.lives())
            .field("tally", &self.tally())
            .finish()
    }
}

impl ExplorationScene {
    /// Builds a scene with `config.max_progress` agents placed from the session seed.
    pub fn new(config: LaunchConfig, starting_lives: u8, ctx: &SceneContext) -> Self {
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        let bounds = WorldBounds::new(ctx.tuning.explore.world_width, ctx.tuning.explore.world_height);
        let mut rng = SimRng::seeded(seed);
        let layout = random_layout(config.max_progress, &bounds, &mut rng.0);
        Self::with_layout(config, starting_lives, ctx, &layout)
    }

    /// Builds a scene with agents at exactly the given spots.
    pub fn with_layout(config: LaunchConfig, starting_lives: u8, ctx: &SceneContext, layout: &[AgentSpawn]) -> Self {
        let tuning = ctx.tuning.explore;
        let bounds = WorldBounds::new(tuning.world_width, tuning.world_height);
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        let max_lives = config.max_lives.max(1);

        let mut world = World::default();
        EventRegistry::register_event::<ExploreEvent>(&mut world);
        world.insert_resource(tuning);
        world.insert_resource(bounds);
        world.insert_resource(DeltaTime::default());
        world.insert_resource(SimClock::default());
        world.insert_resource(PlayerHealth {
            lives: starting_lives.clamp(1, max_lives),
            max_lives,
        });
        world.insert_resource(DefeatTally::default());
        // Offset so waypoints do not replay the placement sequence.
        world.insert_resource(SimRng::seeded(seed.wrapping_add(1)));
        world.insert_resource(ExploreStage::Playing);
        world.insert_resource(PlayerInput::default());

        let player = world
            .spawn(PlayerBundle {
                player: Player,
                position: Position(Vec2::new(bounds.center().x, bounds.max.y - PLAYER_SPAWN_MARGIN)),
                velocity: Velocity::default(),
            })
            .id();

        let discarded = Rc::new(Cell::new(0));
        let lifecycle = Lifecycle::new();
        let mut subscriptions = Subscriptions::new(ctx.bus.clone());
        {
            let guard = lifecycle.guard();
            let discarded = Rc::clone(&discarded);
            subscriptions.register(Channel::AnswerResult, move |_| {
                if !guard.is_alive() {
                    return;
                }
                trace!("Exploration scene ignores answer results");
                discarded.set(discarded.get() + 1);
            });
        }

        let mut scene = Self {
            world,
            schedule: build_schedule(),
            lifecycle,
            bus: ctx.bus.clone(),
            scheduler: ctx.scheduler.clone(),
            effects: Rc::clone(&ctx.effects),
            subscriptions,
            timers: TaskSet::default(),
            score: ScoreBoard::new(),
            terminal_sent: Rc::new(Cell::new(false)),
            discarded,
            config,
            player,
        };
        for spawn in layout {
            scene.spawn_agent(spawn.position, spawn.elite);
        }
        scene
    }

    /// Adds an agent; elites get multiplied hit-points and reduced speed.
    pub fn spawn_agent(&mut self, position: Vec2, elite: bool) -> Entity {
        let tuning = *self.world.resource::<AiTuning>();
        let (hp, speed) = if elite {
            (tuning.agent_hp.saturating_mul(tuning.elite_hp_multiplier), tuning.agent_speed * tuning.elite_speed_factor)
        } else {
            (tuning.agent_hp, tuning.agent_speed)
        };

        self.world.resource_mut::<DefeatTally>().total += 1;
        self.world
            .spawn(AgentBundle {
                agent: Agent {
                    hp,
                    max_hp: hp,
                    speed,
                    state: AiState::Patrol,
                    facing: Facing::default(),
                    patrol_target: position,
                    home: position,
                    last_attack: None,
                    attack_cooldown: tuning.attack_cooldown,
                    telegraph: None,
                    elite,
                },
                position: Position(position),
                velocity: Velocity::default(),
            })
            .id()
    }

    /// Announces the opening HUD state.
    pub fn start(&mut self) {
        let health = *self.world.resource::<PlayerHealth>();
        info!(agents = self.tally().total, lives = health.lives, "Exploration started");
        self.emit(Payload::PhaseChange(PhaseChange::Exploration { stage: self.stage() }));
        self.emit(Payload::LivesUpdate(LivesUpdate {
            lives: health.lives,
            max_lives: health.max_lives,
        }));
        self.emit(Payload::ScoreUpdate(ScoreUpdate { score: 0, delta: 0 }));
    }

    /// Steps the simulation by `dt` seconds and forwards what happened.
    pub fn tick(&mut self, dt: f32) {
        if !self.lifecycle.is_alive() {
            return;
        }

        let dt = dt.max(0.0);
        self.world.resource_mut::<DeltaTime>().seconds = dt;
        self.world.resource_mut::<SimClock>().0 += dt;
        self.schedule.run(&mut self.world);

        let events: Vec<ExploreEvent> = self.world.resource_mut::<Events<ExploreEvent>>().drain().collect();
        for event in events {
            if !self.lifecycle.is_alive() {
                break;
            }
            self.handle_event(event);
        }
    }

    fn emit(&self, payload: Payload) {
        if self.lifecycle.is_alive() {
            self.bus.emit(payload);
        }
    }

    fn handle_event(&mut self, event: ExploreEvent) {
        match event {
            ExploreEvent::StateChanged { agent, from, to } => {
                trace!(?agent, %from, %to, "Agent state changed");
            }
            ExploreEvent::Telegraph { at, duration } => {
                spawn_shared(&self.effects, Effect::Telegraph { at, duration });
                spawn_shared(&self.effects, Effect::Sound(SoundCue::Telegraph));
            }
            ExploreEvent::Fired { .. } => {
                spawn_shared(&self.effects, Effect::Sound(SoundCue::Shoot));
            }
            ExploreEvent::AgentHit { .. } => {
                spawn_shared(&self.effects, Effect::Sound(SoundCue::Impact));
            }
            ExploreEvent::AgentDefeated { at, .. } => {
                spawn_shared(&self.effects, Effect::Burst { at, color: [255, 220, 80] });
                spawn_shared(&self.effects, Effect::Sound(SoundCue::AgentDown));
                let delta = self.score.record_correct(POINTS_PER_DEFEAT);
                spawn_shared(
                    &self.effects,
                    Effect::FloatingText {
                        text: format!("+{delta}"),
                        at,
                    },
                );
                self.emit(Payload::ScoreUpdate(ScoreUpdate {
                    score: self.score.score(),
                    delta,
                }));
            }
            ExploreEvent::PlayerDamaged { lives } => {
                self.score.record_wrong();
                spawn_shared(
                    &self.effects,
                    Effect::CameraShake {
                        intensity: 5.0,
                        duration: 0.2,
                    },
                );
                spawn_shared(
                    &self.effects,
                    Effect::Flash {
                        color: [255, 40, 40],
                        duration: 0.1,
                    },
                );
                spawn_shared(&self.effects, Effect::Sound(SoundCue::PlayerHit));
                let max_lives = self.world.resource::<PlayerHealth>().max_lives;
                self.emit(Payload::LivesUpdate(LivesUpdate { lives, max_lives }));
            }
            ExploreEvent::Flicker { visible } => {
                spawn_shared(&self.effects, Effect::Flicker { visible });
            }
            ExploreEvent::StageChanged(stage) => {
                self.emit(Payload::PhaseChange(PhaseChange::Exploration { stage }));
                self.schedule_terminal(stage);
            }
        }
    }

    /// Plays the victory or death sequence, then emits the terminal event once.
    fn schedule_terminal(&mut self, stage: ExploreStage) {
        let tuning = *self.world.resource::<AiTuning>();
        let (success, delay, cue, label) = match stage {
            ExploreStage::Victory => (true, tuning.victory_delay, SoundCue::Victory, "victory_sequence"),
            ExploreStage::Defeated => (false, tuning.death_delay, SoundCue::Defeat, "death_sequence"),
            ExploreStage::Playing => return,
        };
        spawn_shared(&self.effects, Effect::Sound(cue));

        let summary = self.score.summarize(success);
        let bus = self.bus.clone();
        let guard = self.lifecycle.guard();
        let sent = Rc::clone(&self.terminal_sent);
        debug!(%stage, delay, "Scheduling terminal event");
        let handle = self
            .scheduler
            .after(delay_from_secs(delay), guard.clone(), label, move || {
                if !guard.is_alive() || sent.replace(true) {
                    return;
                }
                let payload = if success {
                    Payload::LevelComplete(summary)
                } else {
                    Payload::GameOver(summary)
                };
                info!(channel = %payload.channel(), "Exploration finished");
                bus.emit(payload);
            });
        self.timers.track(handle);
    }

    /// Sets the player's movement direction; zero stops the player.
    pub fn set_input(&mut self, direction: Vec2) {
        self.world.resource_mut::<PlayerInput>().direction = direction;
    }

    /// Requests a player shot in `direction` on the next tick.
    pub fn fire(&mut self, direction: Vec2) {
        self.world.resource_mut::<PlayerInput>().fire = Some(direction);
    }

    /// Flips the lifecycle flag, revokes listeners, cancels timers and despawns every entity.
    ///
    /// Returns `false` when the scene was already torn down.
    pub fn teardown(&mut self) -> bool {
        if !self.lifecycle.begin_teardown() {
            return false;
        }
        let revoked = self.subscriptions.revoke_all();
        let cancelled = self.timers.cancel_all();
        self.world.clear_entities();
        info!(revoked, cancelled, "Exploration scene torn down");
        true
    }

    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    pub fn stage(&self) -> ExploreStage {
        *self.world.resource::<ExploreStage>()
    }

    pub fn lives(&self) -> u8 {
        self.world.resource::<PlayerHealth>().lives
    }

    pub fn tally(&self) -> DefeatTally {
        *self.world.resource::<DefeatTally>()
    }

    pub fn player(&self) -> Entity {
        self.player
    }

    pub fn player_position(&self) -> Option<Vec2> {
        self.world.get::<Position>(self.player).map(|position| position.0)
    }

    pub fn set_player_position(&mut self, position: Vec2) {
        if let Some(mut current) = self.world.get_mut::<Position>(self.player) {
            current.0 = position;
        }
    }

    pub fn agent(&self, entity: Entity) -> Option<&Agent> {
        self.world.get::<Agent>(entity)
    }

    /// Every agent with its current state.
    pub fn agents(&mut self) -> Vec<(Entity, AiState)> {
        self.world
            .query::<(Entity, &Agent)>()
            .iter(&self.world)
            .map(|(entity, agent)| (entity, agent.state))
            .collect()
    }

    pub fn summary(&self) -> SessionSummary {
        self.score.summarize(self.stage() == ExploreStage::Victory)
    }

    /// Answer results received while this scene was active.
    pub fn discarded_answers(&self) -> u32 {
        self.discarded.get()
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Drop for ExplorationScene {
    fn drop(&mut self) {
        self.teardown();
    }
}
