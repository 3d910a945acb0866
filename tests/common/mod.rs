#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bevy_ecs::{entity::Entity, event::EventRegistry, world::World};
use glam::Vec2;
use strum::IntoEnumIterator;

use playfield::config::{BattleVariant, LaunchConfig};
use playfield::effects::RecordingSink;
use playfield::config::AiTuning;
use playfield::events::{AnswerResult, Channel, EventBus, Payload};
use playfield::explore::components::{
    Agent, AgentBundle, AiState, DefeatTally, DeltaTime, ExploreEvent, Facing, Owner, Player, PlayerBundle, PlayerHealth,
    Position, Projectile, ProjectileBundle, SimClock, SimRng, Velocity, WorldBounds,
};
use playfield::map::{LevelConfig, NodeState, WorldGraph};
use playfield::scene::SceneContext;
use playfield::scheduler::Scheduler;

/// A bus, a scheduler and a recording effect sink wired into one context.
pub struct Harness {
    pub bus: EventBus,
    pub scheduler: Scheduler,
    pub effects: RecordingSink,
    pub ctx: SceneContext,
}

pub fn harness() -> Harness {
    let bus = EventBus::new();
    let scheduler = Scheduler::new();
    let effects = RecordingSink::new();
    let ctx = SceneContext::new(bus.clone(), scheduler.clone()).with_effects(Rc::new(RefCell::new(effects.clone())));
    Harness {
        bus,
        scheduler,
        effects,
        ctx,
    }
}

/// Records every payload emitted on every channel, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Vec<Payload>>>,
}

impl Recorder {
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Recorder::default();
        for channel in Channel::iter() {
            let log = Rc::clone(&recorder.log);
            bus.register(channel, move |payload| log.borrow_mut().push(payload.clone()));
        }
        recorder
    }

    pub fn all(&self) -> Vec<Payload> {
        self.log.borrow().clone()
    }

    pub fn on(&self, channel: Channel) -> Vec<Payload> {
        self.log
            .borrow()
            .iter()
            .filter(|payload| payload.channel() == channel)
            .cloned()
            .collect()
    }

    pub fn count(&self, channel: Channel) -> usize {
        self.on(channel).len()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

pub fn battle_config(max_progress: u32, max_lives: u8) -> LaunchConfig {
    LaunchConfig::new("space", "dragon", "spell", max_progress).with_max_lives(max_lives)
}

pub fn answer(bus: &EventBus, correct: bool) -> usize {
    let result = if correct {
        AnswerResult::correct(10)
    } else {
        AnswerResult::wrong("4")
    };
    bus.emit(Payload::AnswerResult(result))
}

/// Runs every queued animation leg to completion.
pub fn settle(scheduler: &Scheduler) {
    scheduler.advance(Duration::from_secs(5));
}

/// Three nodes in a row: the first current, the other two locked.
pub fn three_node_graph() -> WorldGraph {
    let mut graph = WorldGraph::new();
    let first = graph.add_node(
        "Node 1",
        "space",
        Vec2::new(0.0, 0.0),
        LevelConfig::battle("dragon", "spell", BattleVariant::MeleeCaster, 1),
        NodeState::Current,
    );
    let second = graph.add_node(
        "Node 2",
        "ocean",
        Vec2::new(120.0, 0.0),
        LevelConfig::battle("giant-golem", "shell", BattleVariant::RangedThrow, 2),
        NodeState::Locked,
    );
    let third = graph.add_node(
        "Node 3",
        "robots",
        Vec2::new(240.0, 0.0),
        LevelConfig::exploration("shadow-beast", 3),
        NodeState::Locked,
    );
    graph.connect(first, second).unwrap();
    graph.connect(second, third).unwrap();
    graph
}

/// A bare exploration world with every resource the systems read, stepping at 60 Hz.
pub fn create_test_world() -> World {
    let tuning = AiTuning::default();
    let mut world = World::default();
    EventRegistry::register_event::<ExploreEvent>(&mut world);
    world.insert_resource(tuning);
    world.insert_resource(WorldBounds::new(tuning.world_width, tuning.world_height));
    world.insert_resource(DeltaTime { seconds: 1.0 / 60.0 });
    world.insert_resource(SimClock::default());
    world.insert_resource(PlayerHealth { lives: 3, max_lives: 3 });
    world.insert_resource(DefeatTally::default());
    world.insert_resource(SimRng::seeded(7));
    world
}

pub fn spawn_test_player(world: &mut World, at: Vec2) -> Entity {
    world
        .spawn(PlayerBundle {
            player: Player,
            position: Position(at),
            velocity: Velocity::default(),
        })
        .id()
}

pub fn spawn_test_agent(world: &mut World, at: Vec2, hp: u32) -> Entity {
    world.resource_mut::<DefeatTally>().total += 1;
    world
        .spawn(AgentBundle {
            agent: Agent {
                hp,
                max_hp: hp,
                speed: 70.0,
                state: AiState::Patrol,
                facing: Facing::default(),
                patrol_target: at,
                home: at,
                last_attack: None,
                attack_cooldown: 1.8,
                telegraph: None,
                elite: false,
            },
            position: Position(at),
            velocity: Velocity::default(),
        })
        .id()
}

pub fn spawn_test_projectile(world: &mut World, owner: Owner, at: Vec2) -> Entity {
    world
        .spawn(ProjectileBundle {
            projectile: Projectile {
                owner,
                age: 0.0,
                max_age: 2.5,
            },
            position: Position(at),
            velocity: Velocity::default(),
        })
        .id()
}
