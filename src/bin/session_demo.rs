//! Plays a scripted session: walk the world map into a battle, answer a fixed sequence of
//! questions at 60 Hz, and log everything that crosses the bus.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Context;
use glam::Vec2;
use tracing::info;

use playfield::config::{BattleVariant, Tuning};
use playfield::constants::TICK_RATE;
use playfield::effects::RecordingSink;
use playfield::events::{AnswerResult, Channel, EventBus, Payload};
use playfield::logging::setup_logging;
use playfield::map::{LevelConfig, NodeState, WorldGraph};
use playfield::scene::{SceneContainer, SceneContext};
use playfield::scheduler::Scheduler;

/// Upper bound on simulated frames so a stuck session still terminates.
const MAX_FRAMES: u32 = 60 * 120;

fn build_map() -> anyhow::Result<WorldGraph> {
    let mut graph = WorldGraph::new();
    let meadow = graph.add_node(
        "Meadow Gate",
        "animals",
        Vec2::new(80.0, 400.0),
        LevelConfig::battle("giant-golem", "acorn", BattleVariant::RangedThrow, 2),
        NodeState::Current,
    );
    let tower = graph.add_node(
        "Sorcerer's Tower",
        "space",
        Vec2::new(260.0, 300.0),
        LevelConfig::battle("dark-sorcerer", "spell", BattleVariant::MeleeCaster, 3),
        NodeState::Locked,
    );
    let lair = graph.add_node(
        "Dragon's Lair",
        "dinosaurs",
        Vec2::new(440.0, 180.0),
        LevelConfig::battle("dragon", "spear", BattleVariant::TimedRunner, 4),
        NodeState::Locked,
    );
    graph.connect(meadow, tower)?;
    graph.connect(tower, lair)?;
    Ok(graph)
}

fn main() -> anyhow::Result<()> {
    setup_logging();

    let tuning = Tuning::load().context("loading tuning")?;
    let bus = EventBus::new();
    let effects = RecordingSink::new();
    let ctx = SceneContext::new(bus.clone(), Scheduler::new())
        .with_effects(Rc::new(RefCell::new(effects.clone())))
        .with_tuning(tuning);

    let mut container = SceneContainer::new(ctx).with_world_map(build_map()?)?;

    // Host side: answer each question from a script and log the HUD traffic.
    let script: Rc<RefCell<VecDeque<bool>>> = Rc::new(RefCell::new(VecDeque::from([true, false, true, true, false, true])));
    let pending_answer: Rc<RefCell<Option<AnswerResult>>> = Rc::new(RefCell::new(None));
    let finished = Rc::new(RefCell::new(None));
    {
        let script = Rc::clone(&script);
        let pending_answer = Rc::clone(&pending_answer);
        bus.register(Channel::QuestionReady, move |payload| {
            let Payload::QuestionReady(request) = payload else {
                return;
            };
            let correct = script.borrow_mut().pop_front().unwrap_or(true);
            info!(round = request.round, correct, "Question ready");
            *pending_answer.borrow_mut() = Some(if correct {
                AnswerResult::correct(10)
            } else {
                AnswerResult::wrong("42")
            });
        });
    }
    for channel in [Channel::PhaseChange, Channel::ScoreUpdate, Channel::LivesUpdate, Channel::LevelStart] {
        bus.register(channel, move |payload| info!(%channel, ?payload, "Bus traffic"));
    }
    for channel in [Channel::LevelComplete, Channel::GameOver] {
        let finished = Rc::clone(&finished);
        bus.register(channel, move |payload| {
            info!(%channel, ?payload, "Session finished");
            *finished.borrow_mut() = Some(payload.clone());
        });
    }

    let dt = 1.0 / TICK_RATE;

    // Play the first node, then walk to the node it unlocks and play that one too.
    for target in [0, 1] {
        finished.borrow_mut().take();
        container.select_node(target)?;

        let mut frames = 0;
        while finished.borrow().is_none() && frames < MAX_FRAMES {
            // Answers are delivered between frames, never from inside a dispatch.
            let answer = pending_answer.borrow_mut().take();
            if let Some(answer) = answer {
                bus.emit(Payload::AnswerResult(answer));
            }
            container.tick(dt);
            frames += 1;
        }
        info!(node = target, frames, "Level loop ended");
        // One more tick applies the node completion to the map.
        container.tick(dt);
    }

    if let Some(map) = container.world_map() {
        for node in map.graph().nodes() {
            info!(node = node.id, name = %node.name, state = %node.state, stars = node.stars, "Final map state");
        }
    }
    info!(effects = effects.effects().len(), "Cosmetic effects spawned");

    container.teardown();
    Ok(())
}
