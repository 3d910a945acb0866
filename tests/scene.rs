use speculoos::prelude::*;

use playfield::battle::BattlePhase;
use playfield::config::{LivesPolicy, SceneKind};
use playfield::events::Channel;
use playfield::map::{NodeState, SelectOutcome};
use playfield::scene::{ActiveScene, SceneContainer};

mod common;

use common::{answer, battle_config, harness, three_node_graph, Recorder};

const DT: f32 = 1.0 / 60.0;

/// Ticks the container for roughly `seconds` of simulated time.
fn run(container: &mut SceneContainer, seconds: f32) {
    let frames = (seconds / DT).ceil() as usize;
    for _ in 0..frames {
        container.tick(DT);
    }
}

#[test]
fn test_launch_replaces_the_active_scene() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone());

    container.launch(battle_config(3, 3), SceneKind::Battle);
    assert_that(&h.bus.listener_count(Channel::AnswerResult)).is_equal_to(1);

    container.launch(battle_config(3, 3), SceneKind::Exploration);
    assert_that(&h.bus.listener_count(Channel::AnswerResult)).is_equal_to(1);
    assert_that(&container.active().map(ActiveScene::kind)).is_equal_to(Some(SceneKind::Exploration));
    assert_that(&container.exploration_mut().is_some()).is_true();
    assert_that(&container.battle().is_none()).is_true();
}

#[test]
fn test_old_scene_callbacks_die_with_it() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let mut container = SceneContainer::new(h.ctx.clone());

    container.launch(battle_config(1, 3), SceneKind::Battle);
    answer(&h.bus, true);
    container.launch(battle_config(5, 3), SceneKind::Battle);
    run(&mut container, 5.0);

    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(0);
    let battle = container.battle().unwrap();
    assert_that(&battle.boss_hp()).is_equal_to(5);
    assert_that(&battle.phase()).is_equal_to(BattlePhase::Ready);
}

#[test]
fn test_replay_restores_lives_per_battle() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone());
    container.launch(battle_config(3, 3), SceneKind::Battle);

    answer(&h.bus, false);
    run(&mut container, 2.0);
    assert_that(&container.battle().unwrap().lives()).is_equal_to(2);

    container.replay().unwrap();
    let battle = container.battle().unwrap();
    assert_that(&battle.lives()).is_equal_to(3);
    assert_that(&battle.boss_hp()).is_equal_to(3);
}

#[test]
fn test_replay_carries_lives_over_when_configured() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone());
    let config = battle_config(3, 3).with_lives_policy(LivesPolicy::CarryOver);
    container.launch(config, SceneKind::Battle);

    answer(&h.bus, false);
    run(&mut container, 2.0);
    container.replay().unwrap();
    assert_that(&container.battle().unwrap().lives()).is_equal_to(2);

    // A lost game never carries zero lives into the next attempt.
    answer(&h.bus, false);
    run(&mut container, 2.0);
    answer(&h.bus, false);
    run(&mut container, 3.0);
    assert_that(&container.battle().unwrap().phase()).is_equal_to(BattlePhase::GameOver);
    container.replay().unwrap();
    assert_that(&container.battle().unwrap().lives()).is_equal_to(3);
}

#[test]
fn test_replay_without_launch_is_an_error() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone());
    assert_that(&container.replay().is_err()).is_true();
}

#[test]
fn test_completing_a_node_unlocks_the_next() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let mut container = SceneContainer::new(h.ctx.clone())
        .with_world_map(three_node_graph())
        .unwrap();

    assert_that(&container.select_node(1).unwrap()).is_equal_to(SelectOutcome::Locked);
    assert_that(&container.active().is_none()).is_true();

    assert_that(&container.select_node(0).unwrap()).is_equal_to(SelectOutcome::Arrived);
    assert_that(&container.battle().unwrap().config().archetype.as_str()).is_equal_to("dragon");

    answer(&h.bus, true);
    run(&mut container, 5.0);

    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(1);
    let graph = container.world_map().unwrap().graph();
    assert_that(&graph.node(0).unwrap().state).is_equal_to(NodeState::Completed);
    assert_that(&graph.node(0).unwrap().stars).is_equal_to(3);
    assert_that(&graph.node(1).unwrap().state).is_equal_to(NodeState::Current);
    assert_that(&graph.node(2).unwrap().state).is_equal_to(NodeState::Locked);
}

#[test]
fn test_arriving_at_a_node_launches_its_level() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let mut container = SceneContainer::new(h.ctx.clone())
        .with_world_map(three_node_graph())
        .unwrap();

    container.select_node(0).unwrap();
    answer(&h.bus, true);
    run(&mut container, 5.0);

    let outcome = container.select_node(1).unwrap();
    assert_that(&outcome).is_equal_to(SelectOutcome::Travelling { path: vec![0, 1] });
    run(&mut container, 1.0);

    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(2);
    let battle = container.battle().unwrap();
    assert_that(&battle.config().archetype.as_str()).is_equal_to("giant-golem");
    assert_that(&battle.config().theme.as_str()).is_equal_to("ocean");
    assert_that(&battle.boss_hp()).is_equal_to(2);
}

#[test]
fn test_game_over_leaves_node_incomplete() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone())
        .with_world_map(three_node_graph())
        .unwrap();
    container.select_node(0).unwrap();

    for _ in 0..3 {
        answer(&h.bus, false);
        run(&mut container, 2.0);
    }

    let graph = container.world_map().unwrap().graph();
    assert_that(&graph.node(0).unwrap().state).is_equal_to(NodeState::Current);
    assert_that(&graph.node(1).unwrap().state).is_equal_to(NodeState::Locked);
}

#[test]
fn test_launching_a_locked_node_fails() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone())
        .with_world_map(three_node_graph())
        .unwrap();
    assert_that(&container.launch_node(2).is_err()).is_true();
    assert_that(&container.launch_node(99).is_err()).is_true();
    assert_that(&container.active().is_none()).is_true();
}

#[test]
fn test_container_teardown_is_idempotent() {
    let h = harness();
    let mut container = SceneContainer::new(h.ctx.clone());
    container.launch(battle_config(3, 3), SceneKind::Battle);
    answer(&h.bus, true);

    assert_that(&container.teardown()).is_true();
    assert_that(&container.teardown()).is_false();
    assert_that(&container.is_alive()).is_false();
    assert_that(&container.active().is_none()).is_true();
    assert_that(&h.bus.total_listeners()).is_equal_to(0);

    // Late ticks and launches after teardown do nothing.
    container.tick(DT);
    container.launch(battle_config(3, 3), SceneKind::Battle);
    assert_that(&container.active().is_none()).is_true();
    assert_that(&h.scheduler.pending()).is_equal_to(0);
}

#[test]
fn test_select_node_launches_once_per_arrival() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let mut container = SceneContainer::new(h.ctx.clone())
        .with_world_map(three_node_graph())
        .unwrap();

    assert_that(&container.select_node(0).unwrap()).is_equal_to(SelectOutcome::Arrived);
    run(&mut container, 0.5);

    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(1);
    assert_that(&recorder.count(Channel::QuestionReady)).is_equal_to(1);
    assert_that(&h.bus.listener_count(Channel::AnswerResult)).is_equal_to(2);
}
