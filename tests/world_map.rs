use glam::Vec2;
use pretty_assertions::assert_eq;
use speculoos::prelude::*;

use playfield::config::{BattleVariant, MapTuning};
use playfield::error::GraphError;
use playfield::events::{Channel, EventBus, Payload};
use playfield::map::{EdgeStyle, LevelConfig, NodeState, SelectOutcome, WorldGraph, WorldMapScene};

mod common;

use common::{three_node_graph, Recorder};

fn map_scene() -> (WorldMapScene, Recorder) {
    let bus = EventBus::new();
    let recorder = Recorder::attach(&bus);
    let scene = WorldMapScene::new(three_node_graph(), bus, MapTuning::default()).unwrap();
    (scene, recorder)
}

#[test]
fn test_locked_node_unlocks_after_completion() {
    let (mut map, recorder) = map_scene();

    assert_that(&map.select(1)).is_equal_to(SelectOutcome::Locked);
    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(0);
    assert_that(&map.graph().node(1).unwrap().state).is_equal_to(NodeState::Locked);

    let unlocked = map.graph_mut().complete(0, 2).unwrap();
    assert_eq!(unlocked.as_slice(), &[1]);

    assert_that(&map.select(1)).is_equal_to(SelectOutcome::Travelling { path: vec![0, 1] });
    assert_that(&map.tick(0.1)).is_none();
    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(0);

    assert_that(&map.tick(1.0)).is_equal_to(Some(1));
    let expected = map.graph().node(1).unwrap().level_start();
    assert_eq!(recorder.on(Channel::LevelStart), vec![Payload::LevelStart(expected.clone())]);
    assert_eq!(expected.level, LevelConfig::battle("giant-golem", "shell", BattleVariant::RangedThrow, 2));
    assert_that(&map.graph().node(1).unwrap().state).is_equal_to(NodeState::Current);
    assert_that(&map.marker_node()).is_equal_to(1);
    assert_that(&map.marker_position()).is_equal_to(Vec2::new(120.0, 0.0));
}

#[test]
fn test_selecting_marker_node_starts_level_immediately() {
    let (mut map, recorder) = map_scene();

    assert_that(&map.select(0)).is_equal_to(SelectOutcome::Arrived);
    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(1);
    assert_that(&map.is_travelling()).is_false();
}

#[test]
fn test_selection_ignored_while_travelling() {
    let (mut map, recorder) = map_scene();
    map.graph_mut().complete(0, 3).unwrap();

    assert_that(&map.select(1)).is_equal_to(SelectOutcome::Travelling { path: vec![0, 1] });
    assert_that(&map.select(0)).is_equal_to(SelectOutcome::Busy);
    assert_that(&map.is_travelling()).is_true();
    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(0);
}

#[test]
fn test_unknown_node_is_rejected() {
    let (mut map, _recorder) = map_scene();
    assert_that(&map.select(42)).is_equal_to(SelectOutcome::Unknown);
}

#[test]
fn test_marker_follows_multi_hop_route() {
    let (mut map, recorder) = map_scene();
    map.graph_mut().complete(0, 3).unwrap();
    map.graph_mut().complete(1, 3).unwrap();

    assert_that(&map.select(2)).is_equal_to(SelectOutcome::Travelling { path: vec![0, 1, 2] });

    // Halfway along the first leg.
    assert_that(&map.tick(0.25)).is_none();
    assert!((map.marker_position().x - 60.0).abs() < 1e-3);

    // One long frame covers the rest of both legs.
    assert_that(&map.tick(2.0)).is_equal_to(Some(2));
    assert_that(&map.marker_node()).is_equal_to(2);
    assert_that(&recorder.count(Channel::LevelStart)).is_equal_to(1);
}

#[test]
fn test_completed_node_stays_completed_on_revisit() {
    let (mut map, _recorder) = map_scene();
    map.graph_mut().complete(0, 1).unwrap();

    assert_that(&map.select(0)).is_equal_to(SelectOutcome::Arrived);
    let node = map.graph().node(0).unwrap();
    assert_that(&node.state).is_equal_to(NodeState::Completed);
    assert_that(&node.stars).is_equal_to(1);
}

#[test]
fn test_edge_styles_follow_node_states() {
    let mut graph = three_node_graph();
    assert_that(&graph.edge_style(0, 1)).is_equal_to(Some(EdgeStyle::Locked));

    graph.complete(0, 3).unwrap();
    assert_that(&graph.edge_style(0, 1)).is_equal_to(Some(EdgeStyle::Completed));
    assert_that(&graph.edge_style(1, 2)).is_equal_to(Some(EdgeStyle::Locked));
    assert_that(&graph.edge_style(2, 0)).is_none();

    graph.complete(1, 3).unwrap();
    let styles: Vec<_> = graph.edges().collect();
    assert_eq!(styles, vec![(0, 1, EdgeStyle::Completed), (1, 2, EdgeStyle::Completed)]);
}

#[test]
fn test_path_never_crosses_locked_nodes() {
    let mut graph = three_node_graph();
    assert_that(&graph.path(0, 2)).is_none();

    graph.complete(0, 3).unwrap();
    assert_that(&graph.path(0, 1)).is_equal_to(Some(vec![0, 1]));
    assert_that(&graph.path(1, 0)).is_equal_to(Some(vec![1, 0]));
}

#[test]
fn test_map_needs_an_unlocked_node() {
    let bus = EventBus::new();
    let result = WorldMapScene::new(WorldGraph::new(), bus.clone(), MapTuning::default());
    assert_that(&result.err()).is_equal_to(Some(GraphError::Empty));

    let mut graph = WorldGraph::new();
    graph.add_node(
        "sealed",
        "space",
        Vec2::ZERO,
        LevelConfig::exploration("shadow-beast", 2),
        NodeState::Locked,
    );
    assert_that(&WorldMapScene::new(graph, bus, MapTuning::default()).is_err()).is_true();
}
