//! World-map navigation: node selection and marker travel.

use glam::Vec2;
use tracing::{debug, info};

use crate::config::MapTuning;
use crate::error::GraphError;
use crate::events::{EventBus, Payload};
use crate::map::graph::{NodeId, NodeState, WorldGraph};

/// Result of asking the marker to go somewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The node does not exist.
    Unknown,
    /// The node is locked; nothing happens.
    Locked,
    /// The marker is already travelling; the request is ignored.
    Busy,
    /// The marker was already on the node and the level starts right away.
    Arrived,
    /// The marker set off along `path`.
    Travelling { path: Vec<NodeId> },
}

#[derive(Debug, Clone)]
struct Travel {
    /// Remaining waypoints; the last one is the destination.
    waypoints: Vec<NodeId>,
    next: usize,
}

/// The persistent world map with its travelling marker.
#[derive(Debug)]
pub struct WorldMapScene {
    graph: WorldGraph,
    bus: EventBus,
    tuning: MapTuning,
    marker_node: NodeId,
    marker_position: Vec2,
    travel: Option<Travel>,
}

impl WorldMapScene {
    /// Places the marker on the first non-locked node.
    pub fn new(graph: WorldGraph, bus: EventBus, tuning: MapTuning) -> Result<Self, GraphError> {
        let start = graph
            .nodes()
            .iter()
            .find(|node| node.state == NodeState::Current)
            .or_else(|| graph.nodes().iter().find(|node| node.state != NodeState::Locked))
            .ok_or(GraphError::Empty)?;
        let (marker_node, marker_position) = (start.id, start.position);

        Ok(Self {
            graph,
            bus,
            tuning,
            marker_node,
            marker_position,
            travel: None,
        })
    }

    pub fn graph(&self) -> &WorldGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut WorldGraph {
        &mut self.graph
    }

    pub fn marker_node(&self) -> NodeId {
        self.marker_node
    }

    pub fn marker_position(&self) -> Vec2 {
        self.marker_position
    }

    pub fn is_travelling(&self) -> bool {
        self.travel.is_some()
    }

    /// Sends the marker towards `id`.
    ///
    /// Arrival only emits `level_start`; launching the level is left to the owner of the
    /// scene (see [`crate::scene::SceneContainer::select_node`]).
    pub fn select(&mut self, id: NodeId) -> SelectOutcome {
        let Ok(node) = self.graph.node(id) else {
            debug!(node = id, "Selected unknown node");
            return SelectOutcome::Unknown;
        };
        if node.state == NodeState::Locked {
            debug!(node = id, "Selected locked node, ignoring");
            return SelectOutcome::Locked;
        }
        if self.travel.is_some() {
            debug!(node = id, "Marker is travelling, ignoring selection");
            return SelectOutcome::Busy;
        }
        if id == self.marker_node {
            self.arrive(id);
            return SelectOutcome::Arrived;
        }

        // Straight line when no unlocked route exists.
        let path = self.graph.path(self.marker_node, id).unwrap_or_else(|| vec![self.marker_node, id]);
        debug!(from = self.marker_node, to = id, ?path, "Marker travelling");
        self.travel = Some(Travel {
            waypoints: path.clone(),
            next: 1,
        });
        SelectOutcome::Travelling { path }
    }

    /// Moves the marker along its route. Returns the node it arrived at, if any.
    pub fn tick(&mut self, dt: f32) -> Option<NodeId> {
        let travel = self.travel.as_mut()?;
        let mut budget = self.tuning.marker_speed * dt.max(0.0);

        while let Some(&waypoint) = travel.waypoints.get(travel.next) {
            let target = match self.graph.node(waypoint) {
                Ok(node) => node.position,
                Err(_) => break,
            };
            let remaining = self.marker_position.distance(target);
            if remaining > budget {
                self.marker_position += (target - self.marker_position).normalize_or_zero() * budget;
                return None;
            }

            budget -= remaining;
            self.marker_position = target;
            self.marker_node = waypoint;
            travel.next += 1;
        }

        let destination = travel.waypoints.last().copied().unwrap_or(self.marker_node);
        self.travel = None;
        self.arrive(destination);
        Some(destination)
    }

    fn arrive(&mut self, id: NodeId) {
        self.marker_node = id;
        if let Err(error) = self.graph.mark_current(id) {
            debug!(node = id, %error, "Marker arrived at a node that no longer exists");
            return;
        }
        let Ok(node) = self.graph.node(id) else {
            return;
        };
        self.marker_position = node.position;
        info!(node = id, name = %node.name, "Level start");
        self.bus.emit(Payload::LevelStart(node.level_start()));
    }
}
