use glam::Vec2;
use pathfinding::prelude::dijkstra;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum_macros::Display;
use tracing::debug;

use crate::config::{BattleVariant, LaunchConfig, SceneKind};
use crate::error::GraphError;

/// A unique identifier for a node, represented by its index in the graph's storage.
pub type NodeId = usize;

/// The highest star rating a node can hold.
pub const MAX_STARS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeState {
    /// Not yet reachable; cannot be selected.
    Locked,
    /// Unlocked and playable, not yet completed.
    Current,
    Completed,
}

/// What a node launches when it is entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    pub scene: SceneKind,
    pub archetype: String,
    pub item_type: String,
    pub variant: BattleVariant,
    pub max_progress: u32,
}

impl LevelConfig {
    pub fn battle(archetype: impl Into<String>, item_type: impl Into<String>, variant: BattleVariant, max_progress: u32) -> Self {
        Self {
            scene: SceneKind::Battle,
            archetype: archetype.into(),
            item_type: item_type.into(),
            variant,
            max_progress,
        }
    }

    pub fn exploration(archetype: impl Into<String>, agents: u32) -> Self {
        Self {
            scene: SceneKind::Exploration,
            archetype: archetype.into(),
            item_type: String::new(),
            variant: BattleVariant::default(),
            max_progress: agents,
        }
    }

    /// The launch configuration for playing this level under `theme`.
    pub fn launch_config(&self, theme: &str) -> LaunchConfig {
        LaunchConfig::new(theme, self.archetype.clone(), self.item_type.clone(), self.max_progress).with_variant(self.variant)
    }
}

/// Payload of the `level_start` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStart {
    pub node: NodeId,
    pub name: String,
    pub theme: String,
    pub level: LevelConfig,
}

/// A level on the world map.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldNode {
    pub id: NodeId,
    pub name: String,
    pub state: NodeState,
    pub stars: u8,
    pub theme: String,
    pub position: Vec2,
    pub level: LevelConfig,
    connections: SmallVec<[NodeId; 4]>,
}

impl WorldNode {
    /// Outgoing connections, in the order they were added.
    pub fn connections(&self) -> &[NodeId] {
        &self.connections
    }

    pub fn level_start(&self) -> LevelStart {
        LevelStart {
            node: self.id,
            name: self.name.clone(),
            theme: self.theme.clone(),
            level: self.level.clone(),
        }
    }
}

/// How an edge is drawn. Derived from node states, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EdgeStyle {
    Completed,
    Default,
    Locked,
}

/// The durable world-map state: the node list and its connections.
#[derive(Debug, Clone, Default)]
pub struct WorldGraph {
    nodes: Vec<WorldNode>,
}

impl WorldGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its ID.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        theme: impl Into<String>,
        position: Vec2,
        level: LevelConfig,
        state: NodeState,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(WorldNode {
            id,
            name: name.into(),
            state,
            stars: 0,
            theme: theme.into(),
            position,
            level,
            connections: SmallVec::new(),
        });
        id
    }

    /// Adds a directed connection. Completing `from` unlocks `to`.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.node(to)?;
        if from == to {
            return Err(GraphError::SelfConnection(from));
        }
        let node = self.node_mut(from)?;
        if node.connections.contains(&to) {
            return Err(GraphError::DuplicateConnection { from, to });
        }
        node.connections.push(to);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Result<&WorldNode, GraphError> {
        self.nodes.get(id).ok_or(GraphError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut WorldNode, GraphError> {
        self.nodes.get_mut(id).ok_or(GraphError::NodeNotFound(id))
    }

    pub fn nodes(&self) -> &[WorldNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A node can be selected only if it exists and is not locked.
    pub fn is_selectable(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.state != NodeState::Locked)
    }

    /// Marks `id` completed, keeps the best star rating and unlocks its locked successors.
    ///
    /// Returns the nodes that were unlocked.
    pub fn complete(&mut self, id: NodeId, stars: u8) -> Result<SmallVec<[NodeId; 4]>, GraphError> {
        let node = self.node_mut(id)?;
        node.state = NodeState::Completed;
        node.stars = node.stars.max(stars.min(MAX_STARS));
        let successors = node.connections.clone();

        let mut unlocked = SmallVec::new();
        for successor in successors {
            let next = &mut self.nodes[successor];
            if next.state == NodeState::Locked {
                next.state = NodeState::Current;
                unlocked.push(successor);
            }
        }
        debug!(node = id, stars, ?unlocked, "World node completed");
        Ok(unlocked)
    }

    /// Makes `id` the current node, unless it is already completed.
    pub fn mark_current(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        if node.state != NodeState::Completed {
            node.state = NodeState::Current;
        }
        Ok(())
    }

    /// Rendering style of the edge `from → to`, or `None` if there is no such edge.
    pub fn edge_style(&self, from: NodeId, to: NodeId) -> Option<EdgeStyle> {
        let source = self.nodes.get(from)?;
        if !source.connections.contains(&to) {
            return None;
        }
        let target = self.nodes.get(to)?;
        Some(match (source.state, target.state) {
            (_, NodeState::Locked) | (NodeState::Locked, _) => EdgeStyle::Locked,
            (NodeState::Completed, _) => EdgeStyle::Completed,
            _ => EdgeStyle::Default,
        })
    }

    /// Every edge with its derived style.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, EdgeStyle)> + '_ {
        self.nodes.iter().flat_map(move |node| {
            node.connections
                .iter()
                .filter_map(move |&to| self.edge_style(node.id, to).map(|style| (node.id, to, style)))
        })
    }

    /// Nodes joined to `id` by an edge in either direction.
    fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let outgoing = self.nodes.get(id).into_iter().flat_map(|node| node.connections.iter().copied());
        let incoming = self
            .nodes
            .iter()
            .filter(move |node| node.connections.contains(&id))
            .map(|node| node.id);
        outgoing.chain(incoming)
    }

    /// Shortest walk from `from` to `to` through unlocked nodes, including both ends.
    pub fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        if self.nodes.get(from).is_none() || !self.is_selectable(to) {
            return None;
        }

        dijkstra(
            &from,
            |&id| {
                let position = self.nodes[id].position;
                self.neighbors(id)
                    .filter(|&next| self.nodes[next].state != NodeState::Locked)
                    .map(|next| (next, (position.distance(self.nodes[next].position) * 100.0) as u32))
                    .collect::<SmallVec<[(NodeId, u32); 8]>>()
            },
            |&id| id == to,
        )
        .map(|(path, _cost)| path)
    }
}
