//! Scene ownership: creation, replay and teardown of the active mini-game.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::battle::BattleScene;
use crate::config::{LaunchConfig, LivesPolicy, SceneKind, Tuning};
use crate::effects::{AssetCatalog, NullSink, SharedSink, StaticCatalog};
use crate::error::{GameError, GameResult};
use crate::events::{Channel, EventBus, Payload, Subscriptions};
use crate::explore::ExplorationScene;
use crate::lifecycle::Lifecycle;
use crate::map::{NodeId, SelectOutcome, WorldGraph, WorldMapScene};
use crate::scheduler::Scheduler;
use crate::score::SessionSummary;

/// Everything a scene needs from its host, handed over at construction.
#[derive(Clone)]
pub struct SceneContext {
    pub bus: EventBus,
    pub scheduler: Scheduler,
    pub effects: SharedSink,
    pub assets: Rc<dyn AssetCatalog>,
    pub tuning: Tuning,
}

impl std::fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext")
            .field("bus", &self.bus)
            .field("scheduler", &self.scheduler)
            .field("tuning", &self.tuning)
            .finish_non_exhaustive()
    }
}

impl SceneContext {
    /// A context with no effect sink, no assets and default tuning.
    pub fn new(bus: EventBus, scheduler: Scheduler) -> Self {
        Self {
            bus,
            scheduler,
            effects: Rc::new(RefCell::new(NullSink)),
            assets: Rc::new(StaticCatalog::new()),
            tuning: Tuning::default(),
        }
    }

    pub fn with_effects(mut self, effects: SharedSink) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_assets(mut self, assets: Rc<dyn AssetCatalog>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }
}

/// The running mini-game.
#[derive(Debug)]
pub enum ActiveScene {
    Battle(BattleScene),
    Exploration(ExplorationScene),
}

impl ActiveScene {
    pub fn kind(&self) -> SceneKind {
        match self {
            ActiveScene::Battle(_) => SceneKind::Battle,
            ActiveScene::Exploration(_) => SceneKind::Exploration,
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            ActiveScene::Battle(scene) => scene.is_alive(),
            ActiveScene::Exploration(scene) => scene.is_alive(),
        }
    }

    pub fn lives(&self) -> u8 {
        match self {
            ActiveScene::Battle(scene) => scene.lives(),
            ActiveScene::Exploration(scene) => scene.lives(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        match self {
            ActiveScene::Battle(scene) => scene.summary(),
            ActiveScene::Exploration(scene) => scene.summary(),
        }
    }

    fn start(&mut self) {
        match self {
            ActiveScene::Battle(scene) => scene.start(),
            ActiveScene::Exploration(scene) => scene.start(),
        }
    }

    fn tick(&mut self, dt: f32) {
        // Battles are driven entirely by the scheduler.
        if let ActiveScene::Exploration(scene) = self {
            scene.tick(dt);
        }
    }

    fn teardown(&mut self) -> bool {
        match self {
            ActiveScene::Battle(scene) => scene.teardown(),
            ActiveScene::Exploration(scene) => scene.teardown(),
        }
    }
}

#[derive(Debug, Clone)]
struct Launch {
    config: LaunchConfig,
    kind: SceneKind,
    node: Option<NodeId>,
}

/// Owns at most one active scene plus the persistent world map.
pub struct SceneContainer {
    ctx: SceneContext,
    lifecycle: Lifecycle,
    subscriptions: Subscriptions,
    active: Option<ActiveScene>,
    last_launch: Option<Launch>,
    /// Lives left when the previous scene was torn down.
    last_lives: Option<u8>,
    world_map: Option<WorldMapScene>,
    /// Map node the active scene was launched from.
    active_node: Rc<Cell<Option<NodeId>>>,
    /// Node completions reported on the bus, applied on the next tick.
    completions: Rc<RefCell<Vec<(NodeId, SessionSummary)>>>,
}

impl std::fmt::Debug for SceneContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContainer")
            .field("alive", &self.lifecycle.is_alive())
            .field("active", &self.active)
            .field("world_map", &self.world_map.is_some())
            .finish()
    }
}

impl SceneContainer {
    pub fn new(ctx: SceneContext) -> Self {
        let lifecycle = Lifecycle::new();
        let active_node: Rc<Cell<Option<NodeId>>> = Rc::new(Cell::new(None));
        let completions: Rc<RefCell<Vec<(NodeId, SessionSummary)>>> = Rc::new(RefCell::new(Vec::new()));

        let mut subscriptions = Subscriptions::new(ctx.bus.clone());
        {
            let guard = lifecycle.guard();
            let active_node = Rc::clone(&active_node);
            let completions = Rc::clone(&completions);
            subscriptions.register(Channel::LevelComplete, move |payload| {
                if !guard.is_alive() {
                    return;
                }
                let Payload::LevelComplete(summary) = payload else {
                    return;
                };
                if let Some(node) = active_node.take() {
                    completions.borrow_mut().push((node, summary.clone()));
                }
            });
        }

        Self {
            ctx,
            lifecycle,
            subscriptions,
            active: None,
            last_launch: None,
            last_lives: None,
            world_map: None,
            active_node,
            completions,
        }
    }

    /// Attaches a world map; the marker starts on its first unlocked node.
    pub fn with_world_map(mut self, graph: WorldGraph) -> GameResult<Self> {
        self.world_map = Some(WorldMapScene::new(graph, self.ctx.bus.clone(), self.ctx.tuning.map)?);
        Ok(self)
    }

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn bus(&self) -> &EventBus {
        &self.ctx.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.ctx.scheduler
    }

    pub fn active(&self) -> Option<&ActiveScene> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveScene> {
        self.active.as_mut()
    }

    pub fn battle(&self) -> Option<&BattleScene> {
        match &self.active {
            Some(ActiveScene::Battle(scene)) => Some(scene),
            _ => None,
        }
    }

    pub fn exploration_mut(&mut self) -> Option<&mut ExplorationScene> {
        match &mut self.active {
            Some(ActiveScene::Exploration(scene)) => Some(scene),
            _ => None,
        }
    }

    pub fn world_map(&self) -> Option<&WorldMapScene> {
        self.world_map.as_ref()
    }

    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    /// Starts a fresh session with full lives, tearing down any active scene first.
    pub fn launch(&mut self, config: LaunchConfig, kind: SceneKind) {
        let lives = config.max_lives;
        self.start_scene(
            Launch {
                config,
                kind,
                node: None,
            },
            lives,
        );
    }

    /// Launches the level behind a world-map node. Its `level_complete` marks the node completed.
    pub fn launch_node(&mut self, id: NodeId) -> GameResult<()> {
        let map = self
            .world_map
            .as_ref()
            .ok_or_else(|| GameError::InvalidState("no world map attached".to_string()))?;
        let node = map.graph().node(id)?;
        if !map.graph().is_selectable(id) {
            return Err(GameError::InvalidState(format!("node {id} is locked")));
        }

        let config = node.level.launch_config(&node.theme);
        let lives = config.max_lives;
        let kind = node.level.scene;
        self.start_scene(
            Launch {
                config,
                kind,
                node: Some(id),
            },
            lives,
        );
        Ok(())
    }

    /// Relaunches the last session, honoring its lives policy.
    pub fn replay(&mut self) -> GameResult<()> {
        let launch = self
            .last_launch
            .clone()
            .ok_or_else(|| GameError::InvalidState("nothing to replay".to_string()))?;

        // Capture what the outgoing scene has left before it is torn down.
        self.teardown_active();
        let max_lives = launch.config.max_lives;
        let lives = match launch.config.lives_policy {
            LivesPolicy::PerBattle => max_lives,
            LivesPolicy::CarryOver => self.last_lives.filter(|&lives| lives > 0).unwrap_or(max_lives),
        };
        info!(policy = %launch.config.lives_policy, lives, "Replaying session");
        self.start_scene(launch, lives);
        Ok(())
    }

    /// Sends the map marker to `id`; entering a node launches its level.
    ///
    /// The container owns the launch: both an immediate `Arrived` and a later arrival
    /// during [`SceneContainer::tick`] start the node's scene here. The `level_start` event
    /// emitted on arrival is a notification for the host's HUD, so hosts driving the
    /// container must not launch the level again in response to it.
    pub fn select_node(&mut self, id: NodeId) -> GameResult<SelectOutcome> {
        let map = self
            .world_map
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("no world map attached".to_string()))?;
        let outcome = map.select(id);
        if outcome == SelectOutcome::Arrived {
            self.launch_node(id)?;
        }
        Ok(outcome)
    }

    /// Advances the scheduler, then the active simulation and the map marker.
    pub fn tick(&mut self, dt: f32) {
        if !self.lifecycle.is_alive() {
            return;
        }

        crate::logging::record_frame();
        self.ctx.scheduler.advance_secs(dt);
        if let Some(scene) = self.active.as_mut() {
            scene.tick(dt);
        }
        self.apply_completions();

        let arrived = self.world_map.as_mut().and_then(|map| map.tick(dt));
        if let Some(node) = arrived {
            if let Err(error) = self.launch_node(node) {
                warn!(node, %error, "Could not launch level for map node");
            }
        }
    }

    /// Tears down the active scene and detaches the container from the bus. Safe to call twice.
    pub fn teardown(&mut self) -> bool {
        if !self.lifecycle.begin_teardown() {
            return false;
        }
        self.teardown_active();
        let revoked = self.subscriptions.revoke_all();
        info!(revoked, "Scene container torn down");
        true
    }

    fn start_scene(&mut self, launch: Launch, lives: u8) {
        if !self.lifecycle.is_alive() {
            warn!("Launch requested after teardown");
            return;
        }
        self.teardown_active();
        self.apply_completions();

        let mut scene = match launch.kind {
            SceneKind::Battle => ActiveScene::Battle(BattleScene::new(launch.config.clone(), lives, &self.ctx)),
            SceneKind::Exploration => {
                ActiveScene::Exploration(ExplorationScene::new(launch.config.clone(), lives, &self.ctx))
            }
        };
        info!(kind = %launch.kind, archetype = %launch.config.archetype, node = ?launch.node, lives, "Launching scene");

        self.active_node.set(launch.node);
        self.last_launch = Some(launch);
        scene.start();
        self.active = Some(scene);
    }

    fn teardown_active(&mut self) {
        if let Some(mut scene) = self.active.take() {
            self.last_lives = Some(scene.lives());
            if scene.teardown() {
                debug!(kind = %scene.kind(), "Active scene torn down");
            }
        }
        self.active_node.set(None);
    }

    fn apply_completions(&mut self) {
        let completions: Vec<_> = self.completions.borrow_mut().drain(..).collect();
        let Some(map) = self.world_map.as_mut() else {
            return;
        };
        for (node, summary) in completions {
            match map.graph_mut().complete(node, summary.stars) {
                Ok(unlocked) => info!(node, stars = summary.stars, ?unlocked, "Map node completed"),
                Err(error) => warn!(node, %error, "Could not record node completion"),
            }
        }
    }
}

impl Drop for SceneContainer {
    fn drop(&mut self) {
        self.teardown();
    }
}
