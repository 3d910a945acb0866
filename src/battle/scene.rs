//! Drives a [`BattleMachine`] from the event bus and the scheduler.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::battle::phase::{BattleInput, BattleMachine, BattlePhase, BattleStep, Reaction};
use crate::battle::profile::{theme_style, ThemeStyle};
use crate::config::LaunchConfig;
use crate::effects::{resolve_visual, spawn_shared, Primitive, SharedSink, Visual};
use crate::events::{Channel, EventBus, Payload, Subscriptions};
use crate::lifecycle::Lifecycle;
use crate::scene::SceneContext;
use crate::scheduler::{delay_from_secs, Scheduler, TaskHandle, TaskSet};
use crate::score::SessionSummary;

/// State reachable from deferred callbacks. Callbacks hold a [`Weak`] to it plus a guard.
struct Shared {
    lifecycle: Lifecycle,
    machine: RefCell<BattleMachine>,
    bus: EventBus,
    scheduler: Scheduler,
    effects: SharedSink,
    timers: RefCell<TaskSet>,
    timeout: RefCell<Option<TaskHandle>>,
}

impl Shared {
    fn dispatch(this: &Rc<Shared>, input: BattleInput) {
        if !this.lifecycle.is_alive() {
            trace!(?input, "Battle input after teardown");
            return;
        }

        // The borrow ends before the reaction runs, so listeners may feed answers back in.
        let reaction = match this.machine.try_borrow_mut() {
            Ok(mut machine) => machine.handle(input),
            Err(_) => {
                warn!(?input, "Battle input arrived while a transition was running; dropping it");
                return;
            }
        };
        Shared::apply(this, reaction);
    }

    fn apply(this: &Rc<Shared>, reaction: Reaction) {
        if reaction.cancel_timeout {
            if let Some(handle) = this.timeout.borrow_mut().take() {
                handle.cancel();
            }
        }

        for scheduled in reaction.schedule {
            let weak: Weak<Shared> = Rc::downgrade(this);
            let step = scheduled.step;
            let handle = this.scheduler.after(
                delay_from_secs(scheduled.delay),
                this.lifecycle.guard(),
                step.step.into(),
                move || {
                    if let Some(shared) = weak.upgrade() {
                        Shared::dispatch(&shared, BattleInput::Step(step));
                    }
                },
            );
            if step.step == BattleStep::AnswerTimeout {
                *this.timeout.borrow_mut() = Some(handle.clone());
            }
            this.timers.borrow_mut().track(handle);
        }

        for effect in reaction.effects {
            spawn_shared(&this.effects, effect);
        }

        for payload in reaction.emits {
            // A listener may have torn the scene down during an earlier emit.
            if !this.lifecycle.is_alive() {
                debug!(channel = %payload.channel(), "Scene torn down mid-reaction, dropping remaining emits");
                break;
            }
            if payload.is_terminal() {
                info!(channel = %payload.channel(), "Battle finished");
            }
            this.bus.emit(payload);
        }
    }
}

/// One running battle.
pub struct BattleScene {
    shared: Rc<Shared>,
    subscriptions: Subscriptions,
    config: LaunchConfig,
    theme: ThemeStyle,
    boss_visual: Visual,
    projectile_visual: Visual,
}

impl std::fmt::Debug for BattleScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleScene")
            .field("alive", &self.is_alive())
            .field("phase", &self.phase())
            .field("boss_hp", &self.boss_hp())
            .field("lives", &self.lives())
            .finish()
    }
}

impl BattleScene {
    /// Builds the scene and subscribes it to answer results. Nothing is emitted until [`BattleScene::start`].
    pub fn new(config: LaunchConfig, starting_lives: u8, ctx: &SceneContext) -> Self {
        let machine = BattleMachine::new(&config, &ctx.tuning.battle, starting_lives);
        let profile = *machine.profile();

        let boss_visual = resolve_visual(
            ctx.assets.as_ref(),
            &config.archetype,
            Primitive::Rect {
                size: glam::Vec2::new(96.0, 128.0),
                color: profile.palette,
            },
        );
        let projectile_visual = resolve_visual(ctx.assets.as_ref(), profile.visual, profile.fallback());

        let shared = Rc::new(Shared {
            lifecycle: Lifecycle::new(),
            machine: RefCell::new(machine),
            bus: ctx.bus.clone(),
            scheduler: ctx.scheduler.clone(),
            effects: Rc::clone(&ctx.effects),
            timers: RefCell::new(TaskSet::default()),
            timeout: RefCell::new(None),
        });

        let mut subscriptions = Subscriptions::new(ctx.bus.clone());
        let weak = Rc::downgrade(&shared);
        let guard = shared.lifecycle.guard();
        subscriptions.register(Channel::AnswerResult, move |payload| {
            if !guard.is_alive() {
                return;
            }
            let Payload::AnswerResult(result) = payload else {
                return;
            };
            if let Some(shared) = weak.upgrade() {
                Shared::dispatch(&shared, BattleInput::Answer(result.clone()));
            }
        });

        Self {
            shared,
            subscriptions,
            theme: theme_style(&config.theme),
            config,
            boss_visual,
            projectile_visual,
        }
    }

    /// Emits the opening HUD state and the first question request.
    pub fn start(&self) {
        info!(
            archetype = %self.config.archetype,
            variant = %self.config.variant,
            boss_hp = self.boss_hp(),
            lives = self.lives(),
            "Battle started"
        );
        Shared::dispatch(&self.shared, BattleInput::Start);
    }

    /// Flips the lifecycle flag, revokes listeners and cancels pending timers.
    ///
    /// Returns `false` when the scene was already torn down.
    pub fn teardown(&mut self) -> bool {
        if !self.shared.lifecycle.begin_teardown() {
            return false;
        }
        let revoked = self.subscriptions.revoke_all();
        let cancelled = self.shared.timers.borrow_mut().cancel_all();
        self.shared.timeout.borrow_mut().take();
        info!(revoked, cancelled, "Battle scene torn down");
        true
    }

    pub fn is_alive(&self) -> bool {
        self.shared.lifecycle.is_alive()
    }

    pub fn phase(&self) -> BattlePhase {
        self.shared.machine.borrow().phase()
    }

    pub fn boss_hp(&self) -> u32 {
        self.shared.machine.borrow().boss_hp()
    }

    pub fn lives(&self) -> u8 {
        self.shared.machine.borrow().lives()
    }

    pub fn round(&self) -> u32 {
        self.shared.machine.borrow().round()
    }

    /// Answer events that arrived outside `ready`.
    pub fn discarded_answers(&self) -> u32 {
        self.shared.machine.borrow().score().discarded()
    }

    pub fn summary(&self) -> SessionSummary {
        self.shared.machine.borrow().summary()
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn theme(&self) -> ThemeStyle {
        self.theme
    }

    pub fn boss_visual(&self) -> &Visual {
        &self.boss_visual
    }

    pub fn projectile_visual(&self) -> &Visual {
        &self.projectile_visual
    }
}

impl Drop for BattleScene {
    fn drop(&mut self) {
        self.teardown();
    }
}
