//! The battle phase state machine.
//!
//! [`BattleMachine`] is a pure transition function: it consumes an input and returns a
//! [`Reaction`] describing what to emit, which effects to spawn and which follow-up steps
//! to schedule. It never touches the bus or the clock itself.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};
use tracing::{debug, trace};

use crate::battle::profile::{projectile_profile, ProjectileProfile, VariantTiming};
use crate::config::{BattleTuning, BattleVariant, LaunchConfig};
use crate::effects::{Effect, SoundCue};
use crate::events::{AnswerResult, LivesUpdate, Payload, PhaseChange, QuestionRequest, ScoreUpdate};
use crate::score::{ScoreBoard, SessionSummary};

/// Where the player stands in the arena. The boss stands `travel_distance` to the right.
pub const PLAYER_ANCHOR: Vec2 = Vec2::new(96.0, 280.0);

/// Height above an anchor at which floating text appears.
const TEXT_RISE: Vec2 = Vec2::new(0.0, -48.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BattlePhase {
    /// Waiting for the host to deliver an answer.
    #[default]
    Ready,
    /// A correct answer is being animated: cast, projectile flight, boss hurt.
    ResolvingCorrect,
    /// A wrong answer is being animated: boss attack and cooldown, or the player's death.
    ResolvingWrong,
    /// The boss is out of hit-points and the finishing sequence is playing.
    FinalKill,
    GameOver,
    LevelComplete,
}

impl BattlePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, BattlePhase::GameOver | BattlePhase::LevelComplete)
    }
}

/// Completion of a scheduled animation leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BattleStep {
    CastDone,
    ProjectileLanded,
    HurtDone,
    AttackDone,
    CooldownDone,
    DeathDone,
    ApproachDone,
    StrikeDone,
    /// The timed variant's answer window ran out.
    AnswerTimeout,
}

impl BattleStep {
    /// The only phase in which this step may be applied.
    fn phase(self) -> BattlePhase {
        match self {
            BattleStep::CastDone | BattleStep::ProjectileLanded | BattleStep::HurtDone => BattlePhase::ResolvingCorrect,
            BattleStep::AttackDone | BattleStep::CooldownDone | BattleStep::DeathDone => BattlePhase::ResolvingWrong,
            BattleStep::ApproachDone | BattleStep::StrikeDone => BattlePhase::FinalKill,
            BattleStep::AnswerTimeout => BattlePhase::Ready,
        }
    }
}

/// A step tagged with the question round it was scheduled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampedStep {
    pub round: u32,
    pub step: BattleStep,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BattleInput {
    Start,
    Answer(AnswerResult),
    Step(StampedStep),
}

/// A follow-up step to deliver after `delay` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledStep {
    pub delay: f32,
    pub step: StampedStep,
}

/// Everything a transition asks the driver to do.
#[derive(Debug, Default, PartialEq)]
pub struct Reaction {
    pub emits: Vec<Payload>,
    pub effects: Vec<Effect>,
    pub schedule: Vec<ScheduledStep>,
    /// Any pending answer timeout is void.
    pub cancel_timeout: bool,
}

impl Reaction {
    pub fn is_empty(&self) -> bool {
        self.emits.is_empty() && self.effects.is_empty() && self.schedule.is_empty() && !self.cancel_timeout
    }
}

#[derive(Debug, Clone)]
pub struct BattleMachine {
    phase: BattlePhase,
    started: bool,
    boss_hp: u32,
    max_hp: u32,
    lives: u8,
    max_lives: u8,
    /// Question number; bumped every time the machine re-enters `Ready`.
    round: u32,
    score: ScoreBoard,
    variant: BattleVariant,
    timing: VariantTiming,
    profile: ProjectileProfile,
    terminal_sent: bool,
}

impl BattleMachine {
    /// Creates a machine for `config`, starting with `starting_lives` (clamped to `1..=max_lives`).
    pub fn new(config: &LaunchConfig, tuning: &BattleTuning, starting_lives: u8) -> Self {
        let max_hp = config.max_progress.max(1);
        let max_lives = config.max_lives.max(1);
        Self {
            phase: BattlePhase::Ready,
            started: false,
            boss_hp: max_hp,
            max_hp,
            lives: starting_lives.clamp(1, max_lives),
            max_lives,
            round: 0,
            score: ScoreBoard::new(),
            variant: config.variant,
            timing: VariantTiming::for_variant(config.variant, tuning),
            profile: projectile_profile(&config.archetype),
            terminal_sent: false,
        }
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn boss_hp(&self) -> u32 {
        self.boss_hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    pub fn max_lives(&self) -> u8 {
        self.max_lives
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn score(&self) -> &ScoreBoard {
        &self.score
    }

    pub fn timing(&self) -> &VariantTiming {
        &self.timing
    }

    pub fn profile(&self) -> &ProjectileProfile {
        &self.profile
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn summary(&self) -> SessionSummary {
        self.score.summarize(self.phase == BattlePhase::LevelComplete)
    }

    fn boss_anchor(&self) -> Vec2 {
        PLAYER_ANCHOR + Vec2::X * self.timing.travel_distance
    }

    fn phase_change(&self) -> Payload {
        Payload::PhaseChange(PhaseChange::Battle {
            phase: self.phase,
            boss_hp: self.boss_hp,
            lives: self.lives,
        })
    }

    fn lives_update(&self) -> Payload {
        Payload::LivesUpdate(LivesUpdate {
            lives: self.lives,
            max_lives: self.max_lives,
        })
    }

    fn stamp(&self, delay: f32, step: BattleStep) -> ScheduledStep {
        ScheduledStep {
            delay,
            step: StampedStep { round: self.round, step },
        }
    }

    fn set_phase(&mut self, phase: BattlePhase) {
        debug!(from = %self.phase, to = %phase, boss_hp = self.boss_hp, lives = self.lives, "Battle phase transition");
        self.phase = phase;
    }

    /// Applies one input and returns what the driver has to carry out.
    pub fn handle(&mut self, input: BattleInput) -> Reaction {
        match input {
            BattleInput::Start => self.start(),
            BattleInput::Answer(result) => self.answer(result),
            BattleInput::Step(stamped) => self.step(stamped),
        }
    }

    fn start(&mut self) -> Reaction {
        if self.started {
            trace!("Battle already started");
            return Reaction::default();
        }
        self.started = true;

        let mut reaction = Reaction::default();
        reaction.emits.push(self.lives_update());
        reaction.emits.push(Payload::ScoreUpdate(ScoreUpdate { score: 0, delta: 0 }));
        self.enter_ready(&mut reaction);
        reaction
    }

    fn answer(&mut self, result: AnswerResult) -> Reaction {
        if !self.started || self.phase != BattlePhase::Ready {
            self.score.record_discarded();
            debug!(phase = %self.phase, is_correct = result.is_correct, "Discarding answer received outside ready");
            return Reaction::default();
        }

        let mut reaction = Reaction {
            cancel_timeout: true,
            ..Reaction::default()
        };
        if result.is_correct {
            self.resolve_correct(result.points_earned, &mut reaction);
        } else {
            self.resolve_wrong(Some(result.correct_answer), &mut reaction);
        }
        reaction
    }

    fn step(&mut self, stamped: StampedStep) -> Reaction {
        let StampedStep { round, step } = stamped;
        if round != self.round || step.phase() != self.phase {
            trace!(?step, round, current_round = self.round, phase = %self.phase, "Ignoring stale battle step");
            return Reaction::default();
        }

        let mut reaction = Reaction::default();
        match step {
            BattleStep::CastDone => {
                let travel = self.timing.travel_time(&self.profile);
                reaction.effects.push(Effect::ProjectileLaunch {
                    from: PLAYER_ANCHOR,
                    to: self.boss_anchor(),
                    palette: self.profile.palette,
                    arc_height: self.profile.arc_height,
                    duration: travel,
                });
                reaction.schedule.push(self.stamp(travel, BattleStep::ProjectileLanded));
            }
            BattleStep::ProjectileLanded => {
                reaction.effects.push(Effect::CameraShake {
                    intensity: 4.0,
                    duration: 0.2,
                });
                reaction.effects.push(Effect::Sound(SoundCue::Impact));
                if self.boss_hp == 0 {
                    self.set_phase(BattlePhase::FinalKill);
                    reaction.emits.push(self.phase_change());
                    reaction.schedule.push(self.stamp(self.timing.approach, BattleStep::ApproachDone));
                } else {
                    reaction.effects.push(Effect::Sound(SoundCue::Hurt));
                    reaction.schedule.push(self.stamp(self.timing.hurt, BattleStep::HurtDone));
                }
            }
            BattleStep::HurtDone | BattleStep::CooldownDone => self.enter_ready(&mut reaction),
            BattleStep::AttackDone => {
                reaction.effects.push(Effect::CameraShake {
                    intensity: 6.0,
                    duration: 0.25,
                });
                reaction.effects.push(Effect::Flash {
                    color: [255, 40, 40],
                    duration: 0.15,
                });
                reaction.effects.push(Effect::Sound(SoundCue::PlayerHit));
                reaction.schedule.push(self.stamp(self.timing.cooldown, BattleStep::CooldownDone));
            }
            BattleStep::DeathDone => {
                self.set_phase(BattlePhase::GameOver);
                reaction.effects.push(Effect::Sound(SoundCue::Defeat));
                reaction.emits.push(self.phase_change());
                self.finish(false, &mut reaction);
            }
            BattleStep::ApproachDone => {
                reaction.effects.push(Effect::Sound(SoundCue::BossAttack));
                reaction.schedule.push(self.stamp(self.timing.strike, BattleStep::StrikeDone));
            }
            BattleStep::StrikeDone => {
                self.set_phase(BattlePhase::LevelComplete);
                reaction.effects.push(Effect::Burst {
                    at: self.boss_anchor(),
                    color: self.profile.palette,
                });
                reaction.effects.push(Effect::Sound(SoundCue::Victory));
                reaction.emits.push(self.phase_change());
                self.finish(true, &mut reaction);
            }
            BattleStep::AnswerTimeout => {
                debug!(round = self.round, "Answer window expired");
                reaction.cancel_timeout = true;
                self.resolve_wrong(None, &mut reaction);
            }
        }
        reaction
    }

    fn enter_ready(&mut self, reaction: &mut Reaction) {
        self.round += 1;
        self.set_phase(BattlePhase::Ready);
        reaction.emits.push(self.phase_change());
        reaction.emits.push(Payload::QuestionReady(QuestionRequest {
            round: self.round,
            time_limit: self.timing.answer_limit,
        }));
        if let Some(limit) = self.timing.answer_limit {
            reaction.schedule.push(self.stamp(limit, BattleStep::AnswerTimeout));
        }
    }

    fn resolve_correct(&mut self, points: u32, reaction: &mut Reaction) {
        self.boss_hp = self.boss_hp.saturating_sub(1);
        let delta = self.score.record_correct(points);
        self.set_phase(BattlePhase::ResolvingCorrect);

        reaction.effects.push(Effect::FloatingText {
            text: format!("+{delta}"),
            at: PLAYER_ANCHOR + TEXT_RISE,
        });
        reaction.effects.push(Effect::Sound(match self.variant {
            BattleVariant::MeleeCaster => SoundCue::Cast,
            BattleVariant::RangedThrow | BattleVariant::TimedRunner => SoundCue::Throw,
        }));
        reaction.emits.push(Payload::ScoreUpdate(ScoreUpdate {
            score: self.score.score(),
            delta,
        }));
        reaction.emits.push(self.phase_change());
        reaction.schedule.push(self.stamp(self.timing.cast, BattleStep::CastDone));
    }

    fn resolve_wrong(&mut self, correct_answer: Option<String>, reaction: &mut Reaction) {
        self.lives = self.lives.saturating_sub(1);
        self.score.record_wrong();
        self.set_phase(BattlePhase::ResolvingWrong);

        if let Some(answer) = correct_answer.filter(|answer| !answer.is_empty()) {
            reaction.effects.push(Effect::FloatingText {
                text: answer,
                at: PLAYER_ANCHOR + TEXT_RISE,
            });
        }
        reaction.effects.push(Effect::Sound(SoundCue::BossAttack));
        reaction.emits.push(Payload::ScoreUpdate(ScoreUpdate {
            score: self.score.score(),
            delta: 0,
        }));
        reaction.emits.push(self.lives_update());
        reaction.emits.push(self.phase_change());

        if self.lives == 0 {
            reaction.schedule.push(self.stamp(self.timing.death_delay, BattleStep::DeathDone));
        } else {
            reaction.schedule.push(self.stamp(self.timing.attack, BattleStep::AttackDone));
        }
    }

    fn finish(&mut self, success: bool, reaction: &mut Reaction) {
        if self.terminal_sent {
            return;
        }
        self.terminal_sent = true;
        let summary = self.summary();
        reaction.emits.push(if success {
            Payload::LevelComplete(summary)
        } else {
            Payload::GameOver(summary)
        });
    }
}
