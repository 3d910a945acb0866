//! The event bus bridging the simulation and the host UI.
//!
//! Every channel carries exactly one payload shape, expressed as a variant of the
//! closed [`Payload`] union. Host JSON is decoded into it once, at the boundary, by
//! [`decode_host_message`]; nothing past that point handles untyped data.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::EnumCount;
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter, IntoStaticStr};
use tracing::{trace, warn};

use crate::battle::BattlePhase;
use crate::error::ConfigError;
use crate::explore::ExploreStage;
use crate::map::LevelStart;
use crate::score::SessionSummary;

/// A named pub/sub topic on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCountMacro, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    /// Host → core: the outcome of the question that was last requested.
    AnswerResult,
    /// Core → host: show the next answer prompt.
    QuestionReady,
    PhaseChange,
    /// Terminal success. Emitted at most once per session.
    LevelComplete,
    /// Terminal failure. Emitted at most once per session.
    GameOver,
    ScoreUpdate,
    LivesUpdate,
    /// A world-map node was entered and its level should be launched.
    LevelStart,
}

impl Channel {
    fn index(self) -> usize {
        self as usize
    }
}

/// The result of evaluating an answer, computed by the host's evaluation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub is_correct: bool,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub points_earned: u32,
}

impl AnswerResult {
    pub fn correct(points_earned: u32) -> Self {
        Self {
            is_correct: true,
            correct_answer: String::new(),
            points_earned,
        }
    }

    pub fn wrong(correct_answer: impl Into<String>) -> Self {
        Self {
            is_correct: false,
            correct_answer: correct_answer.into(),
            points_earned: 0,
        }
    }
}

/// Asks the host for the next answer prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    /// Monotonic question number within the session, starting at 1.
    pub round: u32,
    /// Seconds the player has to answer, when the variant is timed.
    pub time_limit: Option<f32>,
}

/// HUD state for whichever scene is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scene", rename_all = "snake_case")]
pub enum PhaseChange {
    Battle { phase: BattlePhase, boss_hp: u32, lives: u8 },
    Exploration { stage: ExploreStage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub score: u32,
    pub delta: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivesUpdate {
    pub lives: u8,
    pub max_lives: u8,
}

/// Everything that can travel over the bus. The variant determines the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum Payload {
    AnswerResult(AnswerResult),
    QuestionReady(QuestionRequest),
    PhaseChange(PhaseChange),
    LevelComplete(SessionSummary),
    GameOver(SessionSummary),
    ScoreUpdate(ScoreUpdate),
    LivesUpdate(LivesUpdate),
    LevelStart(LevelStart),
}

impl Payload {
    /// The channel this payload is delivered on.
    pub fn channel(&self) -> Channel {
        match self {
            Payload::AnswerResult(_) => Channel::AnswerResult,
            Payload::QuestionReady(_) => Channel::QuestionReady,
            Payload::PhaseChange(_) => Channel::PhaseChange,
            Payload::LevelComplete(_) => Channel::LevelComplete,
            Payload::GameOver(_) => Channel::GameOver,
            Payload::ScoreUpdate(_) => Channel::ScoreUpdate,
            Payload::LivesUpdate(_) => Channel::LivesUpdate,
            Payload::LevelStart(_) => Channel::LevelStart,
        }
    }

    /// Returns `true` for payloads that end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Payload::LevelComplete(_) | Payload::GameOver(_))
    }
}

/// Decodes a message sent by the host, e.g.
/// `{"channel": "answer_result", "payload": {"isCorrect": true, "pointsEarned": 10}}`.
pub fn decode_host_message(json: &str) -> Result<Payload, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Identifies one registration on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken {
    id: u64,
    channel: Channel,
}

impl ListenerToken {
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

const CHANNEL_COUNT: usize = Channel::COUNT;

type Callback = Rc<RefCell<dyn FnMut(&Payload)>>;

struct Listener {
    id: u64,
    callback: Callback,
}

struct Registry {
    next_id: u64,
    channels: [Vec<Listener>; CHANNEL_COUNT],
}

/// A synchronous, single-threaded pub/sub bus.
///
/// Cloning yields another handle to the same bus. One instance is created by the host
/// and handed to every scene at construction.
#[derive(Clone)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.borrow();
        let total: usize = registry.channels.iter().map(Vec::len).sum();
        f.debug_struct("EventBus").field("listeners", &total).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                channels: std::array::from_fn(|_| Vec::new()),
            })),
        }
    }

    /// Registers `callback` on `channel`. Listeners on one channel run in registration order.
    pub fn register<F>(&self, channel: Channel, callback: F) -> ListenerToken
    where
        F: FnMut(&Payload) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.channels[channel.index()].push(Listener {
            id,
            callback: Rc::new(RefCell::new(callback)),
        });
        trace!(%channel, id, "Listener registered");
        ListenerToken { id, channel }
    }

    /// Removes a registration. Returns `false` if it was already gone; never an error.
    pub fn unregister(&self, token: ListenerToken) -> bool {
        let mut registry = self.registry.borrow_mut();
        let listeners = &mut registry.channels[token.channel.index()];
        let before = listeners.len();
        listeners.retain(|listener| listener.id != token.id);
        let removed = listeners.len() != before;
        trace!(channel = %token.channel, id = token.id, removed, "Listener unregistered");
        removed
    }

    /// Synchronously delivers `payload` to every listener on its channel.
    ///
    /// The listener set is snapshotted before the first callback runs: registrations and
    /// removals made during dispatch only affect later emits. Returns the number of
    /// listeners invoked.
    pub fn emit(&self, payload: Payload) -> usize {
        let channel = payload.channel();
        let snapshot: SmallVec<[Callback; 8]> = self.registry.borrow().channels[channel.index()]
            .iter()
            .map(|listener| Rc::clone(&listener.callback))
            .collect();

        trace!(%channel, listeners = snapshot.len(), "Emitting");

        let mut invoked = 0;
        for callback in snapshot {
            match callback.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(&payload);
                    invoked += 1;
                }
                Err(_) => warn!(%channel, "Skipping listener re-entered during its own dispatch"),
            }
        }
        invoked
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.registry.borrow().channels[channel.index()].len()
    }

    pub fn total_listeners(&self) -> usize {
        self.registry.borrow().channels.iter().map(Vec::len).sum()
    }
}

/// The set of registrations owned by one scene, revoked together at teardown.
#[derive(Debug)]
pub struct Subscriptions {
    bus: EventBus,
    tokens: Vec<ListenerToken>,
}

impl Subscriptions {
    pub fn new(bus: EventBus) -> Self {
        Self { bus, tokens: Vec::new() }
    }

    pub fn register<F>(&mut self, channel: Channel, callback: F) -> ListenerToken
    where
        F: FnMut(&Payload) + 'static,
    {
        let token = self.bus.register(channel, callback);
        self.tokens.push(token);
        token
    }

    /// Unregisters every owned listener. Later calls find nothing left to revoke.
    pub fn revoke_all(&mut self) -> usize {
        self.tokens.drain(..).filter(|token| self.bus.unregister(*token)).count()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_are_snake_case() {
        assert_eq!(Channel::QuestionReady.to_string(), "question_ready");
        assert_eq!(<&'static str>::from(Channel::LevelComplete), "level_complete");
    }

    #[test]
    fn test_payload_maps_to_its_channel() {
        assert_eq!(Payload::AnswerResult(AnswerResult::correct(10)).channel(), Channel::AnswerResult);
        assert!(Payload::GameOver(SessionSummary::default()).is_terminal());
        assert!(!Payload::ScoreUpdate(ScoreUpdate { score: 1, delta: 1 }).is_terminal());
    }

    #[test]
    fn test_reentrant_listener_is_skipped_not_panicking() {
        let bus = EventBus::new();
        let inner = bus.clone();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        bus.register(Channel::ScoreUpdate, move |_| {
            *counter.borrow_mut() += 1;
            if *counter.borrow() == 1 {
                inner.emit(Payload::ScoreUpdate(ScoreUpdate { score: 0, delta: 0 }));
            }
        });

        bus.emit(Payload::ScoreUpdate(ScoreUpdate { score: 0, delta: 0 }));
        assert_eq!(*calls.borrow(), 1);
    }
}
