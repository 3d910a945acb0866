use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use speculoos::prelude::*;

use playfield::battle::{BattlePhase, BattleScene};
use playfield::config::{BattleVariant, Tuning};
use playfield::effects::{Effect, SoundCue, StaticCatalog};
use playfield::events::{Channel, LivesUpdate, Payload, PhaseChange, QuestionRequest, ScoreUpdate};

mod common;

use common::{answer, battle_config, harness, settle, Recorder};

fn phases(recorder: &Recorder) -> Vec<BattlePhase> {
    recorder
        .on(Channel::PhaseChange)
        .into_iter()
        .filter_map(|payload| match payload {
            Payload::PhaseChange(PhaseChange::Battle { phase, .. }) => Some(phase),
            _ => None,
        })
        .collect()
}

#[test]
fn test_start_emits_hud_then_first_question() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);

    assert_that(&recorder.all().is_empty()).is_true();
    scene.start();

    assert_eq!(
        recorder.all(),
        vec![
            Payload::LivesUpdate(LivesUpdate { lives: 3, max_lives: 3 }),
            Payload::ScoreUpdate(ScoreUpdate { score: 0, delta: 0 }),
            Payload::PhaseChange(PhaseChange::Battle {
                phase: BattlePhase::Ready,
                boss_hp: 3,
                lives: 3,
            }),
            Payload::QuestionReady(QuestionRequest {
                round: 1,
                time_limit: None,
            }),
        ]
    );
}

#[test]
fn test_three_correct_answers_defeat_the_boss() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);
    scene.start();

    let mut hp = Vec::new();
    for _ in 0..3 {
        answer(&h.bus, true);
        hp.push(scene.boss_hp());
        settle(&h.scheduler);
    }

    assert_eq!(hp, vec![2, 1, 0]);
    assert_eq!(phases(&recorder).iter().filter(|&&phase| phase == BattlePhase::FinalKill).count(), 1);
    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(1);
    assert_that(&recorder.count(Channel::GameOver)).is_equal_to(0);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::LevelComplete);

    let summary = scene.summary();
    assert_eq!(summary.correct, 3);
    assert_eq!(summary.score, 30);
    assert_eq!(summary.stars, 3);
}

#[test]
fn test_three_wrong_answers_end_the_game() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);
    scene.start();

    let mut lives = Vec::new();
    for attempt in 1..=3 {
        answer(&h.bus, false);
        lives.push(scene.lives());
        if attempt < 3 {
            settle(&h.scheduler);
            assert_that(&recorder.count(Channel::GameOver)).is_equal_to(0);
        }
    }
    settle(&h.scheduler);

    assert_eq!(lives, vec![2, 1, 0]);
    assert_that(&recorder.count(Channel::GameOver)).is_equal_to(1);
    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(0);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::GameOver);
    assert_eq!(scene.summary().stars, 0);
}

#[test]
fn test_wrong_answers_do_not_block_the_win() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let scene = BattleScene::new(battle_config(2, 3), 3, &h.ctx);
    scene.start();

    for correct in [true, false, true] {
        answer(&h.bus, correct);
        settle(&h.scheduler);
    }

    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(1);
    assert_that(&scene.lives()).is_equal_to(2);
    let summary = scene.summary();
    assert_eq!((summary.correct, summary.wrong), (2, 1));
    assert_eq!(summary.stars, 1);
}

#[test]
fn test_answer_while_resolving_is_discarded() {
    let h = harness();
    let scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);
    scene.start();

    answer(&h.bus, true);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::ResolvingCorrect);

    answer(&h.bus, true);
    answer(&h.bus, false);

    assert_that(&scene.boss_hp()).is_equal_to(2);
    assert_that(&scene.lives()).is_equal_to(3);
    assert_that(&scene.discarded_answers()).is_equal_to(2);
}

#[test]
fn test_answer_during_final_kill_is_discarded() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let scene = BattleScene::new(battle_config(1, 3), 3, &h.ctx);
    scene.start();

    answer(&h.bus, true);
    while scene.phase() == BattlePhase::ResolvingCorrect {
        h.scheduler.advance(Duration::from_millis(50));
    }
    assert_that(&scene.phase()).is_equal_to(BattlePhase::FinalKill);

    answer(&h.bus, false);
    settle(&h.scheduler);

    assert_that(&scene.lives()).is_equal_to(3);
    assert_that(&scene.discarded_answers()).is_equal_to(1);
    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(1);

    // Answers after the session ended change nothing either.
    recorder.clear();
    answer(&h.bus, true);
    settle(&h.scheduler);
    assert_eq!(recorder.on(Channel::LevelComplete), Vec::new());
    assert_that(&scene.discarded_answers()).is_equal_to(2);
}

#[test]
fn test_teardown_is_idempotent_and_detaches_listeners() {
    let h = harness();
    let mut scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);
    scene.start();
    assert_that(&h.bus.listener_count(Channel::AnswerResult)).is_equal_to(1);

    assert_that(&scene.teardown()).is_true();
    assert_that(&scene.teardown()).is_false();
    assert_that(&scene.is_alive()).is_false();
    assert_that(&h.bus.listener_count(Channel::AnswerResult)).is_equal_to(0);
}

#[test]
fn test_pending_steps_do_nothing_after_teardown() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let mut scene = BattleScene::new(battle_config(1, 3), 3, &h.ctx);
    scene.start();
    answer(&h.bus, true);

    scene.teardown();
    recorder.clear();
    h.effects.clear();
    settle(&h.scheduler);

    assert_eq!(recorder.all(), Vec::new());
    assert_that(&h.effects.effects().is_empty()).is_true();
    assert_that(&scene.phase()).is_equal_to(BattlePhase::ResolvingCorrect);
    assert_that(&h.scheduler.pending()).is_equal_to(0);
}

#[test]
fn test_dropping_the_scene_cancels_its_work() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let baseline = h.bus.listener_count(Channel::AnswerResult);
    {
        let scene = BattleScene::new(battle_config(1, 3), 3, &h.ctx);
        scene.start();
        answer(&h.bus, true);
    }
    recorder.clear();
    settle(&h.scheduler);

    assert_eq!(recorder.all(), Vec::new());
    assert_that(&h.bus.listener_count(Channel::AnswerResult)).is_equal_to(baseline);
}

#[test]
fn test_timed_runner_timeout_costs_a_life() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let config = battle_config(3, 3).with_variant(BattleVariant::TimedRunner);
    let scene = BattleScene::new(config, 3, &h.ctx);
    scene.start();

    let limit = h.ctx.tuning.battle.runner_answer_limit;
    assert_eq!(
        recorder.on(Channel::QuestionReady),
        vec![Payload::QuestionReady(QuestionRequest {
            round: 1,
            time_limit: Some(limit),
        })]
    );

    h.scheduler.advance(Duration::from_secs_f32(limit - 0.1));
    assert_that(&scene.lives()).is_equal_to(3);

    h.scheduler.advance(Duration::from_millis(200));
    assert_that(&scene.lives()).is_equal_to(2);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::ResolvingWrong);

    settle(&h.scheduler);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::Ready);
    assert_that(&scene.round()).is_equal_to(2);
}

#[test]
fn test_answering_in_time_cancels_the_timeout() {
    let h = harness();
    let config = battle_config(3, 3).with_variant(BattleVariant::TimedRunner);
    let scene = BattleScene::new(config, 3, &h.ctx);
    scene.start();

    h.scheduler.advance(Duration::from_secs(1));
    answer(&h.bus, true);
    settle(&h.scheduler);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::Ready);

    // Past the first question's deadline but inside the second one's.
    h.scheduler.advance(Duration::from_secs(5));
    assert_that(&scene.lives()).is_equal_to(3);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::Ready);
}

#[test]
fn test_projectile_uses_archetype_palette() {
    let h = harness();
    let scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);
    scene.start();
    answer(&h.bus, true);
    settle(&h.scheduler);

    let launches: Vec<_> = h
        .effects
        .effects()
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::ProjectileLaunch { palette, arc_height, .. } => Some((palette, arc_height)),
            _ => None,
        })
        .collect();
    assert_eq!(launches, vec![([255, 110, 20], 60.0)]);
    assert_that(&h.effects.count(|effect| *effect == Effect::Sound(SoundCue::Cast))).is_equal_to(1);
}

#[test]
fn test_released_effect_surface_does_not_stall_the_battle() {
    let h = harness();
    let recorder = Recorder::attach(&h.bus);
    let scene = BattleScene::new(battle_config(1, 3), 3, &h.ctx);
    h.effects.release();
    scene.start();

    answer(&h.bus, true);
    settle(&h.scheduler);

    assert_that(&h.effects.effects().is_empty()).is_true();
    assert_that(&recorder.count(Channel::LevelComplete)).is_equal_to(1);
}

#[test]
fn test_missing_assets_fall_back_to_primitives() {
    let h = harness();
    let scene = BattleScene::new(battle_config(3, 3), 3, &h.ctx);
    assert_that(&scene.boss_visual().is_fallback()).is_true();
    assert_that(&scene.projectile_visual().is_fallback()).is_true();

    let ctx = h
        .ctx
        .clone()
        .with_assets(Rc::new(StaticCatalog::new().with_sprite("dragon", 8).with_sprite("projectile_fireball", 4)));
    let scene = BattleScene::new(battle_config(3, 3), 3, &ctx);
    assert_that(&scene.boss_visual().is_fallback()).is_false();
    assert_that(&scene.projectile_visual().is_fallback()).is_false();
}

#[test]
fn test_listener_tearing_down_on_terminal_event_is_safe() {
    let h = harness();
    let scene = Rc::new(std::cell::RefCell::new(BattleScene::new(battle_config(1, 3), 3, &h.ctx)));
    {
        let scene = Rc::clone(&scene);
        h.bus.register(Channel::LevelComplete, move |_| {
            scene.borrow_mut().teardown();
        });
    }
    scene.borrow().start();

    answer(&h.bus, true);
    settle(&h.scheduler);

    assert_that(&scene.borrow().is_alive()).is_false();
    assert_that(&scene.borrow().phase()).is_equal_to(BattlePhase::LevelComplete);
}

#[test]
fn test_oversized_timing_never_panics() {
    let mut tuning = Tuning::default();
    tuning.battle.attack = 1.0e30;
    let h = harness();
    let ctx = h.ctx.clone().with_tuning(tuning);
    let scene = BattleScene::new(battle_config(3, 3), 3, &ctx);
    scene.start();

    answer(&h.bus, false);
    settle(&h.scheduler);

    assert_that(&scene.lives()).is_equal_to(2);
    assert_that(&scene.phase()).is_equal_to(BattlePhase::ResolvingWrong);
    assert_that(&h.scheduler.pending()).is_equal_to(1);
}
