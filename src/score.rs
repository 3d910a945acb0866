//! Session scoring: accumulated points, answer tallies and the star rating.

use serde::{Deserialize, Serialize};

use crate::constants::scoring::{THREE_STAR_ACCURACY, TWO_STAR_ACCURACY};

/// The final numbers of a play session, carried by the terminal events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u32,
    pub correct: u32,
    pub wrong: u32,
    /// Fraction of accepted answers that were correct, in `0.0..=1.0`.
    pub accuracy: f32,
    pub stars: u8,
}

/// Running tally for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBoard {
    score: u32,
    correct: u32,
    wrong: u32,
    /// Answer events that arrived while nothing was waiting for one.
    discarded: u32,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accepted correct answer and returns the points added.
    pub fn record_correct(&mut self, points: u32) -> u32 {
        self.correct += 1;
        self.score = self.score.saturating_add(points);
        points
    }

    pub fn record_wrong(&mut self) {
        self.wrong += 1;
    }

    pub fn record_discarded(&mut self) {
        self.discarded += 1;
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    pub fn wrong(&self) -> u32 {
        self.wrong
    }

    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    pub fn accuracy(&self) -> f32 {
        let answered = self.correct + self.wrong;
        if answered == 0 {
            return 0.0;
        }
        self.correct as f32 / answered as f32
    }

    /// Builds the summary for a session that ended with `success`.
    pub fn summarize(&self, success: bool) -> SessionSummary {
        let accuracy = self.accuracy();
        SessionSummary {
            score: self.score,
            correct: self.correct,
            wrong: self.wrong,
            accuracy,
            stars: star_rating(accuracy, success),
        }
    }
}

/// Stars awarded for a finished session. A failed session earns none.
pub fn star_rating(accuracy: f32, success: bool) -> u8 {
    if !success {
        return 0;
    }
    if accuracy >= THREE_STAR_ACCURACY {
        3
    } else if accuracy >= TWO_STAR_ACCURACY {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_rating_thresholds() {
        assert_eq!(star_rating(1.0, true), 3);
        assert_eq!(star_rating(0.8, true), 2);
        assert_eq!(star_rating(0.79, true), 1);
        assert_eq!(star_rating(0.0, true), 1);
        assert_eq!(star_rating(1.0, false), 0);
    }

    #[test]
    fn test_discarded_answers_do_not_affect_accuracy() {
        let mut board = ScoreBoard::new();
        board.record_correct(10);
        board.record_wrong();
        board.record_discarded();
        board.record_discarded();
        assert_eq!(board.accuracy(), 0.5);
        assert_eq!(board.discarded(), 2);

        let summary = board.summarize(true);
        assert_eq!(summary.score, 10);
        assert_eq!(summary.stars, 1);
    }
}
