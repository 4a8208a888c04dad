//! Prompt-vs-prompt compatibility scoring.

use super::DeployedPrompt;
use super::match_result::MatchFlags;

/// Score every pair starts from.
pub const BASE_SCORE: f64 = 0.5;
/// Bonus when both prompts ask the identical question.
pub const QUESTION_BONUS: f64 = 0.4;
/// Bonus when both prompts share a theme.
pub const THEME_BONUS: f64 = 0.2;

/// Computed score and the flags that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compatibility {
    /// Score in `0.0..=1.0`.
    pub score: f64,
    /// Which criteria matched.
    pub flags: MatchFlags,
}

/// Scores `candidate` against `own`.
///
/// Base 0.5, +0.4 for an identical question, +0.2 for a shared theme,
/// clamped to 1.0. Deterministic and symmetric, so both rows of a pair
/// carry the same value.
#[must_use]
pub fn score(own: &DeployedPrompt, candidate: &DeployedPrompt) -> Compatibility {
    let flags = MatchFlags {
        theme_match: own.theme_id == candidate.theme_id,
        question_match: own.question == candidate.question,
        personality_match: false,
        location_match: false,
    };

    let mut score = BASE_SCORE;
    if flags.question_match {
        score += QUESTION_BONUS;
    }
    if flags.theme_match {
        score += THEME_BONUS;
    }

    Compatibility {
        score: score.min(1.0),
        flags,
    }
}
