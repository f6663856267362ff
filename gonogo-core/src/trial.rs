use serde::{Deserialize, Serialize};

use crate::stimulus::Word;

/// The only key that counts as a response during a trial.
pub const RESPONSE_KEY: char = ' ';

/// Trial state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Fixation,
    Response,
    Feedback,
    Complete,
}

/// Pre-generated descriptor for one stimulus presentation. Immutable once
/// the schedule is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub word: Word,
    pub is_go: bool,
    pub is_practice: bool,
}

impl TrialSpec {
    pub fn new(word: Word, is_practice: bool) -> Self {
        Self {
            word,
            is_go: word.is_go(),
            is_practice,
        }
    }
}

/// Recorded result per trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial_id: usize,
    pub word: Word,
    pub is_go: bool,
    pub is_practice: bool,
    pub response_key: Option<char>,
    pub reaction_time_ns: Option<u64>,
    pub correct: bool,
    pub timestamp_ns: u64,
}

impl TrialResult {
    /// Reaction time rounded to whole milliseconds.
    pub fn reaction_time_ms(&self) -> Option<u64> {
        self.reaction_time_ns.map(|ns| (ns + 500_000) / 1_000_000)
    }
}

/// Outcome category shown after a practice trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Hit,
    Miss,
    CorrectRejection,
    FalseAlarm,
}

impl Feedback {
    pub fn for_outcome(is_go: bool, responded: bool) -> Self {
        match (is_go, responded) {
            (true, true) => Feedback::Hit,
            (true, false) => Feedback::Miss,
            (false, false) => Feedback::CorrectRejection,
            (false, true) => Feedback::FalseAlarm,
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, Feedback::Hit | Feedback::CorrectRejection)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Feedback::Hit => "Correct!",
            Feedback::Miss => "Too slow! Remember to press space for this color.",
            Feedback::CorrectRejection => "Correct! Good job not responding.",
            Feedback::FalseAlarm => "Incorrect! Remember not to press space for this color.",
        }
    }
}
