//! Answer grading for multiple-choice and yes/no questions
//!
//! Multiple-choice answers are compared on their first character only, so a canonical
//! answer stored as `"b"` or as `"B) some text"` both match a click on option B. This is
//! lenient on purpose: the generator does not always use the same answer format. It can
//! produce a false positive when an option's text starts with another option's letter.

use crate::config::BankConfig;
use crate::normalize::{letter_for_index, normalize_answer};
use crate::models::{QuestionKind, QuestionRecord};

/// Comparison policy; holds the two literals accepted for yes/no questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingPolicy {
    yes_token: String,
    no_token: String,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self::new("TAK", "NIE")
    }
}

impl GradingPolicy {
    pub fn new(yes_token: &str, no_token: &str) -> Self {
        Self {
            yes_token: normalize_answer(yes_token),
            no_token: normalize_answer(no_token),
        }
    }

    pub fn from_config(config: &BankConfig) -> Self {
        Self::new(&config.yes_token, &config.no_token)
    }

    pub fn yes_token(&self) -> &str {
        &self.yes_token
    }

    pub fn no_token(&self) -> &str {
        &self.no_token
    }

    /// Whether `raw_answer` is a correct answer to `record`. Pure.
    pub fn grade(&self, record: &QuestionRecord, raw_answer: &str) -> bool {
        grade(record.kind, &record.answer, raw_answer)
    }

    /// Answers the UI offers for a question: option letters or the yes/no pair.
    pub fn choices_for(&self, record: &QuestionRecord) -> Vec<String> {
        match record.kind {
            QuestionKind::MultipleChoice => {
                let n = record.options.as_ref().map_or(0, |o| o.len());
                (0..n).map(letter_for_index).collect()
            }
            QuestionKind::YesNo => vec![self.yes_token.clone(), self.no_token.clone()],
        }
    }

    /// True for the normalized yes/no literals of this policy.
    pub fn is_yes_no_token(&self, raw: &str) -> bool {
        let norm = normalize_answer(raw);
        norm == self.yes_token || norm == self.no_token
    }
}

/// Kind-specific comparison of a canonical answer and a raw user answer.
pub fn grade(kind: QuestionKind, canonical: &str, raw_answer: &str) -> bool {
    let expected = normalize_answer(canonical);
    let given = normalize_answer(raw_answer);

    match kind {
        QuestionKind::MultipleChoice => match (expected.chars().next(), given.chars().next()) {
            (Some(e), Some(g)) => e == g,
            _ => false,
        },
        QuestionKind::YesNo => expected == given,
    }
}
