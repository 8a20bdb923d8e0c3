//! Question records and the payload shapes delivered by the generation service

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Question kind as sent on the wire (`"MCQ"` / `"YN"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "MCQ")]
    MultipleChoice,
    #[serde(rename = "YN")]
    YesNo,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "MCQ",
            QuestionKind::YesNo => "YN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "MCQ" => Some(QuestionKind::MultipleChoice),
            "YN" => Some(QuestionKind::YesNo),
            _ => None,
        }
    }
}

/// Loosely typed metadata value coming from the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<MetaValue>),
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }
}

pub type Metadata = BTreeMap<String, MetaValue>;

/// Source passage backing a generated question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub quote: String,
}

/// The `question` object of a generated payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub kind: QuestionKind,
    pub stem: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// One generated question as returned by the generation endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionWrapper {
    pub question_id: String,
    pub question: QuestionPayload,
}

/// A generation call yields either one wrapper or `{ "items": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationResponse {
    Batch { items: Vec<QuestionWrapper> },
    Single(QuestionWrapper),
}

impl GenerationResponse {
    pub fn into_items(self) -> Vec<QuestionWrapper> {
        match self {
            GenerationResponse::Batch { items } => items,
            GenerationResponse::Single(item) => vec![item],
        }
    }
}

/// Acknowledgement returned by the remote rating endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingAck {
    pub ok: bool,
}

/// Recorded first answer to a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerState {
    pub user_answer: String,
    pub is_correct: bool,
    pub answered_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingState {
    pub score: u8,
    pub feedback: Option<String>,
}

/// Persisted question plus its local answer/rating state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: String,
    pub topic: String,
    pub created_at: String,
    pub kind: QuestionKind,
    pub stem: String,
    pub options: Option<Vec<String>>,
    pub answer: String,
    pub explanation: String,
    pub citations: Vec<Citation>,
    pub metadata: Metadata,
    pub answer_state: Option<AnswerState>,
    pub rating_state: Option<RatingState>,
}

impl QuestionRecord {
    pub fn is_answered(&self) -> bool {
        self.answer_state.is_some()
    }

    pub fn is_correct(&self) -> bool {
        self.answer_state.as_ref().map_or(false, |a| a.is_correct)
    }
}

/// Per-topic entry for the browsing panel
#[cfg_attr(feature = "python", pyo3::pyclass(get_all))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: String,
    pub count: usize,
    pub last_timestamp: String,
}

/// Answer progress within one topic
#[cfg_attr(feature = "python", pyo3::pyclass(get_all))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub topic: String,
    pub answered: usize,
    pub total: usize,
    pub correct: usize,
}

impl TopicProgress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered == self.total
    }

    /// Share of correct answers over all questions in the topic, rounded.
    pub fn percent_correct(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.correct as f64 / self.total as f64) * 100.0).round() as u32
    }
}
