//! Turning generator payloads into storable question records

use chrono::{SecondsFormat, Utc};

use crate::error::{BankError, Result};
use crate::models::{Metadata, QuestionRecord, QuestionWrapper};

/// Topic assigned when the generator does not name one
pub const DEFAULT_UNTITLED_TOPIC: &str = "Bez tematu";

/// Current UTC time in the same shape the generator uses (`2024-05-01T12:00:00.000Z`)
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn meta_string(metadata: &Metadata, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Topic from `metadata.topic`, falling back to `untitled`
pub fn derive_topic(metadata: &Metadata, untitled: &str) -> String {
    meta_string(metadata, "topic").unwrap_or_else(|| untitled.to_string())
}

/// Creation time from `metadata.timestamp`, falling back to the local clock
pub fn derive_created_at(metadata: &Metadata) -> String {
    meta_string(metadata, "timestamp").unwrap_or_else(now_timestamp)
}

/// Build a fresh record (no answer, no rating) from a generated question.
pub fn record_from_wrapper(wrapper: QuestionWrapper, untitled: &str) -> Result<QuestionRecord> {
    let question_id = wrapper.question_id.trim().to_string();
    if question_id.is_empty() {
        return Err(BankError::InvalidArgument(
            "question_id must not be blank".to_string(),
        ));
    }

    let q = wrapper.question;
    let topic = derive_topic(&q.metadata, untitled);
    let created_at = derive_created_at(&q.metadata);

    Ok(QuestionRecord {
        question_id,
        topic,
        created_at,
        kind: q.kind,
        stem: q.stem,
        options: q.options,
        answer: q.answer,
        explanation: q.explanation,
        citations: q.citations,
        metadata: q.metadata,
        answer_state: None,
        rating_state: None,
    })
}
