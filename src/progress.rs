//! Progress tracking - answer submission, ratings and per-topic completion

use log::{info, warn};

use crate::db::QuestionStore;
use crate::error::{BankError, Result};
use crate::grading::GradingPolicy;
use crate::ingest::now_timestamp;
use crate::models::{AnswerState, QuestionRecord, RatingAck, RatingState, TopicProgress};

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

/// Clamp a raw score into the accepted 1..=10 range
pub fn clamp_score(score: i64) -> u8 {
    score.clamp(MIN_SCORE, MAX_SCORE) as u8
}

/// Count answered/correct questions among one topic's records
pub fn progress_of(topic: &str, records: &[QuestionRecord]) -> TopicProgress {
    TopicProgress {
        topic: topic.to_string(),
        answered: records.iter().filter(|r| r.is_answered()).count(),
        total: records.len(),
        correct: records.iter().filter(|r| r.is_correct()).count(),
    }
}

#[derive(Clone)]
pub struct ProgressTracker {
    store: QuestionStore,
    policy: GradingPolicy,
}

impl ProgressTracker {
    pub fn new(store: QuestionStore, policy: GradingPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &QuestionStore {
        &self.store
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    /// Grade and record the first answer to a question.
    ///
    /// A question that is already answered keeps its first answer; the stored state is
    /// returned unchanged.
    pub async fn submit_answer(&self, question_id: &str, raw_answer: &str) -> Result<AnswerState> {
        let record = self
            .store
            .get(question_id)
            .await?
            .ok_or_else(|| BankError::NotFound(question_id.to_string()))?;

        if let Some(existing) = record.answer_state {
            warn!("question {} already answered, keeping first answer", question_id);
            return Ok(existing);
        }

        let is_correct = self.policy.grade(&record, raw_answer);
        let state = AnswerState {
            user_answer: raw_answer.to_string(),
            is_correct,
            answered_at: now_timestamp(),
        };

        if self.store.record_answer(question_id, state.clone()).await? {
            info!("answered {} correct={}", question_id, is_correct);
            return Ok(state);
        }

        // Another caller answered between the read and the write.
        self.store
            .get(question_id)
            .await?
            .and_then(|r| r.answer_state)
            .ok_or_else(|| BankError::NotFound(question_id.to_string()))
    }

    /// Store a rating, overwriting any previous one. Out-of-range scores are clamped.
    pub async fn rate(
        &self,
        question_id: &str,
        score: i64,
        feedback: Option<&str>,
    ) -> Result<RatingState> {
        let rating = RatingState {
            score: clamp_score(score),
            feedback: feedback.map(|f| f.to_string()),
        };
        self.store.set_rating(question_id, rating.clone()).await?;
        info!("rated {} score={}", question_id, rating.score);
        Ok(rating)
    }

    /// Mirror a rating the remote endpoint accepted. Returns whether it was stored.
    pub async fn apply_rating_ack(
        &self,
        question_id: &str,
        score: i64,
        feedback: Option<&str>,
        ack: RatingAck,
    ) -> Result<bool> {
        if !ack.ok {
            warn!("rating for {} was not accepted remotely", question_id);
            return Ok(false);
        }
        self.rate(question_id, score, feedback).await?;
        Ok(true)
    }

    /// Return every question in the topic to the unanswered state.
    pub async fn reset_topic(&self, topic: &str) -> Result<usize> {
        self.store.clear_answers(topic).await
    }

    pub async fn topic_progress(&self, topic: &str) -> Result<TopicProgress> {
        let records = self.store.get_by_topic(topic).await?;
        Ok(progress_of(topic, &records))
    }

    /// Answered-but-wrong questions of a topic, in quiz order.
    pub async fn missed_questions(&self, topic: &str) -> Result<Vec<QuestionRecord>> {
        let records = self.store.get_by_topic(topic).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.is_answered() && !r.is_correct())
            .collect())
    }
}
