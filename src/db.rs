//! Persistent question store backed by SQLite
//!
//! Every public operation runs in one SQLite transaction on a blocking worker, so a
//! caller never observes a half-applied mutation. The topic index is a native SQLite
//! index over `(topic, created_at, seq)` and is maintained by the engine inside the
//! same transaction as the row write.

use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::BankConfig;
use crate::error::{BankError, Result};
use crate::ingest::{record_from_wrapper, DEFAULT_UNTITLED_TOPIC};
use crate::models::{AnswerState, GenerationResponse, QuestionKind, QuestionRecord, RatingState};
use crate::notify::ChangeNotifier;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS questions (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        question_id TEXT NOT NULL UNIQUE,
        topic TEXT NOT NULL,
        created_at TEXT NOT NULL,
        kind TEXT NOT NULL,
        stem TEXT NOT NULL,
        options TEXT,
        answer TEXT NOT NULL,
        explanation TEXT NOT NULL,
        citations TEXT NOT NULL,
        metadata TEXT NOT NULL,
        user_answer TEXT,
        is_correct INTEGER,
        answered_at TEXT,
        rating_score INTEGER,
        rating_feedback TEXT,
        CHECK (
            (user_answer IS NULL AND is_correct IS NULL AND answered_at IS NULL)
            OR (user_answer IS NOT NULL AND is_correct IS NOT NULL AND answered_at IS NOT NULL)
        ),
        CHECK (rating_score IS NULL OR rating_score BETWEEN 1 AND 10)
    );

    CREATE INDEX IF NOT EXISTS idx_questions_topic ON questions(topic, created_at, seq);
"#;

const SELECT_COLUMNS: &str = "SELECT question_id, topic, created_at, kind, stem, options, answer, \
     explanation, citations, metadata, user_answer, is_correct, answered_at, rating_score, \
     rating_feedback FROM questions";

/// Async handle to the question database. Clones share one connection.
#[derive(Clone)]
pub struct QuestionStore {
    conn: Arc<Mutex<Connection>>,
    notifier: ChangeNotifier,
    untitled_topic: String,
}

impl QuestionStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            BankError::StorageUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!("question store opened at {}", path.display());
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BankError::StorageUnavailable(format!("cannot open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    pub fn open_with_config(config: &BankConfig) -> Result<Self> {
        Ok(Self::open(&config.db_path)?.with_untitled_topic(&config.untitled_topic))
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| BankError::StorageUnavailable(format!("cannot initialize schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            notifier: ChangeNotifier::global(),
            untitled_topic: DEFAULT_UNTITLED_TOPIC.to_string(),
        })
    }

    /// Route change signals to `notifier` instead of the process-wide one.
    pub fn with_notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_untitled_topic(mut self, topic: &str) -> Self {
        self.untitled_topic = topic.to_string();
        self
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn untitled_topic(&self) -> &str {
        &self.untitled_topic
    }

    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| BankError::StorageUnavailable("connection lock poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| BankError::StorageUnavailable(format!("storage task failed: {}", e)))?
    }

    // ==================== Writes ====================

    /// Insert a record or replace the payload of the one with the same id.
    ///
    /// An existing row keeps its topic, creation time and rating. Its answer is kept
    /// only while the kind and canonical answer are unchanged, so a stored grade never
    /// refers to a different answer key.
    pub async fn upsert(&self, record: QuestionRecord) -> Result<()> {
        self.upsert_many(vec![record]).await.map(|_| ())
    }

    /// Upsert several records in one transaction. Returns how many were written.
    pub async fn upsert_many(&self, records: Vec<QuestionRecord>) -> Result<usize> {
        if let Some(bad) = records.iter().find(|r| r.question_id.trim().is_empty()) {
            return Err(BankError::InvalidArgument(format!(
                "blank question_id for stem '{}'",
                bad.stem
            )));
        }

        let written = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                for record in &records {
                    upsert_row(&tx, record)?;
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await?;

        info!("upserted {} question(s)", written);
        self.notifier.notify();
        Ok(written)
    }

    /// Store everything a generation call returned. Returns the stored ids in order.
    pub async fn ingest(&self, response: GenerationResponse) -> Result<Vec<String>> {
        let records = response
            .into_items()
            .into_iter()
            .map(|w| record_from_wrapper(w, &self.untitled_topic))
            .collect::<Result<Vec<_>>>()?;
        let ids = records.iter().map(|r| r.question_id.clone()).collect();
        self.upsert_many(records).await?;
        Ok(ids)
    }

    /// Remove one question. Absent ids are not an error.
    pub async fn delete_one(&self, question_id: &str) -> Result<bool> {
        let id = question_id.to_string();
        let deleted = self
            .run(move |conn| {
                let n = conn.execute("DELETE FROM questions WHERE question_id = ?1", params![id])?;
                Ok(n > 0)
            })
            .await?;

        info!("delete_one {} -> removed={}", question_id, deleted);
        self.notifier.notify();
        Ok(deleted)
    }

    /// Remove every question whose topic is in `topics`, in a single transaction.
    pub async fn delete_topics<S: AsRef<str>>(&self, topics: &[S]) -> Result<usize> {
        let topics: BTreeSet<String> = topics.iter().map(|t| t.as_ref().to_string()).collect();
        if topics.is_empty() {
            return Ok(0);
        }
        if topics.iter().any(|t| t.trim().is_empty()) {
            return Err(BankError::InvalidArgument(
                "topic names must not be blank".to_string(),
            ));
        }

        let count = topics.len();
        let deleted = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                let mut deleted = 0;
                {
                    let mut stmt = tx.prepare("DELETE FROM questions WHERE topic = ?1")?;
                    for topic in &topics {
                        deleted += stmt.execute(params![topic])?;
                    }
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await?;

        info!("deleted {} question(s) across {} topic(s)", deleted, count);
        self.notifier.notify();
        Ok(deleted)
    }

    pub async fn clear_all(&self) -> Result<usize> {
        let deleted = self
            .run(|conn| Ok(conn.execute("DELETE FROM questions", [])?))
            .await?;

        info!("cleared question store ({} row(s))", deleted);
        self.notifier.notify();
        Ok(deleted)
    }

    /// Write the first answer for a question.
    ///
    /// Returns `false` without touching the row when it is already answered.
    pub async fn record_answer(&self, question_id: &str, answer: AnswerState) -> Result<bool> {
        let id = question_id.to_string();
        let written = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                ensure_exists(&tx, &id)?;
                let n = tx.execute(
                    "UPDATE questions SET user_answer = ?2, is_correct = ?3, answered_at = ?4
                     WHERE question_id = ?1 AND user_answer IS NULL",
                    params![id, answer.user_answer, answer.is_correct, answer.answered_at],
                )?;
                tx.commit()?;
                Ok(n > 0)
            })
            .await?;

        if written {
            self.notifier.notify();
        }
        Ok(written)
    }

    /// Set or overwrite the rating of a question.
    pub async fn set_rating(&self, question_id: &str, rating: RatingState) -> Result<()> {
        let id = question_id.to_string();
        self.run(move |conn| {
            let n = conn.execute(
                "UPDATE questions SET rating_score = ?2, rating_feedback = ?3 WHERE question_id = ?1",
                params![id, rating.score, rating.feedback],
            )?;
            if n == 0 {
                return Err(BankError::NotFound(id));
            }
            Ok(())
        })
        .await?;

        self.notifier.notify();
        Ok(())
    }

    /// Drop the answer state of every question in `topic`. Ratings are kept.
    pub async fn clear_answers(&self, topic: &str) -> Result<usize> {
        let topic_owned = topic.to_string();
        let cleared = self
            .run(move |conn| {
                Ok(conn.execute(
                    "UPDATE questions SET user_answer = NULL, is_correct = NULL, answered_at = NULL
                     WHERE topic = ?1",
                    params![topic_owned],
                )?)
            })
            .await?;

        info!("reset {} answer(s) in topic '{}'", cleared, topic);
        self.notifier.notify();
        Ok(cleared)
    }

    // ==================== Reads ====================

    pub async fn get(&self, question_id: &str) -> Result<Option<QuestionRecord>> {
        let id = question_id.to_string();
        self.run(move |conn| {
            let sql = format!("{} WHERE question_id = ?1", SELECT_COLUMNS);
            Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
        })
        .await
    }

    /// Questions of one topic, oldest first (ties in insertion order).
    pub async fn get_by_topic(&self, topic: &str) -> Result<Vec<QuestionRecord>> {
        let topic_owned = topic.to_string();
        let records = self
            .run(move |conn| {
                let sql = format!(
                    "{} WHERE topic = ?1 ORDER BY created_at ASC, seq ASC",
                    SELECT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![topic_owned], row_to_record)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;

        debug!("get_by_topic '{}' -> {} record(s)", topic, records.len());
        Ok(records)
    }

    /// Every stored question, in no particular order.
    pub async fn get_all(&self) -> Result<Vec<QuestionRecord>> {
        self.run(|conn| {
            let mut stmt = conn.prepare(SELECT_COLUMNS)?;
            let rows = stmt.query_map([], row_to_record)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        self.run(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }
}

fn ensure_exists(conn: &Connection, question_id: &str) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT seq FROM questions WHERE question_id = ?1",
            params![question_id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(BankError::NotFound(question_id.to_string())),
    }
}

fn upsert_row(conn: &Connection, record: &QuestionRecord) -> Result<()> {
    let options = record
        .options
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let citations = serde_json::to_string(&record.citations)?;
    let metadata = serde_json::to_string(&record.metadata)?;
    let answer = record.answer_state.as_ref();
    let rating = record.rating_state.as_ref();

    conn.execute(
        "INSERT INTO questions (question_id, topic, created_at, kind, stem, options, answer,
             explanation, citations, metadata, user_answer, is_correct, answered_at,
             rating_score, rating_feedback)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(question_id) DO UPDATE SET
             kind = excluded.kind,
             stem = excluded.stem,
             options = excluded.options,
             answer = excluded.answer,
             explanation = excluded.explanation,
             citations = excluded.citations,
             metadata = excluded.metadata,
             user_answer = CASE WHEN excluded.kind IS NOT questions.kind
                 OR excluded.answer IS NOT questions.answer THEN NULL ELSE questions.user_answer END,
             is_correct = CASE WHEN excluded.kind IS NOT questions.kind
                 OR excluded.answer IS NOT questions.answer THEN NULL ELSE questions.is_correct END,
             answered_at = CASE WHEN excluded.kind IS NOT questions.kind
                 OR excluded.answer IS NOT questions.answer THEN NULL ELSE questions.answered_at END",
        params![
            record.question_id,
            record.topic,
            record.created_at,
            record.kind.as_str(),
            record.stem,
            options,
            record.answer,
            record.explanation,
            citations,
            metadata,
            answer.map(|a| a.user_answer.as_str()),
            answer.map(|a| a.is_correct),
            answer.map(|a| a.answered_at.as_str()),
            rating.map(|r| r.score.clamp(1, 10)),
            rating.and_then(|r| r.feedback.as_deref()),
        ],
    )?;
    Ok(())
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<QuestionRecord> {
    let kind_raw: String = row.get(3)?;
    let kind = QuestionKind::parse(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown question kind '{}'", kind_raw).into(),
        )
    })?;

    let options = match row.get::<_, Option<String>>(5)? {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    let user_answer: Option<String> = row.get(10)?;
    let is_correct: Option<bool> = row.get(11)?;
    let answered_at: Option<String> = row.get(12)?;
    let answer_state = match (user_answer, is_correct, answered_at) {
        (Some(user_answer), Some(is_correct), Some(answered_at)) => Some(AnswerState {
            user_answer,
            is_correct,
            answered_at,
        }),
        _ => None,
    };

    let rating_state = match row.get::<_, Option<u8>>(13)? {
        Some(score) => Some(RatingState {
            score,
            feedback: row.get(14)?,
        }),
        None => None,
    };

    Ok(QuestionRecord {
        question_id: row.get(0)?,
        topic: row.get(1)?,
        created_at: row.get(2)?,
        kind,
        stem: row.get(4)?,
        options,
        answer: row.get(6)?,
        explanation: row.get(7)?,
        citations: json_column(row, 8)?,
        metadata: json_column(row, 9)?,
        answer_state,
        rating_state,
    })
}
