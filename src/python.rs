//! Python bindings for the desktop UI (enabled with the `python` feature)

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::runtime::Runtime;

use crate::config::BankConfig;
use crate::db::QuestionStore;
use crate::error::BankError;
use crate::grading::{grade, GradingPolicy};
use crate::models::{GenerationResponse, QuestionKind, RatingAck, TopicProgress, TopicSummary};
use crate::normalize::normalize_answer;
use crate::notify::Subscription;
use crate::progress::ProgressTracker;
use crate::topics::TopicAggregator;

fn to_py_err(err: BankError) -> PyErr {
    match err {
        BankError::NotFound(id) => PyKeyError::new_err(id),
        BankError::InvalidArgument(msg) => PyValueError::new_err(msg),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn json_err(err: serde_json::Error) -> PyErr {
    PyValueError::new_err(format!("invalid JSON: {}", err))
}

/// Blocking facade over the store, tracker and aggregator.
///
/// Records cross the boundary as JSON strings.
#[pyclass]
pub struct QuestionBank {
    runtime: Runtime,
    store: QuestionStore,
    tracker: ProgressTracker,
    aggregator: TopicAggregator,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
}

#[pymethods]
impl QuestionBank {
    #[new]
    #[pyo3(signature = (db_path=None))]
    fn new(db_path: Option<String>) -> PyResult<Self> {
        let mut config = BankConfig::from_env();
        if let Some(path) = db_path {
            config.db_path = path.into();
        }

        let runtime = Runtime::new()
            .map_err(|e| PyRuntimeError::new_err(format!("Failed to start runtime: {}", e)))?;
        let store = QuestionStore::open_with_config(&config).map_err(to_py_err)?;
        let tracker = ProgressTracker::new(store.clone(), GradingPolicy::from_config(&config));
        let aggregator = TopicAggregator::new(store.clone());

        Ok(Self {
            runtime,
            store,
            tracker,
            aggregator,
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    /// Store a generation response (single wrapper or `{"items": [...]}`).
    fn ingest_json(&self, py: Python<'_>, payload: &str) -> PyResult<Vec<String>> {
        let response: GenerationResponse = serde_json::from_str(payload).map_err(json_err)?;
        self.block_on(py, self.store.ingest(response))
    }

    fn get_question(&self, py: Python<'_>, question_id: &str) -> PyResult<Option<String>> {
        let record = self.block_on(py, self.store.get(question_id))?;
        record
            .map(|r| serde_json::to_string(&r).map_err(json_err))
            .transpose()
    }

    fn questions_by_topic(&self, py: Python<'_>, topic: &str) -> PyResult<String> {
        let records = self.block_on(py, self.store.get_by_topic(topic))?;
        serde_json::to_string(&records).map_err(json_err)
    }

    fn delete_question(&self, py: Python<'_>, question_id: &str) -> PyResult<bool> {
        self.block_on(py, self.store.delete_one(question_id))
    }

    fn delete_topics(&self, py: Python<'_>, topics: Vec<String>) -> PyResult<usize> {
        self.block_on(py, self.store.delete_topics(&topics[..]))
    }

    fn clear_all(&self, py: Python<'_>) -> PyResult<usize> {
        self.block_on(py, self.store.clear_all())
    }

    /// Returns whether the recorded (first) answer is correct.
    fn submit_answer(&self, py: Python<'_>, question_id: &str, answer: &str) -> PyResult<bool> {
        self.block_on(py, self.tracker.submit_answer(question_id, answer))
            .map(|state| state.is_correct)
    }

    #[pyo3(signature = (question_id, score, feedback=None))]
    fn rate(
        &self,
        py: Python<'_>,
        question_id: &str,
        score: i64,
        feedback: Option<String>,
    ) -> PyResult<u8> {
        self.block_on(py, self.tracker.rate(question_id, score, feedback.as_deref()))
            .map(|rating| rating.score)
    }

    #[pyo3(signature = (question_id, score, ok, feedback=None))]
    fn apply_rating_ack(
        &self,
        py: Python<'_>,
        question_id: &str,
        score: i64,
        ok: bool,
        feedback: Option<String>,
    ) -> PyResult<bool> {
        self.block_on(
            py,
            self.tracker.apply_rating_ack(
                question_id,
                score,
                feedback.as_deref(),
                RatingAck { ok },
            ),
        )
    }

    fn reset_topic(&self, py: Python<'_>, topic: &str) -> PyResult<usize> {
        self.block_on(py, self.tracker.reset_topic(topic))
    }

    fn topics(&self, py: Python<'_>) -> PyResult<Vec<TopicSummary>> {
        self.block_on(py, self.aggregator.summarize())
    }

    fn progress(&self, py: Python<'_>, topic: &str) -> PyResult<TopicProgress> {
        self.block_on(py, self.tracker.topic_progress(topic))
    }

    fn choices(&self, py: Python<'_>, question_id: &str) -> PyResult<Vec<String>> {
        let record = self
            .block_on(py, self.store.get(question_id))?
            .ok_or_else(|| PyKeyError::new_err(question_id.to_string()))?;
        Ok(self.tracker.policy().choices_for(&record))
    }

    /// Call `callback()` after every change. Returns a key for `unsubscribe`.
    fn subscribe(&self, callback: PyObject) -> PyResult<u64> {
        let subscription = self.store.notifier().subscribe(move || {
            Python::with_gil(|py| {
                if let Err(err) = callback.call0(py) {
                    err.print(py);
                }
            });
        });
        let key = subscription.key();
        self.subscriptions
            .lock()
            .map_err(|_| PyRuntimeError::new_err("subscription registry poisoned"))?
            .insert(key, subscription);
        Ok(key)
    }

    fn unsubscribe(&self, key: u64) -> PyResult<bool> {
        let removed = self
            .subscriptions
            .lock()
            .map_err(|_| PyRuntimeError::new_err("subscription registry poisoned"))?
            .remove(&key);
        Ok(removed.is_some())
    }
}

impl QuestionBank {
    /// Drive a store call to completion with the GIL released.
    fn block_on<T, F>(&self, py: Python<'_>, task: F) -> PyResult<T>
    where
        F: Future<Output = crate::error::Result<T>> + Send,
        T: Send,
    {
        py.allow_threads(|| self.runtime.block_on(task))
            .map_err(to_py_err)
    }
}

#[pymethods]
impl TopicProgress {
    #[getter]
    fn complete(&self) -> bool {
        self.is_complete()
    }

    #[getter]
    fn percent(&self) -> u32 {
        self.percent_correct()
    }

    fn __repr__(&self) -> String {
        format!(
            "TopicProgress(topic='{}', answered={}, total={}, correct={})",
            self.topic, self.answered, self.total, self.correct
        )
    }
}

#[pymethods]
impl TopicSummary {
    fn __repr__(&self) -> String {
        format!(
            "TopicSummary(topic='{}', count={}, last='{}')",
            self.topic, self.count, self.last_timestamp
        )
    }
}

#[pyfunction]
#[pyo3(name = "grade")]
pub fn py_grade(kind: &str, canonical: &str, answer: &str) -> PyResult<bool> {
    let kind = QuestionKind::parse(kind)
        .ok_or_else(|| PyValueError::new_err(format!("Unknown question kind: {}", kind)))?;
    Ok(grade(kind, canonical, answer))
}

#[pyfunction]
#[pyo3(name = "normalize_answer")]
pub fn py_normalize_answer(raw: &str) -> String {
    normalize_answer(raw)
}
