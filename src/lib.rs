//! Testownik Core - local question bank and quiz progress tracking
//!
//! Stores generated quiz questions in SQLite, grades answers, tracks per-topic progress
//! and lists topics for browsing. Every mutation fires a process-wide change signal.

mod config;
mod db;
mod error;
mod grading;
mod ingest;
mod models;
mod normalize;
mod notify;
mod progress;
mod topics;

#[cfg(feature = "python")]
mod python;

pub use config::BankConfig;
pub use db::QuestionStore;
pub use error::{BankError, Result};
pub use grading::{grade, GradingPolicy};
pub use ingest::{derive_created_at, derive_topic, now_timestamp, record_from_wrapper, DEFAULT_UNTITLED_TOPIC};
pub use models::{
    AnswerState, Citation, GenerationResponse, MetaValue, Metadata, QuestionKind, QuestionPayload,
    QuestionRecord, QuestionWrapper, RatingAck, RatingState, TopicProgress, TopicSummary,
};
pub use normalize::{index_for_letter, letter_for_index, normalize_answer};
pub use notify::{ChangeNotifier, Subscription};
pub use progress::{clamp_score, progress_of, ProgressTracker};
pub use topics::{summarize_records, TopicAggregator};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Testownik Core Python Module
#[cfg(feature = "python")]
#[pymodule]
fn testownik_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(python::py_grade, m)?)?;
    m.add_function(wrap_pyfunction!(python::py_normalize_answer, m)?)?;

    m.add_class::<python::QuestionBank>()?;
    m.add_class::<models::TopicSummary>()?;
    m.add_class::<models::TopicProgress>()?;

    Ok(())
}
