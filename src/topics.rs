//! Topic listing for the browsing panel

use log::debug;
use std::collections::HashMap;

use crate::db::QuestionStore;
use crate::error::Result;
use crate::models::{QuestionRecord, TopicSummary};

/// Group records by topic, most recently active topic first.
///
/// Ties on the latest timestamp are ordered by topic name.
pub fn summarize_records(records: &[QuestionRecord]) -> Vec<TopicSummary> {
    let mut by_topic: HashMap<&str, TopicSummary> = HashMap::new();

    for record in records {
        by_topic
            .entry(record.topic.as_str())
            .and_modify(|s| {
                s.count += 1;
                if record.created_at > s.last_timestamp {
                    s.last_timestamp = record.created_at.clone();
                }
            })
            .or_insert_with(|| TopicSummary {
                topic: record.topic.clone(),
                count: 1,
                last_timestamp: record.created_at.clone(),
            });
    }

    let mut summaries: Vec<TopicSummary> = by_topic.into_values().collect();
    summaries.sort_by(|a, b| {
        b.last_timestamp
            .cmp(&a.last_timestamp)
            .then_with(|| a.topic.cmp(&b.topic))
    });
    summaries
}

#[derive(Clone)]
pub struct TopicAggregator {
    store: QuestionStore,
}

impl TopicAggregator {
    pub fn new(store: QuestionStore) -> Self {
        Self { store }
    }

    /// Fresh summary of every topic; nothing is cached between calls.
    pub async fn summarize(&self) -> Result<Vec<TopicSummary>> {
        let records = self.store.get_all().await?;
        let summaries = summarize_records(&records);
        debug!(
            "summarized {} record(s) into {} topic(s)",
            records.len(),
            summaries.len()
        );
        Ok(summaries)
    }
}
