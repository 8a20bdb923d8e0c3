use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use testownik_core::{
    BankError, ChangeNotifier, GenerationResponse, GradingPolicy, ProgressTracker, QuestionStore,
    TopicAggregator,
};

fn mcq_json(id: &str, topic: &str, timestamp: &str, answer: &str) -> String {
    format!(
        r#"{{
            "question_id": "{id}",
            "question": {{
                "kind": "MCQ",
                "stem": "Question {id}?",
                "options": ["first", "second", "third", "fourth"],
                "answer": "{answer}",
                "explanation": "see page 2",
                "metadata": {{"topic": "{topic}", "timestamp": "{timestamp}", "difficulty": "medium"}},
                "citations": [{{"source": "notes.pdf", "page": 2, "quote": "..."}}]
            }}
        }}"#
    )
}

fn parse(json: &str) -> GenerationResponse {
    serde_json::from_str(json).unwrap()
}

fn setup() -> (QuestionStore, ProgressTracker, TopicAggregator) {
    let store = QuestionStore::open_in_memory()
        .unwrap()
        .with_notifier(ChangeNotifier::new());
    let tracker = ProgressTracker::new(store.clone(), GradingPolicy::default());
    let aggregator = TopicAggregator::new(store.clone());
    (store, tracker, aggregator)
}

#[tokio::test]
async fn test_topic_walkthrough() {
    let (store, tracker, aggregator) = setup();

    let batch = format!(
        r#"{{"items": [{}, {}, {}]}}"#,
        mcq_json("q3", "Ch2", "2024-01-03T00:00:00.000Z", "c"),
        mcq_json("q1", "Ch2", "2024-01-01T00:00:00.000Z", "a"),
        mcq_json("q2", "Ch2", "2024-01-02T00:00:00.000Z", "B) second"),
    );
    let ids = store.ingest(parse(&batch)).await.unwrap();
    assert_eq!(ids, vec!["q3", "q1", "q2"]);

    let order: Vec<String> = store
        .get_by_topic("Ch2")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.question_id)
        .collect();
    assert_eq!(order, vec!["q1", "q2", "q3"]);

    assert!(tracker.submit_answer("q1", "A").await.unwrap().is_correct);
    assert!(tracker.submit_answer("q2", "b").await.unwrap().is_correct);
    assert!(!tracker.submit_answer("q3", "D").await.unwrap().is_correct);

    let summaries = aggregator.summarize().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].topic, "Ch2");
    assert_eq!(summaries[0].count, 3);
    assert_eq!(summaries[0].last_timestamp, "2024-01-03T00:00:00.000Z");

    let progress = tracker.topic_progress("Ch2").await.unwrap();
    assert_eq!((progress.answered, progress.total), (3, 3));
    assert!(progress.is_complete());
    assert_eq!(progress.percent_correct(), 67);

    store.delete_one("q2").await.unwrap();
    let order: Vec<String> = store
        .get_by_topic("Ch2")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.question_id)
        .collect();
    assert_eq!(order, vec!["q1", "q3"]);
}

#[tokio::test]
async fn test_delete_topics_leaves_other_topics() {
    let (store, _, aggregator) = setup();
    store
        .ingest(parse(&mcq_json("a", "Keep", "2024-01-01T00:00:00.000Z", "a")))
        .await
        .unwrap();
    store
        .ingest(parse(&mcq_json("b", "Drop", "2024-01-02T00:00:00.000Z", "a")))
        .await
        .unwrap();
    store
        .ingest(parse(&mcq_json("c", "Drop", "2024-01-03T00:00:00.000Z", "a")))
        .await
        .unwrap();

    assert_eq!(store.delete_topics(&["Drop"]).await.unwrap(), 2);
    assert!(store.get_by_topic("Drop").await.unwrap().is_empty());
    assert_eq!(store.get_by_topic("Keep").await.unwrap().len(), 1);

    let topics: Vec<String> = aggregator
        .summarize()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.topic)
        .collect();
    assert_eq!(topics, vec!["Keep"]);

    assert_eq!(store.delete_topics(&["Drop"]).await.unwrap(), 0);
    assert_eq!(store.clear_all().await.unwrap(), 1);
    assert!(aggregator.summarize().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reupsert_with_new_answer_key_resets_grade() {
    let (store, tracker, _) = setup();
    store
        .ingest(parse(&mcq_json("q", "First", "2024-01-01T00:00:00.000Z", "a")))
        .await
        .unwrap();
    assert!(tracker.submit_answer("q", "A").await.unwrap().is_correct);
    tracker.rate("q", 9, None).await.unwrap();

    store
        .ingest(parse(&mcq_json("q", "Second", "2025-01-01T00:00:00.000Z", "b")))
        .await
        .unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
    let stored = store.get("q").await.unwrap().unwrap();
    assert_eq!(stored.topic, "First");
    assert_eq!(stored.created_at, "2024-01-01T00:00:00.000Z");
    assert_eq!(stored.answer, "b");
    assert!(stored.answer_state.is_none());
    assert_eq!(stored.rating_state.unwrap().score, 9);

    let progress = tracker.topic_progress("First").await.unwrap();
    assert_eq!((progress.answered, progress.correct, progress.total), (0, 0, 1));

    assert!(!tracker.submit_answer("q", "A").await.unwrap().is_correct);
}

#[tokio::test]
async fn test_reset_keeps_summary_and_ratings() {
    let (store, tracker, aggregator) = setup();
    let yn = r#"{"items": [
        {"question_id": "y1", "question": {"kind": "YN", "stem": "Is it?", "answer": "TAK", "explanation": "", "metadata": {"topic": "YN", "timestamp": "2024-02-01T00:00:00.000Z"}, "citations": []}},
        {"question_id": "y2", "question": {"kind": "YN", "stem": "Is it not?", "answer": "NIE", "explanation": "", "metadata": {"topic": "YN", "timestamp": "2024-02-02T00:00:00.000Z"}, "citations": []}}
    ]}"#;
    store.ingest(parse(yn)).await.unwrap();

    assert!(tracker.submit_answer("y1", "tak").await.unwrap().is_correct);
    assert!(!tracker.submit_answer("y2", "TAK").await.unwrap().is_correct);
    tracker.rate("y2", 15, Some("ok")).await.unwrap();

    let before = aggregator.summarize().await.unwrap();
    tracker.reset_topic("YN").await.unwrap();
    let after = aggregator.summarize().await.unwrap();
    assert_eq!(before, after);

    let records = store.get_by_topic("YN").await.unwrap();
    assert!(records.iter().all(|r| r.answer_state.is_none()));
    assert_eq!(records[1].rating_state.as_ref().unwrap().score, 10);
    assert_eq!(records[1].stem, "Is it not?");
}

#[tokio::test]
async fn test_untitled_topic_fallback() {
    let (store, _, _) = setup();
    let json = r#"{"question_id": "u", "question": {"kind": "YN", "stem": "s", "answer": "NIE", "explanation": "", "metadata": {}, "citations": []}}"#;
    store.ingest(parse(json)).await.unwrap();
    let record = store.get("u").await.unwrap().unwrap();
    assert_eq!(record.topic, "Bez tematu");
    assert!(record.created_at.ends_with('Z'));
}

#[tokio::test]
async fn test_submit_answer_unknown_id() {
    let (_, tracker, _) = setup();
    let err = tracker.submit_answer("ghost", "A").await.unwrap_err();
    assert!(matches!(err, BankError::NotFound(_)));
}

#[tokio::test]
async fn test_listeners_refresh_after_mutations() {
    let notifier = ChangeNotifier::new();
    let store = QuestionStore::open_in_memory()
        .unwrap()
        .with_notifier(notifier.clone());
    let tracker = ProgressTracker::new(store.clone(), GradingPolicy::default());

    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let subscription = notifier.subscribe(move || {
        h.fetch_add(1, Ordering::SeqCst);
    });

    store
        .ingest(parse(&mcq_json("a", "T", "2024-01-01T00:00:00.000Z", "a")))
        .await
        .unwrap();
    tracker.submit_answer("a", "A").await.unwrap();
    tracker.submit_answer("a", "B").await.unwrap();
    tracker.rate("a", 5, None).await.unwrap();
    tracker.reset_topic("T").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 4);

    drop(subscription);
    store.clear_all().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bank.db");

    {
        let store = QuestionStore::open(&path)
            .unwrap()
            .with_notifier(ChangeNotifier::new());
        store
            .ingest(parse(&mcq_json("p1", "Disk", "2024-01-01T00:00:00.000Z", "a")))
            .await
            .unwrap();
        store
            .ingest(parse(&mcq_json("p2", "Disk", "2024-01-02T00:00:00.000Z", "b")))
            .await
            .unwrap();
    }

    let store = QuestionStore::open(&path)
        .unwrap()
        .with_notifier(ChangeNotifier::new());
    let ids: Vec<String> = store
        .get_by_topic("Disk")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.question_id)
        .collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}
