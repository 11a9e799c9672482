//! Question answering flow tests.
//!
//! Exercise builder, executor and presenter together against the mock
//! warehouse.

use cortex_lens::present::{present, render_presentation, Presentation, NO_ANSWER_MESSAGE};
use cortex_lens::rag::{AskSession, QueryBuilder, SearchRequest, SubmissionState};
use cortex_lens::warehouse::{FailingWarehouse, MockWarehouse};

fn builder() -> QueryBuilder {
    QueryBuilder::new("CALL_RECORDINGS_SEARCH").unwrap()
}

fn answers(presentation: &Presentation) -> Vec<(String, String)> {
    match presentation {
        Presentation::Answers { answers } => answers
            .iter()
            .map(|a| (a.answer.clone(), a.confidence_label()))
            .collect(),
        other => panic!("expected answers, got {other:?}"),
    }
}

#[tokio::test]
async fn test_search_payload_is_fixed_for_any_question() {
    let warehouse = MockWarehouse::new();
    let session = AskSession::new(&warehouse, builder());

    for text in ["What is the claim status?", "'; DROP TABLE calls; --", "ü?"] {
        session.submit(text).await.unwrap().unwrap();
    }

    let executed = warehouse.executed();
    assert_eq!(executed.len(), 3);
    for statement in &executed {
        let payload = statement.bindings[0].as_text().unwrap();
        let request: SearchRequest = serde_json::from_str(payload).unwrap();
        assert_eq!(request.limit, 2);
        assert_eq!(request.columns, vec!["CHUNK", "RELATIVE_PATH"]);
        assert!(!statement.sql.contains("DROP TABLE"));
    }
}

#[tokio::test]
async fn test_answers_are_in_non_increasing_confidence() {
    let warehouse = MockWarehouse::new()
        .with_chunk("calls/1.txt", "first")
        .with_chunk("calls/2.txt", "second")
        .with_answers("first", &[("a", 0.2), ("b", 0.75)])
        .with_answers("second", &[("c", 0.5), ("d", 0.9)]);
    let session = AskSession::new(&warehouse, builder());

    let submission = session.submit("question").await.unwrap().unwrap();
    let set = submission.result_set().unwrap();
    let scores: Vec<f64> = set.iter().map(|a| a.confidence_score).collect();

    assert_eq!(scores, vec![0.9, 0.75, 0.5, 0.2]);
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_chunk_without_answers_contributes_nothing() {
    let warehouse = MockWarehouse::new()
        .with_chunk("calls/1.txt", "silent")
        .with_chunk("calls/2.txt", "talkative")
        .with_answers("silent", &[])
        .with_answers("talkative", &[("yes", 0.6)]);
    let session = AskSession::new(&warehouse, builder());

    let submission = session.submit("anything?").await.unwrap().unwrap();
    let set = submission.result_set().unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(set.answers()[0].source_path, "calls/2.txt");
}

#[tokio::test]
async fn test_empty_question_never_reaches_executor() {
    let warehouse = MockWarehouse::new();
    let session = AskSession::new(&warehouse, builder());

    assert!(session.submit("").await.unwrap().is_none());
    assert!(session.submit(" \t\n").await.unwrap().is_none());
    assert!(warehouse.executed().is_empty());
}

#[tokio::test]
async fn test_failing_executor_yields_failure_without_rows() {
    let warehouse = FailingWarehouse::new("Object 'CALL_RECORDINGS_SEARCH' does not exist");
    let session = AskSession::new(&warehouse, builder());

    let submission = session.submit("claim?").await.unwrap().unwrap();

    assert!(matches!(submission.state(), SubmissionState::Failed(_)));
    assert!(submission.result_set().is_none());
    let presentation = present(&submission);
    assert!(presentation.is_failure());
    assert!(render_presentation(&presentation, false).contains("does not exist"));
}

#[tokio::test]
async fn test_scores_display_with_three_decimals() {
    let warehouse = MockWarehouse::new()
        .with_chunk("calls/1.txt", "chunk")
        .with_answers("chunk", &[("x", 0.4), ("y", 0.9)]);
    let session = AskSession::new(&warehouse, builder());

    let submission = session.submit("q").await.unwrap().unwrap();

    assert_eq!(
        answers(&present(&submission)),
        vec![
            ("y".to_string(), "0.900".to_string()),
            ("x".to_string(), "0.400".to_string())
        ]
    );
}

#[tokio::test]
async fn test_duplicate_chunks_are_not_deduplicated() {
    let warehouse = MockWarehouse::new()
        .with_chunk("calls/1.txt", "same text")
        .with_chunk("calls/1.txt", "same text")
        .with_answers("same text", &[("dup", 0.8)]);
    let session = AskSession::new(&warehouse, builder());

    let submission = session.submit("q").await.unwrap().unwrap();

    assert_eq!(
        answers(&present(&submission)),
        vec![
            ("dup".to_string(), "0.800".to_string()),
            ("dup".to_string(), "0.800".to_string())
        ]
    );
}

#[tokio::test]
async fn test_no_matches_shows_notice() {
    let warehouse = MockWarehouse::new();
    let session = AskSession::new(&warehouse, builder());

    let submission = session.submit("nothing indexed").await.unwrap().unwrap();
    assert_eq!(
        render_presentation(&present(&submission), false),
        NO_ANSWER_MESSAGE
    );
}

#[tokio::test]
async fn test_retrieve_only_returns_chunks() {
    let warehouse = MockWarehouse::demo();
    let session = AskSession::new(&warehouse, builder());
    let question = cortex_lens::rag::Question::new("Is Lipitor covered?").unwrap();

    let chunks = session.retrieve(&question).await.unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].source_path, "audio/call_0001.txt");
    assert!(warehouse.executed()[0].sql.contains("AS RESULTS"));
}
