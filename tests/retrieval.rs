//! In-process retrieval tests for the orchestrator, using a deterministic
//! embedder so the semantic and hybrid paths run without a backend.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use quarry::config::Config;
use quarry::embedding::Embedder;
use quarry::error::RetrievalError;
use quarry::orchestrator::{Orchestrator, SearchOptions, STRATEGY_NAMES};

const TEST_DIMS: usize = 8;

/// Bag-of-tokens embedder: each lowercase token adds 1 to a hash bucket,
/// so texts sharing words land near each other in cosine space.
struct TestEmbedder;

#[async_trait]
impl Embedder for TestEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut v = vec![0.0f32; TEST_DIMS];
        for token in text.to_lowercase().split_whitespace() {
            let bucket = token
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % TEST_DIMS;
            v[bucket] += 1.0;
        }
        Ok(v)
    }

    fn model_name(&self) -> &str {
        "test-bag-of-tokens"
    }

    fn dims(&self) -> usize {
        TEST_DIMS
    }
}

/// An embedder whose backend is always down.
struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
        Err(RetrievalError::EmbeddingBackend(
            "backend unreachable".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "always-failing"
    }

    fn dims(&self) -> usize {
        TEST_DIMS
    }
}

fn long_doc(topic: &str) -> String {
    format!(
        "This document is mostly about {topic} and related matters.\n\n\
         It keeps mentioning {topic} so every paragraph clears the minimum \
         chunk length threshold without any trouble at all."
    )
}

fn setup() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let storage = tmp.path().join("storage");
    let sources = tmp.path().join("sources");

    let notes = sources.join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(notes.join("boats.md"), long_doc("sailing")).unwrap();
    fs::write(notes.join("plants.md"), long_doc("gardening")).unwrap();

    // A collection directory with no files at all
    fs::create_dir_all(sources.join("empty")).unwrap();

    let config = Config::minimal(&storage, &sources);
    (tmp, config)
}

fn orchestrator(config: Config) -> Orchestrator {
    Orchestrator::new(config, Arc::new(TestEmbedder))
}

#[tokio::test]
async fn test_ensure_indexed_idempotent() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config);

    let first = orch.ensure_indexed("notes").await.unwrap();
    assert!(!first, "first pass should ingest new documents");

    let second = orch.ensure_indexed("notes").await.unwrap();
    assert!(second, "second pass should reuse everything");
}

#[tokio::test]
async fn test_semantic_ranks_by_topic() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "notes");

    let report = orch
        .search("sailing", &["semantic".to_string()], &options)
        .await;
    let outcome = &report.outcomes["semantic"];
    assert!(outcome.error.is_none(), "error: {:?}", outcome.error);
    assert!(outcome.total > 0);
    assert_eq!(outcome.results[0].source, "boats.md");
}

#[tokio::test]
async fn test_hybrid_scores_bounded() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "notes");

    let report = orch
        .search("sailing", &["hybrid".to_string()], &options)
        .await;
    let outcome = &report.outcomes["hybrid"];
    assert!(outcome.error.is_none(), "error: {:?}", outcome.error);
    assert!(outcome.total > 0);
    assert_eq!(outcome.results[0].source, "boats.md");
    for result in &outcome.results {
        assert!(
            (0.0..=1.0 + 1e-9).contains(&result.score),
            "hybrid score {} out of [0,1]",
            result.score
        );
    }
}

#[tokio::test]
async fn test_empty_collection_is_message_not_error() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "empty");

    let report = orch
        .search("anything", &["semantic".to_string()], &options)
        .await;
    let outcome = &report.outcomes["semantic"];
    assert!(outcome.error.is_none());
    assert_eq!(outcome.total, 0);
    assert!(outcome.message.is_some());
}

#[tokio::test]
async fn test_missing_collection_is_message_not_error() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "ghost");

    for strategy in STRATEGY_NAMES {
        let report = orch
            .search("anything", &[strategy.to_string()], &options)
            .await;
        let outcome = &report.outcomes[strategy];
        assert!(
            outcome.error.is_none(),
            "strategy {} errored: {:?}",
            strategy,
            outcome.error
        );
        assert_eq!(outcome.total, 0, "strategy {}", strategy);
        assert!(
            outcome.message.as_deref().unwrap_or("").contains("not found"),
            "strategy {} message: {:?}",
            strategy,
            outcome.message
        );
    }
}

#[tokio::test]
async fn test_strategy_failure_is_isolated() {
    let (_tmp, config) = setup();
    let orch = Orchestrator::new(config.clone(), Arc::new(FailingEmbedder));
    let options = SearchOptions::from_config(&config, "notes");

    let strategies = vec!["keyword".to_string(), "semantic".to_string()];
    let report = orch.search("sailing", &strategies, &options).await;

    let keyword = &report.outcomes["keyword"];
    assert!(keyword.error.is_none());
    assert!(keyword.total > 0, "keyword must still run");

    let semantic = &report.outcomes["semantic"];
    assert!(semantic.error.is_some(), "semantic must report its failure");
    assert_eq!(semantic.total, 0);
}

#[tokio::test]
async fn test_search_all_covers_every_strategy() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "notes");

    let report = orch.search_all("sailing", &options).await;
    for name in STRATEGY_NAMES {
        assert!(
            report.outcomes.contains_key(name),
            "missing outcome for {}",
            name
        );
        assert!(
            report.timing_ms.contains_key(name),
            "missing timing for {}",
            name
        );
    }
}

#[tokio::test]
async fn test_lines_strategy_highlights() {
    let (tmp, config) = setup();
    let notes = tmp.path().join("sources").join("notes");
    fs::write(
        notes.join("claims.txt"),
        "General notes about coverage.\nThe policy number is 12345.\ninsurance claim filed yesterday\ninsurance policy renewal due\nNothing relevant here.",
    )
    .unwrap();

    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "notes");

    let report = orch
        .search("insurance AND NOT policy", &["lines".to_string()], &options)
        .await;
    let outcome = &report.outcomes["lines"];
    assert!(outcome.error.is_none());
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.results[0].id, "claims.txt:3");
    assert!(outcome.results[0].excerpt.contains(">>>insurance<<<"));
}

#[tokio::test]
async fn test_search_one_wraps_envelope() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "notes");

    let envelope = orch.search_one("sailing", "semantic", &options).await;
    assert_eq!(envelope.method, "semantic");
    assert_eq!(envelope.total, envelope.results.len());
    assert!(envelope.total > 0);

    // A failing strategy folds its error into the message; the shape
    // stays uniform.
    let failing = Orchestrator::new(config.clone(), Arc::new(FailingEmbedder));
    let envelope = failing.search_one("sailing", "semantic", &options).await;
    assert_eq!(envelope.total, 0);
    assert!(envelope.message.is_some());
}

#[tokio::test]
async fn test_unknown_strategy_reports_error_outcome() {
    let (_tmp, config) = setup();
    let orch = orchestrator(config.clone());
    let options = SearchOptions::from_config(&config, "notes");

    let report = orch
        .search("anything", &["psychic".to_string()], &options)
        .await;
    let outcome = &report.outcomes["psychic"];
    assert!(outcome.error.as_deref().unwrap_or("").contains("unknown"));
}
