//! Strategy registry and dispatch.
//!
//! The orchestrator owns an explicit registry of per-collection store
//! handles and keyword indexes (no module-level state) and dispatches a
//! query to one or more named strategies **sequentially**, in the order
//! given. Each strategy's failure is caught and reported for that
//! strategy only; one failing strategy never aborts its siblings.
//!
//! Semantic and hybrid dispatch call [`Orchestrator::ensure_indexed`]
//! first, an explicit idempotent build step. Two concurrent queries
//! against the same un-indexed collection may both trigger index work;
//! that is safe (ingestion is idempotent per document via content-hash
//! dedup) but not cheap, as there is no single-flight guard.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{Result, RetrievalError};
use crate::fulltext::InvertedIndex;
use crate::fusion::{self, FusionCandidate};
use crate::keyword::KeywordIndex;
use crate::linematch::{self, MatchOptions};
use crate::models::{SearchEnvelope, StrategyHit, StrategyOutcome};
use crate::sources;
use crate::store::CollectionStore;

/// Every registered strategy, in `search_all` execution order.
pub const STRATEGY_NAMES: [&str; 5] = ["lines", "fulltext", "keyword", "semantic", "hybrid"];

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub collection: String,
    pub top_k: usize,
    pub case_sensitive: bool,
    pub whole_words: bool,
    pub keyword_weight: f64,
    pub semantic_weight: f64,
}

impl SearchOptions {
    pub fn from_config(config: &Config, collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            top_k: config.retrieval.top_k,
            case_sensitive: false,
            whole_words: false,
            keyword_weight: config.retrieval.keyword_weight,
            semantic_weight: config.retrieval.semantic_weight,
        }
    }

    fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.case_sensitive,
            whole_words: self.whole_words,
        }
    }
}

/// Per-strategy outcomes and timings for one query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub outcomes: BTreeMap<String, StrategyOutcome>,
    pub timing_ms: BTreeMap<String, u64>,
}

pub struct Orchestrator {
    config: Config,
    embedder: Arc<dyn Embedder>,
    stores: Mutex<HashMap<String, Arc<CollectionStore>>>,
    keyword_indexes: Mutex<HashMap<String, Arc<KeywordIndex>>>,
}

impl Orchestrator {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            embedder,
            stores: Mutex::new(HashMap::new()),
            keyword_indexes: Mutex::new(HashMap::new()),
        }
    }

    /// Run the named strategies sequentially and collect an outcome and
    /// a wall-clock timing per strategy.
    pub async fn search(
        &self,
        query: &str,
        strategies: &[String],
        options: &SearchOptions,
    ) -> SearchReport {
        let mut outcomes = BTreeMap::new();
        let mut timing_ms = BTreeMap::new();

        for name in strategies {
            let started = Instant::now();
            let outcome = match self.run_strategy(name, query, options).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(strategy = %name, error = %e, "strategy failed");
                    StrategyOutcome::failed(e.to_string())
                }
            };
            timing_ms.insert(name.clone(), started.elapsed().as_millis() as u64);
            outcomes.insert(name.clone(), outcome);
        }

        SearchReport {
            outcomes,
            timing_ms,
        }
    }

    /// Run one strategy and wrap its outcome in the uniform envelope.
    /// Failures fold into the envelope's message; the shape is the same
    /// regardless of which strategy ran.
    pub async fn search_one(
        &self,
        query: &str,
        strategy: &str,
        options: &SearchOptions,
    ) -> SearchEnvelope {
        let outcome = match self.run_strategy(strategy, query, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(strategy, error = %e, "strategy failed");
                StrategyOutcome::failed(e.to_string())
            }
        };
        SearchEnvelope {
            method: strategy.to_string(),
            total: outcome.total,
            results: outcome.results,
            message: outcome.message.or(outcome.error),
        }
    }

    /// Run every registered strategy.
    pub async fn search_all(&self, query: &str, options: &SearchOptions) -> SearchReport {
        let all: Vec<String> = STRATEGY_NAMES.iter().map(|s| s.to_string()).collect();
        self.search(query, &all, options).await
    }

    async fn run_strategy(
        &self,
        name: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<StrategyOutcome> {
        match name {
            "lines" => self.search_lines(query, options).await,
            "fulltext" => self.search_fulltext(query, options).await,
            "keyword" => self.search_keyword(query, options).await,
            "semantic" => self.search_semantic(query, options).await,
            "hybrid" => self.search_hybrid(query, options).await,
            other => Ok(StrategyOutcome::failed(format!(
                "unknown strategy: {}",
                other
            ))),
        }
    }

    /// Make sure every source file of the collection is ingested.
    /// Returns true when the index was already fully built (every file
    /// reused). Idempotent; dedup makes repeat calls cheap.
    pub async fn ensure_indexed(&self, collection: &str) -> Result<bool> {
        let files = sources::read_files(&self.config, collection)?;
        let store = self.store(collection).await?;

        let mut already_built = true;
        for (name, content) in &files {
            let outcome = store
                .ingest(
                    name,
                    content,
                    self.embedder.as_ref(),
                    &self.config.chunking,
                    self.config.embedding.doc_prefix_chars,
                )
                .await?;
            if !outcome.reused {
                already_built = false;
            }
        }

        tracing::debug!(collection, already_built, "ensure_indexed");
        Ok(already_built)
    }

    /// Store handle registry, one per collection, opened on demand.
    async fn store(&self, collection: &str) -> Result<Arc<CollectionStore>> {
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(collection) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(CollectionStore::open(&self.config.storage.root, collection).await?);
        stores.insert(collection.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Keyword indexes are built once per process per collection and
    /// cached, unlike the per-call full-text index.
    async fn keyword_index(&self, collection: &str) -> Result<Arc<KeywordIndex>> {
        let mut indexes = self.keyword_indexes.lock().await;
        if let Some(index) = indexes.get(collection) {
            return Ok(Arc::clone(index));
        }
        let files = sources::read_files(&self.config, collection)?;
        let index = Arc::new(KeywordIndex::build(files));
        indexes.insert(collection.to_string(), Arc::clone(&index));
        Ok(index)
    }

    fn not_found_outcome(collection: &str) -> StrategyOutcome {
        StrategyOutcome::empty_with_message(format!(
            "collection '{}' not found; nothing to search",
            collection
        ))
    }

    // ============ lines ============

    async fn search_lines(&self, query: &str, options: &SearchOptions) -> Result<StrategyOutcome> {
        let files = match sources::read_files(&self.config, &options.collection) {
            Ok(files) => files,
            Err(RetrievalError::CollectionNotFound(_)) => {
                return Ok(Self::not_found_outcome(&options.collection))
            }
            Err(e) => return Err(e),
        };

        let match_options = options.match_options();
        let mut hits: Vec<StrategyHit> = Vec::new();

        for (name, content) in &files {
            let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
            for m in linematch::search_lines(query, &lines, &match_options) {
                hits.push(StrategyHit::Lexical {
                    file: name.clone(),
                    line_number: m.line_number,
                    highlighted: m.highlighted,
                    context_before: m.context_before,
                    context_after: m.context_after,
                    score: m.score,
                });
            }
        }

        hits.sort_by(|a, b| {
            let score = |h: &StrategyHit| match h {
                StrategyHit::Lexical { score, .. } => *score,
                _ => 0.0,
            };
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(options.top_k);

        Ok(self.finish(hits, options, "no lines matched the query"))
    }

    // ============ fulltext ============

    async fn search_fulltext(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<StrategyOutcome> {
        let files = match sources::read_files(&self.config, &options.collection) {
            Ok(files) => files,
            Err(RetrievalError::CollectionNotFound(_)) => {
                return Ok(Self::not_found_outcome(&options.collection))
            }
            Err(e) => return Err(e),
        };

        // Rebuilt from scratch on every call, by contract.
        let index = InvertedIndex::build(files);
        let hits: Vec<StrategyHit> = index
            .search(query, options.top_k)
            .into_iter()
            .map(|h| StrategyHit::Keyword {
                filename: h.filename,
                excerpt: h.excerpt,
                score: h.score,
            })
            .collect();

        Ok(self.finish(hits, options, "no documents matched the query"))
    }

    // ============ keyword ============

    async fn search_keyword(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<StrategyOutcome> {
        let index = match self.keyword_index(&options.collection).await {
            Ok(index) => index,
            Err(RetrievalError::CollectionNotFound(_)) => {
                return Ok(Self::not_found_outcome(&options.collection))
            }
            Err(e) => return Err(e),
        };

        let hits: Vec<StrategyHit> = index
            .query(query, options.top_k)
            .into_iter()
            .map(|h| StrategyHit::Keyword {
                filename: h.filename,
                excerpt: h.excerpt,
                score: h.score,
            })
            .collect();

        Ok(self.finish(hits, options, "no documents matched the query"))
    }

    // ============ semantic ============

    async fn search_semantic(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<StrategyOutcome> {
        match self.ensure_indexed(&options.collection).await {
            Ok(_) => {}
            Err(RetrievalError::CollectionNotFound(_)) => {
                return Ok(Self::not_found_outcome(&options.collection))
            }
            Err(e) => return Err(e),
        }

        let store = self.store(&options.collection).await?;
        let query_vec = self.embedder.embed(query).await?;
        let scored = store.find_similar(&query_vec, options.top_k).await?;

        let hits: Vec<StrategyHit> = scored
            .into_iter()
            .map(|c| StrategyHit::Semantic {
                chunk_id: c.chunk_id,
                filename: c.filename,
                content: c.content,
                similarity: c.similarity,
            })
            .collect();

        Ok(self.finish(hits, options, "collection has no indexed chunks"))
    }

    // ============ hybrid ============

    async fn search_hybrid(&self, query: &str, options: &SearchOptions) -> Result<StrategyOutcome> {
        match self.ensure_indexed(&options.collection).await {
            Ok(_) => {}
            Err(RetrievalError::CollectionNotFound(_)) => {
                return Ok(Self::not_found_outcome(&options.collection))
            }
            Err(e) => return Err(e),
        }

        let keyword_index = self.keyword_index(&options.collection).await?;
        let keyword_candidates: Vec<FusionCandidate> = keyword_index
            .query(query, options.top_k)
            .into_iter()
            .map(|h| FusionCandidate {
                id: h.filename.clone(),
                title: h.filename,
                excerpt: h.excerpt,
                score: h.score,
            })
            .collect();

        let store = self.store(&options.collection).await?;
        let query_vec = self.embedder.embed(query).await?;
        let scored = store.find_similar(&query_vec, options.top_k).await?;

        // Aggregate chunk hits to document level, keeping each file's
        // best chunk as its exemplar.
        let mut best_per_file: BTreeMap<String, FusionCandidate> = BTreeMap::new();
        for chunk in scored {
            let entry = best_per_file
                .entry(chunk.filename.clone())
                .or_insert_with(|| FusionCandidate {
                    id: chunk.filename.clone(),
                    title: chunk.filename.clone(),
                    excerpt: chunk.content.clone(),
                    score: chunk.similarity,
                });
            if chunk.similarity > entry.score {
                entry.score = chunk.similarity;
                entry.excerpt = chunk.content.clone();
            }
        }
        let semantic_candidates: Vec<FusionCandidate> = best_per_file.into_values().collect();

        let mut fused = fusion::fuse(
            &keyword_candidates,
            &semantic_candidates,
            options.keyword_weight,
            options.semantic_weight,
        );
        fused.truncate(options.top_k);

        let hits: Vec<StrategyHit> = fused
            .into_iter()
            .map(|f| StrategyHit::Hybrid {
                filename: f.id,
                excerpt: f.excerpt,
                score: f.score,
                keyword_component: f.keyword_component,
                semantic_component: f.semantic_component,
            })
            .collect();

        Ok(self.finish(hits, options, "no documents matched the query"))
    }

    fn finish(
        &self,
        hits: Vec<StrategyHit>,
        options: &SearchOptions,
        empty_message: &str,
    ) -> StrategyOutcome {
        if hits.is_empty() {
            return StrategyOutcome::empty_with_message(empty_message);
        }
        let results = hits
            .into_iter()
            .map(|h| h.into_result(&options.collection))
            .collect();
        StrategyOutcome::from_results(results)
    }
}
