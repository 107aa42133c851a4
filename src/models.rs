//! Core data types used throughout Quarry.
//!
//! These types represent the documents, chunks, and results that flow
//! through the ingestion and retrieval pipeline. Raw strategy output is a
//! tagged union ([`StrategyHit`]) with a single conversion point into the
//! common [`RetrievalResult`] shape.

use serde::Serialize;

/// A deduplicated piece of source content in a collection store.
///
/// `id` is the hex SHA-256 of `full_content`, so byte-identical content
/// never creates two rows. Documents are immutable once created.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub full_content: String,
    /// Embedding over the truncated document prefix. Approximate only;
    /// never used for ranking.
    pub doc_embedding: Option<Vec<f32>>,
    pub processed_at: i64,
}

/// A contiguous passage of a document, the unit of semantic retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub start_char: i64,
    pub end_char: i64,
    pub chunk_type: ChunkType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Paragraph-aligned chunk from the default policy.
    Paragraph,
    /// Fixed-size window from the legacy overlapping policy.
    Window,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Paragraph => "paragraph",
            ChunkType::Window => "window",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "window" => ChunkType::Window,
            _ => ChunkType::Paragraph,
        }
    }
}

/// The common output record every strategy converts into.
///
/// `score` is on the strategy's own scale: [0,1] for line matching and
/// hybrid fusion, cosine similarity for semantic, raw TF-IDF magnitude
/// for keyword, term coverage for full-text.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// Raw per-strategy hit before normalization into [`RetrievalResult`].
#[derive(Debug, Clone)]
pub enum StrategyHit {
    Lexical {
        file: String,
        /// 1-based line number of the matching line.
        line_number: usize,
        highlighted: String,
        context_before: Vec<String>,
        context_after: Vec<String>,
        score: f64,
    },
    Keyword {
        filename: String,
        excerpt: String,
        score: f64,
    },
    Semantic {
        chunk_id: String,
        filename: String,
        content: String,
        similarity: f64,
    },
    Hybrid {
        filename: String,
        excerpt: String,
        score: f64,
        keyword_component: f64,
        semantic_component: f64,
    },
}

impl StrategyHit {
    /// Flatten a tagged hit into the uniform result record.
    pub fn into_result(self, collection: &str) -> RetrievalResult {
        match self {
            StrategyHit::Lexical {
                file,
                line_number,
                highlighted,
                context_before,
                context_after,
                score,
            } => {
                let mut excerpt = String::new();
                for line in &context_before {
                    excerpt.push_str(line);
                    excerpt.push('\n');
                }
                excerpt.push_str(&highlighted);
                for line in &context_after {
                    excerpt.push('\n');
                    excerpt.push_str(line);
                }
                RetrievalResult {
                    id: format!("{}:{}", file, line_number),
                    title: format!("{} (line {})", file, line_number),
                    excerpt,
                    score,
                    source: file,
                    collection: Some(collection.to_string()),
                }
            }
            StrategyHit::Keyword {
                filename,
                excerpt,
                score,
            } => RetrievalResult {
                id: filename.clone(),
                title: filename.clone(),
                excerpt,
                score,
                source: filename,
                collection: Some(collection.to_string()),
            },
            StrategyHit::Semantic {
                chunk_id,
                filename,
                content,
                similarity,
            } => RetrievalResult {
                id: chunk_id,
                title: filename.clone(),
                excerpt: content,
                score: similarity,
                source: filename,
                collection: Some(collection.to_string()),
            },
            StrategyHit::Hybrid {
                filename,
                excerpt,
                score,
                ..
            } => RetrievalResult {
                id: filename.clone(),
                title: filename.clone(),
                excerpt,
                score,
                source: filename,
                collection: Some(collection.to_string()),
            },
        }
    }
}

/// Uniform envelope returned to callers for a single strategy.
#[derive(Debug, Clone, Serialize)]
pub struct SearchEnvelope {
    pub results: Vec<RetrievalResult>,
    pub method: String,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of one strategy inside a multi-strategy report. A strategy
/// that failed carries `error` and an empty result list; one that ran but
/// found nothing may carry a descriptive `message`.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutcome {
    pub results: Vec<RetrievalResult>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StrategyOutcome {
    pub fn from_results(results: Vec<RetrievalResult>) -> Self {
        let total = results.len();
        Self {
            results,
            total,
            message: None,
            error: None,
        }
    }

    pub fn empty_with_message(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            message: None,
            error: Some(error.into()),
        }
    }
}
