//! # Quarry
//!
//! A local-first, multi-strategy passage retrieval engine for document
//! collections.
//!
//! Quarry retrieves relevant passages from named collections of text files
//! using several heterogeneous strategies — boolean line matching,
//! inverted-index full-text, TF-IDF keyword scoring, embedding-based
//! semantic similarity, and a weighted fusion of keyword and semantic
//! signals — and returns a uniform ranked result envelope regardless of
//! the strategy chosen.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Sources   │──▶│   Pipeline   │──▶│   SQLite    │
//! │ dir/colln  │   │ Chunk+Embed  │   │  per colln  │
//! └────────────┘   └──────────────┘   └──────┬──────┘
//!                                            │
//!        lines / fulltext / keyword ─────────┤
//!                 semantic / hybrid ─────────┘
//!                         │
//!                 ┌───────▼────────┐
//!                 │  Orchestrator  │──▶ {results, method, total}
//!                 └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! quarry index notes                       # chunk + embed a collection
//! quarry search "deployment" -c notes --strategy hybrid
//! quarry search "a AND b OR c" -c notes --strategy lines
//! quarry stats notes
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the result envelope |
//! | [`chunker`] | Paragraph-aligned text chunking |
//! | [`embedding`] | Embedding backend abstraction |
//! | [`similarity`] | Cosine similarity and top-K selection |
//! | [`store`] | Per-collection persistent store with dedup |
//! | [`sources`] | Collection source directory listing |
//! | [`linematch`] | Boolean/substring line matcher |
//! | [`keyword`] | TF-IDF keyword index |
//! | [`fulltext`] | Per-query inverted-index full-text search |
//! | [`fusion`] | Keyword/semantic score fusion |
//! | [`orchestrator`] | Strategy registry and dispatch |

pub mod chunker;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod fulltext;
pub mod fusion;
pub mod keyword;
pub mod linematch;
pub mod models;
pub mod orchestrator;
pub mod similarity;
pub mod sources;
pub mod store;

pub use error::RetrievalError;
