//! Per-collection persistent store.
//!
//! Each collection owns one SQLite file at a deterministic path derived
//! from its name, holding four tables: `documents`, `chunks`,
//! `collection_documents`, plus indices. Document ids are content hashes,
//! so ingesting byte-identical content twice never creates two rows;
//! the second ingest only refreshes the collection link and skips the
//! expensive chunk/embed work entirely.
//!
//! Document, chunk, and collection-link inserts share one transaction:
//! if embedding fails partway through a document, nothing is written,
//! and a document row is never visible without its link. `remove`
//! reference-counts collection links and only deletes the shared
//! document and its chunks when the last link goes.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

use crate::chunker;
use crate::config::ChunkingConfig;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob, Embedder};
use crate::error::Result;
use crate::models::{Chunk, ChunkType, Document};
use crate::similarity;

pub struct CollectionStore {
    pool: SqlitePool,
    collection: String,
}

/// Result of one `ingest` call.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub chunk_count: usize,
    /// True when the content hash matched an existing document and only
    /// the collection link was written.
    pub reused: bool,
}

/// A document as seen through its collection link.
#[derive(Debug, Clone)]
pub struct LinkedDocument {
    pub document_id: String,
    pub filename: String,
    pub added_at: i64,
    pub chunk_count: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub documents: i64,
    pub chunks: i64,
    pub content_bytes: i64,
}

/// A chunk scored against a query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub filename: String,
    pub content: String,
    pub similarity: f64,
}

/// Hex SHA-256 of raw document content; doubles as the document id.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl CollectionStore {
    /// Deterministic store file path for a collection name.
    pub fn path_for(root: &Path, collection: &str) -> PathBuf {
        root.join(format!("{}.db", collection))
    }

    /// Whether the collection has a store file at all. A missing file is
    /// "no chunks", never an error.
    pub fn exists(root: &Path, collection: &str) -> bool {
        Self::path_for(root, collection).is_file()
    }

    pub async fn open(root: &Path, collection: &str) -> Result<Self> {
        let pool = db::connect(&Self::path_for(root, collection)).await?;
        let store = Self {
            pool,
            collection: collection.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the schema on first use. Safe to call repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                full_content TEXT NOT NULL,
                doc_embedding BLOB,
                processed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                start_char INTEGER NOT NULL,
                end_char INTEGER NOT NULL,
                chunk_type TEXT NOT NULL DEFAULT 'paragraph',
                UNIQUE(document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collection_documents (
                document_id TEXT NOT NULL,
                filename TEXT NOT NULL UNIQUE,
                added_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_links_document_id ON collection_documents(document_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ingest one file's content under a collection-local filename.
    ///
    /// Content already present (by hash) is not re-chunked or re-embedded;
    /// only the collection link is inserted or refreshed. New content is
    /// chunked, each chunk embedded sequentially, then the document, its
    /// chunks, and the collection link are written in a single
    /// transaction.
    pub async fn ingest(
        &self,
        filename: &str,
        content: &str,
        embedder: &dyn Embedder,
        chunking: &ChunkingConfig,
        doc_prefix_chars: usize,
    ) -> Result<IngestOutcome> {
        let doc_id = content_hash(content);

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE id = ?")
                .bind(&doc_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            self.upsert_link(&self.pool, &doc_id, filename).await?;
            let chunk_count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
                    .bind(&doc_id)
                    .fetch_one(&self.pool)
                    .await?;
            tracing::debug!(
                collection = %self.collection,
                filename,
                "content hash matched; reusing existing document"
            );
            return Ok(IngestOutcome {
                chunk_count: chunk_count as usize,
                reused: true,
            });
        }

        let pieces = chunker::chunk_text(content, chunking.max_chunk_size);

        // Embed strictly one at a time; the backend sees at most one
        // in-flight request per ingestion.
        let mut vectors = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            vectors.push(embedder.embed(&piece.content).await?);
        }

        let prefix: String = content.chars().take(doc_prefix_chars).collect();
        let doc_embedding = embedder.embed(&prefix).await?;

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (id, filename, full_content, doc_embedding, processed_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc_id)
        .bind(filename)
        .bind(content)
        .bind(vec_to_blob(&doc_embedding))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (index, (piece, vector)) in pieces.iter().zip(vectors.iter()).enumerate() {
            let chunk_index = index as i64;
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, content, embedding, start_char, end_char, chunk_type) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format!("{}:{}", doc_id, chunk_index))
            .bind(&doc_id)
            .bind(chunk_index)
            .bind(&piece.content)
            .bind(vec_to_blob(vector))
            .bind(piece.start_char as i64)
            .bind(piece.end_char as i64)
            .bind(piece.chunk_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        self.upsert_link(&mut *tx, &doc_id, filename).await?;

        tx.commit().await?;

        tracing::debug!(
            collection = %self.collection,
            filename,
            chunks = pieces.len(),
            "ingested new document"
        );

        Ok(IngestOutcome {
            chunk_count: pieces.len(),
            reused: false,
        })
    }

    async fn upsert_link<'e, E>(&self, executor: E, document_id: &str, filename: &str) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO collection_documents (document_id, filename, added_at)
            VALUES (?, ?, ?)
            ON CONFLICT(filename) DO UPDATE SET
                document_id = excluded.document_id,
                added_at = excluded.added_at
            "#,
        )
        .bind(document_id)
        .bind(filename)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Linear scan of every chunk belonging to linked documents, ranked
    /// by cosine similarity against the query vector.
    pub async fn find_similar(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, c.content, c.embedding, d.filename
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.document_id IN (SELECT document_id FROM collection_documents)
            ORDER BY c.document_id, c.chunk_index
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<((String, String, String), Vec<f32>)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let chunk_id: String = row.get("chunk_id");
                let filename: String = row.get("filename");
                let content: String = row.get("content");
                ((chunk_id, filename, content), blob_to_vec(&blob))
            })
            .collect();

        let ranked = similarity::top_k(query, items, top_k);

        Ok(ranked
            .into_iter()
            .map(|((chunk_id, filename, content), similarity)| ScoredChunk {
                chunk_id,
                filename,
                content,
                similarity,
            })
            .collect())
    }

    /// Delete a collection link. The shared document and its chunks go
    /// only when no other link references them. Returns false when the
    /// filename was not linked.
    pub async fn remove(&self, filename: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let document_id: Option<String> =
            sqlx::query_scalar("SELECT document_id FROM collection_documents WHERE filename = ?")
                .bind(filename)
                .fetch_optional(&mut *tx)
                .await?;

        let document_id = match document_id {
            Some(id) => id,
            None => return Ok(false),
        };

        sqlx::query("DELETE FROM collection_documents WHERE filename = ?")
            .bind(filename)
            .execute(&mut *tx)
            .await?;

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM collection_documents WHERE document_id = ?")
                .bind(&document_id)
                .fetch_one(&mut *tx)
                .await?;

        if remaining == 0 {
            sqlx::query("DELETE FROM chunks WHERE document_id = ?")
                .bind(&document_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(&document_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn has_link(&self, filename: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM collection_documents WHERE filename = ?")
                .bind(filename)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn list_documents(&self) -> Result<Vec<LinkedDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT l.document_id, l.filename, l.added_at, COUNT(c.id) AS chunk_count
            FROM collection_documents l
            LEFT JOIN chunks c ON c.document_id = l.document_id
            GROUP BY l.document_id, l.filename, l.added_at
            ORDER BY l.filename
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LinkedDocument {
                document_id: row.get("document_id"),
                filename: row.get("filename"),
                added_at: row.get("added_at"),
                chunk_count: row.get("chunk_count"),
            })
            .collect())
    }

    /// Fetch a full document row by id (content hash).
    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, full_content, doc_embedding, processed_at \
             FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let blob: Option<Vec<u8>> = row.get("doc_embedding");
            Document {
                id: row.get("id"),
                filename: row.get("filename"),
                full_content: row.get("full_content"),
                doc_embedding: blob.map(|b| blob_to_vec(&b)),
                processed_at: row.get("processed_at"),
            }
        }))
    }

    /// A document's chunks in index order.
    pub async fn chunks_for(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, embedding, start_char, end_char, chunk_type \
             FROM chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let type_str: String = row.get("chunk_type");
                Chunk {
                    id: row.get("id"),
                    document_id: row.get("document_id"),
                    chunk_index: row.get("chunk_index"),
                    content: row.get("content"),
                    embedding: blob_to_vec(&blob),
                    start_char: row.get("start_char"),
                    end_char: row.get("end_char"),
                    chunk_type: ChunkType::parse(&type_str),
                }
            })
            .collect())
    }

    /// Chunk counts keyed by collection-local filename.
    pub async fn chunk_counts(&self) -> Result<Vec<(String, i64)>> {
        Ok(self
            .list_documents()
            .await?
            .into_iter()
            .map(|d| (d.filename, d.chunk_count))
            .collect())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let content_bytes: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(LENGTH(full_content)), 0) FROM documents")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            documents,
            chunks,
            content_bytes,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
