//! SQLite-backed vector index.
//!
//! Persists (embedding vector, chunk text, document metadata) triples and
//! answers nearest-neighbor queries by cosine similarity. Vectors are
//! compared in process — chunk counts for a single-user document store are
//! far below the scale where an ANN structure would pay off.
//!
//! Writes are not wrapped in a transaction across the embed/insert loop, so
//! a mid-batch failure can leave earlier chunks indexed. Single-writer,
//! single-process usage is assumed throughout.

use std::path::Path;

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::db;
use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{QaError, QaResult};
use crate::models::{Chunk, SearchHit};

pub struct VectorIndex {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
    model: String,
    dims: usize,
}

impl VectorIndex {
    /// Open (and migrate) the index at `db_path`.
    pub async fn open(db_path: &Path, embedding: EmbeddingConfig) -> anyhow::Result<Self> {
        let provider = embedding::create_provider(&embedding)?;
        let model = provider.model_name().to_string();
        let dims = provider.dims();

        let pool = db::connect(db_path).await?;
        db::run_migrations(&pool).await?;

        Ok(Self {
            pool,
            embedding,
            model,
            dims,
        })
    }

    /// Record the document a batch of chunks belongs to.
    pub async fn insert_document(
        &self,
        document_id: &str,
        filename: &str,
        content_type: &str,
        chunk_count: usize,
    ) -> QaResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, content_type, created_at, chunk_count)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(document_id)
        .bind(filename)
        .bind(content_type)
        .bind(chrono::Utc::now().timestamp())
        .bind(chunk_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| QaError::IndexWrite(e.to_string()))?;

        Ok(())
    }

    /// Flag a document's original bytes as archived in object storage.
    pub async fn mark_archived(&self, document_id: &str) -> QaResult<()> {
        sqlx::query("UPDATE documents SET archived = 1 WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(|e| QaError::IndexWrite(e.to_string()))?;
        Ok(())
    }

    /// Embed each chunk and append the resulting entries.
    ///
    /// Embedding happens before any write; a write failure partway through
    /// leaves earlier chunks indexed (no rollback).
    pub async fn add(&self, chunks: &[Chunk]) -> QaResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_texts(&self.embedding, &texts).await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&self.pool)
            .await
            .map_err(|e| QaError::IndexWrite(e.to_string()))?;

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, document_id, model, dims, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&self.model)
            .bind(self.dims as i64)
            .bind(vec_to_blob(vector))
            .execute(&self.pool)
            .await
            .map_err(|e| QaError::IndexWrite(e.to_string()))?;
        }

        debug!(chunks = chunks.len(), model = %self.model, "indexed chunks");
        Ok(())
    }

    /// Return the `k` nearest entries to `query`, nearest-first.
    ///
    /// Fails with `IndexRead` when the index holds no entries, before any
    /// embedding work happens.
    pub async fn search(&self, query: &str, k: usize) -> QaResult<Vec<SearchHit>> {
        if self.chunk_count().await? == 0 {
            return Err(QaError::IndexRead("index is empty".to_string()));
        }

        let query_vec = embedding::embed_query(&self.embedding, query).await?;

        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, cv.document_id, cv.embedding, c.text
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QaError::IndexRead(e.to_string()))?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                SearchHit {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    text: row.get("text"),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    pub async fn chunk_count(&self) -> QaResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| QaError::IndexRead(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split_text;
    use tempfile::TempDir;

    async fn open_test_index() -> (TempDir, VectorIndex) {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(&tmp.path().join("index.sqlite"), EmbeddingConfig::default())
            .await
            .unwrap();
        (tmp, index)
    }

    #[tokio::test]
    async fn empty_index_search_is_read_error() {
        let (_tmp, index) = open_test_index().await;
        let err = index.search("anything", 4).await.unwrap_err();
        assert!(matches!(err, QaError::IndexRead(_)));
    }

    #[tokio::test]
    async fn add_then_exact_search_round_trips() {
        let (_tmp, index) = open_test_index().await;

        let texts = [
            "The capital of France is Paris.",
            "Photosynthesis converts light into chemical energy.",
            "Rust guarantees memory safety without garbage collection.",
        ];
        for (i, text) in texts.iter().enumerate() {
            let doc_id = format!("doc{}", i);
            index
                .insert_document(&doc_id, &format!("{}.txt", i), "text/plain", 1)
                .await
                .unwrap();
            let chunks = split_text(&doc_id, text, 1000, 200).unwrap();
            index.add(&chunks).await.unwrap();
        }

        for text in &texts {
            let hits = index.search(text, 4).await.unwrap();
            assert_eq!(hits[0].text, *text, "exact query must rank its chunk first");
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn search_returns_at_most_k_nearest_first() {
        let (_tmp, index) = open_test_index().await;

        index
            .insert_document("doc", "doc.txt", "text/plain", 8)
            .await
            .unwrap();
        let text = (0..8)
            .map(|i| format!("Section {} covers a distinct topic entirely.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split_text("doc", &text, 50, 0).unwrap();
        index.add(&chunks).await.unwrap();

        let hits = index.search("Section 3", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn chunk_count_tracks_adds() {
        let (_tmp, index) = open_test_index().await;
        assert_eq!(index.chunk_count().await.unwrap(), 0);

        index
            .insert_document("doc", "doc.txt", "text/plain", 1)
            .await
            .unwrap();
        let chunks = split_text("doc", "Hello world. ", 1000, 200).unwrap();
        index.add(&chunks).await.unwrap();
        assert_eq!(index.chunk_count().await.unwrap(), 1);
    }
}
