//! Document ingestion orchestration.
//!
//! Runs extract → chunk → embed → index for an uploaded document, and
//! separately archives the original bytes to object storage. The two flows
//! are deliberately independent: there is no compensating transaction, so a
//! document can end up indexed but not archived, or archived but not
//! indexed. Callers report each stage's outcome distinctly.

use tracing::info;
use uuid::Uuid;

use crate::chunk::split_text;
use crate::config::Config;
use crate::error::{QaError, QaResult};
use crate::extract::extract_text;
use crate::index::VectorIndex;
use crate::models::{Document, DocumentKind};
use crate::storage::S3Storage;

/// Outcome of indexing one document.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub document_id: String,
    pub filename: String,
    pub chunks: usize,
}

pub fn content_type(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "application/pdf",
        DocumentKind::Text => "text/plain",
    }
}

/// Extract, chunk, embed, and index one document.
pub async fn ingest_document(
    config: &Config,
    index: &VectorIndex,
    doc: &Document,
) -> QaResult<IngestSummary> {
    let text = extract_text(&doc.bytes, doc.kind)?;
    if text.trim().is_empty() {
        return Err(QaError::processing(format!(
            "no extractable text in '{}'",
            doc.filename
        )));
    }

    let document_id = Uuid::new_v4().to_string();
    let chunks = split_text(
        &document_id,
        &text,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )?;

    index
        .insert_document(
            &document_id,
            &doc.filename,
            content_type(doc.kind),
            chunks.len(),
        )
        .await?;
    index.add(&chunks).await?;

    info!(
        document_id,
        filename = %doc.filename,
        chunks = chunks.len(),
        "document indexed"
    );

    Ok(IngestSummary {
        document_id,
        filename: doc.filename.clone(),
        chunks: chunks.len(),
    })
}

/// Archive the original bytes. Independent of [`ingest_document`]; a
/// failure here says nothing about the indexing outcome.
pub async fn archive_document(
    storage: &S3Storage,
    index: &VectorIndex,
    doc: &Document,
    document_id: &str,
) -> QaResult<String> {
    let key = storage.object_key(&doc.filename);
    storage.put(&key, &doc.bytes, content_type(doc.kind)).await?;
    index.mark_archived(document_id).await?;

    info!(document_id, key, "document archived");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig};
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        Config {
            db: DbConfig {
                path: tmp.path().join("docqa.sqlite"),
            },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: Default::default(),
            llm: Default::default(),
            storage: None,
            server: Default::default(),
        }
    }

    async fn open_index(config: &Config) -> VectorIndex {
        VectorIndex::open(&config.db.path, config.embedding.clone())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn short_text_document_yields_one_chunk() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp);
        config.chunking.max_chars = 4000;
        let index = open_index(&config).await;

        let doc = Document::new("doc.txt", "Hello world. ".repeat(200).into_bytes()).unwrap();
        let summary = ingest_document(&config, &index, &doc).await.unwrap();

        assert_eq!(summary.chunks, 1);
        assert_eq!(index.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn long_text_document_is_chunked_and_searchable() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let index = open_index(&config).await;

        let body = (0..40)
            .map(|i| format!("Paragraph {} describes topic number {}.", i, i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let doc = Document::new("paragraphs.txt", body.into_bytes()).unwrap();
        let summary = ingest_document(&config, &index, &doc).await.unwrap();

        assert!(summary.chunks >= 1);
        let hits = index.search("Paragraph 7", 4).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn empty_document_is_processing_error() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let index = open_index(&config).await;

        let doc = Document::new("empty.txt", b"   \n  ".to_vec()).unwrap();
        let err = ingest_document(&config, &index, &doc).await.unwrap_err();
        assert!(matches!(err, QaError::Processing(_)));
        assert_eq!(index.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_pdf_never_reaches_the_index() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let index = open_index(&config).await;

        let doc = Document::new("broken.pdf", b"not a real pdf".to_vec()).unwrap();
        let err = ingest_document(&config, &index, &doc).await.unwrap_err();
        assert!(matches!(err, QaError::Processing(_)));
        assert_eq!(index.chunk_count().await.unwrap(), 0);
    }
}
