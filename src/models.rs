//! Core data models for the document question-answering pipeline.
//!
//! These types represent the documents, chunks, search hits, and
//! conversation turns that flow through ingestion and query handling.

use crate::error::QaError;

/// Detected document type, derived from the uploaded filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Detect the document kind from a filename extension.
    ///
    /// Only `.pdf` and `.txt` are accepted; anything else is a
    /// `Validation` error so the pipeline never touches unsupported bytes.
    pub fn from_filename(filename: &str) -> Result<Self, QaError> {
        let ext = filename
            .rsplit('.')
            .next()
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "txt" => Ok(DocumentKind::Text),
            _ => Err(QaError::validation(format!(
                "unsupported file type: '{}' (expected .pdf or .txt)",
                filename
            ))),
        }
    }
}

/// An uploaded document: raw bytes plus filename and detected kind.
///
/// Exists only for the duration of ingestion — once chunked, the text lives
/// in the index and the raw bytes (optionally) in object storage.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, QaError> {
        let filename = filename.into();
        let kind = DocumentKind::from_filename(&filename)?;
        Ok(Self {
            filename,
            kind,
            bytes,
        })
    }
}

/// An ordered text span cut from a document's extracted text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A single retrieval result: chunk text plus its cosine similarity to the
/// query, nearest-first when returned from the index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

/// One question/answer exchange in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_and_txt() {
        assert_eq!(
            DocumentKind::from_filename("report.pdf").unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::from_filename("notes.TXT").unwrap(),
            DocumentKind::Text
        );
    }

    #[test]
    fn rejects_other_extensions() {
        let err = DocumentKind::from_filename("image.png").unwrap_err();
        assert!(matches!(err, QaError::Validation(_)));

        let err = DocumentKind::from_filename("no_extension").unwrap_err();
        assert!(matches!(err, QaError::Validation(_)));
    }

    #[test]
    fn document_new_validates_extension() {
        assert!(Document::new("doc.txt", b"hello".to_vec()).is_ok());
        assert!(Document::new("doc.exe", b"hello".to_vec()).is_err());
    }
}
