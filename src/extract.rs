//! Plain-text extraction for uploaded documents.
//!
//! Given raw bytes plus the detected [`DocumentKind`], returns extracted
//! UTF-8 text. PDF extraction goes through `pdf-extract`; text files are
//! decoded as UTF-8 with lossy replacement so a stray byte never rejects an
//! otherwise readable document.

use crate::error::QaError;
use crate::models::DocumentKind;

/// Extract plain text from document bytes.
///
/// Fails with `Processing` when the bytes cannot be parsed as the declared
/// kind (e.g. a corrupt PDF). Unsupported kinds never reach this function —
/// they are rejected at upload validation.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String, QaError> {
    match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| QaError::processing(format!("PDF extraction failed: {}", e))),
        DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_bytes_pass_through() {
        let text = extract_text(b"Hello world. ", DocumentKind::Text).unwrap();
        assert_eq!(text, "Hello world. ");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let text = extract_text(&[b'o', b'k', 0xff, b'!'], DocumentKind::Text).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn invalid_pdf_is_processing_error() {
        let err = extract_text(b"not a pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, QaError::Processing(_)));
    }
}
