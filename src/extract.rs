//! Text extraction for uploaded documents.
//!
//! The core accepts plain text and PDF-derived text today; anything else
//! is rejected with [`Error::UnsupportedType`] before the pipeline does
//! any work.

use crate::error::{Error, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Extract plain UTF-8 text from raw file bytes.
pub fn extract_text(bytes: &[u8], mime_type: &str) -> Result<String> {
    match mime_type {
        MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| Error::ExternalService(format!("PDF extraction failed: {}", e))),
        MIME_TEXT => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(Error::UnsupportedType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text(b"hello world", MIME_TEXT).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let err = extract_text(b"...", "application/octet-stream").unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        assert!(extract_text(b"not a pdf", MIME_PDF).is_err());
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let text = extract_text(&[0x68, 0x69, 0xFF], MIME_TEXT).unwrap();
        assert!(text.starts_with("hi"));
    }
}
