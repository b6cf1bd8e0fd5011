// Text extraction for uploaded resumes and job descriptions.
// PDF via pdf-extract; markdown and plain text decoded as UTF-8.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported document type for '{filename}' ({content_type}); expected PDF, Markdown or plain text")]
    Unsupported {
        filename: String,
        content_type: String,
    },

    #[error("Could not read PDF '{filename}': {reason}")]
    Pdf { filename: String, reason: String },

    #[error("'{0}' is not valid UTF-8 text")]
    Encoding(String),

    #[error("No text could be extracted from '{0}'")]
    Empty(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// A recognised extension and a specific content type must agree. An unknown extension is
/// rejected whatever the content type claims; without an extension the content type decides.
pub fn detect_kind(filename: &str, content_type: Option<&str>) -> Option<DocumentKind> {
    let declared = match content_type.map(|c| c.split(';').next().unwrap_or(c).trim()) {
        Some("application/pdf") => Some(DocumentKind::Pdf),
        Some("text/markdown" | "text/x-markdown" | "text/plain") => Some(DocumentKind::Text),
        _ => None,
    };

    let Some((_, extension)) = filename.rsplit_once('.') else {
        return declared;
    };
    let by_extension = match extension.to_ascii_lowercase().as_str() {
        "pdf" => DocumentKind::Pdf,
        "md" | "markdown" | "txt" => DocumentKind::Text,
        _ => return None,
    };

    match declared {
        Some(kind) if kind != by_extension => None,
        _ => Some(by_extension),
    }
}

pub fn extract_text(
    filename: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String, DocumentError> {
    let kind = detect_kind(filename, content_type).ok_or_else(|| DocumentError::Unsupported {
        filename: filename.to_string(),
        content_type: content_type.unwrap_or("unknown").to_string(),
    })?;

    let text = match kind {
        DocumentKind::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Pdf {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?
        }
        DocumentKind::Text => String::from_utf8(bytes.to_vec())
            .map_err(|_| DocumentError::Encoding(filename.to_string()))?,
    };

    if text.trim().is_empty() {
        return Err(DocumentError::Empty(filename.to_string()));
    }
    debug!("Extracted {} chars from {filename} ({kind:?})", text.len());
    Ok(text)
}
