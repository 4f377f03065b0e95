use anyhow::{Context, Result};

use crate::schema::FetchedDocument;

const PDF_MAGIC: &[u8] = b"%PDF";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Unsupported,
}

pub fn detect_kind(document: &FetchedDocument) -> DocumentKind {
    // Some servers pad the header with whitespace or a BOM
    let body = document.body.strip_prefix(UTF8_BOM).unwrap_or(&document.body[..]);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    if body[start..].starts_with(PDF_MAGIC) {
        return DocumentKind::Pdf;
    }

    match document.content_type.as_deref() {
        Some(ct) if ct.starts_with("text/plain") => DocumentKind::PlainText,
        _ => DocumentKind::Unsupported,
    }
}

/// Raw text of a fetched document; PDF parsing runs on the blocking pool.
pub async fn read_text(document: FetchedDocument) -> Result<String> {
    match detect_kind(&document) {
        DocumentKind::Pdf => {
            let body = document.body;
            // pdf-extract can panic on malformed input; the join error surfaces it
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&body))
                .await
                .context("PDF parser aborted")?
                .map_err(|e| anyhow::anyhow!("Failed to extract PDF text: {e}"))
        }
        DocumentKind::PlainText => String::from_utf8(document.body)
            .context("Plain-text document is not valid UTF-8"),
        DocumentKind::Unsupported => anyhow::bail!(
            "Unsupported document type: {}",
            document.content_type.as_deref().unwrap_or("unknown")
        ),
    }
}
