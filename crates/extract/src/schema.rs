use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub source_url: String,
    pub raw_text: String,
    pub extraction_succeeded: bool,
}

impl ExtractedDocument {
    pub fn succeeded(source_url: impl Into<String>, raw_text: String) -> Self {
        Self {
            source_url: source_url.into(),
            raw_text,
            extraction_succeeded: true,
        }
    }

    /// No candidate produced usable text.
    pub fn failed() -> Self {
        Self {
            source_url: String::new(),
            raw_text: String::new(),
            extraction_succeeded: false,
        }
    }
}

/// What a fetcher got back for one link.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}
