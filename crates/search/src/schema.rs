use serde::{Deserialize, Serialize};

/// One organic hit returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// A primary query plus the broadened query tried when the primary finds nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub primary: String,
    pub fallback: String,
}
