pub mod fetch;
pub mod normalizer;
pub mod reader;
pub mod schema;

pub use fetch::{DocumentFetcher, HttpFetcher};
pub use normalizer::{TextNormalizer, truncate_chars};
pub use schema::{ExtractedDocument, FetchedDocument};

use anyhow::Result;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("malformed document link: {0}")]
    MalformedUrl(String),
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Normalized text is cut to this many characters
    pub max_chars: usize,
    /// Shorter normalized text does not count as a hit
    pub min_chars: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_chars: 30_000,
            min_chars: 1,
        }
    }
}

pub struct Extractor<F> {
    fetcher: F,
    normalizer: TextNormalizer,
    min_chars: usize,
}

impl<F: DocumentFetcher + Sync> Extractor<F> {
    pub fn new(fetcher: F, config: ExtractorConfig) -> Self {
        Self {
            fetcher,
            normalizer: TextNormalizer::new(config.max_chars),
            min_chars: config.min_chars.max(1),
        }
    }

    /// Text of the first candidate that yields non-trivial content.
    pub async fn extract(&self, candidate_links: &[String]) -> Result<ExtractedDocument, ExtractError> {
        self.extract_matching(candidate_links, |_| true).await
    }

    /// Like [`Extractor::extract`], but a candidate also has to satisfy `accept`.
    ///
    /// Unreachable or unparseable links are skipped. A link that is not an
    /// absolute http(s) URL is an error once it is reached, so an earlier hit
    /// still wins.
    pub async fn extract_matching<P>(
        &self,
        candidate_links: &[String],
        accept: P,
    ) -> Result<ExtractedDocument, ExtractError>
    where
        P: Fn(&str) -> bool,
    {
        for link in candidate_links {
            validate_link(link)?;
            let text = match self.try_link(link).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(url = %link, error = %e, "Document candidate failed");
                    continue;
                }
            };

            if text.chars().count() < self.min_chars {
                debug!(url = %link, chars = text.len(), "Document text too short");
                continue;
            }
            if !accept(&text) {
                info!(url = %link, "Document rejected by content check");
                continue;
            }

            info!(url = %link, chars = text.chars().count(), "Document text extracted");
            return Ok(ExtractedDocument::succeeded(link.clone(), text));
        }

        info!(candidates = candidate_links.len(), "No document produced usable text");
        Ok(ExtractedDocument::failed())
    }

    async fn try_link(&self, link: &str) -> Result<String> {
        let fetched = self.fetcher.fetch(link).await?;
        let raw = reader::read_text(fetched).await?;
        Ok(self.normalizer.normalize(&raw))
    }
}

fn validate_link(link: &str) -> Result<(), ExtractError> {
    match Url::parse(link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ExtractError::MalformedUrl(link.to_string())),
    }
}
