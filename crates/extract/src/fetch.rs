use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;

use crate::schema::FetchedDocument;

pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedDocument>> + Send;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build document HTTP client")?;
        Ok(Self { client, max_bytes })
    }
}

impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Download of {} failed: {}", url, response.status());
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                anyhow::bail!("Document {} is too large ({} bytes)", url, len);
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                anyhow::bail!("Document {} exceeds {} bytes", url, self.max_bytes);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedDocument { content_type, body })
    }
}
