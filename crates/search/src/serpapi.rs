use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::client::SearchProvider;
use crate::schema::SearchResult;

/// Regional parameters forwarded to the Google engine.
#[derive(Debug, Clone)]
pub struct SearchLocale {
    pub location: String,
    pub language: String,
    pub country: String,
}

impl Default for SearchLocale {
    fn default() -> Self {
        Self {
            location: "Japan".to_string(),
            language: "ja".to_string(),
            country: "jp".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SerpApiClient {
    base_url: String,
    api_key: String,
    locale: SearchLocale,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerpApiClient {
    pub fn new(
        base_url: String,
        api_key: String,
        locale: SearchLocale,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build SerpAPI HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            locale,
            client,
        })
    }
}

impl SearchProvider for SerpApiClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let url = format!("{}/search.json", self.base_url);
        let num = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("location", self.locale.location.as_str()),
                ("hl", self.locale.language.as_str()),
                ("gl", self.locale.country.as_str()),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to send request to SerpAPI")?;

        if !response.status().is_success() {
            anyhow::bail!("SerpAPI request failed: {}", response.status());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse SerpAPI response")?;

        parse_organic_results(body)
    }
}

/// Maps a SerpAPI answer to results, skipping hits without a link.
pub fn parse_organic_results(body: serde_json::Value) -> Result<Vec<SearchResult>> {
    let parsed: SerpApiResponse =
        serde_json::from_value(body).context("Unexpected SerpAPI response shape")?;

    if parsed.organic_results.is_empty() {
        if let Some(error) = parsed.error {
            // "Google hasn't returned any results" is reported through the same field
            anyhow::bail!("SerpAPI error: {}", error);
        }
    }

    Ok(parsed
        .organic_results
        .into_iter()
        .filter(|r| !r.link.is_empty())
        .map(|r| SearchResult {
            title: r.title,
            url: r.link,
            snippet: r.snippet,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_organic_results() {
        let body = json!({
            "search_metadata": {"status": "Success"},
            "organic_results": [
                {"position": 1, "title": "Acme IR", "link": "https://acme.example/ir.pdf", "snippet": "Revenue up"},
                {"position": 2, "title": "No link"},
                {"position": 3, "title": "Acme news", "link": "https://news.example/acme"}
            ]
        });

        let results = parse_organic_results(body).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://acme.example/ir.pdf");
        assert_eq!(results[0].snippet, "Revenue up");
        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_error_field_is_failure() {
        let body = json!({"error": "Invalid API key."});
        let err = parse_organic_results(body).unwrap_err();
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_missing_results_without_error_is_empty() {
        let body = json!({"search_metadata": {"status": "Success"}});
        assert!(parse_organic_results(body).unwrap().is_empty());
    }
}
