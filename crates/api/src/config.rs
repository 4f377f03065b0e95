use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use extract::ExtractorConfig;
use report::{ContextLimits, LlmConfig, PipelineConfig, RetryPolicy};
use search::SearchLocale;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingSecret(&'static str),
    #[error("{name} must be at least {min}")]
    OutOfRange { name: &'static str, min: u64 },
}

/// Settings from flags, the environment, and `.env`.
#[derive(Debug, Clone, Parser)]
#[command(name = "company-report", about = "Company analysis reports for job postings")]
pub struct AppConfig {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: SocketAddr,

    #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
    pub serpapi_key: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = report::openai::DEFAULT_MODEL)]
    pub model: String,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,
    #[arg(long, env = "SERPAPI_BASE_URL", default_value = "https://serpapi.com")]
    pub serpapi_base_url: String,

    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value_t = 16_000)]
    pub max_output_tokens: u32,
    /// Only sent to models that accept it.
    #[arg(long, env = "TEMPERATURE")]
    pub temperature: Option<f32>,

    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 180)]
    pub llm_timeout_secs: u64,
    #[arg(long, env = "SEARCH_TIMEOUT_SECS", default_value_t = 30)]
    pub search_timeout_secs: u64,
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "MAX_RETRIES", default_value_t = 2)]
    pub max_retries: usize,
    #[arg(long, env = "INITIAL_BACKOFF_MS", default_value_t = 1_000)]
    pub initial_backoff_ms: u64,
    #[arg(long, env = "MAX_BACKOFF_MS", default_value_t = 10_000)]
    pub max_backoff_ms: u64,

    #[arg(long, env = "SEARCH_LOCATION", default_value = "Japan")]
    pub search_location: String,
    #[arg(long, env = "SEARCH_LANGUAGE", default_value = "ja")]
    pub search_language: String,
    #[arg(long, env = "SEARCH_COUNTRY", default_value = "jp")]
    pub search_country: String,
    #[arg(long, env = "MAX_SEARCH_RESULTS", default_value_t = 5)]
    pub max_search_results: usize,

    #[arg(long, env = "MAX_DOCUMENT_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub max_document_bytes: usize,
    #[arg(long, env = "MAX_DOCUMENT_CHARS", default_value_t = 30_000)]
    pub max_document_chars: usize,
    #[arg(long, env = "MAX_DOCUMENT_CANDIDATES", default_value_t = 5)]
    pub max_document_candidates: usize,
    #[arg(long, env = "CONTEXT_DOCUMENT_CHARS", default_value_t = 6_000)]
    pub context_document_chars: usize,
    #[arg(long, env = "CONTEXT_SNIPPET_CHARS", default_value_t = 2_500)]
    pub context_snippet_chars: usize,

    #[arg(long, env = "PROMPT_DIR", default_value = "prompts")]
    pub prompt_dir: PathBuf,
    #[arg(long, env = "LOG_FILE", default_value = "logs/analysis.log")]
    pub log_file: PathBuf,

    #[arg(long, env = "MIN_COMPANY_CHARS", default_value_t = 2)]
    pub min_company_chars: usize,
    #[arg(long, env = "MIN_POSTING_CHARS", default_value_t = 50)]
    pub min_posting_chars: usize,
    #[arg(long, env = "MIN_STEP1_CHARS", default_value_t = 300)]
    pub min_step1_chars: usize,
    #[arg(long, env = "MAX_STORED_REPORTS", default_value_t = 100)]
    pub max_stored_reports: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FormLimits {
    pub min_company_chars: usize,
    pub min_posting_chars: usize,
}

impl AppConfig {
    /// Checks clap cannot express: blank secrets and zero-sized budgets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serpapi_key.trim().is_empty() {
            return Err(ConfigError::MissingSecret("SERPAPI_KEY"));
        }
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::OutOfRange { name: "MAX_OUTPUT_TOKENS", min: 1 });
        }
        if self.max_stored_reports == 0 {
            return Err(ConfigError::OutOfRange { name: "MAX_STORED_REPORTS", min: 1 });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.initial_backoff_ms, self.max_backoff_ms)
    }

    pub fn search_locale(&self) -> SearchLocale {
        SearchLocale {
            location: self.search_location.clone(),
            language: self.search_language.clone(),
            country: self.search_country.clone(),
        }
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_chars: self.max_document_chars,
            ..ExtractorConfig::default()
        }
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            context_limits: ContextLimits {
                max_document_chars: self.context_document_chars,
                max_snippet_chars: self.context_snippet_chars,
            },
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_document_candidates: self.max_document_candidates,
            min_step1_chars: self.min_step1_chars,
            ..PipelineConfig::default()
        }
    }

    pub fn form_limits(&self) -> FormLimits {
        FormLimits {
            min_company_chars: self.min_company_chars,
            min_posting_chars: self.min_posting_chars,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Secret names with masked values, for the status panel.
    pub fn key_status(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SERPAPI_KEY", mask_secret(&self.serpapi_key)),
            ("OPENAI_API_KEY", mask_secret(&self.openai_api_key)),
        ]
    }
}

/// `abcd****wxyz`; short values are fully hidden.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}
