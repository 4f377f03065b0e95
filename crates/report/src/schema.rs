use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use extract::ExtractedDocument;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("company name must not be empty")]
    EmptyCompanyName,
    #[error("job posting text must not be empty")]
    EmptyJobPosting,
}

/// User input for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuery")]
pub struct Query {
    company_name: String,
    job_posting_text: String,
}

impl Query {
    pub fn new(
        company_name: impl Into<String>,
        job_posting_text: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let company_name = company_name.into().trim().to_string();
        let job_posting_text = job_posting_text.into().trim().to_string();

        if company_name.is_empty() {
            return Err(QueryError::EmptyCompanyName);
        }
        if job_posting_text.is_empty() {
            return Err(QueryError::EmptyJobPosting);
        }

        Ok(Self {
            company_name,
            job_posting_text,
        })
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn job_posting_text(&self) -> &str {
        &self.job_posting_text
    }
}

#[derive(Deserialize)]
struct RawQuery {
    company_name: String,
    job_posting_text: String,
}

impl TryFrom<RawQuery> for Query {
    type Error = QueryError;

    fn try_from(raw: RawQuery) -> Result<Self, Self::Error> {
        Query::new(raw.company_name, raw.job_posting_text)
    }
}

/// Everything retrieval found, in the shape the stage-1 call consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoBundle {
    pub company_name: String,
    pub job_posting_text: String,
    pub structured_facts: BTreeMap<String, String>,
    pub raw_snippets: Vec<String>,
    pub documents: Vec<ExtractedDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMetadata {
    pub model: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    pub text: String,
    pub metadata: StageMetadata,
}

impl StageOutput {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub company_name: String,
    pub step1_output: StageOutput,
    pub step2_output: StageOutput,
    pub generated_at: DateTime<Utc>,
}
