use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use extract::truncate_chars;
use thiserror::Error;
use tokio::fs;

use crate::schema::InfoBundle;

pub const STEP1_FILE: &str = "prompt_step1.txt";
pub const STEP2_FILE: &str = "prompt_step2.txt";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read prompt file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Prompt text exactly as it was read from disk.
#[derive(Clone, PartialEq, Eq)]
pub struct PromptTemplate(Arc<str>);

impl PromptTemplate {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromptTemplate({} chars)", self.0.chars().count())
    }
}

#[derive(Debug, Clone)]
pub struct PromptSet {
    pub step1: PromptTemplate,
    pub step2: PromptTemplate,
}

impl PromptSet {
    /// Load `prompt_step1.txt` and `prompt_step2.txt` from `dir`.
    pub async fn load(dir: &Path) -> Result<Self, PromptError> {
        Ok(Self {
            step1: read_prompt(&dir.join(STEP1_FILE)).await?,
            step2: read_prompt(&dir.join(STEP2_FILE)).await?,
        })
    }
}

async fn read_prompt(path: &Path) -> Result<PromptTemplate, PromptError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(PromptTemplate::new(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PromptError::Missing(path.to_path_buf()))
        }
        Err(source) => Err(PromptError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[derive(Debug, Clone)]
pub struct ContextLimits {
    pub max_document_chars: usize,
    pub max_snippet_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_document_chars: 6_000,
            max_snippet_chars: 2_500,
        }
    }
}

/// Reference material sent alongside the stage-1 prompt.
pub fn render_step1_context(bundle: &InfoBundle, limits: &ContextLimits) -> String {
    let mut context = String::from(
        "[Collected data] Use the following material as reference for the analysis.\n\n",
    );

    context.push_str("■ Company\n");
    context.push_str(&bundle.company_name);
    context.push_str("\n\n■ Job posting\n");
    context.push_str(&bundle.job_posting_text);
    context.push_str("\n\n■ Facts\n");
    for (key, value) in &bundle.structured_facts {
        context.push_str(&format!("- {}: {}\n", key, value));
    }

    match bundle.documents.first() {
        Some(doc) => {
            context.push_str(&format!("\n■ Document excerpt (source: {})\n", doc.source_url));
            context.push_str(truncate_chars(&doc.raw_text, limits.max_document_chars));
            context.push('\n');
        }
        None => context.push_str("\n■ Document excerpt\nNo document could be retrieved.\n"),
    }

    context.push_str("\n■ Web search snippets\n");
    if bundle.raw_snippets.is_empty() {
        context.push_str("No search results were available.\n");
    } else {
        let snippets = bundle.raw_snippets.join("\n\n");
        context.push_str(truncate_chars(&snippets, limits.max_snippet_chars));
        context.push('\n');
    }

    context
}
