use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::prompt::{ContextLimits, PromptTemplate, render_step1_context};
use crate::retry::{RetryPolicy, Transient};
use crate::schema::{InfoBundle, StageMetadata, StageOutput};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelCallError {
    #[error("model call timed out")]
    Timeout,
    #[error("rate limited by model provider")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("model rejected a call parameter: {0}")]
    UnsupportedParameter(String),
    #[error("model provider returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model response truncated: {0}")]
    Truncated(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl Transient for ModelCallError {
    fn is_transient(&self) -> bool {
        match self {
            ModelCallError::Timeout | ModelCallError::RateLimited { .. } => true,
            ModelCallError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelCallError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One model invocation. Optional parameters may be dropped by the provider
/// when the configured model does not accept them.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

pub trait ChatModel {
    fn complete(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatCompletion, ModelCallError>> + Send;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
    pub context_limits: ContextLimits,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 16_000,
            temperature: None,
            context_limits: ContextLimits::default(),
        }
    }
}

pub struct LlmClient<M> {
    model: M,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl<M: ChatModel + Sync> LlmClient<M> {
    pub fn new(model: M, config: LlmConfig, retry: RetryPolicy) -> Self {
        Self {
            model,
            config,
            retry,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Stage 1: the collected context as system message, the prompt verbatim as user message.
    pub async fn generate_step1(
        &self,
        bundle: &InfoBundle,
        fixed_prompt_1: &PromptTemplate,
    ) -> Result<StageOutput, ModelCallError> {
        let context = render_step1_context(bundle, &self.config.context_limits);
        info!(
            company = %bundle.company_name,
            system_chars = context.chars().count(),
            user_chars = fixed_prompt_1.as_str().chars().count(),
            "Step1 request"
        );

        let messages = vec![
            ChatMessage::system(context),
            ChatMessage::user(fixed_prompt_1.as_str()),
        ];
        self.call("step1", messages).await
    }

    /// Stage 2: the prompt verbatim followed by the stage-1 text verbatim.
    pub async fn generate_step2(
        &self,
        step1_output: &StageOutput,
        fixed_prompt_2: &PromptTemplate,
    ) -> Result<StageOutput, ModelCallError> {
        info!(
            draft_chars = step1_output.char_count(),
            user_chars = fixed_prompt_2.as_str().chars().count(),
            "Step2 request"
        );

        let messages = vec![
            ChatMessage::user(fixed_prompt_2.as_str()),
            ChatMessage::user(step1_output.text.as_str()),
        ];
        self.call("step2", messages).await
    }

    async fn call(
        &self,
        operation: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<StageOutput, ModelCallError> {
        let request = ChatRequest {
            messages,
            max_output_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        };

        let completion = self
            .retry
            .retry(operation, || self.model.complete(request.clone()))
            .await?;

        let blank = completion.text.trim().is_empty();
        if completion.finish_reason.as_deref() == Some("length") {
            warn!(
                operation,
                chars = completion.text.chars().count(),
                "Model output hit the token limit"
            );
            return Err(ModelCallError::Truncated(if blank {
                "output limit reached before any text was produced".to_string()
            } else {
                format!(
                    "output limit reached after {} characters",
                    completion.text.chars().count()
                )
            }));
        }
        if blank {
            return Err(ModelCallError::EmptyResponse);
        }

        info!(
            operation,
            model = %completion.model,
            chars = completion.text.chars().count(),
            "Model response received"
        );

        let usage = completion.usage.unwrap_or_default();
        Ok(StageOutput {
            text: completion.text,
            metadata: StageMetadata {
                model: completion.model,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                finish_reason: completion.finish_reason,
            },
        })
    }
}
