pub mod bundle;
pub mod capabilities;
pub mod llm;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use bundle::aggregate;
pub use capabilities::{ModelCapabilities, OutputLimitParam, capabilities_for};
pub use llm::{ChatModel, LlmClient, LlmConfig, ModelCallError};
pub use openai::OpenAiClient;
pub use pipeline::{PipelineConfig, PipelineError, PipelineFailure, PipelineStage, ReportPipeline};
pub use prompt::{ContextLimits, PromptError, PromptSet, PromptTemplate};
pub use retry::RetryPolicy;
pub use schema::{InfoBundle, Query, QueryError, Report, StageMetadata, StageOutput};
