mod config;
mod logging;
mod metrics;
mod routes;
mod store;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use extract::{Extractor, HttpFetcher};
use report::{LlmClient, OpenAiClient, PromptSet, ReportPipeline};
use search::{SearchClient, SerpApiClient};

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::routes::AppState;
use crate::store::ReportStore;

type LivePipeline = ReportPipeline<SerpApiClient, HttpFetcher, OpenAiClient>;

fn build_pipeline(config: &AppConfig, prompts: PromptSet) -> Result<LivePipeline> {
    let serpapi = SerpApiClient::new(
        config.serpapi_base_url.clone(),
        config.serpapi_key.clone(),
        config.search_locale(),
        config.search_timeout(),
    )?;
    let fetcher = HttpFetcher::new(config.fetch_timeout(), config.max_document_bytes)?;
    let model = OpenAiClient::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.model.clone(),
        config.llm_timeout(),
    )?;

    Ok(ReportPipeline::new(
        SearchClient::new(serpapi, config.max_search_results),
        Extractor::new(fetcher, config.extractor_config()),
        LlmClient::new(model, config.llm_config(), config.retry_policy()),
        prompts,
        config.pipeline_config(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let config = AppConfig::parse();

    logging::init(&config.log_file);
    config.validate().context("Invalid configuration")?;

    let prompts = PromptSet::load(&config.prompt_dir)
        .await
        .context("Failed to load prompt templates")?;
    tracing::info!(
        dir = %config.prompt_dir.display(),
        step1_chars = prompts.step1.as_str().chars().count(),
        step2_chars = prompts.step2.as_str().chars().count(),
        "Prompt templates loaded"
    );

    let pipeline = build_pipeline(&config, prompts)?;
    let state = Arc::new(AppState {
        analyzer: pipeline,
        store: ReportStore::new(config.max_stored_reports),
        metrics: Metrics::new(),
        form_limits: config.form_limits(),
        key_status: config.key_status(),
    });

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, model = %config.model, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
