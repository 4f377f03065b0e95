use std::fmt;
use std::time::Instant;

use chrono::Utc;
use extract::{DocumentFetcher, ExtractedDocument, Extractor};
use search::{
    SearchClient, SearchError, SearchProvider, classify_industry, company_plan, market_plan,
    planner::mentions_company, rank_document_candidates,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::bundle::aggregate;
use crate::llm::{ChatModel, LlmClient, ModelCallError};
use crate::prompt::PromptSet;
use crate::schema::{InfoBundle, Query, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Init,
    Searching,
    Extracting,
    Aggregating,
    Stage1,
    Stage2,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Init => "INIT",
            PipelineStage::Searching => "SEARCHING",
            PipelineStage::Extracting => "EXTRACTING",
            PipelineStage::Aggregating => "AGGREGATING",
            PipelineStage::Stage1 => "STAGE1",
            PipelineStage::Stage2 => "STAGE2",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineFailure {
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Model(#[from] ModelCallError),
}

/// A run that ended in FAILED. `stage` is the state the run was in when it failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("pipeline failed at {stage}: {cause}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub cause: PipelineFailure,
}

impl PipelineError {
    fn new(stage: PipelineStage, cause: impl Into<PipelineFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_document_candidates: usize,
    pub min_step1_chars: usize,
    pub require_company_mention: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_document_candidates: 5,
            min_step1_chars: 300,
            require_company_mention: true,
        }
    }
}

pub struct ReportPipeline<S, F, M> {
    search: SearchClient<S>,
    extractor: Extractor<F>,
    llm: LlmClient<M>,
    prompts: PromptSet,
    config: PipelineConfig,
}

impl<S, F, M> ReportPipeline<S, F, M>
where
    S: SearchProvider + Sync,
    F: DocumentFetcher + Sync,
    M: ChatModel + Sync,
{
    pub fn new(
        search: SearchClient<S>,
        extractor: Extractor<F>,
        llm: LlmClient<M>,
        prompts: PromptSet,
        config: PipelineConfig,
    ) -> Self {
        Self {
            search,
            extractor,
            llm,
            prompts,
            config,
        }
    }

    pub async fn run(&self, query: &Query) -> Result<Report, PipelineError> {
        self.run_observed(query, |_| {}).await
    }

    /// Run the full flow, calling `observer` on every state entered (FAILED included).
    pub async fn run_observed<O>(&self, query: &Query, mut observer: O) -> Result<Report, PipelineError>
    where
        O: FnMut(PipelineStage) + Send,
    {
        let started = Instant::now();
        let result = self.drive(query, &mut observer).await;

        match &result {
            Ok(report) => {
                info!(
                    company = %report.company_name,
                    step1_chars = report.step1_output.char_count(),
                    step2_chars = report.step2_output.char_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Report generated"
                );
            }
            Err(e) => {
                observer(PipelineStage::Failed);
                error!(
                    company = %query.company_name(),
                    stage = %e.stage,
                    error = %e.cause,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Pipeline failed"
                );
            }
        }
        result
    }

    async fn drive<O>(&self, query: &Query, observer: &mut O) -> Result<Report, PipelineError>
    where
        O: FnMut(PipelineStage) + Send,
    {
        let mut enter = |stage: PipelineStage| {
            info!(company = %query.company_name(), stage = %stage, "Pipeline transition");
            observer(stage);
        };

        enter(PipelineStage::Init);
        let bundle = self.gather(query, &mut enter).await?;

        enter(PipelineStage::Stage1);
        let step1 = self
            .llm
            .generate_step1(&bundle, &self.prompts.step1)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Stage1, e))?;

        let step1_chars = step1.char_count();
        if step1_chars < self.config.min_step1_chars {
            return Err(PipelineError::new(
                PipelineStage::Stage1,
                ModelCallError::Truncated(format!(
                    "stage-1 output has {} chars, expected at least {}",
                    step1_chars, self.config.min_step1_chars
                )),
            ));
        }

        enter(PipelineStage::Stage2);
        let step2 = self
            .llm
            .generate_step2(&step1, &self.prompts.step2)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Stage2, e))?;

        let report = Report {
            company_name: query.company_name().to_string(),
            step1_output: step1,
            step2_output: step2,
            generated_at: Utc::now(),
        };
        enter(PipelineStage::Done);
        Ok(report)
    }

    /// SEARCHING, EXTRACTING and AGGREGATING. Retrieval problems only shrink the bundle.
    pub async fn gather<O>(&self, query: &Query, enter: &mut O) -> Result<InfoBundle, PipelineError>
    where
        O: FnMut(PipelineStage) + Send,
    {
        let company = query.company_name();

        enter(PipelineStage::Searching);
        let company_results = self
            .search
            .search_with_fallback(&company_plan(company))
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Searching, e))?;

        let industry = classify_industry(query.job_posting_text());
        let market_results = self
            .search
            .search_with_fallback(&market_plan(industry))
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Searching, e))?;
        info!(
            company,
            industry,
            company_results = company_results.len(),
            market_results = market_results.len(),
            "Search finished"
        );

        enter(PipelineStage::Extracting);
        let candidates = rank_document_candidates(
            company,
            &company_results,
            self.config.max_document_candidates,
        );
        let require_mention = self.config.require_company_mention;
        let document = match self
            .extractor
            .extract_matching(&candidates, |text| {
                !require_mention || mentions_company(text, company)
            })
            .await
        {
            Ok(document) => document,
            Err(e) => {
                warn!(company, error = %e, "Extraction skipped");
                ExtractedDocument::failed()
            }
        };

        enter(PipelineStage::Aggregating);
        let all_results: Vec<_> = company_results.into_iter().chain(market_results).collect();
        let bundle = aggregate(query, &all_results, &document);
        info!(
            company,
            snippets = bundle.raw_snippets.len(),
            documents = bundle.documents.len(),
            "Info bundle assembled"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletion, ChatRequest, LlmConfig, Role};
    use crate::prompt::PromptTemplate;
    use crate::retry::RetryPolicy;
    use anyhow::{Result, anyhow};
    use extract::{ExtractorConfig, FetchedDocument};
    use search::SearchResult;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Answers queries that mention the company; everything else finds nothing.
    struct FakeSearch {
        company: &'static str,
        results: Vec<SearchResult>,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
            self.queries.lock().unwrap().push(query.to_string());
            if query.contains(self.company) {
                Ok(self.results.iter().take(limit).cloned().collect())
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct FakeFetcher {
        pages: HashMap<String, String>,
    }

    impl DocumentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
            let text = self
                .pages
                .get(url)
                .ok_or_else(|| anyhow!("connection refused: {url}"))?;
            Ok(FetchedDocument {
                content_type: Some("text/plain; charset=utf-8".to_string()),
                body: text.as_bytes().to_vec(),
            })
        }
    }

    fn completion(text: String, finish_reason: &str) -> ChatCompletion {
        ChatCompletion {
            text,
            model: "gpt-5-mini".to_string(),
            usage: None,
            finish_reason: Some(finish_reason.to_string()),
        }
    }

    /// Replies with a scripted completion per call; `None` means a model failure.
    struct FakeModel {
        replies: Mutex<Vec<Option<ChatCompletion>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ChatModel for FakeModel {
        async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, ModelCallError> {
            self.requests.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.is_empty() { None } else { replies.remove(0) };
            match reply {
                Some(completion) => Ok(completion),
                None => Err(ModelCallError::Http {
                    status: 401,
                    message: "invalid api key".to_string(),
                }),
            }
        }
    }

    fn acme_results() -> Vec<SearchResult> {
        vec![
            SearchResult::new("Acme news", "https://acme.example/news", "Acme opens Osaka office"),
            SearchResult::new("About Acme", "https://acme.example/about", "Acme builds logistics software"),
            SearchResult::new("Acme careers", "https://acme.example/careers", "Join Acme Corp"),
        ]
    }

    type TestPipeline = ReportPipeline<FakeSearch, FakeFetcher, FakeModel>;

    fn pipeline(results: Vec<SearchResult>, replies: Vec<Option<String>>) -> TestPipeline {
        pipeline_with_queries(results, replies, Arc::default())
    }

    fn pipeline_with_queries(
        results: Vec<SearchResult>,
        replies: Vec<Option<String>>,
        queries: Arc<Mutex<Vec<String>>>,
    ) -> TestPipeline {
        let mut pages = HashMap::new();
        pages.insert(
            "https://acme.example/about".to_string(),
            "Acme Corp is a logistics software vendor with 400 employees.".to_string(),
        );

        ReportPipeline::new(
            SearchClient::new(
                FakeSearch {
                    company: "Acme",
                    results,
                    queries,
                },
                10,
            ),
            Extractor::new(FakeFetcher { pages }, ExtractorConfig::default()),
            LlmClient::new(
                FakeModel {
                    replies: Mutex::new(
                        replies
                            .into_iter()
                            .map(|r| r.map(|text| completion(text, "stop")))
                            .collect(),
                    ),
                    requests: Mutex::new(Vec::new()),
                },
                LlmConfig::default(),
                RetryPolicy::none(),
            ),
            PromptSet {
                step1: PromptTemplate::new("Write a company analysis."),
                step2: PromptTemplate::new("Review and extend the analysis."),
            },
            PipelineConfig::default(),
        )
    }

    fn query() -> Query {
        Query::new("Acme Corp", "Senior Backend Engineer, Tokyo").unwrap()
    }

    fn long_text(prefix: &str) -> String {
        format!("{prefix} {}", "analysis ".repeat(50))
    }

    #[tokio::test]
    async fn test_acme_scenario() {
        let step1 = long_text("## Overview");
        let step2 = format!("{step1}\n## Interview questions\n- Why Acme?");
        let pipeline = pipeline(acme_results(), vec![Some(step1.clone()), Some(step2)]);

        let bundle = pipeline.gather(&query(), &mut |_| {}).await.unwrap();
        assert_eq!(bundle.documents.len(), 1);
        assert_eq!(bundle.documents[0].source_url, "https://acme.example/about");
        assert_eq!(bundle.raw_snippets.len(), 3);

        let mut stages = Vec::new();
        let report = pipeline
            .run_observed(&query(), |stage| stages.push(stage))
            .await
            .unwrap();

        assert_eq!(
            stages,
            vec![
                PipelineStage::Init,
                PipelineStage::Searching,
                PipelineStage::Extracting,
                PipelineStage::Aggregating,
                PipelineStage::Stage1,
                PipelineStage::Stage2,
                PipelineStage::Done,
            ]
        );
        assert_eq!(report.step1_output.text, step1);
        assert!(report.step2_output.text.contains("Interview questions"));
        assert!(!report.step1_output.text.contains("Interview questions"));

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["company_name", "generated_at", "step1_output", "step2_output"]
        );

        let requests = pipeline.llm_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert!(requests[0].messages[0].content.contains("logistics software vendor"));
        assert_eq!(requests[1].messages[1].content, step1);
    }

    #[tokio::test]
    async fn test_relative_result_link_does_not_hide_document() {
        let mut results = acme_results();
        results.push(SearchResult::new("Acme redirect", "/url?q=acme", "Acme elsewhere"));
        let pipeline = pipeline(results, Vec::new());

        let bundle = pipeline.gather(&query(), &mut |_| {}).await.unwrap();
        assert_eq!(bundle.documents.len(), 1);
        assert_eq!(bundle.documents[0].source_url, "https://acme.example/about");
    }

    #[tokio::test]
    async fn test_empty_search_still_reaches_stage1() {
        let queries = Arc::default();
        let pipeline = pipeline_with_queries(
            Vec::new(),
            vec![Some(long_text("a")), Some(long_text("b"))],
            Arc::clone(&queries),
        );

        let mut stages = Vec::new();
        let report = pipeline
            .run_observed(&query(), |stage| stages.push(stage))
            .await
            .unwrap();

        assert!(stages.contains(&PipelineStage::Stage1));
        assert!(!report.step2_output.text.is_empty());

        // company primary + fallback, market primary + fallback
        assert_eq!(queries.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_stage1_failure_produces_no_report() {
        let pipeline = pipeline(acme_results(), vec![None]);

        let mut stages = Vec::new();
        let err = pipeline
            .run_observed(&query(), |stage| stages.push(stage))
            .await
            .unwrap_err();

        assert_eq!(err.stage, PipelineStage::Stage1);
        assert!(matches!(err.cause, PipelineFailure::Model(ModelCallError::Http { status: 401, .. })));
        assert_eq!(stages.last(), Some(&PipelineStage::Failed));
        assert!(!stages.contains(&PipelineStage::Stage2));
    }

    #[tokio::test]
    async fn test_short_stage1_skips_stage2() {
        let pipeline = pipeline(acme_results(), vec![Some("too short".to_string()), Some(long_text("b"))]);

        let err = pipeline.run(&query()).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::Stage1);
        assert!(matches!(err.cause, PipelineFailure::Model(ModelCallError::Truncated(_))));
        assert_eq!(pipeline.llm_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_stage2_failure_is_reported_at_stage2() {
        let pipeline = pipeline(acme_results(), vec![Some(long_text("a"))]);

        let err = pipeline.run(&query()).await.unwrap_err();
        assert_eq!(err.stage, PipelineStage::Stage2);
        assert_eq!(err.to_string().split(':').next(), Some("pipeline failed at STAGE2"));
    }

    #[tokio::test]
    async fn test_stage2_cut_at_token_limit_produces_no_report() {
        let pipeline = pipeline(acme_results(), vec![Some(long_text("a"))]);
        pipeline.push_reply(completion(
            "# Final report\n## Interview questi".to_string(),
            "length",
        ));

        let mut stages = Vec::new();
        let err = pipeline
            .run_observed(&query(), |stage| stages.push(stage))
            .await
            .unwrap_err();

        assert_eq!(err.stage, PipelineStage::Stage2);
        assert!(matches!(err.cause, PipelineFailure::Model(ModelCallError::Truncated(_))));
        assert_eq!(stages.last(), Some(&PipelineStage::Failed));
        assert!(!stages.contains(&PipelineStage::Done));
    }

    impl TestPipeline {
        fn push_reply(&self, reply: ChatCompletion) {
            self.llm.model().replies.lock().unwrap().push(Some(reply));
        }

        fn llm_requests(&self) -> Vec<ChatRequest> {
            self.llm.model().requests.lock().unwrap().clone()
        }
    }
}
