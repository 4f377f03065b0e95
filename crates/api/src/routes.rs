use std::future::Future;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use export::{ExportFormat, export, export_filename};
use extract::DocumentFetcher;
use report::{ChatModel, PipelineError, PipelineStage, Query, Report, ReportPipeline};
use search::SearchProvider;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FormLimits;
use crate::metrics::{Metrics, TimedOperation};
use crate::store::ReportStore;
use crate::ui::{self, FormView};

/// Runs one analysis. Implemented by the live pipeline and by test doubles.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(
        &self,
        query: &Query,
        observer: impl FnMut(PipelineStage) + Send,
    ) -> impl Future<Output = Result<Report, PipelineError>> + Send;
}

impl<S, F, M> Analyzer for ReportPipeline<S, F, M>
where
    S: SearchProvider + Send + Sync + 'static,
    F: DocumentFetcher + Send + Sync + 'static,
    M: ChatModel + Send + Sync + 'static,
{
    async fn analyze(
        &self,
        query: &Query,
        observer: impl FnMut(PipelineStage) + Send,
    ) -> Result<Report, PipelineError> {
        self.run_observed(query, observer).await
    }
}

pub struct AppState<A> {
    pub analyzer: A,
    pub store: ReportStore,
    pub metrics: Arc<Metrics>,
    pub form_limits: FormLimits,
    pub key_status: Vec<(&'static str, String)>,
}

pub fn router<A: Analyzer>(state: Arc<AppState<A>>) -> Router {
    Router::new()
        .route("/", get(index::<A>))
        .route("/analyze", post(analyze_form::<A>))
        .route("/reports/:id", get(show_report::<A>))
        .route("/reports/:id/export/:format", get(export_report::<A>))
        .route("/api/reports", post(create_report::<A>))
        .route("/health", get(health_check))
        .route("/stats", get(get_stats::<A>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AnalyzeForm {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    job_posting_text: String,
}

#[derive(Serialize)]
struct CreatedReport {
    id: Uuid,
    report: Report,
}

/// Form-level minimums, stricter than what `Query` itself accepts.
fn validate_form(form: &AnalyzeForm, limits: FormLimits) -> Vec<String> {
    let mut errors = Vec::new();
    if form.company_name.trim().chars().count() < limits.min_company_chars {
        errors.push(format!(
            "Company name must be at least {} characters.",
            limits.min_company_chars
        ));
    }
    if form.job_posting_text.trim().chars().count() < limits.min_posting_chars {
        errors.push(format!(
            "Job posting must be at least {} characters.",
            limits.min_posting_chars
        ));
    }
    errors
}

async fn index<A: Analyzer>(State(state): State<Arc<AppState<A>>>) -> Html<String> {
    Html(ui::index_page(&FormView::default(), &state.key_status))
}

/// Run the analyzer and book-keep the outcome. Successful reports are stored.
async fn run_analysis<A: Analyzer>(
    state: &AppState<A>,
    query: &Query,
) -> Result<(Uuid, Arc<Report>), PipelineError> {
    let timer = TimedOperation::start();
    let company = query.company_name().to_string();

    let result = state
        .analyzer
        .analyze(query, |stage| debug!(company = %company, stage = %stage, "Run progress"))
        .await;

    match result {
        Ok(report) => {
            state.metrics.record_success(
                timer.elapsed(),
                report.step1_output.char_count(),
                report.step2_output.char_count(),
            );
            let report = Arc::new(report);
            let id = state.store.insert(Arc::clone(&report));
            info!(company = %company, report_id = %id, "Report stored");
            Ok((id, report))
        }
        Err(e) => {
            state.metrics.record_failure(timer.elapsed(), e.stage);
            Err(e)
        }
    }
}

async fn analyze_form<A: Analyzer>(
    State(state): State<Arc<AppState<A>>>,
    Form(form): Form<AnalyzeForm>,
) -> Response {
    let mut errors = validate_form(&form, state.form_limits);
    let query = match Query::new(form.company_name.as_str(), form.job_posting_text.as_str()) {
        Ok(query) if errors.is_empty() => Some(query),
        Ok(_) => None,
        Err(e) => {
            if errors.is_empty() {
                errors.push(e.to_string());
            }
            None
        }
    };

    let Some(query) = query else {
        let view = FormView {
            company_name: form.company_name,
            job_posting_text: form.job_posting_text,
            errors,
        };
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(ui::index_page(&view, &state.key_status)),
        )
            .into_response();
    };

    match run_analysis(&state, &query).await {
        Ok((id, _)) => Redirect::to(&format!("/reports/{id}")).into_response(),
        Err(e) => {
            let view = FormView {
                company_name: form.company_name,
                job_posting_text: form.job_posting_text,
                errors: vec![format!("Analysis failed at {}: {}", e.stage, e.cause)],
            };
            (
                StatusCode::BAD_GATEWAY,
                Html(ui::index_page(&view, &state.key_status)),
            )
                .into_response()
        }
    }
}

async fn show_report<A: Analyzer>(
    State(state): State<Arc<AppState<A>>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.store.get(&id) {
        Some(report) => Html(ui::report_page(id, &report)).into_response(),
        None => (StatusCode::NOT_FOUND, Html(ui::not_found_page())).into_response(),
    }
}

async fn export_report<A: Analyzer>(
    State(state): State<Arc<AppState<A>>>,
    Path((id, format)): Path<(Uuid, String)>,
) -> Response {
    let Ok(format) = format.parse::<ExportFormat>() else {
        return (StatusCode::NOT_FOUND, format!("Unknown export format: {format}")).into_response();
    };
    let Some(report) = state.store.get(&id) else {
        return (StatusCode::NOT_FOUND, Html(ui::not_found_page())).into_response();
    };

    match export(&report, format) {
        Ok(bytes) => {
            let filename = export_filename(&report.company_name, report.generated_at, format);
            (
                [
                    (header::CONTENT_TYPE, format.mime_type().to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            warn!(report_id = %id, format = %format, error = %e, "Export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn create_report<A: Analyzer>(
    State(state): State<Arc<AppState<A>>>,
    Json(query): Json<Query>,
) -> Response {
    match run_analysis(&state, &query).await {
        Ok((id, report)) => (
            StatusCode::CREATED,
            Json(CreatedReport {
                id,
                report: report.as_ref().clone(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "stage": e.stage, "error": e.cause.to_string() })),
        )
            .into_response(),
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_stats<A: Analyzer>(State(state): State<Arc<AppState<A>>>) -> Json<serde_json::Value> {
    Json(json!({
        "runs": state.metrics.snapshot(),
        "stored_reports": state.store.len(),
    }))
}
