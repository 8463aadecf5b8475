use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{error, warn};

use super::pages;
use crate::errors::PipelineError;
use crate::pipeline::{Pipeline, RunReport};
use crate::workspace::WorkspaceStatus;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub pipeline: Pipeline,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

/// Form body of every web step.
#[derive(Deserialize)]
pub struct SequenceForm {
    pub sequence: String,
}

#[derive(Deserialize)]
pub struct CreateRunRequest {
    pub sequence: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    BadRequest(String),
    /// An external tool could not be launched or exited non-zero.
    ToolFailed(String),
    /// An external tool ran but its output could not be parsed.
    Unparseable(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ToolFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unparseable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::ToolFailed(msg)
            | ApiError::Unparseable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let msg = err.to_string();
        match err {
            PipelineError::ToolLaunch { .. } | PipelineError::ToolFailed { .. } => {
                error!(error = %msg, "External tool failed");
                ApiError::ToolFailed(msg)
            }
            PipelineError::Parse { .. } => {
                error!(error = %msg, "Upstream tool produced unparseable output");
                ApiError::Unparseable(msg)
            }
            PipelineError::InvalidIdentity(_) => {
                warn!(error = %msg, "Rejected request");
                ApiError::BadRequest(msg)
            }
            PipelineError::Other(_) => {
                error!(error = %msg, "Pipeline error");
                ApiError::Internal(msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({"error": self.message()}))).into_response()
    }
}

/// Same error, rendered as an HTML page for the web flow.
pub struct PageError(ApiError);

impl From<PipelineError> for PageError {
    fn from(err: PipelineError) -> Self {
        PageError(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        (self.0.status(), Html(pages::error_page(self.0.message()))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/setup", post(setup))
        .route("/primer3-template", post(design_template))
        .route("/primer3-run", post(design_run))
        .route("/primersearch-run", post(search_run))
        .route("/api/runs", post(create_run))
        .route("/api/runs/{identity}", get(get_run_status))
        .route("/health", get(health))
}

// ── Web flow handlers ─────────────────────────────────────────────────

async fn index() -> Html<String> {
    Html(pages::index_page())
}

async fn setup(State(state): State<SharedState>, Form(form): Form<SequenceForm>) -> Html<String> {
    let run = state.pipeline.setup(&form.sequence);
    Html(pages::setup_page(&run))
}

async fn design_template(
    State(state): State<SharedState>,
    Form(form): Form<SequenceForm>,
) -> Html<String> {
    let pipeline = &state.pipeline;
    let run = pipeline.setup(&form.sequence);
    let template = pipeline.design_template(&run).await;
    let command = pipeline.design_command(&run);
    Html(pages::design_template_page(&run, &template, &command))
}

async fn design_run(
    State(state): State<SharedState>,
    Form(form): Form<SequenceForm>,
) -> Result<Html<String>, PageError> {
    let pipeline = &state.pipeline;
    let run = pipeline.setup(&form.sequence);
    let design = pipeline.run_design(&run).await?;
    let search_template = pipeline.search_template(&run, &design.primers).await;
    let search_command = pipeline.search_command(&run);
    Ok(Html(pages::design_output_page(
        &run,
        &design,
        &search_template,
        &search_command,
    )))
}

async fn search_run(
    State(state): State<SharedState>,
    Form(form): Form<SequenceForm>,
) -> Result<Html<String>, PageError> {
    let pipeline = &state.pipeline;
    let run = pipeline.setup(&form.sequence);
    let design = pipeline.run_design(&run).await?;
    let search = pipeline.run_search(&run, &design.primers).await?;
    Ok(Html(pages::search_output_page(&run, &search)))
}

// ── JSON API handlers ─────────────────────────────────────────────────

async fn create_run(
    State(state): State<SharedState>,
    Json(req): Json<CreateRunRequest>,
) -> Result<Json<RunReport>, ApiError> {
    let report = state.pipeline.execute(&req.sequence).await?;
    Ok(Json(report))
}

async fn get_run_status(
    State(state): State<SharedState>,
    Path(identity): Path<String>,
) -> Result<Json<WorkspaceStatus>, ApiError> {
    let status = state.pipeline.status(&identity)?;
    Ok(Json(status))
}

async fn health() -> &'static str {
    "ok"
}
