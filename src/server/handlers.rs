//! HTTP handlers for the six endpoints spec §6 requires of the core.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::agent_runtime::AgentRuntime;
use crate::error::OrchestratorError;
use crate::governor::with_timeout;
use crate::meta_graph::MetaGraph;
use crate::progress_tracker::ProgressTracker;
use crate::task::{Task, VerificationReport};
use crate::team_graph::TeamGraph;
use crate::tools::{style_score_report, technical_score_report};

use super::state::AppState;

const VALID_AUDIENCES: &[&str] = &["academic", "professional", "general"];
const VALID_TONES: &[&str] = &["professional", "casual", "enthusiastic", "academic"];

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": {
                "kind": format!("{:?}", self.kind),
                "message": self.message,
                "details": self.details,
            }
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub paper_title: String,
    pub additional_context: Option<String>,
    pub target_audience: Option<String>,
    pub tone: Option<String>,
    pub include_technical_details: Option<bool>,
    pub max_hashtags: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
    pub estimated_completion_time: String,
}

fn validate_generate_request(req: &GenerateRequest) -> Result<(), OrchestratorError> {
    let len = req.paper_title.chars().count();
    if !(5..=500).contains(&len) {
        return Err(OrchestratorError::validation("paper_title must be between 5 and 500 characters"));
    }
    if let Some(max_hashtags) = req.max_hashtags {
        if !(1..=20).contains(&max_hashtags) {
            return Err(OrchestratorError::validation("max_hashtags must be between 1 and 20"));
        }
    }
    if let Some(ref audience) = req.target_audience {
        if !VALID_AUDIENCES.contains(&audience.as_str()) {
            return Err(OrchestratorError::validation(format!("target_audience must be one of {:?}", VALID_AUDIENCES)));
        }
    }
    if let Some(ref tone) = req.tone {
        if !VALID_TONES.contains(&tone.as_str()) {
            return Err(OrchestratorError::validation(format!("tone must be one of {:?}", VALID_TONES)));
        }
    }
    Ok(())
}

pub async fn generate_post(State(state): State<Arc<AppState>>, Json(req): Json<GenerateRequest>) -> Result<impl IntoResponse, OrchestratorError> {
    validate_generate_request(&req)?;
    let task_id = Uuid::new_v4().to_string();
    let request_data = serde_json::to_value(&req).map_err(OrchestratorError::from)?;

    let tracker = ProgressTracker::new(task_id.clone(), request_data, state.store.clone(), state.config.store_ttl()).await?;

    tokio::spawn(run_generation_job(state.clone(), tracker));

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            task_id,
            status: "PENDING".to_string(),
            message: "task accepted".to_string(),
            estimated_completion_time: (Utc::now() + chrono::Duration::seconds(120)).to_rfc3339(),
        }),
    ))
}

/// Runs one full generation job: acquires a generation permit, initializes team state, then
/// drives the MetaGraph to completion. Errors are already written to the Task by the graph; this
/// only needs to release the permit on every exit path, which the RAII [`crate::governor::Permit`]
/// guarantees.
async fn run_generation_job(state: Arc<AppState>, tracker: Arc<ProgressTracker>) {
    let permit = match state.governor.acquire_generation(&state.shutdown).await {
        Ok(permit) => permit,
        Err(e) => {
            log::warn!("task {}: could not acquire generation permit: {}", tracker.task_id(), e);
            return;
        }
    };

    if let Err(e) = tracker.initialize_teams().await {
        log::error!("task {}: failed to initialize teams: {}", tracker.task_id(), e);
        drop(permit);
        return;
    }

    let runtime = Arc::new(AgentRuntime::new(state.llm_client.clone(), state.tools.clone(), state.retry_policy, state.config.max_tool_rounds));
    let content_team = TeamGraph::new(runtime.clone(), state.config.team_recursion_limit);
    let verification_team = TeamGraph::new(runtime, state.config.team_recursion_limit);
    let meta_graph = MetaGraph::new(content_team, verification_team, state.config.meta_recursion_limit);

    let llm_client = state.llm_client.as_ref();
    if let Err(e) = meta_graph.run(llm_client, llm_client, llm_client, &tracker, &state.shutdown).await {
        log::warn!("task {}: generation job ended with error: {}", tracker.task_id(), e);
    }

    drop(permit);
}

pub async fn get_status(State(state): State<Arc<AppState>>, Path(task_id): Path<String>) -> Result<Json<Task>, OrchestratorError> {
    state.store.get(&task_id).await?.map(Json).ok_or_else(|| OrchestratorError::not_found(format!("unknown task_id {}", task_id)))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, OrchestratorError> {
    Ok(Json(state.store.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub post_content: String,
    pub paper_reference: Option<String>,
    pub verification_type: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    #[serde(flatten)]
    pub report: VerificationReport,
    pub verification_id: String,
    pub verified_at: String,
}

pub async fn verify_post(State(state): State<Arc<AppState>>, Json(req): Json<VerifyRequest>) -> Result<Json<VerifyResponse>, OrchestratorError> {
    if !["technical", "style", "both"].contains(&req.verification_type.as_str()) {
        return Err(OrchestratorError::validation("verification_type must be one of technical, style, both"));
    }

    let _permit = state.governor.acquire_verification(&state.shutdown).await?;
    let reference = req.paper_reference.clone().unwrap_or_default();

    let report = with_timeout(Some(state.config.verification_timeout()), &state.shutdown, async {
        let technical = if req.verification_type != "style" {
            technical_score_report(&req.post_content, &reference)
        } else {
            crate::task::ScoreReport { score: 1.0, issues: vec![], suggestions: vec![] }
        };
        let style = if req.verification_type != "technical" {
            style_score_report(&req.post_content)
        } else {
            crate::task::ScoreReport { score: 1.0, issues: vec![], suggestions: vec![] }
        };
        Ok(VerificationReport::new(technical, style))
    })
    .await?;

    Ok(Json(VerifyResponse { report, verification_id: Uuid::new_v4().to_string(), verified_at: Utc::now().to_rfc3339() }))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub papers: Vec<GenerateRequest>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch_id: String,
    pub total_posts: usize,
    pub task_ids: Vec<String>,
}

pub async fn batch_generate(State(state): State<Arc<AppState>>, Json(req): Json<BatchRequest>) -> Result<impl IntoResponse, OrchestratorError> {
    for paper in &req.papers {
        validate_generate_request(paper)?;
    }

    let mut task_ids = Vec::with_capacity(req.papers.len());
    for paper in req.papers {
        let task_id = Uuid::new_v4().to_string();
        let request_data = serde_json::to_value(&paper).map_err(OrchestratorError::from)?;
        let tracker = ProgressTracker::new(task_id.clone(), request_data, state.store.clone(), state.config.store_ttl()).await?;
        tokio::spawn(run_generation_job(state.clone(), tracker));
        task_ids.push(task_id);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse { batch_id: Uuid::new_v4().to_string(), total_posts: task_ids.len(), task_ids }),
    ))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HealthServices,
}

#[derive(Debug, Serialize)]
pub struct HealthServices {
    pub llm: String,
    pub search: String,
    pub store: String,
}

/// Probes a collaborator and renders its reachability as a `/health` status string. Configuration
/// absence is reported distinctly from a failed network round trip so operators can tell
/// "never set up" apart from "set up but down".
async fn probe<F, Fut, E>(configured: bool, probe: F) -> String
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    if !configured {
        return "unconfigured".to_string();
    }
    match probe().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("unreachable: {}", e),
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm = probe(!state.config.llm_api_key.is_empty(), || state.llm_client.ping()).await;
    let search = probe(state.config.search_api_key.is_some(), || state.search_client.ping()).await;
    let store = probe(true, || state.store.ping()).await;

    let status = if [&llm, &search, &store].iter().any(|s| s.starts_with("unreachable")) { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: HealthServices { llm, search, store },
    })
}
