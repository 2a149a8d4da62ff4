//! `/submissions/*` (§4.6/§6): the judge's only write surface. Thin over
//! `judge_core::service::SubmissionService` — every handler here just
//! extracts/validates HTTP-shaped input and reshapes the service's output
//! through the base64 transport boundary.

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::DateTime;
use chrono::Utc;
use judge_core::service::CreateOutcome;
use judge_protocol::base64_transport;
use judge_protocol::error::JudgeError;
use judge_protocol::pagination::Page;
use judge_protocol::pagination::PageQuery;
use judge_protocol::submission::CreateSubmissionRequest;
use judge_protocol::submission::SandboxLimits;
use judge_protocol::submission::Submission;
use judge_protocol::submission::SubmissionMeta;
use judge_protocol::submission::SubmissionStatus;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AdditionalFileView {
    pub name: String,
    pub content: String,
}

/// The HTTP-facing shape of a submission: every byte field is a string,
/// encoded or left as raw UTF-8 depending on `base64_encoded` (§6).
#[derive(Serialize)]
pub struct SubmissionView {
    pub id: Uuid,
    pub language_id: i16,
    pub source_code: String,
    pub stdin: Option<String>,
    pub expected_output: Option<String>,
    pub additional_files: Vec<AdditionalFileView>,
    #[serde(flatten)]
    pub limits: SandboxLimits,
    pub status: SubmissionStatus,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub meta: Option<SubmissionMeta>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionView {
    fn from_submission(s: &Submission, base64_encoded: bool) -> Self {
        Self {
            id: s.id,
            language_id: s.language_id,
            source_code: base64_transport::encode_field(&s.source_code, base64_encoded),
            stdin: base64_transport::encode_optional_field(s.stdin.as_deref(), base64_encoded),
            expected_output: base64_transport::encode_optional_field(s.expected_output.as_deref(), base64_encoded),
            additional_files: s
                .additional_files
                .iter()
                .map(|f| AdditionalFileView {
                    name: f.name.clone(),
                    content: base64_transport::encode_field(&f.content, base64_encoded),
                })
                .collect(),
            limits: s.limits,
            status: s.status,
            stdout: base64_transport::encode_optional_field(s.stdout.as_deref(), base64_encoded),
            stderr: base64_transport::encode_optional_field(s.stderr.as_deref(), base64_encoded),
            compile_output: base64_transport::encode_optional_field(s.compile_output.as_deref(), base64_encoded),
            meta: s.meta.clone(),
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct CreatedId {
    pub id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateQuery {
    #[serde(default)]
    wait: bool,
    #[serde(default)]
    base64_encoded: bool,
}

#[derive(Deserialize)]
pub struct Base64Query {
    #[serde(default)]
    base64_encoded: bool,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    judge_protocol::pagination::DEFAULT_PAGE_SIZE
}

/// `serde_urlencoded` (which axum's `Query` extractor uses) does not support
/// `#[serde(flatten)]` reliably, so this mirrors `PageQuery`'s fields rather
/// than flattening it.
#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default)]
    base64_encoded: bool,
}

#[derive(Deserialize)]
pub struct BatchGetQuery {
    ids: String,
    #[serde(default)]
    base64_encoded: bool,
}

pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Json(payload): Json<CreateSubmissionRequest>,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    let outcome = match state
        .service
        .create_submission(payload, query.base64_encoded, query.wait, state.wait_mode_timeout)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return ApiError(e).into_response(),
    };

    match outcome {
        CreateOutcome::Accepted(id) => (StatusCode::CREATED, Json(CreatedId { id })).into_response(),
        CreateOutcome::Finished(submission) => {
            (StatusCode::CREATED, Json(SubmissionView::from_submission(&submission, query.base64_encoded))).into_response()
        }
        CreateOutcome::TimedOut(id) => {
            tracing::info!(submission_id = %id, "wait-mode deadline elapsed, submission still running");
            ApiError(JudgeError::WaitTimeout).into_response()
        }
    }
}

pub async fn create_batch(
    State(state): State<AppState>,
    Query(query): Query<Base64Query>,
    Json(payloads): Json<Vec<CreateSubmissionRequest>>,
) -> Result<(StatusCode, Json<Vec<CreatedId>>), ApiError> {
    let ids = state.service.create_batch(payloads, query.base64_encoded).await?;
    Ok((StatusCode::CREATED, Json(ids.into_iter().map(|id| CreatedId { id }).collect())))
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> axum::response::Response {
    use axum::response::IntoResponse;

    let (page_num, page_size) = match (PageQuery { page: query.page, page_size: query.page_size }).validate() {
        Ok(pair) => pair,
        Err(msg) => return crate::error::UnprocessableEntity(msg).into_response(),
    };

    let page = match state.service.list_submissions(page_num, page_size).await {
        Ok(page) => page,
        Err(e) => return ApiError(e).into_response(),
    };

    Json(Page {
        items: page
            .items
            .iter()
            .map(|s| SubmissionView::from_submission(s, query.base64_encoded))
            .collect(),
        total_items: page.total_items,
        total_pages: page.total_pages,
        current_page: page.current_page,
        page_size: page.page_size,
    })
    .into_response()
}

pub async fn get_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchGetQuery>,
) -> Result<Json<Vec<SubmissionView>>, ApiError> {
    let mut ids = Vec::new();
    for raw in query.ids.split(',').filter(|s| !s.is_empty()) {
        let id = Uuid::parse_str(raw.trim()).map_err(|e| JudgeError::validation(format!("malformed id {raw:?}: {e}")))?;
        ids.push(id);
    }

    let submissions = state.service.get_batch(&ids).await?;
    Ok(Json(
        submissions
            .iter()
            .map(|s| SubmissionView::from_submission(s, query.base64_encoded))
            .collect(),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<Base64Query>,
) -> Result<Json<SubmissionView>, ApiError> {
    let submission = state.service.get_submission(id).await?;
    Ok(Json(SubmissionView::from_submission(&submission, query.base64_encoded)))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.service.delete_submission(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
