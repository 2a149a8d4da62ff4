//! `/languages/*` (§4.2/§6): a read-only view over the bundled Language
//! Catalog.

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use judge_protocol::language::LanguageSummary;

use crate::error::ApiError;
use crate::state::AppState;
use judge_protocol::error::JudgeError;

pub async fn list(State(state): State<AppState>) -> Json<Vec<LanguageSummary>> {
    Json(state.catalog.list())
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i16>) -> Result<Json<LanguageSummary>, ApiError> {
    state
        .catalog
        .get(id)
        .map(LanguageSummary::from)
        .map(Json)
        .ok_or_else(|| ApiError(JudgeError::NotFound))
}
