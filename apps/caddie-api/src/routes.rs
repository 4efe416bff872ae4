use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::Serialize;
use uuid::Uuid;

use caddie_domain::{KnowledgeEntry, Suggestion};
use caddie_engine::{EngineError, KnowledgeInput, SuggestRequest, SuggestResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/suggestions", post(suggest))
		.route("/v1/suggestions/{id}/used", post(mark_used))
		.route("/v1/conversations/{id}/suggestions", get(conversation_suggestions))
		.route("/v1/knowledge", post(create_knowledge).get(list_knowledge))
		.route("/v1/knowledge/{id}", put(update_knowledge).delete(delete_knowledge))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn suggest(
	State(state): State<AppState>,
	Json(payload): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>, ApiError> {
	let response = state.engine.suggest(payload).await?;
	Ok(Json(response))
}

async fn conversation_suggestions(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
	let suggestions = state.engine.suggestions_for(id).await?;
	Ok(Json(suggestions))
}

async fn mark_used(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.engine.mark_suggestion_used(id).await?;
	Ok(StatusCode::NO_CONTENT)
}

async fn create_knowledge(
	State(state): State<AppState>,
	Json(payload): Json<KnowledgeInput>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
	let entry = state.engine.create_knowledge(payload).await?;
	Ok(Json(entry))
}

async fn list_knowledge(
	State(state): State<AppState>,
) -> Result<Json<Vec<KnowledgeEntry>>, ApiError> {
	let entries = state.engine.list_knowledge().await?;
	Ok(Json(entries))
}

async fn update_knowledge(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(payload): Json<KnowledgeInput>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
	let entry = state.engine.update_knowledge(id, payload).await?;
	Ok(Json(entry))
}

async fn delete_knowledge(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.engine.delete_knowledge(id).await?;
	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}

impl From<EngineError> for ApiError {
	fn from(err: EngineError) -> Self {
		let (status, error_code) = match &err {
			EngineError::InputInvalid { .. } =>
				(StatusCode::UNPROCESSABLE_ENTITY, "INPUT_INVALID"),
			EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
			EngineError::Provider { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
			EngineError::Store { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
		};

		Self { status, error_code, message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
