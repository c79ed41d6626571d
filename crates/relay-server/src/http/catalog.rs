use axum::Json;
use axum::extract::State;
use shared::llm::catalog::list_models_response;
use shared::models::ListModelsResponse;

use super::AppState;

pub(super) async fn list_models(State(state): State<AppState>) -> Json<ListModelsResponse> {
    Json(list_models_response(&state.upstream.config().default_model))
}
