//! Composition discovery handler

use axum::Json;
use axum::extract::State;
use framehouse_api_types::{CompositionSummary, CompositionsResponse};
use serde_json::Value;

use crate::infra::http::error::ApiError;
use crate::infra::http::state::HttpState;

pub async fn list_compositions(
    State(state): State<HttpState>,
) -> Result<Json<CompositionsResponse>, ApiError> {
    const SOURCE: &str = "infra::http::list_compositions";

    let compositions = state
        .registry
        .list()
        .await
        .map_err(|err| ApiError::internal(SOURCE, &err))?
        .into_iter()
        .map(|descriptor| CompositionSummary {
            id: descriptor.id,
            default_props: Value::Object(descriptor.default_props),
        })
        .collect();
    let public_file_tree = state.assets.build_tree().await;

    Ok(Json(CompositionsResponse {
        success: true,
        compositions,
        public_file_tree,
    }))
}
