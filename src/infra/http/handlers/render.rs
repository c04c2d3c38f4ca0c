//! Render handlers

use std::str::FromStr;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use framehouse_api_types::{RenderResponse, RenderStillRequest, RenderVideoRequest};
use serde_json::{Map, Value};

use crate::application::render::{RenderOutcome, RenderRequest};
use crate::domain::composition::{Codec, CompositionKind};
use crate::infra::http::error::ApiError;
use crate::infra::http::state::HttpState;

const SOURCE_VIDEO: &str = "infra::http::render_video";
const SOURCE_STILL: &str = "infra::http::render_still";

pub async fn render_video(
    State(state): State<HttpState>,
    payload: Result<Json<RenderVideoRequest>, JsonRejection>,
) -> Result<Json<RenderResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::from_rejection(SOURCE_VIDEO, rejection))?;

    let codec = body
        .codec
        .as_deref()
        .map(Codec::from_str)
        .transpose()
        .map_err(|err| ApiError::bad_request(SOURCE_VIDEO, err.to_string()))?;
    let input_props = props_object(SOURCE_VIDEO, body.input_props)?;

    let request = RenderRequest::new(body.composition_id, CompositionKind::Video)
        .with_props(input_props)
        .with_cache(body.composition_cache.unwrap_or(false))
        .with_codec(codec);

    execute(SOURCE_VIDEO, &state, request).await
}

pub async fn render_still(
    State(state): State<HttpState>,
    payload: Result<Json<RenderStillRequest>, JsonRejection>,
) -> Result<Json<RenderResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| ApiError::from_rejection(SOURCE_STILL, rejection))?;
    let input_props = props_object(SOURCE_STILL, body.input_props)?;

    let request = RenderRequest::new(body.composition_id, CompositionKind::Still)
        .with_props(input_props)
        .with_cache(body.composition_cache.unwrap_or(false));

    execute(SOURCE_STILL, &state, request).await
}

async fn execute(
    source: &'static str,
    state: &HttpState,
    request: RenderRequest,
) -> Result<Json<RenderResponse>, ApiError> {
    let RenderOutcome { artifact, cached } = state
        .renders
        .render(request)
        .await
        .map_err(|err| ApiError::from_render(source, &err))?;

    Ok(Json(RenderResponse {
        success: true,
        url: format!("/renders/{}", artifact.filename),
        filename: artifact.filename,
        cached,
    }))
}

fn props_object(
    source: &'static str,
    input_props: Option<Value>,
) -> Result<Map<String, Value>, ApiError> {
    match input_props {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ApiError::bad_request(
            source,
            "inputProps must be a JSON object",
        )),
    }
}
