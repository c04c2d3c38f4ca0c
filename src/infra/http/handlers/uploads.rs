//! Uploads handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use framehouse_api_types::{UploadImageRequest, UploadImageResponse};

use crate::infra::http::error::ApiError;
use crate::infra::http::state::HttpState;

pub async fn upload_image(
    State(state): State<HttpState>,
    payload: Result<Json<UploadImageRequest>, JsonRejection>,
) -> Result<Json<UploadImageResponse>, ApiError> {
    const SOURCE: &str = "infra::http::upload_image";

    let Json(body) = payload.map_err(|rejection| ApiError::from_rejection(SOURCE, rejection))?;
    let saved = state
        .uploads
        .save_inline_image(&body.base64_data)
        .await
        .map_err(|err| ApiError::from_upload(SOURCE, &err))?;

    Ok(Json(UploadImageResponse {
        success: true,
        url: format!("/public/{}", saved.filename),
        filename: saved.filename,
    }))
}
