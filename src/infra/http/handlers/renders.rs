//! Rendered artifact handlers

use std::path::Path as FsPath;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use framehouse_api_types::{MessageResponse, RenderFileSummary, RenderFileType, RendersResponse};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::domain::composition::CompositionKind;
use crate::infra::http::error::ApiError;
use crate::infra::http::state::HttpState;

pub async fn list_renders(State(state): State<HttpState>) -> Json<RendersResponse> {
    let files = state
        .artifacts()
        .list_files()
        .await
        .into_iter()
        .map(|file| RenderFileSummary {
            filename: file.filename,
            size: file.size,
            created: file.created,
            modified: file.modified,
            file_type: match file.kind {
                CompositionKind::Video => RenderFileType::Video,
                CompositionKind::Still => RenderFileType::Image,
            },
        })
        .collect();

    Json(RendersResponse {
        success: true,
        files,
    })
}

pub async fn delete_render(
    State(state): State<HttpState>,
    Path(filename): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    const SOURCE: &str = "infra::http::delete_render";

    if !is_artifact_name(&filename) {
        return Err(ApiError::bad_request(
            SOURCE,
            format!("invalid render filename `{filename}`"),
        ));
    }

    match state.artifacts().remove(&filename).await {
        Ok(true) => Ok(Json(MessageResponse {
            success: true,
            message: format!("Deleted {filename}"),
        })),
        Ok(false) => Err(ApiError::not_found(
            SOURCE,
            format!("render `{filename}` not found"),
        )),
        Err(err) => Err(ApiError::internal(SOURCE, &err)),
    }
}

pub async fn serve_render(
    State(state): State<HttpState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    const SOURCE: &str = "infra::http::serve_render";

    if !is_artifact_name(&filename) {
        return ApiError::not_found(SOURCE, "render not found").into_response();
    }

    let path = state.artifacts().path_for(&filename);
    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return ApiError::not_found(SOURCE, format!("render `{filename}` not found"))
            .into_response();
    }
    response
}

/// A bare `.png`/`.mp4` filename that cannot escape the renders directory.
fn is_artifact_name(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && !filename.contains("..")
        && FsPath::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(CompositionKind::from_extension)
            .is_some()
}

#[cfg(test)]
mod tests {
    use super::is_artifact_name;

    #[test]
    fn artifact_names_are_restricted() {
        assert!(is_artifact_name("Intro_2026-10-18T09-30-12-345Z.png"));
        assert!(is_artifact_name("Intro_2026-10-18T09-30-12-345Z.mp4"));
        assert!(!is_artifact_name(".framehouse-index.json"));
        assert!(!is_artifact_name("../secrets.png"));
        assert!(!is_artifact_name("notes.txt"));
        assert!(!is_artifact_name(""));
    }
}
