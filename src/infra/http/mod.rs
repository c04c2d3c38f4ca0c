//! HTTP surface: JSON endpoints plus static serving of renders and public assets.

mod error;
mod handlers;
mod middleware;
mod state;

pub use error::ApiError;
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use state::HttpState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Uri,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use self::middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState, body_limit: usize) -> Router {
    let public = ServeDir::new(state.assets.public_dir());

    Router::new()
        .route("/render/video", post(handlers::render_video))
        .route("/render/still", post(handlers::render_still))
        .route("/compositions", get(handlers::list_compositions))
        .route("/renders", get(handlers::list_renders))
        .route(
            "/renders/{filename}",
            get(handlers::serve_render).delete(handlers::delete_render),
        )
        .route("/upload/image", post(handlers::upload_image))
        .route("/assets", get(handlers::list_assets))
        .route("/health", get(handlers::health))
        .nest_service("/public", public)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(CorsLayer::permissive())
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    ApiError::not_found(
        "infra::http::fallback",
        format!("no route for {}", uri.path()),
    )
}
