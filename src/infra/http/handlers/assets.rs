use axum::Json;
use axum::extract::State;
use framehouse_api_types::AssetsResponse;

use crate::infra::http::state::HttpState;

pub async fn list_assets(State(state): State<HttpState>) -> Json<AssetsResponse> {
    let (assets, usage) = state.assets.catalog().await;
    Json(AssetsResponse {
        success: true,
        assets,
        usage,
    })
}
