use axum::Json;
use framehouse_api_types::HealthResponse;
use time::OffsetDateTime;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Render server is running".to_string(),
        timestamp: OffsetDateTime::now_utc(),
    })
}
