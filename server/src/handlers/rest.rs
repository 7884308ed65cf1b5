/// REST API handlers for HTTP endpoints.

use actix_web::{HttpResponse, Result as ActixResult};
use serde_json::json;

/// Health check
/// GET /health
pub async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}
