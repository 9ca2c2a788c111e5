use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::database::QueryHelper;

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Server is running", body = RootResponse)
    )
)]
pub async fn root() -> impl Responder {
    HttpResponse::Ok().json(RootResponse {
        message: "Server running".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(db: web::Data<QueryHelper>) -> impl Responder {
    let (status, database) = match db.ping().await {
        Ok(()) => ("healthy", "up".to_string()),
        Err(e) => {
            log::error!("❌ Health check: database unreachable: {}", e);
            ("degraded", "down".to_string())
        }
    };

    let body = HealthResponse {
        status: status.to_string(),
        service: "storyboard-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        timestamp: chrono::Utc::now().timestamp(),
    };

    if status == "healthy" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
