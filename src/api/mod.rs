pub mod health;
pub mod metrics;
pub mod storyboards;
pub mod swagger;
pub mod users;

use actix_web::{error::InternalError, web};

use crate::models::ApiResponse;

/// Malformed bodies and query strings answer with the error envelope
/// instead of actix's plain-text default.
fn bad_request(err: impl std::fmt::Display + std::fmt::Debug + 'static) -> actix_web::Error {
    let message = err.to_string();
    log::warn!("❌ Rejected request payload: {}", message);
    let response = ApiResponse::error(400, "Invalid request")
        .with_detail(message)
        .into_http();
    InternalError::from_response(err, response).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| bad_request(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_request(err)))
        .route("/", web::get().to(health::root))
        .route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/user")
                .route("/signup", web::post().to(users::signup))
                .route("/login", web::post().to(users::login))
                .route("/all_users", web::get().to(users::all_users))
                .route("/delete_user/{username}", web::delete().to(users::delete_user)),
        )
        .service(
            web::scope("/storyboard")
                .route("/generate", web::post().to(storyboards::generate))
                .route("/get_storyboards", web::get().to(storyboards::get_storyboards)),
        );
}
