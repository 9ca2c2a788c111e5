use actix_web::web;

use crate::{
    database::QueryHelper,
    models::{
        ApiResponse, ErrorResponse, GenerateStoryboardRequest, PaginatedSuccessResponse,
        StoryboardQuery, SuccessResponse,
    },
    services::{storyboard_service, VideoGenerator},
};

#[utoipa::path(
    post,
    path = "/storyboard/generate",
    tag = "Storyboard",
    request_body = GenerateStoryboardRequest,
    responses(
        (status = 201, description = "Storyboard generated", body = SuccessResponse),
        (status = 400, description = "Missing story", body = ErrorResponse),
        (status = 502, description = "Video generation failed", body = ErrorResponse)
    )
)]
pub async fn generate(
    db: web::Data<QueryHelper>,
    generator: web::Data<dyn VideoGenerator>,
    request: web::Json<GenerateStoryboardRequest>,
) -> ApiResponse {
    log::info!(
        "🎬 POST /storyboard/generate - username: {}",
        request.username.as_deref().unwrap_or("anonymous")
    );
    storyboard_service::generate(&db, &**generator, request.into_inner()).await
}

#[utoipa::path(
    get,
    path = "/storyboard/get_storyboards",
    tag = "Storyboard",
    params(StoryboardQuery),
    responses(
        (status = 200, description = "Storyboards retrieved", body = PaginatedSuccessResponse),
        (status = 404, description = "No storyboard for this user", body = ErrorResponse)
    )
)]
pub async fn get_storyboards(
    db: web::Data<QueryHelper>,
    query: web::Query<StoryboardQuery>,
) -> ApiResponse {
    log::info!("📚 GET /storyboard/get_storyboards - username: {}", query.username);
    storyboard_service::get_by_user(&db, &query.username).await
}
