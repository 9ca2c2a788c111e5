use mongodb::bson::{doc, Bson};
use serde_json::json;

use crate::{
    database::{records_to_json, FindOptions, QueryHelper, STORYBOARDS},
    models::{public_video_path, ApiResponse, GenerateStoryboardRequest, Pagination, Storyboard},
    services::video_service::VideoGenerator,
    utils::AppError,
};

/// Renders the story, stores the record and echoes it back.
pub async fn generate(
    db: &QueryHelper,
    generator: &dyn VideoGenerator,
    request: GenerateStoryboardRequest,
) -> ApiResponse {
    if request.story.trim().is_empty() {
        return AppError::Validation("Story is required".to_string()).into();
    }

    let raw_path = match generator.generate(&request.story).await {
        Ok(path) => path,
        Err(e) => {
            log::error!("❌ Video generation failed: {}", e);
            return e.into();
        }
    };

    let storyboard = Storyboard {
        username: request.username,
        story: request.story,
        video: public_video_path(&raw_path).to_string(),
    };

    let document = doc! {
        "story": storyboard.story.as_str(),
        "username": storyboard.username.as_deref().map_or(Bson::Null, Bson::from),
        "video": storyboard.video.as_str(),
    };

    if let Err(e) = db.insert_one(STORYBOARDS, document).await {
        log::error!("❌ Storing storyboard failed: {}", e);
        return e.into();
    }

    log::info!(
        "✅ Storyboard generated for {}: {}",
        storyboard.username.as_deref().unwrap_or("anonymous"),
        storyboard.video
    );

    ApiResponse::success(201, "Storyboard generated successfully", json!(storyboard))
}

/// Newest ten storyboards of `username`, with the overall count.
pub async fn get_by_user(db: &QueryHelper, username: &str) -> ApiResponse {
    let filter = doc! { "username": username };
    let options = FindOptions::default();
    let size = options.limit.unwrap_or_default().max(0) as u64;

    let storyboards = match db.find(STORYBOARDS, filter.clone(), options).await {
        Ok(found) => found,
        Err(e) => {
            log::error!("❌ Listing storyboards failed: {}", e);
            return e.into();
        }
    };

    if storyboards.is_empty() {
        log::warn!("❌ No storyboards for '{}'", username);
        return AppError::NotFound("No storyboard found for this user.".to_string()).into();
    }

    let total = match db.count_documents(STORYBOARDS, filter).await {
        Ok(total) => total,
        Err(e) => {
            log::error!("❌ Counting storyboards failed: {}", e);
            return e.into();
        }
    };

    ApiResponse::paginated(
        200,
        "Storyboards retrieved successfully",
        records_to_json(&storyboards),
        Pagination::new(1, size, total),
    )
}
