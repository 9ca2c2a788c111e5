use serde::{Deserialize, Serialize};

/// Body of `POST /storyboard/generate`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct GenerateStoryboardRequest {
    #[serde(default)]
    pub username: Option<String>,
    pub story: String,
}

/// Query of `GET /storyboard/get_storyboards`.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct StoryboardQuery {
    pub username: String,
}

/// A storyboard as persisted and as echoed back after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Storyboard {
    pub username: Option<String>,
    pub story: String,
    pub video: String,
}

/// Prefix the video generator writes under; stored paths are relative to it.
pub const FRONTEND_PREFIX: &str = "frontend/";

/// Drops a leading `frontend/` so the path resolves under the static mount.
pub fn public_video_path(path: &str) -> &str {
    path.strip_prefix(FRONTEND_PREFIX).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_video_path() {
        assert_eq!(public_video_path("frontend/out/vid.mp4"), "out/vid.mp4");
        assert_eq!(public_video_path("out/vid.mp4"), "out/vid.mp4");
        assert_eq!(public_video_path("assets/frontend/vid.mp4"), "assets/frontend/vid.mp4");
    }
}
