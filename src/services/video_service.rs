use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::AppError;

/// Turns a story into a rendered video and returns the file path.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, story: &str) -> Result<String, AppError>;
}

#[derive(Debug, Serialize)]
struct GenerateVideoRequest<'a> {
    story: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateVideoResponse {
    #[serde(alias = "path")]
    video_path: String,
}

/// Calls a rendering worker over HTTP: `POST {endpoint}` with
/// `{"story": ...}`, expecting `{"video_path": ...}` back.
pub struct HttpVideoGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVideoGenerator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl VideoGenerator for HttpVideoGenerator {
    async fn generate(&self, story: &str) -> Result<String, AppError> {
        log::info!("🎬 Requesting video render ({} chars)", story.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&GenerateVideoRequest { story })
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to reach video generator: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Video generator error: {}",
                response.status()
            )));
        }

        let body: GenerateVideoResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse video generator reply: {}", e)))?;

        if body.video_path.trim().is_empty() {
            return Err(AppError::Upstream("Video generator returned an empty path".to_string()));
        }

        log::info!("✅ Video rendered: {}", body.video_path);
        Ok(body.video_path)
    }
}

/// Stand-in used when no generator endpoint is configured.
pub struct DisabledVideoGenerator;

#[async_trait]
impl VideoGenerator for DisabledVideoGenerator {
    async fn generate(&self, _story: &str) -> Result<String, AppError> {
        Err(AppError::Upstream(
            "Video generation is not configured (set VIDEO_GENERATOR_URL)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_accepts_path_alias() {
        let reply: GenerateVideoResponse = serde_json::from_str(r#"{"path":"frontend/a.mp4"}"#).unwrap();
        assert_eq!(reply.video_path, "frontend/a.mp4");
        let reply: GenerateVideoResponse = serde_json::from_str(r#"{"video_path":"b.mp4"}"#).unwrap();
        assert_eq!(reply.video_path, "b.mp4");
    }

    #[tokio::test]
    async fn test_disabled_generator_is_upstream_error() {
        let err = DisabledVideoGenerator.generate("once upon a time").await.unwrap_err();
        assert_eq!(err.code(), 502);
    }

    #[tokio::test]
    async fn test_unreachable_generator_is_upstream_error() {
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let generator = HttpVideoGenerator::new("http://127.0.0.1:9/render");
        let err = generator.generate("story").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
