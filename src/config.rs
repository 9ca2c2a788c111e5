use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDB,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDB),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError(format!(
                "STORE_BACKEND must be 'mongodb' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(String);

/// Process settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub video_generator_url: Option<String>,
    pub video_dir: PathBuf,
    pub frontend_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = get("PORT", "8002");
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError(format!("PORT must be a port number, got '{}'", port)))?;

        let allowed_origins = get("ALLOWED_ORIGINS", "*")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty() && *origin != "*")
            .map(String::from)
            .collect();

        Ok(Self {
            host: get("HOST", "0.0.0.0"),
            port,
            store_backend: StoreBackend::parse(&get("STORE_BACKEND", "mongodb"))?,
            mongodb_uri: get("MONGODB_URI", "mongodb://localhost:27017"),
            mongodb_database: get("MONGODB_DATABASE", "AI_Story_Board"),
            allowed_origins,
            video_generator_url: lookup("VIDEO_GENERATOR_URL").filter(|url| !url.trim().is_empty()),
            video_dir: PathBuf::from(get("VIDEO_DIR", "frontend/generated_videos")),
            frontend_dir: PathBuf::from(get("FRONTEND_DIR", "frontend")),
        })
    }
}
