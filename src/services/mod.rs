pub mod storyboard_service;
pub mod user_service;
pub mod video_service;

pub use video_service::*;
