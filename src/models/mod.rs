pub mod response;
pub mod storyboard;
pub mod user;

pub use response::*;
pub use storyboard::*;
pub use user::*;
