pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod mock_attempt;
pub mod revoked_token;
pub mod user;
pub mod video;
pub mod video_progress;
