pub mod certificates;
pub mod courses;
pub mod enrollments;
pub mod progress;
pub mod revoked_tokens;
pub mod stats;
pub mod users;
pub mod videos;
