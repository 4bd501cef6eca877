pub mod api;
pub mod models;

/// Users, stories and contributor edges are keyed by SQLite rowids.
pub type UserId = i64;
pub type StoryId = i64;
pub type ContributorId = i64;
