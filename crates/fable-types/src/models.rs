use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContributorId, StoryId, UserId};

/// Public view of a user. The password hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub content: String,
    pub author: User,
    pub contributors: Vec<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A grant allowing `user_id` to view and edit `story_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: ContributorId,
    pub story_id: StoryId,
    pub user_id: UserId,
    pub username: String,
}
