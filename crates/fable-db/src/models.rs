/// Database row types — these map directly to SQLite rows.
/// Distinct from fable-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A story joined with its author's public fields.
pub struct StoryRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    pub author_email: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A contributor edge joined with the contributing user.
pub struct ContributorRow {
    pub id: i64,
    pub story_id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// Result of a write whose authorizing relation is re-checked inside the
/// same transaction as the write itself.
#[derive(Debug, PartialEq, Eq)]
pub enum Guarded<T> {
    Done(T),
    NotFound,
    Forbidden,
}

pub enum AddContributor {
    Added(ContributorRow),
    StoryNotFound,
    Forbidden,
    UserNotFound,
    AuthorIsContributor,
    Duplicate,
}

pub enum UserUpdate {
    Updated(UserRow),
    NotFound,
    Duplicate,
}
