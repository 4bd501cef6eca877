use fable_types::{ContributorId, StoryId, UserId};
use thiserror::Error;

/// Failure to reach the backing store. Never a denial: callers must keep
/// "could not decide" apart from "not allowed".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to stories as needed by the evaluator.
pub trait StoryStore {
    /// Author of the story, or `None` when no story has this id.
    fn find_story_author(&self, story_id: StoryId) -> Result<Option<UserId>, StoreError>;
}

/// Read access to contributor edges.
pub trait ContributorStore {
    /// Id of an edge granting `user_id` access to `story_id`, if one exists.
    fn find_edge(
        &self,
        story_id: StoryId,
        user_id: UserId,
    ) -> Result<Option<ContributorId>, StoreError>;
}
