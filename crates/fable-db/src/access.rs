use fable_access::{ContributorStore, StoreError, StoryStore};
use fable_types::{ContributorId, StoryId, UserId};

use crate::Database;
use crate::queries::{query_edge, query_story_author};

fn unavailable(err: anyhow::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

impl StoryStore for Database {
    fn find_story_author(&self, story_id: StoryId) -> Result<Option<UserId>, StoreError> {
        self.with_conn(|conn| query_story_author(conn, story_id))
            .map_err(unavailable)
    }
}

impl ContributorStore for Database {
    fn find_edge(
        &self,
        story_id: StoryId,
        user_id: UserId,
    ) -> Result<Option<ContributorId>, StoreError> {
        self.with_conn(|conn| query_edge(conn, story_id, user_id))
            .map_err(unavailable)
    }
}
