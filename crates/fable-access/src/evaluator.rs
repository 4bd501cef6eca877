use fable_types::{StoryId, UserId};
use tracing::debug;

use crate::capability::{Capability, Relation};
use crate::store::{ContributorStore, StoreError, StoryStore};

/// Why an action was refused, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No actor id was supplied.
    Unauthenticated,
    /// The story id does not resolve to a story.
    NotFound,
    /// The story exists but the actor lacks the required relation.
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Evaluates story permissions against the current store contents.
pub struct AccessEvaluator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AccessEvaluator<'a, S>
where
    S: StoryStore + ContributorStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// True iff the story exists and `user_id` wrote it.
    pub fn is_author(&self, story_id: StoryId, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.store.find_story_author(story_id)? == Some(user_id))
    }

    /// True iff the story exists and `user_id` either wrote it or holds a
    /// contributor edge on it. The edge table is only consulted once
    /// authorship has failed.
    pub fn is_author_or_contributor(
        &self,
        story_id: StoryId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        match self.store.find_story_author(story_id)? {
            None => Ok(false),
            Some(author_id) if author_id == user_id => Ok(true),
            Some(_) => Ok(self.store.find_edge(story_id, user_id)?.is_some()),
        }
    }

    /// Decide whether `actor` may exercise `capability` on `story_id`.
    ///
    /// Denials are checked in a fixed order: a missing actor is refused before
    /// the store is touched, then a missing story, then a failed relation.
    pub fn authorize(
        &self,
        story_id: StoryId,
        actor: Option<UserId>,
        capability: Capability,
    ) -> Result<Decision, StoreError> {
        let Some(actor) = actor else {
            debug!(story_id, %capability, "denied: no actor");
            return Ok(Decision::Deny(Denial::Unauthenticated));
        };

        let Some(author_id) = self.store.find_story_author(story_id)? else {
            debug!(story_id, actor, %capability, "denied: story not found");
            return Ok(Decision::Deny(Denial::NotFound));
        };

        let allowed = author_id == actor
            || match capability.required_relation() {
                Relation::Author => false,
                Relation::AuthorOrContributor => {
                    self.store.find_edge(story_id, actor)?.is_some()
                }
            };

        if allowed {
            Ok(Decision::Allow)
        } else {
            debug!(story_id, actor, %capability, "denied: forbidden");
            Ok(Decision::Deny(Denial::Forbidden))
        }
    }
}
