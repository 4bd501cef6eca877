//! Story access control.
//!
//! Decides whether an actor may view, edit, delete, or manage the contributors
//! of a story. The evaluator holds no state of its own: every call reads the
//! current contents of the stores behind [`StoryStore`] and
//! [`ContributorStore`], so a revoked grant is visible on the next call.

pub mod capability;
pub mod evaluator;
pub mod store;

pub use capability::{Capability, Relation};
pub use evaluator::{AccessEvaluator, Decision, Denial};
pub use store::{ContributorStore, StoreError, StoryStore};
