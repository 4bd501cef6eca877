//! Client side of Fable: a thin wrapper over the REST API, a state container
//! updated only through [`reduce`], and a [`Session`] that ties the two
//! together.

pub mod api;
pub mod error;
pub mod session;
pub mod state;

pub use api::ApiClient;
pub use error::ClientError;
pub use session::Session;
pub use state::{Action, ClientState, StoryState, UserState, reduce};
