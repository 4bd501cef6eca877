//! HTTP surface of Fable: token issuing, the story gateway, and the REST
//! handlers for users, stories and contributors.

pub mod auth;
pub mod contributors;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod routes;
pub mod stories;
pub mod tokens;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
pub use tokens::TokenIssuer;
