use axum::{
    Router, middleware,
    routing::{MethodRouter, delete, get, patch, post},
};

use fable_access::Capability;

use crate::auth::{self, AppState};
use crate::contributors;
use crate::gateway::{self, Guard, StoryIdSource};
use crate::middleware::require_auth;
use crate::stories;
use crate::users;

/// `{id}` is the story id on story routes and on `GET /api/contributors/{id}`.
const STORY_PATH_ID: &[StoryIdSource] = &[StoryIdSource::Path("id")];
/// Routes whose path id is not a story id read it from the body or query.
const STORY_FIELD: &[StoryIdSource] = &[
    StoryIdSource::Body("story_id"),
    StoryIdSource::Query("story_id"),
];

/// Wrap a single-method route in the story gateway.
fn guarded(
    state: &AppState,
    route: MethodRouter<AppState>,
    capability: Capability,
    sources: &'static [StoryIdSource],
) -> MethodRouter<AppState> {
    let guard = Guard {
        app: state.clone(),
        capability,
        sources,
    };
    route.route_layer(middleware::from_fn_with_state(guard, gateway::authorize))
}

/// Every API route, with authentication and per-story authorization applied.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/refresh", get(auth::refresh));

    let s = &state;
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/api/stories",
            get(stories::list_stories).post(stories::create_story),
        )
        .route(
            "/api/stories/{id}",
            guarded(s, get(stories::get_story), Capability::View, STORY_PATH_ID),
        )
        .route(
            "/api/stories/{id}",
            guarded(s, patch(stories::update_story), Capability::Edit, STORY_PATH_ID),
        )
        .route(
            "/api/stories/{id}",
            guarded(s, delete(stories::delete_story), Capability::Delete, STORY_PATH_ID),
        )
        .route(
            "/api/contributors",
            guarded(
                s,
                post(contributors::add_contributor),
                Capability::ManageContributors,
                STORY_FIELD,
            ),
        )
        .route(
            "/api/contributors/{id}",
            guarded(
                s,
                get(contributors::list_contributors),
                Capability::View,
                STORY_PATH_ID,
            ),
        )
        .route(
            "/api/contributors/{id}",
            guarded(
                s,
                delete(contributors::remove_contributor),
                Capability::ManageContributors,
                STORY_FIELD,
            ),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

