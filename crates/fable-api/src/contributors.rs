use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use fable_db::models::{AddContributor, ContributorRow, Guarded};
use fable_types::api::{AddContributorRequest, MessageResponse};
use fable_types::models::Contributor;

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::gateway::Authorized;

fn to_contributor(row: ContributorRow) -> Contributor {
    Contributor {
        id: row.id,
        story_id: row.story_id,
        user_id: row.user_id,
        username: row.username,
    }
}

/// POST /api/contributors — requires MANAGE_CONTRIBUTORS on the body's story.
pub async fn add_contributor(
    State(state): State<AppState>,
    Extension(auth): Extension<Authorized>,
    WithRejection(Json(req), _): WithRejection<Json<AddContributorRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let Authorized { story_id, actor, .. } = auth;
    let user_id = req.contributor_id;

    let outcome = with_db(&state, move |db| db.add_contributor_as(story_id, actor, user_id)).await?;

    match outcome {
        AddContributor::Added(row) => {
            info!("User {} added as contributor to story {}", row.user_id, row.story_id);
            Ok((StatusCode::CREATED, Json(to_contributor(row))))
        }
        AddContributor::StoryNotFound => Err(ApiError::NotFound("Story")),
        AddContributor::Forbidden => Err(ApiError::Forbidden),
        AddContributor::UserNotFound => Err(ApiError::NotFound("User")),
        AddContributor::AuthorIsContributor => {
            Err(ApiError::BadRequest("The author cannot be added as a contributor."))
        }
        AddContributor::Duplicate => Err(ApiError::Conflict("User is already a contributor.")),
    }
}

/// GET /api/contributors/{story_id} — requires VIEW.
pub async fn list_contributors(
    State(state): State<AppState>,
    Extension(auth): Extension<Authorized>,
) -> Result<impl IntoResponse, ApiError> {
    let story_id = auth.story_id;
    let rows = with_db(&state, move |db| db.list_contributors(story_id)).await?;
    let contributors: Vec<Contributor> = rows.into_iter().map(to_contributor).collect();
    Ok(Json(contributors))
}

/// DELETE /api/contributors/{id}?story_id=N — requires MANAGE_CONTRIBUTORS.
/// The edge must belong to the authorized story.
pub async fn remove_contributor(
    State(state): State<AppState>,
    WithRejection(Path(edge_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(auth): Extension<Authorized>,
) -> Result<impl IntoResponse, ApiError> {
    let Authorized { story_id, actor, .. } = auth;

    match with_db(&state, move |db| db.remove_contributor_as(edge_id, story_id, actor)).await? {
        Guarded::Done(()) => {
            info!("Contributor edge {} removed from story {}", edge_id, story_id);
            Ok(Json(MessageResponse {
                message: "Contributor removed.".into(),
            }))
        }
        Guarded::NotFound => Err(ApiError::NotFound("Contributor")),
        Guarded::Forbidden => Err(ApiError::Forbidden),
    }
}
