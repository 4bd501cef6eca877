use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{info, warn};

use fable_db::models::{ContributorRow, Guarded, StoryRow};
use fable_types::api::{Claims, CreateStoryRequest, MessageResponse, UpdateStoryRequest};
use fable_types::models::{Story, User};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::gateway::Authorized;

const MAX_TITLE_LEN: usize = 255;

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and content are required."));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::BadRequest("Title must be at most 255 characters."));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and content are required."));
    }
    Ok(())
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS.SSS" without timezone.
fn parse_timestamp(raw: &str, story_id: i64) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on story {}: {}", raw, story_id, e);
            DateTime::default()
        })
}

pub(crate) fn contributor_user(row: &ContributorRow) -> User {
    User {
        id: row.user_id,
        username: row.username.clone(),
        email: row.email.clone(),
    }
}

fn to_story(row: StoryRow, contributors: &[ContributorRow]) -> Story {
    Story {
        id: row.id,
        created_at: parse_timestamp(&row.created_at, row.id),
        updated_at: parse_timestamp(&row.updated_at, row.id),
        author: User {
            id: row.author_id,
            username: row.author_username,
            email: row.author_email,
        },
        contributors: contributors.iter().map(contributor_user).collect(),
        title: row.title,
        content: row.content,
    }
}

/// GET /api/stories — stories the caller wrote or contributes to.
pub async fn list_stories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (rows, contributor_rows) = with_db(&state, move |db| {
        Ok((
            db.list_stories_visible_to(user_id)?,
            db.list_contributors_visible_to(user_id)?,
        ))
    })
    .await?;

    let mut by_story: HashMap<i64, Vec<ContributorRow>> = HashMap::new();
    for row in contributor_rows {
        by_story.entry(row.story_id).or_default().push(row);
    }

    let stories: Vec<Story> = rows
        .into_iter()
        .map(|row| {
            let contributors = by_story.remove(&row.id).unwrap_or_default();
            to_story(row, &contributors)
        })
        .collect();

    Ok(Json(stories))
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateStoryRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    validate_title(&req.title)?;
    validate_content(&req.content)?;

    let author_id = claims.sub;
    let author = with_db(&state, move |db| db.get_user_by_id(author_id)).await?;
    if author.is_none() {
        return Err(ApiError::NotFound("Author"));
    }

    let row = with_db(&state, move |db| db.create_story(&req.title, &req.content, author_id)).await?;
    info!("Story {} created by {}", row.id, claims.username);

    Ok((StatusCode::CREATED, Json(to_story(row, &[]))))
}

/// GET /api/stories/{id} — requires VIEW.
pub async fn get_story(
    State(state): State<AppState>,
    Extension(auth): Extension<Authorized>,
) -> Result<impl IntoResponse, ApiError> {
    let story_id = auth.story_id;
    let (row, contributors) = with_db(&state, move |db| {
        Ok((db.get_story(story_id)?, db.list_contributors(story_id)?))
    })
    .await?;

    let row = row.ok_or(ApiError::NotFound("Story"))?;
    Ok(Json(to_story(row, &contributors)))
}

/// PATCH /api/stories/{id} — requires EDIT.
pub async fn update_story(
    State(state): State<AppState>,
    Extension(auth): Extension<Authorized>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateStoryRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.is_none() && req.content.is_none() {
        return Err(ApiError::BadRequest("Title or content is required."));
    }
    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if let Some(content) = &req.content {
        validate_content(content)?;
    }

    let Authorized { story_id, actor, .. } = auth;
    let (outcome, contributors) = with_db(&state, move |db| {
        let outcome =
            db.update_story_as(story_id, actor, req.title.as_deref(), req.content.as_deref())?;
        Ok((outcome, db.list_contributors(story_id)?))
    })
    .await?;

    match outcome {
        Guarded::Done(row) => Ok(Json(to_story(row, &contributors))),
        Guarded::NotFound => Err(ApiError::NotFound("Story")),
        Guarded::Forbidden => {
            warn!("Edit access to story {} revoked for user {} mid-request", story_id, actor);
            Err(ApiError::Forbidden)
        }
    }
}

/// DELETE /api/stories/{id} — requires DELETE.
pub async fn delete_story(
    State(state): State<AppState>,
    Extension(auth): Extension<Authorized>,
) -> Result<impl IntoResponse, ApiError> {
    let Authorized { story_id, actor, .. } = auth;
    match with_db(&state, move |db| db.delete_story_as(story_id, actor)).await? {
        Guarded::Done(()) => {
            info!("Story {} deleted by user {}", story_id, actor);
            Ok(Json(MessageResponse {
                message: "Story deleted successfully.".into(),
            }))
        }
        Guarded::NotFound => Err(ApiError::NotFound("Story")),
        Guarded::Forbidden => Err(ApiError::Forbidden),
    }
}
