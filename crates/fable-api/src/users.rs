use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use fable_db::models::UserUpdate;
use fable_types::api::{Claims, MessageResponse, UpdateUserRequest};
use fable_types::models::User;

use crate::auth::{AppState, normalize, public_user, validate_email, validate_username, with_db};
use crate::error::ApiError;

/// Accounts may only be changed or removed by their owner.
fn require_self(claims: &Claims, user_id: i64) -> Result<(), ApiError> {
    if claims.sub != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, |db| db.list_users()).await?;
    let users: Vec<User> = rows.iter().map(public_user).collect();
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(public_user(&user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.is_some() {
        return Err(ApiError::BadRequest("Password cannot be updated directly."));
    }
    if req.username.is_none() && req.email.is_none() {
        return Err(ApiError::BadRequest("No fields to update."));
    }
    require_self(&claims, user_id)?;

    let username = req.username.as_deref().map(normalize);
    let email = req.email.as_deref().map(normalize);
    if let Some(username) = &username {
        validate_username(username)?;
    }
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let outcome = with_db(&state, move |db| {
        db.update_user(user_id, username.as_deref(), email.as_deref())
    })
    .await?;

    match outcome {
        UserUpdate::Updated(row) => Ok(Json(public_user(&row))),
        UserUpdate::NotFound => Err(ApiError::NotFound("User")),
        UserUpdate::Duplicate => Err(ApiError::Conflict("Username or email already taken.")),
    }
}

pub async fn delete_user(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_self(&claims, user_id)?;

    if !with_db(&state, move |db| db.delete_user(user_id)).await? {
        return Err(ApiError::NotFound("User"));
    }

    info!("User {} deleted their account", user_id);
    Ok(Json(MessageResponse {
        message: "User deleted successfully.".into(),
    }))
}
