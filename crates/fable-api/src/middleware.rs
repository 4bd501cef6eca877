use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use fable_types::api::TokenKind;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer access token, then expose its claims to
/// everything further down the stack.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthenticated)?;

    let claims = state
        .tokens
        .validate(bearer.token(), TokenKind::Access)
        .map_err(|e| {
            debug!("Rejected access token: {}", e);
            ApiError::Unauthenticated
        })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
