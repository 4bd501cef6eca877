use std::sync::{Arc, LazyLock};

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{error, info, warn};

use fable_db::Database;
use fable_db::models::UserRow;
use fable_types::api::{
    Claims, LoginRequest, MeResponse, MessageResponse, RegisterRequest, RegisterResponse,
    TokenKind, TokenResponse,
};
use fable_types::models::User;

use crate::error::ApiError;
use crate::tokens::TokenIssuer;

pub const REFRESH_COOKIE: &str = "refreshToken";
const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Verified against when the username is unknown, so both login failures cost
/// one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("fable-unknown-user-placeholder").ok());

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenIssuer,
    /// Mark the refresh cookie `Secure`. Only disabled for plain-HTTP setups.
    pub cookie_secure: bool,
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(|e| {
            error!("Store error: {}", e);
            ApiError::Unavailable
        })
}

pub(crate) fn public_user(row: &UserRow) -> User {
    User {
        id: row.id,
        username: row.username.clone(),
        email: row.email.clone(),
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 50 {
        return Err(ApiError::BadRequest("Username must be 3 to 50 characters."));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !well_formed || email.len() > 100 {
        return Err(ApiError::BadRequest("A valid email address is required."));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = normalize(&req.username);
    let email = normalize(&req.email);

    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required."));
    }
    validate_username(&username)?;
    validate_email(&email)?;
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters."));
    }

    let password_hash = hash_password(&req.password)?;

    let created = with_db(&state, move |db| db.create_user(&username, &email, &password_hash))
        .await?
        .ok_or(ApiError::Conflict("Username or email already taken."))?;

    info!("Registered user {} ({})", created.username, created.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully.".into(),
            user: public_user(&created),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let username = normalize(&req.username);
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Username and password required."));
    }

    let user = with_db(&state, move |db| db.get_user_by_username(&username)).await?;
    let Some(user) = user else {
        if let Some(dummy) = DUMMY_HASH.as_deref() {
            let _ = verify_password(&req.password, dummy);
        }
        return Err(ApiError::Unauthenticated);
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Failed login for {}", user.username);
            return Err(ApiError::Unauthenticated);
        }
        Err(e) => {
            error!("Stored hash for user {} is unreadable: {}", user.id, e);
            return Err(ApiError::Internal);
        }
    }

    let access_token = issue(&state.tokens, TokenKind::Access, &user)?;
    let refresh_token = issue(&state.tokens, TokenKind::Refresh, &user)?;

    let cookie = Cookie::build((REFRESH_COOKIE, refresh_token))
        .http_only(true)
        .secure(state.cookie_secure)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH);

    Ok((jar.add(cookie), Json(TokenResponse { access_token })))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH));
    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully.".into(),
        }),
    )
}

/// GET /api/auth/refresh — trade the refresh cookie for a new access token.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let token = jar.get(REFRESH_COOKIE).ok_or(ApiError::Unauthenticated)?;
    let claims = state
        .tokens
        .validate(token.value(), TokenKind::Refresh)
        .map_err(|e| {
            warn!("Rejected refresh token: {}", e);
            ApiError::Unauthenticated
        })?;

    // A deleted account must not keep minting access tokens.
    let user_id = claims.sub;
    let user = with_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let access_token = issue(&state.tokens, TokenKind::Access, &user)?;
    Ok(Json(TokenResponse { access_token }))
}

/// GET /api/auth/me — the caller's profile and the ids of stories they wrote.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (user, stories) = with_db(&state, move |db| {
        let user = db.get_user_by_id(user_id)?;
        let stories = db.list_stories_by_author(user_id)?;
        Ok((user, stories))
    })
    .await?;

    let user = user.ok_or(ApiError::NotFound("User"))?;

    Ok(Json(MeResponse {
        user: public_user(&user),
        stories: stories.iter().map(|s| s.id).collect(),
    }))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

/// `Err` only when `hash` is not a readable PHC string.
fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn issue(tokens: &TokenIssuer, kind: TokenKind, user: &UserRow) -> Result<String, ApiError> {
    let token = match kind {
        TokenKind::Access => tokens.issue_access(user.id, &user.username),
        TokenKind::Refresh => tokens.issue_refresh(user.id, &user.username),
    };
    token.map_err(|e| {
        error!("Token issue failed: {}", e);
        ApiError::Internal
    })
}
