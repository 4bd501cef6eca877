use anyhow::bail;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use fable_types::UserId;
use fable_types::api::{Claims, TokenKind};

/// Lifetime of an access token.
pub const ACCESS_TTL_MINUTES: i64 = 15;
/// Lifetime of a refresh token.
pub const REFRESH_TTL_DAYS: i64 = 7;

/// Issues and validates HS256 tokens. Access and refresh tokens are signed
/// with different secrets so one can never stand in for the other.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    refresh_secret: String,
}

impl TokenIssuer {
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
        }
    }

    pub fn issue_access(&self, user_id: UserId, username: &str) -> anyhow::Result<String> {
        self.issue(TokenKind::Access, user_id, username)
    }

    pub fn issue_refresh(&self, user_id: UserId, username: &str) -> anyhow::Result<String> {
        self.issue(TokenKind::Refresh, user_id, username)
    }

    fn issue(&self, kind: TokenKind, user_id: UserId, username: &str) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => chrono::Duration::minutes(ACCESS_TTL_MINUTES),
            TokenKind::Refresh => chrono::Duration::days(REFRESH_TTL_DAYS),
        };
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
            kind,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).as_bytes()),
        )?;

        Ok(token)
    }

    /// Verify signature, expiry and kind.
    pub fn validate(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).as_bytes()),
            &Validation::default(),
        )?;

        if token_data.claims.kind != kind {
            bail!("expected {:?} token, got {:?}", kind, token_data.claims.kind);
        }
        Ok(token_data.claims)
    }

    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }
}
