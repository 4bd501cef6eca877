//! Per-route authorization for story-scoped endpoints.
//!
//! Runs inside [`require_auth`](crate::middleware::require_auth), so by the
//! time a request gets here the actor is known. The order of work is fixed:
//! actor, then story id, then the store-backed decision. A request without an
//! actor never reaches the id parser, and a request without a usable id never
//! reaches the store.

use std::collections::HashMap;

use axum::{
    body::{Body, to_bytes},
    extract::{Query, RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{error, warn};

use fable_access::{AccessEvaluator, Capability, Decision};
use fable_types::api::Claims;
use fable_types::{StoryId, UserId};

use crate::auth::AppState;
use crate::error::ApiError;

/// Largest JSON body the gateway will buffer while looking for a story id.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// One place a story id may be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryIdSource {
    /// Named path parameter, e.g. `{id}` in `/api/stories/{id}`.
    Path(&'static str),
    /// Top-level field of a JSON body. Only JSON numbers count, matching what
    /// the handlers deserialize.
    Body(&'static str),
    /// Query string parameter.
    Query(&'static str),
}

/// Inserted into request extensions once the gateway allows a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorized {
    pub story_id: StoryId,
    pub actor: UserId,
    pub capability: Capability,
}

/// State for one guarded route: which capability it needs and where to look
/// for the story id, in order.
#[derive(Clone)]
pub struct Guard {
    pub app: AppState,
    pub capability: Capability,
    pub sources: &'static [StoryIdSource],
}

/// Request values the sources are matched against.
#[derive(Default)]
struct Candidates<'a> {
    path: Vec<(&'a str, &'a str)>,
    body: Option<Value>,
    query: HashMap<String, String>,
}

/// Return the first source whose value is present and parses as a positive
/// integer. Present but malformed values fall through to the next source.
fn extract_story_id(sources: &[StoryIdSource], candidates: &Candidates<'_>) -> Option<StoryId> {
    sources.iter().find_map(|source| match *source {
        StoryIdSource::Path(name) => candidates
            .path
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| parse_positive(value)),
        StoryIdSource::Body(field) => candidates
            .body
            .as_ref()
            .and_then(|body| body.get(field))
            .and_then(Value::as_i64)
            .filter(|id| *id > 0),
        StoryIdSource::Query(name) => candidates.query.get(name).and_then(|v| parse_positive(v)),
    })
}

fn parse_positive(raw: &str) -> Option<StoryId> {
    raw.trim().parse::<StoryId>().ok().filter(|id| *id > 0)
}

pub async fn authorize(
    State(guard): State<Guard>,
    path_params: Result<RawPathParams, axum::extract::rejection::RawPathParamsRejection>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(actor) = req.extensions().get::<Claims>().map(|claims| claims.sub) else {
        return Err(ApiError::Unauthenticated);
    };

    let wants_body = guard.sources.iter().any(|s| matches!(s, StoryIdSource::Body(_)));
    let (parts, body) = req.into_parts();

    let (body, json) = if wants_body {
        let bytes = to_bytes(body, MAX_BUFFERED_BODY)
            .await
            .map_err(|_| ApiError::BadRequest("Request body too large."))?;
        let json = serde_json::from_slice::<Value>(&bytes).ok();
        (Body::from(bytes), json)
    } else {
        (body, None)
    };

    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();

    let story_id = {
        let candidates = Candidates {
            path: path_params
                .as_ref()
                .map(|params| params.iter().collect())
                .unwrap_or_default(),
            body: json,
            query,
        };
        extract_story_id(guard.sources, &candidates)
    }
    .ok_or(ApiError::BadRequest("A valid story id is required."))?;

    let capability = guard.capability;
    let app = guard.app.clone();
    let decision = tokio::task::spawn_blocking(move || {
        AccessEvaluator::new(&app.db).authorize(story_id, Some(actor), capability)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
    .map_err(|e| {
        error!("Authorization for story {} unavailable: {}", story_id, e);
        ApiError::Unavailable
    })?;

    match decision {
        Decision::Allow => {
            let mut req = Request::from_parts(parts, body);
            req.extensions_mut().insert(Authorized {
                story_id,
                actor,
                capability,
            });
            Ok(next.run(req).await)
        }
        Decision::Deny(denial) => {
            warn!(story_id, actor, %capability, ?denial, "Request denied");
            Err(denial.into())
        }
    }
}
