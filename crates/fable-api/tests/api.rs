//! End-to-end tests of the HTTP surface against an in-memory database.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fable_api::{AppState, AppStateInner, TokenIssuer, router};
use fable_db::Database;

struct TestApp {
    router: Router,
    state: AppState,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    json: Value,
}

impl TestApp {
    fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            tokens: TokenIssuer::new("test-access-secret", "test-refresh-secret"),
            cookie_secure: false,
        });
        Self {
            router: router(state.clone()),
            state,
        }
    }

    /// Insert a user directly and hand back their id and an access token.
    fn user(&self, name: &str) -> (i64, String) {
        let row = self
            .state
            .db
            .create_user(name, &format!("{name}@example.com"), "unused-hash")
            .unwrap()
            .unwrap();
        let token = self.state.tokens.issue_access(row.id, name).unwrap();
        (row.id, token)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(req).await
    }

    async fn dispatch(&self, req: Request<Body>) -> Reply {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, headers, json }
    }
}

/// Story 1 by alice, bob as contributor, charlie unrelated.
struct Scenario {
    app: TestApp,
    story_id: i64,
    edge_id: i64,
    alice: (i64, String),
    bob: (i64, String),
    charlie: (i64, String),
}

fn scenario() -> Scenario {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let charlie = app.user("charlie");
    let story = app.state.db.create_story("The Mysterious Forest", "Once upon a time", alice.0).unwrap();
    let fable_db::models::AddContributor::Added(edge) =
        app.state.db.add_contributor_as(story.id, alice.0, bob.0).unwrap()
    else {
        panic!("seed edge not added");
    };
    Scenario {
        app,
        story_id: story.id,
        edge_id: edge.id,
        alice,
        bob,
        charlie,
    }
}

#[tokio::test]
async fn contributor_edits_but_only_author_deletes() {
    let s = scenario();
    let uri = format!("/api/stories/{}", s.story_id);

    let reply = s
        .app
        .send(Method::PATCH, &uri, Some(&s.bob.1), Some(json!({ "content": "Bob was here" })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["content"], "Bob was here");
    assert_eq!(reply.json["author"]["username"], "alice");

    let reply = s.app.send(Method::DELETE, &uri, Some(&s.bob.1), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json["error"], "Forbidden: access denied");

    let reply = s.app.send(Method::DELETE, &uri, Some(&s.alice.1), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = s.app.send(Method::GET, &uri, Some(&s.alice.1), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stranger_cannot_view() {
    let s = scenario();
    let uri = format!("/api/stories/{}", s.story_id);

    let reply = s.app.send(Method::GET, &uri, Some(&s.charlie.1), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = s.app.send(Method::GET, &uri, Some(&s.bob.1), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["contributors"][0]["username"], "bob");
}

#[tokio::test]
async fn missing_story_is_not_found() {
    let s = scenario();
    let reply = s.app.send(Method::GET, "/api/stories/999", Some(&s.alice.1), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json["error"], "Story not found");

    let reply = s
        .app
        .send(Method::PATCH, "/api/stories/999", Some(&s.bob.1), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_credentials_win_over_everything() {
    let s = scenario();

    let reply = s.app.send(Method::GET, &format!("/api/stories/{}", s.story_id), None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = s.app.send(Method::GET, "/api/stories/999", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = s.app.send(Method::GET, "/api/stories/not-a-number", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = s.app.send(Method::GET, "/api/stories/999", Some("garbage"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_cannot_authenticate_api_calls() {
    let s = scenario();
    let refresh = s.app.state.tokens.issue_refresh(s.alice.0, "alice").unwrap();
    let reply = s
        .app
        .send(Method::GET, &format!("/api/stories/{}", s.story_id), Some(&refresh), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_story_id_is_bad_request_without_touching_the_store() {
    let s = scenario();
    s.app
        .state
        .db
        .with_conn(|conn| {
            conn.execute_batch("DROP TABLE contributors; DROP TABLE stories;")?;
            Ok(())
        })
        .unwrap();

    for uri in ["/api/stories/abc", "/api/stories/0", "/api/stories/-3"] {
        let reply = s.app.send(Method::GET, uri, Some(&s.alice.1), None).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(reply.json["error"], "A valid story id is required.");
    }

    let reply = s
        .app
        .send(Method::DELETE, &format!("/api/contributors/{}", s.edge_id), Some(&s.alice.1), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    // A well-formed id does reach the (now broken) store.
    let reply = s
        .app
        .send(Method::GET, &format!("/api/stories/{}", s.story_id), Some(&s.alice.1), None)
        .await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn string_story_id_in_body_is_not_accepted() {
    let s = scenario();
    let body = json!({ "story_id": s.story_id.to_string(), "contributor_id": s.charlie.0 });

    let reply = s
        .app
        .send(Method::POST, "/api/contributors", Some(&s.alice.1), Some(body.clone()))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "A valid story id is required.");

    // The query id authorizes, but the body is still malformed.
    let reply = s
        .app
        .send(
            Method::POST,
            &format!("/api/contributors?story_id={}", s.story_id),
            Some(&s.alice.1),
            Some(body),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "Invalid request body.");

    assert_eq!(s.app.state.db.list_contributors(s.story_id).unwrap().len(), 1);
}

#[tokio::test]
async fn extractor_rejections_are_json_bad_requests() {
    let s = scenario();

    let reply = s
        .app
        .send(
            Method::POST,
            "/api/contributors",
            Some(&s.alice.1),
            Some(json!({ "story_id": s.story_id })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "Invalid request body.");

    let reply = s.app.send(Method::GET, "/api/users/abc", Some(&s.alice.1), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "A valid id is required.");

    let reply = s
        .app
        .send(
            Method::DELETE,
            &format!("/api/contributors/abc?story_id={}", s.story_id),
            Some(&s.alice.1),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "A valid id is required.");

    let reply = s
        .app
        .send(
            Method::PATCH,
            &format!("/api/stories/{}", s.story_id),
            Some(&s.bob.1),
            Some(json!({ "title": 5 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "Invalid request body.");

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/stories")
        .header(header::AUTHORIZATION, format!("Bearer {}", s.alice.1))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let reply = s.app.dispatch(req).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["error"], "Invalid request body.");
}

#[tokio::test]
async fn store_failure_is_unavailable_not_forbidden() {
    let s = scenario();
    s.app
        .state
        .db
        .with_conn(|conn| {
            conn.execute_batch("DROP TABLE contributors;")?;
            Ok(())
        })
        .unwrap();

    let reply = s
        .app
        .send(Method::GET, &format!("/api/stories/{}", s.story_id), Some(&s.charlie.1), None)
        .await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    let message = reply.json["error"].as_str().unwrap();
    assert!(!message.contains("contributors"));
}

#[tokio::test]
async fn managing_contributors() {
    let s = scenario();
    let body = |user: i64| json!({ "story_id": s.story_id, "contributor_id": user });

    let reply = s
        .app
        .send(Method::POST, "/api/contributors", Some(&s.bob.1), Some(body(s.charlie.0)))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = s
        .app
        .send(Method::POST, "/api/contributors", Some(&s.alice.1), Some(body(s.charlie.0)))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["username"], "charlie");

    let reply = s
        .app
        .send(Method::POST, "/api/contributors", Some(&s.alice.1), Some(body(s.charlie.0)))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = s
        .app
        .send(Method::POST, "/api/contributors", Some(&s.alice.1), Some(body(s.alice.0)))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = s
        .app
        .send(Method::POST, "/api/contributors", Some(&s.alice.1), Some(body(4040)))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = s
        .app
        .send(Method::GET, &format!("/api/contributors/{}", s.story_id), Some(&s.charlie.1), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn story_id_from_query_when_body_lacks_it() {
    let s = scenario();
    let reply = s
        .app
        .send(
            Method::POST,
            &format!("/api/contributors?story_id={}", s.story_id),
            Some(&s.alice.1),
            Some(json!({ "contributor_id": s.charlie.0 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["story_id"], s.story_id);
}

#[tokio::test]
async fn removing_contributor_revokes_edit() {
    let s = scenario();
    let other = s.app.state.db.create_story("Space", "Nova", s.alice.0).unwrap();

    let reply = s
        .app
        .send(
            Method::DELETE,
            &format!("/api/contributors/{}?story_id={}", s.edge_id, other.id),
            Some(&s.alice.1),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = s
        .app
        .send(
            Method::DELETE,
            &format!("/api/contributors/{}?story_id={}", s.edge_id, s.story_id),
            Some(&s.bob.1),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = s
        .app
        .send(
            Method::DELETE,
            &format!("/api/contributors/{}?story_id={}", s.edge_id, s.story_id),
            Some(&s.alice.1),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = s
        .app
        .send(
            Method::PATCH,
            &format!("/api/stories/{}", s.story_id),
            Some(&s.bob.1),
            Some(json!({ "title": "Bob's now" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn story_listing_and_creation() {
    let s = scenario();

    let reply = s
        .app
        .send(Method::POST, "/api/stories", Some(&s.charlie.1), Some(json!({ "title": "Mine", "content": "..." })))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["author"]["id"], s.charlie.0);

    let reply = s
        .app
        .send(Method::POST, "/api/stories", Some(&s.charlie.1), Some(json!({ "title": "", "content": "..." })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = s.app.send(Method::GET, "/api/stories", Some(&s.bob.1), None).await;
    let titles: Vec<&str> = reply
        .json
        .as_array()
        .unwrap()
        .iter()
        .map(|story| story["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["The Mysterious Forest"]);

    let reply = s
        .app
        .send(Method::PATCH, &format!("/api/stories/{}", s.story_id), Some(&s.alice.1), Some(json!({})))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_login_refresh_me() {
    let app = TestApp::new();

    let reply = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": " Dana ", "email": "Dana@Example.com", "password": "long-enough" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["user"]["username"], "dana");
    assert_eq!(reply.json["user"]["email"], "dana@example.com");
    assert!(reply.json["user"].get("password_hash").is_none());

    let reply = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "dana", "email": "other@example.com", "password": "long-enough" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .send(Method::POST, "/api/auth/register", None, Some(json!({ "username": "eve" })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::POST, "/api/auth/login", None, Some(json!({ "username": "dana", "password": "wrong-pass" })))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = app
        .send(Method::POST, "/api/auth/login", None, Some(json!({ "username": "DANA", "password": "long-enough" })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let access = reply.json["accessToken"].as_str().unwrap().to_string();
    let set_cookie = reply.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("refreshToken="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let reply = app
        .send(Method::POST, "/api/stories", Some(&access), Some(json!({ "title": "First", "content": "words" })))
        .await;
    let story_id = reply.json["id"].as_i64().unwrap();

    let reply = app.send(Method::GET, "/api/auth/me", Some(&access), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["username"], "dana");
    assert_eq!(reply.json["stories"], json!([story_id]));

    let req = Request::builder()
        .uri("/api/auth/refresh")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let reply = app.dispatch(req).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json["accessToken"].is_string());

    let reply = app.send(Method::GET, "/api/auth/refresh", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/logout")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let reply = app.dispatch(req).await;
    assert_eq!(reply.status, StatusCode::OK);
    let cleared = reply.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.starts_with("refreshToken="));
}

#[tokio::test]
async fn users_manage_only_themselves() {
    let s = scenario();
    let alice_uri = format!("/api/users/{}", s.alice.0);

    let reply = s.app.send(Method::GET, "/api/users", Some(&s.bob.1), None).await;
    assert_eq!(reply.json.as_array().unwrap().len(), 3);

    let reply = s
        .app
        .send(Method::PATCH, &alice_uri, Some(&s.bob.1), Some(json!({ "email": "bob@evil.example" })))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = s
        .app
        .send(Method::PATCH, &alice_uri, Some(&s.alice.1), Some(json!({ "password": "new-password" })))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = s
        .app
        .send(Method::PATCH, &alice_uri, Some(&s.alice.1), Some(json!({ "email": "bob@example.com" })))
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = s
        .app
        .send(Method::PATCH, &alice_uri, Some(&s.alice.1), Some(json!({ "email": "Alice@New.example" })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["email"], "alice@new.example");

    let reply = s.app.send(Method::DELETE, &alice_uri, Some(&s.alice.1), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = s.app.send(Method::GET, &alice_uri, Some(&s.bob.1), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = s
        .app
        .send(Method::GET, &format!("/api/stories/{}", s.story_id), Some(&s.bob.1), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() {
    let app = TestApp::new();
    let reply = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "dora", "email": "dora@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let wrong_password = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "dora", "password": "not-her-password" })),
        )
        .await;
    let unknown_user = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "password123" })),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, wrong_password.status);
    assert_eq!(unknown_user.json, wrong_password.json);
    assert!(unknown_user.headers.get(header::SET_COOKIE).is_none());
}
