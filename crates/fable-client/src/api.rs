use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use fable_types::api::{
    AddContributorRequest, CreateStoryRequest, ErrorBody, LoginRequest, MeResponse,
    MessageResponse, RegisterRequest, RegisterResponse, TokenResponse, UpdateStoryRequest,
};
use fable_types::models::{Contributor, Story};
use fable_types::{ContributorId, StoryId, UserId};

use crate::error::ClientError;

/// One method per remote call. Cloning is cheap and clones share the cookie
/// store, so the refresh cookie set by `login` is visible to every clone.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
        };
        debug!("API call failed with {}: {}", status, message);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    // -- Auth --

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse, ClientError> {
        let body = RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        };
        self.send(self.http.post(self.url("/auth/register")).json(&body)).await
    }

    /// Returns the access token; the refresh token lands in the cookie store.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ClientError> {
        let body = LoginRequest {
            username: username.into(),
            password: password.into(),
        };
        let resp: TokenResponse = self.send(self.http.post(self.url("/auth/login")).json(&body)).await?;
        Ok(resp.access_token)
    }

    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        self.send(self.http.post(self.url("/auth/logout"))).await
    }

    pub async fn refresh(&self) -> Result<String, ClientError> {
        let resp: TokenResponse = self.send(self.http.get(self.url("/auth/refresh"))).await?;
        Ok(resp.access_token)
    }

    pub async fn me(&self, token: &str) -> Result<MeResponse, ClientError> {
        self.send(self.http.get(self.url("/auth/me")).bearer_auth(token)).await
    }

    // -- Stories --

    pub async fn list_stories(&self, token: &str) -> Result<Vec<Story>, ClientError> {
        self.send(self.http.get(self.url("/stories")).bearer_auth(token)).await
    }

    pub async fn get_story(&self, token: &str, id: StoryId) -> Result<Story, ClientError> {
        self.send(self.http.get(self.url(&format!("/stories/{}", id))).bearer_auth(token)).await
    }

    pub async fn create_story(&self, token: &str, title: &str, content: &str) -> Result<Story, ClientError> {
        let body = CreateStoryRequest {
            title: title.into(),
            content: content.into(),
        };
        self.send(self.http.post(self.url("/stories")).bearer_auth(token).json(&body)).await
    }

    pub async fn update_story(
        &self,
        token: &str,
        id: StoryId,
        patch: &UpdateStoryRequest,
    ) -> Result<Story, ClientError> {
        self.send(
            self.http
                .patch(self.url(&format!("/stories/{}", id)))
                .bearer_auth(token)
                .json(patch),
        )
        .await
    }

    pub async fn delete_story(&self, token: &str, id: StoryId) -> Result<MessageResponse, ClientError> {
        self.send(self.http.delete(self.url(&format!("/stories/{}", id))).bearer_auth(token)).await
    }

    // -- Contributors --

    pub async fn list_contributors(&self, token: &str, story_id: StoryId) -> Result<Vec<Contributor>, ClientError> {
        self.send(
            self.http
                .get(self.url(&format!("/contributors/{}", story_id)))
                .bearer_auth(token),
        )
        .await
    }

    pub async fn add_contributor(
        &self,
        token: &str,
        story_id: StoryId,
        contributor_id: UserId,
    ) -> Result<Contributor, ClientError> {
        let body = AddContributorRequest {
            story_id: Some(story_id),
            contributor_id,
        };
        self.send(self.http.post(self.url("/contributors")).bearer_auth(token).json(&body)).await
    }

    pub async fn remove_contributor(
        &self,
        token: &str,
        story_id: StoryId,
        edge_id: ContributorId,
    ) -> Result<MessageResponse, ClientError> {
        self.send(
            self.http
                .delete(self.url(&format!("/contributors/{}", edge_id)))
                .query(&[("story_id", story_id)])
                .bearer_auth(token),
        )
        .await
    }
}
