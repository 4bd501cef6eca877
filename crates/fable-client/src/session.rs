use std::future::Future;

use tracing::{info, warn};

use fable_types::api::UpdateStoryRequest;
use fable_types::models::Contributor;
use fable_types::{ContributorId, StoryId, UserId};

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::state::{Action, ClientState, reduce};

/// Drives the client: performs remote calls, feeds their outcome into the
/// state container, and keeps the current access token.
pub struct Session {
    api: ApiClient,
    access_token: Option<String>,
    state: ClientState,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            access_token: None,
            state: ClientState::default(),
        }
    }

    /// Start from a previously stored access token. If it has expired, the
    /// first call falls back to the refresh cookie.
    pub fn resume(api: ApiClient, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::new(api)
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn dispatch(&mut self, action: Action) {
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    /// Run `call` with the current token. On 401, trade the refresh cookie for
    /// a new token and try exactly once more.
    async fn authed<T, F, Fut>(&mut self, call: F) -> Result<T, ClientError>
    where
        F: Fn(ApiClient, String) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let token = self.access_token.clone().ok_or(ClientError::NotLoggedIn)?;
        match call(self.api.clone(), token).await {
            Err(e) if e.is_unauthorized() => {
                warn!("Access token rejected, refreshing");
                let token = self.api.refresh().await?;
                self.access_token = Some(token.clone());
                call(self.api.clone(), token).await
            }
            other => other,
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        self.dispatch(Action::LoginPending);
        let result = async {
            let token = self.api.login(username, password).await?;
            let me = self.api.me(&token).await?;
            Ok::<_, ClientError>((token, me))
        }
        .await;

        match result {
            Ok((token, me)) => {
                info!("Logged in as {}", me.user.username);
                self.access_token = Some(token);
                self.dispatch(Action::LoginFulfilled(me));
                Ok(())
            }
            Err(e) => {
                self.dispatch(Action::LoginRejected(e.message()));
                Err(e)
            }
        }
    }

    /// Load the profile for a resumed token.
    pub async fn load_user(&mut self) -> Result<(), ClientError> {
        self.dispatch(Action::LoginPending);
        match self.authed(|api, token| async move { api.me(&token).await }).await {
            Ok(me) => {
                self.dispatch(Action::LoginFulfilled(me));
                Ok(())
            }
            Err(e) => {
                self.dispatch(Action::LoginRejected(e.message()));
                Err(e)
            }
        }
    }

    /// Local state is cleared even when the server call fails.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let result = self.api.logout().await.map(|_| ());
        self.access_token = None;
        self.dispatch(Action::Logout);
        result
    }

    pub async fn fetch_stories(&mut self) -> Result<(), ClientError> {
        self.dispatch(Action::StoriesPending);
        match self.authed(|api, token| async move { api.list_stories(&token).await }).await {
            Ok(stories) => {
                self.dispatch(Action::StoriesFulfilled(stories));
                Ok(())
            }
            Err(e) => {
                self.dispatch(Action::StoriesRejected(e.message()));
                Err(e)
            }
        }
    }

    pub async fn open_story(&mut self, id: StoryId) -> Result<(), ClientError> {
        let story = self.authed(|api, token| async move { api.get_story(&token, id).await }).await?;
        self.dispatch(Action::SetCurrentStory(story));
        Ok(())
    }

    pub fn edit_current(&mut self, content: impl Into<String>) {
        self.dispatch(Action::UpdateCurrentStoryContent(content.into()));
    }

    /// Send the open story's content to the server.
    pub async fn save_current(&mut self) -> Result<(), ClientError> {
        let current = self.state.story.current_story.as_ref().ok_or(ClientError::NoCurrentStory)?;
        let id = current.id;
        let content = current.content.clone();

        let saved = self
            .authed(|api, token| {
                let patch = UpdateStoryRequest {
                    title: None,
                    content: Some(content.clone()),
                };
                async move { api.update_story(&token, id, &patch).await }
            })
            .await?;
        self.dispatch(Action::StorySaved(saved));
        Ok(())
    }

    pub async fn create_story(&mut self, title: &str, content: &str) -> Result<StoryId, ClientError> {
        let story = self
            .authed(|api, token| {
                let (title, content) = (title.to_string(), content.to_string());
                async move { api.create_story(&token, &title, &content).await }
            })
            .await?;
        let id = story.id;
        self.dispatch(Action::StorySaved(story));
        Ok(id)
    }

    pub async fn delete_story(&mut self, id: StoryId) -> Result<(), ClientError> {
        self.authed(|api, token| async move { api.delete_story(&token, id).await })
            .await?;
        self.dispatch(Action::StoryRemoved(id));
        Ok(())
    }

    pub async fn contributors(&mut self, story_id: StoryId) -> Result<Vec<Contributor>, ClientError> {
        self.authed(|api, token| async move { api.list_contributors(&token, story_id).await })
            .await
    }

    pub async fn add_contributor(&mut self, story_id: StoryId, user_id: UserId) -> Result<Contributor, ClientError> {
        self.authed(|api, token| async move { api.add_contributor(&token, story_id, user_id).await })
            .await
    }

    pub async fn remove_contributor(&mut self, story_id: StoryId, edge_id: ContributorId) -> Result<(), ClientError> {
        self.authed(|api, token| async move { api.remove_contributor(&token, story_id, edge_id).await })
            .await
            .map(|_| ())
    }
}
