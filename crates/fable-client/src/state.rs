use fable_types::StoryId;
use fable_types::api::MeResponse;
use fable_types::models::Story;

#[derive(Debug, Clone, Default)]
pub struct UserState {
    pub user: Option<MeResponse>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StoryState {
    pub stories: Vec<Story>,
    pub current_story: Option<Story>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub user: UserState,
    pub story: StoryState,
}

#[derive(Debug, Clone)]
pub enum Action {
    LoginPending,
    LoginFulfilled(MeResponse),
    LoginRejected(String),
    Logout,
    StoriesPending,
    StoriesFulfilled(Vec<Story>),
    StoriesRejected(String),
    SetCurrentStory(Story),
    /// Local edit of the open story; nothing is sent until it is saved.
    UpdateCurrentStoryContent(String),
    StorySaved(Story),
    StoryRemoved(StoryId),
}

/// The only way state changes. Pure: no I/O, no clock.
pub fn reduce(mut state: ClientState, action: Action) -> ClientState {
    let ClientState { user, story } = &mut state;
    match action {
        Action::LoginPending => {
            user.loading = true;
            user.error = None;
        }
        Action::LoginFulfilled(me) => {
            user.user = Some(me);
            user.is_authenticated = true;
            user.loading = false;
            user.error = None;
        }
        Action::LoginRejected(message) => {
            user.user = None;
            user.is_authenticated = false;
            user.loading = false;
            user.error = Some(message);
        }
        Action::Logout => {
            // Another account must not see the previous one's stories.
            return ClientState::default();
        }
        Action::StoriesPending => {
            story.loading = true;
            story.error = None;
        }
        Action::StoriesFulfilled(stories) => {
            story.stories = stories;
            story.loading = false;
        }
        Action::StoriesRejected(message) => {
            story.loading = false;
            story.error = Some(message);
        }
        Action::SetCurrentStory(current) => {
            story.current_story = Some(current);
        }
        Action::UpdateCurrentStoryContent(content) => {
            if let Some(current) = story.current_story.as_mut() {
                current.content = content;
            }
        }
        Action::StorySaved(saved) => {
            match story.stories.iter_mut().find(|s| s.id == saved.id) {
                Some(existing) => *existing = saved.clone(),
                None => story.stories.insert(0, saved.clone()),
            }
            if story.current_story.as_ref().is_some_and(|c| c.id == saved.id) {
                story.current_story = Some(saved);
            }
        }
        Action::StoryRemoved(id) => {
            story.stories.retain(|s| s.id != id);
            if story.current_story.as_ref().is_some_and(|c| c.id == id) {
                story.current_story = None;
            }
        }
    }
    state
}
