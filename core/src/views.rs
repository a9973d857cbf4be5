//! Headless view models for the posts and profile pages.
//!
//! Each page turns query outcomes into a [`ViewState`] and routes form
//! submissions through the matching mutation. Rendering is left to
//! whatever front end sits on top.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::keys;
use crate::resources;
use crate::session::{Query, QueryStatus, Session};
use crate::types::{
    Album, Comment, CreateComment, CreatePost, Post, Profile, Todo, UpdateComment, UpdatePost,
    UpdateProfile,
};

/// Posts shown on the first page of the posts list.
pub const POSTS_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState<T> {
    Loading,
    Failed(String),
    /// The request succeeded but there is nothing to show.
    Empty,
    Ready(T),
}

impl<T> ViewState<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ViewState<U> {
        match self {
            ViewState::Loading => ViewState::Loading,
            ViewState::Failed(message) => ViewState::Failed(message),
            ViewState::Empty => ViewState::Empty,
            ViewState::Ready(value) => ViewState::Ready(f(value)),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Clone + DeserializeOwned> ViewState<T> {
    /// Snapshot of a single-item query. 404 renders as `Empty`.
    pub fn from_query(query: &Query<'_, T>) -> Self {
        match (query.status(), query.data(), query.error()) {
            (QueryStatus::Pending, _, _) => ViewState::Loading,
            (_, _, Some(e)) if e.is_not_found() => ViewState::Empty,
            (_, _, Some(e)) => ViewState::Failed(e.to_string()),
            (_, Some(data), None) => ViewState::Ready(data.clone()),
            (_, None, None) => ViewState::Empty,
        }
    }
}

impl<T: Clone + DeserializeOwned> ViewState<Vec<T>> {
    /// Snapshot of a list query. An empty list renders as `Empty`.
    pub fn from_list(query: &Query<'_, Vec<T>>) -> Self {
        match ViewState::from_query(query) {
            ViewState::Ready(items) if items.is_empty() => ViewState::Empty,
            state => state,
        }
    }
}

/// Runs the query once. Failures are kept on the handle and surface as
/// `Failed` or `Empty`.
fn load<T: DeserializeOwned>(query: &mut Query<'_, T>) {
    if let Some(e) = query.fetch().err() {
        tracing::debug!(key = %query.descriptor().key(), error = %e, "view query failed");
    }
}

fn settle<T: Clone + DeserializeOwned>(mut query: Query<'_, T>) -> ViewState<T> {
    load(&mut query);
    ViewState::from_query(&query)
}

fn settle_list<T: Clone + DeserializeOwned>(mut query: Query<'_, Vec<T>>) -> ViewState<Vec<T>> {
    load(&mut query);
    ViewState::from_list(&query)
}

/// The posts list with its comments panel.
pub struct PostsPage<'s> {
    session: &'s Session,
}

impl<'s> PostsPage<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    pub fn posts(&self) -> Result<ViewState<Vec<Post>>, ApiError> {
        let query = self.session.query(resources::posts::list()?);
        Ok(settle_list(query).map(|mut posts| {
            posts.truncate(POSTS_PAGE_SIZE);
            posts
        }))
    }

    pub fn post(&self, id: u64) -> Result<ViewState<Post>, ApiError> {
        Ok(settle(self.session.query(resources::posts::get(id)?)))
    }

    /// Comments for one post, queried per post rather than filtered
    /// client-side from the full list.
    pub fn comments_for(&self, post_id: u64) -> Result<ViewState<Vec<Comment>>, ApiError> {
        Ok(settle_list(self.session.query(resources::comments::by_post(post_id)?)))
    }

    pub fn create_post(&self, input: &CreatePost) -> Result<Post, ApiError> {
        self.session.mutation(resources::posts::create()?).mutate(input)
    }

    pub fn update_post(&self, id: u64, input: &UpdatePost) -> Result<Post, ApiError> {
        self.session.mutation(resources::posts::update(id)?).mutate(input)
    }

    pub fn delete_post(&self, id: u64) -> Result<(), ApiError> {
        self.session
            .mutation(resources::posts::delete(id)?)
            .mutate_without_body()
    }

    pub fn add_comment(&self, input: &CreateComment) -> Result<Comment, ApiError> {
        self.session.mutation(resources::comments::create()?).mutate(input)
    }

    pub fn update_comment(&self, id: u64, input: &UpdateComment) -> Result<Comment, ApiError> {
        self.session.mutation(resources::comments::update(id)?).mutate(input)
    }

    pub fn delete_comment(&self, id: u64) -> Result<(), ApiError> {
        self.session
            .mutation(resources::comments::delete(id)?)
            .mutate_without_body()
    }
}

/// Completion figures for a user's todo tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodoSummary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Rounded to the nearest whole percent; zero when there are no todos.
    pub percent_complete: u8,
}

impl From<&[Todo]> for TodoSummary {
    fn from(todos: &[Todo]) -> Self {
        let total = todos.len();
        let completed = todos.iter().filter(|todo| todo.completed).count();
        let percent_complete = if total == 0 {
            0
        } else {
            ((completed * 200 + total) / (total * 2)) as u8
        };
        Self {
            total,
            completed,
            pending: total - completed,
            percent_complete,
        }
    }
}

/// A user profile and its posts, albums and todos tabs.
pub struct ProfilePage<'s> {
    session: &'s Session,
    user_id: u64,
}

impl<'s> ProfilePage<'s> {
    pub fn new(session: &'s Session, user_id: u64) -> Self {
        Self { session, user_id }
    }

    pub fn profile(&self) -> Result<ViewState<Profile>, ApiError> {
        Ok(settle(self.session.query(resources::profiles::get(self.user_id)?)))
    }

    pub fn posts(&self) -> Result<ViewState<Vec<Post>>, ApiError> {
        Ok(settle_list(self.session.query(resources::profiles::posts(self.user_id)?)))
    }

    pub fn albums(&self) -> Result<ViewState<Vec<Album>>, ApiError> {
        Ok(settle_list(self.session.query(resources::profiles::albums(self.user_id)?)))
    }

    pub fn todos(&self) -> Result<ViewState<(Vec<Todo>, TodoSummary)>, ApiError> {
        let state = settle_list(self.session.query(resources::profiles::todos(self.user_id)?));
        Ok(state.map(|todos| {
            let summary = TodoSummary::from(todos.as_slice());
            (todos, summary)
        }))
    }

    /// Sends a partial update and writes the returned profile back into
    /// the cache, so the next read needs no round-trip.
    pub fn update(&self, input: &UpdateProfile) -> Result<Profile, ApiError> {
        let profile: Profile = self
            .session
            .mutation(resources::profiles::update(self.user_id)?)
            .mutate(input)?;
        self.session
            .set_query_data(&keys::profiles::detail(self.user_id), &profile)?;
        Ok(profile)
    }
}
