//! Typed request layer for the JSONPlaceholder demo backend.
//!
//! # Overview
//! Posts, comments, profiles, albums, photos and todos are described as
//! query and mutation descriptors ([`resources`]). A [`Session`] runs them:
//! queries read through an in-memory cache with a stale time, mutations
//! invalidate the cache keys they declare once the server accepts them.
//!
//! # Design
//! - `ApiClient` stays sans-IO: it builds `HttpRequest` values and parses
//!   `HttpResponse` values. A `Transport` does the round-trip.
//! - Cache keys come from one builder per resource ([`keys`]), so a query
//!   and the mutations that invalidate it cannot drift apart.
//! - Tokens, notifications, transport and time are injected capabilities
//!   handed to the session at construction; there is no global state.
//! - DTOs are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod cache;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod keys;
pub mod notify;
pub mod resources;
pub mod services;
pub mod session;
pub mod tokens;
pub mod transport;
pub mod types;
pub mod views;

pub use cache::{Clock, ManualClock, QueryCache, SystemClock};
pub use client::ApiClient;
pub use config::{ApiConfig, ConfigError};
pub use descriptor::{MutationDescriptor, QueryDescriptor};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use keys::CacheKey;
pub use notify::{Level, Notifier, RecordingNotifier, TracingNotifier};
pub use services::{Service, ServiceConfig, ServiceRegistry};
pub use session::{Mutation, Query, QueryStatus, Session, SessionBuilder};
pub use tokens::{FileStore, KeyValueStore, MemoryStore, StorageTokenStore, TokenStore};
pub use transport::{Transport, UreqTransport};
pub use types::*;
pub use views::{PostsPage, ProfilePage, TodoSummary, ViewState};
