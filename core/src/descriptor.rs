//! Strongly typed request descriptors.
//!
//! # Design
//! A descriptor says what a query or mutation does without doing it: the
//! service, the relative path, the cache key it reads or the keys it
//! invalidates, and for mutations the messages shown on success and
//! failure. Constructors validate the shape once so the session can trust
//! every descriptor it receives.

use std::time::Duration;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::keys::CacheKey;
use crate::services::Service;

/// A read against one service, cached under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    service: Service,
    key: CacheKey,
    path: String,
    stale_time: Option<Duration>,
}

impl QueryDescriptor {
    pub fn new(service: Service, key: CacheKey, path: impl Into<String>) -> Result<Self, ApiError> {
        let path = path.into();
        validate_key(&key)?;
        validate_path(&path)?;
        Ok(Self {
            service,
            key,
            path,
            stale_time: None,
        })
    }

    /// Overrides the session-wide stale time for this query only.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stale_time(&self) -> Option<Duration> {
        self.stale_time
    }
}

/// A write against one service and the cache keys it makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDescriptor {
    service: Service,
    method: HttpMethod,
    path: String,
    invalidates: Vec<CacheKey>,
    success_message: String,
    error_message: String,
}

impl MutationDescriptor {
    pub fn new(
        service: Service,
        method: HttpMethod,
        path: impl Into<String>,
        invalidates: Vec<CacheKey>,
        success_message: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let path = path.into();
        if method == HttpMethod::Get {
            return Err(ApiError::InvalidDescriptor(
                "mutations cannot use GET".to_string(),
            ));
        }
        validate_path(&path)?;
        if invalidates.is_empty() {
            return Err(ApiError::InvalidDescriptor(format!(
                "{method} {service}{path} invalidates nothing"
            )));
        }
        for key in &invalidates {
            validate_key(key)?;
        }
        Ok(Self {
            service,
            method,
            path,
            invalidates,
            success_message: success_message.into(),
            error_message: error_message.into(),
        })
    }

    /// Adds another key to invalidate on success. Duplicates are ignored.
    pub fn invalidating(mut self, key: CacheKey) -> Result<Self, ApiError> {
        validate_key(&key)?;
        if !self.invalidates.contains(&key) {
            self.invalidates.push(key);
        }
        Ok(self)
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn invalidates(&self) -> &[CacheKey] {
        &self.invalidates
    }

    pub fn success_message(&self) -> &str {
        &self.success_message
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}

fn validate_key(key: &CacheKey) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::InvalidDescriptor("cache key is empty".to_string()));
    }
    if key.segments().iter().any(String::is_empty) {
        return Err(ApiError::InvalidDescriptor(format!(
            "cache key {key} has an empty segment"
        )));
    }
    Ok(())
}

/// Paths are relative to the service base URL: empty, `/…` or `?…`.
fn validate_path(path: &str) -> Result<(), ApiError> {
    if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        return Ok(());
    }
    Err(ApiError::InvalidDescriptor(format!(
        "path {path:?} must be empty or start with '/' or '?'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    #[test]
    fn query_rejects_empty_key() {
        let err = QueryDescriptor::new(Service::Posts, CacheKey::new(Vec::<String>::new()), "")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidDescriptor(_)));
    }

    #[test]
    fn query_rejects_blank_segment() {
        let err = QueryDescriptor::new(Service::Posts, CacheKey::new(["posts", ""]), "/1")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidDescriptor(_)));
    }

    #[test]
    fn query_rejects_absolute_url() {
        let err = QueryDescriptor::new(Service::Posts, keys::posts::all(), "http://evil/posts")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidDescriptor(_)));
    }

    #[test]
    fn query_accepts_query_string_path() {
        let query =
            QueryDescriptor::new(Service::Comments, keys::comments::by_post(1), "?postId=1").unwrap();
        assert_eq!(query.path(), "?postId=1");
        assert_eq!(query.stale_time(), None);
    }

    #[test]
    fn mutation_rejects_get() {
        let err = MutationDescriptor::new(
            Service::Posts,
            HttpMethod::Get,
            "",
            vec![keys::posts::all()],
            "ok",
            "failed",
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidDescriptor(_)));
    }

    #[test]
    fn mutation_requires_an_invalidation_target() {
        let err =
            MutationDescriptor::new(Service::Posts, HttpMethod::Post, "", Vec::new(), "ok", "failed")
                .unwrap_err();
        assert!(matches!(err, ApiError::InvalidDescriptor(_)));
    }

    #[test]
    fn invalidating_skips_duplicates() {
        let mutation = MutationDescriptor::new(
            Service::Posts,
            HttpMethod::Delete,
            "/1",
            vec![keys::posts::all()],
            "ok",
            "failed",
        )
        .unwrap()
        .invalidating(keys::posts::all())
        .unwrap()
        .invalidating(keys::posts::by_user(1))
        .unwrap();
        assert_eq!(mutation.invalidates().len(), 2);
    }
}
