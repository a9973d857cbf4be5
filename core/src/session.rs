//! The explicit request context: client, transport, cache and adapters.
//!
//! # Design
//! A `Session` is built once with [`SessionBuilder`], passed by reference
//! to whatever needs data, and torn down with [`Session::logout`]. It
//! owns the only query cache; token storage, notifications, transport and
//! time are injected capabilities.
//!
//! Queries read through the cache: a fresh entry is served without a
//! network call, anything else is refetched and stored. Mutations go
//! straight to the network; only after the server answers with a 2xx do
//! they invalidate their declared keys and report success.
//!
//! A 401 on any request clears the stored tokens and fires the
//! `on_unauthorized` callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{Clock, QueryCache, SystemClock};
use crate::client::{check_status, ApiClient};
use crate::config::ApiConfig;
use crate::descriptor::{MutationDescriptor, QueryDescriptor};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::keys::CacheKey;
use crate::notify::{Notifier, TracingNotifier};
use crate::services::{Service, ServiceRegistry};
use crate::tokens::{MemoryStore, StorageTokenStore, TokenStore};
use crate::transport::{Transport, UreqTransport};

type UnauthorizedHook = Box<dyn Fn() + Send + Sync>;

pub struct SessionBuilder {
    config: ApiConfig,
    timeouts: Vec<(Service, Duration)>,
    transport: Option<Arc<dyn Transport>>,
    tokens: Option<Arc<dyn TokenStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl SessionBuilder {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            timeouts: Vec::new(),
            transport: None,
            tokens: None,
            notifier: None,
            clock: None,
            on_unauthorized: None,
        }
    }

    pub fn service_timeout(mut self, service: Service, timeout: Duration) -> Self {
        self.timeouts.push((service, timeout));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn on_unauthorized(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Box::new(hook));
        self
    }

    /// Unset capabilities fall back to ureq, in-memory tokens, tracing
    /// notifications and the system clock.
    pub fn build(self) -> Session {
        let registry = self
            .timeouts
            .into_iter()
            .fold(ServiceRegistry::new(&self.config), |registry, (service, timeout)| {
                registry.with_timeout(service, timeout)
            });
        let client = ApiClient::new(registry, self.config.default_headers.clone());
        Session {
            client,
            config: self.config,
            transport: self.transport.unwrap_or_else(|| Arc::new(UreqTransport::new())),
            tokens: self
                .tokens
                .unwrap_or_else(|| Arc::new(StorageTokenStore::new(MemoryStore::new()))),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache: Mutex::new(QueryCache::new()),
            on_unauthorized: self.on_unauthorized,
        }
    }
}

pub struct Session {
    client: ApiClient,
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    cache: Mutex<QueryCache>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl Session {
    pub fn builder(config: ApiConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    fn cache(&self) -> MutexGuard<'_, QueryCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stale_time(&self, query: &QueryDescriptor) -> Duration {
        query.stale_time().unwrap_or(self.config.stale_time)
    }

    pub fn query<T: DeserializeOwned>(&self, descriptor: QueryDescriptor) -> Query<'_, T> {
        Query {
            session: self,
            descriptor,
            data: None,
            error: None,
            status: QueryStatus::Pending,
        }
    }

    pub fn mutation(&self, descriptor: MutationDescriptor) -> Mutation<'_> {
        Mutation {
            session: self,
            descriptor,
            pending: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// Serves `query` from the cache while fresh, otherwise refetches.
    pub fn fetch<T: DeserializeOwned>(&self, query: &QueryDescriptor) -> Result<T, ApiError> {
        let cached = self
            .cache()
            .lookup_fresh(query.key(), self.stale_time(query), self.clock.now())
            .cloned();
        if let Some(value) = cached {
            tracing::debug!(key = %query.key(), "cache hit");
            return decode(value);
        }
        self.refetch(query)
    }

    /// Always hits the network and replaces the cached entry on success.
    pub fn refetch<T: DeserializeOwned>(&self, query: &QueryDescriptor) -> Result<T, ApiError> {
        let token = self.tokens.access_token();
        let request = self.client.build_query(query, token.as_deref());
        let response = self.execute(&request)?;
        let value: Value = self.client.parse(response).inspect_err(|e| {
            tracing::warn!(key = %query.key(), error = %e, "query failed");
        })?;
        self.cache()
            .store(query.key().clone(), value.clone(), self.clock.now());
        decode(value)
    }

    /// Runs a mutation with a JSON body and decodes the response.
    pub fn mutate<B, T>(&self, mutation: &MutationDescriptor, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.run_mutation(mutation, Some(body), |response| self.client.parse(response))
    }

    /// Runs a body-less mutation, typically a delete, ignoring the response body.
    pub fn mutate_without_body(&self, mutation: &MutationDescriptor) -> Result<(), ApiError> {
        self.run_mutation(mutation, None::<&()>, |response| self.client.parse_empty(response))
    }

    /// A 2xx reply counts as success: the declared keys are invalidated and
    /// the success message is shown before the body is decoded. A body that
    /// fails to decode is returned as an error without a second notification.
    fn run_mutation<B, R>(
        &self,
        mutation: &MutationDescriptor,
        body: Option<&B>,
        parse: impl FnOnce(HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = match self.send_mutation(mutation, body) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %mutation.method(), service = %mutation.service(), path = mutation.path(), error = %e, "mutation failed");
                self.notifier.error(mutation.error_message());
                return Err(e);
            }
        };
        for key in mutation.invalidates() {
            self.invalidate(key);
        }
        tracing::info!(method = %mutation.method(), service = %mutation.service(), path = mutation.path(), "mutation succeeded");
        self.notifier.success(mutation.success_message());
        parse(response).inspect_err(|e| {
            tracing::warn!(method = %mutation.method(), path = mutation.path(), error = %e, "mutation response not decodable");
        })
    }

    fn send_mutation<B>(&self, mutation: &MutationDescriptor, body: Option<&B>) -> Result<HttpResponse, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.tokens.access_token();
        let request = self.client.build_mutation(mutation, body, token.as_deref())?;
        let response = self.execute(&request)?;
        check_status(&response)?;
        Ok(response)
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.transport.execute(request)?;
        if response.status == 401 {
            self.handle_unauthorized();
        }
        Ok(response)
    }

    fn handle_unauthorized(&self) {
        tracing::warn!("server rejected credentials, clearing tokens");
        self.tokens.clear_tokens();
        if let Some(hook) = &self.on_unauthorized {
            hook();
        }
    }

    /// Marks every cached entry under `key` stale.
    pub fn invalidate(&self, key: &CacheKey) -> usize {
        let count = self.cache().invalidate(key);
        tracing::debug!(%key, count, "invalidated");
        count
    }

    /// Replaces the cached entry for `key` with `data`, fresh as of now.
    pub fn set_query_data<T: Serialize + ?Sized>(&self, key: &CacheKey, data: &T) -> Result<(), ApiError> {
        let value = serde_json::to_value(data).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.cache().store(key.clone(), value, self.clock.now());
        Ok(())
    }

    /// Cached data for `key`, fresh or stale. `Ok(None)` when nothing is cached.
    pub fn query_data<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, ApiError> {
        let Some(value) = self.cache().lookup(key).cloned() else {
            return Ok(None);
        };
        decode(value).map(Some).inspect_err(|e| {
            tracing::warn!(%key, error = %e, "cached data does not match the requested type");
        })
    }

    pub fn is_stale(&self, query: &QueryDescriptor) -> bool {
        self.cache()
            .is_stale(query.key(), self.stale_time(query), self.clock.now())
    }

    /// Evicts cache entries older than the configured gc time.
    pub fn collect_garbage(&self) -> usize {
        let evicted = self
            .cache()
            .collect_garbage(self.config.gc_time, self.clock.now());
        if evicted > 0 {
            tracing::debug!(evicted, "cache garbage collected");
        }
        evicted
    }

    /// Ends the session: tokens and every cached query are dropped.
    pub fn logout(&self) {
        self.tokens.clear_tokens();
        self.cache().clear();
        self.notifier.info("Tokens cleared successfully");
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No data has been fetched yet.
    Pending,
    Success,
    Error,
}

/// A query bound to a session, tracking its last outcome.
pub struct Query<'s, T> {
    session: &'s Session,
    descriptor: QueryDescriptor,
    data: Option<T>,
    error: Option<ApiError>,
    status: QueryStatus,
}

impl<'s, T: DeserializeOwned> Query<'s, T> {
    pub fn fetch(&mut self) -> Result<&T, ApiError> {
        let result = self.session.fetch(&self.descriptor);
        self.settle(result)
    }

    pub fn refetch(&mut self) -> Result<&T, ApiError> {
        let result = self.session.refetch(&self.descriptor);
        self.settle(result)
    }

    // Failed fetches keep the last good data around.
    fn settle(&mut self, result: Result<T, ApiError>) -> Result<&T, ApiError> {
        match result {
            Ok(data) => {
                self.error = None;
                self.status = QueryStatus::Success;
                Ok(self.data.insert(data))
            }
            Err(e) => {
                self.error = Some(e.clone());
                self.status = QueryStatus::Error;
                Err(e)
            }
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_stale(&self) -> bool {
        self.session.is_stale(&self.descriptor)
    }
}

/// A mutation bound to a session. Shareable across threads so one can
/// watch `is_pending` while another runs it.
pub struct Mutation<'s> {
    session: &'s Session,
    descriptor: MutationDescriptor,
    pending: AtomicBool,
    error: Mutex<Option<ApiError>>,
}

impl<'s> Mutation<'s> {
    pub fn mutate<B, T>(&self, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.track(|| self.session.mutate(&self.descriptor, body))
    }

    pub fn mutate_without_body(&self) -> Result<(), ApiError> {
        self.track(|| self.session.mutate_without_body(&self.descriptor))
    }

    fn track<R>(&self, run: impl FnOnce() -> Result<R, ApiError>) -> Result<R, ApiError> {
        self.pending.store(true, Ordering::SeqCst);
        let outcome = run();
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = outcome.as_ref().err().cloned();
        self.pending.store(false, Ordering::SeqCst);
        outcome
    }

    pub fn descriptor(&self) -> &MutationDescriptor {
        &self.descriptor
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<ApiError> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reset(&self) {
        *self.error.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;
    use crate::cache::ManualClock;
    use crate::http::HttpMethod;
    use crate::keys;
    use crate::notify::{Level, RecordingNotifier};
    use crate::resources;
    use crate::types::{Comment, CreatePost, Post, Profile, UpdateProfile};

    type Responder = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

    struct ScriptedTransport {
        requests: Mutex<Vec<HttpRequest>>,
        respond: Responder,
    }

    impl ScriptedTransport {
        fn new(respond: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn count(&self, method: HttpMethod) -> usize {
            self.requests().iter().filter(|r| r.method == method).count()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok((self.respond)(request))
        }
    }

    fn reply(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn post(id: u64) -> Value {
        json!({ "id": id, "userId": 1, "title": format!("post {id}"), "body": "…" })
    }

    struct Harness {
        session: Session,
        transport: Arc<ScriptedTransport>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn harness(respond: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Harness {
        let transport = ScriptedTransport::new(respond);
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(ManualClock::new());
        let session = Session::builder(
            ApiConfig::new("http://api.test").with_stale_time(Duration::from_secs(60)),
        )
        .transport(transport.clone())
        .notifier(notifier.clone())
        .clock(clock.clone())
        .build();
        Harness {
            session,
            transport,
            notifier,
            clock,
        }
    }

    fn posts_backend(request: &HttpRequest) -> HttpResponse {
        match request.method {
            HttpMethod::Get => reply(200, json!([post(1), post(2)])),
            HttpMethod::Post => {
                let mut created: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
                created["id"] = json!(101);
                reply(201, created)
            }
            _ => reply(200, json!({})),
        }
    }

    #[test]
    fn create_sends_exactly_one_post_with_payload() {
        let h = harness(posts_backend);
        let input = CreatePost {
            title: "New Post".to_string(),
            body: "Content".to_string(),
            user_id: 1,
        };
        let created: Post = h.session.mutate(&resources::posts::create().unwrap(), &input).unwrap();
        assert_eq!(created.id, 101);

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].url, "http://api.test/posts");
        let sent: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, serde_json::to_value(&input).unwrap());
        assert_eq!(
            h.notifier.drain(),
            vec![(Level::Success, "Post created successfully!".to_string())]
        );
    }

    #[test]
    fn successful_mutation_makes_query_refetch() {
        let h = harness(posts_backend);
        let list = resources::posts::list().unwrap();

        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        assert_eq!(h.transport.count(HttpMethod::Get), 1);

        let input = CreatePost {
            title: "t".to_string(),
            body: "b".to_string(),
            user_id: 1,
        };
        let _: Post = h.session.mutate(&resources::posts::create().unwrap(), &input).unwrap();
        assert!(h.session.is_stale(&list));

        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        assert_eq!(h.transport.count(HttpMethod::Get), 2);
    }

    #[test]
    fn deleted_comment_disappears_after_refetch() {
        let comments = Arc::new(Mutex::new(vec![
            json!({ "id": 4, "postId": 1, "name": "a", "email": "a@x.io", "body": "x" }),
            json!({ "id": 5, "postId": 1, "name": "b", "email": "b@x.io", "body": "y" }),
            json!({ "id": 6, "postId": 2, "name": "c", "email": "c@x.io", "body": "z" }),
        ]));
        let backend = comments.clone();
        let h = harness(move |request| {
            let mut rows = backend.lock().unwrap();
            match request.method {
                HttpMethod::Get => {
                    let filtered: Vec<Value> = rows.iter().filter(|c| c["postId"] == 1).cloned().collect();
                    reply(200, Value::Array(filtered))
                }
                HttpMethod::Delete => {
                    let id: u64 = request.url.rsplit('/').next().unwrap().parse().unwrap();
                    rows.retain(|c| c["id"] != id);
                    reply(200, json!({}))
                }
                _ => reply(405, json!({})),
            }
        });

        let by_post = resources::comments::by_post(1).unwrap();
        let before: Vec<Comment> = h.session.fetch(&by_post).unwrap();
        assert!(before.iter().any(|c| c.id == 5));

        h.session
            .mutate_without_body(&resources::comments::delete(5).unwrap())
            .unwrap();
        let delete = h.transport.requests().last().cloned().unwrap();
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.url, "http://api.test/comments/5");

        let after: Vec<Comment> = h.session.fetch(&by_post).unwrap();
        assert!(after.iter().all(|c| c.id != 5));
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn profile_update_is_partial_and_replaces_cached_profile() {
        let profile = json!({
            "id": 3, "name": "Clementine", "username": "Samantha", "email": "n@y.net",
            "phone": "1", "website": "r.info",
            "address": {"street": "s", "suite": "x", "city": "c", "zipcode": "z"},
            "company": {"name": "R", "catchPhrase": "f", "bs": "e"}
        });
        let h = harness(move |request| match request.method {
            HttpMethod::Put => {
                let patch: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
                let mut merged = profile.clone();
                merged["name"] = patch["name"].clone();
                reply(200, merged)
            }
            _ => reply(200, profile.clone()),
        });

        let detail = resources::profiles::get(3).unwrap();
        let before: Profile = h.session.fetch(&detail).unwrap();
        assert_eq!(before.name, "Clementine");

        let update = UpdateProfile {
            name: Some("X".to_string()),
            ..UpdateProfile::default()
        };
        let updated: Profile = h.session.mutate(&resources::profiles::update(3).unwrap(), &update).unwrap();
        h.session.set_query_data(detail.key(), &updated).unwrap();

        let put = h.transport.requests().last().cloned().unwrap();
        assert_eq!(put.url, "http://api.test/users/3");
        assert_eq!(
            serde_json::from_str::<Value>(put.body.as_deref().unwrap()).unwrap(),
            json!({ "name": "X" })
        );

        let cached: Profile = h.session.fetch(&detail).unwrap();
        assert_eq!(cached.name, "X");
        assert_eq!(h.transport.count(HttpMethod::Get), 1);
    }

    #[test]
    fn stale_time_controls_network_calls() {
        let h = harness(posts_backend);
        let list = resources::posts::list().unwrap();

        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        h.clock.advance(Duration::from_secs(30));
        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        assert_eq!(h.transport.count(HttpMethod::Get), 1);

        h.clock.advance(Duration::from_secs(30));
        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        assert_eq!(h.transport.count(HttpMethod::Get), 2);
    }

    #[test]
    fn per_query_stale_time_overrides_default() {
        let h = harness(posts_backend);
        let list = resources::posts::list().unwrap().with_stale_time(Duration::from_secs(5));

        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        h.clock.advance(Duration::from_secs(5));
        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        assert_eq!(h.transport.count(HttpMethod::Get), 2);
    }

    #[test]
    fn failed_mutation_reports_error_and_keeps_cache() {
        let h = harness(|request| match request.method {
            HttpMethod::Get => reply(200, json!([post(1)])),
            _ => reply(500, json!({ "error": "boom" })),
        });
        let list = resources::posts::list().unwrap();
        let _: Vec<Post> = h.session.fetch(&list).unwrap();

        let err = h
            .session
            .mutate_without_body(&resources::posts::delete(1).unwrap())
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
        assert!(!h.session.is_stale(&list));
        assert_eq!(
            h.notifier.drain(),
            vec![(Level::Error, "Failed to delete post".to_string())]
        );
    }

    #[test]
    fn undecodable_success_body_still_counts_as_applied() {
        let h = harness(|request| match request.method {
            HttpMethod::Get => reply(200, json!([post(1)])),
            _ => HttpResponse {
                status: 201,
                headers: Vec::new(),
                body: "created".to_string(),
            },
        });
        let list = resources::posts::list().unwrap();
        let _: Vec<Post> = h.session.fetch(&list).unwrap();

        let input = CreatePost {
            title: "t".to_string(),
            body: "b".to_string(),
            user_id: 1,
        };
        let err = h
            .session
            .mutate::<_, Post>(&resources::posts::create().unwrap(), &input)
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
        assert!(h.session.is_stale(&list));
        assert_eq!(
            h.notifier.drain(),
            vec![(Level::Success, "Post created successfully!".to_string())]
        );
    }

    #[test]
    fn query_data_reports_type_mismatch() {
        let h = harness(posts_backend);
        let list = resources::posts::list().unwrap();
        assert_eq!(h.session.query_data::<Vec<Post>>(list.key()).unwrap(), None);

        let _: Vec<Post> = h.session.fetch(&list).unwrap();
        assert_eq!(h.session.query_data::<Vec<Post>>(list.key()).unwrap().map(|p| p.len()), Some(2));
        let err = h.session.query_data::<Profile>(list.key()).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn unauthorized_clears_tokens_and_fires_hook() {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook_count = fired.clone();
        let transport = ScriptedTransport::new(|_| reply(401, json!({})));
        let session = Session::builder(ApiConfig::new("http://api.test"))
            .transport(transport.clone())
            .notifier(Arc::new(RecordingNotifier::new()))
            .on_unauthorized(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        session.tokens().set_access_token("abc");

        let err = session
            .fetch::<Vec<Post>>(&resources::posts::list().unwrap())
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(transport.requests()[0].header("authorization"), Some("Bearer abc"));
        assert_eq!(session.tokens().access_token(), None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn query_handle_tracks_status() {
        let h = harness(|request| {
            if request.url.ends_with("/posts/1") {
                reply(200, post(1))
            } else {
                reply(404, json!({}))
            }
        });

        let mut found = h.session.query::<Post>(resources::posts::get(1).unwrap());
        assert!(found.is_loading());
        assert_eq!(found.fetch().unwrap().id, 1);
        assert_eq!(found.status(), QueryStatus::Success);
        assert!(found.error().is_none());

        let mut missing = h.session.query::<Post>(resources::posts::get(2).unwrap());
        assert!(missing.fetch().unwrap_err().is_not_found());
        assert_eq!(missing.status(), QueryStatus::Error);
        assert!(missing.data().is_none());
    }

    #[test]
    fn refetch_bypasses_fresh_cache() {
        let h = harness(posts_backend);
        let mut posts = h.session.query::<Vec<Post>>(resources::posts::list().unwrap());
        posts.fetch().unwrap();
        posts.refetch().unwrap();
        assert_eq!(h.transport.count(HttpMethod::Get), 2);
        assert!(!posts.is_stale());
    }

    #[test]
    fn mutation_handle_keeps_last_error_until_reset() {
        let h = harness(|_| reply(500, json!({})));
        let delete = h.session.mutation(resources::posts::delete(1).unwrap());
        assert!(delete.mutate_without_body().is_err());
        assert!(!delete.is_pending());
        assert!(matches!(delete.error(), Some(ApiError::HttpError { status: 500, .. })));
        delete.reset();
        assert!(delete.error().is_none());
    }

    #[test]
    fn logout_clears_tokens_and_cache() {
        let h = harness(posts_backend);
        h.session.tokens().set_access_token("abc");
        let list = resources::posts::list().unwrap();
        let _: Vec<Post> = h.session.fetch(&list).unwrap();

        h.session.logout();
        assert_eq!(h.session.tokens().access_token(), None);
        assert!(h.session.query_data::<Vec<Post>>(list.key()).unwrap().is_none());
        assert_eq!(
            h.notifier.drain(),
            vec![(Level::Info, "Tokens cleared successfully".to_string())]
        );
    }

    #[test]
    fn garbage_collection_uses_configured_window() {
        let h = harness(posts_backend);
        let _: Vec<Post> = h.session.fetch(&resources::posts::list().unwrap()).unwrap();
        h.clock.advance(Duration::from_secs(10 * 60));
        assert_eq!(h.session.collect_garbage(), 1);
        assert!(h.session.query_data::<Vec<Post>>(&keys::posts::all()).unwrap().is_none());
    }

    #[test]
    fn session_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Session>();
        assert_send_sync::<Mutation<'static>>();
    }
}
