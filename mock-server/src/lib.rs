//! In-process replica of the JSONPlaceholder REST surface.
//!
//! Rows are stored as JSON objects per resource so one set of handlers
//! serves posts, comments, users, albums, photos and todos. Writes behave
//! like the real backend's fake writes except that they persist for the
//! lifetime of the router, which is what the client tests need.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const RESOURCES: [&str; 6] = ["posts", "comments", "users", "albums", "photos", "todos"];

/// Every resource table, keyed by id so listings come out ordered.
#[derive(Debug, Clone)]
pub struct Db {
    tables: HashMap<&'static str, Table>,
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: BTreeMap<u64, Value>,
    /// Highest id ever stored; deleted ids are never handed out again.
    last_id: u64,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            tables: RESOURCES.iter().map(|name| (*name, Table::default())).collect(),
        }
    }
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `row` under `resource`, assigning the next id when it has none.
    /// Returns `None` for unknown resources or non-object rows.
    pub fn insert(&mut self, resource: &str, mut row: Value) -> Option<Value> {
        let table = self.tables.get_mut(resource)?;
        let object = row.as_object_mut()?;
        let id = match object.get("id").and_then(Value::as_u64) {
            Some(id) => id,
            None => table.last_id + 1,
        };
        object.insert("id".to_string(), json!(id));
        table.last_id = table.last_id.max(id);
        table.rows.insert(id, row.clone());
        Some(row)
    }

    pub fn get(&self, resource: &str, id: u64) -> Option<&Value> {
        self.tables.get(resource)?.rows.get(&id)
    }

    pub fn remove(&mut self, resource: &str, id: u64) -> Option<Value> {
        self.tables.get_mut(resource)?.rows.remove(&id)
    }

    pub fn len(&self, resource: &str) -> usize {
        self.tables.get(resource).map_or(0, |table| table.rows.len())
    }

    /// Rows of `resource` whose fields equal every filter value.
    pub fn list(&self, resource: &str, filters: &HashMap<String, String>) -> Option<Vec<Value>> {
        let table = self.tables.get(resource)?;
        Some(
            table
                .rows
                .values()
                .filter(|row| matches_filters(row, filters))
                .cloned()
                .collect(),
        )
    }

    /// Fixture data shaped like the public backend, small enough to reason about.
    pub fn seeded() -> Self {
        let mut db = Self::new();
        for (id, name, username, email, city) in [
            (1, "Leanne Graham", "Bret", "Sincere@april.biz", "Gwenborough"),
            (2, "Ervin Howell", "Antonette", "Shanna@melissa.tv", "Wisokyburgh"),
            (3, "Clementine Bauch", "Samantha", "Nathan@yesenia.net", "McKenziehaven"),
        ] {
            db.insert(
                "users",
                json!({
                    "id": id, "name": name, "username": username, "email": email,
                    "phone": "1-770-736-8031 x56442", "website": "hildegard.org",
                    "address": {
                        "street": "Kulas Light", "suite": "Apt. 556", "city": city,
                        "zipcode": "92998-3874", "geo": { "lat": "-37.3159", "lng": "81.1496" }
                    },
                    "company": {
                        "name": "Romaguera-Crona",
                        "catchPhrase": "Multi-layered client-server neural-net",
                        "bs": "harness real-time e-markets"
                    }
                }),
            );
        }
        for (id, user_id, title) in [
            (1, 1, "sunt aut facere repellat provident"),
            (2, 1, "qui est esse"),
            (3, 2, "ea molestias quasi exercitationem"),
        ] {
            db.insert(
                "posts",
                json!({ "id": id, "userId": user_id, "title": title, "body": "quia et suscipit" }),
            );
        }
        for (id, post_id) in [(1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 2), (7, 3)] {
            db.insert(
                "comments",
                json!({
                    "id": id, "postId": post_id, "name": format!("comment {id}"),
                    "email": format!("reader{id}@example.com"), "body": "laudantium enim quasi"
                }),
            );
        }
        for (id, user_id, title) in [(1, 1, "quidem molestiae enim"), (2, 2, "sunt qui excepturi")] {
            db.insert("albums", json!({ "id": id, "userId": user_id, "title": title }));
        }
        for (id, album_id) in [(1, 1), (2, 1), (3, 2)] {
            db.insert(
                "photos",
                json!({
                    "id": id, "albumId": album_id, "title": format!("photo {id}"),
                    "url": format!("https://via.placeholder.com/600/{id}"),
                    "thumbnailUrl": format!("https://via.placeholder.com/150/{id}")
                }),
            );
        }
        for (id, user_id, completed) in [(1, 1, false), (2, 1, true), (3, 1, false), (4, 2, true)] {
            db.insert(
                "todos",
                json!({
                    "id": id, "userId": user_id, "title": format!("todo {id}"), "completed": completed
                }),
            );
        }
        db
    }
}

fn matches_filters(row: &Value, filters: &HashMap<String, String>) -> bool {
    filters.iter().all(|(field, expected)| match row.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

/// `users` → `userId`, `posts` → `postId`, `albums` → `albumId`.
fn foreign_key(parent: &str) -> String {
    format!("{}Id", parent.trim_end_matches('s'))
}

pub type SharedDb = Arc<RwLock<Db>>;

#[derive(Clone)]
struct AppState {
    db: SharedDb,
}

/// Router over the seeded fixtures.
pub fn app() -> Router {
    app_with(Db::seeded())
}

pub fn app_with(db: Db) -> Router {
    routes(Arc::new(RwLock::new(db)))
}

/// Like [`app_with`] but every request must carry `Authorization: Bearer {token}`.
pub fn app_with_auth(db: Db, token: &str) -> Router {
    let expected = format!("Bearer {token}");
    routes(Arc::new(RwLock::new(db))).layer(middleware::from_fn(move |req: Request, next: Next| {
        let expected = expected.clone();
        async move {
            let authorized = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                == Some(expected.as_str());
            if authorized {
                next.run(req).await
            } else {
                tracing::debug!(uri = %req.uri(), "rejected request without valid token");
                StatusCode::UNAUTHORIZED.into_response()
            }
        }
    }))
}

fn routes(db: SharedDb) -> Router {
    Router::new()
        .route("/{resource}", get(list_rows).post(create_row))
        .route(
            "/{resource}/{id}",
            get(get_row).put(update_row).patch(update_row).delete(delete_row),
        )
        .route("/{resource}/{id}/{child}", get(list_children))
        .with_state(AppState { db })
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, app()).await
}

pub async fn run_with(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, router).await
}

async fn list_rows(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    let db = state.db.read().await;
    db.list(&resource, &filters).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn list_children(
    State(state): State<AppState>,
    Path((resource, id, child)): Path<(String, u64, String)>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    let db = state.db.read().await;
    db.get(&resource, id).ok_or(StatusCode::NOT_FOUND)?;
    let filters = HashMap::from([(foreign_key(&resource), id.to_string())]);
    db.list(&child, &filters).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn create_row(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(mut input): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let object = input.as_object_mut().ok_or(StatusCode::BAD_REQUEST)?;
    // Ids are always server-assigned on create.
    object.remove("id");
    let mut db = state.db.write().await;
    let row = db.insert(&resource, input).ok_or(StatusCode::NOT_FOUND)?;
    tracing::debug!(%resource, id = %row["id"], "created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn get_row(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, u64)>,
) -> Result<Json<Value>, StatusCode> {
    let db = state.db.read().await;
    db.get(&resource, id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// PUT and PATCH both merge top-level fields; `id` cannot change.
async fn update_row(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, u64)>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let Value::Object(fields) = input else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let mut db = state.db.write().await;
    let row = db
        .tables
        .get_mut(resource.as_str())
        .and_then(|table| table.rows.get_mut(&id))
        .and_then(Value::as_object_mut)
        .ok_or(StatusCode::NOT_FOUND)?;
    merge(row, fields);
    tracing::debug!(%resource, id, "updated");
    Ok(Json(Value::Object(row.clone())))
}

fn merge(row: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (field, value) in fields {
        if field != "id" {
            row.insert(field, value);
        }
    }
}

async fn delete_row(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, u64)>,
) -> Result<Json<Value>, StatusCode> {
    let mut db = state.db.write().await;
    db.remove(&resource, id).ok_or(StatusCode::NOT_FOUND)?;
    tracing::debug!(%resource, id, "deleted");
    Ok(Json(json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_next_id() {
        let mut db = Db::new();
        let first = db.insert("posts", json!({ "title": "a" })).unwrap();
        let second = db.insert("posts", json!({ "title": "b" })).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let mut db = Db::new();
        db.insert("posts", json!({ "title": "a" })).unwrap();
        let second = db.insert("posts", json!({ "title": "b" })).unwrap();
        assert_eq!(db.remove("posts", 2), Some(second));
        let third = db.insert("posts", json!({ "title": "c" })).unwrap();
        assert_eq!(third["id"], 3);
        assert_eq!(db.len("posts"), 2);
    }

    #[test]
    fn insert_rejects_unknown_resource_and_non_objects() {
        let mut db = Db::new();
        assert!(db.insert("widgets", json!({})).is_none());
        assert!(db.insert("posts", json!([1, 2])).is_none());
    }

    #[test]
    fn filters_compare_numbers_as_text() {
        let db = Db::seeded();
        let filters = HashMap::from([("postId".to_string(), "1".to_string())]);
        let comments = db.list("comments", &filters).unwrap();
        assert_eq!(comments.len(), 5);
        assert!(comments.iter().all(|c| c["postId"] == 1));
    }

    #[test]
    fn foreign_key_names() {
        assert_eq!(foreign_key("users"), "userId");
        assert_eq!(foreign_key("albums"), "albumId");
        assert_eq!(foreign_key("posts"), "postId");
    }

    #[test]
    fn merge_keeps_id_and_untouched_fields() {
        let mut row = json!({ "id": 3, "name": "a", "email": "e" });
        let fields = json!({ "id": 99, "name": "X" });
        merge(
            row.as_object_mut().unwrap(),
            fields.as_object().unwrap().clone(),
        );
        assert_eq!(row, json!({ "id": 3, "name": "X", "email": "e" }));
    }

    #[test]
    fn seeded_fixture_sizes() {
        let db = Db::seeded();
        assert_eq!(db.len("users"), 3);
        assert_eq!(db.len("posts"), 3);
        assert_eq!(db.len("comments"), 7);
        assert_eq!(db.len("todos"), 4);
    }
}
