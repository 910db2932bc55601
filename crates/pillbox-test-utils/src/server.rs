//! An HTTP server speaking the asset endpoints from in-memory fixtures.
//!
//! [`FixtureServer::start`] binds an ephemeral loopback port, so tests can
//! point a real [`HttpFetcher`](pillbox_core::HttpFetcher) at it. For
//! router-level tests without a socket, call [`router`] and drive it with
//! `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use pillbox_core::api::{BrowseItem, BrowseResponse, ItemType, TagSuggestion};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// Everything the fixture server can answer with.
#[derive(Debug, Default)]
pub struct Fixtures {
    /// Browse listings keyed by `(kind segment, folder path)`.
    pub listings: HashMap<(String, String), Vec<BrowseItem>>,
    pub tags: Vec<TagSuggestion>,
    /// Group files keyed by file name including extension.
    pub groups: HashMap<String, Value>,
    /// Metadata documents keyed by model file name.
    pub metadata: HashMap<String, Value>,
    /// Preview images keyed by `(kind segment, name)`.
    pub previews: HashMap<(String, String), Vec<u8>>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, kind: &str, folder: &str, name: &str, extension: &str) -> Self {
        let path = join(folder, name);
        self.listings
            .entry((kind.to_string(), folder.to_string()))
            .or_default()
            .push(BrowseItem {
                name: name.to_string(),
                path,
                item_type: ItemType::File,
                extension: Some(extension.to_string()),
            });
        self
    }

    pub fn folder(mut self, kind: &str, parent: &str, name: &str) -> Self {
        let path = join(parent, name);
        self.listings
            .entry((kind.to_string(), parent.to_string()))
            .or_default()
            .push(BrowseItem {
                name: name.to_string(),
                path: path.clone(),
                item_type: ItemType::Folder,
                extension: None,
            });
        self.listings.entry((kind.to_string(), path)).or_default();
        self
    }

    pub fn tag(mut self, name: &str, count: u64) -> Self {
        self.tags.push(TagSuggestion {
            name: name.to_string(),
            count: Some(count),
            aliases: Vec::new(),
        });
        self
    }

    pub fn group(mut self, file: &str, tags: Value) -> Self {
        self.groups.insert(file.to_string(), tags);
        self
    }

    pub fn metadata(mut self, file: &str, document: Value) -> Self {
        self.metadata.insert(file.to_string(), document);
        self
    }

    pub fn preview(mut self, kind: &str, name: &str, bytes: Vec<u8>) -> Self {
        self.previews
            .insert((kind.to_string(), name.to_string()), bytes);
        self
    }
}

fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// Shared state of a running fixture server.
#[derive(Debug, Default)]
pub struct FixtureState {
    fixtures: Mutex<Fixtures>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FixtureState {
    pub fn new(fixtures: Fixtures) -> Self {
        Self {
            fixtures: Mutex::new(fixtures),
            hits: Mutex::default(),
        }
    }

    fn hit(&self, path: &str) {
        let mut hits = self.hits.lock().expect("hit counter poisoned");
        *hits.entry(path.to_string()).or_default() += 1;
    }

    /// Requests served for a request path such as `/pillbox/tags`.
    pub fn hits(&self, path: &str) -> usize {
        let hits = self.hits.lock().expect("hit counter poisoned");
        hits.get(path).copied().unwrap_or(0)
    }

    pub fn group(&self, file: &str) -> Option<Value> {
        let fixtures = self.fixtures.lock().expect("fixtures poisoned");
        fixtures.groups.get(file).cloned()
    }

    pub fn preview(&self, kind: &str, name: &str) -> Option<Vec<u8>> {
        let fixtures = self.fixtures.lock().expect("fixtures poisoned");
        fixtures
            .previews
            .get(&(kind.to_string(), name.to_string()))
            .cloned()
    }
}

/// Build the fixture router.
pub fn router(state: Arc<FixtureState>) -> axum::Router {
    axum::Router::new()
        .route("/pillbox/browse/{kind}", get(handle_browse))
        .route("/pillbox/tags", get(handle_tags))
        .route(
            "/pillbox/groups/{*file}",
            get(handle_group_get).post(handle_group_post),
        )
        .route("/pillbox/metadata/{*file}", get(handle_metadata))
        .route(
            "/pillbox/preview/{kind}/{*name}",
            get(handle_preview_get).post(handle_preview_post),
        )
        .with_state(state)
}

/// A fixture server listening on an ephemeral loopback port.
pub struct FixtureServer {
    addr: SocketAddr,
    state: Arc<FixtureState>,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    pub async fn start(fixtures: Fixtures) -> Self {
        let state = Arc::new(FixtureState::new(fixtures));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fixture server");
        let addr = listener
            .local_addr()
            .expect("fixture server has no local addr");
        let app = router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                debug!(error = %err, "fixture server stopped");
            }
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn state(&self) -> &Arc<FixtureState> {
        &self.state
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ── Route handlers ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BrowseParams {
    #[serde(default)]
    path: String,
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
struct TagParams {
    #[serde(default)]
    query: String,
    limit: Option<usize>,
}

fn parent_of(path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    Some(
        path.rsplit_once('/')
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_default(),
    )
}

async fn handle_browse(
    State(state): State<Arc<FixtureState>>,
    Path(kind): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<BrowseResponse>, StatusCode> {
    state.hit(&format!("/pillbox/browse/{kind}"));
    let fixtures = state.fixtures.lock().expect("fixtures poisoned");
    let path = params.path.trim_matches('/').to_string();
    let items = fixtures
        .listings
        .get(&(kind, path.clone()))
        .ok_or(StatusCode::NOT_FOUND)?;
    let query = params.query.to_lowercase();
    let items = items
        .iter()
        .filter(|item| query.is_empty() || item.name.to_lowercase().contains(&query))
        .cloned()
        .collect();
    Ok(Json(BrowseResponse {
        items,
        parent_path: parent_of(&path),
        current_path: path,
    }))
}

async fn handle_tags(
    State(state): State<Arc<FixtureState>>,
    Query(params): Query<TagParams>,
) -> Json<Vec<TagSuggestion>> {
    state.hit("/pillbox/tags");
    let fixtures = state.fixtures.lock().expect("fixtures poisoned");
    let query = params.query.to_lowercase();
    let results = fixtures
        .tags
        .iter()
        .filter(|tag| tag.name.to_lowercase().contains(&query))
        .take(params.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Json(results)
}

async fn handle_group_get(
    State(state): State<Arc<FixtureState>>,
    Path(file): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state.hit(&format!("/pillbox/groups/{file}"));
    state.group(&file).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn handle_group_post(
    State(state): State<Arc<FixtureState>>,
    Path(file): Path<String>,
    Json(tags): Json<Value>,
) -> StatusCode {
    if !tags.is_array() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    let mut fixtures = state.fixtures.lock().expect("fixtures poisoned");
    fixtures.groups.insert(file, tags);
    StatusCode::NO_CONTENT
}

async fn handle_metadata(
    State(state): State<Arc<FixtureState>>,
    Path(file): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state.hit(&format!("/pillbox/metadata/{file}"));
    let fixtures = state.fixtures.lock().expect("fixtures poisoned");
    fixtures
        .metadata
        .get(&file)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn handle_preview_get(
    State(state): State<Arc<FixtureState>>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    state.hit(&format!("/pillbox/preview/{kind}/{name}"));
    match state.preview(&kind, &name) {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        None => (StatusCode::NOT_FOUND, "no preview").into_response(),
    }
}

async fn handle_preview_post(
    State(state): State<Arc<FixtureState>>,
    Path((kind, name)): Path<(String, String)>,
    body: Bytes,
) -> StatusCode {
    if body.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    let mut fixtures = state.fixtures.lock().expect("fixtures poisoned");
    fixtures.previews.insert((kind, name), body.to_vec());
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_browse_filters_by_query() {
        let fixtures = Fixtures::new()
            .file("loras", "", "ink", ".safetensors")
            .file("loras", "", "oil", ".safetensors");
        let app = router(Arc::new(FixtureState::new(fixtures)));

        let (status, body) = get_json(app, "/pillbox/browse/loras?path=&query=IN").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["name"], "ink");
    }

    #[tokio::test]
    async fn test_unknown_folder_is_not_found() {
        let app = router(Arc::new(FixtureState::new(Fixtures::new())));
        let (status, _) = get_json(app, "/pillbox/browse/loras?path=missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_group_post_requires_array() {
        let state = Arc::new(FixtureState::new(Fixtures::new()));
        let request = Request::post("/pillbox/groups/look.json")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"sky"}"#))
            .unwrap();
        let response = router(Arc::clone(&state)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.group("look.json"), None);
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of(""), None);
        assert_eq!(parent_of("styles"), Some(String::new()));
        assert_eq!(parent_of("styles/ink"), Some("styles".to_string()));
    }

    #[test]
    fn test_folder_registers_empty_listing() {
        let fixtures = Fixtures::new().folder("loras", "", "styles");
        assert!(
            fixtures
                .listings
                .contains_key(&("loras".to_string(), "styles".to_string()))
        );
        assert_eq!(fixtures.listings[&("loras".to_string(), String::new())].len(), 1);
    }
}
