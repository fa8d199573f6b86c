//! Helpers for testing the bestiary data-access layer.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This sets up the logger so that all
//!    console output is captured by the test runner.
//!
//!  - Keep the [`Server`] handle alive for the whole test. When it is dropped
//!    the listener goes away and any request still in flight will fail with a
//!    connection error instead of the response you injected.
//!
//! The server hosts a small canned catalog (see [`CREATURES`]) behind the
//! same two endpoint shapes as the real one: a list endpoint at
//! `/api/creatures?limit=N` and a detail endpoint at `/api/creatures/{key}`.
//! Failures and delays can be injected per record to exercise the retry,
//! timeout, and degradation paths.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{OriginalUri, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;
use url::Url;

/// The canned catalog: (id, name, categories).
///
/// Ids are deliberately non-contiguous so that id-ordering bugs cannot hide
/// behind insertion order.
pub const CREATURES: &[(u64, &str, &[&str])] = &[
    (1, "aspidochelone", &["aquatic", "giant"]),
    (3, "basilisk", &["venomous"]),
    (4, "cockatrice", &["winged", "venomous"]),
    (5, "griffin", &["winged", "hybrid"]),
    (7, "grindylow", &["aquatic"]),
    (25, "kelpie", &["aquatic", "shapeshifter"]),
    (133, "manticore", &["hybrid", "venomous"]),
    (150, "wyvern", &["winged", "draconic"]),
];

/// Setup the test environment.
///
///  - Initializes logs: the logger only captures logs from the service crate
///    and mutes everything else (such as hyper).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("bestiary_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

#[derive(Debug)]
struct ServerState {
    /// Request counts per URI path.
    hits: Mutex<BTreeMap<String, usize>>,
    /// Remaining injected 500s, per record key.
    failures: Mutex<BTreeMap<String, usize>>,
    /// Injected response delays, per record key.
    delays: Mutex<BTreeMap<String, Duration>>,
    /// The socket the server listens on, for building locators.
    socket: SocketAddr,
}

/// A synthetic catalog server on an ephemeral localhost port.
pub struct Server {
    pub handle: tokio::task::JoinHandle<()>,
    pub socket: SocketAddr,
    state: Arc<ServerState>,
}

impl Server {
    /// Spawns the server. Must be called within a tokio runtime.
    pub fn new() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();

        let state = Arc::new(ServerState {
            hits: Default::default(),
            failures: Default::default(),
            delays: Default::default(),
            socket,
        });

        let router = Router::new()
            .route("/api/creatures", get(index_page))
            .route("/api/creatures/:key", get(detail))
            .layer(middleware::from_fn_with_state(state.clone(), count_hits))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            handle,
            socket,
            state,
        }
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://127.0.0.1:{}/{}", self.socket.port(), path)
            .parse()
            .unwrap()
    }

    /// The base URL the service should be pointed at.
    pub fn catalog_url(&self) -> Url {
        self.url("/api/")
    }

    /// How often the given URI path was requested.
    pub fn hits(&self, path: &str) -> usize {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.state
            .hits
            .lock()
            .unwrap()
            .get(&path)
            .copied()
            .unwrap_or_default()
    }

    /// Total requests received, over all paths.
    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    /// Makes the next `n` requests for `key` (id or name) fail with a 500.
    pub fn fail_n(&self, key: &str, n: usize) {
        self.state
            .failures
            .lock()
            .unwrap()
            .insert(key.to_ascii_lowercase(), n);
    }

    /// Delays every response for `key` (id or name) by `duration`.
    pub fn delay(&self, key: &str, duration: Duration) {
        self.state
            .delays
            .lock()
            .unwrap()
            .insert(key.to_ascii_lowercase(), duration);
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn count_hits(
    State(state): State<Arc<ServerState>>,
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Response {
    *state
        .hits
        .lock()
        .unwrap()
        .entry(uri.path().to_owned())
        .or_default() += 1;
    next.run(request).await
}

#[derive(Debug, Deserialize)]
struct IndexQuery {
    limit: Option<usize>,
}

async fn index_page(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<IndexQuery>,
) -> Json<serde_json::Value> {
    let limit = query.limit.unwrap_or(CREATURES.len());
    let port = state.socket.port();

    let results: Vec<_> = CREATURES
        .iter()
        .take(limit)
        .map(|(id, name, _)| {
            json!({
                "name": name,
                "url": format!("http://127.0.0.1:{port}/api/creatures/{id}"),
            })
        })
        .collect();

    Json(json!({ "count": CREATURES.len(), "results": results }))
}

async fn detail(State(state): State<Arc<ServerState>>, Path(key): Path<String>) -> Response {
    let key = key.to_ascii_lowercase();

    let delay = state.delays.lock().unwrap().get(&key).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    {
        let mut failures = state.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    let found = CREATURES
        .iter()
        .find(|(id, name, _)| id.to_string() == key || *name == key);
    let Some((id, name, categories)) = found else {
        return StatusCode::NOT_FOUND.into_response();
    };

    Json(json!({
        "id": id,
        "name": name,
        "height": 10 + id,
        "weight": 100 * id,
        "sprites": {
            "front": format!("http://img.invalid/{name}/front.png"),
            "back": format!("http://img.invalid/{name}/back.png"),
            "artwork": format!("http://img.invalid/{name}/artwork.png"),
        },
        "categories": categories,
        "stats": [
            { "name": "ferocity", "value": id % 100 },
            { "name": "cunning", "value": (id * 7) % 100 },
        ],
        "abilities": [
            { "name": format!("{name}-instinct"), "hidden": false },
            { "name": "night-vision", "hidden": true },
        ],
        "moves": (0..20).map(|n| format!("{name}-move-{n}")).collect::<Vec<_>>(),
    }))
    .into_response()
}
