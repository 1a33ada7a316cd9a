//! In-memory collaborators for pipeline and transport tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::error::{FetchError, StoreError};
use crate::pipeline::{Job, Pipeline};
use crate::server::{AppState, build_app};
use crate::worker::{FetchedFile, Fetcher, Store, Worker};

/// Writes the job's URL into a temp file instead of downloading it.
pub struct StubFetcher {
    root: TempDir,
    calls: AtomicUsize,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            calls: AtomicUsize::new(0),
            failing: HashSet::new(),
            delays: HashMap::new(),
        }
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn delayed(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, job: &Job) -> Result<FetchedFile, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = job.source.as_str();

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(url) {
            return Err(FetchError::MissingFileName {
                url: url.to_string(),
            });
        }

        let fetched = FetchedFile::allocate(self.root.path(), "payload")?;
        tokio::fs::write(fetched.path(), url).await?;
        Ok(fetched)
    }
}

/// Returns `id:<file content>` unless an identifier was registered for that
/// content.
pub struct StubStore {
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
    identifiers: HashMap<String, String>,
    failing: HashSet<String>,
}

impl StubStore {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            identifiers: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn with_identifier(mut self, url: &str, identifier: &str) -> Self {
        self.identifiers
            .insert(url.to_string(), identifier.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for StubStore {
    async fn store(&self, path: &Path) -> Result<String, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(path.to_path_buf());

        let content = tokio::fs::read_to_string(path).await?;
        if self.failing.contains(&content) {
            return Err(StoreError::Io(io::Error::other("stub store failure")));
        }

        Ok(self
            .identifiers
            .get(&content)
            .cloned()
            .unwrap_or_else(|| format!("id:{content}")))
    }
}

pub const API_TOKEN: &str = "s3cret";

/// App state over stub collaborators. `http://x/a` stores as `Qm123`.
pub fn stub_state() -> (Arc<AppState>, Arc<StubFetcher>, Arc<StubStore>) {
    stub_state_with(
        StubFetcher::new(),
        StubStore::new().with_identifier("http://x/a", "Qm123"),
    )
}

pub fn stub_state_with(
    fetcher: StubFetcher,
    store: StubStore,
) -> (Arc<AppState>, Arc<StubFetcher>, Arc<StubStore>) {
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(store);
    let pipeline = Pipeline::new(Worker::new(fetcher.clone(), store.clone()), None);
    (
        Arc::new(AppState::new(API_TOKEN, pipeline)),
        fetcher,
        store,
    )
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_app(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
