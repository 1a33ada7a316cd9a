//! One job end to end: fetch the source, hand the file to the store, report
//! the identifier.

mod fetch;
mod store;

pub use fetch::{FileNaming, HttpFetcher, parse_content_disposition_filename};
pub use store::CommandStore;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::error::{FetchError, JobError, StoreError};
use crate::pipeline::{Job, Pinned};

/// Downloads a job's source to local disk.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, job: &Job) -> Result<FetchedFile, FetchError>;
}

/// Registers a local file with the content-addressable store.
#[async_trait]
pub trait Store: Send + Sync {
    async fn store(&self, path: &Path) -> Result<String, StoreError>;
}

/// A downloaded file living in its own temporary directory.
///
/// Dropping it removes the directory and the file inside, whichever way the
/// job ends.
#[derive(Debug)]
pub struct FetchedFile {
    _dir: TempDir,
    path: PathBuf,
}

impl FetchedFile {
    /// Reserves `<root>/pinner-XXXXXX/<file_name>`. The file itself is not
    /// created. `file_name` is reduced to its last path component.
    pub fn allocate(root: &Path, file_name: &str) -> Result<Self, FetchError> {
        let file_name = Path::new(file_name)
            .file_name()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                FetchError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unusable file name {file_name:?}"),
                ))
            })?;

        let dir = tempfile::Builder::new().prefix("pinner-").tempdir_in(root)?;
        let path = dir.path().join(file_name);
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fetch then store. Holds no per-job state, so one instance is shared by
/// every concurrent job.
#[derive(Clone)]
pub struct Worker {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
}

impl Worker {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn Store>) -> Self {
        Self { fetcher, store }
    }

    pub async fn run(&self, job: Job) -> Result<Pinned, JobError> {
        tracing::info!(job = %job.name, url = %job.source, "downloading");
        let fetched = self.fetcher.fetch(&job).await?;

        tracing::info!(job = %job.name, path = %fetched.path().display(), "adding file to store");
        let identifier = self.store.store(fetched.path()).await?;

        tracing::info!(job = %job.name, %identifier, "pinned");
        Ok(Pinned {
            name: job.name,
            identifier,
        })
    }
}
