use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crate::datastore::DataStore;
use crate::hosted::HostedBackend;
use crate::snapshot::{DirtySet, Snapshot};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed parsing {path} line {line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed encoding record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request to hosted store failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("hosted store answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("not signed in; run `todowheel login <email>` first")]
    NotSignedIn,
}

impl StoreError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Network and server-side failures; the session may continue on
    /// in-memory state and retry later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// The store rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Where the three collections live.
pub trait Backend {
    fn describe(&self) -> String;

    fn load(&self) -> impl Future<Output = StoreResult<Snapshot>> + Send;

    /// Writes the changes between `previous` (last persisted) and `next`.
    /// `dirty` names the collections that differ.
    fn persist(
        &self,
        previous: &Snapshot,
        next: &Snapshot,
        dirty: &DirtySet,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

impl Backend for DataStore {
    fn describe(&self) -> String {
        format!("local:{}", self.data_dir.display())
    }

    async fn load(&self) -> StoreResult<Snapshot> {
        self.load_snapshot()
    }

    async fn persist(
        &self,
        _previous: &Snapshot,
        next: &Snapshot,
        dirty: &DirtySet,
    ) -> StoreResult<()> {
        self.save_snapshot(next, dirty)
    }
}

/// The backend selected by configuration.
#[derive(Debug)]
pub enum StoreBackend {
    Local(DataStore),
    Hosted(HostedBackend),
}

impl Backend for StoreBackend {
    fn describe(&self) -> String {
        match self {
            Self::Local(store) => store.describe(),
            Self::Hosted(hosted) => hosted.describe(),
        }
    }

    async fn load(&self) -> StoreResult<Snapshot> {
        match self {
            Self::Local(store) => store.load().await,
            Self::Hosted(hosted) => hosted.load().await,
        }
    }

    async fn persist(
        &self,
        previous: &Snapshot,
        next: &Snapshot,
        dirty: &DirtySet,
    ) -> StoreResult<()> {
        match self {
            Self::Local(store) => store.persist(previous, next, dirty).await,
            Self::Hosted(hosted) => hosted.persist(previous, next, dirty).await,
        }
    }
}
