//! Override store persisted as a JSON snapshot file.

use std::io::Write as _;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use tokio::sync::{
    Mutex,
    RwLock,
};

use super::store::OverrideStore;
use super::table::OverrideTable;
use super::types::{
    OverrideFilter,
    OverrideRecord,
    OverrideWrite,
    StoreError,
    WriteOutcome,
};
use crate::types::Scope;

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    /// Format version
    version: u32,
    /// Every record, deleted ones included
    overrides: Vec<OverrideRecord>,
}

/// Write-through store: every acknowledged write has been persisted.
///
/// Writes are applied to a copy of the table, the copy is written to a
/// temporary file that replaces the snapshot, and only then the copy becomes
/// visible to readers.
#[derive(Debug, Clone)]
pub struct FileOverrideStore {
    /// Shared state; writes run on a detached task holding a clone
    inner: Arc<Inner>,
}

/// State shared with in-flight writes.
#[derive(Debug)]
struct Inner {
    /// Snapshot file
    path: PathBuf,
    /// Published records
    table: RwLock<OverrideTable>,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl FileOverrideStore {
    /// Opens the snapshot at `path`; a missing file is an empty store.
    ///
    /// # Errors
    /// The file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || read_snapshot(&path))
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))??
        };

        tracing::debug!(path = ?path, records = table.len(), "Override store opened");

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                table: RwLock::new(table),
                write_lock: Mutex::new(()),
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Runs `mutate` as one persisted transaction.
    ///
    /// The transaction runs on its own task so that a caller giving up
    /// (timeout, cancellation) cannot leave it half-applied.
    async fn commit<T, F>(&self, mutate: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut OverrideTable) -> (T, bool) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.commit(mutate).await })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

impl Inner {
    /// Applies `mutate` to a copy, persists the copy if it changed and
    /// publishes it.
    async fn commit<T, F>(&self, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut OverrideTable) -> (T, bool),
    {
        let _guard = self.write_lock.lock().await;

        let mut next = self.table.read().await.clone();
        let (result, changed) = mutate(&mut next);
        if !changed {
            return Ok(result);
        }

        let snapshot = Snapshot { version: SNAPSHOT_VERSION, overrides: next.records().cloned().collect() };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::Persist { path: self.path.clone(), message: e.to_string() })?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        *self.table.write().await = next;
        Ok(result)
    }
}

/// Reads the snapshot file into a table.
fn read_snapshot(path: &Path) -> Result<OverrideTable, StoreError> {
    let load_error = |message: String| StoreError::Load { path: path.to_path_buf(), message };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = ?path, "Override snapshot not found, starting empty");
            return Ok(OverrideTable::new());
        }
        Err(e) => return Err(load_error(e.to_string())),
    };

    let snapshot: Snapshot =
        serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(load_error(format!("unsupported snapshot version {}", snapshot.version)));
    }

    Ok(OverrideTable::from_records(snapshot.overrides))
}

/// Replaces `path` with `bytes` through a temporary file in the same directory.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let persist_error =
        |message: String| StoreError::Persist { path: path.to_path_buf(), message };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| persist_error(e.to_string()))?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| persist_error(e.to_string()))?;
    file.write_all(bytes).map_err(|e| persist_error(e.to_string()))?;
    file.as_file().sync_all().map_err(|e| persist_error(e.to_string()))?;
    file.persist(path).map_err(|e| persist_error(e.error.to_string()))?;

    Ok(())
}

#[async_trait]
impl OverrideStore for FileOverrideStore {
    async fn upsert(&self, write: OverrideWrite) -> Result<WriteOutcome, StoreError> {
        self.commit(move |table| {
            let outcome = table.apply(&write, Utc::now());
            (outcome, outcome.is_change())
        })
        .await
    }

    async fn bulk_upsert(
        &self,
        writes: Vec<OverrideWrite>,
    ) -> Vec<Result<WriteOutcome, StoreError>> {
        let count = writes.len();
        let committed = self
            .commit(move |table| {
                let now = Utc::now();
                let outcomes: Vec<WriteOutcome> =
                    writes.iter().map(|write| table.apply(write, now)).collect();
                let changed = outcomes.iter().any(|o| o.is_change());
                (outcomes, changed)
            })
            .await;

        match committed {
            Ok(outcomes) => outcomes.into_iter().map(Ok).collect(),
            Err(e) => {
                tracing::warn!(error = %e, count, "Override batch was not persisted");
                vec![Err(e); count]
            }
        }
    }

    async fn mark_deleted(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let (locale, scope, key, actor) =
            (locale.to_string(), scope.clone(), key.to_string(), actor.to_string());
        self.commit(move |table| {
            let outcome = table.mark_deleted(&locale, &scope, &key, &actor, Utc::now());
            (outcome, outcome.is_change())
        })
        .await
    }

    async fn find_all(&self, filter: &OverrideFilter) -> Result<Vec<OverrideRecord>, StoreError> {
        Ok(self.inner.table.read().await.find(filter))
    }

    async fn debug_rows(&self, key: &str) -> Result<Vec<OverrideRecord>, StoreError> {
        Ok(self.inner.table.read().await.debug_rows(key))
    }

    async fn has_scope(&self, scope: &Scope) -> Result<bool, StoreError> {
        Ok(self.inner.table.read().await.has_scope(scope))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        // 書き込みは確定時に永続化済み。進行中の書き込みの完了だけを待つ
        let _guard = self.inner.write_lock.lock().await;
        Ok(())
    }
}
