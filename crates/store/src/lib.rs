//! Generic persistence primitives shared by every domain crate: the state
//! store's single-writer critical section (C2), the idempotency ledger (C3),
//! and the event outbox (C4).

pub mod backend;
pub mod error;
pub mod idempotency;
pub mod outbox;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use swapgraph_core::canonical::sha256_canonical;
use tokio::sync::Mutex;

pub use backend::{JsonFileBackend, SqliteBackend, StateBackend};
pub use error::StoreError;
pub use idempotency::{IdempotencyLedger, IdempotencyOutcome, IdempotencyRecord, ScopeKey};
pub use outbox::{derive_event_id, EventEnvelope, EventOutbox};

/// Lets a domain document report its collection sizes without the store
/// crate knowing the domain's shape, for the `{state_sha256, counts}`
/// migration contract.
pub trait CollectionCounts {
    fn collection_counts(&self) -> BTreeMap<String, usize>;
}

/// Lets a domain document rebuild any in-memory indexes that don't survive
/// a serde round trip — namely the outbox's dedup set, which is `#[serde(skip)]`.
pub trait RehydrateOutbox {
    fn rehydrate_outbox(&mut self);
}

/// Wraps a single in-memory document `D` with a `tokio::sync::Mutex` so
/// every mutation runs as one load -> validate -> mutate -> persist ->
/// release critical section; readers take a snapshot under a brief lock
/// without blocking behind a writer mid-persist.
pub struct Store<D> {
    backend: Arc<dyn StateBackend<D>>,
    state: Mutex<(D, u64)>,
}

impl<D> Store<D>
where
    D: Serialize + DeserializeOwned + Send + Sync + Clone + RehydrateOutbox,
{
    pub async fn open(backend: Arc<dyn StateBackend<D>>, default: D) -> Result<Self, StoreError> {
        let (mut data, version) = backend.load().await?.unwrap_or((default, 0));
        data.rehydrate_outbox();
        Ok(Self {
            backend,
            state: Mutex::new((data, version)),
        })
    }

    /// Take a cloned snapshot under a brief read lock.
    pub async fn snapshot(&self) -> D {
        let guard = self.state.lock().await;
        guard.0.clone()
    }

    pub async fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        let guard = self.state.lock().await;
        f(&guard.0)
    }

    /// Run the full write critical section: clone the current document,
    /// apply `f` to the clone, persist it with optimistic-concurrency
    /// guard, and only then swap it into place. If `f` returns an error the
    /// in-memory state and persisted snapshot are both left untouched.
    pub async fn with_write<R, E>(&self, f: impl FnOnce(&mut D) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.state.lock().await;
        let mut candidate = guard.0.clone();
        let result = f(&mut candidate)?;
        let new_version = self.backend.save(&candidate, guard.1).await?;
        guard.0 = candidate;
        guard.1 = new_version;
        Ok(result)
    }

    pub async fn version(&self) -> u64 {
        self.state.lock().await.1
    }

    pub async fn state_sha256(&self) -> String {
        let guard = self.state.lock().await;
        sha256_canonical(&guard.0).expect("in-memory document always serializes")
    }

    /// Hash and collection counts of the document this `Store` currently
    /// has loaded. This reports on the one backend already open — it does
    /// not move data between backends; see [`migrate`] for that.
    pub async fn state_digest(&self) -> (String, BTreeMap<String, usize>)
    where
        D: CollectionCounts,
    {
        let guard = self.state.lock().await;
        let hash = sha256_canonical(&guard.0).expect("in-memory document always serializes");
        (hash, guard.0.collection_counts())
    }
}

/// Read a snapshot from `source` and write it as a fresh snapshot on
/// `target`, canonicalizing nothing beyond the document's own serde shape
/// (the canonical-JSON hash is computed for the caller to verify parity,
/// not applied to the stored bytes). `target_expected_version` is normally
/// `0` for a migration into an empty target backend.
pub async fn migrate<D>(
    source: &dyn StateBackend<D>,
    target: &dyn StateBackend<D>,
    target_expected_version: u64,
) -> Result<(String, BTreeMap<String, usize>), StoreError>
where
    D: Serialize + DeserializeOwned + Send + Sync + Clone + CollectionCounts,
{
    let (data, _source_version) = source.load().await?.ok_or(StoreError::NotFound)?;
    target.save(&data, target_expected_version).await?;
    let hash = sha256_canonical(&data).expect("in-memory document always serializes");
    Ok((hash, data.collection_counts()))
}
