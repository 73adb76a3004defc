//! Directory synchronization against the record store.
//!
//! [`DirectorySync::load`] rebuilds the client-side [`Directory`] from the
//! index and the per-civilization records. A load never fails as a whole:
//! an unreachable store yields an empty directory, and each broken index
//! entry is isolated and listed in the [`LoadReport`].
//!
//! Loads are single-flight. Overlapping calls queue on one lock; a caller
//! whose request was issued before a load that has since completed takes
//! that load's result instead of reading the store again. Every published
//! snapshot carries a version one higher than the last, so a snapshot is
//! never replaced by an older one.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use civtech_store::{StoreClient, StoreError};
use civtech_types::{Civilization, CivilizationId, OwnerAddress};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// A civilization as seen by the current identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// The decoded record.
    pub civilization: Civilization,
    /// Whether the current identity owns it.
    pub is_player: bool,
}

/// All known civilizations, most recently updated first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    /// Entries sorted descending by `last_updated`; ties keep index order.
    pub entries: Vec<DirectoryEntry>,
    /// Snapshot version; strictly increases with every published load.
    pub version: u64,
}

impl Directory {
    /// Number of civilizations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory holds no civilizations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The player's most recently updated civilization.
    pub fn player(&self) -> Option<&Civilization> {
        self.players().next()
    }

    /// Every civilization the current identity owns.
    pub fn players(&self) -> impl Iterator<Item = &Civilization> {
        self.entries
            .iter()
            .filter(|e| e.is_player)
            .map(|e| &e.civilization)
    }

    /// Every civilization owned by someone else.
    pub fn foreign(&self) -> impl Iterator<Item = &Civilization> {
        self.entries
            .iter()
            .filter(|e| !e.is_player)
            .map(|e| &e.civilization)
    }

    /// Look up an entry by id.
    pub fn find(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.civilization.id.as_str() == id)
    }
}

/// Why one directory entry could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailureKind {
    /// The index lists an id with no record behind it.
    Missing,
    /// The payload was fetched but could not be decoded.
    Parse,
    /// The store call itself failed or timed out.
    Fetch,
}

/// One isolated failure during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// The civilization id, or `None` when the index itself failed.
    pub id: Option<CivilizationId>,
    /// Failure category.
    pub kind: LoadFailureKind,
    /// Human-readable detail.
    pub reason: String,
}

/// Summary of one directory load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records decoded and published.
    pub loaded: usize,
    /// Entries skipped, in index order.
    pub failures: Vec<LoadFailure>,
    /// Whether the availability check succeeded.
    pub store_available: bool,
    /// Version of the snapshot this report describes.
    pub version: u64,
    /// Whether this call reused a load completed after it was requested.
    pub reused: bool,
}

/// Bookkeeping guarded by the single-flight lock.
#[derive(Debug, Default)]
struct FlightState {
    /// Highest request ticket covered by the last completed load.
    covered: u64,
    /// Identity the last completed load classified against.
    identity: Option<OwnerAddress>,
    /// Version of the last published snapshot.
    version: u64,
    /// Report of the last completed load.
    last_report: LoadReport,
}

/// Loads and publishes [`Directory`] snapshots.
pub struct DirectorySync {
    store: StoreClient,
    requested: AtomicU64,
    flight: Mutex<FlightState>,
    snapshot: RwLock<Arc<Directory>>,
}

impl DirectorySync {
    /// Create a synchronizer with an empty snapshot.
    pub fn new(store: StoreClient) -> Self {
        Self {
            store,
            requested: AtomicU64::new(0),
            flight: Mutex::new(FlightState::default()),
            snapshot: RwLock::new(Arc::new(Directory::default())),
        }
    }

    /// The store this synchronizer reads from.
    pub const fn store(&self) -> &StoreClient {
        &self.store
    }

    /// The latest published directory.
    pub async fn snapshot(&self) -> Arc<Directory> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Reload the directory, classifying entries against `identity`.
    ///
    /// Never fails; problems are listed in the returned report.
    pub async fn load(&self, identity: Option<&OwnerAddress>) -> LoadReport {
        let ticket = self
            .requested
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);

        let mut flight = self.flight.lock().await;

        if ticket <= flight.covered && flight.identity.as_ref() == identity {
            debug!(ticket, version = flight.version, "reusing directory load");
            return LoadReport {
                reused: true,
                ..flight.last_report.clone()
            };
        }

        let covers = self.requested.load(Ordering::SeqCst);
        let (entries, mut report) = self.fetch(identity).await;

        flight.version = flight.version.saturating_add(1);
        flight.covered = covers;
        flight.identity = identity.cloned();
        report.version = flight.version;
        flight.last_report = report.clone();

        self.publish(Directory {
            entries,
            version: flight.version,
        })
        .await;

        info!(
            version = report.version,
            loaded = report.loaded,
            failures = report.failures.len(),
            store_available = report.store_available,
            "directory loaded"
        );
        report
    }

    /// Drop the published snapshot, e.g. when the identity disconnects.
    pub async fn clear(&self) {
        let mut flight = self.flight.lock().await;
        flight.version = flight.version.saturating_add(1);
        flight.covered = 0;
        flight.identity = None;
        flight.last_report = LoadReport::default();
        self.publish(Directory {
            entries: Vec::new(),
            version: flight.version,
        })
        .await;
        debug!(version = flight.version, "directory cleared");
    }

    async fn publish(&self, directory: Directory) {
        let mut current = self.snapshot.write().await;
        if directory.version > current.version {
            *current = Arc::new(directory);
        } else {
            warn!(
                stale = directory.version,
                current = current.version,
                "discarding stale directory snapshot"
            );
        }
    }

    /// Read the index and every record it lists.
    async fn fetch(&self, identity: Option<&OwnerAddress>) -> (Vec<DirectoryEntry>, LoadReport) {
        let mut report = LoadReport::default();

        if !self.store.probe_available().await {
            warn!("store unavailable, publishing empty directory");
            return (Vec::new(), report);
        }
        report.store_available = true;

        let ids = match self.store.load_index().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "directory index unreadable");
                report.failures.push(LoadFailure {
                    id: None,
                    kind: failure_kind(&e),
                    reason: e.to_string(),
                });
                return (Vec::new(), report);
            }
        };

        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(ids.len());

        for id in ids {
            if !seen.insert(id.clone()) {
                debug!(civilization_id = %id, "skipping duplicate index entry");
                continue;
            }
            match self.store.load_record(&id).await {
                Ok(Some(civilization)) => {
                    debug!(civilization_id = %id, "record loaded");
                    let is_player = identity.is_some_and(|me| civilization.is_owned_by(me));
                    entries.push(DirectoryEntry {
                        civilization,
                        is_player,
                    });
                }
                Ok(None) => {
                    warn!(civilization_id = %id, "index entry has no record");
                    report.failures.push(LoadFailure {
                        id: Some(id),
                        kind: LoadFailureKind::Missing,
                        reason: String::from("record not found"),
                    });
                }
                Err(e) => {
                    warn!(civilization_id = %id, error = %e, "skipping unreadable record");
                    report.failures.push(LoadFailure {
                        id: Some(id),
                        kind: failure_kind(&e),
                        reason: e.to_string(),
                    });
                }
            }
        }

        entries.sort_by_key(|e| Reverse(e.civilization.last_updated));
        report.loaded = entries.len();
        (entries, report)
    }
}

const fn failure_kind(err: &StoreError) -> LoadFailureKind {
    match err {
        StoreError::Decode { .. } => LoadFailureKind::Parse,
        _ => LoadFailureKind::Fetch,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use civtech_store::{MemoryStore, codec};
    use civtech_types::{EncryptedValue, ExtraFields, TechId};

    use super::*;

    fn civ(id: &str, owner: &str, last_updated: i64) -> Civilization {
        Civilization {
            id: CivilizationId::from(id),
            name: format!("civ {id}"),
            research_points: EncryptedValue::from("FHE-MTAw"),
            military_power: EncryptedValue::from("FHE-MQ=="),
            discovered_technologies: vec![TechId::from("mining")],
            last_updated,
            owner: OwnerAddress::from(owner),
            version: 0,
            extra_fields: ExtraFields::new(),
        }
    }

    async fn seed(store: &MemoryStore, civs: &[Civilization]) {
        let ids: Vec<CivilizationId> = civs.iter().map(|c| c.id.clone()).collect();
        store
            .put_raw(codec::INDEX_KEY, &codec::encode_index(&ids).unwrap())
            .await;
        for c in civs {
            store
                .put_raw(&codec::record_key(&c.id), &codec::encode_record(c).unwrap())
                .await;
        }
    }

    fn sync(store: &MemoryStore) -> DirectorySync {
        DirectorySync::new(StoreClient::memory(store.clone(), Duration::from_millis(200)))
    }

    #[tokio::test]
    async fn sorts_by_recency_and_partitions_by_owner() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[civ("a", "0xP", 10), civ("b", "0xQ", 30), civ("c", "0xp", 20)],
        )
        .await;
        let sync = sync(&store);

        let report = sync.load(Some(&OwnerAddress::from("0xP"))).await;
        assert_eq!(report.loaded, 3);
        assert!(report.failures.is_empty());

        let dir = sync.snapshot().await;
        let order: Vec<&str> = dir.entries.iter().map(|e| e.civilization.id.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert_eq!(dir.player().unwrap().id.as_str(), "c");
        assert_eq!(dir.players().count(), 2);
        assert_eq!(dir.foreign().count(), 1);
        assert!(dir.find("b").is_some_and(|e| !e.is_player));
    }

    #[tokio::test]
    async fn one_malformed_record_is_isolated() {
        let store = MemoryStore::new();
        seed(&store, &[civ("a", "0xP", 1), civ("b", "0xP", 2), civ("c", "0xP", 3)]).await;
        store.put_raw("civilization_b", b"{broken").await;
        let sync = sync(&store);

        let report = sync.load(None).await;
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, Some(CivilizationId::from("b")));
        assert_eq!(report.failures[0].kind, LoadFailureKind::Parse);
    }

    #[tokio::test]
    async fn missing_and_failing_records_are_reported() {
        let store = MemoryStore::new();
        seed(&store, &[civ("a", "0xP", 1), civ("b", "0xP", 2)]).await;
        store
            .put_raw(codec::INDEX_KEY, br#"["a","b","ghost","a"]"#)
            .await;
        store.fail_reads("civilization_b").await;
        let sync = sync(&store);

        let report = sync.load(None).await;
        assert_eq!(report.loaded, 1);
        let kinds: Vec<LoadFailureKind> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, [LoadFailureKind::Fetch, LoadFailureKind::Missing]);
    }

    #[tokio::test]
    async fn empty_or_missing_index_is_an_empty_directory() {
        let store = MemoryStore::new();
        let sync = sync(&store);
        let report = sync.load(None).await;
        assert!(report.store_available);
        assert!(report.failures.is_empty());
        assert!(sync.snapshot().await.is_empty());

        store.put_raw(codec::INDEX_KEY, b"").await;
        sync.load(None).await;
        assert!(sync.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_index_is_reported_not_raised() {
        let store = MemoryStore::new();
        store.put_raw(codec::INDEX_KEY, b"{nope").await;
        let report = sync(&store).load(None).await;
        assert_eq!(report.loaded, 0);
        assert_eq!(report.failures[0].id, None);
        assert_eq!(report.failures[0].kind, LoadFailureKind::Parse);
    }

    #[tokio::test]
    async fn unavailable_store_yields_empty_directory() {
        let store = MemoryStore::new();
        seed(&store, &[civ("a", "0xP", 1)]).await;
        store.set_unavailable(true).await;
        let sync = sync(&store);

        let report = sync.load(None).await;
        assert!(!report.store_available);
        assert!(sync.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn versions_increase_and_clear_empties() {
        let store = MemoryStore::new();
        seed(&store, &[civ("a", "0xP", 1)]).await;
        let sync = sync(&store);

        let first = sync.load(None).await;
        let second = sync.load(None).await;
        assert!(second.version > first.version);
        assert!(!second.reused);

        sync.clear().await;
        let cleared = sync.snapshot().await;
        assert!(cleared.is_empty());
        assert!(cleared.version > second.version);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_loads_share_one_fetch() {
        let store = MemoryStore::new();
        seed(&store, &[civ("a", "0xP", 1)]).await;
        store.set_latency(Duration::from_millis(50)).await;
        let sync = Arc::new(sync(&store));

        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.load(None).await }
        });
        tokio::task::yield_now().await;
        let second = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.load(None).await }
        });
        let third = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.load(None).await }
        });

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        let third = third.await.unwrap();

        assert!(!first.reused);
        // The first load started before the others were requested, so one
        // of them runs a fresh load and the last reuses it.
        let fresh = [&second, &third].iter().filter(|r| !r.reused).count();
        assert_eq!(fresh, 1);
        assert_eq!(second.version, third.version);
        assert_eq!(sync.snapshot().await.version, second.version);
    }
}
