//! The in-memory artifact table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use kiln_common::{ContentHash, ShaderFamily, ShaderStage, VariantDescriptor};
use kiln_defines::CacheKey;
use parking_lot::RwLock;

use crate::tracker::ModificationTracker;

/// A compiled shader program. The bytecode is opaque to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Family the program was compiled for.
    pub family: ShaderFamily,
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Descriptor of the variant that produced it.
    pub descriptor: VariantDescriptor,
    /// Compiler output.
    pub bytecode: Vec<u8>,
    /// Digest of `bytecode`.
    pub hash: ContentHash,
}

impl Artifact {
    /// Wraps compiler output.
    pub fn new(
        family: ShaderFamily,
        stage: ShaderStage,
        descriptor: VariantDescriptor,
        bytecode: Vec<u8>,
    ) -> Self {
        let hash = ContentHash::from_bytes(&bytecode);
        Self {
            family,
            stage,
            descriptor,
            bytecode,
            hash,
        }
    }
}

/// Compile state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    /// A compile is in flight.
    Pending,
    /// The artifact is available.
    Completed,
    /// The compiler rejected the variant.
    Failed,
}

impl CompileStatus {
    /// Completed and Failed are terminal.
    pub fn is_terminal(self) -> bool {
        !matches!(self, CompileStatus::Pending)
    }
}

/// One row of the artifact table.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The variant's key.
    pub key: CacheKey,
    /// Owning family, used by per-family clears and staleness checks.
    pub family: ShaderFamily,
    /// The artifact, present only when `status` is `Completed`.
    pub artifact: Option<Arc<Artifact>>,
    /// Compile state.
    pub status: CompileStatus,
    /// When the compile that produced this entry started.
    pub compiled_at: SystemTime,
}

/// Taken when a compile starts and handed back to
/// [`ArtifactStore::publish`].
///
/// The start time becomes the entry's compile timestamp. The epoch detects
/// clears of the family that happened while the compile was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileTicket {
    /// When the compile started.
    pub started: SystemTime,
    epoch: u64,
}

/// Result of [`ArtifactStore::lookup`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// A fresh compiled artifact.
    Hit(Arc<Artifact>),
    /// The variant failed to compile and has not been cleared.
    Failed,
    /// A compile is in flight.
    Pending,
    /// An entry exists but predates the family's last modification.
    Stale,
    /// Nothing stored under this key.
    Miss,
}

#[derive(Default)]
struct Table {
    rows: HashMap<CacheKey, CacheEntry>,
    epochs: HashMap<ShaderFamily, u64>,
}

impl Table {
    fn epoch(&self, family: ShaderFamily) -> u64 {
        self.epochs.get(&family).copied().unwrap_or(0)
    }

    fn bump(&mut self, family: ShaderFamily) {
        *self.epochs.entry(family).or_insert(0) += 1;
    }
}

/// Thread-safe table of compiled artifacts keyed by [`CacheKey`].
///
/// Many readers (render thread lookups) proceed concurrently; writers
/// (worker publishes, invalidation) take the lock exclusively. The
/// modification tracker has its own lock and is only consulted after the
/// table lock is released.
pub struct ArtifactStore {
    entries: RwLock<Table>,
    tracker: Arc<ModificationTracker>,
    failed_retry: Option<Duration>,
}

impl ArtifactStore {
    /// Creates an empty store.
    ///
    /// With `failed_retry` set, failed entries older than the duration are
    /// reported as stale so they can be compiled again.
    pub fn new(tracker: Arc<ModificationTracker>, failed_retry: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(Table::default()),
            tracker,
            failed_retry,
        }
    }

    /// The tracker used for staleness checks.
    pub fn tracker(&self) -> &Arc<ModificationTracker> {
        &self.tracker
    }

    /// Looks up a key and applies the staleness rule.
    pub fn lookup(&self, key: &CacheKey) -> Lookup {
        let (family, status, artifact, compiled_at) = {
            let entries = self.entries.read();
            match entries.rows.get(key) {
                Some(e) => (e.family, e.status, e.artifact.clone(), e.compiled_at),
                None => return Lookup::Miss,
            }
        };

        if status == CompileStatus::Pending {
            return Lookup::Pending;
        }
        if self.tracker.modified_since(family, compiled_at) {
            return Lookup::Stale;
        }
        match (status, artifact) {
            (CompileStatus::Completed, Some(artifact)) => Lookup::Hit(artifact),
            (CompileStatus::Failed, _) if self.failed_expired(compiled_at) => Lookup::Stale,
            _ => Lookup::Failed,
        }
    }

    fn failed_expired(&self, compiled_at: SystemTime) -> bool {
        self.failed_retry.is_some_and(|retry| {
            compiled_at
                .elapsed()
                .map(|age| age >= retry)
                .unwrap_or(false)
        })
    }

    /// Returns `true` if the key holds a Completed or Failed entry.
    pub fn is_resolved(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .rows
            .get(key)
            .is_some_and(|e| e.status.is_terminal())
    }

    /// Starts a compile of one of `family`'s variants.
    pub fn begin(&self, family: ShaderFamily) -> CompileTicket {
        let entries = self.entries.read();
        CompileTicket {
            started: SystemTime::now(),
            epoch: entries.epoch(family),
        }
    }

    /// Returns `false` once `family` has been cleared since `ticket` was
    /// taken.
    pub fn is_current(&self, family: ShaderFamily, ticket: &CompileTicket) -> bool {
        self.entries.read().epoch(family) == ticket.epoch
    }

    /// Creates a Pending entry if the key is absent. Returns `true` if created.
    pub fn mark_pending(&self, key: &CacheKey, family: ShaderFamily) -> bool {
        let mut entries = self.entries.write();
        if entries.rows.contains_key(key) {
            return false;
        }
        entries.rows.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                family,
                artifact: None,
                status: CompileStatus::Pending,
                compiled_at: SystemTime::now(),
            },
        );
        true
    }

    /// Stores a terminal result, replacing any existing entry.
    ///
    /// `Some` publishes Completed, `None` publishes Failed. The entry is
    /// timestamped with `ticket.started`, so a source change recorded after
    /// the compile began leaves the result stale. If the family was cleared
    /// after the ticket was taken the result is dropped and `None` returned.
    pub fn publish(
        &self,
        key: &CacheKey,
        family: ShaderFamily,
        artifact: Option<Arc<Artifact>>,
        ticket: CompileTicket,
    ) -> Option<CompileStatus> {
        let status = if artifact.is_some() {
            CompileStatus::Completed
        } else {
            CompileStatus::Failed
        };
        let mut entries = self.entries.write();
        if entries.epoch(family) != ticket.epoch {
            log::debug!("dropping {key}: {family} was invalidated mid-compile");
            return None;
        }
        entries.rows.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                family,
                artifact,
                status,
                compiled_at: ticket.started,
            },
        );
        Some(status)
    }

    /// Removes one entry. Returns `true` if it existed.
    pub fn evict(&self, key: &CacheKey) -> bool {
        self.entries.write().rows.remove(key).is_some()
    }

    /// Removes every entry. Compiles already running are dropped when they
    /// publish.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.rows.clear();
        for family in ShaderFamily::ALL {
            entries.bump(family);
        }
    }

    /// Removes every entry of one family. Returns the number removed.
    /// Compiles of the family already running are dropped when they publish.
    pub fn clear_family(&self, family: ShaderFamily) -> usize {
        let mut entries = self.entries.write();
        entries.bump(family);
        let before = entries.rows.len();
        entries.rows.retain(|_, e| e.family != family);
        before - entries.rows.len()
    }

    /// A sorted snapshot of all keys.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.read().rows.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of entries in any state.
    pub fn len(&self) -> usize {
        self.entries.read().rows.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> CacheKey {
        CacheKey::from_raw(raw)
    }

    fn artifact(family: ShaderFamily) -> Arc<Artifact> {
        Arc::new(Artifact::new(
            family,
            ShaderStage::Pixel,
            VariantDescriptor(1),
            b"DXBC".to_vec(),
        ))
    }

    fn store() -> ArtifactStore {
        ArtifactStore::new(Arc::new(ModificationTracker::new(true)), None)
    }

    #[test]
    fn miss_then_pending_then_hit() {
        let store = store();
        let k = key("Sky:Pixel:TEX");
        assert!(matches!(store.lookup(&k), Lookup::Miss));

        assert!(store.mark_pending(&k, ShaderFamily::Sky));
        assert!(!store.mark_pending(&k, ShaderFamily::Sky));
        assert!(matches!(store.lookup(&k), Lookup::Pending));
        assert!(!store.is_resolved(&k));

        let ticket = store.begin(ShaderFamily::Sky);
        store.publish(&k, ShaderFamily::Sky, Some(artifact(ShaderFamily::Sky)), ticket);
        match store.lookup(&k) {
            Lookup::Hit(a) => assert_eq!(a.bytecode, b"DXBC"),
            other => panic!("expected hit, got {other:?}"),
        }
        assert!(store.is_resolved(&k));
    }

    #[test]
    fn failed_is_terminal() {
        let store = store();
        let k = key("Water:Pixel:WATER");
        let ticket = store.begin(ShaderFamily::Water);
        assert_eq!(
            store.publish(&k, ShaderFamily::Water, None, ticket),
            Some(CompileStatus::Failed)
        );
        assert!(matches!(store.lookup(&k), Lookup::Failed));
        assert!(store.is_resolved(&k));
        assert!(!store.mark_pending(&k, ShaderFamily::Water));
    }

    #[test]
    fn failed_entry_expires_with_retry_window() {
        let store = ArtifactStore::new(
            Arc::new(ModificationTracker::new(false)),
            Some(Duration::ZERO),
        );
        let k = key("Grass:Vertex:");
        let ticket = store.begin(ShaderFamily::Grass);
        store.publish(&k, ShaderFamily::Grass, None, ticket);
        assert!(matches!(store.lookup(&k), Lookup::Stale));
    }

    #[test]
    fn modification_after_compile_is_stale() {
        let store = store();
        let k = key("Lighting:Pixel:VC");
        let ticket = store.begin(ShaderFamily::Lighting);
        store.publish(&k, ShaderFamily::Lighting, Some(artifact(ShaderFamily::Lighting)), ticket);
        store
            .tracker()
            .record(ShaderFamily::Lighting, SystemTime::now() + Duration::from_secs(5));
        assert!(matches!(store.lookup(&k), Lookup::Stale));

        store.tracker().set_enabled(false);
        assert!(matches!(store.lookup(&k), Lookup::Hit(_)));
    }

    #[test]
    fn publish_uses_compile_start_time() {
        let store = store();
        let k = key("Effect:Pixel:VC");
        let ticket = store.begin(ShaderFamily::Effect);
        store
            .tracker()
            .record(ShaderFamily::Effect, ticket.started + Duration::from_millis(1));
        store.publish(&k, ShaderFamily::Effect, Some(artifact(ShaderFamily::Effect)), ticket);
        assert!(matches!(store.lookup(&k), Lookup::Stale));
    }

    #[test]
    fn clear_during_compile_drops_result() {
        let store = store();
        let k = key("Lighting:Pixel:VC");
        store.mark_pending(&k, ShaderFamily::Lighting);
        let ticket = store.begin(ShaderFamily::Lighting);
        let other = store.begin(ShaderFamily::Sky);

        store.clear_family(ShaderFamily::Lighting);
        assert!(!store.is_current(ShaderFamily::Lighting, &ticket));
        assert!(store.is_current(ShaderFamily::Sky, &other));
        assert_eq!(
            store.publish(&k, ShaderFamily::Lighting, Some(artifact(ShaderFamily::Lighting)), ticket),
            None
        );
        assert!(matches!(store.lookup(&k), Lookup::Miss));

        let retry = store.begin(ShaderFamily::Lighting);
        store.clear();
        assert!(!store.is_current(ShaderFamily::Sky, &other));
        assert_eq!(store.publish(&k, ShaderFamily::Lighting, None, retry), None);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_family_is_isolated() {
        let store = store();
        let water = key("Water:Pixel:WATER");
        let sky = key("Sky:Pixel:TEX");
        let ticket = store.begin(ShaderFamily::Water);
        store.publish(&water, ShaderFamily::Water, Some(artifact(ShaderFamily::Water)), ticket);
        let ticket = store.begin(ShaderFamily::Sky);
        store.publish(&sky, ShaderFamily::Sky, Some(artifact(ShaderFamily::Sky)), ticket);

        assert_eq!(store.clear_family(ShaderFamily::Water), 1);
        assert!(matches!(store.lookup(&water), Lookup::Miss));
        assert!(matches!(store.lookup(&sky), Lookup::Hit(_)));
    }

    #[test]
    fn keys_are_sorted() {
        let store = store();
        store.mark_pending(&key("b"), ShaderFamily::Sky);
        store.mark_pending(&key("a"), ShaderFamily::Sky);
        store.mark_pending(&key("c"), ShaderFamily::Sky);
        let keys: Vec<String> = store.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn evict_and_clear() {
        let store = store();
        let k = key("Particle:Pixel:");
        store.mark_pending(&k, ShaderFamily::Particle);
        assert!(store.evict(&k));
        assert!(!store.evict(&k));
        store.mark_pending(&k, ShaderFamily::Particle);
        store.clear();
        assert!(store.is_empty());
    }
}
