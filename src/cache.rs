//! Subject and group caches backed by the record store.
//!
//! Three independent caches are kept: subjects by name, subjects by id and groups by
//! id. Each one is bounded, evicts the least recently used entry when full and expires
//! entries a fixed time after they were written. A miss loads from the
//! [`RecordStore`] synchronously. Concurrent misses on the same key share a single
//! load.
//!
//! Subject and group lookups fail differently. A subject that cannot be loaded is an
//! [`Error::SubjectNotFound`], whatever the store reported. A group that cannot be
//! loaded is `None`, and hierarchy walks treat it as a dead end.

use crate::{
    config::{CacheConfig, CacheSettings},
    error::{Error, Result, StoreError},
    group::Group,
    metrics::{CacheMetrics, MetricsSummary},
    storage::{FieldSet, RecordStore},
    subject::{Subject, SubjectContext},
};
use log::{debug, error, info, warn};
use moka::{policy::EvictionPolicy, sync::Cache};
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

/// Key selecting one entry in one of the three caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Entry in the subject-by-name cache.
    SubjectName(String),
    /// Entry in the subject-by-id cache.
    SubjectId(Uuid),
    /// Entry in the group cache.
    Group(Uuid),
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::SubjectName(name) => write!(f, "subject {name}"),
            CacheKey::SubjectId(id) => write!(f, "subject {id}"),
            CacheKey::Group(id) => write!(f, "group {id}"),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Entries in the subject-by-name cache.
    pub subjects_by_name: u64,
    /// Entries in the subject-by-id cache.
    pub subjects_by_id: u64,
    /// Entries in the group cache.
    pub groups: u64,
    /// Traffic counters.
    pub metrics: MetricsSummary,
}

impl CacheStats {
    /// Total entries across all caches.
    pub fn total_entries(&self) -> u64 {
        self.subjects_by_name + self.subjects_by_id + self.groups
    }
}

/// Read-through cache of subjects and groups.
pub struct SubjectCache {
    store: Arc<dyn RecordStore>,
    subjects_by_name: Cache<String, SubjectContext>,
    subjects_by_id: Cache<Uuid, SubjectContext>,
    groups: Cache<Uuid, Arc<Group>>,
    subject_fields: FieldSet,
    group_fields: FieldSet,
    metrics: CacheMetrics,
    #[cfg(test)]
    invalidation_fault: std::sync::atomic::AtomicBool,
}

impl std::fmt::Debug for SubjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectCache")
            .field("subjects_by_name", &self.subjects_by_name.entry_count())
            .field("subjects_by_id", &self.subjects_by_id.entry_count())
            .field("groups", &self.groups.entry_count())
            .field("subject_fields", &self.subject_fields)
            .field("group_fields", &self.group_fields)
            .finish()
    }
}

fn build_cache<K, V>(name: &str, settings: &CacheSettings) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .name(name)
        .max_capacity(settings.max_capacity)
        .time_to_live(settings.time_to_live)
        .eviction_policy(EvictionPolicy::lru())
        .build()
}

impl SubjectCache {
    /// Create the caches for the given store and configuration.
    pub fn new(store: Arc<dyn RecordStore>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    /// Create the caches with the default configuration.
    pub fn with_defaults(store: Arc<dyn RecordStore>) -> Self {
        Self::build(store, CacheConfig::default())
    }

    fn build(store: Arc<dyn RecordStore>, config: CacheConfig) -> Self {
        Self {
            store,
            subjects_by_name: build_cache("subjects-by-name", &config.subjects_by_name),
            subjects_by_id: build_cache("subjects-by-id", &config.subjects_by_id),
            groups: build_cache("groups", &config.groups),
            subject_fields: config.subject_fields,
            group_fields: config.group_fields,
            metrics: CacheMetrics::new(),
            #[cfg(test)]
            invalidation_fault: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Fields requested when loading subjects.
    pub fn subject_fields(&self) -> &FieldSet {
        &self.subject_fields
    }

    /// Fields requested when loading groups.
    pub fn group_fields(&self) -> &FieldSet {
        &self.group_fields
    }

    /// Get the context of a subject by name.
    pub fn get_subject_by_name(&self, name: &str) -> Result<SubjectContext> {
        self.metrics.record_lookup();
        self.subjects_by_name
            .try_get_with_by_ref(name, || {
                self.load_subject(name, |store, fields| {
                    store.resolve_subject_by_name(name, fields)
                })
            })
            .map_err(|_| Error::SubjectNotFound(name.to_string()))
    }

    /// Get the context of a subject by id.
    pub fn get_subject_by_id(&self, id: Uuid) -> Result<SubjectContext> {
        self.metrics.record_lookup();
        self.subjects_by_id
            .try_get_with(id, || {
                self.load_subject(&id.to_string(), |store, fields| {
                    store.resolve_subject_by_id(id, fields)
                })
            })
            .map_err(|_| Error::SubjectNotFound(id.to_string()))
    }

    /// Get the context of a subject by the string form of its id.
    ///
    /// A malformed id is reported as a missing subject.
    pub fn get_subject_by_id_str(&self, id: &str) -> Result<SubjectContext> {
        let parsed = Uuid::parse_str(id).map_err(|_| Error::SubjectNotFound(id.to_string()))?;
        self.get_subject_by_id(parsed)
    }

    /// Get the subject record by name.
    pub fn get_subject(&self, name: &str) -> Result<Arc<Subject>> {
        Ok(self.get_subject_by_name(name)?.shared_subject())
    }

    /// Get the subject record by id.
    pub fn get_subject_record_by_id(&self, id: Uuid) -> Result<Arc<Subject>> {
        Ok(self.get_subject_by_id(id)?.shared_subject())
    }

    /// Get a group by id. Any load failure yields `None`.
    pub fn get_group_by_id(&self, id: Uuid) -> Option<Arc<Group>> {
        self.metrics.record_lookup();
        let loaded = self.groups.try_get_with(id, || {
            self.metrics.record_load();
            let group = self
                .store
                .resolve_group_by_id(id, &self.group_fields)
                .inspect_err(|_| self.metrics.record_load_failure())?;
            info!("Loaded group {}:{}", group.name(), group.id());
            Ok::<_, StoreError>(Arc::new(group))
        });

        match loaded {
            Ok(group) => Some(group),
            Err(e) => {
                debug!("Group {id} is unavailable: {e}");
                None
            }
        }
    }

    /// Drop one cached entry. Faults are logged and never surface to the caller.
    ///
    /// Invalidation runs on the write path of whoever changed the record, so a fault
    /// here must not fail that write; the entry then simply lives until it expires.
    pub fn invalidate(&self, key: &CacheKey) {
        self.metrics.record_invalidation();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            #[cfg(test)]
            if self
                .invalidation_fault
                .load(std::sync::atomic::Ordering::Relaxed)
            {
                panic!("invalidation fault for {key}");
            }
            match key {
                CacheKey::SubjectName(name) => self.subjects_by_name.invalidate(name.as_str()),
                CacheKey::SubjectId(id) => self.subjects_by_id.invalidate(id),
                CacheKey::Group(id) => self.groups.invalidate(id),
            }
        }));

        if outcome.is_err() {
            self.metrics.record_invalidation_failure();
            error!("Failed to invalidate cache for {key}");
        }
    }

    /// Drop the cached subject with the given name.
    pub fn invalidate_subject(&self, name: &str) {
        self.invalidate(&CacheKey::SubjectName(name.to_string()));
    }

    /// Drop the cached subject with the given id.
    pub fn invalidate_subject_id(&self, id: Uuid) {
        self.invalidate(&CacheKey::SubjectId(id));
    }

    /// Drop the cached group with the given id.
    pub fn invalidate_group(&self, id: Uuid) {
        self.invalidate(&CacheKey::Group(id));
    }

    /// Clear all three caches.
    pub fn invalidate_all(&self) {
        self.subjects_by_name.invalidate_all();
        self.subjects_by_id.invalidate_all();
        self.groups.invalidate_all();
        info!("Subject cache entries invalidated");
    }

    /// Apply pending eviction and expiry bookkeeping now.
    pub fn run_pending_tasks(&self) {
        self.subjects_by_name.run_pending_tasks();
        self.subjects_by_id.run_pending_tasks();
        self.groups.run_pending_tasks();
    }

    /// Get cache statistics.
    ///
    /// Entry counts are eventually consistent; call [`run_pending_tasks`](Self::run_pending_tasks)
    /// first for exact figures.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            subjects_by_name: self.subjects_by_name.entry_count(),
            subjects_by_id: self.subjects_by_id.entry_count(),
            groups: self.groups.entry_count(),
            metrics: self.metrics.summary(),
        }
    }

    fn load_subject<F>(&self, key: &str, resolve: F) -> std::result::Result<SubjectContext, StoreError>
    where
        F: FnOnce(&dyn RecordStore, &FieldSet) -> std::result::Result<Subject, StoreError>,
    {
        self.metrics.record_load();
        match resolve(self.store.as_ref(), &self.subject_fields) {
            Ok(subject) => {
                info!("Loaded subject {}:{}", subject.name(), subject.id());
                Ok(SubjectContext::new(subject))
            }
            Err(e) => {
                self.metrics.record_load_failure();
                warn!("Failed to load subject {key}: {e}");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CacheConfigBuilder, reference::EntityReference, storage::MemoryStore};
    use std::time::Duration;

    fn cache_with(store: &MemoryStore, config: CacheConfig) -> SubjectCache {
        SubjectCache::new(Arc::new(store.clone()), config).unwrap()
    }

    #[test]
    fn test_subject_lookup_loads_once() {
        let store = MemoryStore::new();
        let subject = Subject::new("alice").with_role(EntityReference::role("editor"));
        store.put_subject(subject.clone());
        let cache = cache_with(&store, CacheConfig::default());

        let first = cache.get_subject_by_name("alice").unwrap();
        let second = cache.get_subject_by_name("alice").unwrap();

        assert_eq!(first.subject(), &subject);
        assert!(first.same_snapshot(&second));
        assert_eq!(store.load_counts().subjects_by_name, 1);

        let by_id = cache.get_subject_by_id(subject.id()).unwrap();
        cache.get_subject_by_id(subject.id()).unwrap();
        assert_eq!(by_id.name(), "alice");
        assert_eq!(store.load_counts().subjects_by_id, 1);
    }

    #[test]
    fn test_missing_subject_is_not_found() {
        let store = MemoryStore::new();
        let cache = cache_with(&store, CacheConfig::default());

        assert_eq!(
            cache.get_subject_by_name("ghost").unwrap_err(),
            Error::SubjectNotFound("ghost".to_string())
        );
        assert!(matches!(
            cache.get_subject_by_id(Uuid::new_v4()),
            Err(Error::SubjectNotFound(_))
        ));
        assert!(matches!(
            cache.get_subject_by_id_str("not-a-uuid"),
            Err(Error::SubjectNotFound(id)) if id == "not-a-uuid"
        ));
    }

    #[test]
    fn test_store_failure_maps_to_not_found() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        store.set_failing(true);
        let cache = cache_with(&store, CacheConfig::default());

        assert!(matches!(
            cache.get_subject_by_name("alice"),
            Err(Error::SubjectNotFound(_))
        ));

        // Failures are not cached.
        store.set_failing(false);
        assert!(cache.get_subject_by_name("alice").is_ok());
        assert_eq!(cache.stats().metrics.load_failures, 1);
    }

    #[test]
    fn test_group_failure_is_none() {
        let store = MemoryStore::new();
        let group = Group::new("engineering");
        store.put_group(group.clone());
        let cache = cache_with(&store, CacheConfig::default());

        assert_eq!(cache.get_group_by_id(group.id()).unwrap().name(), "engineering");
        assert!(cache.get_group_by_id(Uuid::new_v4()).is_none());

        store.set_failing(true);
        cache.invalidate_group(group.id());
        assert!(cache.get_group_by_id(group.id()).is_none());
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let store = MemoryStore::new();
        let subject = Subject::new("alice");
        store.put_subject(subject.clone());
        let cache = cache_with(&store, CacheConfig::default());

        cache.get_subject_by_name("alice").unwrap();
        store.put_subject(subject.clone().with_admin(true));
        assert!(!cache.get_subject_by_name("alice").unwrap().is_admin());

        cache.invalidate_subject("alice");
        assert!(cache.get_subject_by_name("alice").unwrap().is_admin());
        assert_eq!(store.load_counts().subjects_by_name, 2);
    }

    #[test]
    fn test_invalidate_unknown_key_is_noop() {
        let store = MemoryStore::new();
        let cache = cache_with(&store, CacheConfig::default());

        cache.invalidate(&CacheKey::SubjectName("nobody".to_string()));
        cache.invalidate(&CacheKey::SubjectId(Uuid::new_v4()));
        cache.invalidate(&CacheKey::Group(Uuid::new_v4()));

        let metrics = cache.stats().metrics;
        assert_eq!(metrics.invalidations, 3);
        assert_eq!(metrics.invalidation_failures, 0);
    }

    #[test]
    fn test_invalidation_fault_is_contained() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        let cache = cache_with(&store, CacheConfig::default());
        cache.get_subject_by_name("alice").unwrap();

        cache
            .invalidation_fault
            .store(true, std::sync::atomic::Ordering::Relaxed);
        cache.invalidate_subject("alice");

        let metrics = cache.stats().metrics;
        assert_eq!(metrics.invalidations, 1);
        assert_eq!(metrics.invalidation_failures, 1);

        // The entry survives the failed invalidation.
        cache.get_subject_by_name("alice").unwrap();
        assert_eq!(store.load_counts().subjects_by_name, 1);

        cache
            .invalidation_fault
            .store(false, std::sync::atomic::Ordering::Relaxed);
        cache.invalidate_subject("alice");
        cache.get_subject_by_name("alice").unwrap();
        assert_eq!(store.load_counts().subjects_by_name, 2);
        assert_eq!(cache.stats().metrics.invalidation_failures, 1);
    }

    #[test]
    fn test_subject_record_by_id() {
        let store = MemoryStore::new();
        let subject = Subject::new("alice").with_role(EntityReference::role("editor"));
        store.put_subject(subject.clone());
        let cache = cache_with(&store, CacheConfig::default());

        let record = cache.get_subject_record_by_id(subject.id()).unwrap();
        assert_eq!(*record, subject);
        let context = cache.get_subject_by_id(subject.id()).unwrap();
        assert!(Arc::ptr_eq(&record, &context.shared_subject()));
        assert_eq!(store.load_counts().subjects_by_id, 1);

        let missing = Uuid::new_v4();
        assert_eq!(
            cache.get_subject_record_by_id(missing).unwrap_err(),
            Error::SubjectNotFound(missing.to_string())
        );
    }

    #[test]
    fn test_invalidate_all_clears_every_cache() {
        let store = MemoryStore::new();
        let subject = Subject::new("alice");
        let group = Group::new("engineering");
        store.put_subject(subject.clone());
        store.put_group(group.clone());
        let cache = cache_with(&store, CacheConfig::default());

        cache.get_subject_by_name("alice").unwrap();
        cache.get_subject_by_id(subject.id()).unwrap();
        cache.get_group_by_id(group.id()).unwrap();

        cache.invalidate_all();

        cache.get_subject_by_name("alice").unwrap();
        cache.get_subject_by_id(subject.id()).unwrap();
        cache.get_group_by_id(group.id()).unwrap();

        let counts = store.load_counts();
        assert_eq!(counts.subjects_by_name, 2);
        assert_eq!(counts.subjects_by_id, 2);
        assert_eq!(counts.groups, 2);
    }

    #[test]
    fn test_expired_entry_is_reloaded() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        let config = CacheConfigBuilder::new()
            .time_to_live(Duration::from_millis(50))
            .build();
        let cache = cache_with(&store, config);

        cache.get_subject_by_name("alice").unwrap();
        std::thread::sleep(Duration::from_millis(120));
        cache.get_subject_by_name("alice").unwrap();

        assert_eq!(store.load_counts().subjects_by_name, 2);
    }

    #[test]
    fn test_loader_uses_configured_fields() {
        let store = MemoryStore::new();
        store.put_subject(
            Subject::new("alice")
                .with_role(EntityReference::role("editor"))
                .with_admin(true),
        );
        let config = CacheConfigBuilder::new()
            .subject_fields(FieldSet::new(["roles"]))
            .build();
        let cache = cache_with(&store, config);

        let context = cache.get_subject_by_name("alice").unwrap();
        assert_eq!(context.subject().roles().len(), 1);
        assert!(!context.is_admin());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let store = MemoryStore::new();
        let config = CacheConfigBuilder::new().max_capacity(0).build();

        assert!(matches!(
            SubjectCache::new(Arc::new(store), config),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        let cache = cache_with(&store, CacheConfig::default());

        cache.get_subject_by_name("alice").unwrap();
        cache.get_subject_by_name("alice").unwrap();
        cache.run_pending_tasks();

        let stats = cache.stats();
        assert_eq!(stats.subjects_by_name, 1);
        assert_eq!(stats.total_entries(), 1);
        assert_eq!(stats.metrics.lookups, 2);
        assert_eq!(stats.metrics.loads, 1);
        assert_eq!(stats.metrics.hit_ratio, 0.5);
    }
}
