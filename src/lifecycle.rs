//! Explicit lifecycle for the subject cache.
//!
//! The composition root creates one [`SubjectCacheService`], calls
//! [`initialize`](SubjectCacheService::initialize) once during startup and hands the
//! service to the authorization layer. Before initialization, and after
//! [`clean_up`](SubjectCacheService::clean_up), reads fail with
//! [`Error::NotInitialized`] and invalidations do nothing.

use crate::{
    cache::{CacheKey, CacheStats, SubjectCache},
    config::CacheConfig,
    error::{Error, Result},
    group::Group,
    reference::EntityReference,
    storage::RecordStore,
    subject::{Subject, SubjectContext},
};
use log::info;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Owner of the subject cache and its initialized/uninitialized state.
pub struct SubjectCacheService {
    store: Arc<dyn RecordStore>,
    config: CacheConfig,
    cache: RwLock<Option<Arc<SubjectCache>>>,
}

impl std::fmt::Debug for SubjectCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectCacheService")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl SubjectCacheService {
    /// Create an uninitialized service.
    pub fn new(store: Arc<dyn RecordStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Build the caches. Calling this again while initialized only logs.
    pub fn initialize(&self) -> Result<()> {
        let mut slot = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            info!("Subject cache is already initialized");
            return Ok(());
        }

        let cache = SubjectCache::new(Arc::clone(&self.store), self.config.clone())?;
        *slot = Some(Arc::new(cache));
        info!(
            "Subject cache is initialized (subject fields: {}, group fields: {})",
            self.config.subject_fields, self.config.group_fields
        );
        Ok(())
    }

    /// Clear every cache and return to the uninitialized state.
    pub fn clean_up(&self) {
        let taken = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cache) = taken {
            cache.invalidate_all();
            info!("Subject cache is cleaned up");
        }
    }

    /// Check if the service is ready for use.
    pub fn is_initialized(&self) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Get the live cache.
    pub fn instance(&self) -> Result<Arc<SubjectCache>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::NotInitialized)
    }

    /// Get the configuration the caches are built from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// See [`SubjectCache::get_subject_by_name`].
    pub fn get_subject_by_name(&self, name: &str) -> Result<SubjectContext> {
        self.instance()?.get_subject_by_name(name)
    }

    /// See [`SubjectCache::get_subject_by_id`].
    pub fn get_subject_by_id(&self, id: Uuid) -> Result<SubjectContext> {
        self.instance()?.get_subject_by_id(id)
    }

    /// See [`SubjectCache::get_subject_by_id_str`].
    pub fn get_subject_by_id_str(&self, id: &str) -> Result<SubjectContext> {
        self.instance()?.get_subject_by_id_str(id)
    }

    /// See [`SubjectCache::get_subject`].
    pub fn get_subject(&self, name: &str) -> Result<Arc<Subject>> {
        self.instance()?.get_subject(name)
    }

    /// See [`SubjectCache::get_subject_record_by_id`].
    pub fn get_subject_record_by_id(&self, id: Uuid) -> Result<Arc<Subject>> {
        self.instance()?.get_subject_record_by_id(id)
    }

    /// See [`SubjectCache::get_group_by_id`].
    pub fn get_group_by_id(&self, id: Uuid) -> Result<Option<Arc<Group>>> {
        Ok(self.instance()?.get_group_by_id(id))
    }

    /// See [`SubjectCache::is_descendant_of`].
    pub fn is_descendant_of(&self, group: &EntityReference, ancestor_name: &str) -> Result<bool> {
        Ok(self.instance()?.is_descendant_of(group, ancestor_name))
    }

    /// See [`SubjectCache::subject_has_role`].
    pub fn subject_has_role(&self, subject: &Subject, role_name: &str) -> Result<bool> {
        Ok(self.instance()?.subject_has_role(subject, role_name))
    }

    /// See [`SubjectCache::collect_inherited_roles`].
    pub fn collect_inherited_roles(
        &self,
        groups: &[EntityReference],
    ) -> Result<Vec<EntityReference>> {
        Ok(self.instance()?.collect_inherited_roles(groups))
    }

    /// See [`SubjectCache::subject_roles`].
    pub fn subject_roles(&self, subject: &Subject) -> Result<Vec<EntityReference>> {
        Ok(self.instance()?.subject_roles(subject))
    }

    /// Drop one cached entry; no-op when not initialized.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Ok(cache) = self.instance() {
            cache.invalidate(key);
        }
    }

    /// Drop a cached subject by name; no-op when not initialized.
    pub fn invalidate_subject(&self, name: &str) {
        self.invalidate(&CacheKey::SubjectName(name.to_string()));
    }

    /// Drop a cached subject by id; no-op when not initialized.
    pub fn invalidate_subject_id(&self, id: Uuid) {
        self.invalidate(&CacheKey::SubjectId(id));
    }

    /// Drop a cached group; no-op when not initialized.
    pub fn invalidate_group(&self, id: Uuid) {
        self.invalidate(&CacheKey::Group(id));
    }

    /// Clear every cache without leaving the initialized state.
    pub fn invalidate_all(&self) {
        if let Ok(cache) = self.instance() {
            cache.invalidate_all();
        }
    }

    /// Cache statistics, if initialized.
    pub fn stats(&self) -> Option<CacheStats> {
        self.instance().ok().map(|cache| cache.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::CacheConfigBuilder, storage::MemoryStore};

    fn service(store: &MemoryStore) -> SubjectCacheService {
        SubjectCacheService::new(Arc::new(store.clone()), CacheConfig::default())
    }

    #[test]
    fn test_use_before_initialize() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        let service = service(&store);

        assert!(!service.is_initialized());
        assert_eq!(service.instance().unwrap_err(), Error::NotInitialized);
        assert_eq!(
            service.get_subject_by_name("alice").unwrap_err(),
            Error::NotInitialized
        );
        assert!(service.stats().is_none());

        assert_eq!(
            service.get_subject_record_by_id(Uuid::new_v4()).unwrap_err(),
            Error::NotInitialized
        );

        // Invalidation and cleanup are safe without initialization.
        service.invalidate_subject("alice");
        service.invalidate_subject_id(Uuid::new_v4());
        service.invalidate_all();
        service.clean_up();
        assert_eq!(store.load_counts().total(), 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        let service = service(&store);

        service.initialize().unwrap();
        let first = service.instance().unwrap();
        service.get_subject_by_name("alice").unwrap();

        service.initialize().unwrap();
        let second = service.instance().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        service.get_subject_by_name("alice").unwrap();
        assert_eq!(store.load_counts().subjects_by_name, 1);
    }

    #[test]
    fn test_clean_up_resets_state() {
        let store = MemoryStore::new();
        store.put_subject(Subject::new("alice"));
        let service = service(&store);

        service.initialize().unwrap();
        service.get_subject_by_name("alice").unwrap();

        service.clean_up();
        service.clean_up();
        assert!(!service.is_initialized());
        assert_eq!(
            service.get_subject_by_name("alice").unwrap_err(),
            Error::NotInitialized
        );

        service.initialize().unwrap();
        service.get_subject_by_name("alice").unwrap();
        assert_eq!(store.load_counts().subjects_by_name, 2);
    }

    #[test]
    fn test_invalid_config_fails_initialize() {
        let store = MemoryStore::new();
        let config = CacheConfigBuilder::new().max_capacity(0).build();
        let service = SubjectCacheService::new(Arc::new(store), config);

        assert!(matches!(
            service.initialize(),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(!service.is_initialized());
    }

    #[test]
    fn test_forwarding_entry_points() {
        let store = MemoryStore::new();
        let parent = Group::new("company").with_default_role(EntityReference::role("viewer"));
        let group = Group::new("engineering").with_parent(parent.to_reference());
        let subject = Subject::new("alice").with_group(group.to_reference());
        store.put_group(parent.clone());
        store.put_group(group.clone());
        store.put_subject(subject.clone());
        let service = service(&store);
        service.initialize().unwrap();

        let context = service.get_subject_by_id(subject.id()).unwrap();
        assert_eq!(context.name(), "alice");
        assert_eq!(
            service
                .get_subject_by_id_str(&subject.id().to_string())
                .unwrap()
                .id(),
            subject.id()
        );
        assert_eq!(service.get_subject("alice").unwrap().id(), subject.id());
        assert_eq!(
            service.get_subject_record_by_id(subject.id()).unwrap().name(),
            "alice"
        );
        assert!(service.get_group_by_id(group.id()).unwrap().is_some());
        assert!(service.is_descendant_of(&group.to_reference(), "company").unwrap());
        assert!(service.subject_has_role(context.subject(), "viewer").unwrap());
        assert_eq!(
            service
                .collect_inherited_roles(subject.groups())
                .unwrap()
                .len(),
            1
        );
        assert_eq!(service.subject_roles(&subject).unwrap().len(), 1);

        service.invalidate_group(parent.id());
        service.get_group_by_id(parent.id()).unwrap();
        assert_eq!(store.load_counts().groups, 3);

        assert_eq!(store.load_counts().subjects_by_id, 1);
        service.invalidate_subject_id(subject.id());
        service.get_subject_record_by_id(subject.id()).unwrap();
        assert_eq!(store.load_counts().subjects_by_id, 2);
    }
}
