//! Record store abstraction consumed by the cache, plus an in-memory implementation.

use crate::{error::StoreError, group::Group, subject::Subject};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Subject field holding directly assigned roles.
pub const FIELD_ROLES: &str = "roles";
/// Subject field holding group memberships.
pub const FIELD_GROUPS: &str = "groups";
/// Subject field holding the admin flag.
pub const FIELD_IS_ADMIN: &str = "is_admin";
/// Group field holding default roles.
pub const FIELD_DEFAULT_ROLES: &str = "default_roles";
/// Group field holding attached policies.
pub const FIELD_POLICIES: &str = "policies";
/// Group field holding parent references.
pub const FIELD_PARENTS: &str = "parents";

/// The set of record attributes requested from the store on a load.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "persistence", serde(transparent))]
pub struct FieldSet {
    fields: Vec<String>,
}

impl FieldSet {
    /// Create a field set, dropping duplicates while keeping order.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self { fields: Vec::new() };
        for field in fields {
            let field = field.into();
            if !set.contains(&field) {
                set.fields.push(field);
            }
        }
        set
    }

    /// Fields the cache requests for subjects by default.
    pub fn subject_defaults() -> Self {
        Self::new([FIELD_ROLES, FIELD_GROUPS, FIELD_IS_ADMIN])
    }

    /// Fields the cache requests for groups by default.
    pub fn group_defaults() -> Self {
        Self::new([FIELD_DEFAULT_ROLES, FIELD_POLICIES, FIELD_PARENTS])
    }

    /// Check if a field is requested.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Iterate over the requested fields.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Number of requested fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is requested.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl std::fmt::Display for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fields.join(","))
    }
}

/// Trait for resolving subject and group records from the backing store.
///
/// Implementations are called synchronously on cache misses and may block.
pub trait RecordStore: Send + Sync {
    /// Resolve a subject by its unique name.
    fn resolve_subject_by_name(
        &self,
        name: &str,
        fields: &FieldSet,
    ) -> std::result::Result<Subject, StoreError>;

    /// Resolve a subject by its unique id.
    fn resolve_subject_by_id(
        &self,
        id: Uuid,
        fields: &FieldSet,
    ) -> std::result::Result<Subject, StoreError>;

    /// Resolve a group by its unique id.
    fn resolve_group_by_id(
        &self,
        id: Uuid,
        fields: &FieldSet,
    ) -> std::result::Result<Group, StoreError>;
}

/// Number of resolve calls a [`MemoryStore`] has served, per lookup kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    /// Subject loads by name.
    pub subjects_by_name: u64,
    /// Subject loads by id.
    pub subjects_by_id: u64,
    /// Group loads by id.
    pub groups: u64,
}

impl LoadCounts {
    /// Total resolve calls.
    pub fn total(&self) -> u64 {
        self.subjects_by_name + self.subjects_by_id + self.groups
    }
}

#[derive(Debug, Default)]
struct LoadCounters {
    subjects_by_name: AtomicU64,
    subjects_by_id: AtomicU64,
    groups: AtomicU64,
}

/// In-memory record store using DashMap for thread safety.
///
/// Returned records are projected onto the requested field set, so fields the caller
/// did not ask for come back empty.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    subjects: Arc<DashMap<Uuid, Subject>>,
    subject_names: Arc<DashMap<String, Uuid>>,
    groups: Arc<DashMap<Uuid, Group>>,
    counters: Arc<LoadCounters>,
    failing: Arc<AtomicBool>,
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Create a new memory store instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every resolve call by the given duration.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert or replace a subject.
    pub fn put_subject(&self, subject: Subject) {
        if let Some(previous) = self.subjects.get(&subject.id()).map(|s| s.name().to_string())
            && previous != subject.name()
        {
            self.subject_names.remove(&previous);
        }
        self.subject_names
            .insert(subject.name().to_string(), subject.id());
        self.subjects.insert(subject.id(), subject);
    }

    /// Insert or replace a group.
    pub fn put_group(&self, group: Group) {
        self.groups.insert(group.id(), group);
    }

    /// Remove a subject by id.
    pub fn remove_subject(&self, id: Uuid) -> bool {
        match self.subjects.remove(&id) {
            Some((_, subject)) => {
                self.subject_names.remove(subject.name());
                true
            }
            None => false,
        }
    }

    /// Remove a group by id.
    pub fn remove_group(&self, id: Uuid) -> bool {
        self.groups.remove(&id).is_some()
    }

    /// Make every resolve call fail with a backend error while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get how many resolve calls were served so far.
    pub fn load_counts(&self) -> LoadCounts {
        LoadCounts {
            subjects_by_name: self.counters.subjects_by_name.load(Ordering::SeqCst),
            subjects_by_id: self.counters.subjects_by_id.load(Ordering::SeqCst),
            groups: self.counters.groups.load(Ordering::SeqCst),
        }
    }

    /// Get the number of stored subjects.
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Get the number of stored groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn begin_load(&self, counter: &AtomicU64) -> std::result::Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store is failing".to_string()));
        }
        Ok(())
    }

    fn project_subject(mut subject: Subject, fields: &FieldSet) -> Subject {
        if !fields.contains(FIELD_ROLES) {
            subject.clear_roles();
        }
        if !fields.contains(FIELD_GROUPS) {
            subject.clear_groups();
        }
        if !fields.contains(FIELD_IS_ADMIN) {
            subject.clear_admin();
        }
        subject
    }

    fn project_group(mut group: Group, fields: &FieldSet) -> Group {
        if !fields.contains(FIELD_DEFAULT_ROLES) {
            group.clear_default_roles();
        }
        if !fields.contains(FIELD_POLICIES) {
            group.clear_policies();
        }
        if !fields.contains(FIELD_PARENTS) {
            group.clear_parents();
        }
        group
    }
}

impl RecordStore for MemoryStore {
    fn resolve_subject_by_name(
        &self,
        name: &str,
        fields: &FieldSet,
    ) -> std::result::Result<Subject, StoreError> {
        self.begin_load(&self.counters.subjects_by_name)?;
        let id = self
            .subject_names
            .get(name)
            .map(|id| *id)
            .ok_or_else(|| StoreError::subject_not_found(name))?;
        let subject = self
            .subjects
            .get(&id)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::subject_not_found(name))?;
        Ok(Self::project_subject(subject, fields))
    }

    fn resolve_subject_by_id(
        &self,
        id: Uuid,
        fields: &FieldSet,
    ) -> std::result::Result<Subject, StoreError> {
        self.begin_load(&self.counters.subjects_by_id)?;
        let subject = self
            .subjects
            .get(&id)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::subject_not_found(id))?;
        Ok(Self::project_subject(subject, fields))
    }

    fn resolve_group_by_id(
        &self,
        id: Uuid,
        fields: &FieldSet,
    ) -> std::result::Result<Group, StoreError> {
        self.begin_load(&self.counters.groups)?;
        let group = self
            .groups
            .get(&id)
            .map(|g| g.clone())
            .ok_or_else(|| StoreError::group_not_found(id))?;
        Ok(Self::project_group(group, fields))
    }
}
