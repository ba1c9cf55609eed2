//! Subject records (users or services resolved by name or id) and the cached context
//! that wraps them.

use crate::reference::EntityReference;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// A subject is an identity that can hold roles directly or through group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Subject {
    /// Unique identifier for the subject.
    id: Uuid,
    /// Unique login name of the subject.
    name: String,
    /// Roles assigned directly to the subject.
    roles: Vec<EntityReference>,
    /// Groups the subject is a direct member of.
    groups: Vec<EntityReference>,
    /// Whether the subject is an administrator.
    is_admin: bool,
}

impl Subject {
    /// Create a new subject with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Create a new subject with a specific id.
    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: Vec::new(),
            groups: Vec::new(),
            is_admin: false,
        }
    }

    /// Add a directly assigned role.
    pub fn with_role(mut self, role: EntityReference) -> Self {
        self.roles.push(role);
        self
    }

    /// Add a group membership.
    pub fn with_group(mut self, group: EntityReference) -> Self {
        self.groups.push(group);
        self
    }

    /// Set the admin flag.
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// Get the subject's unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the subject's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the directly assigned roles.
    pub fn roles(&self) -> &[EntityReference] {
        &self.roles
    }

    /// Get the direct group memberships.
    pub fn groups(&self) -> &[EntityReference] {
        &self.groups
    }

    /// Check if the subject is an administrator.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub(crate) fn clear_roles(&mut self) {
        self.roles.clear();
    }

    pub(crate) fn clear_groups(&mut self) {
        self.groups.clear();
    }

    pub(crate) fn clear_admin(&mut self) {
        self.is_admin = false;
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

/// Cached wrapper around a subject snapshot.
///
/// A context is never mutated. A changed subject produces a new context on the next load.
#[derive(Debug, Clone)]
pub struct SubjectContext {
    subject: Arc<Subject>,
    loaded_at: DateTime<Utc>,
}

impl SubjectContext {
    /// Wrap a freshly loaded subject.
    pub fn new(subject: Subject) -> Self {
        Self {
            subject: Arc::new(subject),
            loaded_at: Utc::now(),
        }
    }

    /// Get the wrapped subject.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Get a shared handle to the wrapped subject.
    pub fn shared_subject(&self) -> Arc<Subject> {
        Arc::clone(&self.subject)
    }

    /// Get the subject's name.
    pub fn name(&self) -> &str {
        self.subject.name()
    }

    /// Get the subject's id.
    pub fn id(&self) -> Uuid {
        self.subject.id()
    }

    /// Check if the subject is an administrator.
    pub fn is_admin(&self) -> bool {
        self.subject.is_admin()
    }

    /// When the snapshot was taken from the store.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// True if both contexts wrap the same loaded snapshot.
    pub fn same_snapshot(&self, other: &SubjectContext) -> bool {
        Arc::ptr_eq(&self.subject, &other.subject)
    }
}
