//! Lightweight references to roles, groups and policies.

use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// An `(id, name)` pointer to another record.
///
/// Two references are equal when their ids are equal. Role matching elsewhere in the
/// crate deliberately compares names instead, see [`EntityReference::name_matches`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityReference {
    /// Unique identifier of the referenced record.
    id: Uuid,
    /// Unique name of the referenced record.
    name: String,
    /// Kind of the referenced record ("role", "group", "policy", ...).
    kind: String,
}

impl EntityReference {
    /// Create a reference with an explicit id.
    pub fn new(id: Uuid, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Create a role reference with a generated id.
    pub fn role(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4(), name, "role")
    }

    /// Create a group reference.
    pub fn group(id: Uuid, name: impl Into<String>) -> Self {
        Self::new(id, name, "group")
    }

    /// Create a policy reference with a generated id.
    pub fn policy(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4(), name, "policy")
    }

    /// Get the referenced id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the referenced name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the referenced kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Name based match used for role checks.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name == name
    }
}

impl PartialEq for EntityReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityReference {}

impl Hash for EntityReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for EntityReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

/// True if any reference in the list carries the given name.
pub(crate) fn any_named(references: &[EntityReference], name: &str) -> bool {
    references.iter().any(|reference| reference.name_matches(name))
}
