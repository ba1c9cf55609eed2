//! Group (team) records and their parent edges.

use crate::reference::EntityReference;
use uuid::Uuid;

/// A group grants default roles to its members and may have parent groups.
///
/// The parent edges form a directed graph that is not guaranteed to be acyclic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Group {
    /// Unique identifier for the group.
    id: Uuid,
    /// Unique name of the group.
    name: String,
    /// Roles granted to every direct or inherited member.
    default_roles: Vec<EntityReference>,
    /// Policies attached to the group.
    policies: Vec<EntityReference>,
    /// Parent groups.
    parents: Vec<EntityReference>,
}

impl Group {
    /// Create a new group with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    /// Create a new group with a specific id.
    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            default_roles: Vec::new(),
            policies: Vec::new(),
            parents: Vec::new(),
        }
    }

    /// Add a default role.
    pub fn with_default_role(mut self, role: EntityReference) -> Self {
        self.default_roles.push(role);
        self
    }

    /// Add multiple default roles.
    pub fn with_default_roles(mut self, roles: impl IntoIterator<Item = EntityReference>) -> Self {
        self.default_roles.extend(roles);
        self
    }

    /// Attach a policy.
    pub fn with_policy(mut self, policy: EntityReference) -> Self {
        self.policies.push(policy);
        self
    }

    /// Add a parent group.
    pub fn with_parent(mut self, parent: EntityReference) -> Self {
        self.parents.push(parent);
        self
    }

    /// Get a reference pointing at this group.
    pub fn to_reference(&self) -> EntityReference {
        EntityReference::group(self.id, self.name.clone())
    }

    /// Get the group's unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the group's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the default roles.
    pub fn default_roles(&self) -> &[EntityReference] {
        &self.default_roles
    }

    /// Get the attached policies.
    pub fn policies(&self) -> &[EntityReference] {
        &self.policies
    }

    /// Get the parent groups.
    pub fn parents(&self) -> &[EntityReference] {
        &self.parents
    }

    pub(crate) fn clear_default_roles(&mut self) {
        self.default_roles.clear();
    }

    pub(crate) fn clear_policies(&mut self) {
        self.policies.clear();
    }

    pub(crate) fn clear_parents(&mut self) {
        self.parents.clear();
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_creation() {
        let parent = Group::new("company");
        let group = Group::new("engineering")
            .with_default_roles([EntityReference::role("viewer"), EntityReference::role("editor")])
            .with_policy(EntityReference::policy("org-policy"))
            .with_parent(parent.to_reference());

        assert_eq!(group.name(), "engineering");
        assert_eq!(group.default_roles().len(), 2);
        assert_eq!(group.policies().len(), 1);
        assert_eq!(group.parents()[0].id(), parent.id());
        assert_eq!(group.parents()[0].name(), "company");
        assert_eq!(group.parents()[0].kind(), "group");
    }
}
