//! Group hierarchy resolution on top of the group cache.
//!
//! Every walk goes through [`SubjectCache::get_group_by_id`], so repeated walks are
//! served from the cache. The parent graph comes from the store and may contain
//! cycles; each walk tracks the group ids it has visited and never expands a group
//! twice. A group that cannot be loaded ends its branch.
//!
//! Roles are matched by name, not by id.

use crate::{
    cache::SubjectCache,
    group::Group,
    reference::{EntityReference, any_named},
    subject::Subject,
};
use log::trace;
use std::collections::HashSet;
use std::ops::ControlFlow;
use uuid::Uuid;

impl SubjectCache {
    /// Depth-first walk over `seeds` and everything reachable through parent edges.
    ///
    /// Groups are visited in preorder: a group, then its parents in declaration order.
    /// Returns true as soon as `visit` breaks.
    fn walk_groups<F>(&self, seeds: &[EntityReference], mut visit: F) -> bool
    where
        F: FnMut(&Group) -> ControlFlow<()>,
    {
        let mut stack: Vec<Uuid> = seeds.iter().rev().map(EntityReference::id).collect();
        let mut visited = HashSet::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                trace!("Group {id} reached again, skipping");
                continue;
            }
            let Some(group) = self.get_group_by_id(id) else {
                continue;
            };
            if visit(&group).is_break() {
                return true;
            }
            stack.extend(group.parents().iter().rev().map(EntityReference::id));
        }
        false
    }

    /// Return true if `group` or any of its ancestors is named `ancestor_name`.
    pub fn is_descendant_of(&self, group: &EntityReference, ancestor_name: &str) -> bool {
        self.walk_groups(std::slice::from_ref(group), |candidate| {
            if candidate.name() == ancestor_name {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Return true if the subject holds `role_name` directly or through any group it
    /// belongs to, including inherited groups.
    pub fn subject_has_role(&self, subject: &Subject, role_name: &str) -> bool {
        if any_named(subject.roles(), role_name) {
            return true;
        }

        self.walk_groups(subject.groups(), |group| {
            if any_named(group.default_roles(), role_name) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Collect the default roles of the given groups and all of their ancestors.
    ///
    /// Roles are returned in the order they are first seen and each role name appears
    /// once.
    pub fn collect_inherited_roles(&self, groups: &[EntityReference]) -> Vec<EntityReference> {
        let mut roles = RoleAccumulator::default();
        self.walk_groups(groups, |group| {
            roles.extend(group.default_roles());
            ControlFlow::Continue(())
        });
        roles.into_roles()
    }

    /// All roles of a subject: direct roles first, then inherited ones, deduplicated by name.
    pub fn subject_roles(&self, subject: &Subject) -> Vec<EntityReference> {
        let mut roles = RoleAccumulator::default();
        roles.extend(subject.roles());
        roles.extend(&self.collect_inherited_roles(subject.groups()));
        roles.into_roles()
    }
}

/// Ordered, name-deduplicated role list.
#[derive(Default)]
struct RoleAccumulator {
    seen: HashSet<String>,
    roles: Vec<EntityReference>,
}

impl RoleAccumulator {
    fn extend(&mut self, roles: &[EntityReference]) {
        for role in roles {
            if self.seen.insert(role.name().to_string()) {
                self.roles.push(role.clone());
            }
        }
    }

    fn into_roles(self) -> Vec<EntityReference> {
        self.roles
    }
}
