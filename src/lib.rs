//! # Subject Cache
//!
//! This crate resolves the identity and group-membership data an authorization engine
//! needs to evaluate access-control policies, without going back to the record store
//! on every check.
//!
//! ## Features
//!
//! - Three independent read-through caches: subjects by name, subjects by id, groups by id
//! - Bounded capacity with least-recently-used eviction
//! - Write-based expiry, so upstream changes propagate within a fixed window
//! - Explicit invalidation of a single entry or of everything
//! - One store load per key under concurrent misses
//! - Group hierarchy walks: ancestry, inherited role checks, inherited role collection
//! - Cycle-safe traversal of the group parent graph
//! - Explicit lifecycle with a typed "not initialized" error
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use subject_cache::{
//!     CacheConfig, EntityReference, Group, MemoryStore, Subject, SubjectCacheService,
//! };
//!
//! let store = MemoryStore::new();
//! let company = Group::new("company").with_default_role(EntityReference::role("viewer"));
//! let engineering = Group::new("engineering").with_parent(company.to_reference());
//! store.put_group(company);
//! store.put_group(engineering.clone());
//! store.put_subject(Subject::new("alice").with_group(engineering.to_reference()));
//!
//! let service = SubjectCacheService::new(Arc::new(store), CacheConfig::default());
//! service.initialize()?;
//!
//! let alice = service.get_subject_by_name("alice")?;
//! assert!(service.subject_has_role(alice.subject(), "viewer")?);
//! assert!(service.is_descendant_of(&engineering.to_reference(), "company")?);
//! # Ok::<(), subject_cache::Error>(())
//! ```
//!
//! ## Audit Logging
//!
//! Loads, invalidations and lifecycle changes are logged through the `log` facade.
//! With the `audit` feature enabled, a ready-made `env_logger` initialiser is available:
//!
//! ```rust
//! # #[cfg(feature = "audit")]
//! subject_cache::init_audit_logger();
//!
//! // Configure log level through RUST_LOG environment variable:
//! // RUST_LOG=info,subject_cache=debug
//! ```

/// Install `env_logger` as the global logger, configured through `RUST_LOG`.
///
/// Safe to call more than once: if a logger is already installed it is kept.
#[cfg(feature = "audit")]
pub fn init_audit_logger() {
    if let Err(e) = env_logger::try_init() {
        log::debug!("Audit logger not installed: {e}");
    }
}

pub mod cache;
pub mod config;
pub mod error;
pub mod group;
pub mod hierarchy;
pub mod lifecycle;
pub mod metrics;
pub mod reference;
pub mod storage;
pub mod subject;

// Re-export main types for convenience
pub use crate::{
    cache::{CacheKey, CacheStats, SubjectCache},
    config::{CacheConfig, CacheConfigBuilder, CacheSettings},
    error::{Error, Result, StoreError},
    group::Group,
    lifecycle::SubjectCacheService,
    reference::EntityReference,
    storage::{FieldSet, LoadCounts, MemoryStore, RecordStore},
    subject::{Subject, SubjectContext},
};
