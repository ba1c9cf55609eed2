//! Configuration for the subject cache.

use crate::{
    error::{Error, Result},
    storage::FieldSet,
};
use std::time::Duration;

/// Default maximum entry count per cache.
pub const DEFAULT_MAX_CAPACITY: u64 = 1000;

/// Default write-based expiry per cache.
pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(3 * 60);

/// Capacity and expiry of a single cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheSettings {
    /// Maximum number of entries before least-recently-used eviction kicks in.
    pub max_capacity: u64,
    /// Entries older than this (measured from insertion) are reloaded.
    pub time_to_live: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            time_to_live: DEFAULT_TIME_TO_LIVE,
        }
    }
}

impl CacheSettings {
    /// Create settings with the given capacity and expiry.
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        Self {
            max_capacity,
            time_to_live,
        }
    }

    fn validate(&self, cache: &str) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "{cache} cache capacity must be greater than zero"
            )));
        }
        if self.time_to_live.is_zero() {
            return Err(Error::InvalidConfiguration(format!(
                "{cache} cache time to live must be greater than zero"
            )));
        }
        Ok(())
    }
}

/// Configuration for the three caches and the fields their loaders request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "persistence", serde(default))]
pub struct CacheConfig {
    /// Subject-by-name cache.
    pub subjects_by_name: CacheSettings,
    /// Subject-by-id cache.
    pub subjects_by_id: CacheSettings,
    /// Group-by-id cache.
    pub groups: CacheSettings,
    /// Fields requested when loading subjects.
    pub subject_fields: FieldSet,
    /// Fields requested when loading groups.
    pub group_fields: FieldSet,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            subjects_by_name: CacheSettings::default(),
            subjects_by_id: CacheSettings::default(),
            groups: CacheSettings::default(),
            subject_fields: FieldSet::subject_defaults(),
            group_fields: FieldSet::group_defaults(),
        }
    }
}

impl CacheConfig {
    /// Check that every cache can hold at least one entry for a non-zero duration.
    pub fn validate(&self) -> Result<()> {
        self.subjects_by_name.validate("subjects-by-name")?;
        self.subjects_by_id.validate("subjects-by-id")?;
        self.groups.validate("groups")?;
        Ok(())
    }

    /// Parse a configuration from JSON. Missing keys fall back to defaults.
    #[cfg(feature = "persistence")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfiguration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for creating cache configurations.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use subject_cache::config::CacheConfigBuilder;
///
/// let config = CacheConfigBuilder::new()
///     .max_capacity(500)
///     .time_to_live(Duration::from_secs(60))
///     .build();
/// assert_eq!(config.groups.max_capacity, 500);
/// ```
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder starting from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity of all three caches.
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.config.subjects_by_name.max_capacity = max_capacity;
        self.config.subjects_by_id.max_capacity = max_capacity;
        self.config.groups.max_capacity = max_capacity;
        self
    }

    /// Set the expiry of all three caches.
    pub fn time_to_live(mut self, time_to_live: Duration) -> Self {
        self.config.subjects_by_name.time_to_live = time_to_live;
        self.config.subjects_by_id.time_to_live = time_to_live;
        self.config.groups.time_to_live = time_to_live;
        self
    }

    /// Override the subject-by-name cache settings.
    pub fn subjects_by_name(mut self, settings: CacheSettings) -> Self {
        self.config.subjects_by_name = settings;
        self
    }

    /// Override the subject-by-id cache settings.
    pub fn subjects_by_id(mut self, settings: CacheSettings) -> Self {
        self.config.subjects_by_id = settings;
        self
    }

    /// Override the group cache settings.
    pub fn groups(mut self, settings: CacheSettings) -> Self {
        self.config.groups = settings;
        self
    }

    /// Set the fields requested when loading subjects.
    pub fn subject_fields(mut self, fields: FieldSet) -> Self {
        self.config.subject_fields = fields;
        self
    }

    /// Set the fields requested when loading groups.
    pub fn group_fields(mut self, fields: FieldSet) -> Self {
        self.config.group_fields = fields;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
