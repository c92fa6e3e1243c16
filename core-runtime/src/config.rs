//! # Core Configuration Module
//!
//! Provides configuration management for the podcast sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every tunable the core needs. It enforces fail-fast
//! validation so that a bad limit is rejected at startup instead of producing
//! malformed batches later.
//!
//! ## Settings
//!
//! - [`TagConfig`] - How storage tags are named (prefix, app name/version)
//! - [`BatchLimits`] - Episodes per batch and batches per sync pass
//! - `max_fetch_batches` - Hard cap on the sequential batch read scan
//! - `compress_payloads` - Whether payloads are gzip-compressed before posting
//! - `confirm_transactions` - Whether each posted batch is confirmed
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .tag_prefix("pod-")
//!     .max_episodes_per_batch(25)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.tags.tag_name("subscribeUrl"), "pod-subscribeUrl");
//! assert_eq!(config.batching.max_episodes_per_batch, 25);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .max_batches(0)
//!     .build()
//!     .expect("Should fail - zero batches per pass");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of episodes stored in one batch record
pub const DEFAULT_MAX_EPISODES_PER_BATCH: usize = 50;

/// Default number of batches emitted by one sync pass
pub const DEFAULT_MAX_BATCHES: usize = 10;

/// Default cap on sequential batch reads per podcast
pub const DEFAULT_MAX_FETCH_BATCHES: usize = 100;

const MAX_LIMIT: usize = 1000;

/// Naming of the tags attached to every stored batch.
///
/// The prefix namespaces the metadata tags so that several deployments can
/// share one store without reading each other's batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    /// Prefix prepended to every metadata tag name
    pub prefix: String,

    /// Value of the unprefixed `App-Name` tag
    pub app_name: String,

    /// Value of the unprefixed `App-Version` tag
    pub app_version: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            app_name: "podsync".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TagConfig {
    /// Full tag name for a metadata field
    pub fn tag_name(&self, field: &str) -> String {
        format!("{}{}", self.prefix, field)
    }

    /// Strip the prefix from a stored tag name
    ///
    /// Returns `None` when the name does not carry this configuration's prefix.
    pub fn field_name<'a>(&self, tag_name: &'a str) -> Option<&'a str> {
        tag_name.strip_prefix(self.prefix.as_str())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.prefix.chars().any(char::is_whitespace) {
            return Err(Error::Config(
                "Tag prefix cannot contain whitespace".to_string(),
            ));
        }

        if self.app_name.trim().is_empty() {
            return Err(Error::Config("App name cannot be empty".to_string()));
        }

        Ok(())
    }
}

/// Size bounds for outgoing metadata batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum number of episodes in a single batch record
    pub max_episodes_per_batch: usize,

    /// Maximum number of batches emitted by one sync pass
    ///
    /// Episodes beyond `max_batches * max_episodes_per_batch` are left for
    /// the next pass.
    pub max_batches: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_episodes_per_batch: DEFAULT_MAX_EPISODES_PER_BATCH,
            max_batches: DEFAULT_MAX_BATCHES,
        }
    }
}

impl BatchLimits {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_episodes_per_batch == 0 {
            return Err(Error::Config(
                "Max episodes per batch must be greater than 0".to_string(),
            ));
        }

        if self.max_batches == 0 {
            return Err(Error::Config(
                "Max batches per sync must be greater than 0".to_string(),
            ));
        }

        if self.max_episodes_per_batch > MAX_LIMIT || self.max_batches > MAX_LIMIT {
            return Err(Error::Config(format!(
                "Batch limits exceed maximum of {}",
                MAX_LIMIT
            )));
        }

        Ok(())
    }
}

/// Core configuration for the podcast sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Storage tag naming
    pub tags: TagConfig,

    /// Outgoing batch size bounds
    pub batching: BatchLimits,

    /// Hard cap on sequential batch reads for one podcast
    pub max_fetch_batches: usize,

    /// Gzip payloads before posting
    pub compress_payloads: bool,

    /// Confirm every posted batch with the store
    pub confirm_transactions: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tags: TagConfig::default(),
            batching: BatchLimits::default(),
            max_fetch_batches: DEFAULT_MAX_FETCH_BATCHES,
            compress_payloads: true,
            confirm_transactions: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Tag prefix and app name are usable as tag data
    /// - Batch limits are non-zero and bounded
    /// - The fetch cap is non-zero and bounded
    pub fn validate(&self) -> Result<()> {
        self.tags.validate()?;
        self.batching.validate()?;

        if self.max_fetch_batches == 0 {
            return Err(Error::Config(
                "Max fetch batches must be greater than 0".to_string(),
            ));
        }

        if self.max_fetch_batches > MAX_LIMIT {
            return Err(Error::Config(format!(
                "Max fetch batches exceeds maximum of {}",
                MAX_LIMIT
            )));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Unset values fall back to the defaults; [`build()`](CoreConfigBuilder::build)
/// validates the result.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    tag_prefix: Option<String>,
    app_name: Option<String>,
    app_version: Option<String>,
    max_episodes_per_batch: Option<usize>,
    max_batches: Option<usize>,
    max_fetch_batches: Option<usize>,
    compress_payloads: Option<bool>,
    confirm_transactions: Option<bool>,
}

impl CoreConfigBuilder {
    /// Sets the prefix prepended to every metadata tag name.
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = Some(prefix.into());
        self
    }

    /// Sets the `App-Name` tag value.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Sets the `App-Version` tag value.
    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Sets the maximum number of episodes per batch.
    ///
    /// Default: 50
    pub fn max_episodes_per_batch(mut self, count: usize) -> Self {
        self.max_episodes_per_batch = Some(count);
        self
    }

    /// Sets the maximum number of batches emitted per sync pass.
    ///
    /// Default: 10
    pub fn max_batches(mut self, count: usize) -> Self {
        self.max_batches = Some(count);
        self
    }

    /// Sets the hard cap on sequential batch reads.
    ///
    /// Default: 100
    pub fn max_fetch_batches(mut self, count: usize) -> Self {
        self.max_fetch_batches = Some(count);
        self
    }

    /// Enables or disables payload compression.
    pub fn compress_payloads(mut self, enabled: bool) -> Self {
        self.compress_payloads = Some(enabled);
        self
    }

    /// Enables or disables confirmation of posted batches.
    pub fn confirm_transactions(mut self, enabled: bool) -> Self {
        self.confirm_transactions = Some(enabled);
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any value fails validation.
    pub fn build(self) -> Result<CoreConfig> {
        let defaults = CoreConfig::default();

        let tags = TagConfig {
            prefix: self.tag_prefix.unwrap_or(defaults.tags.prefix),
            app_name: self.app_name.unwrap_or(defaults.tags.app_name),
            app_version: self.app_version.unwrap_or(defaults.tags.app_version),
        };

        let batching = BatchLimits {
            max_episodes_per_batch: self
                .max_episodes_per_batch
                .unwrap_or(defaults.batching.max_episodes_per_batch),
            max_batches: self.max_batches.unwrap_or(defaults.batching.max_batches),
        };

        let config = CoreConfig {
            tags,
            batching,
            max_fetch_batches: self
                .max_fetch_batches
                .unwrap_or(defaults.max_fetch_batches),
            compress_payloads: self
                .compress_payloads
                .unwrap_or(defaults.compress_payloads),
            confirm_transactions: self
                .confirm_transactions
                .unwrap_or(defaults.confirm_transactions),
        };

        config.validate()?;
        Ok(config)
    }
}
