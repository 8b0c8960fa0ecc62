//! # Core Configuration Module
//!
//! Builder-based configuration for the catalog core.
//!
//! ## Overview
//!
//! `CoreConfig` carries the host capabilities the core needs and the few
//! tunables it exposes. The builder fails fast: a missing required capability
//! is reported at `build()` time with an actionable message instead of
//! surfacing later as a silent leak.
//!
//! ## Required Dependencies
//!
//! - `MediaReleaser` - frees locally owned media handles (object URLs)
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `IdGenerator` - identifier source (default: UUID v4)
//!
//! ## Usage
//!
//! ```
//! use bridge_traits::{NoopReleaser, SequentialIdGenerator};
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_releaser(Arc::new(NoopReleaser))
//!     .id_generator(Arc::new(SequentialIdGenerator::new()))
//!     .event_buffer_size(64)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.catalog.max_name_len, 200);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No MediaReleaser: uploaded media could never be freed.
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing media releaser");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{IdGenerator, MediaReleaser, RandomIdGenerator};
use std::sync::Arc;

/// Longest album name or track title accepted by default, in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 200;

/// Core configuration for the catalog engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Identifier source for new tracks and albums
    pub id_generator: Arc<dyn IdGenerator>,

    /// Releases locally owned media handles (required)
    pub media_releaser: Arc<dyn MediaReleaser>,

    /// Per-subscriber event buffer
    pub event_buffer_size: usize,

    /// Validation limits for catalog input
    pub catalog: CatalogLimits,

    /// Whether resolving a shared track link starts playback
    pub autoplay_deep_links: bool,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("id_generator", &"IdGenerator { ... }")
            .field("media_releaser", &"MediaReleaser { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("catalog", &self.catalog)
            .field("autoplay_deep_links", &self.autoplay_deep_links)
            .finish()
    }
}

/// Input limits enforced by the collection store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    /// Maximum length of a trimmed album name or track title/artist
    pub max_name_len: usize,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl CatalogLimits {
    pub fn with_max_name_len(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks the tunables.
    ///
    /// - the event buffer must hold at least one event
    /// - names must be allowed at least one character
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.catalog.max_name_len == 0 {
            return Err(Error::Config(
                "Maximum name length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn media_releaser_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaReleaser".to_string(),
        message: "MediaReleaser implementation is required to free locally owned media. \
                 Web: inject a releaser that calls URL.revokeObjectURL. \
                 Hosts without local media: inject bridge_traits::NoopReleaser explicitly."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    id_generator: Option<Arc<dyn IdGenerator>>,
    media_releaser: Option<Arc<dyn MediaReleaser>>,
    event_buffer_size: Option<usize>,
    catalog: CatalogLimits,
    autoplay_deep_links: Option<bool>,
}

impl CoreConfigBuilder {
    /// Sets the identifier source.
    ///
    /// Default: [`RandomIdGenerator`]. Tests usually inject a
    /// `SequentialIdGenerator` for stable ids.
    pub fn id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Sets the media releaser (required).
    pub fn media_releaser(mut self, releaser: Arc<dyn MediaReleaser>) -> Self {
        self.media_releaser = Some(releaser);
        self
    }

    /// Sets the per-subscriber event buffer size.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the catalog input limits.
    pub fn catalog_limits(mut self, limits: CatalogLimits) -> Self {
        self.catalog = limits;
        self
    }

    /// Sets whether opening a shared track link starts playback.
    ///
    /// Default: true
    pub fn autoplay_deep_links(mut self, enabled: bool) -> Self {
        self.autoplay_deep_links = Some(enabled);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no `MediaReleaser` was provided
    /// - [`Error::Config`] when a tunable is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let media_releaser = self
            .media_releaser
            .ok_or_else(media_releaser_missing_error)?;

        let config = CoreConfig {
            id_generator: self
                .id_generator
                .unwrap_or_else(|| Arc::new(RandomIdGenerator)),
            media_releaser,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            catalog: self.catalog,
            autoplay_deep_links: self.autoplay_deep_links.unwrap_or(true),
        };

        config.validate()?;

        Ok(config)
    }
}
