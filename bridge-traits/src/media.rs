//! Media resource bridge traits and supporting types.
//!
//! The core never decodes audio. It drives a host-provided [`MediaResource`]
//! (an `<audio>` element on the web, a native player elsewhere) through
//! fire-and-forget commands, and the host feeds the resource's asynchronous
//! signals back into the core as [`MediaSignal`] values. Every signal is
//! stamped with the [`LoadId`] of the load that produced it so the core can
//! discard signals belonging to a superseded load.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Where the audio for a track comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    /// URL-like locator understood by the host (object URL, file path, https URL).
    Locator(String),
    /// Encoded audio supplied inline. `name` identifies the buffer for logs
    /// and release bookkeeping.
    Inline { name: String, data: Bytes },
}

impl MediaSource {
    /// Stable key used to compare sources and to track releases.
    pub fn key(&self) -> &str {
        match self {
            MediaSource::Locator(locator) => locator,
            MediaSource::Inline { name, .. } => name,
        }
    }
}

/// Who is responsible for freeing the underlying resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    /// Created by this application (e.g. an object URL for an uploaded file)
    /// and must be revoked when no longer needed.
    Local,
    /// Supplied from outside; never released by the core.
    External,
}

/// Opaque handle to a decodable audio or image asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    pub source: MediaSource,
    pub ownership: Ownership,
}

impl MediaHandle {
    /// Locally owned locator, e.g. `blob:` object URL.
    pub fn local(locator: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Locator(locator.into()),
            ownership: Ownership::Local,
        }
    }

    /// Externally supplied locator that the core must never release.
    pub fn external(locator: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Locator(locator.into()),
            ownership: Ownership::External,
        }
    }

    /// Inline buffer held by the application.
    pub fn inline(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            source: MediaSource::Inline {
                name: name.into(),
                data: data.into(),
            },
            ownership: Ownership::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        self.ownership == Ownership::Local
    }

    pub fn key(&self) -> &str {
        self.source.key()
    }
}

/// Identifies one load issued to a [`MediaResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadId(pub u64);

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load-{}", self.0)
    }
}

/// Asynchronous notifications raised by a media resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// Playback actually started.
    Play,
    /// Playback actually paused.
    Pause,
    /// Enough data is available to start playback; duration is now known.
    Ready { duration_seconds: f64 },
    /// Periodic position report.
    TimeUpdate { position_seconds: f64 },
    /// Reached the end of the stream.
    Ended,
    /// Load or decode failure.
    Error { message: String },
}

/// A [`MediaEvent`] stamped with the load that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSignal {
    pub load: LoadId,
    pub event: MediaEvent,
}

impl MediaSignal {
    pub fn new(load: LoadId, event: MediaEvent) -> Self {
        Self { load, event }
    }
}

/// Host audio element driven by the playback session.
///
/// Commands return immediately; their effects are reported later through
/// [`MediaSignal`]s tagged with the [`LoadId`] passed to [`MediaResource::load`].
/// A resource holds at most one bound source at a time.
pub trait MediaResource: PlatformSend {
    /// Bind `source` and start fetching it. Signals for this load must carry `load`.
    fn load(&mut self, load: LoadId, source: &MediaSource) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn seek_to(&mut self, seconds: f64) -> Result<()>;

    /// Drop the bound source, if any. Pending work for it is abandoned.
    fn unload(&mut self);

    /// Source currently bound to the resource.
    fn bound_source(&self) -> Option<&MediaSource>;
}

/// Frees locally owned media (e.g. `URL.revokeObjectURL`).
#[cfg_attr(test, mockall::automock)]
pub trait MediaReleaser: PlatformSendSync {
    fn release(&self, handle: &MediaHandle);
}

/// Releaser for hosts that have nothing to free.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReleaser;

impl MediaReleaser for NoopReleaser {
    fn release(&self, _handle: &MediaHandle) {}
}

/// Shared front for a [`MediaReleaser`] that forwards each locally owned
/// handle at most once, no matter how many owners ask.
///
/// Clones share the same bookkeeping.
#[derive(Clone)]
pub struct ReleaseLedger {
    releaser: Arc<dyn MediaReleaser>,
    released: Arc<Mutex<HashSet<String>>>,
}

impl ReleaseLedger {
    pub fn new(releaser: Arc<dyn MediaReleaser>) -> Self {
        Self {
            releaser,
            released: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Release `handle` if it is locally owned and not yet released.
    ///
    /// Returns `true` when the underlying releaser was invoked.
    pub fn release(&self, handle: &MediaHandle) -> bool {
        if !handle.is_local() {
            return false;
        }

        let first = self.released.lock().insert(handle.key().to_string());
        if first {
            self.releaser.release(handle);
        }
        first
    }

    pub fn is_released(&self, handle: &MediaHandle) -> bool {
        self.released.lock().contains(handle.key())
    }

    pub fn released_count(&self) -> usize {
        self.released.lock().len()
    }
}

impl fmt::Debug for ReleaseLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseLedger")
            .field("released", &self.released_count())
            .finish()
    }
}
