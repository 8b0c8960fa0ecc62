//! # Host Bridge Traits
//!
//! Capability contracts the catalog core requires from its host environment.
//!
//! ## Overview
//!
//! The core is a pure state engine: it never touches the browser, the file
//! system or an audio device. Everything environmental is injected through
//! the traits in this crate so the core can be driven deterministically in
//! tests.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaResource`](media::MediaResource) - The audio element the playback session drives
//! - [`MediaReleaser`](media::MediaReleaser) - Frees locally owned media handles (object URLs, buffers)
//!
//! ### Utilities
//! - [`IdGenerator`](ids::IdGenerator) - Source of fresh entity identifiers
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Default Implementations
//!
//! | Trait | Default | Notes |
//! |-------|---------|-------|
//! | `IdGenerator` | `RandomIdGenerator` | UUID v4; `SequentialIdGenerator` for tests |
//! | `MediaReleaser` | `NoopReleaser` | Hosts holding object URLs must supply their own |
//! | `LoggerSink` | `ConsoleLogger` | Writes to stderr |
//!
//! `ReleaseLedger` wraps a `MediaReleaser` so that every owner of a handle
//! (the collection store on removal, the playback session on teardown) can
//! ask for a release while the host sees each handle freed exactly once.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Media commands
//! that fail synchronously return `BridgeError::Media`; asynchronous failures
//! arrive as `MediaEvent::Error` signals instead.

pub mod error;
pub mod ids;
pub mod log;
pub mod media;
pub mod platform;

pub use error::BridgeError;

// Re-export commonly used types
pub use ids::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    LoadId, MediaEvent, MediaHandle, MediaReleaser, MediaResource, MediaSignal, MediaSource,
    NoopReleaser, Ownership, ReleaseLedger,
};
