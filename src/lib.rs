//! Workspace façade crate.
//!
//! Exposes feature flags that map to the individual workspace crates so host
//! applications can depend on `catalog-workspace` alone. The default
//! `service` feature pulls in the full catalog context (`core-service`);
//! `library-only` and `playback-only` expose a single component.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "library-only")]
pub use core_library as library;

#[cfg(feature = "playback-only")]
pub use core_playback as playback;
