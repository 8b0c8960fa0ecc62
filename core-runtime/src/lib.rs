//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the catalog crates:
//! - Logging and tracing setup ([`logging`])
//! - Fail-fast configuration builder ([`config`])
//! - Typed event bus for change notifications ([`events`])
//!
//! ## Overview
//!
//! Nothing in this crate knows about tracks or albums beyond the event
//! payloads. The collection store, hierarchy manager and playback session
//! depend on it for their ambient concerns; the service crate wires the
//! pieces together from a single [`CoreConfig`](config::CoreConfig).

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CatalogLimits, CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, LibraryEvent, PlaybackEvent};
