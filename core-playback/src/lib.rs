//! # Playback Session Module
//!
//! Transport state machine coordinating one host media resource.
//!
//! ## Overview
//!
//! This module handles:
//! - Selecting, toggling and seeking the active track
//! - Reacting to asynchronous resource signals (ready, error, time updates)
//! - Discarding signals from superseded loads
//! - Releasing locally owned media on teardown
//!
//! The session never decodes audio; it drives a
//! [`MediaResource`](bridge_traits::MediaResource) supplied by the host.

pub mod error;
pub mod session;

pub mod testing;

pub use error::{PlaybackError, Result};
pub use session::{
    PlaybackSession, PlayableTrack, SelectOutcome, SessionSnapshot, TransportState,
};
