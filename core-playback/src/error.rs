//! # Playback Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors returned by playback session commands.
///
/// Asynchronous load failures never surface here; they arrive as
/// `MediaEvent::Error` signals and move the session to `Errored`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The selected track has no media resource. The session is left idle.
    #[error("Track {track_id} has no playable media")]
    NotPlayable { track_id: String },

    /// A transport command needs an active track.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// The media resource rejected a command synchronously.
    #[error("Media resource error: {0}")]
    Resource(#[from] BridgeError),

    /// The session was torn down.
    #[error("Playback session has been disposed")]
    Disposed,
}

impl PlaybackError {
    /// Returns `true` if the underlying media resource failed.
    pub fn is_media_failure(&self) -> bool {
        matches!(self, PlaybackError::Resource(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
