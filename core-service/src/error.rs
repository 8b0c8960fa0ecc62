use core_library::{LibraryError, MergeError};
use core_playback::PlaybackError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    Initialization(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Core service has been torn down")]
    TornDown,
}

impl From<MergeError> for CoreError {
    fn from(err: MergeError) -> Self {
        CoreError::Library(LibraryError::Merge(err))
    }
}

impl CoreError {
    /// Duplicate names and malformed input.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Library(err) if err.is_validation())
    }

    /// Stale track or album ids.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::Library(err) if err.is_not_found())
    }

    /// Failures reported by the host media resource.
    pub fn is_media_failure(&self) -> bool {
        matches!(self, CoreError::Playback(err) if err.is_media_failure())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
