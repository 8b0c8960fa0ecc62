//! Domain models for the catalog
//!
//! Tracks and albums as held by the collection store, their identifiers, and
//! the draft type used to create or replace a track.

use bridge_traits::MediaHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LibraryError, Result};

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// Unique identifier for an album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub Uuid);

impl AlbumId {
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlbumId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A catalog track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Assigned at creation, never changes
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    /// Free-text album label from tagging
    pub album_text: Option<String>,
    /// Structured album membership; wins over `album_text` for display
    pub album_ref: Option<AlbumId>,
    /// Unknown until the media resource reports it
    pub duration_seconds: Option<f64>,
    pub cover_art: Option<MediaHandle>,
    /// Absent means the track cannot be played
    pub media: Option<MediaHandle>,
}

impl Track {
    pub(crate) fn from_draft(id: TrackId, draft: TrackDraft) -> Self {
        let draft = draft.normalized();
        Self {
            id,
            title: draft.title,
            artist: draft.artist,
            album_text: draft.album_text,
            album_ref: draft.album_ref,
            duration_seconds: draft.duration_seconds,
            cover_art: draft.cover_art,
            media: draft.media,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.media.is_some()
    }

    /// Copy of this record as an editable draft.
    pub fn to_draft(&self) -> TrackDraft {
        TrackDraft {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album_text: self.album_text.clone(),
            album_ref: self.album_ref,
            duration_seconds: self.duration_seconds,
            cover_art: self.cover_art.clone(),
            media: self.media.clone(),
        }
    }

    /// Names of the fields that differ between `self` and `other`.
    pub(crate) fn diff(&self, other: &Track) -> Vec<String> {
        let mut changed = Vec::new();
        if self.title != other.title {
            changed.push("title");
        }
        if self.artist != other.artist {
            changed.push("artist");
        }
        if self.album_text != other.album_text {
            changed.push("album_text");
        }
        if self.album_ref != other.album_ref {
            changed.push("album_ref");
        }
        if self.duration_seconds != other.duration_seconds {
            changed.push("duration_seconds");
        }
        if self.cover_art != other.cover_art {
            changed.push("cover_art");
        }
        if self.media != other.media {
            changed.push("media");
        }
        changed.into_iter().map(String::from).collect()
    }
}

/// Track fields supplied by ingestion or an edit form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackDraft {
    pub title: String,
    pub artist: String,
    pub album_text: Option<String>,
    pub album_ref: Option<AlbumId>,
    pub duration_seconds: Option<f64>,
    pub cover_art: Option<MediaHandle>,
    pub media: Option<MediaHandle>,
}

impl TrackDraft {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Self::default()
        }
    }

    pub fn with_album_text(mut self, album_text: impl Into<String>) -> Self {
        self.album_text = Some(album_text.into());
        self
    }

    pub fn with_album_ref(mut self, album: AlbumId) -> Self {
        self.album_ref = Some(album);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_cover_art(mut self, handle: MediaHandle) -> Self {
        self.cover_art = Some(handle);
        self
    }

    pub fn with_media(mut self, handle: MediaHandle) -> Self {
        self.media = Some(handle);
        self
    }

    /// Check required fields.
    ///
    /// Title and artist must be non-empty once trimmed; a duration, when
    /// present, must be a finite non-negative number.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LibraryError::invalid("title", "Track title cannot be empty"));
        }

        if self.artist.trim().is_empty() {
            return Err(LibraryError::invalid("artist", "Track artist cannot be empty"));
        }

        if let Some(duration) = self.duration_seconds {
            if !duration.is_finite() || duration < 0.0 {
                return Err(LibraryError::invalid(
                    "duration_seconds",
                    format!("Track duration must be a non-negative number, got {}", duration),
                ));
            }
        }

        Ok(())
    }

    /// Trim display strings; an album label that trims to nothing is dropped.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.artist = self.artist.trim().to_string();
        self.album_text = self
            .album_text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        self
    }
}

/// A named album node in the album forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    /// Unique among all albums, compared case-insensitively
    pub name: String,
    /// Parent relation only; the store owns every album directly
    pub parent_id: Option<AlbumId>,
}

impl Album {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Key used for the case-insensitive uniqueness rule.
    pub fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}
