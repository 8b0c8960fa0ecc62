//! Read-only query API for the presentation layer.
//!
//! [`CatalogView`] borrows the collection store and the hierarchy manager
//! and answers every listing the UI needs: all tracks, all albums, the
//! top-level album list, an album's children and tracks, and per-album
//! counts. It also resolves shared [`DeepLink`]s back to the entities they
//! name. Nothing here mutates state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;
use uuid::Uuid;

use crate::error::{LibraryError, Result};
use crate::hierarchy::HierarchyManager;
use crate::models::{Album, AlbumId, Track, TrackId};
use crate::store::CollectionStore;

/// Track plus its display-ready album label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackListItem<'a> {
    pub track: &'a Track,
    /// Referenced album's name, else the free-text label.
    pub album_label: Option<&'a str>,
}

/// Album plus the counts shown on album cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumSummary<'a> {
    pub album: &'a Album,
    /// Tracks referencing this album directly
    pub track_count: usize,
    /// Direct sub-albums
    pub child_count: usize,
}

/// Borrowed, read-only view over the catalog.
#[derive(Clone, Copy)]
pub struct CatalogView<'a> {
    store: &'a CollectionStore,
    hierarchy: &'a HierarchyManager,
}

impl<'a> CatalogView<'a> {
    pub fn new(store: &'a CollectionStore, hierarchy: &'a HierarchyManager) -> Self {
        Self { store, hierarchy }
    }

    pub fn list_tracks(&self) -> Vec<TrackListItem<'a>> {
        self.store
            .tracks()
            .map(|track| TrackListItem {
                track,
                album_label: self.display_album(track),
            })
            .collect()
    }

    pub fn list_albums(&self) -> Vec<&'a Album> {
        self.store.albums().collect()
    }

    /// Top-level albums with their counts.
    pub fn root_albums(&self) -> Vec<AlbumSummary<'a>> {
        self.summaries(self.hierarchy.roots(self.store))
    }

    /// Direct children of `album`, with their counts.
    pub fn children_of(&self, album: AlbumId) -> Result<Vec<AlbumSummary<'a>>> {
        self.require_album(album)?;
        Ok(self.summaries(self.hierarchy.children(self.store, album)))
    }

    /// Tracks whose `album_ref` is `album`. Sub-album tracks are not included.
    pub fn tracks_in_album(&self, album: AlbumId) -> Result<Vec<&'a Track>> {
        self.require_album(album)?;
        Ok(self
            .store
            .tracks()
            .filter(|track| track.album_ref == Some(album))
            .collect())
    }

    pub fn track_count(&self, album: AlbumId) -> usize {
        self.store
            .tracks()
            .filter(|track| track.album_ref == Some(album))
            .count()
    }

    pub fn child_count(&self, album: AlbumId) -> usize {
        self.hierarchy.children(self.store, album).len()
    }

    /// Breadcrumb for an album page: parents, nearest first.
    pub fn ancestors(&self, album: AlbumId) -> Vec<&'a Album> {
        self.hierarchy.ancestors(self.store, album)
    }

    /// Label shown for a track's album.
    pub fn display_album(&self, track: &'a Track) -> Option<&'a str> {
        track
            .album_ref
            .and_then(|id| self.store.album(id))
            .map(|album| album.name.as_str())
            .or(track.album_text.as_deref())
    }

    /// Look up the entity a deep link names.
    ///
    /// A track link also carries the album view to open, when the track's
    /// `album_ref` resolves.
    pub fn resolve(&self, link: &DeepLink) -> Result<ResolvedLink<'a>> {
        match link.target {
            LinkTarget::Track(id) => {
                let track = self
                    .store
                    .track(id)
                    .ok_or_else(|| LibraryError::not_found("Track", id))?;
                let album = track.album_ref.and_then(|album| self.store.album(album));
                Ok(ResolvedLink::Track { track, album })
            }
            LinkTarget::Album(id) => self
                .store
                .album(id)
                .map(ResolvedLink::Album)
                .ok_or_else(|| LibraryError::not_found("Album", id)),
        }
    }

    fn summaries(&self, ids: Vec<AlbumId>) -> Vec<AlbumSummary<'a>> {
        ids.into_iter()
            .filter_map(|id| self.store.album(id))
            .map(|album| AlbumSummary {
                album,
                track_count: self.track_count(album.id),
                child_count: self.child_count(album.id),
            })
            .collect()
    }

    fn require_album(&self, album: AlbumId) -> Result<()> {
        if self.store.contains_album(album) {
            Ok(())
        } else {
            Err(LibraryError::not_found("Album", album))
        }
    }
}

// =============================================================================
// Deep links
// =============================================================================

/// Kind of entity a shared link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeepLinkKind {
    Track,
    Album,
}

impl FromStr for DeepLinkKind {
    type Err = LibraryError;

    /// Accepts `track`, `song` (legacy share links) and `album`, in any case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" | "song" => Ok(DeepLinkKind::Track),
            "album" => Ok(DeepLinkKind::Album),
            other => Err(LibraryError::invalid(
                "type",
                format!("Unknown link type '{}'", other),
            )),
        }
    }
}

impl fmt::Display for DeepLinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeepLinkKind::Track => f.write_str("track"),
            DeepLinkKind::Album => f.write_str("album"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkTarget {
    Track(TrackId),
    Album(AlbumId),
}

/// Opaque `(kind, id)` address of a track or album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeepLink {
    pub target: LinkTarget,
}

impl DeepLink {
    pub fn track(id: TrackId) -> Self {
        Self {
            target: LinkTarget::Track(id),
        }
    }

    pub fn album(id: AlbumId) -> Self {
        Self {
            target: LinkTarget::Album(id),
        }
    }

    /// Build a link from its two string parts.
    pub fn parse(kind: &str, id: &str) -> Result<Self> {
        let kind: DeepLinkKind = kind.parse()?;
        let id = Uuid::parse_str(id.trim())
            .map_err(|e| LibraryError::invalid("id", format!("Malformed id '{}': {}", id, e)))?;

        Ok(match kind {
            DeepLinkKind::Track => Self::track(TrackId::from_uuid(id)),
            DeepLinkKind::Album => Self::album(AlbumId::from_uuid(id)),
        })
    }

    /// Parse the `type=…&id=…` pairs of a share-link query string.
    ///
    /// A leading `?` is accepted; values are percent-decoded and unrelated
    /// pairs are ignored. The last occurrence of a repeated key wins.
    pub fn from_query(query: &str) -> Result<Self> {
        let mut kind = None;
        let mut id = None;
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "type" => kind = Some(value.into_owned()),
                "id" => id = Some(value.into_owned()),
                _ => {}
            }
        }

        match (kind, id) {
            (Some(kind), Some(id)) => Self::parse(&kind, &id),
            (None, _) => Err(LibraryError::invalid("type", "Link has no type")),
            (_, None) => Err(LibraryError::invalid("id", "Link has no id")),
        }
    }

    pub fn kind(&self) -> DeepLinkKind {
        match self.target {
            LinkTarget::Track(_) => DeepLinkKind::Track,
            LinkTarget::Album(_) => DeepLinkKind::Album,
        }
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, id) = match self.target {
            LinkTarget::Track(id) => (DeepLinkKind::Track, id.to_string()),
            LinkTarget::Album(id) => (DeepLinkKind::Album, id.to_string()),
        };
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("type", &kind.to_string())
            .append_pair("id", &id)
            .finish();
        f.write_str(&query)
    }
}

/// What a deep link resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedLink<'a> {
    /// A track, plus the album view to open when its album exists.
    Track {
        track: &'a Track,
        album: Option<&'a Album>,
    },
    Album(&'a Album),
}
