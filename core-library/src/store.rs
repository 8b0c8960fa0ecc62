//! # Collection Store
//!
//! Authoritative in-memory owner of every [`Track`] and [`Album`] record.
//!
//! The store enforces the catalog invariants on every mutation:
//!
//! - album names are unique, compared case-insensitively
//! - every `album_ref` on a track resolves to an existing album
//! - locally owned media is released when the track holding it is removed
//!
//! Acyclicity of the album forest is maintained by
//! [`HierarchyManager`](crate::hierarchy::HierarchyManager), the only caller
//! allowed to change `parent_id` other than album removal.
//!
//! Records are kept in a map keyed by id plus an insertion-order list, so
//! listings are stable across calls.
//!
//! Mutations publish [`LibraryEvent`]s when an [`EventBus`] is attached.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bridge_traits::{IdGenerator, MediaHandle, ReleaseLedger};
use core_runtime::config::CatalogLimits;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use tracing::{debug, warn};

use crate::error::{LibraryError, Result};
use crate::hierarchy::{walk_parents, Walk};
use crate::models::{Album, AlbumId, Track, TrackDraft, TrackId};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

pub struct CollectionStore {
    /// Process-unique identity, so caches keyed on `revision` can tell two
    /// stores apart.
    instance: u64,
    tracks: HashMap<TrackId, Track>,
    track_order: Vec<TrackId>,
    albums: HashMap<AlbumId, Album>,
    album_order: Vec<AlbumId>,
    ids: Arc<dyn IdGenerator>,
    releases: ReleaseLedger,
    events: Option<EventBus>,
    limits: CatalogLimits,
    /// Bumped whenever the album set or any parent pointer changes.
    revision: u64,
}

impl CollectionStore {
    pub fn new(ids: Arc<dyn IdGenerator>, releases: ReleaseLedger) -> Self {
        Self {
            instance: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            tracks: HashMap::new(),
            track_order: Vec::new(),
            albums: HashMap::new(),
            album_order: Vec::new(),
            ids,
            releases,
            events: None,
            limits: CatalogLimits::default(),
            revision: 0,
        }
    }

    pub fn with_limits(mut self, limits: CatalogLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Structural revision of the album forest.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn instance_id(&self) -> u64 {
        self.instance
    }

    pub fn limits(&self) -> &CatalogLimits {
        &self.limits
    }

    pub fn release_ledger(&self) -> &ReleaseLedger {
        &self.releases
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn album(&self, id: AlbumId) -> Option<&Album> {
        self.albums.get(&id)
    }

    pub fn contains_album(&self, id: AlbumId) -> bool {
        self.albums.contains_key(&id)
    }

    /// Tracks in insertion order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.track_order.iter().filter_map(|id| self.tracks.get(id))
    }

    /// Albums in insertion order.
    pub fn albums(&self) -> impl Iterator<Item = &Album> + '_ {
        self.album_order.iter().filter_map(|id| self.albums.get(id))
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn num_albums(&self) -> usize {
        self.albums.len()
    }

    /// Album whose name matches `name` case-insensitively, if any.
    pub fn find_album_by_name(&self, name: &str) -> Option<&Album> {
        let key = Album::normalize(name);
        self.albums()
            .find(|album| Album::normalize(&album.name) == key)
    }

    // ---------------------------------------------------------------------
    // Tracks
    // ---------------------------------------------------------------------

    /// Full validation of a draft against this store.
    ///
    /// Callers run this before [`add_track`](Self::add_track), which does
    /// not validate.
    pub fn validate_draft(&self, draft: &TrackDraft) -> Result<()> {
        draft.validate()?;
        self.check_len("title", draft.title.trim())?;
        self.check_len("artist", draft.artist.trim())?;

        if let Some(album_id) = draft.album_ref {
            if !self.contains_album(album_id) {
                return Err(LibraryError::not_found("Album", album_id));
            }
        }

        Ok(())
    }

    /// Insert a new track and return its freshly assigned id.
    ///
    /// Display strings are trimmed. The draft is expected to have passed
    /// [`validate_draft`](Self::validate_draft).
    ///
    /// # Panics
    ///
    /// Panics if `draft.album_ref` names an album that does not exist.
    pub fn add_track(&mut self, draft: TrackDraft) -> TrackId {
        if let Some(album_id) = draft.album_ref {
            assert!(
                self.contains_album(album_id),
                "add_track: album_ref {} does not resolve; drafts must be validated first",
                album_id
            );
        }

        let id = TrackId::from_uuid(self.ids.next_id());
        let track = Track::from_draft(id, draft);
        debug!(track_id = %id, title = %track.title, "Track added");

        self.publish(LibraryEvent::TrackAdded {
            track_id: id.to_string(),
            title: track.title.clone(),
            artist: track.artist.clone(),
        });

        self.tracks.insert(id, track);
        self.track_order.push(id);
        id
    }

    /// Replace every field of a track except its id.
    ///
    /// Returns the media and cover art handles the edit replaced. They are
    /// not released here: a playback session may still be bound to the old
    /// media, so the caller decides who releases each one.
    pub fn update_track(&mut self, id: TrackId, draft: TrackDraft) -> Result<Vec<MediaHandle>> {
        let Some(existing) = self.tracks.get(&id) else {
            warn!(track_id = %id, "Update rejected: track not found");
            return Err(LibraryError::not_found("Track", id));
        };

        if let Err(err) = self.validate_draft(&draft) {
            warn!(track_id = %id, error = %err, "Update rejected");
            return Err(err);
        }

        let updated = Track::from_draft(id, draft);
        let changed = existing.diff(&updated);
        let replaced: Vec<_> = [
            (existing.media.clone(), updated.media.as_ref()),
            (existing.cover_art.clone(), updated.cover_art.as_ref()),
        ]
        .into_iter()
        .filter_map(|(old, new)| match old {
            Some(old) if Some(&old) != new => Some(old),
            _ => None,
        })
        .collect();

        self.tracks.insert(id, updated);

        debug!(track_id = %id, changed = ?changed, replaced = replaced.len(), "Track updated");
        if !changed.is_empty() {
            self.publish(LibraryEvent::TrackUpdated {
                track_id: id.to_string(),
                updated_fields: changed,
            });
        }
        Ok(replaced)
    }

    /// Record the duration reported by the media resource.
    ///
    /// Returns `true` when the stored value changed.
    pub fn record_duration(&mut self, id: TrackId, seconds: f64) -> Result<bool> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(LibraryError::invalid(
                "duration_seconds",
                format!("Reported duration {} is not a non-negative number", seconds),
            ));
        }

        let track = self
            .tracks
            .get_mut(&id)
            .ok_or_else(|| LibraryError::not_found("Track", id))?;

        if track.duration_seconds == Some(seconds) {
            return Ok(false);
        }
        track.duration_seconds = Some(seconds);

        self.publish(LibraryEvent::TrackUpdated {
            track_id: id.to_string(),
            updated_fields: vec!["duration_seconds".to_string()],
        });
        Ok(true)
    }

    /// Remove a track, releasing its locally owned media.
    ///
    /// If the track is active in a playback session, the owner of that
    /// session must clear it first.
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track> {
        let track = self.tracks.remove(&id).ok_or_else(|| {
            warn!(track_id = %id, "Remove rejected: track not found");
            LibraryError::not_found("Track", id)
        })?;
        self.track_order.retain(|existing| *existing != id);

        let mut released_media = false;
        if let Some(media) = &track.media {
            released_media = self.releases.release(media);
        }
        if let Some(cover) = &track.cover_art {
            self.releases.release(cover);
        }

        debug!(track_id = %id, released_media, "Track removed");
        self.publish(LibraryEvent::TrackDeleted {
            track_id: id.to_string(),
            released_media,
        });
        Ok(track)
    }

    /// Release every locally owned handle still held by a track.
    ///
    /// Used on teardown; returns how many handles were actually released.
    pub fn release_all_media(&self) -> usize {
        self.tracks()
            .flat_map(|track| track.media.iter().chain(track.cover_art.iter()))
            .filter(|handle| self.releases.release(handle))
            .count()
    }

    // ---------------------------------------------------------------------
    // Albums
    // ---------------------------------------------------------------------

    /// Create a root album.
    pub fn add_album(&mut self, name: &str) -> Result<AlbumId> {
        let name = self.checked_album_name(name, None).map_err(|err| {
            warn!(error = %err, "Album creation rejected");
            err
        })?;

        let id = AlbumId::from_uuid(self.ids.next_id());
        debug!(album_id = %id, name = %name, "Album added");
        self.publish(LibraryEvent::AlbumAdded {
            album_id: id.to_string(),
            name: name.clone(),
        });

        self.albums.insert(
            id,
            Album {
                id,
                name,
                parent_id: None,
            },
        );
        self.album_order.push(id);
        self.revision += 1;
        Ok(id)
    }

    /// Rename an album; the uniqueness rule ignores the album itself.
    pub fn rename_album(&mut self, id: AlbumId, new_name: &str) -> Result<()> {
        if !self.contains_album(id) {
            warn!(album_id = %id, "Rename rejected: album not found");
            return Err(LibraryError::not_found("Album", id));
        }

        let new_name = self.checked_album_name(new_name, Some(id)).map_err(|err| {
            warn!(album_id = %id, error = %err, "Rename rejected");
            err
        })?;

        let Some(album) = self.albums.get_mut(&id) else {
            return Err(LibraryError::not_found("Album", id));
        };
        let old_name = std::mem::replace(&mut album.name, new_name.clone());

        debug!(album_id = %id, old = %old_name, new = %new_name, "Album renamed");
        self.publish(LibraryEvent::AlbumRenamed {
            album_id: id.to_string(),
            old_name,
            new_name,
        });
        Ok(())
    }

    /// Delete an album.
    ///
    /// Its children become roots and tracks referencing it lose their
    /// `album_ref`, falling back to `album_text` for display.
    pub fn remove_album(&mut self, id: AlbumId) -> Result<Album> {
        let album = self.albums.remove(&id).ok_or_else(|| {
            warn!(album_id = %id, "Remove rejected: album not found");
            LibraryError::not_found("Album", id)
        })?;
        self.album_order.retain(|existing| *existing != id);

        let mut promoted_children = Vec::new();
        for child_id in &self.album_order {
            if let Some(child) = self.albums.get_mut(child_id) {
                if child.parent_id == Some(id) {
                    child.parent_id = None;
                    promoted_children.push(child.id.to_string());
                }
            }
        }

        let mut cleared_tracks = Vec::new();
        for track_id in &self.track_order {
            if let Some(track) = self.tracks.get_mut(track_id) {
                if track.album_ref == Some(id) {
                    track.album_ref = None;
                    cleared_tracks.push(track.id.to_string());
                }
            }
        }

        self.revision += 1;
        debug!(
            album_id = %id,
            promoted = promoted_children.len(),
            cleared = cleared_tracks.len(),
            "Album removed"
        );
        self.publish(LibraryEvent::AlbumDeleted {
            album_id: id.to_string(),
            promoted_children,
            cleared_tracks,
        });
        Ok(album)
    }

    /// Point every album in `sources` at `target`.
    ///
    /// Only the hierarchy manager calls this, after validating the whole set.
    pub(crate) fn set_parents(&mut self, sources: &[AlbumId], target: AlbumId) {
        for source in sources {
            if let Some(album) = self.albums.get_mut(source) {
                album.parent_id = Some(target);
            }
        }
        self.revision += 1;
        self.publish(LibraryEvent::AlbumsReparented {
            source_ids: sources.iter().map(ToString::to_string).collect(),
            target_id: target.to_string(),
        });
    }

    // ---------------------------------------------------------------------
    // Invariants
    // ---------------------------------------------------------------------

    /// Verify every catalog invariant.
    ///
    /// # Panics
    ///
    /// Panics on the first violation found: a duplicate album name, a
    /// self-parented or cyclic album, a dangling `parent_id`, or a track
    /// whose `album_ref` does not resolve. Any of these means a mutation
    /// bypassed the store's checked paths.
    pub fn check_invariants(&self) {
        let mut names = HashSet::new();
        for album in self.albums() {
            assert!(
                names.insert(Album::normalize(&album.name)),
                "invariant violated: duplicate album name \"{}\"",
                album.name
            );
            assert_ne!(
                album.parent_id,
                Some(album.id),
                "invariant violated: album {} is its own parent",
                album.id
            );
            if let Some(parent) = album.parent_id {
                assert!(
                    self.contains_album(parent),
                    "invariant violated: album {} has dangling parent {}",
                    album.id,
                    parent
                );
            }
            assert!(
                !matches!(walk_parents(self, album.id, None), Walk::Cycle),
                "invariant violated: parent chain of album {} does not terminate",
                album.id
            );
        }

        for track in self.tracks() {
            if let Some(album_id) = track.album_ref {
                assert!(
                    self.contains_album(album_id),
                    "invariant violated: track {} references missing album {}",
                    track.id,
                    album_id
                );
            }
        }

        assert_eq!(self.track_order.len(), self.tracks.len());
        assert_eq!(self.album_order.len(), self.albums.len());
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn checked_album_name(&self, name: &str, except: Option<AlbumId>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::invalid("name", "Album name cannot be empty"));
        }
        self.check_len("name", name)?;

        if let Some(existing) = self.find_album_by_name(name) {
            if Some(existing.id) != except {
                return Err(LibraryError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }

        Ok(name.to_string())
    }

    fn check_len(&self, field: &str, value: &str) -> Result<()> {
        let len = value.chars().count();
        if len > self.limits.max_name_len {
            return Err(LibraryError::invalid(
                field,
                format!(
                    "{} characters exceeds the limit of {}",
                    len, self.limits.max_name_len
                ),
            ));
        }
        Ok(())
    }

    fn publish(&self, event: LibraryEvent) {
        if let Some(events) = &self.events {
            events.publish(CoreEvent::Library(event));
        }
    }
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("tracks", &self.tracks.len())
            .field("albums", &self.albums.len())
            .field("revision", &self.revision)
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{MediaHandle, MediaReleaser, NoopReleaser, SequentialIdGenerator};
    use core_runtime::events::EventStream;
    use mockall::mock;

    mock! {
        MediaReleaser {}

        impl MediaReleaser for MediaReleaser {
            fn release(&self, handle: &MediaHandle);
        }
    }

    fn store() -> CollectionStore {
        CollectionStore::new(
            Arc::new(SequentialIdGenerator::new()),
            ReleaseLedger::new(Arc::new(NoopReleaser)),
        )
    }

    #[test]
    fn test_add_track_assigns_fresh_ids_and_trims() {
        let mut store = store();
        let a = store.add_track(TrackDraft::new("  Intro ", "Band "));
        let b = store.add_track(TrackDraft::new("Outro", "Band"));

        assert_ne!(a, b);
        assert_eq!(store.track(a).unwrap().title, "Intro");
        assert_eq!(store.track(a).unwrap().artist, "Band");
        let order: Vec<_> = store.tracks().map(|t| t.id).collect();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    #[should_panic(expected = "does not resolve")]
    fn test_add_track_with_dangling_album_panics() {
        let mut store = store();
        let ghost = AlbumId::from_string("00000000-0000-0000-0000-0000000000ff").unwrap();
        store.add_track(TrackDraft::new("Intro", "Band").with_album_ref(ghost));
    }

    #[test]
    fn test_validate_draft_checks_limits_and_album_ref() {
        let mut store = store().with_limits(CatalogLimits::default().with_max_name_len(5));
        assert!(store.validate_draft(&TrackDraft::new("Short", "Band")).is_ok());

        let err = store
            .validate_draft(&TrackDraft::new("Too long", "Band"))
            .unwrap_err();
        assert!(err.is_validation());

        let album = store.add_album("Rock").unwrap();
        store.remove_album(album).unwrap();
        let err = store
            .validate_draft(&TrackDraft::new("Intro", "Band").with_album_ref(album))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_track_replaces_fields_but_not_id() {
        let mut store = store();
        let id = store.add_track(TrackDraft::new("Intro", "Band"));
        let album = store.add_album("Live").unwrap();

        store
            .update_track(
                id,
                TrackDraft::new("Intro (Live)", "Band").with_album_ref(album),
            )
            .unwrap();

        let track = store.track(id).unwrap();
        assert_eq!(track.id, id);
        assert_eq!(track.title, "Intro (Live)");
        assert_eq!(track.album_ref, Some(album));
    }

    #[test]
    fn test_update_missing_track_is_not_found() {
        let mut store = store();
        let id = store.add_track(TrackDraft::new("Intro", "Band"));
        store.remove_track(id).unwrap();

        let err = store
            .update_track(id, TrackDraft::new("Again", "Band"))
            .unwrap_err();
        assert_eq!(
            err,
            LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: id.to_string()
            }
        );
    }

    #[test]
    fn test_update_hands_back_replaced_media_unreleased() {
        let mut releaser = MockMediaReleaser::new();
        releaser.expect_release().never();

        let mut store = CollectionStore::new(
            Arc::new(SequentialIdGenerator::new()),
            ReleaseLedger::new(Arc::new(releaser)),
        );
        let id = store.add_track(
            TrackDraft::new("Intro", "Band").with_media(MediaHandle::local("blob:old")),
        );

        let replaced = store
            .update_track(
                id,
                TrackDraft::new("Intro", "Band").with_media(MediaHandle::local("blob:new")),
            )
            .unwrap();
        assert_eq!(replaced, vec![MediaHandle::local("blob:old")]);
        assert!(!store.release_ledger().is_released(&replaced[0]));

        // Same media again: nothing replaced.
        let replaced = store
            .update_track(
                id,
                TrackDraft::new("Intro!", "Band").with_media(MediaHandle::local("blob:new")),
            )
            .unwrap();
        assert!(replaced.is_empty());
    }

    #[test]
    fn test_remove_track_releases_local_media_only() {
        let mut releaser = MockMediaReleaser::new();
        releaser
            .expect_release()
            .withf(|handle| handle.key() == "blob:local" || handle.key() == "blob:cover")
            .times(2)
            .return_const(());

        let mut store = CollectionStore::new(
            Arc::new(SequentialIdGenerator::new()),
            ReleaseLedger::new(Arc::new(releaser)),
        );
        let local = store.add_track(
            TrackDraft::new("Upload", "Me")
                .with_media(MediaHandle::local("blob:local"))
                .with_cover_art(MediaHandle::local("blob:cover")),
        );
        let remote = store.add_track(
            TrackDraft::new("Stream", "Them")
                .with_media(MediaHandle::external("https://cdn.example/stream.mp3")),
        );

        let removed = store.remove_track(local).unwrap();
        assert_eq!(removed.title, "Upload");
        store.remove_track(remote).unwrap();
        assert_eq!(store.num_tracks(), 0);
        assert!(store.remove_track(local).unwrap_err().is_not_found());
    }

    #[test]
    fn test_album_names_unique_case_insensitively() {
        let mut store = store();
        store.add_album("Rock").unwrap();

        let err = store.add_album("Rock").unwrap_err();
        assert_eq!(
            err,
            LibraryError::DuplicateName {
                name: "Rock".to_string()
            }
        );
        assert!(store.add_album("  rOCK ").unwrap_err().is_validation());
        assert_eq!(store.num_albums(), 1);
    }

    #[test]
    fn test_album_name_trimmed_and_required() {
        let mut store = store();
        let id = store.add_album("  Jazz  ").unwrap();
        assert_eq!(store.album(id).unwrap().name, "Jazz");

        let err = store.add_album("   ").unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
    }

    #[test]
    fn test_rename_excludes_self_from_uniqueness() {
        let mut store = store();
        let rock = store.add_album("Rock").unwrap();
        let jazz = store.add_album("Jazz").unwrap();

        store.rename_album(rock, "ROCK").unwrap();
        assert_eq!(store.album(rock).unwrap().name, "ROCK");

        let err = store.rename_album(jazz, "rock").unwrap_err();
        assert!(matches!(err, LibraryError::DuplicateName { .. }));
        assert_eq!(store.album(jazz).unwrap().name, "Jazz");

        store.remove_album(jazz).unwrap();
        assert!(store.rename_album(jazz, "Blues").unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_album_promotes_children_and_clears_refs() {
        let mut store = store();
        let parent = store.add_album("Parent").unwrap();
        let c1 = store.add_album("Child 1").unwrap();
        let c2 = store.add_album("Child 2").unwrap();
        store.set_parents(&[c1, c2], parent);

        let in_parent = store.add_track(
            TrackDraft::new("Song", "Band")
                .with_album_text("Legacy label")
                .with_album_ref(parent),
        );
        let elsewhere = store.add_track(TrackDraft::new("Other", "Band").with_album_ref(c1));

        let revision = store.revision();
        store.remove_album(parent).unwrap();

        assert_eq!(store.album(c1).unwrap().parent_id, None);
        assert_eq!(store.album(c2).unwrap().parent_id, None);
        let track = store.track(in_parent).unwrap();
        assert_eq!(track.album_ref, None);
        assert_eq!(track.album_text.as_deref(), Some("Legacy label"));
        assert_eq!(store.track(elsewhere).unwrap().album_ref, Some(c1));
        assert!(store.revision() > revision);
        store.check_invariants();
    }

    #[test]
    fn test_nested_removal_promotes_to_root() {
        let mut store = store();
        let top = store.add_album("Top").unwrap();
        let middle = store.add_album("Middle").unwrap();
        let leaf = store.add_album("Leaf").unwrap();
        store.set_parents(&[middle], top);
        store.set_parents(&[leaf], middle);

        store.remove_album(middle).unwrap();
        assert_eq!(store.album(leaf).unwrap().parent_id, None);
        assert_eq!(store.album(top).unwrap().parent_id, None);
    }

    #[test]
    fn test_record_duration() {
        let mut store = store();
        let id = store.add_track(TrackDraft::new("Intro", "Band"));

        assert!(store.record_duration(id, 215.5).unwrap());
        assert!(!store.record_duration(id, 215.5).unwrap());
        assert_eq!(store.track(id).unwrap().duration_seconds, Some(215.5));
        assert!(store.record_duration(id, f64::INFINITY).is_err());
    }

    #[test]
    fn test_release_all_media_skips_already_released() {
        let mut store = store();
        let a = store.add_track(
            TrackDraft::new("A", "Band").with_media(MediaHandle::local("blob:a")),
        );
        store.add_track(TrackDraft::new("B", "Band").with_media(MediaHandle::local("blob:b")));
        store.add_track(
            TrackDraft::new("C", "Band").with_media(MediaHandle::external("https://x/c.mp3")),
        );

        let handle = store.track(a).unwrap().media.clone().unwrap();
        assert!(store.release_ledger().release(&handle));

        assert_eq!(store.release_all_media(), 1);
        assert_eq!(store.release_all_media(), 0);
    }

    #[test]
    #[should_panic(expected = "duplicate album name")]
    fn test_check_invariants_detects_bypassed_rename() {
        let mut store = store();
        let rock = store.add_album("Rock").unwrap();
        store.add_album("Jazz").unwrap();
        if let Some(album) = store.albums.get_mut(&rock) {
            album.name = "jazz".to_string();
        }
        store.check_invariants();
    }

    #[test]
    #[should_panic(expected = "does not terminate")]
    fn test_check_invariants_detects_cycle() {
        let mut store = store();
        let a = store.add_album("A").unwrap();
        let b = store.add_album("B").unwrap();
        store.set_parents(&[a], b);
        store.set_parents(&[b], a);
        store.check_invariants();
    }

    #[test]
    fn test_mutations_publish_library_events() {
        let bus = EventBus::new(16);
        let mut events = EventStream::new(bus.subscribe());
        let mut store = store().with_event_bus(bus);

        let album = store.add_album("Rock").unwrap();
        let track = store.add_track(TrackDraft::new("Intro", "Band").with_album_ref(album));
        store.remove_album(album).unwrap();

        let received = events.drain();
        assert_eq!(received.len(), 3);
        assert_eq!(
            received[2],
            CoreEvent::Library(LibraryEvent::AlbumDeleted {
                album_id: album.to_string(),
                promoted_children: vec![],
                cleared_tracks: vec![track.to_string()],
            })
        );
    }
}
