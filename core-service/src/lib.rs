//! Core service context.
//!
//! [`CoreService`] is the single owned object through which a host drives the
//! catalog. It is created at session start from a [`CoreConfig`] and a host
//! [`MediaResource`], and lives until [`CoreService::teardown`] (or drop).
//! Every mutation goes through `&mut self`, so the store, the hierarchy
//! manager and the playback session are always serialised behind one path.
//!
//! The components never call each other. The service subscribes to the event
//! bus and forwards the one allowed cross-component signal, an edit of the
//! active track, to the playback session. Removing the active track clears
//! the session before the store drops the record.
//!
//! ```
//! use bridge_traits::{MediaHandle, NoopReleaser};
//! use core_library::TrackDraft;
//! use core_playback::testing::FakeMediaResource;
//! use core_runtime::CoreConfig;
//! use core_service::CoreService;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_releaser(Arc::new(NoopReleaser))
//!     .build()?;
//! let mut core = CoreService::new(config, FakeMediaResource::new())?;
//!
//! let rock = core.add_album("Rock")?;
//! let song = core.add_track(
//!     TrackDraft::new("Song", "Band")
//!         .with_album_ref(rock)
//!         .with_media(MediaHandle::local("blob:song")),
//! )?;
//! core.select_track(song, true)?;
//! assert_eq!(core.catalog().tracks_in_album(rock)?.len(), 1);
//! # Ok::<(), core_service::CoreError>(())
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::{MediaEvent, MediaResource, MediaSignal, ReleaseLedger};
use core_library::{
    AlbumId, CatalogView, CollectionStore, DeepLink, HierarchyManager, ResolvedLink, TrackDraft,
    TrackId,
};
use core_playback::{
    PlaybackError, PlaybackSession, PlayableTrack, SelectOutcome, SessionSnapshot,
};
use core_runtime::events::{CoreEvent, EventBus, EventStream, LibraryEvent, RecvError};
use core_runtime::CoreConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What the presentation layer should show after opening a deep link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenedLink {
    /// Album view to open, if any.
    pub album: Option<AlbumId>,
    /// Track that was selected for playback, if any.
    pub selected_track: Option<TrackId>,
}

/// Primary façade exposed to host applications.
pub struct CoreService<R: MediaResource> {
    config: CoreConfig,
    store: CollectionStore,
    hierarchy: HierarchyManager,
    session: PlaybackSession<R>,
    events: EventBus,
    inbox: EventStream,
    ledger: ReleaseLedger,
    torn_down: bool,
}

impl<R: MediaResource> CoreService<R> {
    /// Build the context from a validated configuration.
    pub fn new(config: CoreConfig, resource: R) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let inbox = EventStream::new(events.subscribe()).filter(|event| {
            matches!(
                event,
                CoreEvent::Library(LibraryEvent::TrackUpdated { .. })
            )
        });
        let ledger = ReleaseLedger::new(config.media_releaser.clone());

        let store = CollectionStore::new(config.id_generator.clone(), ledger.clone())
            .with_limits(config.catalog)
            .with_event_bus(events.clone());
        let session = PlaybackSession::new(resource, ledger.clone()).with_event_bus(events.clone());

        info!(
            event_buffer_size = config.event_buffer_size,
            autoplay_deep_links = config.autoplay_deep_links,
            "Core service initialized"
        );

        Ok(Self {
            config,
            store,
            hierarchy: HierarchyManager::new(),
            session,
            events,
            inbox,
            ledger,
            torn_down: false,
        })
    }

    /// Subscribe to every catalog and playback event.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Read-only queries over the current catalog.
    pub fn catalog(&self) -> CatalogView<'_> {
        CatalogView::new(&self.store, &self.hierarchy)
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn hierarchy(&self) -> &HierarchyManager {
        &self.hierarchy
    }

    pub fn session(&self) -> &PlaybackSession<R> {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn release_ledger(&self) -> &ReleaseLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------
    // Catalog mutations
    // ------------------------------------------------------------------

    /// Validate and add a track.
    pub fn add_track(&mut self, draft: TrackDraft) -> Result<TrackId> {
        self.ensure_live()?;
        self.store.validate_draft(&draft)?;
        let id = self.store.add_track(draft);
        self.after_mutation();
        Ok(id)
    }

    /// Replace a track's fields. An edit of the active track reaches the
    /// playback session through the event bus.
    ///
    /// Replaced local handles are released unless the playback session has
    /// loaded them; those stay valid until the session is disposed.
    pub fn update_track(&mut self, id: TrackId, draft: TrackDraft) -> Result<()> {
        self.ensure_live()?;
        let replaced = self.store.update_track(id, draft)?;
        for handle in &replaced {
            if self.session.holds(handle) {
                debug!(track_id = %id, media = handle.key(), "Replaced media still held by playback");
            } else {
                self.ledger.release(handle);
            }
        }
        self.after_mutation();
        Ok(())
    }

    /// Remove a track, clearing the playback session first if it is active.
    pub fn remove_track(&mut self, id: TrackId) -> Result<()> {
        self.ensure_live()?;
        if self.store.track(id).is_none() {
            return Err(core_library::LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: id.to_string(),
            }
            .into());
        }

        self.session.clear_if_active(id);
        self.store.remove_track(id)?;
        self.after_mutation();
        Ok(())
    }

    pub fn add_album(&mut self, name: &str) -> Result<AlbumId> {
        self.ensure_live()?;
        let id = self.store.add_album(name)?;
        self.after_mutation();
        Ok(id)
    }

    pub fn rename_album(&mut self, id: AlbumId, new_name: &str) -> Result<()> {
        self.ensure_live()?;
        self.store.rename_album(id, new_name)?;
        self.after_mutation();
        Ok(())
    }

    /// Delete an album, promoting its children to roots and clearing track
    /// references to it.
    pub fn remove_album(&mut self, id: AlbumId) -> Result<()> {
        self.ensure_live()?;
        self.store.remove_album(id)?;
        self.after_mutation();
        Ok(())
    }

    /// Move `sources` under `target`; all or nothing.
    pub fn reparent(&mut self, sources: &[AlbumId], target: AlbumId) -> Result<()> {
        self.ensure_live()?;
        self.hierarchy.reparent(&mut self.store, sources, target)?;
        self.after_mutation();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Select a catalog track for playback.
    pub fn select_track(&mut self, id: TrackId, autoplay: bool) -> Result<SelectOutcome> {
        self.ensure_live()?;
        let track = self
            .store
            .track(id)
            .map(PlayableTrack::from)
            .ok_or_else(|| core_library::LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: id.to_string(),
            })?;

        let outcome = self.session.select(&track, autoplay);
        self.dispatch();
        Ok(outcome?)
    }

    pub fn toggle_play_pause(&mut self) -> Result<SelectOutcome> {
        self.ensure_live()?;
        let outcome = self.session.toggle_play_pause();
        self.dispatch();
        Ok(outcome?)
    }

    /// Seek the active track; the requested position is clamped.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        self.ensure_live()?;
        let position = self.session.seek(seconds);
        self.dispatch();
        Ok(position?)
    }

    pub fn clear_playback(&mut self) {
        self.session.clear();
        self.dispatch();
    }

    /// Deliver a signal from the host media resource.
    ///
    /// A `Ready` that is accepted also records the reported duration on the
    /// active track. Returns `false` if the signal was stale.
    pub fn handle_media_signal(&mut self, signal: MediaSignal) -> bool {
        if self.torn_down {
            return false;
        }

        let ready = matches!(signal.event, MediaEvent::Ready { .. });
        let applied = self.session.handle_signal(signal);

        if applied && ready {
            let snapshot = self.session.snapshot();
            // An unusable reported duration must not wipe a known one.
            if snapshot.duration_seconds <= 0.0 {
                debug!("Ready reported no usable duration");
            } else if let Some(id) = snapshot.active_track_id {
                if let Err(err) = self.store.record_duration(id, snapshot.duration_seconds) {
                    warn!(track_id = %id, error = %err, "Could not record track duration");
                }
            }
        }
        self.dispatch();
        applied
    }

    // ------------------------------------------------------------------
    // Deep links
    // ------------------------------------------------------------------

    /// Restore the view a shared link points at.
    ///
    /// A track link opens the track's album when it exists and, with
    /// `autoplay_deep_links`, selects the track for playback. A track
    /// without media is still opened; it simply is not selected.
    pub fn open_deep_link(&mut self, link: &DeepLink) -> Result<OpenedLink> {
        self.ensure_live()?;

        let (album, track) = match self.catalog().resolve(link)? {
            ResolvedLink::Album(album) => (Some(album.id), None),
            ResolvedLink::Track { track, album } => {
                (album.map(|album| album.id), Some(PlayableTrack::from(track)))
            }
        };

        let mut selected_track = None;
        if let Some(track) = track.filter(|_| self.config.autoplay_deep_links) {
            match self.session.select(&track, true) {
                Ok(_) => selected_track = Some(track.id),
                Err(PlaybackError::NotPlayable { .. }) => {
                    debug!(track_id = %track.id, "Deep-linked track has no media");
                }
                Err(err) => {
                    self.dispatch();
                    return Err(err.into());
                }
            }
            self.dispatch();
        }

        debug!(link = %link, album = ?album, selected = ?selected_track, "Deep link opened");
        Ok(OpenedLink {
            album,
            selected_track,
        })
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Dispose the playback session and release every locally owned handle
    /// still held by the catalog.
    ///
    /// Each handle reaches the host releaser at most once. Idempotent;
    /// returns how many handles this call released.
    pub fn teardown(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }
        self.torn_down = true;

        let from_session = self.session.dispose();
        let from_store = self.store.release_all_media();
        info!(
            released = from_session + from_store,
            total_released = self.ledger.released_count(),
            "Core service torn down"
        );
        from_session + from_store
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_live(&self) -> Result<()> {
        if self.torn_down {
            Err(CoreError::TornDown)
        } else {
            Ok(())
        }
    }

    fn after_mutation(&mut self) {
        self.dispatch();
        #[cfg(debug_assertions)]
        self.store.check_invariants();
    }

    /// Route buffered track edits to the playback session.
    fn dispatch(&mut self) {
        while let Some(next) = self.inbox.try_recv() {
            match next {
                Ok(CoreEvent::Library(LibraryEvent::TrackUpdated { track_id, .. })) => {
                    if let Ok(id) = track_id.parse::<TrackId>() {
                        self.refresh_active(Some(id));
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Service inbox lagged, resyncing active track");
                    self.refresh_active(None);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Push the stored record of the active track into the session.
    ///
    /// With `only`, nothing happens unless that track is the active one.
    fn refresh_active(&mut self, only: Option<TrackId>) {
        let Some(active) = self.session.active_track_id() else {
            return;
        };
        if only.is_some_and(|id| id != active) {
            return;
        }
        if let Some(track) = self.store.track(active) {
            self.session.on_track_updated(&PlayableTrack::from(track));
        }
    }
}

impl<R: MediaResource> Drop for CoreService<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<R: MediaResource> std::fmt::Debug for CoreService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("store", &self.store)
            .field("session", &self.session)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
