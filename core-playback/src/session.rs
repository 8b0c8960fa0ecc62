//! # Playback Session
//!
//! Single-track transport state machine driving one host [`MediaResource`].
//!
//! ## States
//!
//! ```text
//! Idle ──select──> Loading ──ready──> Playing <──toggle──> Paused
//!   ^                 │                  │                    │
//!   │               error              error                error
//!   │                 v                  v                    v
//!   └──clear──────  Errored ──select (fresh load)──> Loading
//! ```
//!
//! ## Loads and subscriptions
//!
//! Every load gets a fresh [`LoadId`]. Selecting a track arms a single-use
//! ready/error subscription for that load; whichever of the two fires first
//! detaches it. Selecting another track (or clearing) drops the subscription
//! and rebinds the resource, so a late `Ready` or `Error` from a superseded
//! load is ignored. Signals for loads other than the one bound to the
//! resource never touch session state.
//!
//! There is no timeout: a load that never signals leaves the session in
//! `Loading` until the next selection.

use bridge_traits::{LoadId, MediaEvent, MediaHandle, MediaResource, MediaSignal, ReleaseLedger};
use core_library::{Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, trace};

use crate::error::{PlaybackError, Result};

/// Transport state reported in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Loading,
    Playing,
    Paused,
    Errored,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Idle => "idle",
            TransportState::Loading => "loading",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Errored => "errored",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of a track the session needs to play it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableTrack {
    pub id: TrackId,
    pub media: Option<MediaHandle>,
    pub duration_seconds: Option<f64>,
}

impl From<&Track> for PlayableTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            media: track.media.clone(),
            duration_seconds: track.duration_seconds,
        }
    }
}

/// Read-only view of the session for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub active_track_id: Option<TrackId>,
    pub state: TransportState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

/// What a `select` or toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A load was issued; readiness will arrive as a signal.
    Loading,
    /// Playback was resumed in place.
    Resumed,
    /// Playback was paused.
    Paused,
    /// Nothing to do.
    Unchanged,
}

/// Ready/error subscription pair for one in-flight load.
#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    load: LoadId,
    autoplay: bool,
}

pub struct PlaybackSession<R: MediaResource> {
    resource: R,
    releases: ReleaseLedger,
    events: Option<EventBus>,
    active: Option<PlayableTrack>,
    state: TransportState,
    position: f64,
    duration: f64,
    /// Load currently bound to the resource.
    current_load: Option<LoadId>,
    pending: Option<PendingLoad>,
    next_load: u64,
    /// Every handle ever bound, released on dispose.
    loaded: Vec<MediaHandle>,
    last_published: Option<SessionSnapshot>,
    disposed: bool,
}

impl<R: MediaResource> PlaybackSession<R> {
    pub fn new(resource: R, releases: ReleaseLedger) -> Self {
        Self {
            resource,
            releases,
            events: None,
            active: None,
            state: TransportState::Idle,
            position: 0.0,
            duration: 0.0,
            current_load: None,
            pending: None,
            next_load: 1,
            loaded: Vec::new(),
            last_published: None,
            disposed: false,
        }
    }

    /// Publish [`PlaybackEvent`]s on `events`.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active_track_id: self.active.as_ref().map(|track| track.id),
            state: self.state,
            position_seconds: self.position,
            duration_seconds: self.duration,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn active_track_id(&self) -> Option<TrackId> {
        self.active.as_ref().map(|track| track.id)
    }

    /// Whether a ready/error subscription is still armed.
    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    /// Whether this session has loaded `handle` and so releases it on
    /// dispose.
    pub fn holds(&self, handle: &MediaHandle) -> bool {
        self.loaded.iter().any(|loaded| loaded.key() == handle.key())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Make `track` the active track.
    ///
    /// Selecting the active track again pauses it while playing, otherwise
    /// resumes it in place when `autoplay` is set (reloading if the resource
    /// is bound to a different source). A track without media leaves the
    /// session idle and returns [`PlaybackError::NotPlayable`].
    pub fn select(&mut self, track: &PlayableTrack, autoplay: bool) -> Result<SelectOutcome> {
        self.ensure_live()?;

        if self.active_track_id() == Some(track.id) {
            return self.reselect(track, autoplay);
        }

        self.detach_pending();
        let Some(media) = track.media.clone() else {
            return Err(self.not_playable(track.id));
        };

        self.active = Some(track.clone());
        self.begin_load(&media, autoplay, track.duration_seconds)
    }

    /// Flip between playing and paused.
    ///
    /// No-op without an active track. When the resource is bound to a
    /// different source than the active track's media (the track was edited),
    /// this behaves like selecting the active track with `autoplay` set to
    /// "not currently playing".
    pub fn toggle_play_pause(&mut self) -> Result<SelectOutcome> {
        self.ensure_live()?;

        let Some(active) = self.active.clone() else {
            return Ok(SelectOutcome::Unchanged);
        };

        let Some(media) = active.media.clone() else {
            // Edited to have no media: nothing left to play.
            self.clear();
            return Ok(SelectOutcome::Unchanged);
        };

        let playing = self.state == TransportState::Playing;
        if self.is_desynced(&media)
            || matches!(self.state, TransportState::Errored | TransportState::Idle)
        {
            return self.reselect(&active, !playing);
        }

        match self.state {
            TransportState::Playing => self.pause_in_place(),
            TransportState::Paused => self.play_in_place(),
            _ => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.autoplay = !pending.autoplay;
                }
                Ok(SelectOutcome::Loading)
            }
        }
    }

    /// Seek to `seconds`, clamped to `[0, duration]`.
    ///
    /// Returns the position actually requested from the resource. The
    /// transport state is not changed.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        self.ensure_live()?;
        if self.active.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }

        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, self.duration)
        };
        self.resource.seek_to(target)?;
        self.position = target;
        self.publish_state();
        Ok(target)
    }

    /// Drop the active track and return to `Idle`.
    pub fn clear(&mut self) {
        self.detach_pending();
        if self.resource.bound_source().is_some() {
            self.resource.unload();
        }
        self.current_load = None;
        self.active = None;
        self.state = TransportState::Idle;
        self.position = 0.0;
        self.duration = 0.0;
        self.publish_state();
    }

    /// Clear the session if `id` is the active track.
    pub fn clear_if_active(&mut self, id: TrackId) -> bool {
        if self.active_track_id() != Some(id) {
            return false;
        }
        debug!(track_id = %id, "Active track removed, clearing session");
        self.clear();
        true
    }

    /// Refresh the stored record of the active track after an edit.
    ///
    /// The resource is not rebound here; a later toggle notices the changed
    /// media and reloads. Returns `false` if `track` is not active.
    pub fn on_track_updated(&mut self, track: &PlayableTrack) -> bool {
        if self.disposed || self.active_track_id() != Some(track.id) {
            return false;
        }

        if self.duration == 0.0 {
            if let Some(known) = track.duration_seconds {
                self.duration = known;
            }
        }
        self.active = Some(track.clone());
        debug!(track_id = %track.id, "Active track metadata refreshed");
        self.publish_state();
        true
    }

    // ------------------------------------------------------------------
    // Resource signals
    // ------------------------------------------------------------------

    /// Feed one resource signal into the state machine.
    ///
    /// Returns `false` when the signal was ignored: it belongs to a load that
    /// is no longer bound, it is a second ready/error for the same load, or
    /// the session has been disposed.
    pub fn handle_signal(&mut self, signal: MediaSignal) -> bool {
        if self.disposed || self.current_load != Some(signal.load) {
            trace!(load_id = %signal.load, event = ?signal.event, "Ignoring stale media signal");
            return false;
        }

        match signal.event {
            MediaEvent::Ready { duration_seconds } => {
                let Some(pending) = self.take_pending(signal.load) else {
                    trace!(load_id = %signal.load, "Ready already handled for this load");
                    return false;
                };
                let reported = sanitize(duration_seconds);
                if reported > 0.0 {
                    self.duration = reported;
                }
                self.position = self.position.min(self.duration);
                // A resource that already started playing needs no second play.
                let started = self.state == TransportState::Playing;
                if pending.autoplay && !started {
                    if let Err(err) = self.resource.play() {
                        self.fail(err.to_string());
                        return true;
                    }
                    self.state = TransportState::Playing;
                } else if !started {
                    self.state = TransportState::Paused;
                }
                debug!(load_id = %signal.load, duration = self.duration, state = %self.state, "Media ready");
            }
            MediaEvent::Error { message } => {
                if self.state == TransportState::Errored {
                    return false;
                }
                self.fail(message);
                return true;
            }
            MediaEvent::Play => {
                if self.state == TransportState::Errored {
                    return false;
                }
                self.state = TransportState::Playing;
            }
            MediaEvent::Pause => {
                if self.state != TransportState::Playing {
                    return false;
                }
                self.disarm_autoplay();
                self.state = TransportState::Paused;
            }
            MediaEvent::TimeUpdate { position_seconds } => {
                let position = sanitize(position_seconds);
                self.position = if self.duration > 0.0 {
                    position.min(self.duration)
                } else {
                    position
                };
            }
            MediaEvent::Ended => {
                self.state = TransportState::Paused;
                self.position = self.duration;
            }
        }

        self.publish_state();
        true
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Tear the session down, releasing every locally owned handle that was
    /// ever loaded.
    ///
    /// Idempotent. Returns how many handles this call released.
    pub fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }

        self.pending = None;
        self.current_load = None;
        if self.resource.bound_source().is_some() {
            self.resource.unload();
        }
        let released = self
            .loaded
            .iter()
            .filter(|handle| self.releases.release(handle))
            .count();

        self.active = None;
        self.state = TransportState::Idle;
        self.disposed = true;
        debug!(released, loaded = self.loaded.len(), "Playback session disposed");
        released
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(PlaybackError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Same track selected again.
    fn reselect(&mut self, track: &PlayableTrack, autoplay: bool) -> Result<SelectOutcome> {
        self.active = Some(track.clone());

        if self.state == TransportState::Playing {
            return self.pause_in_place();
        }

        let Some(media) = track.media.clone() else {
            self.detach_pending();
            return Err(self.not_playable(track.id));
        };

        if self.state == TransportState::Errored {
            return self.begin_load(&media, autoplay, track.duration_seconds);
        }
        if !autoplay {
            return Ok(SelectOutcome::Unchanged);
        }
        if self.is_desynced(&media) || self.state == TransportState::Idle {
            return self.begin_load(&media, true, track.duration_seconds);
        }
        if self.state == TransportState::Loading {
            if let Some(pending) = self.pending.as_mut() {
                pending.autoplay = true;
            }
            return Ok(SelectOutcome::Loading);
        }
        self.play_in_place()
    }

    fn begin_load(
        &mut self,
        media: &MediaHandle,
        autoplay: bool,
        known_duration: Option<f64>,
    ) -> Result<SelectOutcome> {
        self.detach_pending();

        let load = LoadId(self.next_load);
        self.next_load += 1;
        if !self.loaded.iter().any(|handle| handle.key() == media.key()) {
            self.loaded.push(media.clone());
        }

        self.current_load = Some(load);
        self.pending = Some(PendingLoad { load, autoplay });
        self.state = TransportState::Loading;
        self.position = 0.0;
        self.duration = known_duration.map(sanitize).unwrap_or(0.0);

        debug!(
            load_id = %load,
            track_id = ?self.active_track_id(),
            autoplay,
            "Loading media"
        );

        if let Err(err) = self.resource.load(load, &media.source) {
            self.fail(err.to_string());
            return Err(err.into());
        }

        self.publish_state();
        Ok(SelectOutcome::Loading)
    }

    fn pause_in_place(&mut self) -> Result<SelectOutcome> {
        self.resource.pause()?;
        self.disarm_autoplay();
        self.state = TransportState::Paused;
        self.publish_state();
        Ok(SelectOutcome::Paused)
    }

    fn play_in_place(&mut self) -> Result<SelectOutcome> {
        if let Err(err) = self.resource.play() {
            self.fail(err.to_string());
            return Err(err.into());
        }
        self.state = TransportState::Playing;
        self.publish_state();
        Ok(SelectOutcome::Resumed)
    }

    fn is_desynced(&self, media: &MediaHandle) -> bool {
        self.resource.bound_source() != Some(&media.source)
    }

    fn take_pending(&mut self, load: LoadId) -> Option<PendingLoad> {
        match self.pending {
            Some(pending) if pending.load == load => self.pending.take(),
            _ => None,
        }
    }

    /// A pause wins over a ready that has not arrived yet.
    fn disarm_autoplay(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.autoplay = false;
        }
    }

    fn detach_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            trace!(load_id = %pending.load, "Detached pending load");
        }
    }

    /// Leave the session idle after selecting a track that cannot play.
    fn not_playable(&mut self, id: TrackId) -> PlaybackError {
        if self.resource.bound_source().is_some() {
            self.resource.unload();
        }
        self.current_load = None;
        self.active = None;
        self.state = TransportState::Idle;
        self.position = 0.0;
        self.duration = 0.0;

        debug!(track_id = %id, "Selected track has no media");
        self.emit(PlaybackEvent::NotPlayable {
            track_id: id.to_string(),
        });
        self.publish_state();
        PlaybackError::NotPlayable {
            track_id: id.to_string(),
        }
    }

    fn fail(&mut self, message: String) {
        self.pending = None;
        self.state = TransportState::Errored;
        error!(
            track_id = ?self.active_track_id(),
            load_id = ?self.current_load,
            error = %message,
            "Media resource failed"
        );
        self.emit(PlaybackEvent::Error {
            track_id: self.active_track_id().map(|id| id.to_string()),
            message,
            recoverable: true,
        });
        self.publish_state();
    }

    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        if self.last_published == Some(snapshot) {
            return;
        }
        self.last_published = Some(snapshot);
        self.emit(PlaybackEvent::StateChanged {
            track_id: snapshot.active_track_id.map(|id| id.to_string()),
            state: snapshot.state.as_str().to_string(),
            position_ms: to_millis(snapshot.position_seconds),
            duration_ms: to_millis(snapshot.duration_seconds),
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            events.publish(CoreEvent::Playback(event));
        }
    }
}

impl<R: MediaResource> Drop for PlaybackSession<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<R: MediaResource> fmt::Debug for PlaybackSession<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("snapshot", &self.snapshot())
            .field("current_load", &self.current_load)
            .field("pending", &self.pending)
            .field("loaded", &self.loaded.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

fn to_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round() as u64
}
