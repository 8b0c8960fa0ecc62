//! # Event Bus System
//!
//! Typed change notifications for the catalog core, delivered over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Components never call into each other's internals. When the collection
//! store changes a record it publishes a [`LibraryEvent`]; the playback
//! session reports transport changes as [`PlaybackEvent`]s. The service
//! context subscribes and routes the one cross-component signal the design
//! allows (an edit of the active track) to the session, and the presentation
//! layer subscribes to redraw after every state change.
//!
//! ```text
//! ┌──────────────────┐  publish  ┌───────────┐  subscribe  ┌──────────────┐
//! │ Collection Store ├──────────>│           ├────────────>│ Service      │
//! └──────────────────┘           │ EventBus  │             │ (routes to   │
//! ┌──────────────────┐  publish  │           │             │  session)    │
//! │ Playback Session ├──────────>│           ├────────────>│ Presentation │
//! └──────────────────┘           └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(CoreEvent::Library(LibraryEvent::AlbumAdded {
//!     album_id: "a-1".to_string(),
//!     name: "Rock".to_string(),
//! }));
//!
//! assert!(matches!(rx.try_recv(), Ok(CoreEvent::Library(_))));
//! ```
//!
//! The whole core runs on one logical thread, so consumers normally drain
//! with the non-blocking `try_recv` right after a mutation. `recv().await`
//! is available for hosts that forward events from a task.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell `n` events behind the
//!   buffer. Non-fatal; subsequent events are still delivered.
//! - **`RecvError::Closed`**: every sender has been dropped (teardown).

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Catalog content changes
    Library(LibraryEvent),
    /// Playback session changes
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::NotPlayable { .. }) => EventSeverity::Warning,
            CoreEvent::Library(LibraryEvent::TrackDeleted { .. })
            | CoreEvent::Library(LibraryEvent::AlbumDeleted { .. })
            | CoreEvent::Library(LibraryEvent::AlbumsReparented { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Library Events
// ============================================================================

/// Events raised by the collection store and hierarchy manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// New track added to the catalog.
    TrackAdded {
        track_id: String,
        title: String,
        artist: String,
    },
    /// Track record replaced by an edit.
    TrackUpdated {
        track_id: String,
        /// Names of the fields whose value changed.
        updated_fields: Vec<String>,
    },
    /// Track removed from the catalog.
    TrackDeleted {
        track_id: String,
        /// Whether a locally owned media handle was released with it.
        released_media: bool,
    },
    /// New album created.
    AlbumAdded { album_id: String, name: String },
    /// Album renamed in place.
    AlbumRenamed {
        album_id: String,
        old_name: String,
        new_name: String,
    },
    /// Album removed; children promoted to roots, track references cleared.
    AlbumDeleted {
        album_id: String,
        promoted_children: Vec<String>,
        cleared_tracks: Vec<String>,
    },
    /// One or more albums moved under a new parent.
    AlbumsReparented {
        source_ids: Vec<String>,
        target_id: String,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackAdded { .. } => "Track added to catalog",
            LibraryEvent::TrackUpdated { .. } => "Track metadata updated",
            LibraryEvent::TrackDeleted { .. } => "Track removed from catalog",
            LibraryEvent::AlbumAdded { .. } => "Album created",
            LibraryEvent::AlbumRenamed { .. } => "Album renamed",
            LibraryEvent::AlbumDeleted { .. } => "Album deleted",
            LibraryEvent::AlbumsReparented { .. } => "Albums moved under a new parent",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events raised by the playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Any change to the session snapshot.
    StateChanged {
        track_id: Option<String>,
        /// Lower-case transport state name (`idle`, `loading`, ...).
        state: String,
        position_ms: u64,
        duration_ms: u64,
    },
    /// A selected track has no media resource.
    NotPlayable { track_id: String },
    /// The media resource failed to load or play.
    Error {
        track_id: Option<String>,
        message: String,
        /// Whether a fresh selection can recover.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::NotPlayable { .. } => "Track is not playable",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another sender on the same channel. Each
/// `subscribe()` creates an independent receiver that sees events published
/// after it was created; past events are not replayed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. `CoreConfig` rejects that value earlier.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers received it.
    ///
    /// Errors when nobody is subscribed.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes an event, treating "no subscribers" as a normal outcome.
    pub fn publish(&self, event: CoreEvent) {
        if let Err(SendError(event)) = self.sender.send(event) {
            tracing::trace!(event = event.description(), "No subscribers for event");
        }
    }

    /// Creates a new subscriber to receive events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let library_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Library(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Waits for the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered event that passes the filter, or `None`
    /// when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered event that passes the filter.
    ///
    /// Lag is logged and skipped; the stream keeps delivering newer events.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(next) = self.try_recv() {
            match next {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event stream lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn album_added(name: &str) -> CoreEvent {
        CoreEvent::Library(LibraryEvent::AlbumAdded {
            album_id: format!("id-{}", name),
            name: name.to_string(),
        })
    }

    #[test]
    fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_emit_without_subscribers_errors_but_publish_does_not() {
        let bus = EventBus::new(10);
        assert!(bus.emit(album_added("Rock")).is_err());
        bus.publish(album_added("Jazz"));
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Library(LibraryEvent::AlbumsReparented {
            source_ids: vec!["a".to_string(), "b".to_string()],
            target_id: "t".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Playback(_)));

        bus.publish(album_added("Rock"));
        let playback = CoreEvent::Playback(PlaybackEvent::NotPlayable {
            track_id: "t-1".to_string(),
        });
        bus.publish(playback.clone());

        assert_eq!(stream.recv().await.unwrap(), playback);
    }

    #[test]
    fn test_try_recv_and_drain() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.publish(album_added("A"));
        bus.publish(album_added("B"));

        let drained = stream.drain();
        assert_eq!(drained, vec![album_added("A"), album_added("B")]);
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_drain_skips_lag() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for name in ["A", "B", "C", "D", "E"] {
            bus.publish(album_added(name));
        }

        let drained = stream.drain();
        assert_eq!(drained, vec![album_added("D"), album_added("E")]);
    }

    #[test]
    fn test_event_severity() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            message: "decode failed".to_string(),
            recoverable: true,
        });
        assert_eq!(error.severity(), EventSeverity::Error);

        let deleted = CoreEvent::Library(LibraryEvent::AlbumDeleted {
            album_id: "x".to_string(),
            promoted_children: vec![],
            cleared_tracks: vec![],
        });
        assert_eq!(deleted.severity(), EventSeverity::Info);

        let state = CoreEvent::Playback(PlaybackEvent::StateChanged {
            track_id: Some("t".to_string()),
            state: "playing".to_string(),
            position_ms: 1_000,
            duration_ms: 180_000,
        });
        assert_eq!(state.severity(), EventSeverity::Debug);
        assert_eq!(state.description(), "Playback state changed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Library(LibraryEvent::TrackUpdated {
            track_id: "track-9".to_string(),
            updated_fields: vec!["title".to_string()],
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Library\""));
        assert!(json.contains("track-9"));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
