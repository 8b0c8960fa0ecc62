//! End-to-end tests for the core service context.

use std::sync::Arc;

use bridge_traits::{
    MediaHandle, MediaReleaser, MediaResource, NoopReleaser, SequentialIdGenerator,
};
use core_library::{DeepLink, LibraryError, MergeError, TrackDraft};
use core_playback::testing::{FakeMediaResource, MediaCommand};
use core_playback::{PlaybackError, SelectOutcome, TransportState};
use core_runtime::events::{CoreEvent, LibraryEvent, PlaybackEvent};
use core_runtime::{CatalogLimits, CoreConfig};
use core_service::{CoreError, CoreService, OpenedLink};
use mockall::mock;

mock! {
    Releaser {}
    impl MediaReleaser for Releaser {
        fn release(&self, handle: &MediaHandle);
    }
}

fn config(releaser: Arc<dyn MediaReleaser>) -> CoreConfig {
    CoreConfig::builder()
        .media_releaser(releaser)
        .id_generator(Arc::new(SequentialIdGenerator::new()))
        .build()
        .unwrap()
}

fn service() -> CoreService<FakeMediaResource> {
    CoreService::new(config(Arc::new(NoopReleaser)), FakeMediaResource::new()).unwrap()
}

fn song(title: &str, locator: &str) -> TrackDraft {
    TrackDraft::new(title, "Band").with_media(MediaHandle::local(locator))
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = CoreConfig::builder()
        .media_releaser(Arc::new(NoopReleaser))
        .catalog_limits(CatalogLimits::default().with_max_name_len(0))
        .build();

    let err = CoreError::from(config.unwrap_err());
    assert!(matches!(err, CoreError::Initialization(_)));
    assert!(err.to_string().contains("name length"));
}

#[test]
fn test_validation_failures_leave_catalog_unchanged() {
    let mut core = service();
    core.add_album("Rock").unwrap();

    let err = core.add_album("rock").unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(
        err,
        CoreError::Library(LibraryError::DuplicateName { .. })
    ));

    let err = core.add_track(TrackDraft::new("  ", "Band")).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(core.store().num_tracks(), 0);
    assert_eq!(core.store().num_albums(), 1);
}

#[test]
fn test_cyclic_reparent_surfaces_names() {
    let mut core = service();
    let a = core.add_album("A").unwrap();
    let b = core.add_album("B").unwrap();
    let c = core.add_album("C").unwrap();
    core.reparent(&[b], a).unwrap();
    core.reparent(&[c], b).unwrap();

    let err = core.reparent(&[a], c).unwrap_err();
    match err {
        CoreError::Library(LibraryError::Merge(MergeError::CyclicDependency {
            source_name,
            target_name,
            ..
        })) => {
            assert_eq!(source_name, "A");
            assert_eq!(target_name, "C");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(core.store().album(a).unwrap().parent_id, None);
}

#[test]
fn test_removing_active_track_idles_session_and_releases_media() {
    let mut releaser = MockReleaser::new();
    releaser
        .expect_release()
        .withf(|handle| handle.key() == "blob:one")
        .times(1)
        .return_const(());
    let mut core = CoreService::new(config(Arc::new(releaser)), FakeMediaResource::new()).unwrap();

    let id = core.add_track(song("One", "blob:one")).unwrap();
    core.select_track(id, true).unwrap();
    let ready = core.session().resource().ready(100.0);
    assert!(core.handle_media_signal(ready));
    assert_eq!(core.snapshot().state, TransportState::Playing);

    core.remove_track(id).unwrap();
    let snapshot = core.snapshot();
    assert_eq!(snapshot.state, TransportState::Idle);
    assert_eq!(snapshot.active_track_id, None);
    assert!(core.session().resource().bound_source().is_none());

    // The session loaded the same handle; teardown must not release it again.
    assert_eq!(core.teardown(), 0);
    assert_eq!(core.release_ledger().released_count(), 1);
}

#[test]
fn test_remove_unknown_track_is_not_found() {
    let mut core = service();
    let id = core.add_track(song("One", "blob:one")).unwrap();
    core.remove_track(id).unwrap();

    let err = core.remove_track(id).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_ready_duration_is_recorded_on_track() {
    let mut core = service();
    let id = core.add_track(song("One", "blob:one")).unwrap();
    core.select_track(id, false).unwrap();

    let ready = core.session().resource().ready(215.5);
    core.handle_media_signal(ready);

    assert_eq!(core.store().track(id).unwrap().duration_seconds, Some(215.5));
    assert_eq!(core.snapshot().state, TransportState::Paused);
}

#[test]
fn test_edit_of_active_track_reaches_session() {
    let mut core = service();
    let id = core.add_track(song("One", "blob:old")).unwrap();
    core.select_track(id, true).unwrap();
    let ready = core.session().resource().ready(10.0);
    core.handle_media_signal(ready);
    core.toggle_play_pause().unwrap();

    let edited = core
        .store()
        .track(id)
        .unwrap()
        .to_draft()
        .with_media(MediaHandle::local("blob:new"));
    core.update_track(id, edited).unwrap();

    assert_eq!(core.toggle_play_pause().unwrap(), SelectOutcome::Loading);
    assert!(matches!(
        core.session().resource().commands().last(),
        Some(MediaCommand::Load(_, key)) if key == "blob:new"
    ));
}

#[test]
fn test_edit_keeps_media_bound_to_playback_alive() {
    let mut releaser = MockReleaser::new();
    releaser
        .expect_release()
        .withf(|handle| handle.key() == "blob:old" || handle.key() == "blob:new")
        .times(2)
        .return_const(());
    let mut core = CoreService::new(config(Arc::new(releaser)), FakeMediaResource::new()).unwrap();

    let id = core.add_track(song("One", "blob:old")).unwrap();
    core.select_track(id, true).unwrap();
    let ready = core.session().resource().ready(10.0);
    core.handle_media_signal(ready);

    core.update_track(id, song("One", "blob:new")).unwrap();

    let old = MediaHandle::local("blob:old");
    assert!(!core.release_ledger().is_released(&old));
    assert_eq!(core.snapshot().state, TransportState::Playing);
    assert_eq!(core.session().resource().bound_source(), Some(&old.source));

    assert_eq!(core.teardown(), 2);
    assert!(core.release_ledger().is_released(&old));
}

#[test]
fn test_edit_of_inactive_track_releases_replaced_media() {
    let mut releaser = MockReleaser::new();
    releaser
        .expect_release()
        .withf(|handle| handle.key() == "blob:old")
        .times(1)
        .return_const(());
    let mut core = CoreService::new(config(Arc::new(releaser)), FakeMediaResource::new()).unwrap();

    let id = core.add_track(song("One", "blob:old")).unwrap();
    let edited = TrackDraft::new("One", "Band")
        .with_media(MediaHandle::external("https://cdn.example/one.mp3"));
    core.update_track(id, edited).unwrap();

    assert!(core.release_ledger().is_released(&MediaHandle::local("blob:old")));
}

#[test]
fn test_unusable_ready_duration_keeps_recorded_duration() {
    let mut core = service();
    let id = core
        .add_track(song("One", "blob:one").with_duration(120.0))
        .unwrap();
    core.select_track(id, false).unwrap();

    let ready = core.session().resource().ready(f64::NAN);
    assert!(core.handle_media_signal(ready));

    assert_eq!(core.store().track(id).unwrap().duration_seconds, Some(120.0));
    assert_eq!(core.snapshot().duration_seconds, 120.0);
}

#[test]
fn test_selecting_unplayable_track() {
    let mut core = service();
    let id = core.add_track(TrackDraft::new("Silent", "Band")).unwrap();

    let err = core.select_track(id, true).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::NotPlayable { .. })
    ));
    assert_eq!(core.snapshot().state, TransportState::Idle);
}

#[test]
fn test_track_deep_link_opens_album_and_plays() {
    let mut core = service();
    let album = core.add_album("Rock").unwrap();
    let id = core
        .add_track(song("One", "blob:one").with_album_ref(album))
        .unwrap();

    let link = DeepLink::from_query(&format!("?type=song&id={}", id)).unwrap();
    let opened = core.open_deep_link(&link).unwrap();
    assert_eq!(
        opened,
        OpenedLink {
            album: Some(album),
            selected_track: Some(id),
        }
    );
    assert_eq!(core.snapshot().state, TransportState::Loading);

    let ready = core.session().resource().ready(3.0);
    core.handle_media_signal(ready);
    assert_eq!(core.snapshot().state, TransportState::Playing);
}

#[test]
fn test_deep_link_without_autoplay_only_opens_view() {
    let config = CoreConfig::builder()
        .media_releaser(Arc::new(NoopReleaser))
        .autoplay_deep_links(false)
        .build()
        .unwrap();
    let mut core = CoreService::new(config, FakeMediaResource::new()).unwrap();
    let id = core.add_track(song("One", "blob:one")).unwrap();

    let opened = core.open_deep_link(&DeepLink::track(id)).unwrap();
    assert_eq!(opened.album, None);
    assert_eq!(opened.selected_track, None);
    assert!(core.session().resource().commands().is_empty());
}

#[test]
fn test_deep_links_to_missing_entities_fail() {
    let mut core = service();
    let album = core.add_album("Gone").unwrap();
    core.remove_album(album).unwrap();

    let err = core.open_deep_link(&DeepLink::album(album)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_teardown_releases_each_local_handle_once() {
    let mut releaser = MockReleaser::new();
    releaser.expect_release().times(3).return_const(());
    let mut core = CoreService::new(config(Arc::new(releaser)), FakeMediaResource::new()).unwrap();

    let one = core.add_track(song("One", "blob:one")).unwrap();
    core.add_track(
        song("Two", "blob:two").with_cover_art(MediaHandle::local("blob:two-cover")),
    )
    .unwrap();
    core.add_track(
        TrackDraft::new("Three", "Band")
            .with_media(MediaHandle::external("https://cdn.example/three.mp3")),
    )
    .unwrap();
    core.select_track(one, true).unwrap();

    assert_eq!(core.teardown(), 3);
    assert_eq!(core.teardown(), 0);
    assert!(core.is_torn_down());
    assert!(matches!(core.add_album("Late"), Err(CoreError::TornDown)));
}

#[test]
fn test_events_follow_mutations() {
    let mut core = service();
    let mut stream = core.subscribe();

    let rock = core.add_album("Rock").unwrap();
    let id = core.add_track(song("One", "blob:one").with_album_ref(rock)).unwrap();
    core.remove_album(rock).unwrap();
    let _ = core.select_track(id, true);

    let events = stream.drain();
    assert!(matches!(
        events[0],
        CoreEvent::Library(LibraryEvent::AlbumAdded { .. })
    ));
    assert!(matches!(
        events[1],
        CoreEvent::Library(LibraryEvent::TrackAdded { .. })
    ));
    assert!(events.iter().any(|event| matches!(
        event,
        CoreEvent::Library(LibraryEvent::AlbumDeleted { cleared_tracks, .. })
            if cleared_tracks.len() == 1
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        CoreEvent::Playback(PlaybackEvent::StateChanged { state, .. }) if state == "loading"
    )));
    assert_eq!(core.store().track(id).unwrap().album_ref, None);
}
