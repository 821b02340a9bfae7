//! Playlist materialization against a fake playlist service

mod helpers;

use helpers::*;
use spotscrape::models::{PlaylistJob, PlaylistStatus, RawCandidate, ScanMethod, ScanStatus, TrackPolicy};
use spotscrape::services::{PlaylistBusy, PlaylistMaterializer, SessionStore};
use spotscrape_common::events::EventBus;
use spotscrape_common::Error;
use std::sync::Arc;

const PAGE: &str = "https://blog.example.com/list";

/// Store holding a completed scan with the given linked albums
async fn completed_store(ids: &[&str]) -> SessionStore {
    let store = SessionStore::new(EventBus::new(64), 200);
    let writer = store.start_scan(PAGE, ScanMethod::Links).await;
    for (i, id) in ids.iter().enumerate() {
        writer
            .merge(
                RawCandidate::new(format!("Artist {}", i + 1), format!("Album {}", i + 1), PAGE)
                    .with_external_id(*id),
            )
            .await
            .unwrap();
    }
    writer.complete().await;
    store
}

fn job(ids: &[&str], policy: TrackPolicy) -> PlaylistJob {
    PlaylistJob::new(ids.iter().map(|s| s.to_string()).collect(), policy)
}

#[tokio::test]
async fn test_failing_album_gives_failed_partial() {
    let store = completed_store(&[ID_A, ID_B, ID_C]).await;
    let service = Arc::new(
        FakePlaylistService::new()
            .with_tracks(ID_A, numbered_tracks(ID_A, 2))
            .with_failing_tracks(ID_B)
            .with_tracks(ID_C, numbered_tracks(ID_C, 3)),
    );
    let materializer = PlaylistMaterializer::new(service.clone());
    let writer = store.begin_playlist("Mix").await.unwrap();

    let result = materializer
        .create_playlist(job(&[ID_A, ID_B, ID_C], TrackPolicy::AllTracks), &store.results().await, &writer)
        .await
        .unwrap();

    assert_eq!(result.status, PlaylistStatus::FailedPartial);
    assert_eq!(result.tracks_added, 5);
    assert_eq!(result.playlist_url.as_deref(), Some("https://open.spotify.com/playlist/playlist1"));

    let added = service.added_track_ids();
    assert_eq!(
        added,
        vec![
            format!("{}-t1", ID_A),
            format!("{}-t2", ID_A),
            format!("{}-t1", ID_C),
            format!("{}-t2", ID_C),
            format!("{}-t3", ID_C),
        ]
    );

    assert!(result.albums[0].is_resolved());
    assert!(!result.albums[1].is_resolved());
    assert!(result.albums[2].is_resolved());

    let progress = store.snapshot().await.playlist.unwrap();
    assert_eq!(progress.status, PlaylistStatus::FailedPartial);
    assert_eq!(progress.percent, 100);
}

#[tokio::test]
async fn test_no_resolved_album_creates_nothing() {
    let store = completed_store(&[ID_A, ID_B]).await;
    let service = Arc::new(
        FakePlaylistService::new()
            .with_failing_tracks(ID_A)
            .with_failing_tracks(ID_B),
    );
    let materializer = PlaylistMaterializer::new(service.clone());
    let writer = store.begin_playlist("Mix").await.unwrap();

    let result = materializer
        .create_playlist(job(&[ID_A, ID_B], TrackPolicy::AllTracks), &store.results().await, &writer)
        .await
        .unwrap();

    assert_eq!(result.status, PlaylistStatus::Failed);
    assert!(result.playlist_url.is_none());
    assert!(service.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_add_tracks_failure_still_reports_playlist() {
    let store = completed_store(&[ID_A]).await;
    let service = Arc::new(
        FakePlaylistService::new()
            .with_tracks(ID_A, numbered_tracks(ID_A, 4))
            .with_failing_add_tracks(),
    );
    let materializer = PlaylistMaterializer::new(service.clone());
    let writer = store.begin_playlist("Mix").await.unwrap();

    let result = materializer
        .create_playlist(job(&[ID_A], TrackPolicy::AllTracks), &store.results().await, &writer)
        .await
        .unwrap();

    assert_eq!(result.status, PlaylistStatus::Failed);
    assert!(result.playlist_url.is_some());
    assert!(result.error.unwrap().contains("adding tracks failed"));
}

#[tokio::test]
async fn test_policies_pick_expected_tracks() {
    let store = completed_store(&[ID_A, ID_B]).await;
    let service = Arc::new(
        FakePlaylistService::new()
            .with_tracks(ID_A, numbered_tracks(ID_A, 5))
            .with_tracks(ID_B, numbered_tracks(ID_B, 3)),
    );
    let materializer = PlaylistMaterializer::new(service.clone());

    let writer = store.begin_playlist("Popular").await.unwrap();
    materializer
        .create_playlist(job(&[ID_A, ID_B], TrackPolicy::MostPopularTrack), &store.results().await, &writer)
        .await
        .unwrap();
    assert_eq!(
        service.added_track_ids(),
        vec![format!("{}-t5", ID_A), format!("{}-t3", ID_B)]
    );

    service.added.lock().unwrap().clear();
    let writer = store.begin_playlist("Openers").await.unwrap();
    materializer
        .create_playlist(job(&[ID_A, ID_B], TrackPolicy::FirstTrack), &store.results().await, &writer)
        .await
        .unwrap();
    assert_eq!(
        service.added_track_ids(),
        vec![format!("{}-t1", ID_A), format!("{}-t1", ID_B)]
    );
}

#[tokio::test]
async fn test_record_without_external_id_is_searched() {
    let store = SessionStore::new(EventBus::new(64), 200);
    let writer = store.start_scan(PAGE, ScanMethod::Ai).await;
    let record = writer
        .merge(RawCandidate::new("Massive Attack", "Mezzanine", PAGE))
        .await
        .unwrap();
    writer.complete().await;

    let service = Arc::new(
        FakePlaylistService::new()
            .with_search("Massive Attack", "Mezzanine", album(ID_D, "Massive Attack", "Mezzanine", 75))
            .with_tracks(ID_D, numbered_tracks(ID_D, 1)),
    );
    let materializer = PlaylistMaterializer::new(service.clone());
    let playlist = store.begin_playlist("").await.unwrap();

    let result = materializer
        .create_playlist(job(&[record.id.as_str()], TrackPolicy::AllTracks), &store.results().await, &playlist)
        .await
        .unwrap();

    assert_eq!(result.status, PlaylistStatus::Succeeded);
    assert_eq!(service.track_requests.lock().unwrap().as_slice(), &[ID_D.to_string()]);

    let created = service.created.lock().unwrap();
    assert_eq!(created[0].0, "SpotScrape Playlist");
    assert_eq!(created[0].1, "Created with SpotScrape");
}

#[tokio::test]
async fn test_unknown_id_is_used_verbatim() {
    let store = completed_store(&[]).await;
    let service = Arc::new(FakePlaylistService::new().with_tracks(ID_B, numbered_tracks(ID_B, 2)));
    let materializer = PlaylistMaterializer::new(service.clone());
    let writer = store.begin_playlist("Direct").await.unwrap();

    let result = materializer
        .create_playlist(job(&[ID_B], TrackPolicy::AllTracks), &store.results().await, &writer)
        .await
        .unwrap();

    assert_eq!(result.status, PlaylistStatus::Succeeded);
    assert_eq!(result.tracks_added, 2);
}

#[tokio::test]
async fn test_empty_selection_is_validation_error() {
    let store = completed_store(&[ID_A]).await;
    let service = Arc::new(FakePlaylistService::new());
    let materializer = PlaylistMaterializer::new(service.clone());
    let writer = store.begin_playlist("Mix").await.unwrap();

    let err = materializer
        .create_playlist(job(&["  "], TrackPolicy::AllTracks), &store.results().await, &writer)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(service.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_playlist_refused_while_scan_runs() {
    let store = SessionStore::new(EventBus::new(64), 200);
    let writer = store.start_scan(PAGE, ScanMethod::Links).await;

    assert_eq!(store.begin_playlist("Mix").await.err(), Some(PlaylistBusy::ScanRunning));

    writer.complete().await;
    assert_eq!(store.status().await, ScanStatus::Complete);
    let _job = store.begin_playlist("Mix").await.unwrap();
    assert_eq!(store.begin_playlist("Again").await.err(), Some(PlaylistBusy::JobRunning));
}
