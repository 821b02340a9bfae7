//! Progress poller against a live server

mod helpers;

use helpers::*;
use spotscrape::build_router;
use spotscrape::models::ScanMethod;
use spotscrape::services::ProgressPoller;
use spotscrape::utils::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_poller_reads_new_generation_from_first_line() {
    let state = test_state(capabilities(FakePageFetcher::new(), Arc::new(FakePlaylistService::new()), None));
    let store = state.store.clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let first = store.start_scan("https://first.example.com/", ScanMethod::Links).await;
    for i in 0..8 {
        first.record_progress(10, &format!("gen1 line {}", i)).await;
    }

    let poller = ProgressPoller::new(
        &format!("http://{}", addr),
        RetryPolicy::no_retry(Duration::from_secs(2)),
        Duration::from_millis(10),
    )
    .unwrap();
    let (mut rx, handle) = poller.spawn(CancellationToken::new());

    // Let the poller advance its cursor through the first generation
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(report) = rx.recv().await {
            if report.message_log_tail.iter().any(|e| e.text == "gen1 line 7") {
                return;
            }
        }
        panic!("poller stopped before reading the first generation");
    })
    .await
    .unwrap();

    let second = store.start_scan("https://second.example.com/", ScanMethod::Links).await;
    second.record_progress(5, "Starting links scan").await;
    for i in 0..12 {
        second.record_progress(50, &format!("gen2 line {}", i)).await;
    }
    second.complete().await;

    let mut lines = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(report) = rx.recv().await {
            if report.generation == 2 {
                lines.extend(report.message_log_tail.into_iter().map(|e| e.text));
            }
        }
    })
    .await
    .unwrap();
    assert!(handle.await.unwrap().is_ok());

    let mut expected = vec!["Starting links scan".to_string()];
    expected.extend((0..12).map(|i| format!("gen2 line {}", i)));
    let received: Vec<String> = lines
        .into_iter()
        .filter(|line| line.starts_with("gen2") || line.starts_with("Starting"))
        .collect();
    assert_eq!(received, expected);
}
