//! Synchronizer against a live server: snapshot, live updates, resync.

use std::sync::Arc;
use std::time::Duration;

use tilesync_client::{
    HttpBackend, OwnershipStore, Ownerships, ReconnectPolicy, SyncEvent, Synchronizer, TileClicker,
};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::harness::TestServer;

async fn wait_for(
    events: &mut broadcast::Receiver<SyncEvent>,
    pred: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}

#[tokio::test]
async fn test_sync_follows_server_across_reconnect() {
    let mut initial = Ownerships::new();
    initial.insert(5, "US".into());
    let server = TestServer::start(initial).await;
    let backend = HttpBackend::connect(&server.config()).unwrap();

    let store = Arc::new(RwLock::new(OwnershipStore::new()));
    let policy = ReconnectPolicy {
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_attempts: Some(10),
        jitter: Duration::ZERO,
    };
    let sync = Arc::new(Synchronizer::new(backend.clone(), store.clone(), policy));
    let mut events = sync.subscribe_events();

    let shutdown = CancellationToken::new();
    let runner = {
        let sync = sync.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { sync.run(shutdown).await })
    };

    assert_eq!(
        wait_for(&mut events, |e| matches!(e, SyncEvent::Snapshot { .. })).await,
        SyncEvent::Snapshot { tiles: 1 }
    );
    server.wait_connected(1).await;

    backend.click_tile(9, "JP").await.unwrap();
    wait_for(&mut events, |e| {
        matches!(e, SyncEvent::TileChanged { tile_id: 9, .. })
    })
    .await;
    assert_eq!(store.read().await.owner(9), Some("JP"));

    // Server drops every listener; the synchronizer resubscribes and
    // re-reads the snapshot, which now includes the click.
    server.close_listeners();
    wait_for(&mut events, |e| matches!(e, SyncEvent::Disconnected { .. })).await;
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, SyncEvent::Snapshot { .. })).await,
        SyncEvent::Snapshot { tiles: 2 }
    );
    server.wait_connected(2).await;

    server.push_update(5, "CA");
    wait_for(&mut events, |e| {
        matches!(e, SyncEvent::TileChanged { tile_id: 5, .. })
    })
    .await;
    assert_eq!(store.read().await.owner(5), Some("CA"));

    shutdown.cancel();
    runner.await.unwrap().unwrap();
    server.wait_disconnected(2).await;
}
