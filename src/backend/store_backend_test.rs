use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::time::timeout;

use super::*;
use crate::store::KvStore;
use crate::store::MemoryStore;
use crate::ChangeEvent;
use crate::Error;
use crate::Key;
use crate::Pair;
use crate::StoreError;
use crate::SyncConfig;
use crate::WatchError;

const WAIT: Duration = Duration::from_millis(200);

fn backend_with(store: Arc<MemoryStore>) -> StoreBackend<MemoryStore> {
    let mut config = SyncConfig::default();
    config.store.root = "/cfg".to_string();
    config.watch.event_buffer_size = 8;
    StoreBackend::new(store, &config)
}

async fn next_event(stream: &mut ChangeStream) -> Option<ChangeEvent> {
    timeout(WAIT, stream.recv()).await.expect("no event within deadline")
}

#[tokio::test]
async fn test_get_returns_pair_for_existing_scalar() {
    let store = Arc::new(MemoryStore::new());
    store.put_value("/cfg/bind", "host:1");
    let backend = backend_with(store);

    let pair = backend.get(&Key::scalar("bind")).await.unwrap();

    assert_eq!(pair.key, Key::scalar("bind"));
    assert_eq!(pair.value, Bytes::from("host:1"));
}

#[tokio::test]
async fn test_list_returns_group_members_with_basenames() {
    let store = Arc::new(MemoryStore::new());
    store.put_value("/cfg/endpoints/e1", "http://a");
    store.put_value("/cfg/endpoints/e2", "http://b");
    store.put_value("/cfg/endpoints-old/e9", "http://z");
    let backend = backend_with(store);

    let pairs = backend.list(&Key::prefix("endpoints")).await.unwrap();

    assert_eq!(
        pairs,
        vec![
            Pair::new(Key::member("endpoints", "e1"), "http://a"),
            Pair::new(Key::member("endpoints", "e2"), "http://b"),
        ]
    );
}

#[tokio::test]
async fn test_get_missing_key_is_not_found() {
    let backend = backend_with(Arc::new(MemoryStore::new()));

    let err = backend.get(&Key::scalar("missing")).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(matches!(err, Error::Store(StoreError::NotFound(path)) if path == "/cfg/missing"));
}

#[tokio::test]
async fn test_list_empty_prefix_is_not_found() {
    let backend = backend_with(Arc::new(MemoryStore::new()));

    let err = backend.list(&Key::prefix("endpoints")).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_set_writes_under_root() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());

    backend
        .set(&Key::scalar("name"), Bytes::from("x"))
        .await
        .unwrap();

    let entry = store.get("/cfg/name").await.unwrap().unwrap();
    assert_eq!(entry.value, Bytes::from("x"));
}

#[tokio::test]
async fn test_watch_translates_events_in_store_order() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    store.put_batch(vec![("/cfg/name", "x"), ("/cfg/endpoints/e1", "http://a")]);
    store.delete("/cfg/name");
    store.put_value("/elsewhere/name", "ignored");

    assert_eq!(
        next_event(&mut stream).await,
        Some(ChangeEvent::put(Key::scalar("name"), "x"))
    );
    assert_eq!(
        next_event(&mut stream).await,
        Some(ChangeEvent::put(Key::member("endpoints", "e1"), "http://a"))
    );
    assert_eq!(
        next_event(&mut stream).await,
        Some(ChangeEvent::delete(Key::scalar("name")))
    );

    backend.close().await;
}

#[tokio::test]
async fn test_native_cancel_yields_one_terminal_event_then_ends() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    store.cancel_watches("compacted");

    let event = next_event(&mut stream).await.unwrap();
    assert!(event.is_terminal());
    assert_eq!(
        event.err,
        Some(WatchError::Canceled {
            reason: "compacted".to_string()
        })
    );
    assert_eq!(event.key, Key::default());
    assert!(next_event(&mut stream).await.is_none());

    timeout(WAIT, backend.close())
        .await
        .expect("close must not hang");
}

#[tokio::test]
async fn test_native_fault_yields_transport_error() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    store.fail_watches("connection reset");

    let event = next_event(&mut stream).await.unwrap();
    assert!(matches!(event.err, Some(WatchError::Transport(_))));
    assert!(next_event(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_native_end_closes_stream_without_error() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    store.close_watches();

    assert!(next_event(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_close_stops_task_and_ends_stream() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    timeout(WAIT, backend.close())
        .await
        .expect("close must not hang");

    // Task is joined: nothing is forwarded after close returned
    store.put_value("/cfg/name", "late");
    assert!(next_event(&mut stream).await.is_none());
    assert!(matches!(
        backend.get(&Key::scalar("name")).await,
        Err(Error::Store(StoreError::Closed))
    ));
}

#[tokio::test]
async fn test_close_does_not_hang_on_full_buffer() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let _stream = backend.watch("/cfg").await.unwrap();

    // More than the buffer of 8, never consumed
    for i in 0..32 {
        store.put_value(&format!("/cfg/k{i}"), "v");
    }

    timeout(WAIT, backend.close())
        .await
        .expect("close must not hang");
}

#[tokio::test]
async fn test_close_is_idempotent_without_watch() {
    let backend = backend_with(Arc::new(MemoryStore::new()));

    backend.close().await;
    backend.close().await;

    assert!(matches!(
        backend.watch("/cfg").await,
        Err(Error::Store(StoreError::Closed))
    ));
}

#[tokio::test]
async fn test_second_watch_while_active_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let _stream = backend.watch("/cfg").await.unwrap();

    let err = backend.watch("/cfg").await.unwrap_err();

    assert!(matches!(err, Error::Watch(WatchError::AlreadyWatching(_))));
    backend.close().await;
}

#[tokio::test]
async fn test_watch_can_be_reopened_after_terminal_event() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    store.cancel_watches("compacted");
    assert!(next_event(&mut stream).await.unwrap().is_terminal());

    let mut stream = backend.watch("/cfg").await.unwrap();
    store.put_value("/cfg/name", "again");
    assert_eq!(
        next_event(&mut stream).await,
        Some(ChangeEvent::put(Key::scalar("name"), "again"))
    );

    backend.close().await;
}

#[tokio::test]
async fn test_malformed_path_maps_to_sentinel_key() {
    let store = Arc::new(MemoryStore::new());
    let backend = backend_with(store.clone());
    let mut stream = backend.watch("/cfg").await.unwrap();

    // Exactly the prefix: no segment after the root
    store.put_value("/cfg/", "orphan");

    let event = next_event(&mut stream).await.unwrap();
    assert!(event.key.is_invalid());
    assert!(event.err.is_none());

    backend.close().await;
}

#[tokio::test]
async fn test_change_stream_implements_stream() {
    let events = vec![
        ChangeEvent::put(Key::scalar("a"), "1"),
        ChangeEvent::delete(Key::scalar("a")),
    ];

    let collected: Vec<ChangeEvent> = ChangeStream::from_events(events.clone()).collect().await;

    assert_eq!(collected, events);
}

#[tokio::test]
async fn test_mock_backend_reports_root() {
    let mut mock = MockBackend::new();
    mock.expect_root_key().return_const("/cfg".to_string());
    mock.expect_separator().return_const('/');

    assert_eq!(mock.root_key(), "/cfg");
    assert_eq!(mock.separator(), '/');
}
