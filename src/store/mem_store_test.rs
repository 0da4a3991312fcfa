use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use super::*;
use crate::StoreError;

async fn next_response(stream: &mut WatchStream) -> WatchResponse {
    timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("watch response timed out")
        .expect("watch stream ended")
        .expect("watch stream error")
}

#[tokio::test]
async fn test_get_prefix_returns_sorted_keys_at_revision() {
    let store = MemoryStore::new();
    store.put("jxt/tenants/2/meta", "b");
    store.put("jxt/tenants/1/meta", "a");
    store.put("other/key", "x");

    let range = store.get_prefix("jxt/tenants/").await.unwrap();

    assert_eq!(range.revision, 3);
    let keys: Vec<&str> = range.kvs.iter().filter_map(|kv| kv.key_str()).collect();
    assert_eq!(keys, vec!["jxt/tenants/1/meta", "jxt/tenants/2/meta"]);
    assert_eq!(range.kvs[0].mod_revision, 2);
}

#[tokio::test]
async fn test_delete_of_missing_key_keeps_revision() {
    let store = MemoryStore::new();
    store.put("k", "v");

    assert_eq!(store.delete("missing"), None);
    assert_eq!(store.current_revision(), 1);
    assert_eq!(store.delete("k"), Some(2));
}

#[tokio::test]
async fn test_watch_streams_matching_live_events() {
    let store = MemoryStore::new();
    let mut stream = store.watch_prefix("jxt/", None).await.unwrap();

    store.put("elsewhere", "ignored");
    store.put("jxt/tenants/1/meta", "v1");
    store.delete("jxt/tenants/1/meta");

    let put = next_response(&mut stream).await;
    assert_eq!(put.revision, 2);
    assert_eq!(put.events[0].event_type, WatchEventType::Put);
    assert_eq!(put.events[0].kv.value, Bytes::from("v1"));

    let delete = next_response(&mut stream).await;
    assert_eq!(delete.revision, 3);
    assert_eq!(delete.events[0].event_type, WatchEventType::Delete);
    assert!(delete.events[0].kv.value.is_empty());
}

#[tokio::test]
async fn test_watch_replays_history_from_start_revision() {
    let store = MemoryStore::new();
    store.put("jxt/a", "1");
    store.put("jxt/b", "2");
    store.put("jxt/c", "3");

    let mut stream = store.watch_prefix("jxt/", Some(2)).await.unwrap();

    assert_eq!(next_response(&mut stream).await.revision, 2);
    assert_eq!(next_response(&mut stream).await.revision, 3);

    store.put("jxt/d", "4");
    assert_eq!(next_response(&mut stream).await.revision, 4);
}

#[tokio::test]
async fn test_batch_put_is_one_revision() {
    let store = MemoryStore::new();
    let mut stream = store.watch_prefix("jxt/", None).await.unwrap();

    let revision = store.put_batch([("jxt/a", "1"), ("jxt/b", "2")]);

    let response = next_response(&mut stream).await;
    assert_eq!(revision, 1);
    assert_eq!(response.events.len(), 2);
}

#[tokio::test]
async fn test_watch_below_compaction_fails() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store.put(format!("jxt/{i}"), "v");
    }
    store.compact(4);

    let result = store.watch_prefix("jxt/", Some(2)).await;
    assert!(matches!(
        result,
        Err(StoreError::Compacted {
            requested: 2,
            compact_revision: 4
        })
    ));

    let mut stream = store.watch_prefix("jxt/", Some(4)).await.unwrap();
    assert_eq!(next_response(&mut stream).await.revision, 4);
}

#[tokio::test]
async fn test_disconnect_ends_streams() {
    let store = MemoryStore::new();
    let mut stream = store.watch_prefix("jxt/", None).await.unwrap();
    assert_eq!(store.watcher_count(), 1);

    store.disconnect_watchers();

    assert!(stream.next().await.is_none());
    assert_eq!(store.watcher_count(), 0);
}

#[tokio::test]
async fn test_unavailable_store_rejects_requests() {
    let store = MemoryStore::new();
    store.set_available(false);

    assert!(matches!(store.get_prefix("jxt/").await, Err(StoreError::Unavailable(_))));
    assert!(store.watch_prefix("jxt/", None).await.is_err());

    store.set_available(true);
    assert!(store.get_prefix("jxt/").await.is_ok());
}
