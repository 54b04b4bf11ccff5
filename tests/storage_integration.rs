//! Integration tests for the storage layer: ownership scoping, cascade
//! deletes, uniqueness conflicts, and atomic usage counting.

use lariat::models::NewClickEvent;
use lariat::storage::{SqliteStorage, Storage, StorageError};
use std::sync::Arc;

/// In-memory SQLite storage; a single connection so every query sees the
/// same database.
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn click(short_link_id: i64, ip: &str, timestamp: i64) -> NewClickEvent {
    NewClickEvent {
        short_link_id,
        ip: ip.to_string(),
        country: "Unknown".to_string(),
        region: "Unknown".to_string(),
        city: "Unknown".to_string(),
        device: "Desktop".to_string(),
        browser: "test-agent".to_string(),
        timestamp,
    }
}

#[tokio::test]
async fn destinations_are_scoped_to_their_owner() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();

    let alice_list = storage.list_destinations("alice").await.unwrap();
    assert_eq!(alice_list.len(), 1);
    assert_eq!(alice_list[0].id, dest.id);

    assert!(storage.list_destinations("bob").await.unwrap().is_empty());
    assert!(storage.get_destination("bob", dest.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_destination_is_partial_and_refreshes_updated_at() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "manuals", "https://example.com/docs")
        .await
        .unwrap();

    let updated = storage
        .update_destination("alice", dest.id, Some("Handbook"), None, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.label, "Handbook");
    assert_eq!(updated.description, "manuals");
    assert_eq!(updated.destination_url, "https://example.com/docs");
    assert!(updated.updated_at >= dest.updated_at);

    // A stranger's update looks like a missing record.
    let foreign = storage
        .update_destination("bob", dest.id, Some("Hijacked"), None, None)
        .await
        .unwrap();
    assert!(foreign.is_none());
}

#[tokio::test]
async fn delete_destination_cascades_to_short_links() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();

    let a = storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();
    let b = storage
        .create_short_link(dest.id, "docs-1", "code0002", None, 0)
        .await
        .unwrap();

    assert!(storage.delete_destination("alice", dest.id).await.unwrap());

    assert!(storage.get_destination("alice", dest.id).await.unwrap().is_none());
    assert!(storage.get_short_link("alice", a.id).await.unwrap().is_none());
    assert!(storage.get_short_link("alice", b.id).await.unwrap().is_none());
    assert!(storage.find_for_redirect("code0001").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_destination_owned_by_someone_else_is_a_noop() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();
    storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();

    assert!(!storage.delete_destination("bob", dest.id).await.unwrap());
    assert!(storage.find_for_redirect("code0001").await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_a_short_link_keeps_its_click_events() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();
    let link = storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();

    storage.record_click(&click(link.id, "1.1.1.1", 1_700_000_000)).await.unwrap();
    assert!(storage.delete_short_link("alice", link.id).await.unwrap());

    let events = storage.clicks_since(&[link.id], 0).await.unwrap();
    assert_eq!(events.len(), 1, "click events do not cascade");
}

#[tokio::test]
async fn duplicate_alias_is_a_conflict() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();

    storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();

    let err = storage
        .create_short_link(dest.id, "docs", "code0002", None, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn concurrent_creates_with_same_alias_yield_one_success() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..10 {
        let storage_clone = Arc::clone(&storage);
        let dest_id = dest.id;
        handles.push(tokio::spawn(async move {
            storage_clone
                .create_short_link(dest_id, "same-alias", &format!("code{:04}", i), None, 0)
                .await
        }));
    }

    let mut success_count = 0;
    let mut conflict_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one creation should succeed");
    assert_eq!(conflict_count, 9, "All others should get conflict");
}

#[tokio::test]
async fn usage_increments_are_not_lost_under_concurrency() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();
    let link = storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..20 {
        let storage_clone = Arc::clone(&storage);
        let id = link.id;
        handles.push(tokio::spawn(async move {
            storage_clone.increment_usage(id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let link = storage.get_short_link("alice", link.id).await.unwrap().unwrap();
    assert_eq!(link.usage_count, 20);
}

#[tokio::test]
async fn short_link_update_retains_unspecified_fields() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();
    let link = storage
        .create_short_link(dest.id, "docs", "code0001", Some(2_000_000_000), 5)
        .await
        .unwrap();

    let updated = storage
        .update_short_link("alice", link.id, None, None, Some(9))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.alias, "docs");
    assert_eq!(updated.expires_at, Some(2_000_000_000));
    assert_eq!(updated.rate_limit, 9);
}

#[tokio::test]
async fn clicks_since_filters_by_window_and_orders_newest_first() {
    let storage = create_test_storage().await;

    let dest = storage
        .create_destination("alice", "Docs", "", "https://example.com/docs")
        .await
        .unwrap();
    let link = storage
        .create_short_link(dest.id, "docs", "code0001", None, 0)
        .await
        .unwrap();

    storage.record_click(&click(link.id, "1.1.1.1", 100)).await.unwrap();
    storage.record_click(&click(link.id, "2.2.2.2", 300)).await.unwrap();
    storage.record_click(&click(link.id, "3.3.3.3", 200)).await.unwrap();

    let events = storage.clicks_since(&[link.id], 150).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].timestamp, 300);
    assert_eq!(events[1].timestamp, 200);

    let all = storage.clicks_since(&[link.id], 0).await.unwrap();
    assert_eq!(all.len(), 3);

    let none = storage.clicks_since(&[], 0).await.unwrap();
    assert!(none.is_empty());
}
