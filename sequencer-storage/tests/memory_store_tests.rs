use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use sequencer_core::{ProgressStore, SequencerError, TaskProgress, TaskStatus};
use sequencer_storage::MemoryProgressStore;

// ===== Save / Load =====

#[tokio::test]
async fn test_save_and_load_roundtrip() {
    let store = MemoryProgressStore::new();
    let progress = TaskProgress::new("sync", TaskStatus::InProgress)
        .with_counts(3, Some(10))
        .unwrap()
        .with_last_processed_id("item-3")
        .with_started_at(Utc::now());

    store.save("sync", &progress).await.unwrap();
    let loaded = store.load("sync").await.unwrap().unwrap();

    assert_eq!(loaded, progress);
}

#[tokio::test]
async fn test_load_absent_task_returns_none() {
    let store = MemoryProgressStore::new();
    assert!(store.load("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_task_name_is_rejected() {
    let store = MemoryProgressStore::new();
    let progress = TaskProgress::new("", TaskStatus::Pending);

    assert!(matches!(
        store.save("", &progress).await,
        Err(SequencerError::Progress(_))
    ));
    assert!(matches!(
        store.load("").await,
        Err(SequencerError::Progress(_))
    ));
    assert!(matches!(
        store.mark_completed("").await,
        Err(SequencerError::Progress(_))
    ));
    assert!(matches!(
        store.clear("").await,
        Err(SequencerError::Progress(_))
    ));
}

#[tokio::test]
async fn test_name_mismatch_is_rejected() {
    let store = MemoryProgressStore::new();
    let progress = TaskProgress::new("other", TaskStatus::Pending);

    let err = store.save("sync", &progress).await.unwrap_err();
    match err {
        SequencerError::Progress(message) => {
            assert!(message.contains("mismatch"));
            assert!(message.contains("'sync'"));
            assert!(message.contains("'other'"));
        }
        other => panic!("expected progress error, got {:?}", other),
    }
}

// ===== Mark completed =====

#[tokio::test]
async fn test_mark_completed_creates_checkpoint_when_absent() {
    let store = MemoryProgressStore::new();

    store.mark_completed("sync").await.unwrap();

    let progress = store.load("sync").await.unwrap().unwrap();
    assert_eq!(progress.status, TaskStatus::Completed);
    assert!(progress.started_at.is_some());
    assert_eq!(progress.started_at, progress.completed_at);
}

#[tokio::test]
async fn test_mark_completed_preserves_existing_start_time() {
    let store = MemoryProgressStore::new();
    let earlier = Utc::now() - Duration::minutes(30);
    let progress = TaskProgress::new("sync", TaskStatus::InProgress).with_started_at(earlier);
    store.save("sync", &progress).await.unwrap();

    store.mark_completed("sync").await.unwrap();

    let updated = store.load("sync").await.unwrap().unwrap();
    assert_eq!(updated.status, TaskStatus::Completed);
    assert_eq!(updated.started_at, Some(earlier));
    assert!(updated.completed_at.is_some());
}

// ===== Clear =====

#[tokio::test]
async fn test_clear_removes_checkpoint_and_is_idempotent() {
    let store = MemoryProgressStore::new();
    let progress = TaskProgress::new("sync", TaskStatus::Completed);
    store.save("sync", &progress).await.unwrap();

    store.clear("sync").await.unwrap();
    assert!(store.load("sync").await.unwrap().is_none());

    // Clearing an absent task is not an error.
    store.clear("sync").await.unwrap();
}

// ===== Transaction scope =====

#[tokio::test]
async fn test_transaction_scope_passes_through() {
    let store = MemoryProgressStore::new();
    let progress = TaskProgress::new("sync", TaskStatus::InProgress);

    store
        .transaction(Box::pin(async { store.save("sync", &progress).await }))
        .await
        .unwrap();

    let loaded = store.load("sync").await.unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn test_transaction_scope_propagates_scope_errors() {
    let store = MemoryProgressStore::new();
    let progress = TaskProgress::new("other", TaskStatus::Pending);

    let result = store
        .transaction(Box::pin(async { store.save("sync", &progress).await }))
        .await;

    assert!(matches!(result, Err(SequencerError::Progress(_))));
}
