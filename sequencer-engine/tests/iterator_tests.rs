use pretty_assertions::assert_eq;
use sequencer_core::{ProgressStore, SequencerError, TaskProgress, TaskStatus};
use sequencer_engine::{default_id_extractor, LimitingIterator, ResumeIterator};
use sequencer_storage::MemoryProgressStore;
use std::sync::Arc;

fn items(count: usize) -> Vec<serde_json::Value> {
    (0..count)
        .map(|i| serde_json::json!({ "id": format!("item-{}", i) }))
        .collect()
}

async fn drain(iterator: &mut ResumeIterator<serde_json::Value>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(item) = iterator.next_item().await.unwrap() {
        ids.push(default_id_extractor(&item));
    }
    ids
}

// ===== ResumeIterator =====

#[tokio::test]
async fn test_no_checkpoint_yields_full_sequence() {
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
    let mut iterator =
        ResumeIterator::new(items(4), store, "sync", default_id_extractor, 10)
            .await
            .unwrap();

    let ids = drain(&mut iterator).await;
    assert_eq!(ids, vec!["item-0", "item-1", "item-2", "item-3"]);
}

#[tokio::test]
async fn test_checkpoint_resumes_after_matching_id() {
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
    let seeded = TaskProgress::new("sync", TaskStatus::InProgress)
        .with_counts(2, Some(5))
        .unwrap()
        .with_last_processed_id("item-1");
    store.save("sync", &seeded).await.unwrap();

    let mut iterator =
        ResumeIterator::new(items(5), store, "sync", default_id_extractor, 10)
            .await
            .unwrap();

    assert_eq!(iterator.start_index(), 2);
    let ids = drain(&mut iterator).await;
    assert_eq!(ids, vec!["item-2", "item-3", "item-4"]);
}

#[tokio::test]
async fn test_unknown_checkpoint_id_restarts_from_beginning() {
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
    let seeded = TaskProgress::new("sync", TaskStatus::InProgress)
        .with_last_processed_id("foreign-id");
    store.save("sync", &seeded).await.unwrap();

    let mut iterator =
        ResumeIterator::new(items(3), store, "sync", default_id_extractor, 10)
            .await
            .unwrap();

    assert_eq!(iterator.start_index(), 0);
    let ids = drain(&mut iterator).await;
    assert_eq!(ids, vec!["item-0", "item-1", "item-2"]);
}

#[tokio::test]
async fn test_complete_pass_leaves_final_checkpoint() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut iterator = ResumeIterator::new(
        items(5),
        store.clone() as Arc<dyn ProgressStore>,
        "sync",
        default_id_extractor,
        2,
    )
    .await
    .unwrap();

    let ids = drain(&mut iterator).await;
    assert_eq!(ids.len(), 5);

    let progress = store.load("sync").await.unwrap().unwrap();
    assert_eq!(progress.processed_items, 5);
    assert_eq!(progress.total_items, Some(5));
    assert_eq!(progress.last_processed_id.as_deref(), Some("item-4"));
}

#[tokio::test]
async fn test_finish_checkpoints_without_polling_past_the_end() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut iterator = ResumeIterator::new(
        items(4),
        store.clone() as Arc<dyn ProgressStore>,
        "sync",
        default_id_extractor,
        10,
    )
    .await
    .unwrap();

    // Consume exactly the sequence length, never asking for a fifth item.
    for _ in 0..4 {
        assert!(iterator.next_item().await.unwrap().is_some());
    }
    iterator.finish().await.unwrap();

    let progress = store.load("sync").await.unwrap().unwrap();
    assert_eq!(progress.processed_items, 4);
    assert_eq!(progress.last_processed_id.as_deref(), Some("item-3"));
}

#[tokio::test]
async fn test_finish_before_any_item_writes_nothing() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut iterator = ResumeIterator::new(
        items(3),
        store.clone() as Arc<dyn ProgressStore>,
        "sync",
        default_id_extractor,
        10,
    )
    .await
    .unwrap();

    iterator.finish().await.unwrap();
    assert!(store.load("sync").await.unwrap().is_none());
}

#[tokio::test]
async fn test_periodic_checkpoint_during_iteration() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut iterator = ResumeIterator::new(
        items(10),
        store.clone() as Arc<dyn ProgressStore>,
        "sync",
        default_id_extractor,
        3,
    )
    .await
    .unwrap();

    for _ in 0..3 {
        iterator.next_item().await.unwrap();
    }

    let progress = store.load("sync").await.unwrap().unwrap();
    assert_eq!(progress.status, TaskStatus::InProgress);
    assert_eq!(progress.processed_items, 3);
    assert_eq!(progress.last_processed_id.as_deref(), Some("item-2"));
}

#[tokio::test]
async fn test_zero_save_interval_is_a_configuration_error() {
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
    let result =
        ResumeIterator::new(items(3), store, "sync", default_id_extractor, 0).await;

    assert!(matches!(result, Err(SequencerError::Configuration(_))));
}

#[tokio::test]
async fn test_reset_replays_from_construction_time_start() {
    let store: Arc<dyn ProgressStore> = Arc::new(MemoryProgressStore::new());
    let seeded = TaskProgress::new("sync", TaskStatus::InProgress)
        .with_last_processed_id("item-1");
    store.save("sync", &seeded).await.unwrap();

    let mut iterator =
        ResumeIterator::new(items(5), store, "sync", default_id_extractor, 10)
            .await
            .unwrap();

    // First pass consumes to the end; the start index stays fixed.
    let first = drain(&mut iterator).await;
    assert_eq!(first, vec!["item-2", "item-3", "item-4"]);

    iterator.reset();
    let second = drain(&mut iterator).await;
    assert_eq!(second, vec!["item-2", "item-3", "item-4"]);
}

// ===== LimitingIterator =====

#[test]
fn test_limit_truncates_longer_source() {
    let limited = LimitingIterator::new(0..100, 3).unwrap();
    let collected: Vec<i32> = limited.collect();
    assert_eq!(collected, vec![0, 1, 2]);
}

#[test]
fn test_limit_larger_than_source_yields_everything() {
    let limited = LimitingIterator::new(0..4, 10).unwrap();
    let collected: Vec<i32> = limited.collect();
    assert_eq!(collected, vec![0, 1, 2, 3]);
}

#[test]
fn test_zero_limit_is_a_configuration_error() {
    let result = LimitingIterator::new(0..10, 0);
    assert!(matches!(result, Err(SequencerError::Configuration(_))));
}

#[test]
fn test_reset_restarts_the_counter() {
    let mut limited = LimitingIterator::new(0.., 3).unwrap();
    let first: Vec<i32> = limited.by_ref().collect();
    assert_eq!(first, vec![0, 1, 2]);

    limited.reset();
    let second: Vec<i32> = limited.by_ref().collect();
    assert_eq!(second, vec![3, 4, 5]);
}
