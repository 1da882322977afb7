use sequencer_core::{ProgressStore, Result, SequencerError, TaskProgress, TaskStatus};
use std::sync::Arc;

/// Resumes a list traversal from the element following the last checkpointed
/// identifier, persisting progress every `save_interval` consumed items.
///
/// The starting index is fixed once, at construction: a missing checkpoint,
/// a checkpoint without a recorded id, or an id not present in the sequence
/// all start from the beginning. `reset` rewinds to that same index.
pub struct ResumeIterator<T> {
    items: Vec<T>,
    store: Arc<dyn ProgressStore>,
    task_name: String,
    id_extractor: Arc<dyn Fn(&T) -> String + Send + Sync>,
    save_interval: usize,
    start_index: usize,
    current: usize,
    last_saved_index: Option<usize>,
}

impl<T: Clone> ResumeIterator<T> {
    pub async fn new<F>(
        items: Vec<T>,
        store: Arc<dyn ProgressStore>,
        task_name: impl Into<String>,
        id_extractor: F,
        save_interval: usize,
    ) -> Result<Self>
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        if save_interval == 0 {
            return Err(SequencerError::Configuration(
                "save_interval must be greater than zero".to_string(),
            ));
        }

        let task_name = task_name.into();
        let id_extractor: Arc<dyn Fn(&T) -> String + Send + Sync> = Arc::new(id_extractor);
        let start_index =
            Self::find_start_index(&items, &store, &task_name, id_extractor.as_ref()).await?;

        tracing::debug!(
            task = %task_name,
            start_index,
            total = items.len(),
            "resume iterator initialized"
        );

        Ok(Self {
            items,
            store,
            task_name,
            id_extractor,
            save_interval,
            start_index,
            current: start_index,
            last_saved_index: None,
        })
    }

    /// Yields the next item, checkpointing periodically. Polling past the
    /// final item calls [`finish`](Self::finish).
    pub async fn next_item(&mut self) -> Result<Option<T>> {
        if self.current >= self.items.len() {
            self.finish().await?;
            return Ok(None);
        }

        let item = self.items[self.current].clone();
        self.current += 1;

        if (self.current - self.start_index) % self.save_interval == 0 {
            self.save_checkpoint(self.current - 1).await?;
        }

        Ok(Some(item))
    }

    /// Persists a closing checkpoint at the last consumed position, so a
    /// completed pass always records processed_items == len. Idempotent;
    /// callers that stop at the last yielded item invoke this directly.
    pub async fn finish(&mut self) -> Result<()> {
        if self.current == self.start_index {
            return Ok(());
        }
        let index = self.current - 1;
        if self.last_saved_index != Some(index) {
            self.save_checkpoint(index).await?;
        }
        Ok(())
    }

    /// Rewinds to the start index computed at construction time.
    pub fn reset(&mut self) {
        self.current = self.start_index;
        self.last_saved_index = None;
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    async fn find_start_index(
        items: &[T],
        store: &Arc<dyn ProgressStore>,
        task_name: &str,
        id_extractor: &(dyn Fn(&T) -> String + Send + Sync),
    ) -> Result<usize> {
        let progress = store.load(task_name).await?;
        let last_id = match progress.and_then(|p| p.last_processed_id) {
            Some(id) => id,
            None => return Ok(0),
        };

        for (i, item) in items.iter().enumerate() {
            if id_extractor(item) == last_id {
                return Ok(i + 1);
            }
        }

        // A stale or foreign checkpoint is treated as nothing done yet.
        Ok(0)
    }

    async fn save_checkpoint(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Ok(());
        }

        let item_id = (self.id_extractor)(&self.items[index]);
        let progress = TaskProgress::new(&self.task_name, TaskStatus::InProgress)
            .with_counts(index as u64 + 1, Some(self.items.len() as u64))?
            .with_last_processed_id(item_id);

        self.store.save(&self.task_name, &progress).await?;
        self.last_saved_index = Some(index);
        Ok(())
    }
}

/// Truncates any iterator to at most `limit` items. Re-iterating after
/// `reset` replays from wherever the underlying source is positioned.
pub struct LimitingIterator<I> {
    inner: I,
    limit: usize,
    count: usize,
}

impl<I: Iterator> LimitingIterator<I> {
    pub fn new(inner: I, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(SequencerError::Configuration(
                "limit must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            inner,
            limit,
            count: 0,
        })
    }

    /// Resets the internal counter to zero.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

impl<I: Iterator> Iterator for LimitingIterator<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= self.limit {
            return None;
        }
        let item = self.inner.next()?;
        self.count += 1;
        Some(item)
    }
}
