//! In-memory work queue for batch runs
//!
//! Items stay in the queue after they are popped so that completion and
//! failure can be recorded against them; `clear_finished` prunes them.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::core::models::{QueueItem, TaskStatus};

#[derive(Clone, Default)]
pub struct TranscriptQueue {
    items: Arc<Mutex<VecDeque<QueueItem>>>,
}

impl TranscriptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a video, returning the queue item id.
    ///
    /// A video that is already pending keeps its existing item.
    pub fn add_video(&self, video_id: impl Into<String>) -> String {
        let video_id = video_id.into();
        let mut items = self.items.lock();

        if let Some(existing) = items
            .iter()
            .find(|item| item.video_id == video_id && item.status == TaskStatus::Pending)
        {
            debug!(%video_id, "Video already pending, not enqueued again");
            return existing.id.clone();
        }

        let id = format!("{}_{}", video_id, Uuid::new_v4().simple());
        items.push_back(QueueItem {
            id: id.clone(),
            video_id,
            status: TaskStatus::Pending,
            added_at: chrono::Utc::now(),
            processed_at: None,
            error_message: None,
            output_path: None,
        });
        id
    }

    /// Take the oldest pending item and mark it processing
    pub fn pop_next_video(&self) -> Option<QueueItem> {
        let mut items = self.items.lock();
        let item = items
            .iter_mut()
            .find(|item| item.status == TaskStatus::Pending)?;
        item.status = TaskStatus::Processing;
        Some(item.clone())
    }

    pub fn mark_completed(&self, item_id: &str, output_path: Option<String>) -> bool {
        self.finish(item_id, TaskStatus::Completed, None, output_path)
    }

    pub fn mark_failed(&self, item_id: &str, error_message: impl Into<String>) -> bool {
        self.finish(item_id, TaskStatus::Failed, Some(error_message.into()), None)
    }

    pub fn mark_skipped(&self, item_id: &str, reason: impl Into<String>) -> bool {
        self.finish(item_id, TaskStatus::Skipped, Some(reason.into()), None)
    }

    /// Return a popped item to pending so a later run picks it up first
    pub fn requeue(&self, item_id: &str) -> bool {
        let mut items = self.items.lock();
        match items
            .iter_mut()
            .find(|item| item.id == item_id && item.status == TaskStatus::Processing)
        {
            Some(item) => {
                item.status = TaskStatus::Pending;
                true
            }
            None => false,
        }
    }

    fn finish(
        &self,
        item_id: &str,
        status: TaskStatus,
        error_message: Option<String>,
        output_path: Option<String>,
    ) -> bool {
        let mut items = self.items.lock();
        match items.iter_mut().find(|item| item.id == item_id) {
            Some(item) => {
                item.status = status;
                item.processed_at = Some(chrono::Utc::now());
                item.error_message = error_message;
                if output_path.is_some() {
                    item.output_path = output_path;
                }
                true
            }
            None => false,
        }
    }

    pub fn get_item(&self, item_id: &str) -> Option<QueueItem> {
        self.items
            .lock()
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
    }

    pub fn get_all_items(&self) -> Vec<QueueItem> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn remove_item(&self, item_id: &str) -> bool {
        let mut items = self.items.lock();
        match items.iter().position(|item| item.id == item_id) {
            Some(pos) => {
                items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove completed, failed and skipped items, returning how many went
    pub fn clear_finished(&self) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| !item.status.is_finished());
        before - items.len()
    }

    pub fn pending_count(&self) -> usize {
        self.items
            .lock()
            .iter()
            .filter(|item| item.status == TaskStatus::Pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = TranscriptQueue::new();
        queue.add_video("aaaaaaaaaaa");
        queue.add_video("bbbbbbbbbbb");

        assert_eq!(queue.pop_next_video().unwrap().video_id, "aaaaaaaaaaa");
        assert_eq!(queue.pop_next_video().unwrap().video_id, "bbbbbbbbbbb");
        assert!(queue.pop_next_video().is_none());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_popped_items_can_be_marked() {
        let queue = TranscriptQueue::new();
        let id = queue.add_video("KhPQtXQpiZc");
        let item = queue.pop_next_video().unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.status, TaskStatus::Processing);

        assert!(queue.mark_completed(&id, Some("out/KhPQtXQpiZc.txt".into())));
        let stored = queue.get_item(&id).unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(stored.processed_at.is_some());
        assert_eq!(stored.output_path.as_deref(), Some("out/KhPQtXQpiZc.txt"));
    }

    #[test]
    fn test_failed_and_skipped_keep_reason() {
        let queue = TranscriptQueue::new();
        let failed = queue.add_video("aaaaaaaaaaa");
        let skipped = queue.add_video("bbbbbbbbbbb");
        queue.pop_next_video();
        queue.pop_next_video();

        queue.mark_failed(&failed, "captions disabled");
        queue.mark_skipped(&skipped, "exists");
        assert_eq!(
            queue.get_item(&failed).unwrap().error_message.as_deref(),
            Some("captions disabled")
        );
        assert_eq!(queue.get_item(&skipped).unwrap().status, TaskStatus::Skipped);
        assert!(!queue.mark_failed("missing", "nope"));
    }

    #[test]
    fn test_requeue_returns_item_to_front() {
        let queue = TranscriptQueue::new();
        let first = queue.add_video("aaaaaaaaaaa");
        queue.add_video("bbbbbbbbbbb");

        let popped = queue.pop_next_video().unwrap();
        assert!(queue.requeue(&popped.id));
        assert_eq!(queue.get_item(&first).unwrap().status, TaskStatus::Pending);
        assert_eq!(queue.pop_next_video().unwrap().id, first);

        // Only processing items can go back
        queue.mark_completed(&first, None);
        assert!(!queue.requeue(&first));
    }

    #[test]
    fn test_duplicate_pending_video_is_merged() {
        let queue = TranscriptQueue::new();
        let first = queue.add_video("KhPQtXQpiZc");
        let second = queue.add_video("KhPQtXQpiZc");
        assert_eq!(first, second);
        assert_eq!(queue.len(), 1);

        // Once processed, the same video may be queued again
        queue.pop_next_video();
        queue.mark_completed(&first, None);
        let third = queue.add_video("KhPQtXQpiZc");
        assert_ne!(first, third);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_remove_and_clear_finished() {
        let queue = TranscriptQueue::new();
        let a = queue.add_video("aaaaaaaaaaa");
        let b = queue.add_video("bbbbbbbbbbb");
        queue.add_video("ccccccccccc");

        assert!(queue.remove_item(&b));
        assert!(!queue.remove_item(&b));

        queue.pop_next_video();
        queue.mark_completed(&a, None);
        assert_eq!(queue.clear_finished(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get_all_items()[0].video_id, "ccccccccccc");
    }

    #[test]
    fn test_shared_across_threads() {
        let queue = TranscriptQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    queue.add_video(format!("video{:06}", i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.pending_count(), 4);
    }
}
