use std::collections::VecDeque;

use async_trait::async_trait;
use thiserror::Error;

use crate::comments::Comment;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Comment backend failed: {0}")]
    Backend(String),
    #[error("Comment {0} is unknown to the backend")]
    NotFound(String),
}

/// Async persistence collaborator for comments.
///
/// Every call is best-effort from the engine's point of view: local state is
/// already updated when the call is made and is never rolled back.
#[async_trait(?Send)]
pub trait CommentPersistence {
    async fn on_comment_add(&self, comment: &Comment) -> Result<(), PersistenceError>;

    async fn on_comment_update(&self, _comment: &Comment) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn on_comment_remove(&self, id: &str) -> Result<(), PersistenceError>;

    /// All comments moved by one transaction, delivered in one call
    async fn on_comments_updates(&self, _comments: &[Comment]) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn on_load_comments(&self, document_id: &str) -> Result<Vec<Comment>, PersistenceError>;
}

/// Side effect queued during a synchronous mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceTask {
    Add(Comment),
    Update(Comment),
    Remove(String),
    BatchUpdate(Vec<Comment>),
}

impl PersistenceTask {
    pub fn name(&self) -> &'static str {
        match self {
            PersistenceTask::Add(_) => "add",
            PersistenceTask::Update(_) => "update",
            PersistenceTask::Remove(_) => "remove",
            PersistenceTask::BatchUpdate(_) => "batch update",
        }
    }
}

/// Editor-local queue of pending persistence work
#[derive(Debug, Default)]
pub struct PersistenceQueue {
    tasks: VecDeque<PersistenceTask>,
}

impl PersistenceQueue {
    pub fn push(&mut self, task: PersistenceTask) {
        self.tasks.push_back(task);
    }

    pub fn drain(&mut self) -> Vec<PersistenceTask> {
        self.tasks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub task: PersistenceTask,
    pub error: PersistenceError,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub completed: usize,
    pub failures: Vec<FlushFailure>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run queued tasks in order against the backend.
///
/// Failures are logged and reported; they never stop later tasks and never
/// touch local comment state.
pub async fn flush_tasks(
    tasks: Vec<PersistenceTask>,
    persistence: &dyn CommentPersistence,
) -> FlushReport {
    let mut report = FlushReport::default();
    for task in tasks {
        let result = match &task {
            PersistenceTask::Add(comment) => persistence.on_comment_add(comment).await,
            PersistenceTask::Update(comment) => persistence.on_comment_update(comment).await,
            PersistenceTask::Remove(id) => persistence.on_comment_remove(id).await,
            PersistenceTask::BatchUpdate(comments) => {
                persistence.on_comments_updates(comments).await
            }
        };
        match result {
            Ok(()) => report.completed += 1,
            Err(error) => {
                log::error!("comment {} failed to persist: {error}", task.name());
                report.failures.push(FlushFailure { task, error });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
        fail_removes: bool,
    }

    #[async_trait(?Send)]
    impl CommentPersistence for Recorder {
        async fn on_comment_add(&self, comment: &Comment) -> Result<(), PersistenceError> {
            self.calls.borrow_mut().push(format!("add {}", comment.id));
            Ok(())
        }

        async fn on_comment_remove(&self, id: &str) -> Result<(), PersistenceError> {
            self.calls.borrow_mut().push(format!("remove {id}"));
            if self.fail_removes {
                return Err(PersistenceError::Backend("offline".to_string()));
            }
            Ok(())
        }

        async fn on_comments_updates(&self, comments: &[Comment]) -> Result<(), PersistenceError> {
            self.calls
                .borrow_mut()
                .push(format!("batch {}", comments.len()));
            Ok(())
        }

        async fn on_load_comments(&self, _document_id: &str) -> Result<Vec<Comment>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_flush_runs_tasks_in_order() {
        let recorder = Recorder::default();
        let mut queue = PersistenceQueue::default();
        queue.push(PersistenceTask::Add(Comment::with_id("a", "x", 0, 1)));
        queue.push(PersistenceTask::Update(Comment::with_id("a", "x", 2, 3)));
        queue.push(PersistenceTask::BatchUpdate(vec![Comment::with_id("a", "x", 2, 3)]));
        queue.push(PersistenceTask::Remove("a".to_string()));

        let report = flush_tasks(queue.drain(), &recorder).await;

        assert!(queue.is_empty());
        assert!(report.is_clean());
        assert_eq!(report.completed, 4);
        assert_eq!(
            *recorder.calls.borrow(),
            vec!["add a", "batch 1", "remove a"]
        );
    }

    #[tokio::test]
    async fn test_flush_reports_failures_and_continues() {
        let recorder = Recorder {
            fail_removes: true,
            ..Recorder::default()
        };
        let tasks = vec![
            PersistenceTask::Remove("gone".to_string()),
            PersistenceTask::Add(Comment::with_id("b", "y", 0, 1)),
        ];

        let report = flush_tasks(tasks, &recorder).await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].task,
            PersistenceTask::Remove("gone".to_string())
        );
        assert_eq!(*recorder.calls.borrow(), vec!["remove gone", "add b"]);
    }
}
