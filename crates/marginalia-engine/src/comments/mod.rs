//! Comments anchored to document ranges.
//!
//! The manager owns one editor's comment list, keeps every anchor valid as
//! transactions arrive, and queues persistence work instead of performing
//! it, so the mutation path stays synchronous.

pub mod click;
pub mod comment;
pub mod persistence;

pub use click::{CommentClick, ElementAttributes, resolve_click};
pub use comment::{Comment, remap_anchor};
pub use persistence::{
    CommentPersistence, FlushFailure, FlushReport, PersistenceError, PersistenceQueue,
    PersistenceTask, flush_tasks,
};

use crate::decorations::Decoration;
use crate::editing::Transaction;
use crate::error::EngineError;

#[derive(Debug, Default)]
pub struct CommentManager {
    comments: Vec<Comment>,
}

impl CommentManager {
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Append a comment and queue its persistence.
    ///
    /// A clashing id (two comments created in the same millisecond) gets a
    /// numeric suffix.
    pub fn add(
        &mut self,
        mut comment: Comment,
        doc_size: usize,
        queue: &mut PersistenceQueue,
    ) -> Result<Comment, EngineError> {
        if comment.from > comment.to || comment.to > doc_size {
            return Err(EngineError::InvalidCommentRange {
                from: comment.from,
                to: comment.to,
                size: doc_size,
            });
        }
        if self.get(&comment.id).is_some() {
            let base = comment.id.clone();
            let mut suffix = 1;
            while self.get(&comment.id).is_some() {
                comment.id = format!("{base}-{suffix}");
                suffix += 1;
            }
        }
        self.comments.push(comment.clone());
        queue.push(PersistenceTask::Add(comment.clone()));
        Ok(comment)
    }

    pub fn remove(&mut self, id: &str, queue: &mut PersistenceQueue) -> Option<Comment> {
        let index = self.comments.iter().position(|c| c.id == id)?;
        let removed = self.comments.remove(index);
        queue.push(PersistenceTask::Remove(removed.id.clone()));
        Some(removed)
    }

    /// Replace the whole list, e.g. when hydrating a freshly loaded document.
    /// Anchors outside the document are clamped.
    pub fn init_all(&mut self, comments: Vec<Comment>, doc_size: usize) {
        self.comments = comments
            .into_iter()
            .map(|mut comment| {
                let from = comment.from.min(doc_size);
                let to = comment.to.min(doc_size).max(from);
                if (from, to) != (comment.from, comment.to) {
                    log::warn!(
                        "clamping comment {} from {}..{} to {from}..{to}",
                        comment.id,
                        comment.from,
                        comment.to
                    );
                    comment.from = from;
                    comment.to = to;
                }
                comment
            })
            .collect();
    }

    /// Remap every anchor through a document-changing transaction.
    ///
    /// Returns the comments that moved; each is queued as an update, and the
    /// whole set is queued once more as a single batch.
    pub fn apply_transaction(
        &mut self,
        tr: &Transaction,
        queue: &mut PersistenceQueue,
    ) -> Vec<Comment> {
        if !tr.doc_changed() || tr.mapping().is_identity() {
            return Vec::new();
        }
        let doc_size = tr.doc().content_size();
        let mut changed = Vec::new();
        for comment in &mut self.comments {
            let (from, to) = remap_anchor(comment.from, comment.to, tr.mapping(), doc_size);
            if (from, to) != (comment.from, comment.to) {
                comment.from = from;
                comment.to = to;
                queue.push(PersistenceTask::Update(comment.clone()));
                changed.push(comment.clone());
            }
        }
        if !changed.is_empty() {
            queue.push(PersistenceTask::BatchUpdate(changed.clone()));
        }
        changed
    }

    /// Inline highlights for all non-empty anchors
    pub fn decorations(&self) -> Vec<Decoration> {
        self.comments
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| Decoration::comment(&c.id, c.reference.as_deref(), c.from, c.to))
            .collect()
    }

    pub fn clear(&mut self) {
        self.comments.clear();
    }
}
