use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::editing::{Step, Transaction};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOperation {
    Insert,
    Delete,
    Replace,
}

/// One user edit as sent to the completion backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHistoryEntry {
    pub timestamp_ms: u64,
    /// Inserted text, or the removed text for deletions
    pub text: String,
    pub position: usize,
    pub operation: EditOperation,
}

/// Bounded ring buffer of recent edits, oldest first
#[derive(Clone, Debug)]
pub struct EditHistory {
    entries: VecDeque<EditHistoryEntry>,
    capacity: usize,
}

impl EditHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, entry: EditHistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record every content step of a transaction
    pub fn record_transaction(&mut self, tr: &Transaction, timestamp_ms: u64) {
        for entry in entries_for_transaction(tr, timestamp_ms) {
            self.record(entry);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &EditHistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Describe each content-changing step of `tr` as a history entry
pub fn entries_for_transaction(tr: &Transaction, timestamp_ms: u64) -> Vec<EditHistoryEntry> {
    tr.steps_with_docs()
        .filter_map(|(step, before)| {
            let (text, position, operation) = match step {
                Step::ReplaceText { from, to, text } => {
                    if from == to {
                        (text.clone(), *from, EditOperation::Insert)
                    } else if text.is_empty() {
                        (before.text_between(*from, *to, "\n"), *from, EditOperation::Delete)
                    } else {
                        (text.clone(), *from, EditOperation::Replace)
                    }
                }
                Step::InsertNode { at, node } => (node.text_content(), *at, EditOperation::Insert),
                Step::DeleteNode { at } => {
                    let removed = before.node_at(*at).map(|n| n.text_content())?;
                    (removed, *at, EditOperation::Delete)
                }
                Step::SplitBlock { at } => ("\n".to_string(), *at, EditOperation::Insert),
                Step::SetNodeAttrs { .. } => return None,
            };
            Some(EditHistoryEntry {
                timestamp_ms,
                text,
                position,
                operation,
            })
        })
        .collect()
}
