//! Position tracking for block nodes.
//!
//! After every document-changing transaction the tracker walks the whole
//! document and records, on each node of a tracked type, its current span
//! (`pos_start..pos_end`), its top-level line number and a stable id. Only
//! nodes whose recorded attributes are stale produce corrections, and all
//! corrections are applied as one follow-up transaction carrying a private
//! marker so that transaction is never walked again.

pub mod line_numbers;

use std::collections::{BTreeSet, HashSet};

use marginalia_config::TrackerConfig;
use serde::Serialize;

use crate::editing::{Document, NodeAttrs, NodeId, NodeType, Transaction};
use crate::error::EngineError;

pub use line_numbers::line_number_at;

/// Annotated view of one tracked node
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedNode {
    pub id: Option<NodeId>,
    pub node_type: NodeType,
    pub pos_start: usize,
    pub pos_end: usize,
    pub line_number: Option<usize>,
}

/// Attribute update staged for the node starting at `pos`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Correction {
    pub pos: usize,
    pub attrs: NodeAttrs,
}

pub type PositionsObserver = Box<dyn FnMut(&[TrackedNode])>;

pub struct PositionTracker {
    tracked: BTreeSet<NodeType>,
    generate_ids: bool,
    line_numbers: bool,
    observer: Option<PositionsObserver>,
}

impl std::fmt::Debug for PositionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionTracker")
            .field("tracked", &self.tracked)
            .field("generate_ids", &self.generate_ids)
            .field("line_numbers", &self.line_numbers)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl PositionTracker {
    /// Build a tracker from configuration.
    ///
    /// Unknown type names, `text` and `doc` are configuration mistakes and are
    /// rejected here rather than ignored at runtime.
    pub fn new(config: &TrackerConfig) -> Result<Self, EngineError> {
        let mut tracked = BTreeSet::new();
        for name in &config.tracked_types {
            let kind: NodeType = name.parse()?;
            if kind.is_text() || kind == NodeType::Doc {
                return Err(EngineError::UntrackableNodeType(kind));
            }
            tracked.insert(kind);
        }
        Ok(Self {
            tracked,
            generate_ids: config.generate_ids,
            line_numbers: config.line_numbers,
            observer: None,
        })
    }

    /// Register a callback receiving the annotated snapshot after every
    /// reconciliation
    pub fn set_observer(&mut self, observer: PositionsObserver) {
        self.observer = Some(observer);
    }

    pub fn is_tracked(&self, kind: NodeType) -> bool {
        self.tracked.contains(&kind)
    }

    /// Compute the attribute corrections needed for `doc`.
    ///
    /// Always a full walk: a text edit shifts every following sibling, so
    /// there is no cheaper correct answer.
    pub fn reconcile(&self, doc: &Document) -> Vec<Correction> {
        let mut corrections = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut line = 0;

        doc.descendants(|node, pos, depth| {
            if depth == 0 {
                line += 1;
            }
            if node.is_text() || !self.is_tracked(node.kind()) {
                return true;
            }

            let mut attrs = node.attrs().clone();
            attrs.pos_start = Some(pos);
            attrs.pos_end = Some(pos + node.node_size());
            if self.line_numbers {
                attrs.line_number = Some(line);
            }
            if self.generate_ids {
                match attrs.id {
                    Some(id) if seen_ids.insert(id) => {}
                    Some(duplicate) => {
                        log::debug!("regenerating duplicated node id {duplicate} at {pos}");
                        attrs.id = Some(fresh_id(&mut seen_ids));
                    }
                    None => attrs.id = Some(fresh_id(&mut seen_ids)),
                }
            }

            if &attrs != node.attrs() {
                corrections.push(Correction { pos, attrs });
            }
            true
        });

        corrections
    }

    /// Follow-up transaction for a batch of just-applied transactions.
    ///
    /// Returns `None` when nothing requires a walk (no document change, or
    /// only the tracker's own corrections) or when the walk found nothing
    /// to correct.
    pub fn append_transaction(
        &mut self,
        transactions: &[Transaction],
        doc: &Document,
    ) -> Option<Transaction> {
        let needs_walk = transactions.iter().any(|tr| {
            !tr.is_tracker_pass() && (tr.doc_changed() || tr.meta().force_reconcile)
        });
        if !needs_walk {
            return None;
        }

        let corrections = self.reconcile(doc);
        let appended = if corrections.is_empty() {
            None
        } else {
            let mut tr = Transaction::new(doc);
            for correction in corrections {
                // Corrections come from a walk of this very document, so a
                // failure means the node vanished; it is skipped.
                if let Err(err) = tr.set_node_attrs(correction.pos, correction.attrs) {
                    log::debug!("skipping position correction: {err}");
                }
            }
            tr.mark_tracker_pass();
            log::debug!("tracker corrected {} node(s)", tr.steps().len());
            Some(tr)
        };

        if let Some(observer) = self.observer.as_mut() {
            let current = appended.as_ref().map_or(doc, Transaction::doc);
            let snapshot = snapshot_of(&self.tracked, current);
            observer(&snapshot);
        }

        appended
    }

    /// Tracked nodes of `doc` with their recorded identity and live span
    pub fn snapshot(&self, doc: &Document) -> Vec<TrackedNode> {
        snapshot_of(&self.tracked, doc)
    }
}

fn fresh_id(seen: &mut HashSet<NodeId>) -> NodeId {
    loop {
        let id = NodeId::generate();
        if seen.insert(id) {
            return id;
        }
    }
}

fn snapshot_of(tracked: &BTreeSet<NodeType>, doc: &Document) -> Vec<TrackedNode> {
    let mut nodes = Vec::new();
    doc.descendants(|node, pos, _| {
        if tracked.contains(&node.kind()) {
            nodes.push(TrackedNode {
                id: node.id(),
                node_type: node.kind(),
                pos_start: pos,
                pos_end: pos + node.node_size(),
                line_number: node.attrs().line_number,
            });
        }
        true
    });
    nodes
}
