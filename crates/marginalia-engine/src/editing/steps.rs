use crate::editing::node::{normalize_inline, slice_inline};
use crate::editing::{Document, Node, NodeAttrs, StepMap};
use crate::error::EngineError;

/// Atomic document edits
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace `from..to` inside one textblock with plain text
    ReplaceText {
        from: usize,
        to: usize,
        text: String,
    },
    /// Insert a block node at a child boundary
    InsertNode { at: usize, node: Node },
    /// Delete the node starting at `at`
    DeleteNode { at: usize },
    /// Split the textblock containing `at` into two
    SplitBlock { at: usize },
    /// Replace the attributes of the node starting at `pos`
    SetNodeAttrs { pos: usize, attrs: NodeAttrs },
}

impl Step {
    /// Apply the step, producing the new document and its position map
    pub fn apply(&self, doc: &Document) -> Result<(Document, StepMap), EngineError> {
        match self {
            Step::ReplaceText { from, to, text } => replace_text(doc, *from, *to, text),
            Step::InsertNode { at, node } => insert_node(doc, *at, node),
            Step::DeleteNode { at } => delete_node(doc, *at),
            Step::SplitBlock { at } => split_block(doc, *at),
            Step::SetNodeAttrs { pos, attrs } => set_node_attrs(doc, *pos, attrs),
        }
    }

    /// Whether the step changes content rather than only attributes
    pub fn changes_content(&self) -> bool {
        !matches!(self, Step::SetNodeAttrs { .. })
    }
}

fn check_in_range(doc: &Document, pos: usize) -> Result<(), EngineError> {
    let size = doc.content_size();
    if pos > size {
        return Err(EngineError::PositionOutOfRange { pos, size });
    }
    Ok(())
}

fn replace_text(
    doc: &Document,
    from: usize,
    to: usize,
    text: &str,
) -> Result<(Document, StepMap), EngineError> {
    check_in_range(doc, to)?;
    if from > to {
        return Err(EngineError::InvalidStep {
            pos: from,
            reason: "range start is after its end",
        });
    }
    let block = doc.textblock_at(from).ok_or(EngineError::InvalidStep {
        pos: from,
        reason: "position is not inside a textblock",
    })?;
    if to > block.content_end {
        return Err(EngineError::InvalidStep {
            pos: to,
            reason: "range crosses a block boundary",
        });
    }

    let mut next = doc.clone();
    let node = next
        .node_at_path_mut(&block.path)
        .ok_or(EngineError::InvalidStep {
            pos: from,
            reason: "textblock could not be resolved",
        })?;
    let start = from - block.content_start;
    let end = to - block.content_start;
    let size = node.content_size();
    let mut content = slice_inline(&node.content, 0, start);
    content.push(Node::text(text));
    content.extend(slice_inline(&node.content, end, size));
    node.content = normalize_inline(content);

    let map = StepMap::replace(from, to - from, text.chars().count());
    Ok((next, map))
}

fn insert_node(doc: &Document, at: usize, node: &Node) -> Result<(Document, StepMap), EngineError> {
    check_in_range(doc, at)?;
    if node.kind().is_inline() {
        return Err(EngineError::InvalidStep {
            pos: at,
            reason: "only block nodes can be inserted as nodes",
        });
    }
    let (path, index) = doc.child_boundary(at).ok_or(EngineError::InvalidStep {
        pos: at,
        reason: "position is not between two nodes",
    })?;

    let mut next = doc.clone();
    let container = next
        .node_at_path_mut(&path)
        .ok_or(EngineError::InvalidStep {
            pos: at,
            reason: "container could not be resolved",
        })?;
    if container.is_textblock() {
        return Err(EngineError::InvalidStep {
            pos: at,
            reason: "block nodes cannot be inserted into a textblock",
        });
    }
    container.content.insert(index, node.clone());

    let map = StepMap::replace(at, 0, node.node_size());
    Ok((next, map))
}

fn delete_node(doc: &Document, at: usize) -> Result<(Document, StepMap), EngineError> {
    check_in_range(doc, at)?;
    let (path, index) = doc.child_boundary(at).ok_or(EngineError::InvalidStep {
        pos: at,
        reason: "no node starts at this position",
    })?;

    let mut next = doc.clone();
    let container = next
        .node_at_path_mut(&path)
        .ok_or(EngineError::InvalidStep {
            pos: at,
            reason: "container could not be resolved",
        })?;
    if index >= container.content.len() {
        return Err(EngineError::InvalidStep {
            pos: at,
            reason: "no node starts at this position",
        });
    }
    let removed = container.content.remove(index);
    if container.is_textblock() {
        container.content = normalize_inline(std::mem::take(&mut container.content));
    }

    let map = StepMap::replace(at, removed.node_size(), 0);
    Ok((next, map))
}

fn split_block(doc: &Document, at: usize) -> Result<(Document, StepMap), EngineError> {
    check_in_range(doc, at)?;
    let block = doc.textblock_at(at).ok_or(EngineError::InvalidStep {
        pos: at,
        reason: "position is not inside a textblock",
    })?;
    let Some((&index, parent_path)) = block.path.split_last() else {
        return Err(EngineError::InvalidStep {
            pos: at,
            reason: "textblock has no parent",
        });
    };

    let mut next = doc.clone();
    let parent = next
        .node_at_path_mut(parent_path)
        .ok_or(EngineError::InvalidStep {
            pos: at,
            reason: "textblock could not be resolved",
        })?;
    let original = &parent.content[index];
    let offset = at - block.content_start;
    let size = original.content_size();

    // Both halves keep the original attributes; the position tracker
    // regenerates the duplicated id.
    let mut head = original.clone();
    head.content = normalize_inline(slice_inline(&original.content, 0, offset));
    let mut tail = original.clone();
    tail.content = normalize_inline(slice_inline(&original.content, offset, size));

    parent.content[index] = head;
    parent.content.insert(index + 1, tail);

    Ok((next, StepMap::replace(at, 0, 2)))
}

fn set_node_attrs(
    doc: &Document,
    pos: usize,
    attrs: &NodeAttrs,
) -> Result<(Document, StepMap), EngineError> {
    check_in_range(doc, pos)?;
    let path = doc.node_path_at(pos).ok_or(EngineError::InvalidStep {
        pos,
        reason: "no node starts at this position",
    })?;

    let mut next = doc.clone();
    let node = next
        .node_at_path_mut(&path)
        .ok_or(EngineError::InvalidStep {
            pos,
            reason: "no node starts at this position",
        })?;
    if node.is_text() {
        return Err(EngineError::InvalidStep {
            pos,
            reason: "text nodes carry no attributes",
        });
    }
    node.attrs = attrs.clone();

    Ok((next, StepMap::identity()))
}
