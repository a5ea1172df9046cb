use crate::editing::{Node, NodeType};

/// Location of a textblock and the flat range of its inline content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextblockPos {
    /// Child indices from the root down to the textblock
    pub path: Vec<usize>,
    /// Position directly before the textblock
    pub start: usize,
    pub content_start: usize,
    pub content_end: usize,
}

/// Immutable document tree owned by the host editor
///
/// Positions follow the usual flat-offset convention of tree editors: every
/// non-leaf node contributes an opening and a closing token around its
/// content, leaves contribute one token, and each character of text one
/// token. Position 0 is directly before the first top-level block.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub(crate) root: Node,
}

impl Document {
    pub fn new(blocks: Vec<Node>) -> Self {
        Self {
            root: Node::block(NodeType::Doc, blocks),
        }
    }

    /// A document holding a single empty paragraph
    pub fn empty() -> Self {
        Self::new(vec![Node::paragraph("")])
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn content_size(&self) -> usize {
        self.root.content_size()
    }

    pub fn top_level_blocks(&self) -> &[Node] {
        &self.root.content
    }

    /// Visit every descendant in document order with its start position and
    /// depth (top-level blocks have depth 0). Returning `false` skips the
    /// node's children.
    pub fn descendants<F>(&self, mut f: F)
    where
        F: FnMut(&Node, usize, usize) -> bool,
    {
        walk_descendants(&self.root, 0, 0, &mut f);
    }

    /// Visit the nodes overlapping `from..to`
    pub fn nodes_between<F>(&self, from: usize, to: usize, mut f: F)
    where
        F: FnMut(&Node, usize) -> bool,
    {
        walk_between(&self.root, from, to, 0, &mut f);
    }

    /// The node starting at `pos`, or the text node containing it
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let path = self.node_path_at(pos)?;
        self.node_at_path(&path)
    }

    pub(crate) fn node_path_at(&self, pos: usize) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut node = &self.root;
        let mut pos = pos;
        loop {
            let (index, offset) = find_index(node, pos)?;
            let child = node.content.get(index)?;
            path.push(index);
            if offset == pos || child.is_text() {
                return Some(path);
            }
            node = child;
            pos -= offset + 1;
        }
    }

    pub(crate) fn node_at_path(&self, path: &[usize]) -> Option<&Node> {
        let mut node = &self.root;
        for &index in path {
            node = node.content.get(index)?;
        }
        Some(node)
    }

    pub(crate) fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for &index in path {
            node = node.content.get_mut(index)?;
        }
        Some(node)
    }

    /// The innermost textblock whose inline content range contains `pos`
    pub fn textblock_at(&self, pos: usize) -> Option<TextblockPos> {
        let mut path = Vec::new();
        let mut node = &self.root;
        let mut content_start = 0;
        'descend: loop {
            let mut child_pos = content_start;
            for (index, child) in node.content.iter().enumerate() {
                let size = child.node_size();
                let end = child_pos + size;
                if child.is_textblock() && child_pos < pos && pos < end {
                    path.push(index);
                    return Some(TextblockPos {
                        path,
                        start: child_pos,
                        content_start: child_pos + 1,
                        content_end: end - 1,
                    });
                }
                if !child.is_text() && !child.kind.is_leaf() && child_pos < pos && pos < end {
                    path.push(index);
                    node = child;
                    content_start = child_pos + 1;
                    continue 'descend;
                }
                child_pos = end;
            }
            return None;
        }
    }

    /// Container path and child index for a position that sits between two
    /// children (or at either end of a container's content)
    pub(crate) fn child_boundary(&self, at: usize) -> Option<(Vec<usize>, usize)> {
        let mut path = Vec::new();
        let mut node = &self.root;
        let mut content_start = 0;
        'descend: loop {
            let mut pos = content_start;
            for (index, child) in node.content.iter().enumerate() {
                if pos == at {
                    return Some((path, index));
                }
                let end = pos + child.node_size();
                if at < end {
                    if child.is_text() || child.kind.is_leaf() {
                        return None;
                    }
                    path.push(index);
                    node = child;
                    content_start = pos + 1;
                    continue 'descend;
                }
                pos = end;
            }
            return (pos == at).then_some((path, node.content.len()));
        }
    }

    /// Text between two positions, with `block_separator` between textblocks
    /// and a newline for each hard break
    pub fn text_between(&self, from: usize, to: usize, block_separator: &str) -> String {
        let mut text = String::new();
        let mut first_block = true;
        self.nodes_between(from, to, |node, pos| {
            if node.is_text() {
                let start = from.saturating_sub(pos);
                let end = to.min(pos + node.node_size()) - pos;
                text.extend(node.text.chars().skip(start).take(end.saturating_sub(start)));
            } else if node.kind == NodeType::HardBreak {
                text.push('\n');
            } else if node.is_textblock() {
                if !first_block {
                    text.push_str(block_separator);
                }
                first_block = false;
            }
            true
        });
        text
    }

    pub fn text_content(&self) -> String {
        self.text_between(0, self.content_size(), "\n")
    }
}

fn walk_descendants<F>(node: &Node, content_start: usize, depth: usize, f: &mut F)
where
    F: FnMut(&Node, usize, usize) -> bool,
{
    let mut pos = content_start;
    for child in &node.content {
        if f(child, pos, depth) && !child.content.is_empty() {
            walk_descendants(child, pos + 1, depth + 1, f);
        }
        pos += child.node_size();
    }
}

fn walk_between<F>(node: &Node, from: usize, to: usize, content_start: usize, f: &mut F)
where
    F: FnMut(&Node, usize) -> bool,
{
    let mut pos = content_start;
    for child in &node.content {
        if pos >= to {
            break;
        }
        let end = pos + child.node_size();
        if end > from && f(child, pos) && !child.content.is_empty() {
            walk_between(child, from, to, pos + 1, f);
        }
        pos = end;
    }
}

/// Index of the child containing content offset `pos`, with that child's offset
fn find_index(node: &Node, pos: usize) -> Option<(usize, usize)> {
    let mut offset = 0;
    for (index, child) in node.content.iter().enumerate() {
        let end = offset + child.node_size();
        if pos < end {
            return Some((index, offset));
        }
        offset = end;
    }
    None
}
