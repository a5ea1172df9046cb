use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Node types known to the document schema
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Doc,
    Paragraph,
    Heading,
    Blockquote,
    BulletList,
    OrderedList,
    ListItem,
    CodeBlock,
    HorizontalRule,
    HardBreak,
    Image,
    Text,
}

impl NodeType {
    pub const ALL: [NodeType; 12] = [
        NodeType::Doc,
        NodeType::Paragraph,
        NodeType::Heading,
        NodeType::Blockquote,
        NodeType::BulletList,
        NodeType::OrderedList,
        NodeType::ListItem,
        NodeType::CodeBlock,
        NodeType::HorizontalRule,
        NodeType::HardBreak,
        NodeType::Image,
        NodeType::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Doc => "doc",
            NodeType::Paragraph => "paragraph",
            NodeType::Heading => "heading",
            NodeType::Blockquote => "blockquote",
            NodeType::BulletList => "bullet_list",
            NodeType::OrderedList => "ordered_list",
            NodeType::ListItem => "list_item",
            NodeType::CodeBlock => "code_block",
            NodeType::HorizontalRule => "horizontal_rule",
            NodeType::HardBreak => "hard_break",
            NodeType::Image => "image",
            NodeType::Text => "text",
        }
    }

    pub fn is_text(self) -> bool {
        self == NodeType::Text
    }

    /// Atomic non-text nodes with a size of one
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeType::HorizontalRule | NodeType::HardBreak | NodeType::Image
        )
    }

    /// Blocks whose content is inline (text, hard breaks, images)
    pub fn is_textblock(self) -> bool {
        matches!(
            self,
            NodeType::Paragraph | NodeType::Heading | NodeType::CodeBlock
        )
    }

    pub fn is_inline(self) -> bool {
        matches!(self, NodeType::Text | NodeType::HardBreak | NodeType::Image)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for NodeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| EngineError::UnknownNodeType(s.to_string()))
    }
}

/// Stable identity of a tracked node
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn generate() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Attributes carried by every non-text node
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttrs {
    pub id: Option<NodeId>,
    pub pos_start: Option<usize>,
    pub pos_end: Option<usize>,
    pub line_number: Option<usize>,
    /// Heading level
    pub level: Option<u8>,
}

/// A node in the document tree
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) kind: NodeType,
    pub(crate) attrs: NodeAttrs,
    pub(crate) content: Vec<Node>,
    pub(crate) text: String,
}

impl Node {
    /// A text run; empty text is allowed here but dropped when placed in a block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeType::Text,
            attrs: NodeAttrs::default(),
            content: Vec::new(),
            text: text.into(),
        }
    }

    /// A container node with the given children
    pub fn block(kind: NodeType, content: Vec<Node>) -> Self {
        let content = if kind.is_textblock() {
            normalize_inline(content)
        } else {
            content
        };
        Self {
            kind,
            attrs: NodeAttrs::default(),
            content,
            text: String::new(),
        }
    }

    pub fn leaf(kind: NodeType) -> Self {
        Self {
            kind,
            attrs: NodeAttrs::default(),
            content: Vec::new(),
            text: String::new(),
        }
    }

    pub fn paragraph(text: &str) -> Self {
        Self::block(NodeType::Paragraph, vec![Node::text(text)])
    }

    pub fn heading(level: u8, text: &str) -> Self {
        let mut node = Self::block(NodeType::Heading, vec![Node::text(text)]);
        node.attrs.level = Some(level);
        node
    }

    pub fn list_item(text: &str) -> Self {
        Self::block(NodeType::ListItem, vec![Node::paragraph(text)])
    }

    pub fn with_attrs(mut self, attrs: NodeAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.attrs.id = Some(id);
        self
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    pub fn id(&self) -> Option<NodeId> {
        self.attrs.id
    }

    pub fn is_text(&self) -> bool {
        self.kind.is_text()
    }

    pub fn is_textblock(&self) -> bool {
        self.kind.is_textblock()
    }

    /// Text of a text node, empty for anything else
    pub fn text_str(&self) -> &str {
        &self.text
    }

    pub fn content_size(&self) -> usize {
        self.content.iter().map(Node::node_size).sum()
    }

    /// Size of the node in flattened document positions
    pub fn node_size(&self) -> usize {
        if self.kind.is_text() {
            self.text.chars().count()
        } else if self.kind.is_leaf() {
            1
        } else {
            self.content_size() + 2
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        if self.kind.is_text() {
            return self.text.clone();
        }
        let mut out = String::new();
        for child in &self.content {
            out.push_str(&child.text_content());
        }
        out
    }
}

/// Merge adjacent text nodes and drop empty ones
pub(crate) fn normalize_inline(content: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(content.len());
    for node in content {
        if node.is_text() {
            if node.text.is_empty() {
                continue;
            }
            if let Some(last) = out.last_mut()
                && last.is_text()
            {
                last.text.push_str(&node.text);
                continue;
            }
        }
        out.push(node);
    }
    out
}

/// Inline children covering content offsets `from..to`, splitting text runs
pub(crate) fn slice_inline(content: &[Node], from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut pos = 0;
    for child in content {
        let size = child.node_size();
        let end = pos + size;
        if end > from && pos < to {
            if child.is_text() {
                let start = from.saturating_sub(pos);
                let stop = to.min(end) - pos;
                let text: String = child.text.chars().skip(start).take(stop - start).collect();
                out.push(Node::text(text));
            } else if pos >= from && end <= to {
                out.push(child.clone());
            }
        }
        pos = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("paragraph", NodeType::Paragraph)]
    #[case("list_item", NodeType::ListItem)]
    #[case("hard_break", NodeType::HardBreak)]
    fn test_node_type_from_name(#[case] name: &str, #[case] expected: NodeType) {
        assert_eq!(name.parse::<NodeType>().unwrap(), expected);
        assert_eq!(expected.to_string(), name);
    }

    #[test]
    fn test_unknown_node_type_is_rejected() {
        let err = "sidebar".parse::<NodeType>().unwrap_err();
        assert_eq!(err, EngineError::UnknownNodeType("sidebar".to_string()));
    }

    #[test]
    fn test_node_sizes() {
        assert_eq!(Node::text("héllo").node_size(), 5);
        assert_eq!(Node::leaf(NodeType::HardBreak).node_size(), 1);
        assert_eq!(Node::paragraph("").node_size(), 2);
        assert_eq!(Node::paragraph("abc").node_size(), 5);
        // list_item > paragraph > text
        assert_eq!(Node::list_item("abc").node_size(), 7);
    }

    #[test]
    fn test_block_normalizes_inline_content() {
        let node = Node::block(
            NodeType::Paragraph,
            vec![Node::text("ab"), Node::text(""), Node::text("cd")],
        );
        assert_eq!(node.content().len(), 1);
        assert_eq!(node.text_content(), "abcd");
    }

    #[test]
    fn test_slice_inline_splits_text_and_keeps_leaves() {
        let content = vec![
            Node::text("abc"),
            Node::leaf(NodeType::HardBreak),
            Node::text("def"),
        ];
        let slice = slice_inline(&content, 1, 5);
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].text_str(), "bc");
        assert_eq!(slice[1].kind(), NodeType::HardBreak);
        assert_eq!(slice[2].text_str(), "d");
    }
}
