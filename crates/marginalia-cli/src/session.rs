use std::path::Path;

use anyhow::{Context, Result, bail};
use marginalia_engine::Command;
use marginalia_engine::comments::Comment;
use marginalia_engine::completion::{Key, Modifiers};
use marginalia_engine::editing::{Document, Node, NodeType};
use serde::Deserialize;

/// A scripted editing session
#[derive(Debug, Deserialize)]
pub struct Session {
    #[serde(default = "default_document_id")]
    pub document_id: String,
    pub blocks: Vec<BlockSpec>,
    /// Comments the persistence backend hands back on load
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Completion replies, consumed in order
    #[serde(default)]
    pub replies: Vec<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

fn default_document_id() -> String {
    "session".to_string()
}

#[derive(Debug, Deserialize)]
pub struct BlockSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    pub level: Option<u8>,
    /// List item texts for `bullet_list` / `ordered_list`
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Type at the cursor
    Type { text: String },
    Cursor { pos: usize },
    Key {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Ctrl+Right: take the next word of the suggestion
    AcceptWord,
    /// Split the block at the cursor
    Enter,
    /// Edit that does not come from typing, e.g. a collaborator's change
    Insert { at: usize, text: String },
    Delete { from: usize, to: usize },
    /// Let the debounce timer fire and wait for the completion reply
    Wait,
    Click { comment_id: String },
    Run { command: Command },
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid session file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn document(&self) -> Result<Document> {
        let blocks = self
            .blocks
            .iter()
            .map(BlockSpec::to_node)
            .collect::<Result<Vec<_>>>()?;
        Ok(Document::new(blocks))
    }
}

impl BlockSpec {
    fn to_node(&self) -> Result<Node> {
        let kind: NodeType = self.kind.parse()?;
        let node = match kind {
            NodeType::Paragraph => Node::paragraph(&self.text),
            NodeType::Heading => Node::heading(self.level.unwrap_or(1), &self.text),
            NodeType::CodeBlock => Node::block(NodeType::CodeBlock, vec![Node::text(&self.text)]),
            NodeType::BulletList | NodeType::OrderedList => Node::block(
                kind,
                self.items.iter().map(|item| Node::list_item(item)).collect(),
            ),
            NodeType::Blockquote => Node::block(kind, vec![Node::paragraph(&self.text)]),
            NodeType::HorizontalRule => Node::leaf(kind),
            other => bail!("{other} cannot be used as a top-level block"),
        };
        Ok(node)
    }
}
