use thiserror::Error;

use crate::editing::NodeType;

/// Errors raised synchronously by the engine.
///
/// These describe misuse by the hosting code (bad configuration, steps that
/// do not fit the document). I/O failures never surface here; they are
/// handled at the boundary that started the async work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node type {0} cannot be tracked")]
    UntrackableNodeType(NodeType),

    #[error("Position {pos} is outside the document (size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("Invalid step at {pos}: {reason}")]
    InvalidStep { pos: usize, reason: &'static str },

    #[error("Invalid comment range {from}..{to} (document size {size})")]
    InvalidCommentRange { from: usize, to: usize, size: usize },

    #[error("Transaction was built against an outdated document")]
    StaleTransaction,

    #[error("Editor has been destroyed")]
    Destroyed,
}
