pub mod commands;
pub mod comments;
pub mod completion;
pub mod decorations;
pub mod editing;
pub mod editor;
pub mod error;
pub mod tracking;

// Re-export key types for easier usage
pub use commands::Command;
pub use comments::{Comment, CommentManager, CommentPersistence, PersistenceTask};
pub use completion::{CompletionBackend, CompletionError, CompletionResponse, InlineCompletion};
pub use decorations::*;
pub use editing::*;
pub use editor::*;
pub use error::EngineError;
pub use tracking::{PositionTracker, TrackedNode};
