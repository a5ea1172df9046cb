//! Inline AI completion.
//!
//! [`InlineCompletion`] is a synchronous state machine
//! (`Idle -> Debouncing -> Awaiting -> Suggesting`). The async half lives in
//! [`fetch_completion`], which runs one [`CompletionRequest`] against a
//! [`CompletionBackend`] and races it against the request's cancellation
//! signal and timeout. Suggestions never touch the document until accepted.

pub mod backend;
pub mod context;
pub mod engine;
pub mod history;
pub mod keys;

pub use backend::{
    CompletionBackend, CompletionError, CompletionRequest, CompletionResponse, fetch_completion,
};
pub use context::{CompletionContext, StructuralPosition, build_context};
pub use engine::{CompletionState, InlineCompletion, KeyOutcome, Suggestion, strip_typed_context};
pub use history::{EditHistory, EditHistoryEntry, EditOperation, entries_for_transaction};
pub use keys::{Key, KeyPress, Modifiers};
