use std::time::{SystemTime, UNIX_EPOCH};

use marginalia_config::Config;
use tokio::time::Instant;

use crate::commands::Command;
use crate::comments::{
    Comment, CommentClick, CommentManager, CommentPersistence, ElementAttributes, FlushReport,
    PersistenceError, PersistenceQueue, PersistenceTask, flush_tasks, resolve_click,
};
use crate::completion::{
    CompletionBackend, CompletionError, CompletionRequest, CompletionResponse, CompletionState,
    InlineCompletion, KeyOutcome, KeyPress, Suggestion, fetch_completion,
};
use crate::decorations::Decoration;
use crate::editing::{Assoc, Document, Transaction};
use crate::error::EngineError;
use crate::tracking::{PositionTracker, PositionsObserver, TrackedNode, line_number_at};

pub type CommentClickHandler = Box<dyn FnMut(&CommentClick)>;

/// What a dispatched transaction did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub doc_changed: bool,
    /// Comment highlights need repainting
    pub comments_changed: bool,
    /// Number of nodes the tracker corrected afterwards
    pub corrections: usize,
    /// Comments whose anchors moved
    pub updated_comments: Vec<Comment>,
    pub version: u64,
}

/// One editor instance: document, cursor and every piece of per-instance
/// state (tracked positions, comments, completion, pending persistence).
///
/// Nothing here is shared between instances.
pub struct Editor {
    doc: Document,
    cursor: usize,
    version: u64,
    tracker: PositionTracker,
    comments: CommentManager,
    completion: InlineCompletion,
    persistence: PersistenceQueue,
    on_comment_click: Option<CommentClickHandler>,
    destroyed: bool,
}

impl Editor {
    /// Create an editor and run the initial reconciliation, so every
    /// tracked node carries its span and id from the start.
    pub fn new(doc: Document, config: &Config) -> Result<Self, EngineError> {
        let tracker = PositionTracker::new(&config.tracker)?;
        let cursor = first_text_position(&doc);
        let mut editor = Self {
            doc,
            cursor,
            version: 0,
            tracker,
            comments: CommentManager::default(),
            completion: InlineCompletion::new(config.completion.clone()),
            persistence: PersistenceQueue::default(),
            on_comment_click: None,
            destroyed: false,
        };
        editor.update_positions()?;
        Ok(editor)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 1-based top-level block the cursor is in
    pub fn cursor_line(&self) -> Option<usize> {
        line_number_at(&self.doc, self.cursor)
    }

    /// Bumped whenever the document or its tracked attributes change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments.comments()
    }

    pub fn tracked_nodes(&self) -> Vec<TrackedNode> {
        self.tracker.snapshot(&self.doc)
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.completion.suggestion()
    }

    pub fn completion_state(&self) -> &CompletionState {
        self.completion.state()
    }

    pub fn completion(&self) -> &InlineCompletion {
        &self.completion
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn set_positions_observer(&mut self, observer: PositionsObserver) {
        self.tracker.set_observer(observer);
    }

    pub fn set_on_comment_click(&mut self, handler: CommentClickHandler) {
        self.on_comment_click = Some(handler);
    }

    /// Start a transaction against the current document
    pub fn transaction(&self) -> Transaction {
        Transaction::new(&self.doc)
    }

    /// Apply a transaction and everything that follows from it.
    ///
    /// ## Process
    ///
    /// 1. The transaction's document becomes current
    /// 2. Comment anchors and the cursor are mapped through it. A user edit
    ///    drops any visible suggestion or pending request and is recorded in
    ///    the edit history; other transactions carry the completion anchor
    ///    along
    /// 3. The tracker reconciles positions; its correction transaction (if
    ///    any) is applied straight away, before anything else can run
    ///
    /// All of this is synchronous. Persistence work produced on the way is
    /// only queued; see [`Self::flush_persistence`].
    ///
    /// ## Example
    ///
    /// ```rust,ignore
    /// let mut tr = editor.transaction();
    /// tr.insert_text(editor.cursor(), "Hello ")?;
    /// let outcome = editor.dispatch(tr)?;
    /// assert!(outcome.doc_changed);
    /// ```
    pub fn dispatch(&mut self, tr: Transaction) -> Result<DispatchOutcome, EngineError> {
        self.apply(tr, true)
    }

    fn apply(
        &mut self,
        tr: Transaction,
        map_suggestion: bool,
    ) -> Result<DispatchOutcome, EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        if tr.before() != &self.doc {
            return Err(EngineError::StaleTransaction);
        }

        let mut outcome = DispatchOutcome {
            doc_changed: tr.doc_changed(),
            comments_changed: tr.meta().comments_changed,
            ..DispatchOutcome::default()
        };
        self.doc = tr.doc().clone();
        self.after_transaction(&tr, map_suggestion, &mut outcome);

        if let Some(fix) = self
            .tracker
            .append_transaction(std::slice::from_ref(&tr), &self.doc)
        {
            outcome.corrections = fix.steps().len();
            self.doc = fix.doc().clone();
            self.after_transaction(&fix, map_suggestion, &mut outcome);
        }

        if outcome.doc_changed || outcome.corrections > 0 {
            self.version += 1;
        }
        outcome.version = self.version;
        Ok(outcome)
    }

    fn after_transaction(
        &mut self,
        tr: &Transaction,
        map_suggestion: bool,
        outcome: &mut DispatchOutcome,
    ) {
        let moved = self.comments.apply_transaction(tr, &mut self.persistence);
        if !moved.is_empty() {
            outcome.comments_changed = true;
            outcome.updated_comments.extend(moved);
        }
        self.cursor = tr
            .mapping()
            .map(self.cursor, Assoc::After)
            .min(self.doc.content_size());
        if map_suggestion {
            if tr.meta().add_to_history && tr.doc_changed() {
                self.completion.on_user_edit(tr.mapping());
            } else {
                self.completion.map_through(tr.mapping());
            }
        }
        self.completion.record_transaction(tr, now_ms());
    }

    /// Insert typed text at the cursor and feed it to the completion engine
    pub fn type_text(&mut self, text: &str, now: Instant) -> Result<DispatchOutcome, EngineError> {
        let mut tr = self.transaction();
        tr.insert_text(self.cursor, text)?;
        let outcome = self.dispatch(tr)?;
        self.completion.on_input(text, self.cursor, now);
        Ok(outcome)
    }

    /// Split the textblock at the cursor, as Enter does
    pub fn insert_paragraph_break(&mut self) -> Result<DispatchOutcome, EngineError> {
        let mut tr = self.transaction();
        tr.split_block(self.cursor)?;
        self.dispatch(tr)
    }

    pub fn set_cursor(&mut self, pos: usize) -> Result<(), EngineError> {
        let size = self.doc.content_size();
        if pos > size {
            return Err(EngineError::PositionOutOfRange { pos, size });
        }
        self.cursor = pos;
        Ok(())
    }

    /// Key-down hook.
    ///
    /// Accepted completion text is inserted here as an ordinary edit; every
    /// other outcome is left for the host to act on.
    pub fn key_down(&mut self, key: &KeyPress) -> Result<KeyOutcome, EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        // A failed insertion leaves the suggestion untouched
        let accept = match self.completion.accepted_text(key) {
            Some((at, text)) => {
                let mut tr = self.transaction();
                tr.insert_text(at, text)?;
                Some(tr)
            }
            None => None,
        };
        let outcome = self.completion.on_key_down(key);
        if let (Some(tr), KeyOutcome::Accept { at, text }) = (accept, &outcome) {
            self.apply(tr, false)?;
            self.cursor = at + text.chars().count();
        }
        Ok(outcome)
    }

    /// Key-up hook; ends completion work if the cursor left its anchor
    pub fn key_up(&mut self) {
        self.completion.on_cursor_moved(self.cursor);
    }

    /// Fire the debounce timer if due
    pub fn poll_completion(&mut self, now: Instant) -> Option<CompletionRequest> {
        if self.destroyed {
            return None;
        }
        self.completion.poll(&self.doc, self.cursor, now)
    }

    pub fn completion_deadline(&self) -> Option<Instant> {
        self.completion.deadline()
    }

    pub fn receive_completion(
        &mut self,
        request_id: u64,
        result: Result<CompletionResponse, CompletionError>,
    ) -> bool {
        self.completion.on_response(request_id, result)
    }

    /// Wait out the debounce window, then run the resulting request.
    ///
    /// Returns whether a suggestion is visible afterwards.
    pub async fn settle_completion(&mut self, backend: &dyn CompletionBackend) -> bool {
        let Some(deadline) = self.completion_deadline() else {
            return self.suggestion().is_some();
        };
        tokio::time::sleep_until(deadline).await;

        let Some(request) = self.poll_completion(Instant::now()) else {
            return false;
        };
        let request_id = request.request_id;
        let result = fetch_completion(backend, request).await;
        self.receive_completion(request_id, result)
    }

    /// Comment highlights plus the suggestion widget, if one is visible
    pub fn decorations(&self) -> Vec<Decoration> {
        let mut decorations = self.comments.decorations();
        decorations.extend(self.completion.decoration());
        decorations
    }

    /// Resolve a click on rendered content and notify the click handler.
    ///
    /// `path` runs from the click target up through its ancestors.
    pub fn click<'a, E, I>(&mut self, path: I) -> Option<CommentClick>
    where
        E: ElementAttributes + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        let click = resolve_click(path)?;
        if let Some(handler) = self.on_comment_click.as_mut() {
            handler(&click);
        }
        Some(click)
    }

    pub fn run_command(&mut self, command: Command) -> Result<DispatchOutcome, EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        log::debug!("running command {}", command.name());
        let mut tr = self.transaction();
        match command {
            Command::AddOneComment { comment } => {
                self.comments
                    .add(comment, self.doc.content_size(), &mut self.persistence)?;
                tr.set_comments_changed();
            }
            Command::RemoveOneComment { id } => {
                if self.comments.remove(&id, &mut self.persistence).is_some() {
                    tr.set_comments_changed();
                } else {
                    log::warn!("no comment with id {id} to remove");
                }
            }
            Command::InitAllComments { comments } => {
                self.comments.init_all(comments, self.doc.content_size());
                tr.set_comments_changed();
            }
            Command::UpdatePositions => {
                tr.set_force_reconcile();
            }
        }
        self.dispatch(tr)
    }

    /// Run commands in order, stopping at the first failure
    pub fn run_many_commands<I>(&mut self, commands: I) -> Result<Vec<DispatchOutcome>, EngineError>
    where
        I: IntoIterator<Item = Command>,
    {
        commands
            .into_iter()
            .map(|command| self.run_command(command))
            .collect()
    }

    pub fn add_comment(&mut self, comment: Comment) -> Result<DispatchOutcome, EngineError> {
        self.run_command(Command::AddOneComment { comment })
    }

    pub fn remove_comment(&mut self, id: &str) -> Result<DispatchOutcome, EngineError> {
        self.run_command(Command::RemoveOneComment { id: id.to_string() })
    }

    /// Force a full reconciliation
    pub fn update_positions(&mut self) -> Result<DispatchOutcome, EngineError> {
        self.run_command(Command::UpdatePositions)
    }

    pub fn pending_persistence(&self) -> usize {
        self.persistence.len()
    }

    pub fn take_persistence_tasks(&mut self) -> Vec<PersistenceTask> {
        self.persistence.drain()
    }

    /// Run queued persistence work. Failures are reported, never rolled back.
    pub async fn flush_persistence(&mut self, persistence: &dyn CommentPersistence) -> FlushReport {
        flush_tasks(self.persistence.drain(), persistence).await
    }

    /// Hydrate comments from the backend, replacing the local list
    pub async fn load_comments(
        &mut self,
        persistence: &dyn CommentPersistence,
        document_id: &str,
    ) -> Result<usize, PersistenceError> {
        let comments = persistence
            .on_load_comments(document_id)
            .await
            .inspect_err(|err| log::error!("loading comments for {document_id} failed: {err}"))?;
        let count = comments.len();
        if !self.destroyed {
            self.comments.init_all(comments, self.doc.content_size());
        }
        Ok(count)
    }

    /// Tear the instance down: comments and pending persistence are
    /// dropped and any completion request is aborted.
    pub fn destroy(&mut self) {
        self.comments.clear();
        self.persistence.clear();
        self.completion.destroy();
        self.destroyed = true;
    }
}

fn first_text_position(doc: &Document) -> usize {
    let mut found = None;
    doc.descendants(|node, pos, _| {
        if found.is_none() && node.is_textblock() {
            found = Some(pos + 1);
        }
        found.is_none()
    });
    found.unwrap_or(0)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
