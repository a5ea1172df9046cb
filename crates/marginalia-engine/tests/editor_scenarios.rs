use std::cell::RefCell;
use std::time::Duration;

use async_trait::async_trait;
use marginalia_config::Config;
use marginalia_engine::comments::{Comment, CommentPersistence, PersistenceError};
use marginalia_engine::completion::{
    CompletionBackend, CompletionError, CompletionRequest, CompletionResponse, CompletionState,
    Key, KeyOutcome, KeyPress, fetch_completion,
};
use marginalia_engine::editing::{Document, Node};
use marginalia_engine::{DecorationKind, DecorationPayload, Editor};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

/// Backend replying with a fixed completion after a delay
struct Scripted {
    reply: &'static str,
    delay: Duration,
    seen: RefCell<Vec<u64>>,
}

impl Scripted {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            delay: Duration::from_millis(20),
            seen: RefCell::new(Vec::new()),
        }
    }
}

#[async_trait(?Send)]
impl CompletionBackend for Scripted {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        self.seen.borrow_mut().push(request.request_id);
        tokio::time::sleep(self.delay).await;
        Ok(CompletionResponse::new(self.reply))
    }
}

fn empty_editor() -> Editor {
    Editor::new(Document::empty(), &Config::default()).unwrap()
}

#[test]
fn test_typing_into_empty_paragraph_keeps_span_consistent() {
    let mut editor = empty_editor();
    let before = editor.tracked_nodes();
    assert_eq!((before[0].pos_start, before[0].pos_end), (0, 2));

    editor.type_text("Hello ", Instant::now()).unwrap();

    let after = editor.tracked_nodes();
    let paragraph = &after[0];
    let node = editor.doc().node_at(paragraph.pos_start).unwrap();
    assert_eq!(paragraph.pos_start, 0);
    assert_eq!(paragraph.pos_end, paragraph.pos_start + node.node_size());
    assert_eq!(paragraph.pos_end, 8);
    assert_eq!(paragraph.id, before[0].id);
    assert_eq!(node.attrs().pos_end, Some(8));
}

#[test]
fn test_insert_before_comment_shifts_anchor() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph(&"x".repeat(40))]),
        &Config::default(),
    )
    .unwrap();
    editor.add_comment(Comment::with_id("c", "note", 10, 20)).unwrap();

    editor.set_cursor(5).unwrap();
    editor.type_text("12345", Instant::now()).unwrap();

    let comment = &editor.comments()[0];
    assert_eq!((comment.from, comment.to), (15, 25));
}

#[test]
fn test_delete_inside_comment_preserves_width() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph(&"x".repeat(40))]),
        &Config::default(),
    )
    .unwrap();
    editor.add_comment(Comment::with_id("c", "note", 10, 20)).unwrap();

    let mut tr = editor.transaction();
    tr.delete_range(12, 14).unwrap();
    editor.dispatch(tr).unwrap();

    let comment = &editor.comments()[0];
    assert_eq!(comment.to - comment.from, 10);
    assert_eq!(comment.from, 10);
}

#[tokio::test(start_paused = true)]
async fn test_suggestion_is_stripped_and_accepted_with_tab() {
    let mut editor = empty_editor();
    let backend = Scripted::new("test completed");

    editor.type_text("test ", Instant::now()).unwrap();
    assert!(matches!(
        editor.completion_state(),
        CompletionState::Debouncing { .. }
    ));

    assert!(editor.settle_completion(&backend).await);
    let suggestion = editor.suggestion().unwrap().clone();
    assert_eq!(suggestion.text, "completed");
    assert_eq!(suggestion.anchor, editor.cursor());

    // The suggestion is an overlay: the document does not contain it yet
    assert_eq!(editor.doc().text_content(), "test ");
    let widget = editor
        .decorations()
        .into_iter()
        .find(|d| d.kind == DecorationKind::Widget)
        .unwrap();
    assert_eq!(widget.from, widget.to);

    let outcome = editor.key_down(&KeyPress::new(Key::Tab)).unwrap();
    assert!(matches!(outcome, KeyOutcome::Accept { .. }));
    assert_eq!(editor.doc().text_content(), "test completed");
    assert!(editor.suggestion().is_none());
    assert_eq!(editor.cursor(), 15);
}

#[tokio::test(start_paused = true)]
async fn test_accept_word_then_rest() {
    let mut editor = empty_editor();
    let backend = Scripted::new("and then some");

    editor.type_text("more ", Instant::now()).unwrap();
    editor.settle_completion(&backend).await;

    editor
        .key_down(&KeyPress::new(Key::ArrowRight).with_ctrl())
        .unwrap();
    assert_eq!(editor.doc().text_content(), "more and ");
    let rest = editor.suggestion().unwrap();
    assert_eq!(rest.text, "then some");
    assert_eq!(rest.anchor, editor.cursor());

    match editor.decorations().last().map(|d| &d.payload) {
        Some(DecorationPayload::Suggestion { text, .. }) => assert_eq!(text, "then some"),
        other => panic!("expected a suggestion widget, got {other:?}"),
    }

    editor.key_down(&KeyPress::new(Key::Tab)).unwrap();
    assert_eq!(editor.doc().text_content(), "more and then some");
}

#[tokio::test(start_paused = true)]
async fn test_only_latest_response_is_applied() {
    let mut editor = empty_editor();
    let start = Instant::now();

    editor.type_text("one ", start).unwrap();
    let first = editor
        .poll_completion(start + Duration::from_millis(300))
        .unwrap();

    editor.type_text("two ", start + Duration::from_millis(400)).unwrap();
    let second = editor
        .poll_completion(start + Duration::from_millis(700))
        .unwrap();
    assert!(first.signal.is_cancelled());
    assert!(second.request_id > first.request_id);

    // Second reply lands first, then the stale first reply
    assert!(editor.receive_completion(second.request_id, Ok(CompletionResponse::new("three"))));
    assert!(!editor.receive_completion(first.request_id, Ok(CompletionResponse::new("stale"))));
    assert_eq!(editor.suggestion().unwrap().text, "three");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_reply_arriving_first_is_dropped() {
    let mut editor = empty_editor();
    let start = Instant::now();

    editor.type_text("one ", start).unwrap();
    let first = editor
        .poll_completion(start + Duration::from_millis(300))
        .unwrap();
    editor.type_text("two ", start + Duration::from_millis(400)).unwrap();
    let second = editor
        .poll_completion(start + Duration::from_millis(700))
        .unwrap();

    assert!(!editor.receive_completion(first.request_id, Ok(CompletionResponse::new("stale"))));
    assert!(editor.suggestion().is_none());
    assert!(editor.receive_completion(second.request_id, Ok(CompletionResponse::new("fresh"))));
}

/// Backend that ignores its cancellation signal entirely
struct Deaf;

#[async_trait(?Send)]
impl CompletionBackend for Deaf {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(CompletionResponse::new("too late"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_resolve_after_abort_creates_no_decoration() {
    let mut editor = empty_editor();
    let start = Instant::now();
    editor.type_text("abc ", start).unwrap();
    let request = editor
        .poll_completion(start + Duration::from_millis(300))
        .unwrap();
    let request_id = request.request_id;
    let signal = request.signal.clone();

    // Escape aborts the request while the backend is still working
    editor.key_down(&KeyPress::new(Key::Escape)).unwrap();
    assert!(signal.is_cancelled());

    let runner = fetch_completion(&Deaf, request.clone()).await;
    assert_eq!(runner, Err(CompletionError::Aborted));
    assert!(!editor.receive_completion(request_id, runner));

    // Even a raw success delivered after the abort is ignored
    let raw = Deaf.complete(request).await;
    assert!(!editor.receive_completion(request_id, raw));

    assert!(editor.suggestion().is_none());
    assert!(editor.decorations().is_empty());
    assert_eq!(editor.completion_state(), &CompletionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_enter_and_cursor_moves_dismiss_suggestion() {
    let mut editor = empty_editor();
    let backend = Scripted::new("next");

    editor.type_text("word ", Instant::now()).unwrap();
    editor.settle_completion(&backend).await;
    assert!(editor.suggestion().is_some());

    // Cursor moves away, key-up notices
    editor.set_cursor(1).unwrap();
    editor.key_up();
    assert!(editor.suggestion().is_none());

    editor.set_cursor(6).unwrap();
    editor.type_text(" ", Instant::now()).unwrap();
    editor.settle_completion(&backend).await;
    assert!(editor.suggestion().is_some());

    let outcome = editor.key_down(&KeyPress::new(Key::Enter)).unwrap();
    assert_eq!(outcome, KeyOutcome::PassThrough);
    editor.insert_paragraph_break().unwrap();
    assert!(editor.suggestion().is_none());
    assert_eq!(editor.tracked_nodes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_enter_while_awaiting_drops_the_request() {
    let mut editor = empty_editor();
    let start = Instant::now();
    editor.type_text("word ", start).unwrap();
    let request = editor
        .poll_completion(start + Duration::from_millis(300))
        .unwrap();

    let outcome = editor.key_down(&KeyPress::new(Key::Enter)).unwrap();
    assert_eq!(outcome, KeyOutcome::PassThrough);
    assert!(request.signal.is_cancelled());
    editor.insert_paragraph_break().unwrap();
    editor.key_up();

    assert!(!editor.receive_completion(request.request_id, Ok(CompletionResponse::new("next"))));
    assert!(editor.suggestion().is_none());
    assert!(editor.decorations().is_empty());
    assert_eq!(editor.doc().text_content(), "word \n");
}

#[tokio::test(start_paused = true)]
async fn test_deleting_text_clears_suggestion() {
    let mut editor = empty_editor();
    let backend = Scripted::new("next");
    editor.type_text("word ", Instant::now()).unwrap();
    editor.settle_completion(&backend).await;
    assert_eq!(editor.suggestion().map(|s| s.anchor), Some(6));

    let cursor = editor.cursor();
    let mut tr = editor.transaction();
    tr.delete_range(cursor - 1, cursor).unwrap();
    editor.dispatch(tr).unwrap();
    editor.key_up();

    assert_eq!(editor.doc().text_content(), "word");
    assert!(editor.suggestion().is_none());
    assert!(editor.decorations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_remote_edit_carries_suggestion_along() {
    let mut editor = empty_editor();
    let backend = Scripted::new("next");
    editor.type_text("word ", Instant::now()).unwrap();
    editor.settle_completion(&backend).await;

    let mut tr = editor.transaction();
    tr.insert_text(1, "Hi ").unwrap().set_add_to_history(false);
    editor.dispatch(tr).unwrap();
    editor.key_up();

    let suggestion = editor.suggestion().unwrap();
    assert_eq!(suggestion.text, "next");
    assert_eq!(suggestion.anchor, 9);
    assert_eq!(suggestion.anchor, editor.cursor());
}

#[tokio::test(start_paused = true)]
async fn test_failed_accept_keeps_suggestion() {
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("intro"), Node::paragraph("")]),
        &Config::default(),
    )
    .unwrap();
    let backend = Scripted::new("next");
    editor.set_cursor(8).unwrap();
    editor.type_text("word ", Instant::now()).unwrap();
    editor.settle_completion(&backend).await;
    assert_eq!(editor.suggestion().map(|s| s.anchor), Some(13));

    // A collaborator removes the paragraph; the anchor lands between blocks
    let mut tr = editor.transaction();
    tr.delete_node(7).unwrap().set_add_to_history(false);
    editor.dispatch(tr).unwrap();
    assert_eq!(editor.suggestion().map(|s| s.anchor), Some(7));

    assert!(editor.key_down(&KeyPress::new(Key::Tab)).is_err());
    assert_eq!(editor.suggestion().map(|s| s.text.as_str()), Some("next"));
    assert_eq!(editor.doc().text_content(), "intro");
}

#[tokio::test(start_paused = true)]
async fn test_destroy_aborts_in_flight_request() {
    let mut editor = empty_editor();
    let start = Instant::now();
    editor.type_text("abc ", start).unwrap();
    let request = editor
        .poll_completion(start + Duration::from_millis(300))
        .unwrap();

    editor.destroy();
    assert!(request.signal.is_cancelled());
    assert!(!editor.receive_completion(request.request_id, Ok(CompletionResponse::new("x"))));
    assert!(editor.poll_completion(start + Duration::from_secs(5)).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_completion_never_requests() {
    let mut config = Config::default();
    config.completion.enabled = false;
    let mut editor = Editor::new(Document::empty(), &config).unwrap();
    let backend = Scripted::new("nope");

    editor.type_text("hello ", Instant::now()).unwrap();
    assert!(editor.completion_deadline().is_none());
    assert!(!editor.settle_completion(&backend).await);
    assert!(backend.seen.borrow().is_empty());
}

#[derive(Default)]
struct MemoryStore {
    stored: RefCell<Vec<Comment>>,
    log: RefCell<Vec<String>>,
}

#[async_trait(?Send)]
impl CommentPersistence for MemoryStore {
    async fn on_comment_add(&self, comment: &Comment) -> Result<(), PersistenceError> {
        self.log.borrow_mut().push(format!("add {}", comment.id));
        self.stored.borrow_mut().push(comment.clone());
        Ok(())
    }

    async fn on_comment_update(&self, comment: &Comment) -> Result<(), PersistenceError> {
        self.log.borrow_mut().push(format!("update {}", comment.id));
        Ok(())
    }

    async fn on_comment_remove(&self, id: &str) -> Result<(), PersistenceError> {
        self.log.borrow_mut().push(format!("remove {id}"));
        Err(PersistenceError::NotFound(id.to_string()))
    }

    async fn on_comments_updates(&self, comments: &[Comment]) -> Result<(), PersistenceError> {
        self.log
            .borrow_mut()
            .push(format!("updates {}", comments.len()));
        Ok(())
    }

    async fn on_load_comments(&self, document_id: &str) -> Result<Vec<Comment>, PersistenceError> {
        if document_id == "missing" {
            return Err(PersistenceError::NotFound(document_id.to_string()));
        }
        Ok(self.stored.borrow().clone())
    }
}

#[tokio::test]
async fn test_persistence_is_flushed_after_mutation() {
    let store = MemoryStore::default();
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("comment on this text")]),
        &Config::default(),
    )
    .unwrap();

    editor.add_comment(Comment::with_id("a", "first", 12, 16)).unwrap();
    editor.set_cursor(1).unwrap();
    editor.type_text("Do ", Instant::now()).unwrap();
    editor.remove_comment("a").unwrap();
    assert_eq!(editor.pending_persistence(), 4);

    let report = editor.flush_persistence(&store).await;
    assert_eq!(
        *store.log.borrow(),
        vec!["add a", "update a", "updates 1", "remove a"]
    );
    // The failed remove is reported but the comment stays deleted locally
    assert_eq!(report.failures.len(), 1);
    assert!(editor.comments().is_empty());
    assert_eq!(editor.pending_persistence(), 0);
}

#[tokio::test]
async fn test_load_comments_hydrates_and_clamps() {
    let store = MemoryStore::default();
    store
        .stored
        .borrow_mut()
        .push(Comment::with_id("old", "kept", 2, 99));
    let mut editor = Editor::new(
        Document::new(vec![Node::paragraph("short")]),
        &Config::default(),
    )
    .unwrap();

    assert_eq!(editor.load_comments(&store, "doc-1").await, Ok(1));
    assert_eq!((editor.comments()[0].from, editor.comments()[0].to), (2, 7));

    let err = editor.load_comments(&store, "missing").await.unwrap_err();
    assert_eq!(err, PersistenceError::NotFound("missing".to_string()));
    assert_eq!(editor.comments().len(), 1);
}
