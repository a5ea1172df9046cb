mod session;

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, process};

use anyhow::Result;
use async_trait::async_trait;
use marginalia_config::Config;
use marginalia_engine::comments::{Comment, CommentPersistence, PersistenceError};
use marginalia_engine::completion::{
    CompletionBackend, CompletionError, CompletionRequest, CompletionResponse, Key, KeyOutcome,
    KeyPress,
};
use marginalia_engine::{DecorationPayload, Editor};
use tokio::time::Instant;

use crate::session::{Action, Session};

/// Completion backend answering from the session's scripted replies
struct ScriptedBackend {
    replies: RefCell<VecDeque<String>>,
}

#[async_trait(?Send)]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        log::info!(
            "completion request {} for {:?}",
            request.request_id,
            request.context.current_line
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.replies
            .borrow_mut()
            .pop_front()
            .map(CompletionResponse::new)
            .ok_or_else(|| CompletionError::Backend("no scripted reply left".to_string()))
    }
}

/// Persistence that prints every call
struct PrintingStore {
    comments: Vec<Comment>,
}

#[async_trait(?Send)]
impl CommentPersistence for PrintingStore {
    async fn on_comment_add(&self, comment: &Comment) -> Result<(), PersistenceError> {
        println!("  persist add {} [{}..{})", comment.id, comment.from, comment.to);
        Ok(())
    }

    async fn on_comment_update(&self, comment: &Comment) -> Result<(), PersistenceError> {
        println!("  persist update {} [{}..{})", comment.id, comment.from, comment.to);
        Ok(())
    }

    async fn on_comment_remove(&self, id: &str) -> Result<(), PersistenceError> {
        println!("  persist remove {id}");
        Ok(())
    }

    async fn on_comments_updates(&self, comments: &[Comment]) -> Result<(), PersistenceError> {
        println!("  persist batch of {} update(s)", comments.len());
        Ok(())
    }

    async fn on_load_comments(&self, document_id: &str) -> Result<Vec<Comment>, PersistenceError> {
        log::info!("loading {} comment(s) for {document_id}", self.comments.len());
        Ok(self.comments.clone())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <session.toml>", args[0]);
        process::exit(1);
    }

    let config = match Config::load() {
        Ok(Some(config)) => {
            log::info!("Loaded config from {}", Config::config_path().display());
            config
        }
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let session = Session::load(&PathBuf::from(&args[1]))?;
    replay(session, &config).await
}

async fn replay(session: Session, config: &Config) -> Result<()> {
    let mut editor = Editor::new(session.document()?, config)?;
    editor.set_on_comment_click(Box::new(|click| {
        println!(
            "  clicked comment {} (reference {:?})",
            click.comment_id, click.reference
        );
    }));

    let store = PrintingStore {
        comments: session.comments,
    };
    let backend = ScriptedBackend {
        replies: RefCell::new(session.replies.into()),
    };

    let loaded = editor.load_comments(&store, &session.document_id).await?;
    println!("loaded {loaded} comment(s) for {}", session.document_id);

    for (step, action) in session.actions.into_iter().enumerate() {
        println!("[{step}] {action:?}");
        run_action(&mut editor, action, &backend).await?;
        let report = editor.flush_persistence(&store).await;
        for failure in &report.failures {
            println!("  persistence failed: {} ({})", failure.task.name(), failure.error);
        }
    }

    print_summary(&editor);
    editor.destroy();
    Ok(())
}

async fn run_action(editor: &mut Editor, action: Action, backend: &ScriptedBackend) -> Result<()> {
    match action {
        Action::Type { text } => {
            editor.type_text(&text, Instant::now())?;
        }
        Action::Cursor { pos } => {
            editor.set_cursor(pos)?;
            editor.key_up();
        }
        Action::Key { key, modifiers } => {
            let press = KeyPress { key, modifiers };
            match editor.key_down(&press)? {
                KeyOutcome::Accept { at, text } => println!("  accepted {text:?} at {at}"),
                KeyOutcome::Handled => println!("  handled by completion"),
                KeyOutcome::PassThrough => {}
            }
            editor.key_up();
        }
        Action::AcceptWord => {
            match editor.key_down(&KeyPress::new(Key::ArrowRight).with_ctrl())? {
                KeyOutcome::Accept { at, text } => println!("  accepted {text:?} at {at}"),
                _ => println!("  no suggestion to accept"),
            }
            editor.key_up();
        }
        Action::Enter => {
            editor.key_down(&KeyPress::new(Key::Enter))?;
            editor.insert_paragraph_break()?;
        }
        Action::Insert { at, text } => {
            let mut tr = editor.transaction();
            tr.insert_text(at, &text)?.set_add_to_history(false);
            editor.dispatch(tr)?;
        }
        Action::Delete { from, to } => {
            let mut tr = editor.transaction();
            tr.delete_range(from, to)?;
            editor.dispatch(tr)?;
        }
        Action::Wait => {
            if editor.settle_completion(backend).await {
                if let Some(suggestion) = editor.suggestion() {
                    println!("  suggestion {:?} at {}", suggestion.text, suggestion.anchor);
                }
            } else {
                println!("  no suggestion");
            }
        }
        Action::Click { comment_id } => {
            let element = editor
                .decorations()
                .into_iter()
                .find_map(|decoration| match decoration.payload {
                    DecorationPayload::Comment {
                        comment_id: id,
                        attributes,
                        ..
                    } if id == comment_id => Some(attributes.into_iter().collect::<BTreeMap<_, _>>()),
                    _ => None,
                });
            match element {
                Some(element) => {
                    editor.click([&element]);
                }
                None => println!("  no highlight for comment {comment_id}"),
            }
        }
        Action::Run { command } => {
            let outcome = editor.run_command(command)?;
            println!(
                "  version {} corrections {} comments changed {}",
                outcome.version, outcome.corrections, outcome.comments_changed
            );
        }
    }
    Ok(())
}

fn print_summary(editor: &Editor) {
    println!();
    println!(
        "document (version {}, cursor {} on line {}):",
        editor.version(),
        editor.cursor(),
        editor.cursor_line().unwrap_or_default()
    );
    for line in editor.doc().text_content().lines() {
        println!("  {line}");
    }

    println!("tracked nodes:");
    for node in editor.tracked_nodes() {
        let id = node.id.map(|id| id.to_string()).unwrap_or_default();
        println!(
            "  {:<10} {:>4}..{:<4} line {:<3} {id}",
            node.node_type,
            node.pos_start,
            node.pos_end,
            node.line_number.unwrap_or_default()
        );
    }

    println!("comments:");
    for comment in editor.comments() {
        println!(
            "  {} [{}..{}) {:?}",
            comment.id, comment.from, comment.to, comment.text
        );
    }

    println!("decorations:");
    for decoration in editor.decorations() {
        println!(
            "  {:?} {}..{} {}",
            decoration.kind,
            decoration.from,
            decoration.to,
            decoration.html_attributes()
        );
    }
}
