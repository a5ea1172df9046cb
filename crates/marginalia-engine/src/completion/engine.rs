use marginalia_config::CompletionConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::completion::backend::{CompletionError, CompletionRequest, CompletionResponse};
use crate::completion::context::build_context;
use crate::completion::history::EditHistory;
use crate::completion::keys::{Key, KeyPress};
use crate::decorations::{Decoration, DecorationPayload};
use crate::editing::{Assoc, Document, Mapping, Transaction};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    /// Document position the suggestion is rendered at
    pub anchor: usize,
    pub request_id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionState {
    Idle,
    Debouncing {
        deadline: Instant,
        anchor: usize,
    },
    Awaiting {
        request_id: u64,
        anchor: usize,
        /// Line text before the cursor when the request was issued
        typed: String,
    },
    Suggesting(Suggestion),
}

/// What the host should do with a key press
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not ours; let the editor handle it
    PassThrough,
    /// Consumed; the editor must not act on it
    Handled,
    /// Consumed; insert `text` at `at` as ordinary document text
    Accept { at: usize, text: String },
}

/// Per-editor inline completion state machine.
///
/// All transitions are synchronous. Time is passed in explicitly, and the
/// network call itself is made by the caller with the returned
/// [`CompletionRequest`], whose result comes back via [`Self::on_response`].
#[derive(Debug)]
pub struct InlineCompletion {
    config: CompletionConfig,
    state: CompletionState,
    request_counter: u64,
    signal: Option<CancellationToken>,
    history: EditHistory,
    destroyed: bool,
}

impl InlineCompletion {
    pub fn new(config: CompletionConfig) -> Self {
        let history = EditHistory::new(config.history_capacity);
        Self {
            config,
            state: CompletionState::Idle,
            request_counter: 0,
            signal: None,
            history,
            destroyed: false,
        }
    }

    pub fn state(&self) -> &CompletionState {
        &self.state
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        match &self.state {
            CompletionState::Suggesting(suggestion) => Some(suggestion),
            _ => None,
        }
    }

    /// Id of the most recently issued request
    pub fn latest_request_id(&self) -> u64 {
        self.request_counter
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// When the debounce timer fires, if it is running
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            CompletionState::Debouncing { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// React to text typed by the user, with `cursor` already past it.
    ///
    /// Any visible suggestion is dropped. Text containing an activation
    /// character aborts outstanding work and restarts the debounce timer.
    /// Returns whether the timer was (re)started.
    pub fn on_input(&mut self, inserted: &str, cursor: usize, now: Instant) -> bool {
        if self.destroyed || !self.config.enabled {
            return false;
        }
        if self.suggestion().is_some() {
            self.state = CompletionState::Idle;
        }

        if inserted.chars().any(|c| self.config.is_activation_char(c)) {
            self.cancel_request();
            self.state = CompletionState::Debouncing {
                deadline: now + self.config.debounce(),
                anchor: cursor,
            };
            return true;
        }

        match &mut self.state {
            CompletionState::Debouncing { anchor, .. } => *anchor = cursor,
            CompletionState::Awaiting { .. } => {
                self.cancel_request();
                self.state = CompletionState::Idle;
            }
            _ => {}
        }
        false
    }

    /// Fire the debounce timer if it is due, producing the request to send.
    pub fn poll(&mut self, doc: &Document, cursor: usize, now: Instant) -> Option<CompletionRequest> {
        let CompletionState::Debouncing { deadline, .. } = self.state else {
            return None;
        };
        if now < deadline {
            return None;
        }

        self.cancel_request();
        self.request_counter += 1;
        let request_id = self.request_counter;
        let signal = CancellationToken::new();
        self.signal = Some(signal.clone());

        let context = build_context(doc, cursor, &self.config, &self.history);
        self.state = CompletionState::Awaiting {
            request_id,
            anchor: context.cursor,
            typed: context.current_line.clone(),
        };
        log::debug!("issuing completion request {request_id} at {}", context.cursor);

        Some(CompletionRequest {
            request_id,
            context,
            timeout: self.config.timeout(),
            signal,
        })
    }

    /// Deliver the outcome of a request.
    ///
    /// Only the latest request may produce a suggestion; anything else,
    /// and anything that arrives after its signal fired, is dropped.
    /// Returns whether a suggestion became visible.
    pub fn on_response(
        &mut self,
        request_id: u64,
        result: Result<CompletionResponse, CompletionError>,
    ) -> bool {
        let current = matches!(
            &self.state,
            CompletionState::Awaiting { request_id: id, .. } if *id == request_id
        ) && self.signal.as_ref().is_some_and(|s| !s.is_cancelled());

        let response = match result {
            Ok(response) => response,
            Err(CompletionError::Aborted) => {
                log::warn!("completion request {request_id} aborted");
                if current {
                    self.reset();
                }
                return false;
            }
            Err(err) => {
                log::error!("completion request {request_id} failed: {err}");
                if current {
                    self.reset();
                }
                return false;
            }
        };

        if !current {
            log::debug!(
                "discarding completion {request_id}, latest is {}",
                self.request_counter
            );
            return false;
        }
        let CompletionState::Awaiting { anchor, typed, .. } = &self.state else {
            return false;
        };

        let text = strip_typed_context(typed, &response.completion).to_string();
        let anchor = *anchor;
        self.signal = None;
        if text.is_empty() {
            self.state = CompletionState::Idle;
            return false;
        }
        self.state = CompletionState::Suggesting(Suggestion {
            text,
            anchor,
            request_id,
        });
        true
    }

    /// Where a key would insert suggestion text, and what, without
    /// changing any state
    pub fn accepted_text(&self, key: &KeyPress) -> Option<(usize, &str)> {
        let suggestion = self.suggestion()?;
        if key.is_accept_all() {
            Some((suggestion.anchor, suggestion.text.as_str()))
        } else if key.is_accept_word() {
            Some((suggestion.anchor, split_next_word(&suggestion.text).0))
        } else {
            None
        }
    }

    pub fn on_key_down(&mut self, key: &KeyPress) -> KeyOutcome {
        let CompletionState::Suggesting(suggestion) = &self.state else {
            if matches!(key.key, Key::Escape | Key::Enter) {
                self.abort();
            }
            return KeyOutcome::PassThrough;
        };

        if key.is_accept_all() {
            let outcome = KeyOutcome::Accept {
                at: suggestion.anchor,
                text: suggestion.text.clone(),
            };
            self.state = CompletionState::Idle;
            return outcome;
        }

        if key.is_accept_word() {
            let (word, rest) = split_next_word(&suggestion.text);
            let at = suggestion.anchor;
            let outcome = KeyOutcome::Accept {
                at,
                text: word.to_string(),
            };
            self.state = if rest.is_empty() {
                CompletionState::Idle
            } else {
                CompletionState::Suggesting(Suggestion {
                    text: rest.to_string(),
                    anchor: at + word.chars().count(),
                    request_id: suggestion.request_id,
                })
            };
            return outcome;
        }

        match key.key {
            Key::Escape => {
                self.dismiss();
                KeyOutcome::Handled
            }
            Key::Enter | Key::Backspace => {
                self.dismiss();
                KeyOutcome::PassThrough
            }
            _ => KeyOutcome::PassThrough,
        }
    }

    /// Key-up hook: a cursor that left the anchor ends any pending or
    /// visible completion.
    pub fn on_cursor_moved(&mut self, cursor: usize) {
        let anchor = match &self.state {
            CompletionState::Idle => return,
            CompletionState::Debouncing { anchor, .. } | CompletionState::Awaiting { anchor, .. } => {
                *anchor
            }
            CompletionState::Suggesting(suggestion) => suggestion.anchor,
        };
        if anchor != cursor {
            log::debug!("cursor moved from completion anchor {anchor} to {cursor}");
            self.dismiss();
        }
    }

    /// React to a content change made by the user.
    ///
    /// A visible suggestion or a request in flight was built for the old
    /// text and is dropped. A running debounce timer only follows the edit.
    pub fn on_user_edit(&mut self, mapping: &Mapping) {
        match self.state {
            CompletionState::Suggesting(_) | CompletionState::Awaiting { .. } => self.reset(),
            CompletionState::Debouncing { .. } => self.map_through(mapping),
            CompletionState::Idle => {}
        }
    }

    /// Carry anchors across a transaction that did not come from the user
    pub fn map_through(&mut self, mapping: &Mapping) {
        match &mut self.state {
            CompletionState::Idle => {}
            CompletionState::Debouncing { anchor, .. } | CompletionState::Awaiting { anchor, .. } => {
                *anchor = mapping.map(*anchor, Assoc::After);
            }
            CompletionState::Suggesting(suggestion) => {
                suggestion.anchor = mapping.map(suggestion.anchor, Assoc::After);
            }
        }
    }

    /// Record a user transaction in the edit history
    pub fn record_transaction(&mut self, tr: &Transaction, timestamp_ms: u64) {
        if tr.meta().add_to_history {
            self.history.record_transaction(tr, timestamp_ms);
        }
    }

    /// Cancel the debounce timer and any request in flight. A visible
    /// suggestion stays.
    pub fn abort(&mut self) {
        self.cancel_request();
        if matches!(
            self.state,
            CompletionState::Debouncing { .. } | CompletionState::Awaiting { .. }
        ) {
            self.state = CompletionState::Idle;
        }
    }

    /// Abort outstanding work and hide any suggestion
    pub fn dismiss(&mut self) {
        self.reset();
    }

    pub fn destroy(&mut self) {
        self.reset();
        self.history.clear();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Zero-width widget for the visible suggestion
    pub fn decoration(&self) -> Option<Decoration> {
        self.suggestion().map(|s| {
            Decoration::widget(
                s.anchor,
                DecorationPayload::Suggestion {
                    text: s.text.clone(),
                    request_id: s.request_id,
                },
            )
        })
    }

    fn reset(&mut self) {
        self.cancel_request();
        self.state = CompletionState::Idle;
    }

    fn cancel_request(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.cancel();
        }
    }
}

/// Drop the part of `completion` that repeats what was already typed.
///
/// The longest suffix of `typed` that is also a prefix of `completion` is
/// removed, so a backend echoing the line back yields only the new text.
pub fn strip_typed_context<'a>(typed: &str, completion: &'a str) -> &'a str {
    typed
        .char_indices()
        .map(|(i, _)| &typed[i..])
        .find(|suffix| completion.starts_with(suffix))
        .map_or(completion, |suffix| &completion[suffix.len()..])
}

/// Split off the next whitespace-delimited token, keeping the whitespace
/// around it with the accepted part
fn split_next_word(text: &str) -> (&str, &str) {
    let leading = text.len() - text.trim_start().len();
    let word_end = text[leading..]
        .find(char::is_whitespace)
        .map_or(text.len(), |i| leading + i);
    let rest_start = word_end + (text[word_end..].len() - text[word_end..].trim_start().len());
    (&text[..rest_start], &text[rest_start..])
}
