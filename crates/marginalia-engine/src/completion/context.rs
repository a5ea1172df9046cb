use std::sync::OnceLock;

use marginalia_config::CompletionConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::completion::history::{EditHistory, EditHistoryEntry};
use crate::editing::Document;

/// Zero-based indices locating the cursor in the document's prose
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralPosition {
    /// Textblocks before the one holding the cursor
    pub paragraph: usize,
    /// Sentences completed earlier in the same textblock
    pub sentence: usize,
    /// Words before the cursor in the current sentence
    pub word: usize,
}

/// Everything a completion backend is told about the cursor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionContext {
    /// Text before the cursor, truncated from the left to the window size
    pub preceding_text: String,
    /// The cursor's line up to the cursor
    pub current_line: String,
    /// Partial word directly before the cursor, empty after whitespace
    pub current_word: String,
    /// Whole words before the current one, oldest first
    pub preceding_words: Vec<String>,
    pub cursor: usize,
    pub structure: StructuralPosition,
    pub recent_edits: Vec<EditHistoryEntry>,
}

fn word_regex() -> &'static Regex {
    static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
    WORD_REGEX.get_or_init(|| Regex::new(r"\S+").expect("Invalid word regex"))
}

fn sentence_end_regex() -> &'static Regex {
    static SENTENCE_END_REGEX: OnceLock<Regex> = OnceLock::new();
    SENTENCE_END_REGEX
        .get_or_init(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("Invalid sentence regex"))
}

pub fn build_context(
    doc: &Document,
    cursor: usize,
    config: &CompletionConfig,
    history: &EditHistory,
) -> CompletionContext {
    let cursor = cursor.min(doc.content_size());
    let preceding_text = last_chars(&doc.text_between(0, cursor, "\n"), config.context_window_chars);

    let (block_text, paragraph) = match doc.textblock_at(cursor) {
        Some(block) => {
            let text = doc.text_between(block.content_start, cursor, "\n");
            let mut paragraph = 0;
            doc.descendants(|node, pos, _| {
                if node.is_textblock() && pos < block.start {
                    paragraph += 1;
                }
                pos < block.start
            });
            (text, paragraph)
        }
        None => (String::new(), 0),
    };

    let current_line = block_text
        .rsplit('\n')
        .next()
        .unwrap_or_default()
        .to_string();
    let current_word = trailing_word(&current_line).to_string();

    let before_word =
        &preceding_text[..preceding_text.len() - current_word.len().min(preceding_text.len())];
    let words: Vec<&str> = word_regex()
        .find_iter(before_word)
        .map(|m| m.as_str())
        .collect();
    let skip = words.len().saturating_sub(config.preceding_words);
    let preceding_words = words[skip..].iter().map(|w| w.to_string()).collect();

    CompletionContext {
        preceding_text,
        current_line,
        current_word,
        preceding_words,
        cursor,
        structure: structural_position(&block_text, paragraph),
        recent_edits: history.entries().cloned().collect(),
    }
}

fn structural_position(block_text: &str, paragraph: usize) -> StructuralPosition {
    let sentence_ends: Vec<_> = sentence_end_regex().find_iter(block_text).collect();
    // A terminator at the very end only closes a sentence once whitespace follows
    let closed: Vec<_> = sentence_ends
        .iter()
        .filter(|m| m.end() < block_text.len() || m.as_str().ends_with(char::is_whitespace))
        .collect();
    let sentence_start = closed.last().map_or(0, |m| m.end());
    let word = word_regex()
        .find_iter(&block_text[sentence_start..])
        .filter(|m| m.end() < block_text.len() - sentence_start)
        .count();
    StructuralPosition {
        paragraph,
        sentence: closed.len(),
        word,
    }
}

fn trailing_word(line: &str) -> &str {
    let start = line
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8());
    &line[start..]
}

fn last_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max)).collect()
}
