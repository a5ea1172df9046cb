use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::editing::{Assoc, Mapping};

/// A comment anchored to the half-open range `from..to`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub from: usize,
    pub to: usize,
    /// Opaque correlation key (chat message, workflow item, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Comment {
    /// A comment whose id is derived from the current time in milliseconds
    pub fn new(text: impl Into<String>, from: usize, to: usize) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self::with_id(millis.to_string(), text, from, to)
    }

    pub fn with_id(id: impl Into<String>, text: impl Into<String>, from: usize, to: usize) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            from,
            to,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Map an anchor through a transaction's mapping, preserving its length.
///
/// When both ends move by the same amount the mapped range is used as is.
/// Otherwise the edit touched the interior of the anchor and the end is
/// placed `to - from` after the mapped start, so the highlight keeps its
/// width even though the text under it changed. The result is clamped to
/// `0..=doc_size`.
pub fn remap_anchor(from: usize, to: usize, mapping: &Mapping, doc_size: usize) -> (usize, usize) {
    let length = to.saturating_sub(from);
    let new_from = mapping.map(from, Assoc::After);
    let mapped_to = mapping.map(to, Assoc::After);

    let new_to = if mapped_to >= new_from && mapped_to - new_from == length {
        mapped_to
    } else {
        new_from + length
    };

    let new_from = new_from.min(doc_size);
    let new_to = new_to.min(doc_size).max(new_from);
    (new_from, new_to)
}
