//! Render-only overlays described as plain data.
//!
//! The engine never builds UI elements; a presentation layer turns these
//! records into highlights and widgets.

use std::fmt::Write as _;

use serde::Serialize;

pub const COMMENT_ID_ATTR: &str = "data-comment-id";
pub const COMMENT_REFERENCE_ATTR: &str = "data-comment-reference";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecorationKind {
    /// Spans `from..to` without changing content
    Inline,
    /// Zero-width element placed at `from`
    Widget,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecorationPayload {
    Comment {
        comment_id: String,
        reference: Option<String>,
        /// Attribute pairs with values already escaped for a double-quoted
        /// attribute context
        attributes: Vec<(String, String)>,
    },
    Suggestion {
        text: String,
        request_id: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub kind: DecorationKind,
    pub from: usize,
    pub to: usize,
    pub payload: DecorationPayload,
}

impl Decoration {
    pub fn inline(from: usize, to: usize, payload: DecorationPayload) -> Self {
        Self {
            kind: DecorationKind::Inline,
            from,
            to,
            payload,
        }
    }

    pub fn widget(pos: usize, payload: DecorationPayload) -> Self {
        Self {
            kind: DecorationKind::Widget,
            from: pos,
            to: pos,
            payload,
        }
    }

    /// Highlight for a comment anchor
    pub fn comment(comment_id: &str, reference: Option<&str>, from: usize, to: usize) -> Self {
        let mut attributes = vec![(
            COMMENT_ID_ATTR.to_string(),
            sanitize_attribute(comment_id),
        )];
        if let Some(reference) = reference {
            attributes.push((
                COMMENT_REFERENCE_ATTR.to_string(),
                sanitize_attribute(reference),
            ));
        }
        Self::inline(
            from,
            to,
            DecorationPayload::Comment {
                comment_id: comment_id.to_string(),
                reference: reference.map(str::to_string),
                attributes,
            },
        )
    }

    /// `name="value"` pairs ready to be written into a start tag
    pub fn html_attributes(&self) -> String {
        let mut out = String::new();
        if let DecorationPayload::Comment { attributes, .. } = &self.payload {
            for (name, value) in attributes {
                if !out.is_empty() {
                    out.push(' ');
                }
                let _ = write!(out, "{name}=\"{value}\"");
            }
        }
        out
    }
}

/// Escape an untrusted value for use inside a double-quoted attribute
pub fn sanitize_attribute(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_attribute_cannot_break_out() {
        let hostile = r#"x" onclick="alert(1)"#;
        let sanitized = sanitize_attribute(hostile);
        assert!(!sanitized.contains('"'));
        assert!(sanitized.contains("&quot;"));
    }

    #[test]
    fn test_comment_decoration_attributes() {
        let deco = Decoration::comment("c1", Some("msg-9"), 3, 8);
        assert_eq!(deco.kind, DecorationKind::Inline);
        assert_eq!((deco.from, deco.to), (3, 8));
        insta::assert_snapshot!(
            deco.html_attributes(),
            @r#"data-comment-id="c1" data-comment-reference="msg-9""#
        );
    }

    #[test]
    fn test_comment_without_reference_has_only_id() {
        let deco = Decoration::comment("a&b", None, 0, 1);
        assert_eq!(deco.html_attributes(), "data-comment-id=\"a&amp;b\"");
    }

    #[test]
    fn test_widget_is_zero_width() {
        let deco = Decoration::widget(
            4,
            DecorationPayload::Suggestion {
                text: "more".to_string(),
                request_id: 1,
            },
        );
        assert_eq!(deco.kind, DecorationKind::Widget);
        assert_eq!(deco.from, deco.to);
    }
}
