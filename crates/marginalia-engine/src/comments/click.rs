use std::collections::{BTreeMap, HashMap};

use crate::decorations::{COMMENT_ID_ATTR, COMMENT_REFERENCE_ATTR};

/// Attribute lookup on a rendered element
pub trait ElementAttributes {
    fn attribute(&self, name: &str) -> Option<&str>;
}

impl ElementAttributes for HashMap<String, String> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl ElementAttributes for BTreeMap<String, String> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentClick {
    pub comment_id: String,
    pub reference: Option<String>,
}

/// Find the comment hit by a click.
///
/// `path` starts at the click target and continues through its ancestors;
/// the nearest element carrying a comment id wins.
pub fn resolve_click<'a, E, I>(path: I) -> Option<CommentClick>
where
    E: ElementAttributes + 'a,
    I: IntoIterator<Item = &'a E>,
{
    path.into_iter().find_map(|element| {
        let comment_id = element.attribute(COMMENT_ID_ATTR)?;
        Some(CommentClick {
            comment_id: comment_id.to_string(),
            reference: element
                .attribute(COMMENT_REFERENCE_ATTR)
                .map(str::to_string),
        })
    })
}
