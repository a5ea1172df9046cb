use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Tab,
    Escape,
    Enter,
    Backspace,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Char(char),
    Other(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct KeyPress {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    /// Ctrl+Right on Linux/Windows, Cmd+Right on macOS
    pub fn is_accept_word(&self) -> bool {
        self.key == Key::ArrowRight && (self.modifiers.ctrl || self.modifiers.meta)
    }

    pub fn is_accept_all(&self) -> bool {
        self.key == Key::Tab && self.modifiers == Modifiers::default()
    }
}

impl From<Key> for KeyPress {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}
