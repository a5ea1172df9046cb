//! Named commands the hosting UI can run against an editor.

use serde::Deserialize;

use crate::comments::Comment;

/// A command, as sent by the host.
///
/// Deserialized from `{"command": "add_one_comment", ...}`-style maps, so an
/// unknown command name is rejected when parsing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    AddOneComment { comment: Comment },
    RemoveOneComment { id: String },
    InitAllComments { comments: Vec<Comment> },
    /// Force a full position reconciliation
    UpdatePositions,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddOneComment { .. } => "add_one_comment",
            Command::RemoveOneComment { .. } => "remove_one_comment",
            Command::InitAllComments { .. } => "init_all_comments",
            Command::UpdatePositions => "update_positions",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Script {
        commands: Vec<Command>,
    }

    #[test]
    fn test_commands_parse_from_toml() {
        let script: Script = toml::from_str(
            r#"
            [[commands]]
            command = "add_one_comment"
            comment = { id = "c1", text = "check this", from = 1, to = 4 }

            [[commands]]
            command = "remove_one_comment"
            id = "c1"

            [[commands]]
            command = "update_positions"
            "#,
        )
        .unwrap();

        let names: Vec<_> = script.commands.iter().map(Command::name).collect();
        assert_eq!(
            names,
            vec!["add_one_comment", "remove_one_comment", "update_positions"]
        );
    }

    #[test]
    fn test_unknown_command_is_a_parse_error() {
        let result: Result<Script, _> = toml::from_str(
            r#"
            [[commands]]
            command = "explode"
            "#,
        );
        assert!(result.is_err());
    }
}
