//! Meta-command dispatch.
//!
//! Lines starting with `.` are meta commands, not statements. They are
//! matched case-insensitively and either produce text, signal the REPL to
//! exit, or report an error without terminating the session.

use crate::btree::{
    Table, COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_SPACE_FOR_CELLS,
};
use crate::row::ROW_SIZE;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Output(String),
    Exit,
    Continue,
    Error(String),
}

pub struct CommandHandler;

impl CommandHandler {
    pub fn is_command(input: &str) -> bool {
        input.trim().starts_with('.')
    }

    pub fn execute(input: &str, table: &mut Table) -> CommandResult {
        let input = input.trim();
        let parts: Vec<&str> = input.split_whitespace().collect();

        let Some(cmd) = parts.first() else {
            return CommandResult::Continue;
        };

        match cmd.to_lowercase().as_str() {
            ".exit" | ".quit" | ".q" => CommandResult::Exit,
            ".help" | ".h" | ".?" => CommandResult::Output(help_text()),
            ".btree" => match table.render_tree() {
                Ok(rendered) => CommandResult::Output(format!("Tree:\n{rendered}")),
                Err(err) => CommandResult::Error(format!("could not render tree: {err}")),
            },
            ".constants" => CommandResult::Output(constants_text()),
            other => CommandResult::Error(format!(
                "Unknown command: {other}. Type .help for available commands."
            )),
        }
    }
}

fn help_text() -> String {
    r#"tablet commands:

  .exit, .quit, .q     Flush pages and exit
  .help, .h, .?        Show this help message
  .btree               Print the table's tree, node by node
  .constants           Print the on-disk layout constants

Statements:
  insert <id> <username> <email>
  select"#
        .to_string()
}

fn constants_text() -> String {
    format!(
        "Constants:\n\
         ROW_SIZE: {ROW_SIZE}\n\
         COMMON_NODE_HEADER_SIZE: {COMMON_NODE_HEADER_SIZE}\n\
         LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}\n\
         LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}\n\
         LEAF_NODE_SPACE_FOR_CELLS: {LEAF_NODE_SPACE_FOR_CELLS}\n\
         LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_table(dir: &tempfile::TempDir) -> Table {
        Table::open(dir.path().join("cli.db")).unwrap()
    }

    #[test]
    fn dot_prefix_marks_a_command() {
        assert!(CommandHandler::is_command(".exit"));
        assert!(CommandHandler::is_command("  .btree"));
        assert!(!CommandHandler::is_command("select"));
    }

    #[test]
    fn exit_aliases_all_signal_exit() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);
        for cmd in [".exit", ".quit", ".q", ".EXIT"] {
            assert_eq!(CommandHandler::execute(cmd, &mut table), CommandResult::Exit);
        }
    }

    #[test]
    fn btree_renders_the_tree() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);

        let result = CommandHandler::execute(".btree", &mut table);
        assert_eq!(
            result,
            CommandResult::Output("Tree:\n- leaf (size 0)\n".to_string())
        );
    }

    #[test]
    fn constants_reports_the_leaf_capacity() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);

        let CommandResult::Output(text) = CommandHandler::execute(".constants", &mut table) else {
            panic!("expected output");
        };
        assert!(text.contains("ROW_SIZE: 293"));
        assert!(text.contains("LEAF_NODE_MAX_CELLS: 13"));
    }

    #[test]
    fn unknown_command_is_an_error() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);

        let result = CommandHandler::execute(".bogus", &mut table);
        assert!(matches!(result, CommandResult::Error(_)));
    }
}
