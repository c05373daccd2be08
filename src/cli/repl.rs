//! The interactive prompt loop.
//!
//! Reads lines with rustyline, dispatches dot commands, and executes
//! statements. Recoverable errors (parse failures, duplicate keys) are
//! printed and the loop continues; storage faults end the session with an
//! error. Exiting through any path flushes the table to disk.

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::btree::Table;
use crate::cli::commands::{CommandHandler, CommandResult};
use crate::cli::history::history_path;
use crate::statement::{self, ExecuteError, ExecuteOutcome};

const PROMPT: &str = "tablet> ";

pub struct Repl {
    table: Table,
    editor: DefaultEditor,
}

impl Repl {
    pub fn new(table: Table) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;

        if let Some(history_file) = history_path() {
            let _ = editor.load_history(&history_file);
        }

        Ok(Self { table, editor })
    }

    pub fn run(mut self) -> Result<()> {
        println!("tablet {}", env!("CARGO_PKG_VERSION"));
        println!("Type .help for commands, .exit to quit.");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());
                    if !self.handle_line(&line)? {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading input: {err}");
                    break;
                }
            }
        }

        if let Some(history_file) = history_path() {
            let _ = self.editor.save_history(&history_file);
        }
        self.table.close()
    }

    /// Returns false when the session should end.
    fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        if CommandHandler::is_command(line) {
            match CommandHandler::execute(line, &mut self.table) {
                CommandResult::Exit => return Ok(false),
                CommandResult::Output(text) => println!("{text}"),
                CommandResult::Error(message) => println!("{message}"),
                CommandResult::Continue => {}
            }
            return Ok(true);
        }

        let statement = match statement::prepare(line) {
            Ok(statement) => statement,
            Err(err) => {
                println!("Error: {err}.");
                return Ok(true);
            }
        };

        match statement::execute(&statement, &mut self.table) {
            Ok(ExecuteOutcome::Inserted) => println!("Executed."),
            Ok(ExecuteOutcome::Rows(rows)) => {
                for row in rows {
                    println!("{row}");
                }
                println!("Executed.");
            }
            Err(ExecuteError::Storage(report)) => return Err(report),
            Err(err) => println!("Error: {err}."),
        }
        Ok(true)
    }
}
