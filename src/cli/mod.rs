//! Interactive command-line surface: REPL, meta commands, history.

mod commands;
mod history;
mod repl;

pub use commands::{CommandHandler, CommandResult};
pub use repl::Repl;
