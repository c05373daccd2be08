//! # tablet - a single-table embedded database
//!
//! tablet stores rows of a fixed `(id, username, email)` schema in a
//! disk-backed B-tree and exposes them through a small cursor API plus an
//! interactive REPL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        CLI (REPL, dot commands)      │
//! ├─────────────────────────────────────┤
//! │   Statement layer (insert/select)    │
//! ├─────────────────────────────────────┤
//! │   B-Tree (nodes, splits, cursors)    │
//! ├─────────────────────────────────────┤
//! │   Row codec (fixed-width records)    │
//! ├─────────────────────────────────────┤
//! │   Pager (page arena over one file)   │
//! └─────────────────────────────────────┘
//! ```
//!
//! The file is a flat sequence of 4096-byte pages, each holding one tree
//! node; page 0 is always the root. Pages load lazily, stay resident for
//! the life of the process, and reach disk in one flush when the table is
//! closed. Everything runs single-threaded and synchronously; the only
//! recoverable error in normal operation is a duplicate key.
//!
//! ## Quick start
//!
//! ```no_run
//! use tablet::btree::Table;
//! use tablet::row::Row;
//!
//! # fn main() -> eyre::Result<()> {
//! let mut table = Table::open("./users.db")?;
//!
//! let row = Row::new(1, "alice", "alice@example.com")?;
//! let cursor = table.find(1)?;
//! table.insert(&cursor, 1, &row)?;
//!
//! let mut cursor = table.start()?;
//! while !cursor.end_of_table() {
//!     println!("{}", table.row(&cursor)?);
//!     table.advance(&mut cursor)?;
//! }
//!
//! table.close()?;
//! # Ok(())
//! # }
//! ```

pub mod btree;
pub mod cli;
pub mod row;
pub mod statement;
pub mod storage;

pub use btree::{Cursor, Table};
pub use row::Row;
pub use statement::{ExecuteError, ExecuteOutcome, PrepareError, Statement};
