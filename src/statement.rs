//! Text statements over the table: parsing and execution.
//!
//! Two statements exist: `insert <id> <username> <email>` and `select`.
//! Parsing failures and the duplicate-key condition are ordinary typed
//! errors the REPL reports and moves on from; storage faults pass through
//! untouched and terminate the session.

use eyre::Report;
use thiserror::Error;

use crate::btree::Table;
use crate::row::{Row, RowError};

/// A parsed statement, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Why an input line failed to parse into a [`Statement`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrepareError {
    #[error("unrecognized keyword at start of '{0}'")]
    Unrecognized(String),
    #[error("syntax error: expected 'insert <id> <username> <email>'")]
    Syntax,
    #[error("id must be a non-negative integer")]
    InvalidId,
    #[error(transparent)]
    Row(#[from] RowError),
}

/// Why an execution failed.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The key is already present; the table is unchanged.
    #[error("duplicate key {0}")]
    DuplicateKey(u32),
    /// A storage-layer fault; unrecoverable.
    #[error("{0}")]
    Storage(Report),
}

impl From<Report> for ExecuteError {
    fn from(report: Report) -> Self {
        ExecuteError::Storage(report)
    }
}

/// What a successful execution produced.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Inserted,
    Rows(Vec<Row>),
}

/// Parses one input line into a statement.
pub fn prepare(input: &str) -> Result<Statement, PrepareError> {
    let input = input.trim();

    if let Some(rest) = input.strip_prefix("insert") {
        let args: Vec<&str> = rest.split_whitespace().collect();
        let &[id, username, email] = args.as_slice() else {
            return Err(PrepareError::Syntax);
        };
        let id: u32 = id.parse().map_err(|_| PrepareError::InvalidId)?;
        let row = Row::new(id, username, email)?;
        return Ok(Statement::Insert(row));
    }

    if input == "select" {
        return Ok(Statement::Select);
    }

    Err(PrepareError::Unrecognized(input.to_string()))
}

/// Executes a statement against the table.
///
/// Insert looks the key up first and compares the key at the returned
/// position, so a duplicate is rejected before the tree is touched.
pub fn execute(statement: &Statement, table: &mut Table) -> Result<ExecuteOutcome, ExecuteError> {
    match statement {
        Statement::Insert(row) => {
            let key = row.id();
            let cursor = table.find(key)?;
            if table.key_at(&cursor)? == Some(key) {
                return Err(ExecuteError::DuplicateKey(key));
            }
            table.insert(&cursor, key, row)?;
            Ok(ExecuteOutcome::Inserted)
        }
        Statement::Select => {
            let mut rows = Vec::new();
            let mut cursor = table.start()?;
            while !cursor.end_of_table() {
                rows.push(table.row(&cursor)?);
                table.advance(&mut cursor)?;
            }
            Ok(ExecuteOutcome::Rows(rows))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::USERNAME_MAX_LEN;

    #[test]
    fn prepare_parses_a_well_formed_insert() {
        let statement = prepare("insert 1 user1 person1@example.com").unwrap();
        let Statement::Insert(row) = statement else {
            panic!("expected an insert");
        };
        assert_eq!(row.id(), 1);
        assert_eq!(row.username(), "user1");
        assert_eq!(row.email(), "person1@example.com");
    }

    #[test]
    fn prepare_parses_select() {
        assert_eq!(prepare("select").unwrap(), Statement::Select);
        assert_eq!(prepare("  select  ").unwrap(), Statement::Select);
    }

    #[test]
    fn prepare_rejects_missing_insert_arguments() {
        assert_eq!(prepare("insert 1 user1"), Err(PrepareError::Syntax));
        assert_eq!(prepare("insert"), Err(PrepareError::Syntax));
    }

    #[test]
    fn prepare_rejects_a_negative_id() {
        assert_eq!(
            prepare("insert -3 user user@example.com"),
            Err(PrepareError::InvalidId)
        );
    }

    #[test]
    fn prepare_rejects_an_over_length_username() {
        let long = "u".repeat(USERNAME_MAX_LEN + 1);
        let result = prepare(&format!("insert 1 {long} a@b.c"));
        assert_eq!(
            result,
            Err(PrepareError::Row(RowError::UsernameTooLong(
                USERNAME_MAX_LEN + 1
            )))
        );
    }

    #[test]
    fn prepare_rejects_unknown_keywords() {
        assert_eq!(
            prepare("update 1 user user@example.com"),
            Err(PrepareError::Unrecognized(
                "update 1 user user@example.com".to_string()
            ))
        );
    }
}
