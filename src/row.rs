//! Fixed-width row serialization.
//!
//! Every row is stored as exactly [`ROW_SIZE`] bytes inside a leaf cell:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  --------------------------------
//! 0       4     id (u32, little-endian)
//! 4       33    username (NUL-terminated, padded)
//! 37      256   email (NUL-terminated, padded)
//! ```
//!
//! String fields reserve one byte past their maximum length for the
//! terminator, so a maximum-length value is still NUL-terminated on disk.

use std::fmt;

use eyre::{ensure, eyre, Result};
use thiserror::Error;

/// Maximum username length in bytes.
pub const USERNAME_MAX_LEN: usize = 32;
/// Maximum email length in bytes.
pub const EMAIL_MAX_LEN: usize = 255;

const ID_SIZE: usize = 4;
const USERNAME_FIELD_SIZE: usize = USERNAME_MAX_LEN + 1;
const EMAIL_FIELD_SIZE: usize = EMAIL_MAX_LEN + 1;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_FIELD_SIZE;

/// Serialized width of one row.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_FIELD_SIZE + EMAIL_FIELD_SIZE;

/// A row rejected at construction time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("username is too long ({0} bytes, max {USERNAME_MAX_LEN})")]
    UsernameTooLong(usize),
    #[error("email is too long ({0} bytes, max {EMAIL_MAX_LEN})")]
    EmailTooLong(usize),
}

/// One record of the fixed `(id, username, email)` schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: u32,
    username: String,
    email: String,
}

impl Row {
    /// Builds a row, rejecting over-length string fields.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, RowError> {
        if username.len() > USERNAME_MAX_LEN {
            return Err(RowError::UsernameTooLong(username.len()));
        }
        if email.len() > EMAIL_MAX_LEN {
            return Err(RowError::EmailTooLong(email.len()));
        }
        Ok(Self {
            id,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Writes the row into a cell value region. The destination is
    /// zero-filled first, so both strings come out NUL-padded.
    pub fn serialize_into(&self, out: &mut [u8]) -> Result<()> {
        ensure!(
            out.len() >= ROW_SIZE,
            "value region too small for row: {} < {}",
            out.len(),
            ROW_SIZE
        );

        let out = &mut out[..ROW_SIZE];
        out.fill(0);
        out[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        out[USERNAME_OFFSET..USERNAME_OFFSET + self.username.len()]
            .copy_from_slice(self.username.as_bytes());
        out[EMAIL_OFFSET..EMAIL_OFFSET + self.email.len()].copy_from_slice(self.email.as_bytes());
        Ok(())
    }

    /// Reads a row back out of a cell value region.
    pub fn deserialize(src: &[u8]) -> Result<Self> {
        ensure!(
            src.len() >= ROW_SIZE,
            "value region too small for row: {} < {}",
            src.len(),
            ROW_SIZE
        );

        let id = u32::from_le_bytes(src[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into()?);
        let username = read_padded_str(&src[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_FIELD_SIZE])?;
        let email = read_padded_str(&src[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_FIELD_SIZE])?;

        Ok(Self {
            id,
            username,
            email,
        })
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

fn read_padded_str(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    let s = std::str::from_utf8(&field[..end])
        .map_err(|e| eyre!("stored string is not valid UTF-8: {e}"))?;
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_size_matches_layout() {
        assert_eq!(ROW_SIZE, 293);
    }

    #[test]
    fn serialize_then_deserialize_round_trips() {
        let row = Row::new(42, "alice", "alice@example.com").unwrap();
        let mut buf = [0xFFu8; ROW_SIZE];
        row.serialize_into(&mut buf).unwrap();

        let decoded = Row::deserialize(&buf).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn maximum_length_fields_round_trip() {
        let username = "u".repeat(USERNAME_MAX_LEN);
        let email = "e".repeat(EMAIL_MAX_LEN);
        let row = Row::new(1, &username, &email).unwrap();

        let mut buf = [0u8; ROW_SIZE];
        row.serialize_into(&mut buf).unwrap();
        let decoded = Row::deserialize(&buf).unwrap();

        assert_eq!(decoded.username(), username);
        assert_eq!(decoded.email(), email);
    }

    #[test]
    fn over_length_username_is_rejected() {
        let username = "u".repeat(USERNAME_MAX_LEN + 1);
        assert_eq!(
            Row::new(1, &username, "a@b.c"),
            Err(RowError::UsernameTooLong(USERNAME_MAX_LEN + 1))
        );
    }

    #[test]
    fn over_length_email_is_rejected() {
        let email = "e".repeat(EMAIL_MAX_LEN + 1);
        assert_eq!(
            Row::new(1, "user", &email),
            Err(RowError::EmailTooLong(EMAIL_MAX_LEN + 1))
        );
    }

    #[test]
    fn serialized_strings_are_nul_terminated() {
        let row = Row::new(7, "bob", "bob@example.com").unwrap();
        let mut buf = [0xAAu8; ROW_SIZE];
        row.serialize_into(&mut buf).unwrap();

        assert_eq!(buf[USERNAME_OFFSET + 3], 0);
        assert_eq!(buf[EMAIL_OFFSET + 15], 0);
    }

    #[test]
    fn display_formats_like_a_tuple() {
        let row = Row::new(1, "user1", "person1@example.com").unwrap();
        assert_eq!(row.to_string(), "(1, user1, person1@example.com)");
    }
}
