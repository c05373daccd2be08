//! Page-granular file storage.
//!
//! The storage layer owns the backing file and a fixed-capacity arena of
//! in-memory page buffers. Everything above it addresses pages by number;
//! page numbers are the only handles that survive a close/reopen, so no
//! component holds native references to page memory across operations.
//!
//! A database file is a flat sequence of [`PAGE_SIZE`]-byte pages. Page 0
//! always holds the table's root node. Any file whose length is not a whole
//! multiple of the page size is treated as corrupt at open time.

mod pager;

pub use pager::Pager;

/// Size of one page on disk and in memory.
pub const PAGE_SIZE: usize = 4096;

/// Upper bound on pages per database file.
pub const TABLE_MAX_PAGES: usize = 100;
