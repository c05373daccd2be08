//! Pager: lazily loaded page buffers over a single file.
//!
//! The pager keeps every page it has ever touched resident until the table
//! is closed; the [`TABLE_MAX_PAGES`] cap bounds memory instead of an
//! eviction policy. Pages are fetched on first access: within the file's
//! existing range they are read from disk, past it they start zero-filled
//! and only reach the file when `flush_all` runs at close time.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use tracing::{debug, trace};

use super::{PAGE_SIZE, TABLE_MAX_PAGES};

type PageBuf = Box<[u8; PAGE_SIZE]>;

/// Owns the backing file and the in-memory page arena.
#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Page slots, indexed by page number. `None` until first access.
    pages: Vec<Option<PageBuf>>,
    /// High-water mark: one past the highest page number in use.
    num_pages: u32,
    /// Pages present in the file when it was opened; only these are read
    /// back from disk on first access.
    disk_pages: u32,
}

impl Pager {
    /// Opens or creates the backing file in read-write mode.
    ///
    /// Fails if the existing file length is not a whole number of pages.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .wrap_err_with(|| format!("unable to open database file {}", path.display()))?;

        let file_len = file.metadata()?.len();
        ensure!(
            file_len % PAGE_SIZE as u64 == 0,
            "database file is not a whole number of pages ({} bytes); corrupt file",
            file_len
        );

        let disk_pages = (file_len / PAGE_SIZE as u64) as u32;
        debug!(path = %path.display(), pages = disk_pages, "opened database file");

        let mut pages = Vec::with_capacity(TABLE_MAX_PAGES);
        pages.resize_with(TABLE_MAX_PAGES, || None);

        Ok(Self {
            file,
            pages,
            num_pages: disk_pages,
            disk_pages,
        })
    }

    /// One past the highest page number in use.
    pub fn page_count(&self) -> u32 {
        self.num_pages
    }

    /// Next unused page number. The page itself is materialized (zeroed)
    /// on first access; the caller is responsible for initializing a node
    /// in it.
    pub fn allocate_page(&self) -> u32 {
        self.num_pages
    }

    /// Borrows a page for reading, loading it on first access.
    pub fn page(&mut self, page_num: u32) -> Result<&[u8]> {
        self.ensure_loaded(page_num)?;
        Ok(&self.pages[page_num as usize].as_ref().unwrap()[..])
    }

    /// Borrows a page for mutation, loading it on first access. Pages are
    /// mutated in place; there is no copy-on-read or copy-on-return.
    pub fn page_mut(&mut self, page_num: u32) -> Result<&mut [u8]> {
        self.ensure_loaded(page_num)?;
        Ok(&mut self.pages[page_num as usize].as_mut().unwrap()[..])
    }

    /// Writes every resident page back to the file and syncs it.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut flushed = 0u32;
        for page_num in 0..self.num_pages {
            if let Some(buf) = &self.pages[page_num as usize] {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
                    .wrap_err_with(|| format!("seek failed while flushing page {page_num}"))?;
                self.file
                    .write_all(&buf[..])
                    .wrap_err_with(|| format!("write failed while flushing page {page_num}"))?;
                flushed += 1;
            }
        }
        self.file.sync_all().wrap_err("fsync of database file failed")?;
        self.disk_pages = self.disk_pages.max(self.num_pages);
        debug!(pages = flushed, "flushed pages to disk");
        Ok(())
    }

    fn ensure_loaded(&mut self, page_num: u32) -> Result<()> {
        ensure!(
            (page_num as usize) < TABLE_MAX_PAGES,
            "page number {} out of bounds (capacity {})",
            page_num,
            TABLE_MAX_PAGES
        );

        if self.pages[page_num as usize].is_none() {
            let mut buf: PageBuf = Box::new([0u8; PAGE_SIZE]);
            if page_num < self.disk_pages {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
                    .wrap_err_with(|| format!("seek failed while reading page {page_num}"))?;
                self.file
                    .read_exact(&mut buf[..])
                    .wrap_err_with(|| format!("short read on page {page_num}"))?;
                trace!(page = page_num, "page read from disk");
            }
            self.pages[page_num as usize] = Some(buf);
        }

        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_empty_file_has_no_pages() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(&dir.path().join("empty.db")).unwrap();
        assert_eq!(pager.page_count(), 0);
    }

    #[test]
    fn first_access_materializes_a_zeroed_page() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("fresh.db")).unwrap();

        let page = pager.page(0).unwrap();
        assert!(page.iter().all(|b| *b == 0));
        assert_eq!(pager.page_count(), 1);
    }

    #[test]
    fn allocate_returns_the_high_water_mark() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("alloc.db")).unwrap();

        assert_eq!(pager.allocate_page(), 0);
        pager.page_mut(0).unwrap();
        assert_eq!(pager.allocate_page(), 1);
        pager.page_mut(1).unwrap();
        assert_eq!(pager.allocate_page(), 2);
    }

    #[test]
    fn data_persists_across_flush_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persist.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            let page = pager.page_mut(0).unwrap();
            page[0..5].copy_from_slice(b"hello");
            let page1 = pager.page_mut(1).unwrap();
            page1[0..5].copy_from_slice(b"world");
            pager.flush_all().unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.page_count(), 2);
        assert_eq!(&pager.page(0).unwrap()[0..5], b"hello");
        assert_eq!(&pager.page(1).unwrap()[0..5], b"world");
    }

    #[test]
    fn page_number_past_capacity_is_rejected() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(&dir.path().join("bounds.db")).unwrap();

        let err = pager.page(TABLE_MAX_PAGES as u32).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn partial_page_file_is_rejected_as_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 17]).unwrap();

        let err = Pager::open(&path).unwrap_err();
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn pages_written_before_flush_are_not_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unflushed.db");

        let mut pager = Pager::open(&path).unwrap();
        let page = pager.page_mut(0).unwrap();
        page[0] = 0xAB;

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        pager.flush_all().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), PAGE_SIZE as u64);
    }
}
