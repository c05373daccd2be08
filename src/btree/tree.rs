//! Table-level B-tree operations: descent, insertion, splits, scans.
//!
//! The tree stores page numbers, never memory pointers, so the structure
//! survives a close/reopen unchanged. The root always lives on page 0:
//! when the root splits, its content is relocated to a freshly allocated
//! page and page 0 is rebuilt as the new internal root, so external
//! tooling can always start a traversal at page 0.
//!
//! Insertion descends from the root recording the visited internal pages.
//! A full leaf splits into two; the split result `(left page, new left
//! max, right page)` is then absorbed by the parent taken from the
//! recorded path. A full parent splits the same way and the result keeps
//! propagating until some ancestor absorbs it or a new root is promoted.

use std::fmt::Write as _;
use std::path::Path;

use eyre::{ensure, eyre, Result};
use smallvec::SmallVec;
use tracing::debug;

use super::internal::{InternalNode, InternalNodeMut, INTERNAL_NODE_MAX_KEYS};
use super::leaf::{
    LeafNode, LeafNodeMut, SearchResult, LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_VALUE_SIZE,
};
use super::node::{self, NodeType};
use crate::row::Row;
use crate::storage::Pager;

/// Descent path capacity; with fan-out 4 this covers far more pages than
/// one file can hold.
pub const MAX_TREE_DEPTH: usize = 8;

type PathStack = SmallVec<[u32; MAX_TREE_DEPTH]>;
type CellValue = [u8; LEAF_NODE_VALUE_SIZE];

/// One open single-table database.
#[derive(Debug)]
pub struct Table {
    pager: Pager,
    root_page: u32,
}

/// A scan position: `(page, cell)` plus the end-of-table flag.
///
/// The cursor also carries the internal pages visited on the way down;
/// insertion uses them to re-link parents after a split.
#[derive(Debug, Clone)]
pub struct Cursor {
    page_num: u32,
    cell_num: u32,
    end_of_table: bool,
    path: PathStack,
}

impl Cursor {
    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn cell_num(&self) -> u32 {
        self.cell_num
    }

    /// True once the cursor has stepped past the last cell of the last
    /// leaf. Never resets.
    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }
}

impl Table {
    /// Opens (or creates) the database file. A brand-new file gets an
    /// empty leaf as its root on page 0.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut pager = Pager::open(path.as_ref())?;

        if pager.page_count() == 0 {
            let page = pager.page_mut(0)?;
            LeafNodeMut::init(page)?;
            node::set_root(page, true);
        }

        Ok(Self {
            pager,
            root_page: 0,
        })
    }

    /// Flushes every resident page and closes the file.
    pub fn close(mut self) -> Result<()> {
        self.pager.flush_all()
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    pub fn page_count(&self) -> u32 {
        self.pager.page_count()
    }

    /// Positions a cursor at `key`, or at the slot where `key` would be
    /// inserted to keep the table sorted.
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let mut path = PathStack::new();
        let mut page_num = self.root_page;

        loop {
            match node::node_type(self.pager.page(page_num)?)? {
                NodeType::Internal => {
                    ensure!(
                        path.len() < MAX_TREE_DEPTH,
                        "tree deeper than {MAX_TREE_DEPTH} levels; page links are corrupt"
                    );
                    let child = {
                        let internal = InternalNode::new(self.pager.page(page_num)?)?;
                        let child_index = internal.find_child_index(key);
                        internal.child_at(child_index)?
                    };
                    path.push(page_num);
                    page_num = child;
                }
                NodeType::Leaf => {
                    let (cell_num, end_of_table) = {
                        let leaf = LeafNode::new(self.pager.page(page_num)?)?;
                        let index = match leaf.find(key) {
                            SearchResult::Found(i) | SearchResult::NotFound(i) => i,
                        };
                        (index, index >= leaf.num_cells() && leaf.next_leaf() == 0)
                    };
                    return Ok(Cursor {
                        page_num,
                        cell_num,
                        end_of_table,
                        path,
                    });
                }
            }
        }
    }

    /// Positions a cursor at the first cell of the leftmost leaf.
    pub fn start(&mut self) -> Result<Cursor> {
        let mut path = PathStack::new();
        let mut page_num = self.root_page;

        loop {
            match node::node_type(self.pager.page(page_num)?)? {
                NodeType::Internal => {
                    ensure!(
                        path.len() < MAX_TREE_DEPTH,
                        "tree deeper than {MAX_TREE_DEPTH} levels; page links are corrupt"
                    );
                    let child = {
                        let internal = InternalNode::new(self.pager.page(page_num)?)?;
                        if internal.num_keys() == 0 {
                            internal.right_child()
                        } else {
                            internal.child_at(0)?
                        }
                    };
                    path.push(page_num);
                    page_num = child;
                }
                NodeType::Leaf => {
                    let empty = LeafNode::new(self.pager.page(page_num)?)?.num_cells() == 0;
                    return Ok(Cursor {
                        page_num,
                        cell_num: 0,
                        end_of_table: empty,
                        path,
                    });
                }
            }
        }
    }

    /// Steps the cursor to the next cell, following the sibling link when
    /// the current leaf is exhausted.
    pub fn advance(&mut self, cursor: &mut Cursor) -> Result<()> {
        if cursor.end_of_table {
            return Ok(());
        }

        let (num_cells, next_leaf) = {
            let leaf = LeafNode::new(self.pager.page(cursor.page_num)?)?;
            (leaf.num_cells(), leaf.next_leaf())
        };

        cursor.cell_num += 1;
        if cursor.cell_num >= num_cells {
            if next_leaf == 0 {
                cursor.end_of_table = true;
            } else {
                cursor.page_num = next_leaf;
                cursor.cell_num = 0;
                let empty = LeafNode::new(self.pager.page(next_leaf)?)?.num_cells() == 0;
                if empty {
                    cursor.end_of_table = true;
                }
            }
        }
        Ok(())
    }

    /// The key stored at the cursor's slot, or `None` when the cursor sits
    /// one past the leaf's last cell.
    pub fn key_at(&mut self, cursor: &Cursor) -> Result<Option<u32>> {
        let leaf = LeafNode::new(self.pager.page(cursor.page_num)?)?;
        if cursor.cell_num < leaf.num_cells() {
            Ok(Some(leaf.key_at(cursor.cell_num)?))
        } else {
            Ok(None)
        }
    }

    /// The serialized row under the cursor.
    pub fn value(&mut self, cursor: &Cursor) -> Result<&[u8]> {
        ensure!(!cursor.end_of_table, "cursor is past the end of the table");
        let page = self.pager.page(cursor.page_num)?;
        LeafNode::new(page)?.value_at(cursor.cell_num)
    }

    /// The decoded row under the cursor.
    pub fn row(&mut self, cursor: &Cursor) -> Result<Row> {
        Row::deserialize(self.value(cursor)?)
    }

    /// Inserts `(key, row)` at a cursor obtained from [`Table::find`].
    ///
    /// Duplicate detection is the caller's job (compare the key at the
    /// cursor first); an exact-match slot is still refused here rather
    /// than silently overwritten.
    pub fn insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let mut value: CellValue = [0; LEAF_NODE_VALUE_SIZE];
        row.serialize_into(&mut value)?;

        let num_cells = LeafNode::new(self.pager.page(cursor.page_num)?)?.num_cells();
        if num_cells >= LEAF_NODE_MAX_CELLS {
            return self.split_leaf_and_insert(cursor, key, &value);
        }

        let page = self.pager.page_mut(cursor.page_num)?;
        LeafNodeMut::new(page)?.insert_at(cursor.cell_num, key, &value)
    }

    /// Splits a full leaf around the new cell: the lower
    /// `LEAF_NODE_LEFT_SPLIT_COUNT` cells stay in place, the rest move to
    /// a fresh page, and the parent absorbs the new sibling.
    fn split_leaf_and_insert(&mut self, cursor: &Cursor, key: u32, value: &CellValue) -> Result<()> {
        let new_page_num = self.pager.allocate_page();

        let mut staged: Vec<(u32, CellValue)> =
            Vec::with_capacity(LEAF_NODE_MAX_CELLS as usize + 1);
        let old_next_leaf;
        let old_is_root;
        {
            let page = self.pager.page(cursor.page_num)?;
            let leaf = LeafNode::new(page)?;
            ensure!(
                cursor.cell_num <= leaf.num_cells(),
                "insert position {} out of bounds (num_cells={})",
                cursor.cell_num,
                leaf.num_cells()
            );
            if cursor.cell_num < leaf.num_cells() && leaf.key_at(cursor.cell_num)? == key {
                eyre::bail!("key {key} already exists");
            }
            for i in 0..leaf.num_cells() {
                let mut cell: CellValue = [0; LEAF_NODE_VALUE_SIZE];
                cell.copy_from_slice(leaf.value_at(i)?);
                staged.push((leaf.key_at(i)?, cell));
            }
            old_next_leaf = leaf.next_leaf();
            old_is_root = node::is_root(page);
        }
        staged.insert(cursor.cell_num as usize, (key, *value));

        let left_count = LEAF_NODE_LEFT_SPLIT_COUNT as usize;
        {
            let page = self.pager.page_mut(cursor.page_num)?;
            let mut leaf = LeafNodeMut::new(page)?;
            for (i, (k, v)) in staged[..left_count].iter().enumerate() {
                leaf.write_cell(i as u32, *k, v);
            }
            leaf.set_num_cells(left_count as u32)?;
            leaf.set_next_leaf(new_page_num)?;
        }
        {
            let page = self.pager.page_mut(new_page_num)?;
            let mut leaf = LeafNodeMut::init(page)?;
            for (i, (k, v)) in staged[left_count..].iter().enumerate() {
                leaf.write_cell(i as u32, *k, v);
            }
            leaf.set_num_cells((staged.len() - left_count) as u32)?;
            leaf.set_next_leaf(old_next_leaf)?;
        }

        let separator = staged[left_count - 1].0;
        debug!(
            page = cursor.page_num,
            new_page = new_page_num,
            separator,
            "split leaf"
        );

        debug_assert!(!old_is_root || cursor.path.is_empty());
        self.propagate_split(cursor.path.clone(), cursor.page_num, separator, new_page_num)
    }

    /// Walks the recorded descent path upward, absorbing a split result
    /// `(left page, separator, right page)` into each parent until one has
    /// room, splitting parents that do not. An exhausted path means the
    /// root itself split and a new root is promoted.
    fn propagate_split(
        &mut self,
        mut path: PathStack,
        mut left_page: u32,
        mut separator: u32,
        mut right_page: u32,
    ) -> Result<()> {
        loop {
            let Some(parent_page) = path.pop() else {
                ensure!(
                    left_page == self.root_page,
                    "split page {left_page} has no recorded parent and is not the root"
                );
                return self.promote_root(separator, right_page);
            };

            let full =
                InternalNode::new(self.pager.page(parent_page)?)?.num_keys() >= INTERNAL_NODE_MAX_KEYS;
            if !full {
                let page = self.pager.page_mut(parent_page)?;
                let mut parent = InternalNodeMut::new(page)?;
                if parent.right_child() == left_page {
                    // The split child was rightmost: it gains a stored
                    // cell and the new sibling becomes the right child.
                    parent.append_cell(left_page, separator)?;
                    parent.set_right_child(right_page);
                } else {
                    // The child's old stored key is exactly the upper
                    // half's maximum, so it moves onto the new sibling.
                    let index = parent.cell_index_of_child(left_page)?;
                    let old_key = parent.key_at(index)?;
                    parent.set_key(index, separator)?;
                    parent.insert_cell_at(index + 1, right_page, old_key)?;
                }
                return Ok(());
            }

            let (promoted, new_right) =
                self.split_internal(parent_page, left_page, separator, right_page)?;
            left_page = parent_page;
            separator = promoted;
            right_page = new_right;
        }
    }

    /// Splits a full internal node while absorbing one pending child
    /// update + sibling insert. Returns the separator and page number to
    /// hand to the next ancestor.
    fn split_internal(
        &mut self,
        page_num: u32,
        child_left: u32,
        child_separator: u32,
        child_right: u32,
    ) -> Result<(u32, u32)> {
        // Children in order. The final entry is the right child, whose
        // subtree maximum is not tracked (and stays untracked: it remains
        // the rightmost child after the split).
        let mut entries: Vec<(u32, Option<u32>)> = Vec::new();
        {
            let internal = InternalNode::new(self.pager.page(page_num)?)?;
            for i in 0..internal.num_keys() {
                entries.push((internal.child_at(i)?, Some(internal.key_at(i)?)));
            }
            entries.push((internal.right_child(), None));
        }

        let pos = entries
            .iter()
            .position(|(child, _)| *child == child_left)
            .ok_or_else(|| eyre!("page {child_left} is not a child of internal node {page_num}"))?;
        let old_key = entries[pos].1;
        entries[pos].1 = Some(child_separator);
        match old_key {
            Some(key) => entries.insert(pos + 1, (child_right, Some(key))),
            None => entries.push((child_right, None)),
        }

        let new_page_num = self.pager.allocate_page();
        let total = entries.len();
        let left_children = (total + 1) / 2;
        let separator = entries[left_children - 1]
            .1
            .ok_or_else(|| eyre!("split boundary landed on the untracked right child"))?;

        {
            let page = self.pager.page_mut(page_num)?;
            let mut internal = InternalNodeMut::new(page)?;
            for (i, (child, key)) in entries[..left_children - 1].iter().enumerate() {
                let key = key.ok_or_else(|| eyre!("missing separator for child {child}"))?;
                internal.write_cell(i as u32, *child, key);
            }
            internal.set_num_keys(left_children as u32 - 1)?;
            internal.set_right_child(entries[left_children - 1].0);
        }
        {
            let page = self.pager.page_mut(new_page_num)?;
            let mut internal = InternalNodeMut::init(page)?;
            for (i, (child, key)) in entries[left_children..total - 1].iter().enumerate() {
                let key = key.ok_or_else(|| eyre!("missing separator for child {child}"))?;
                internal.write_cell(i as u32, *child, key);
            }
            internal.set_num_keys((total - 1 - left_children) as u32)?;
            internal.set_right_child(entries[total - 1].0);
        }

        debug!(
            page = page_num,
            new_page = new_page_num,
            separator,
            "split internal node"
        );
        Ok((separator, new_page_num))
    }

    /// Replaces the root in place after it split. The old root's content
    /// moves to a fresh page (its number must change, never the root's),
    /// and page 0 becomes an internal node over the two halves.
    fn promote_root(&mut self, separator: u32, right_page: u32) -> Result<()> {
        let left_page = self.pager.allocate_page();

        let root_copy = self.pager.page(self.root_page)?.to_vec();
        {
            let page = self.pager.page_mut(left_page)?;
            page.copy_from_slice(&root_copy);
            node::set_root(page, false);
        }
        {
            let page = self.pager.page_mut(self.root_page)?;
            let mut root = InternalNodeMut::init(page)?;
            root.append_cell(left_page, separator)?;
            root.set_right_child(right_page);
        }
        node::set_root(self.pager.page_mut(self.root_page)?, true);

        debug!(
            left = left_page,
            right = right_page,
            separator,
            "promoted new root"
        );
        Ok(())
    }

    /// Renders the whole tree as indented text, one node per `- kind
    /// (size N)` line with keys underneath.
    pub fn render_tree(&mut self) -> Result<String> {
        let mut out = String::new();
        self.render_node(self.root_page, 0, &mut out)?;
        Ok(out)
    }

    fn render_node(&mut self, page_num: u32, depth: usize, out: &mut String) -> Result<()> {
        match node::node_type(self.pager.page(page_num)?)? {
            NodeType::Leaf => {
                let keys: Vec<u32> = {
                    let leaf = LeafNode::new(self.pager.page(page_num)?)?;
                    (0..leaf.num_cells())
                        .map(|i| leaf.key_at(i))
                        .collect::<Result<_>>()?
                };
                indent(out, depth);
                writeln!(out, "- leaf (size {})", keys.len())?;
                for key in keys {
                    indent(out, depth + 1);
                    writeln!(out, "- {key}")?;
                }
            }
            NodeType::Internal => {
                let (children, keys, right_child) = {
                    let internal = InternalNode::new(self.pager.page(page_num)?)?;
                    let mut children = Vec::new();
                    let mut keys = Vec::new();
                    for i in 0..internal.num_keys() {
                        children.push(internal.child_at(i)?);
                        keys.push(internal.key_at(i)?);
                    }
                    (children, keys, internal.right_child())
                };
                indent(out, depth);
                writeln!(out, "- internal (size {})", keys.len())?;
                for (child, key) in children.iter().zip(&keys) {
                    self.render_node(*child, depth + 1, out)?;
                    indent(out, depth + 1);
                    writeln!(out, "- key {key}")?;
                }
                self.render_node(right_child, depth + 1, out)?;
            }
        }
        Ok(())
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_table(dir: &tempfile::TempDir) -> Table {
        Table::open(dir.path().join("test.db")).unwrap()
    }

    fn insert_key(table: &mut Table, key: u32) {
        let row = Row::new(key, &format!("user{key}"), &format!("person{key}@example.com"))
            .unwrap();
        let cursor = table.find(key).unwrap();
        table.insert(&cursor, key, &row).unwrap();
    }

    fn scan_keys(table: &mut Table) -> Vec<u32> {
        let mut keys = Vec::new();
        let mut cursor = table.start().unwrap();
        while !cursor.end_of_table() {
            keys.push(table.row(&cursor).unwrap().id());
            table.advance(&mut cursor).unwrap();
        }
        keys
    }

    #[test]
    fn new_table_has_an_empty_root_leaf() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);

        assert_eq!(table.root_page(), 0);
        assert_eq!(table.render_tree().unwrap(), "- leaf (size 0)\n");

        let cursor = table.start().unwrap();
        assert!(cursor.end_of_table());
    }

    #[test]
    fn find_then_insert_round_trips_a_row() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);
        insert_key(&mut table, 42);

        let cursor = table.find(42).unwrap();
        assert_eq!(table.key_at(&cursor).unwrap(), Some(42));
        let row = table.row(&cursor).unwrap();
        assert_eq!(row.id(), 42);
        assert_eq!(row.username(), "user42");
        assert_eq!(row.email(), "person42@example.com");
    }

    #[test]
    fn thirteen_rows_fit_in_the_root_leaf() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);
        for key in 1..=LEAF_NODE_MAX_CELLS {
            insert_key(&mut table, key);
        }

        assert_eq!(table.page_count(), 1);
        assert_eq!(scan_keys(&mut table), (1..=13).collect::<Vec<_>>());
    }

    #[test]
    fn fourteenth_row_promotes_an_internal_root() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);
        for key in 1..=LEAF_NODE_MAX_CELLS + 1 {
            insert_key(&mut table, key);
        }

        let rendered = table.render_tree().unwrap();
        let expected = "\
- internal (size 1)
  - leaf (size 7)
    - 1
    - 2
    - 3
    - 4
    - 5
    - 6
    - 7
  - key 7
  - leaf (size 7)
    - 8
    - 9
    - 10
    - 11
    - 12
    - 13
    - 14
";
        assert_eq!(rendered, expected);
        assert_eq!(scan_keys(&mut table), (1..=14).collect::<Vec<_>>());
    }

    #[test]
    fn descending_inserts_scan_in_ascending_order() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);
        for key in (1..=40).rev() {
            insert_key(&mut table, key);
        }

        assert_eq!(scan_keys(&mut table), (1..=40).collect::<Vec<_>>());
    }

    #[test]
    fn exact_match_insert_is_refused_at_the_tree_level() {
        let dir = tempdir().unwrap();
        let mut table = open_table(&dir);
        insert_key(&mut table, 9);

        let row = Row::new(9, "other", "other@example.com").unwrap();
        let cursor = table.find(9).unwrap();
        let err = table.insert(&cursor, 9, &row).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
