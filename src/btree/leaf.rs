//! Leaf nodes: sorted `(key, row)` cells inside one page.
//!
//! A leaf stores up to [`LEAF_NODE_MAX_CELLS`] fixed-width cells directly
//! after its header, ordered ascending by key with no duplicates:
//!
//! ```text
//! +---------------------+
//! | Leaf header (14B)   |
//! +---------------------+
//! | Cell 0: key | row   |  297 bytes each
//! | Cell 1: key | row   |
//! | ...                 |
//! +---------------------+
//! | unused tail         |
//! +---------------------+
//! ```
//!
//! Capacity and the split counts are pure functions of the page size and
//! the cell width; both sides of a split together always hold exactly
//! `LEAF_NODE_MAX_CELLS + 1` cells.
//!
//! [`LeafNode`] and [`LeafNodeMut`] borrow a page buffer for the duration
//! of one operation; nothing here performs I/O.

use eyre::{bail, ensure, Result};

use super::node::{self, LeafHeader, NodeType, COMMON_NODE_HEADER_SIZE};
use crate::row::ROW_SIZE;
use crate::storage::PAGE_SIZE;

pub const LEAF_NODE_KEY_SIZE: usize = 4;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_HEADER_SIZE: usize = COMMON_NODE_HEADER_SIZE + 8;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: u32 = (LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE) as u32;

/// Cells the upper half keeps after a split.
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: u32 = (LEAF_NODE_MAX_CELLS + 1) / 2;
/// Cells the original page keeps after a split.
pub const LEAF_NODE_LEFT_SPLIT_COUNT: u32 =
    LEAF_NODE_MAX_CELLS + 1 - LEAF_NODE_RIGHT_SPLIT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// Exact match at this cell index.
    Found(u32),
    /// No match; this is the insertion point that keeps the leaf sorted.
    NotFound(u32),
}

#[derive(Debug)]
pub struct LeafNode<'a> {
    data: &'a [u8],
}

pub struct LeafNodeMut<'a> {
    data: &'a mut [u8],
}

fn cell_offset(index: u32) -> usize {
    LEAF_NODE_HEADER_SIZE + index as usize * LEAF_NODE_CELL_SIZE
}

impl<'a> LeafNode<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let kind = node::node_type(data)?;
        ensure!(kind == NodeType::Leaf, "expected leaf node, got {kind:?}");
        Ok(Self { data })
    }

    pub fn num_cells(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().num_cells.get()
    }

    pub fn next_leaf(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().next_leaf.get()
    }

    pub fn key_at(&self, index: u32) -> Result<u32> {
        ensure!(
            index < self.num_cells(),
            "cell index {} out of bounds (num_cells={})",
            index,
            self.num_cells()
        );
        let off = cell_offset(index);
        Ok(u32::from_le_bytes(self.data[off..off + 4].try_into()?))
    }

    /// The serialized row stored in a cell.
    pub fn value_at(&self, index: u32) -> Result<&'a [u8]> {
        ensure!(
            index < self.num_cells(),
            "cell index {} out of bounds (num_cells={})",
            index,
            self.num_cells()
        );
        let off = cell_offset(index) + LEAF_NODE_KEY_SIZE;
        Ok(&self.data[off..off + LEAF_NODE_VALUE_SIZE])
    }

    /// Binary search for the smallest index whose key is >= `key`.
    pub fn find(&self, key: u32) -> SearchResult {
        let mut min = 0u32;
        let mut one_past_max = self.num_cells();

        while min != one_past_max {
            let mid = (min + one_past_max) / 2;
            let off = cell_offset(mid);
            let key_at_mid =
                u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap());
            if key == key_at_mid {
                return SearchResult::Found(mid);
            }
            if key < key_at_mid {
                one_past_max = mid;
            } else {
                min = mid + 1;
            }
        }

        SearchResult::NotFound(min)
    }
}

impl<'a> LeafNodeMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let kind = node::node_type(data)?;
        ensure!(kind == NodeType::Leaf, "expected leaf node, got {kind:?}");
        Ok(Self { data })
    }

    /// Stamps an empty leaf over the page: zero cells, not root, no parent,
    /// no right sibling.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = LeafHeader::from_bytes_mut(data)?;
        header.node_type = NodeType::Leaf as u8;
        header.is_root = 0;
        header.parent.set(0);
        header.num_cells.set(0);
        header.next_leaf.set(0);

        Ok(Self { data })
    }

    pub fn as_ref(&self) -> LeafNode<'_> {
        LeafNode { data: self.data }
    }

    pub fn num_cells(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().num_cells.get()
    }

    pub fn set_num_cells(&mut self, count: u32) -> Result<()> {
        let header = LeafHeader::from_bytes_mut(self.data)?;
        header.num_cells.set(count);
        Ok(())
    }

    pub fn next_leaf(&self) -> u32 {
        LeafHeader::from_bytes(self.data).unwrap().next_leaf.get()
    }

    pub fn set_next_leaf(&mut self, page_num: u32) -> Result<()> {
        let header = LeafHeader::from_bytes_mut(self.data)?;
        header.next_leaf.set(page_num);
        Ok(())
    }

    pub fn key_at(&self, index: u32) -> Result<u32> {
        self.as_ref().key_at(index)
    }

    pub fn find(&self, key: u32) -> SearchResult {
        self.as_ref().find(key)
    }

    /// Inserts a cell at `index`, shifting later cells one slot right.
    ///
    /// The index must come from [`LeafNode::find`] so the leaf stays
    /// sorted. Refuses a full leaf and an exact-match overwrite.
    pub fn insert_at(&mut self, index: u32, key: u32, value: &[u8]) -> Result<()> {
        ensure!(
            value.len() == LEAF_NODE_VALUE_SIZE,
            "cell value must be {} bytes, got {}",
            LEAF_NODE_VALUE_SIZE,
            value.len()
        );

        let count = self.num_cells();
        ensure!(
            count < LEAF_NODE_MAX_CELLS,
            "leaf is full ({count} cells); split required"
        );
        ensure!(
            index <= count,
            "insert index {} out of bounds (num_cells={})",
            index,
            count
        );

        if index < count {
            if self.key_at(index)? == key {
                bail!("key {key} already exists");
            }
            self.data
                .copy_within(cell_offset(index)..cell_offset(count), cell_offset(index + 1));
        }

        self.write_cell(index, key, value);
        self.set_num_cells(count + 1)
    }

    /// Overwrites one cell in place without shifting or bookkeeping. Used
    /// when redistributing cells during a split.
    pub fn write_cell(&mut self, index: u32, key: u32, value: &[u8]) {
        let off = cell_offset(index);
        self.data[off..off + 4].copy_from_slice(&key.to_le_bytes());
        self.data[off + 4..off + 4 + LEAF_NODE_VALUE_SIZE].copy_from_slice(value);
    }
}
