//! Internal nodes: routing keys and child page numbers.
//!
//! An internal node stores `(child, key)` cells after its header plus one
//! extra right-child pointer in the header itself:
//!
//! ```text
//! +------------------------+
//! | Internal header (14B)  |  num_keys, right_child
//! +------------------------+
//! | Cell 0: child | key    |  8 bytes each
//! | Cell 1: child | key    |
//! | ...                    |
//! +------------------------+
//! ```
//!
//! Cell *i*'s key equals the maximum key in the subtree rooted at child
//! *i*; the right child holds every key greater than all stored keys.
//! Children are ordered ascending, so routing a key means finding the
//! first stored key that is >= it.

use eyre::{bail, ensure, Result};

use super::node::{self, InternalHeader, NodeType, COMMON_NODE_HEADER_SIZE};
use crate::storage::PAGE_SIZE;

pub const INTERNAL_NODE_CHILD_SIZE: usize = 4;
pub const INTERNAL_NODE_KEY_SIZE: usize = 4;
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;
pub const INTERNAL_NODE_HEADER_SIZE: usize = COMMON_NODE_HEADER_SIZE + 8;

/// Key capacity of an internal node. Kept far below what the page could
/// hold so splits cascade long before the 100-page file budget runs out.
pub const INTERNAL_NODE_MAX_KEYS: u32 = 3;

#[derive(Debug)]
pub struct InternalNode<'a> {
    data: &'a [u8],
}

pub struct InternalNodeMut<'a> {
    data: &'a mut [u8],
}

fn cell_offset(index: u32) -> usize {
    INTERNAL_NODE_HEADER_SIZE + index as usize * INTERNAL_NODE_CELL_SIZE
}

impl<'a> InternalNode<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let kind = node::node_type(data)?;
        ensure!(
            kind == NodeType::Internal,
            "expected internal node, got {kind:?}"
        );
        Ok(Self { data })
    }

    pub fn num_keys(&self) -> u32 {
        InternalHeader::from_bytes(self.data).unwrap().num_keys.get()
    }

    pub fn right_child(&self) -> u32 {
        InternalHeader::from_bytes(self.data)
            .unwrap()
            .right_child
            .get()
    }

    pub fn key_at(&self, index: u32) -> Result<u32> {
        ensure!(
            index < self.num_keys(),
            "key index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        let off = cell_offset(index) + INTERNAL_NODE_CHILD_SIZE;
        Ok(u32::from_le_bytes(self.data[off..off + 4].try_into()?))
    }

    /// Resolves child number `index`: a stored cell for `index < num_keys`,
    /// the right child for `index == num_keys`. Anything greater is a logic
    /// error.
    pub fn child_at(&self, index: u32) -> Result<u32> {
        let num_keys = self.num_keys();
        if index > num_keys {
            bail!("child index {index} out of bounds (num_keys={num_keys})");
        }
        if index == num_keys {
            return Ok(self.right_child());
        }
        let off = cell_offset(index);
        Ok(u32::from_le_bytes(self.data[off..off + 4].try_into()?))
    }

    /// Binary search for the child whose subtree may contain `key`: the
    /// first cell with a stored key >= `key`, or the right child.
    pub fn find_child_index(&self, key: u32) -> u32 {
        let mut min = 0u32;
        let mut max = self.num_keys();

        while min != max {
            let mid = (min + max) / 2;
            let off = cell_offset(mid) + INTERNAL_NODE_CHILD_SIZE;
            let key_at_mid =
                u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap());
            if key_at_mid >= key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }

        min
    }
}

impl<'a> InternalNodeMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let kind = node::node_type(data)?;
        ensure!(
            kind == NodeType::Internal,
            "expected internal node, got {kind:?}"
        );
        Ok(Self { data })
    }

    /// Stamps an empty internal node over the page: zero keys, not root,
    /// no parent.
    pub fn init(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = InternalHeader::from_bytes_mut(data)?;
        header.node_type = NodeType::Internal as u8;
        header.is_root = 0;
        header.parent.set(0);
        header.num_keys.set(0);
        header.right_child.set(0);

        Ok(Self { data })
    }

    pub fn as_ref(&self) -> InternalNode<'_> {
        InternalNode { data: self.data }
    }

    pub fn num_keys(&self) -> u32 {
        self.as_ref().num_keys()
    }

    pub fn set_num_keys(&mut self, count: u32) -> Result<()> {
        let header = InternalHeader::from_bytes_mut(self.data)?;
        header.num_keys.set(count);
        Ok(())
    }

    pub fn right_child(&self) -> u32 {
        self.as_ref().right_child()
    }

    pub fn set_right_child(&mut self, page_num: u32) {
        let header = InternalHeader::from_bytes_mut(self.data).unwrap();
        header.right_child.set(page_num);
    }

    pub fn key_at(&self, index: u32) -> Result<u32> {
        self.as_ref().key_at(index)
    }

    pub fn child_at(&self, index: u32) -> Result<u32> {
        self.as_ref().child_at(index)
    }

    pub fn set_key(&mut self, index: u32, key: u32) -> Result<()> {
        ensure!(
            index < self.num_keys(),
            "key index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        let off = cell_offset(index) + INTERNAL_NODE_CHILD_SIZE;
        self.data[off..off + 4].copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    /// Overwrites one cell in place without shifting or bookkeeping. Used
    /// when redistributing children during a split.
    pub fn write_cell(&mut self, index: u32, child: u32, key: u32) {
        let off = cell_offset(index);
        self.data[off..off + 4].copy_from_slice(&child.to_le_bytes());
        self.data[off + 4..off + 8].copy_from_slice(&key.to_le_bytes());
    }

    /// Inserts a cell at `index`, shifting later cells one slot right.
    pub fn insert_cell_at(&mut self, index: u32, child: u32, key: u32) -> Result<()> {
        let count = self.num_keys();
        ensure!(
            count < INTERNAL_NODE_MAX_KEYS,
            "internal node is full ({count} keys); split required"
        );
        ensure!(
            index <= count,
            "insert index {} out of bounds (num_keys={})",
            index,
            count
        );

        if index < count {
            self.data
                .copy_within(cell_offset(index)..cell_offset(count), cell_offset(index + 1));
        }
        self.write_cell(index, child, key);
        self.set_num_keys(count + 1)
    }

    /// Appends a cell after the current last one.
    pub fn append_cell(&mut self, child: u32, key: u32) -> Result<()> {
        let count = self.num_keys();
        self.insert_cell_at(count, child, key)
    }

    /// Index of the stored cell pointing at `child_page`. The right child
    /// is not a stored cell and is the caller's case to handle.
    pub fn cell_index_of_child(&self, child_page: u32) -> Result<u32> {
        for i in 0..self.num_keys() {
            if self.child_at(i)? == child_page {
                return Ok(i);
            }
        }
        bail!(
            "page {child_page} is not a stored child of this internal node (num_keys={})",
            self.num_keys()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[test]
    fn init_produces_an_empty_node() {
        let mut page = make_page();
        let node = InternalNodeMut::init(&mut page).unwrap();
        assert_eq!(node.num_keys(), 0);
        assert_eq!(node.right_child(), 0);
    }

    #[test]
    fn cells_and_right_child_round_trip() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(&mut page).unwrap();
        node.append_cell(2, 7).unwrap();
        node.append_cell(3, 14).unwrap();
        node.set_right_child(4);

        let view = InternalNode::new(&page).unwrap();
        assert_eq!(view.num_keys(), 2);
        assert_eq!(view.key_at(0).unwrap(), 7);
        assert_eq!(view.child_at(0).unwrap(), 2);
        assert_eq!(view.child_at(1).unwrap(), 3);
        assert_eq!(view.child_at(2).unwrap(), 4);
    }

    #[test]
    fn child_index_past_num_keys_is_an_error() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(&mut page).unwrap();
        node.append_cell(2, 7).unwrap();
        node.set_right_child(3);

        let view = InternalNode::new(&page).unwrap();
        let err = view.child_at(2).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn find_child_index_routes_by_stored_keys() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(&mut page).unwrap();
        node.append_cell(2, 10).unwrap();
        node.append_cell(3, 20).unwrap();
        node.set_right_child(4);

        let view = InternalNode::new(&page).unwrap();
        assert_eq!(view.find_child_index(5), 0);
        assert_eq!(view.find_child_index(10), 0);
        assert_eq!(view.find_child_index(11), 1);
        assert_eq!(view.find_child_index(20), 1);
        assert_eq!(view.find_child_index(21), 2);
    }

    #[test]
    fn insert_cell_at_shifts_later_cells() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(&mut page).unwrap();
        node.append_cell(2, 10).unwrap();
        node.append_cell(4, 30).unwrap();

        node.insert_cell_at(1, 3, 20).unwrap();

        assert_eq!(node.num_keys(), 3);
        assert_eq!(node.child_at(0).unwrap(), 2);
        assert_eq!(node.key_at(1).unwrap(), 20);
        assert_eq!(node.child_at(1).unwrap(), 3);
        assert_eq!(node.key_at(2).unwrap(), 30);
    }

    #[test]
    fn full_node_refuses_plain_insert() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(&mut page).unwrap();
        for i in 0..INTERNAL_NODE_MAX_KEYS {
            node.append_cell(i + 2, (i + 1) * 10).unwrap();
        }

        let err = node.append_cell(9, 99).unwrap_err();
        assert!(err.to_string().contains("full"));
    }

    #[test]
    fn cell_index_of_child_finds_stored_children_only() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(&mut page).unwrap();
        node.append_cell(2, 10).unwrap();
        node.append_cell(3, 20).unwrap();
        node.set_right_child(4);

        assert_eq!(node.cell_index_of_child(3).unwrap(), 1);
        assert!(node.cell_index_of_child(4).is_err());
    }
}
