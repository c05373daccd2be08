//! Node header layout shared by both node kinds.
//!
//! Every page holds exactly one node. All nodes begin with a 6-byte common
//! header; the per-kind headers extend it:
//!
//! ```text
//! Offset  Size  Field          Notes
//! ------  ----  -------------  --------------------------------------
//! 0       1     node_type      0 = internal, 1 = leaf
//! 1       1     is_root        exactly one node has this set
//! 2       4     parent         recorded, never consulted
//! --- leaf ---
//! 6       4     num_cells
//! 10      4     next_leaf      page number of right sibling, 0 = none
//! --- internal ---
//! 6       4     num_keys
//! 10      4     right_child    subtree with keys above every stored key
//! ```
//!
//! All integers are little-endian. The headers are `zerocopy` views so they
//! can be read in place at byte offsets inside a page buffer.

use eyre::{bail, ensure, Result};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::storage::PAGE_SIZE;

pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_OFFSET: usize = 1;
pub const PARENT_POINTER_OFFSET: usize = 2;
pub const COMMON_NODE_HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Internal = 0,
    Leaf = 1,
}

impl NodeType {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(NodeType::Internal),
            1 => Ok(NodeType::Leaf),
            other => bail!("invalid node type byte {other:#04x}"),
        }
    }
}

/// Reads the node type tag of a page.
pub fn node_type(page: &[u8]) -> Result<NodeType> {
    ensure!(
        page.len() == PAGE_SIZE,
        "invalid page size: {} != {}",
        page.len(),
        PAGE_SIZE
    );
    NodeType::from_byte(page[NODE_TYPE_OFFSET])
}

pub fn is_root(page: &[u8]) -> bool {
    page[IS_ROOT_OFFSET] == 1
}

pub fn set_root(page: &mut [u8], root: bool) {
    page[IS_ROOT_OFFSET] = root as u8;
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct LeafHeader {
    pub node_type: u8,
    pub is_root: u8,
    pub parent: U32<LittleEndian>,
    pub num_cells: U32<LittleEndian>,
    pub next_leaf: U32<LittleEndian>,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct InternalHeader {
    pub node_type: u8,
    pub is_root: u8,
    pub parent: U32<LittleEndian>,
    pub num_keys: U32<LittleEndian>,
    pub right_child: U32<LittleEndian>,
}

impl LeafHeader {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for leaf header: {} < {}",
            data.len(),
            size_of::<Self>()
        );
        Self::ref_from_bytes(&data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read leaf header: {e:?}"))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for leaf header: {} < {}",
            data.len(),
            size_of::<Self>()
        );
        Self::mut_from_bytes(&mut data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read leaf header: {e:?}"))
    }
}

impl InternalHeader {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for internal header: {} < {}",
            data.len(),
            size_of::<Self>()
        );
        Self::ref_from_bytes(&data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read internal header: {e:?}"))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= size_of::<Self>(),
            "buffer too small for internal header: {} < {}",
            data.len(),
            size_of::<Self>()
        );
        Self::mut_from_bytes(&mut data[..size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read internal header: {e:?}"))
    }
}

/// Highest key reachable through a node's *stored* cells.
///
/// For a leaf this is the key of its last cell. For an internal node it is
/// the last stored key only; the right child's subtree maximum is not
/// tracked here, so callers must not use this to bound the right subtree.
pub fn node_max_key(page: &[u8]) -> Result<u32> {
    match node_type(page)? {
        NodeType::Leaf => {
            let leaf = super::leaf::LeafNode::new(page)?;
            let count = leaf.num_cells();
            ensure!(count > 0, "max key of an empty leaf");
            leaf.key_at(count - 1)
        }
        NodeType::Internal => {
            let node = super::internal::InternalNode::new(page)?;
            let count = node.num_keys();
            ensure!(count > 0, "max key of an internal node with no keys");
            node.key_at(count - 1)
        }
    }
}
