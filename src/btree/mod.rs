//! On-disk B-tree: node layout and tree operations.
//!
//! Every node occupies exactly one page. Leaves hold the rows as sorted
//! fixed-width cells; internal nodes hold routing keys and child page
//! numbers. [`Table`] ties the two together over a [`crate::storage::Pager`]
//! and exposes cursor-based lookup, insertion with splitting, and ordered
//! iteration.

pub mod internal;
pub mod leaf;
pub mod node;
mod tree;

pub use internal::{InternalNode, InternalNodeMut, INTERNAL_NODE_MAX_KEYS};
pub use leaf::{
    LeafNode, LeafNodeMut, SearchResult, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE,
    LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_MAX_CELLS, LEAF_NODE_RIGHT_SPLIT_COUNT,
    LEAF_NODE_SPACE_FOR_CELLS,
};
pub use node::{NodeType, COMMON_NODE_HEADER_SIZE};
pub use tree::{Cursor, Table, MAX_TREE_DEPTH};
