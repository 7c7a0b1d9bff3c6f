use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::node::Node;
use crate::core::types::ProfileId;
use crate::dataset::store::{DataSet, DataSetError};

/// Character used for positions a signature or match does not cover
pub const MASK_CHARACTER: u8 = b'_';

/// One row of the signature table: an ordered set of nodes identifying a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Offset of this signature in the signature table
    pub index: i32,

    /// Popularity rank, 0 is the most common
    pub rank: i32,

    /// Offsets of the nodes forming this signature, strictly ascending
    pub node_offsets: Vec<i32>,

    /// Profiles this signature resolves to, at most one per component
    pub profile_ids: Vec<ProfileId>,

    /// Number of characters from the start of the string to the end of the last node
    pub length: i32,
}

impl Signature {
    /// Compare this signature with an ordered node list.
    ///
    /// Offsets are compared elementwise and the first difference decides. When one
    /// side is a prefix of the other the shorter one is less.
    #[must_use]
    pub fn compare_to_nodes(&self, nodes: &[&Node]) -> Ordering {
        self.node_offsets
            .iter()
            .zip(nodes)
            .map(|(offset, node)| offset.cmp(&node.index))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| self.node_offsets.len().cmp(&nodes.len()))
    }

    /// Render the signature as a string with uncovered characters masked.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a node offset does not resolve.
    pub fn render(&self, dataset: &DataSet) -> Result<String, DataSetError> {
        let length = usize::try_from(self.length).unwrap_or_default();
        let mut buffer = vec![MASK_CHARACTER; length];
        for &offset in &self.node_offsets {
            let node = dataset.node(offset)?;
            overlay(&mut buffer, node);
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Copy a node's characters into a masked buffer at the node's position.
pub(crate) fn overlay(buffer: &mut [u8], node: &Node) {
    let Ok(start) = usize::try_from(node.first_character_position()) else {
        return;
    };
    for (slot, &byte) in buffer.iter_mut().skip(start).zip(&node.characters) {
        *slot = byte;
    }
}
