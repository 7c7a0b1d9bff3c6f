use serde::{Deserialize, Serialize};

use crate::dataset::store::{DataSet, DataSetError};

/// Upper bounds (exclusive) of the magnitude ranges a numeric jump may stay within.
///
/// A target number only matches numeric children in the same range, which keeps the
/// number of digits consumed on both sides the same for all but the last range.
const NUMERIC_RANGE_LIMITS: [u32; 4] = [10, 100, 1_000, 10_000];

/// A byte-keyed edge of the character trie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChild {
    /// Byte consumed (right to left) when following this edge
    pub character: u8,
    /// Offset of the child in the node table
    pub node_offset: i32,
}

/// An edge that consumes a whole run of digits worth `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericChild {
    pub value: u32,
    pub node_offset: i32,
}

/// A known substring of the User-Agent vocabulary.
///
/// Nodes form a trie per character position: the root node for position `p`
/// has no characters and each child extends the span one byte to the left.
/// Nodes that belong to at least one signature are *complete*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Offset of this node in the node table
    pub index: i32,

    /// Index of the character immediately left of the first character.
    /// A node starting the string has position -1.
    pub position: i32,

    /// Index of the last character, which is the position of the root node
    pub root_position: i32,

    /// Bytes spanned by this node, from `position + 1` to `root_position`
    pub characters: Vec<u8>,

    /// Byte-keyed children, sorted by character
    pub children: Vec<NodeChild>,

    /// Digit-run children, sorted by value
    pub numeric_children: Vec<NumericChild>,

    /// Ranks of the signatures containing this node, ascending
    pub ranked_signature_indexes: Vec<i32>,

    /// Where evaluation continues after this node matched.
    /// Negative for nodes that are not complete.
    pub next_character_position: i32,
}

/// A complete node found by numeric-tolerant evaluation
#[derive(Debug, Clone, Copy)]
pub struct NumericMatch<'d> {
    pub node: &'d Node,
    /// Sum of the absolute differences of every numeric jump taken
    pub difference: u32,
}

impl Node {
    /// Number of bytes this node spans
    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// True when at least one signature contains this node
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.ranked_signature_indexes.is_empty()
    }

    /// Index of the first character this node spans
    #[must_use]
    pub fn first_character_position(&self) -> i32 {
        self.position + 1
    }

    /// Follow the child matching the target byte at this node's position.
    fn next_node<'d>(
        &self,
        dataset: &'d DataSet,
        target: &[u8],
    ) -> Result<Option<&'d Node>, DataSetError> {
        let Ok(index) = usize::try_from(self.position) else {
            return Ok(None);
        };
        let Some(&character) = target.get(index) else {
            return Ok(None);
        };
        match self
            .children
            .binary_search_by_key(&character, |child| child.character)
        {
            Ok(i) => dataset.node(self.children[i].node_offset).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Longest complete node reachable from this node by exact byte comparison.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a child offset does not resolve.
    pub fn get_complete_node<'d>(
        &'d self,
        dataset: &'d DataSet,
        target: &[u8],
        nodes_evaluated: &mut u32,
    ) -> Result<Option<&'d Node>, DataSetError> {
        let mut found = self.is_complete().then_some(self);
        let mut current = self;
        *nodes_evaluated += 1;
        while let Some(next) = current.next_node(dataset, target)? {
            *nodes_evaluated += 1;
            if next.is_complete() {
                found = Some(next);
            }
            current = next;
        }
        Ok(found)
    }

    /// Like [`Node::get_complete_node`] but a digit run in the target may match a
    /// numeric child of a different value within the same magnitude range.
    ///
    /// Exact children are preferred, then numeric children closest in value,
    /// then this node itself when complete.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a child offset does not resolve.
    pub fn get_complete_numeric_node<'d>(
        &'d self,
        dataset: &'d DataSet,
        target: &[u8],
        nodes_evaluated: &mut u32,
    ) -> Result<Option<NumericMatch<'d>>, DataSetError> {
        *nodes_evaluated += 1;

        if let Some(next) = self.next_node(dataset, target)? {
            if let Some(found) = next.get_complete_numeric_node(dataset, target, nodes_evaluated)? {
                return Ok(Some(found));
            }
        }

        if !self.numeric_children.is_empty() {
            if let Some(value) = numeric_value_ending_at(target, self.position) {
                for child in self.numeric_candidates(value) {
                    let node = dataset.node(child.node_offset)?;
                    if let Some(found) =
                        node.get_complete_numeric_node(dataset, target, nodes_evaluated)?
                    {
                        let difference = value.abs_diff(child.value);
                        return Ok(Some(NumericMatch {
                            node: found.node,
                            difference: found.difference.saturating_add(difference),
                        }));
                    }
                }
            }
        }

        Ok(self.is_complete().then_some(NumericMatch {
            node: self,
            difference: 0,
        }))
    }

    /// Numeric children in the same magnitude range as `value`, closest first.
    fn numeric_candidates(&self, value: u32) -> Vec<&NumericChild> {
        let range = numeric_range(value);
        let mut candidates: Vec<&NumericChild> = self
            .numeric_children
            .iter()
            .filter(|child| numeric_range(child.value) == range)
            .collect();
        candidates.sort_by_key(|child| (child.value.abs_diff(value), child.value));
        candidates
    }

    /// True if this node shares any character index with a node in the list.
    #[must_use]
    pub fn is_overlap(&self, nodes: &[&Node]) -> bool {
        nodes.iter().any(|node| self.overlaps(node))
    }

    fn overlaps(&self, other: &Node) -> bool {
        let (lower, higher) = if other.position < self.position {
            (other, self)
        } else {
            (self, other)
        };
        lower.position == higher.position || lower.root_position > higher.position
    }

    /// Index of the first occurrence of this node's characters anywhere in the target.
    #[must_use]
    pub fn index_of(&self, target: &[u8]) -> Option<usize> {
        if self.characters.is_empty() || self.characters.len() > target.len() {
            return None;
        }
        target
            .windows(self.characters.len())
            .position(|window| window == self.characters.as_slice())
    }
}

/// Index of the magnitude range a number falls into
fn numeric_range(value: u32) -> usize {
    NUMERIC_RANGE_LIMITS
        .iter()
        .position(|&limit| value < limit)
        .unwrap_or(NUMERIC_RANGE_LIMITS.len())
}

#[inline]
pub(crate) fn is_numeric(byte: u8) -> bool {
    byte.is_ascii_digit()
}

/// Parse a run of ASCII digits, saturating at `u32::MAX`.
pub(crate) fn parse_number(digits: &[u8]) -> u32 {
    digits.iter().fold(0u32, |acc, &digit| {
        acc.saturating_mul(10)
            .saturating_add(u32::from(digit.wrapping_sub(b'0')))
    })
}

/// Value of the digit run in `target` whose rightmost digit sits at `position`.
fn numeric_value_ending_at(target: &[u8], position: i32) -> Option<u32> {
    let end = usize::try_from(position).ok()?;
    if !is_numeric(*target.get(end)?) {
        return None;
    }
    let start = target[..end]
        .iter()
        .rposition(|&byte| !is_numeric(byte))
        .map_or(0, |i| i + 1);
    Some(parse_number(&target[start..=end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(index: i32, first: i32, characters: &str) -> Node {
        let length = i32::try_from(characters.len()).unwrap();
        Node {
            index,
            position: first - 1,
            root_position: first + length - 1,
            characters: characters.as_bytes().to_vec(),
            children: Vec::new(),
            numeric_children: Vec::new(),
            ranked_signature_indexes: vec![0],
            next_character_position: first - 1,
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(b"0"), 0);
        assert_eq!(parse_number(b"120"), 120);
        assert_eq!(parse_number(b"007"), 7);
        assert_eq!(parse_number(b"99999999999999"), u32::MAX);
    }

    #[test]
    fn test_numeric_value_ending_at() {
        let target = b"Foo/12.3";
        assert_eq!(numeric_value_ending_at(target, 5), Some(12));
        assert_eq!(numeric_value_ending_at(target, 4), Some(1));
        assert_eq!(numeric_value_ending_at(target, 7), Some(3));
        assert_eq!(numeric_value_ending_at(target, 6), None);
        assert_eq!(numeric_value_ending_at(target, -1), None);
        assert_eq!(numeric_value_ending_at(target, 8), None);
        assert_eq!(numeric_value_ending_at(b"42", 1), Some(42));
    }

    #[test]
    fn test_numeric_range() {
        assert_eq!(numeric_range(0), 0);
        assert_eq!(numeric_range(9), 0);
        assert_eq!(numeric_range(10), 1);
        assert_eq!(numeric_range(999), 2);
        assert_eq!(numeric_range(9_999), 3);
        assert_eq!(numeric_range(10_000), 4);
        assert_eq!(numeric_range(u32::MAX), 4);
    }

    #[test]
    fn test_numeric_candidates_closest_first() {
        let mut parent = node(0, 4, "x");
        parent.numeric_children = [3, 7, 15, 5, 6]
            .into_iter()
            .enumerate()
            .map(|(i, value)| NumericChild {
                value,
                node_offset: i32::try_from(i).unwrap() + 1,
            })
            .collect();

        let values: Vec<u32> = parent
            .numeric_candidates(5)
            .into_iter()
            .map(|c| c.value)
            .collect();
        // 15 is in a different magnitude range, ties prefer the smaller value
        assert_eq!(values, vec![5, 6, 3, 7]);
    }

    #[test]
    fn test_overlap() {
        let foo = node(1, 0, "Foo/");
        let twelve = node(2, 4, "12");
        let shifted = node(3, 3, "/1");
        let same_start = node(4, 4, "1");

        assert!(!twelve.is_overlap(&[&foo]));
        assert!(shifted.is_overlap(&[&foo]));
        assert!(shifted.is_overlap(&[&twelve]));
        assert!(same_start.is_overlap(&[&twelve]));
        assert!(!same_start.is_overlap(&[]));
    }

    #[test]
    fn test_index_of() {
        let dot = node(1, 6, ".3");
        assert_eq!(dot.index_of(b"Foo/12 .3"), Some(7));
        assert_eq!(dot.index_of(b"Foo/12.x"), None);
        assert_eq!(dot.index_of(b"."), None);
        assert_eq!(node(2, 0, "Foo").index_of(b"FooFoo"), Some(0));
    }

    #[test]
    fn test_positions() {
        let foo = node(1, 0, "Foo/");
        assert_eq!(foo.position, -1);
        assert_eq!(foo.first_character_position(), 0);
        assert_eq!(foo.root_position, 3);
        assert_eq!(foo.len(), 4);
        assert!(foo.is_complete());
    }
}
