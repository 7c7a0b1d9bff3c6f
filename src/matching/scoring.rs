//! Scoring strategies for ranking candidate signatures.
//!
//! A candidate is scored by walking its nodes against the matched node list.
//! Nodes present in both cost nothing. Every signature node missing from the
//! match is charged by the strategy's per-node hook, and the lowest total wins.
//!
//! - [`NearestScore`]: how far each missing node has moved within the target
//! - [`ClosestScore`]: character differences between each missing node and the
//!   target at the node's position, with digit runs compared as numbers

use std::cmp::Ordering;

use crate::core::node::{is_numeric, parse_number, Node};
use crate::core::signature::Signature;
use crate::core::types::{to_position, MatchMethod};
use crate::dataset::store::DataSetError;
use crate::matching::state::MatchState;

/// Multiplier applied to byte differences that are not part of a number.
///
/// Makes a version number off by a few count less than an arbitrary
/// character substitution at the same place.
pub const NON_NUMERIC_DIFFERENCE_WEIGHT: u32 = 10;

/// Template for scoring candidate signatures against a match state.
pub trait ScoringStrategy {
    /// Method reported when this strategy selects a signature
    fn method(&self) -> MatchMethod;

    /// Score a signature starts from before any node is charged
    fn initial_score(&self, signature: &Signature, last_node_character: i32) -> u32;

    /// Cost of a signature node absent from the match, or `None` when the node
    /// cannot be compared with the target at all.
    ///
    /// Implementations may stop early once the cost reaches `bound`.
    fn node_score(&self, target: &[u8], node: &Node, bound: u32) -> Option<u32>;

    /// Total score of one signature, stopping once it reaches `bound`.
    ///
    /// Returns `u32::MAX` when any missing node is incomparable.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a signature node does not resolve.
    fn signature_score(
        &self,
        state: &MatchState<'_>,
        signature: &Signature,
        last_node_character: i32,
        bound: u32,
    ) -> Result<u32, DataSetError> {
        let mut running = self.initial_score(signature, last_node_character);
        let mut matched = 0;
        let mut index = 0;

        while index < signature.node_offsets.len() && running < bound {
            let match_offset = state.nodes.get(matched).map_or(i32::MAX, |node| node.index);
            let signature_offset = signature.node_offsets[index];

            match match_offset.cmp(&signature_offset) {
                Ordering::Greater => {
                    let node = state.dataset.node(signature_offset)?;
                    let Some(score) = self.node_score(&state.target, node, bound - running) else {
                        return Ok(u32::MAX);
                    };
                    running = running.saturating_add(score);
                    index += 1;
                }
                Ordering::Equal => {
                    matched += 1;
                    index += 1;
                }
                Ordering::Less => matched += 1,
            }
        }

        Ok(running)
    }

    /// Score the candidates in order and select the lowest.
    ///
    /// At most `max_signatures` candidates are scored. Ties keep the earlier
    /// candidate. With `branch_and_bound` set, each candidate stops scoring as
    /// soon as it can no longer beat the best so far.
    ///
    /// # Errors
    ///
    /// Returns `DataSetError::EntityNotFound` if a rank or node does not resolve.
    fn evaluate_signatures(
        &self,
        state: &mut MatchState<'_>,
        ranks: &[i32],
        max_signatures: usize,
        branch_and_bound: bool,
    ) -> Result<(), DataSetError> {
        let dataset = state.dataset;
        let last_node_character = state.last_node_character();
        state.lowest_score = u32::MAX;
        state.signature = None;

        for &rank in ranks.iter().take(max_signatures) {
            let signature = dataset.ranked_signature(rank)?;
            let bound = if branch_and_bound {
                state.lowest_score
            } else {
                u32::MAX
            };
            let score = self.signature_score(state, signature, last_node_character, bound)?;
            state.signatures_compared += 1;
            if score < state.lowest_score {
                state.lowest_score = score;
                state.signature = Some(signature);
            }
        }

        Ok(())
    }
}

/// Scores how far missing nodes have shifted within the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestScore;

impl ScoringStrategy for NearestScore {
    fn method(&self) -> MatchMethod {
        MatchMethod::Nearest
    }

    fn initial_score(&self, _signature: &Signature, _last_node_character: i32) -> u32 {
        0
    }

    fn node_score(&self, target: &[u8], node: &Node, _bound: u32) -> Option<u32> {
        let index = node.index_of(target)?;
        Some(node.first_character_position().abs_diff(to_position(index)))
    }
}

/// Scores character differences between missing nodes and the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestScore;

impl ScoringStrategy for ClosestScore {
    fn method(&self) -> MatchMethod {
        MatchMethod::Closest
    }

    fn initial_score(&self, signature: &Signature, last_node_character: i32) -> u32 {
        (last_node_character + 1).abs_diff(signature.length)
    }

    fn node_score(&self, target: &[u8], node: &Node, bound: u32) -> Option<u32> {
        let characters = node.characters.as_slice();
        let length = characters.len();
        if length == 0 {
            return Some(0);
        }
        let root = usize::try_from(node.root_position).ok()?;
        let first = (root + 1).checked_sub(length)?;
        let Some(last_target) = target.len().checked_sub(1) else {
            return Some(saturating_u32(length));
        };

        // Characters past the end of the target each cost one
        let overrun = root.saturating_sub(last_target).min(length);
        let count = length - overrun;
        let mut score = saturating_u32(overrun);

        let mut n = count;
        while n > 0 && score < bound {
            n -= 1;
            let (a, b) = (characters[n], target[first + n]);
            if a == b {
                continue;
            }

            if is_numeric(a) && is_numeric(b) {
                let mut right = n;
                while right + 1 < count
                    && is_numeric(characters[right + 1])
                    && is_numeric(target[first + right + 1])
                {
                    right += 1;
                }
                while n > 0 && is_numeric(characters[n - 1]) && is_numeric(target[first + n - 1]) {
                    n -= 1;
                }
                let difference = parse_number(&characters[n..=right])
                    .abs_diff(parse_number(&target[first + n..=first + right]));
                score = score.saturating_add(if difference == 0 {
                    weighted_difference(a, b)
                } else {
                    difference
                });
            } else {
                score = score.saturating_add(weighted_difference(a, b));
            }
        }

        Some(score)
    }
}

fn weighted_difference(a: u8, b: u8) -> u32 {
    u32::from(a.abs_diff(b)) * NON_NUMERIC_DIFFERENCE_WEIGHT
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
