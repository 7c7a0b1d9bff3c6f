use std::borrow::Cow;
use std::time::Duration;

use crate::core::node::Node;
use crate::core::profile::Profile;
use crate::core::signature::{overlay, Signature, MASK_CHARACTER};
use crate::core::types::MatchMethod;
use crate::dataset::store::DataSet;

/// Working state and result of one match.
///
/// A state is owned by the caller and may be reused across sequential matches
/// through [`MatchingEngine::match_into`](crate::matching::engine::MatchingEngine::match_into),
/// which resets it first. It must not be shared between concurrent matches.
#[derive(Debug, Clone)]
pub struct MatchState<'d> {
    pub(crate) dataset: &'d DataSet,
    pub(crate) target: Vec<u8>,

    /// Matched nodes in ascending position order
    pub(crate) nodes: Vec<&'d Node>,

    pub(crate) root_nodes_evaluated: u32,
    pub(crate) nodes_evaluated: u32,
    pub(crate) signatures_read: u32,
    pub(crate) signatures_compared: u32,
    pub(crate) closest_signatures: u32,

    pub(crate) lowest_score: u32,
    pub(crate) signature: Option<&'d Signature>,
    pub(crate) profiles: Vec<&'d Profile>,
    pub(crate) method: MatchMethod,
    pub(crate) elapsed: Duration,
}

impl<'d> MatchState<'d> {
    #[must_use]
    pub fn new(dataset: &'d DataSet) -> Self {
        Self {
            dataset,
            target: Vec::new(),
            nodes: Vec::new(),
            root_nodes_evaluated: 0,
            nodes_evaluated: 0,
            signatures_read: 0,
            signatures_compared: 0,
            closest_signatures: 0,
            lowest_score: 0,
            signature: None,
            profiles: Vec::new(),
            method: MatchMethod::None,
            elapsed: Duration::ZERO,
        }
    }

    /// Prepare the state for a new target, discarding every previous result.
    pub(crate) fn reset(&mut self, dataset: &'d DataSet, target: &[u8]) {
        self.clear();
        self.dataset = dataset;
        self.target.clear();
        self.target.extend_from_slice(target);
        self.elapsed = Duration::ZERO;
    }

    /// Drop all results and zero the counters. The target is kept.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root_nodes_evaluated = 0;
        self.nodes_evaluated = 0;
        self.signatures_read = 0;
        self.signatures_compared = 0;
        self.closest_signatures = 0;
        self.lowest_score = 0;
        self.signature = None;
        self.profiles.clear();
        self.method = MatchMethod::None;
    }

    /// Target bytes that were matched
    #[must_use]
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    #[must_use]
    pub fn user_agent(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.target)
    }

    #[must_use]
    pub fn method(&self) -> MatchMethod {
        self.method
    }

    /// Score of the selected signature: 0 for exact matches, the summed numeric
    /// difference for numeric matches, the strategy score for nearest and closest.
    #[must_use]
    pub fn lowest_score(&self) -> u32 {
        self.lowest_score
    }

    #[must_use]
    pub fn signature(&self) -> Option<&'d Signature> {
        self.signature
    }

    /// One profile per data set component, in component order
    #[must_use]
    pub fn profiles(&self) -> &[&'d Profile] {
        &self.profiles
    }

    /// Profile selected for the named component, ignoring case
    #[must_use]
    pub fn profile_for(&self, component: &str) -> Option<&'d Profile> {
        let index = self.dataset.component_index(component)?;
        self.profiles.iter().copied().find(|p| p.component == index)
    }

    #[must_use]
    pub fn nodes(&self) -> &[&'d Node] {
        &self.nodes
    }

    #[must_use]
    pub fn root_nodes_evaluated(&self) -> u32 {
        self.root_nodes_evaluated
    }

    #[must_use]
    pub fn nodes_evaluated(&self) -> u32 {
        self.nodes_evaluated
    }

    #[must_use]
    pub fn signatures_read(&self) -> u32 {
        self.signatures_read
    }

    #[must_use]
    pub fn signatures_compared(&self) -> u32 {
        self.signatures_compared
    }

    /// Number of candidates produced by the most-frequent filter
    #[must_use]
    pub fn closest_signatures(&self) -> u32 {
        self.closest_signatures
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The target with every character not covered by a matched node masked.
    #[must_use]
    pub fn matched_characters(&self) -> String {
        let mut buffer = vec![MASK_CHARACTER; self.target.len()];
        for node in &self.nodes {
            overlay(&mut buffer, node);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Insert a node keeping the list in ascending position order
    pub(crate) fn insert_node(&mut self, index: usize, node: &'d Node) {
        self.nodes.insert(index, node);
    }

    /// Index of the last character covered by the rightmost matched node, or -1
    pub(crate) fn last_node_character(&self) -> i32 {
        self.nodes.last().map_or(-1, |node| node.root_position)
    }
}
