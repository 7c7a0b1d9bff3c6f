use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::core::profile::Profile;
use crate::core::types::{to_position, MatchMethod};
use crate::dataset::store::{DataSet, DataSetError};
use crate::matching::filter::most_frequent;
use crate::matching::scoring::{ClosestScore, NearestScore, ScoringStrategy};
use crate::matching::state::MatchState;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Data set has been disposed")]
    Disposed,

    #[error(transparent)]
    DataSet(#[from] DataSetError),
}

/// Configuration for the matching engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Cap on candidates scored per match; the data set's own cap when unset
    pub max_signatures: Option<usize>,

    /// Stop scoring a candidate once it can no longer beat the best so far
    pub branch_and_bound: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_signatures: None,
            branch_and_bound: true,
        }
    }
}

/// Result of matching a set of HTTP headers
#[derive(Debug, Clone)]
pub struct HeadersMatch<'d> {
    /// Worst method among the header matches that supplied a profile
    pub method: MatchMethod,

    /// One profile per component, in component order
    pub profiles: Vec<&'d Profile>,

    /// Header name (as listed by the data set) and its match
    pub matches: Vec<(String, MatchState<'d>)>,
}

impl<'d> HeadersMatch<'d> {
    /// Match for one header, ignoring case
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&MatchState<'d>> {
        self.matches
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, state)| state)
    }
}

/// The signature matching controller
#[derive(Debug, Clone)]
pub struct MatchingEngine<'d> {
    dataset: &'d DataSet,
    config: MatchingConfig,
}

impl<'d> MatchingEngine<'d> {
    /// Create a new matching engine with default configuration
    #[must_use]
    pub fn new(dataset: &'d DataSet) -> Self {
        Self {
            dataset,
            config: MatchingConfig::default(),
        }
    }

    /// Create a new matching engine with custom configuration
    #[must_use]
    pub fn with_config(dataset: &'d DataSet, config: MatchingConfig) -> Self {
        Self { dataset, config }
    }

    #[must_use]
    pub fn dataset(&self) -> &'d DataSet {
        self.dataset
    }

    #[must_use]
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Match a User-Agent string.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::Disposed` if the data set was disposed, or
    /// `MatchError::DataSet` if the data set tables are inconsistent.
    pub fn match_user_agent(&self, user_agent: &str) -> Result<MatchState<'d>, MatchError> {
        self.match_bytes(user_agent.as_bytes())
    }

    /// Match raw target bytes.
    ///
    /// # Errors
    ///
    /// See [`MatchingEngine::match_user_agent`].
    pub fn match_bytes(&self, target: &[u8]) -> Result<MatchState<'d>, MatchError> {
        let mut state = MatchState::new(self.dataset);
        self.match_into(target, &mut state)?;
        Ok(state)
    }

    /// Match into an existing state, which is reset first.
    ///
    /// On error the state holds no result.
    ///
    /// # Errors
    ///
    /// See [`MatchingEngine::match_user_agent`].
    pub fn match_into(&self, target: &[u8], state: &mut MatchState<'d>) -> Result<(), MatchError> {
        if self.dataset.is_disposed() {
            return Err(MatchError::Disposed);
        }

        state.reset(self.dataset, target);
        let start = Instant::now();
        let result = self.evaluate(state);
        state.elapsed = start.elapsed();

        if let Err(e) = result {
            state.clear();
            return Err(e.into());
        }
        Ok(())
    }

    /// Match every relevant header and combine the profiles.
    ///
    /// Each component takes its profile from the first header in its priority
    /// list that is present. Header names are compared ignoring case; when a
    /// header is given more than once the first value is used.
    ///
    /// # Errors
    ///
    /// See [`MatchingEngine::match_user_agent`].
    pub fn match_headers<K, V>(&self, headers: &[(K, V)]) -> Result<HeadersMatch<'d>, MatchError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if self.dataset.is_disposed() {
            return Err(MatchError::Disposed);
        }

        let mut matches: Vec<(String, MatchState<'d>)> = Vec::new();
        for name in self.dataset.http_headers() {
            let value = headers
                .iter()
                .find(|(key, _)| key.as_ref().eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_ref());
            if let Some(value) = value {
                matches.push((name.clone(), self.match_user_agent(value)?));
            }
        }

        let mut profiles = self.dataset.default_profiles()?;
        let mut method: Option<MatchMethod> = None;
        for (index, component) in self.dataset.components.iter().enumerate() {
            let used = component.http_headers.iter().find_map(|header| {
                matches
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(header))
                    .map(|(_, state)| state)
            });
            if let Some(state) = used {
                if let Some(profile) = state.profiles.iter().find(|p| p.component == index) {
                    profiles[index] = *profile;
                }
                method = method.max(Some(state.method));
            }
        }

        let method = method.unwrap_or(MatchMethod::None);
        debug!(headers = matches.len(), %method, "Matched HTTP headers");
        Ok(HeadersMatch {
            method,
            profiles,
            matches,
        })
    }

    fn max_signatures(&self) -> usize {
        self.config
            .max_signatures
            .unwrap_or(self.dataset.max_signatures)
    }

    /// Rightmost position evaluation starts from
    fn start_position(&self, state: &MatchState<'d>) -> i32 {
        to_position(state.target.len()).min(to_position(self.dataset.root_node_count())) - 1
    }

    fn evaluate(&self, state: &mut MatchState<'d>) -> Result<(), DataSetError> {
        let length = state.target.len();
        if length == 0 {
            warn!("Empty target, using default profiles");
            return self.match_default(state);
        }
        if length < self.dataset.min_user_agent_length {
            debug!(
                length,
                minimum = self.dataset.min_user_agent_length,
                "Target too short, using default profiles"
            );
            return self.match_default(state);
        }

        self.evaluate_nodes(state)?;
        if self.find_exact(state)? {
            state.method = MatchMethod::Exact;
            state.lowest_score = 0;
        } else {
            self.evaluate_numeric(state)?;
            if self.find_exact(state)? {
                state.method = MatchMethod::Numeric;
            } else if !state.nodes.is_empty() {
                let lists: Vec<&[i32]> = state
                    .nodes
                    .iter()
                    .map(|node| node.ranked_signature_indexes.as_slice())
                    .collect();
                let ranks = most_frequent(&lists);
                state.closest_signatures = u32::try_from(ranks.len()).unwrap_or(u32::MAX);
                debug!(candidates = ranks.len(), "Scoring closest signatures");

                if !self.apply_strategy(&NearestScore, state, &ranks)? {
                    self.apply_strategy(&ClosestScore, state, &ranks)?;
                }
            }
        }

        let Some(signature) = state.signature else {
            return self.match_default(state);
        };
        state.profiles = self.dataset.signature_profiles(signature)?;
        debug!(
            method = %state.method,
            signature = signature.index,
            rank = signature.rank,
            score = state.lowest_score,
            "Matched signature"
        );
        Ok(())
    }

    /// Collect the longest complete node at each position, right to left.
    fn evaluate_nodes(&self, state: &mut MatchState<'d>) -> Result<(), DataSetError> {
        let mut cursor = self.start_position(state);
        while cursor >= 0 {
            state.root_nodes_evaluated += 1;
            let root = self.dataset.root_node(cursor)?;
            match root.get_complete_node(self.dataset, &state.target, &mut state.nodes_evaluated)? {
                Some(node) => {
                    trace!(
                        position = node.position,
                        characters = %String::from_utf8_lossy(&node.characters),
                        "Node found"
                    );
                    state.insert_node(0, node);
                    cursor = node.next_character_position.min(cursor - 1);
                }
                None => cursor -= 1,
            }
        }
        Ok(())
    }

    /// Fill uncovered positions with numeric-tolerant node matches.
    fn evaluate_numeric(&self, state: &mut MatchState<'d>) -> Result<(), DataSetError> {
        let mut cursor = self.start_position(state);
        // Nodes before this index lie left of the cursor or cover it
        let mut remaining = state.nodes.len();

        while cursor >= 0 {
            while remaining > 0 && state.nodes[remaining - 1].position >= cursor {
                remaining -= 1;
            }
            if remaining > 0 && state.nodes[remaining - 1].root_position >= cursor {
                cursor = state.nodes[remaining - 1].position;
                remaining -= 1;
                continue;
            }

            state.root_nodes_evaluated += 1;
            let root = self.dataset.root_node(cursor)?;
            let found = root.get_complete_numeric_node(
                self.dataset,
                &state.target,
                &mut state.nodes_evaluated,
            )?;
            match found {
                Some(found) if !found.node.is_overlap(&state.nodes) => {
                    trace!(
                        position = found.node.position,
                        difference = found.difference,
                        "Numeric node found"
                    );
                    state.insert_node(remaining, found.node);
                    state.lowest_score = state.lowest_score.saturating_add(found.difference);
                    cursor = found.node.position.min(cursor - 1);
                }
                _ => cursor -= 1,
            }
        }
        Ok(())
    }

    /// Binary search the signature table for the current node list.
    fn find_exact(&self, state: &mut MatchState<'d>) -> Result<bool, DataSetError> {
        if state.nodes.is_empty() {
            return Ok(false);
        }
        match self
            .dataset
            .find_signature_index(&state.nodes, &mut state.signatures_read)
        {
            Some(index) => {
                state.signature = Some(self.dataset.signature(to_position(index))?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn apply_strategy<S: ScoringStrategy>(
        &self,
        strategy: &S,
        state: &mut MatchState<'d>,
        ranks: &[i32],
    ) -> Result<bool, DataSetError> {
        strategy.evaluate_signatures(
            state,
            ranks,
            self.max_signatures(),
            self.config.branch_and_bound,
        )?;
        if state.signature.is_some() {
            state.method = strategy.method();
            return Ok(true);
        }
        debug!(method = %strategy.method(), "No signature selected");
        Ok(false)
    }

    fn match_default(&self, state: &mut MatchState<'d>) -> Result<(), DataSetError> {
        state.signature = None;
        state.method = MatchMethod::None;
        state.lowest_score = 0;
        state.profiles = self.dataset.default_profiles()?;
        Ok(())
    }
}
