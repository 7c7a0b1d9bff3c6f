//! Signature matching engine and scoring strategies.
//!
//! This module provides the core matching functionality:
//!
//! - [`MatchingEngine`]: Main entry point for matching User-Agents and headers
//! - [`MatchState`]: Per-match working state and result accessors
//! - [`most_frequent`]: Candidate narrowing over node signature lists
//! - [`NearestScore`], [`ClosestScore`]: Candidate scoring strategies
//!
//! ## Matching Algorithm
//!
//! Matching runs in phases, each giving up a little more information:
//!
//! 1. **Exact**: Collect the longest known node at each position, right to left,
//!    and binary search the signature table for that exact node list
//! 2. **Numeric**: Fill uncovered positions with nodes whose numbers differ from
//!    the target, preferring the closest value, and search again
//! 3. **Nearest**: Score the signatures shared by most matched nodes by how far
//!    their missing nodes moved within the target
//! 4. **Closest**: Score the same candidates by character difference
//!
//! When every phase fails each component falls back to its default profile.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ua_solver::{DataSet, MatchingEngine};
//!
//! let dataset = DataSet::load_embedded().unwrap();
//! let engine = MatchingEngine::new(&dataset);
//! let state = engine.match_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)").unwrap();
//!
//! println!("{} (score {})", state.method(), state.lowest_score());
//! for profile in state.profiles() {
//!     println!("{}: {:?}", profile.id, profile.properties);
//! }
//! ```

pub mod engine;
pub mod filter;
pub mod scoring;
pub mod state;

pub use engine::{HeadersMatch, MatchError, MatchingConfig, MatchingEngine};
pub use filter::most_frequent;
pub use scoring::{ClosestScore, NearestScore, ScoringStrategy, NON_NUMERIC_DIFFERENCE_WEIGHT};
pub use state::MatchState;
