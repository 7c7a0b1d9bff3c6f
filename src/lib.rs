//! # ua-solver
//!
//! A library for identifying devices, operating systems and browsers from
//! User-Agent strings.
//!
//! A User-Agent is a loosely structured string that every client invents for
//! itself. `ua-solver` decomposes it into substrings it already knows (nodes),
//! looks the resulting node list up in a table of device signatures, and
//! resolves the signature to one property profile per component (hardware,
//! software, browser, crawler).
//!
//! ## Features
//!
//! - **Exact matching**: Binary search of the signature table for the node list
//! - **Numeric tolerance**: Version numbers close to a known one still match
//! - **Nearest and closest scoring**: Ranks candidate signatures when nothing
//!   matches exactly, preferring the most popular on ties
//! - **Multi-header matching**: Components can be identified from headers other
//!   than `User-Agent`
//! - **Default profiles**: Unidentifiable input always yields a usable result
//!
//! ## Example
//!
//! ```rust,no_run
//! use ua_solver::{DataSet, MatchMethod, MatchingEngine};
//!
//! // Load the embedded demonstration data set
//! let dataset = DataSet::load_embedded().unwrap();
//! let engine = MatchingEngine::new(&dataset);
//!
//! let state = engine
//!     .match_user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Firefox/128.0")
//!     .unwrap();
//!
//! if state.method() != MatchMethod::None {
//!     println!("Matched {} with score {}", state.matched_characters(), state.lowest_score());
//! }
//! for profile in state.profiles() {
//!     println!("{:?}", profile.properties);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Core data types for nodes, signatures and profiles
//! - [`dataset`]: Data set storage, loading and compilation
//! - [`matching`]: Matching engine and scoring strategies
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod dataset;
pub mod matching;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::node::Node;
pub use core::profile::{Component, Profile};
pub use core::signature::Signature;
pub use core::types::*;
pub use dataset::store::{DataSet, DataSetError};
pub use matching::engine::{HeadersMatch, MatchError, MatchingConfig, MatchingEngine};
pub use matching::state::MatchState;
