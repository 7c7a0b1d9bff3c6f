//! Core data types for signature matching.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Node`](node::Node): A known substring of the User-Agent vocabulary, addressed
//!   through a right-to-left character trie rooted at every character position
//! - [`Signature`](signature::Signature): An ordered set of nodes identifying one
//!   device, with a popularity rank
//! - [`Component`](profile::Component), [`Profile`](profile::Profile): Property
//!   bundles a signature resolves to
//! - [`MatchMethod`](types::MatchMethod), [`ProfileId`](types::ProfileId): Result
//!   classification and identifiers
//!
//! ## Positions
//!
//! A node's `position` is the index of the character immediately to the left of
//! its first character. Evaluation walks the target from right to left, so after a
//! node matches the next character to evaluate is exactly that position:
//!
//! | Target   | Node   | position | root_position |
//! |----------|--------|----------|---------------|
//! | Foo/12.3 | `Foo/` | -1       | 3             |
//! | Foo/12.3 | `12`   | 3        | 5             |
//! | Foo/12.3 | `.3`   | 5        | 7             |

pub mod node;
pub mod profile;
pub mod signature;
pub mod types;
