use serde::{Deserialize, Serialize};

/// Unique identifier for a profile in the data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub u32);

impl ProfileId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of the matching algorithm that produced a result.
///
/// Variants are ordered by how much information was given up to reach them,
/// so `Exact < Numeric < Nearest < Closest < None`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMethod {
    /// The node list equals a signature exactly
    Exact,
    /// The node list equals a signature after numeric re-evaluation
    Numeric,
    /// Every missing signature node was found elsewhere in the target
    Nearest,
    /// Best character-difference score among the candidates
    Closest,
    /// No signature could be identified, default profiles were used
    #[default]
    None,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "EXACT"),
            Self::Numeric => write!(f, "NUMERIC"),
            Self::Nearest => write!(f, "NEAREST"),
            Self::Closest => write!(f, "CLOSEST"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Convert a byte index into the signed position space used by nodes.
///
/// User-Agent strings never approach `i32::MAX` bytes; larger values saturate.
#[inline]
pub(crate) fn to_position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
