//! Address resolution results

use propply_common::PropertyIdentifier;
use serde::{Deserialize, Serialize};

/// Matching strategy, in the order the resolver tries them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Fuzzy,
    ZipScoped,
}

impl MatchStrategy {
    pub const ORDER: [MatchStrategy; 3] =
        [MatchStrategy::Exact, MatchStrategy::Fuzzy, MatchStrategy::ZipScoped];

    pub fn confidence(self) -> MatchConfidence {
        match self {
            MatchStrategy::Exact => MatchConfidence::Exact,
            MatchStrategy::Fuzzy | MatchStrategy::ZipScoped => MatchConfidence::Fuzzy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    Fuzzy,
}

/// One resolver candidate
///
/// Carries whichever identifiers the source dataset had; a match with a BIN
/// but no block/lot (or the reverse) is normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(flatten)]
    pub identifier: PropertyIdentifier,
    /// Registry key of the dataset the match came from
    pub dataset: String,
    pub strategy: MatchStrategy,
    pub confidence: MatchConfidence,
    /// Street-name similarity in [0, 1]
    pub similarity: f64,
}
