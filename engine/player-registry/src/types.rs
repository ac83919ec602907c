use feed_readers::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Stable internal player ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Canonical identity of one real player; the join key across all feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Stable internal ID
    pub id: PlayerId,

    /// Normalized name used for matching (e.g., "aj brown")
    pub normalized_name: String,

    /// Name as first seen (e.g., "A.J. Brown")
    pub display_name: String,

    /// Position (e.g., WR)
    pub position: Position,

    /// Current team abbreviation, when known
    pub team: Option<String>,

    /// External IDs bound to this identity by earlier resolutions
    pub external_ids: BTreeSet<String>,
}

/// How a resolution was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// External ID was already bound
    ExternalId,
    /// Exactly one candidate shared the normalized name and position
    Matched,
    /// Several candidates; the team picked exactly one
    TeamDisambiguated,
    /// No candidate; a new identity was created
    Created,
    /// Several candidates and the team could not pick one; a new identity was
    /// created instead of guessing
    CreatedAmbiguous { candidates: usize },
}

/// Identity plus how it was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub identity: PlayerIdentity,
    pub outcome: ResolutionOutcome,
}

impl Resolution {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.outcome, ResolutionOutcome::CreatedAmbiguous { .. })
    }
}

/// Errors that can occur during identity resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("player name '{0}' is empty after normalization")]
    EmptyName(String),

    #[error("cannot resolve '{0}' without a position")]
    PositionRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display_is_fixed_width_hex() {
        assert_eq!(PlayerId(255).to_string(), "00000000000000ff");
    }

    #[test]
    fn test_resolution_serializes_outcome() {
        let resolution = Resolution {
            identity: PlayerIdentity {
                id: PlayerId(42),
                normalized_name: "mike williams".to_string(),
                display_name: "Mike Williams".to_string(),
                position: Position::Wr,
                team: None,
                external_ids: BTreeSet::new(),
            },
            outcome: ResolutionOutcome::CreatedAmbiguous { candidates: 2 },
        };
        assert!(resolution.is_ambiguous());

        let json = serde_json::to_value(&resolution).unwrap();
        assert_eq!(json["identity"]["id"], 42);
        assert_eq!(json["identity"]["position"], "WR");
        assert_eq!(json["outcome"]["created_ambiguous"]["candidates"], 2);
    }
}
