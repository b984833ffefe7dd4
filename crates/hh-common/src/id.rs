//! Player and game identity types.
//!
//! Players are the modeled entities; every shot belongs to exactly one
//! player and one game.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player identifier (the dataset's player name, trimmed).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Build a player id, trimming surrounding whitespace.
    ///
    /// Returns None for blank names.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PlayerId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

/// Game identifier as it appears in the source data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    /// Build a game id, trimming surrounding whitespace.
    ///
    /// Returns None for blank ids.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(GameId(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        GameId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_trims_whitespace() {
        assert_eq!(
            PlayerId::parse("  Stephen Curry ").unwrap(),
            PlayerId::from("Stephen Curry")
        );
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(PlayerId::parse("   ").is_none());
        assert!(GameId::parse("").is_none());
    }

    #[test]
    fn player_id_serializes_transparently() {
        let json = serde_json::to_string(&PlayerId::from("Kobe Bryant")).unwrap();
        assert_eq!(json, "\"Kobe Bryant\"");
    }

    #[test]
    fn player_ids_order_lexicographically() {
        let mut ids = vec![PlayerId::from("b"), PlayerId::from("a"), PlayerId::from("c")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
        assert_eq!(ids[2].as_str(), "c");
    }
}
