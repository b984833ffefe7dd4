//! Sequence preparation: shot events grouped into per-player chronological
//! outcome sequences.
//!
//! The order produced here is what the state model sees as "time", so it must
//! be a deterministic total order: event time first, then intra-game ordinal
//! when present, then original record position.

use chrono::NaiveDateTime;
use hh_common::{GameId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Shot category label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShotCategory {
    /// Two-point field goal attempt.
    TwoPoint,
    /// Three-point field goal attempt.
    ThreePoint,
    /// Any other label found in the data.
    Other(String),
}

impl ShotCategory {
    pub const TWO_POINT_LABEL: &'static str = "2PT Field Goal";
    pub const THREE_POINT_LABEL: &'static str = "3PT Field Goal";

    /// Parse a category label. Returns None for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let upper = trimmed.to_ascii_uppercase();
        let category = if upper.starts_with("2PT") || upper == "2" {
            ShotCategory::TwoPoint
        } else if upper.starts_with("3PT") || upper == "3" {
            ShotCategory::ThreePoint
        } else {
            ShotCategory::Other(trimmed.to_string())
        };
        Some(category)
    }

    /// Canonical label.
    pub fn label(&self) -> &str {
        match self {
            ShotCategory::TwoPoint => Self::TWO_POINT_LABEL,
            ShotCategory::ThreePoint => Self::THREE_POINT_LABEL,
            ShotCategory::Other(label) => label,
        }
    }

    /// Points awarded for a make (free throws are not in the data).
    pub fn point_value(&self) -> u32 {
        match self {
            ShotCategory::TwoPoint => 2,
            ShotCategory::ThreePoint => 3,
            ShotCategory::Other(_) => 0,
        }
    }
}

impl fmt::Display for ShotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<String> for ShotCategory {
    fn from(raw: String) -> Self {
        ShotCategory::parse(&raw).unwrap_or(ShotCategory::Other(raw))
    }
}

impl From<ShotCategory> for String {
    fn from(category: ShotCategory) -> Self {
        category.label().to_string()
    }
}

/// When a shot happened: game date/time plus an optional intra-game ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventTime {
    pub at: NaiveDateTime,
    pub ordinal: Option<u32>,
}

/// One observed shot attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotEvent {
    pub player: PlayerId,
    pub made: bool,
    pub category: ShotCategory,
    pub time: EventTime,
    pub game_id: GameId,
    /// Position of the record in the input, used as the final tie-break.
    pub record_index: usize,
}

impl ShotEvent {
    /// Outcome in the two-symbol alphabet {miss=0, make=1}.
    pub fn outcome(&self) -> u8 {
        u8::from(self.made)
    }

    fn sort_key(&self) -> (EventTime, usize) {
        (self.time, self.record_index)
    }
}

/// A player's shots in chronological order with the matching outcome vector.
#[derive(Debug, Clone)]
pub struct EntitySequence {
    player: PlayerId,
    events: Vec<ShotEvent>,
    outcomes: Vec<u8>,
}

impl EntitySequence {
    /// Build a sequence from one player's events (any order).
    ///
    /// Returns None when `events` is empty.
    pub fn new(player: PlayerId, mut events: Vec<ShotEvent>) -> Option<Self> {
        if events.is_empty() {
            return None;
        }
        events.sort_by_key(|e| e.sort_key());
        let outcomes = events.iter().map(ShotEvent::outcome).collect();
        Some(Self {
            player,
            events,
            outcomes,
        })
    }

    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    pub fn events(&self) -> &[ShotEvent] {
        &self.events
    }

    /// Outcomes in chronological order, each 0 or 1.
    pub fn outcomes(&self) -> &[u8] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Whether the sequence is long enough to fit a state model.
    pub fn meets_minimum(&self, min_sequence_len: usize) -> bool {
        self.len() >= min_sequence_len
    }
}

/// Output of sequence preparation.
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch {
    /// One sequence per player, keyed in lexicographic player order.
    pub sequences: BTreeMap<PlayerId, EntitySequence>,
    /// Events dropped because their player is not on the allowlist.
    pub excluded_events: usize,
}

impl PreparedBatch {
    pub fn total_events(&self) -> usize {
        self.sequences.values().map(EntitySequence::len).sum()
    }
}

/// Group events by player and order each group chronologically.
///
/// With an allowlist, events for other players are dropped and counted.
pub fn prepare_sequences(events: Vec<ShotEvent>, players: Option<&[String]>) -> PreparedBatch {
    let allow: Option<HashSet<&str>> =
        players.map(|names| names.iter().map(|n| n.trim()).collect());

    let mut grouped: BTreeMap<PlayerId, Vec<ShotEvent>> = BTreeMap::new();
    let mut excluded_events = 0;
    for event in events {
        if let Some(allow) = &allow {
            if !allow.contains(event.player.as_str()) {
                excluded_events += 1;
                continue;
            }
        }
        grouped.entry(event.player.clone()).or_default().push(event);
    }

    let sequences = grouped
        .into_iter()
        .filter_map(|(player, events)| {
            EntitySequence::new(player.clone(), events).map(|seq| (player, seq))
        })
        .collect();

    PreparedBatch {
        sequences,
        excluded_events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn event(player: &str, made: bool, day: u32, ordinal: Option<u32>, idx: usize) -> ShotEvent {
        ShotEvent {
            player: PlayerId::from(player),
            made,
            category: ShotCategory::TwoPoint,
            time: EventTime {
                at: at(day),
                ordinal,
            },
            game_id: GameId::from("g1"),
            record_index: idx,
        }
    }

    #[test]
    fn category_parse_recognizes_point_values() {
        assert_eq!(
            ShotCategory::parse("2PT Field Goal"),
            Some(ShotCategory::TwoPoint)
        );
        assert_eq!(ShotCategory::parse("3pt"), Some(ShotCategory::ThreePoint));
        assert_eq!(
            ShotCategory::parse("Dunk"),
            Some(ShotCategory::Other("Dunk".into()))
        );
        assert_eq!(ShotCategory::parse("  "), None);
        assert_eq!(ShotCategory::ThreePoint.point_value(), 3);
        assert_eq!(ShotCategory::Other("x".into()).point_value(), 0);
    }

    #[test]
    fn category_serializes_as_label() {
        let json = serde_json::to_string(&ShotCategory::ThreePoint).unwrap();
        assert_eq!(json, "\"3PT Field Goal\"");
        let back: ShotCategory = serde_json::from_str("\"2PT Field Goal\"").unwrap();
        assert_eq!(back, ShotCategory::TwoPoint);
    }

    #[test]
    fn sequence_sorted_by_time_then_record_order() {
        let events = vec![
            event("a", true, 3, None, 0),
            event("a", false, 1, None, 1),
            event("a", true, 1, None, 2),
            event("a", false, 2, None, 3),
        ];
        let seq = EntitySequence::new(PlayerId::from("a"), events).unwrap();
        let order: Vec<usize> = seq.events().iter().map(|e| e.record_index).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
        assert_eq!(seq.outcomes(), &[0, 1, 0, 1]);
    }

    #[test]
    fn ordinal_orders_within_same_date() {
        let events = vec![
            event("a", true, 1, Some(5), 0),
            event("a", false, 1, Some(2), 1),
        ];
        let seq = EntitySequence::new(PlayerId::from("a"), events).unwrap();
        assert_eq!(seq.outcomes(), &[0, 1]);
    }

    #[test]
    fn empty_sequence_is_none() {
        assert!(EntitySequence::new(PlayerId::from("a"), vec![]).is_none());
    }

    #[test]
    fn prepare_groups_without_merging() {
        let events = vec![
            event("b", true, 1, None, 0),
            event("a", false, 1, None, 1),
            event("b", false, 2, None, 2),
        ];
        let batch = prepare_sequences(events, None);
        assert_eq!(batch.sequences.len(), 2);
        assert_eq!(batch.sequences[&PlayerId::from("a")].len(), 1);
        assert_eq!(batch.sequences[&PlayerId::from("b")].outcomes(), &[1, 0]);
        assert_eq!(batch.total_events(), 3);
        assert_eq!(batch.excluded_events, 0);
    }

    #[test]
    fn prepare_applies_allowlist() {
        let events = vec![
            event("a", true, 1, None, 0),
            event("b", true, 1, None, 1),
            event("c", true, 1, None, 2),
        ];
        let allow = vec!["a".to_string(), " c ".to_string()];
        let batch = prepare_sequences(events, Some(&allow));
        assert_eq!(batch.sequences.len(), 2);
        assert!(!batch.sequences.contains_key(&PlayerId::from("b")));
        assert_eq!(batch.excluded_events, 1);
    }

    #[test]
    fn meets_minimum_threshold() {
        let events = (0..5).map(|i| event("a", true, 1, None, i)).collect();
        let seq = EntitySequence::new(PlayerId::from("a"), events).unwrap();
        assert!(seq.meets_minimum(5));
        assert!(!seq.meets_minimum(6));
    }
}
