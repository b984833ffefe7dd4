//! Derived statistics over analysis output.
//!
//! Everything here is a pure function of augmented rows, so it gives the
//! same answer on a fresh run and on a re-loaded export. Category filters
//! apply after labeling: hot-zone flags always come from the player's full
//! chronological sequence.

use clap::ValueEnum;
use hh_common::PlayerId;
use hh_config::TrajectoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

use crate::pipeline::AugmentedShot;
use crate::prepare::ShotCategory;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("player not found in analysis output: {player}")]
    UnknownEntity { player: String },

    #[error("rolling window must be at least 1")]
    InvalidWindow,

    #[error("trajectory stride must be at least 1")]
    InvalidStride,
}

impl From<StatsError> for hh_common::Error {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::UnknownEntity { player } => hh_common::Error::UnknownEntity { player },
            other => hh_common::Error::InvalidQuery(other.to_string()),
        }
    }
}

/// Shot category filter for derived queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    #[value(name = "2pt")]
    #[serde(rename = "2pt")]
    TwoPoint,
    #[value(name = "3pt")]
    #[serde(rename = "3pt")]
    ThreePoint,
}

impl CategoryFilter {
    pub fn matches(&self, category: &ShotCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::TwoPoint => *category == ShotCategory::TwoPoint,
            CategoryFilter::ThreePoint => *category == ShotCategory::ThreePoint,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => write!(f, "all"),
            CategoryFilter::TwoPoint => write!(f, "2pt"),
            CategoryFilter::ThreePoint => write!(f, "3pt"),
        }
    }
}

/// One player's rows, in output order, after the category filter.
#[derive(Debug, Clone)]
pub struct PlayerView<'a> {
    pub player: PlayerId,
    pub filter: CategoryFilter,
    pub shots: Vec<&'a AugmentedShot>,
}

/// Select one player's rows.
///
/// Fails only when the player has no rows at all. A player present but with
/// nothing matching the filter yields an empty view.
pub fn player_view<'a>(
    rows: &'a [AugmentedShot],
    player: &str,
    filter: CategoryFilter,
) -> Result<PlayerView<'a>, StatsError> {
    let mut found = false;
    let mut shots = Vec::new();
    for row in rows.iter().filter(|r| r.player.as_str() == player) {
        found = true;
        if filter.matches(&row.category) {
            shots.push(row);
        }
    }
    if !found {
        return Err(StatsError::UnknownEntity {
            player: player.to_string(),
        });
    }
    Ok(PlayerView {
        player: PlayerId::from(player),
        filter,
        shots,
    })
}

/// Every player in the rows, sorted.
pub fn players(rows: &[AugmentedShot]) -> Vec<PlayerId> {
    rows.iter()
        .map(|r| r.player.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn mean_made<'a, I>(shots: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a &'a AugmentedShot>,
{
    let (n, makes) = shots
        .into_iter()
        .fold((0usize, 0usize), |(n, m), s| (n + 1, m + usize::from(s.made)));
    (n > 0).then(|| makes as f64 / n as f64)
}

/// Make rate over every shot in the view.
pub fn aggregate_efficiency(view: &PlayerView<'_>) -> Option<f64> {
    mean_made(&view.shots)
}

/// Make rate over hot-zone shots in the view.
pub fn hot_zone_efficiency(view: &PlayerView<'_>) -> Option<f64> {
    mean_made(view.shots.iter().filter(|s| s.is_hot_zone))
}

/// Efficiency summary for one player view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub shots: usize,
    pub makes: usize,
    pub aggregate_efficiency: Option<f64>,
    pub hot_zone_shots: usize,
    pub hot_zone_efficiency: Option<f64>,
    /// Hot-zone minus aggregate efficiency. Zero when the view has shots but
    /// none in the hot zone.
    pub hot_hand_effect: Option<f64>,
}

pub fn efficiency_metrics(view: &PlayerView<'_>) -> EfficiencyMetrics {
    let aggregate = aggregate_efficiency(view);
    let hot = hot_zone_efficiency(view);
    let hot_hand_effect = aggregate.map(|agg| hot.map_or(0.0, |h| h - agg));

    EfficiencyMetrics {
        shots: view.shots.len(),
        makes: view.shots.iter().filter(|s| s.made).count(),
        aggregate_efficiency: aggregate,
        hot_zone_shots: view.shots.iter().filter(|s| s.is_hot_zone).count(),
        hot_zone_efficiency: hot,
        hot_hand_effect,
    }
}

/// Volume summary for one player view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerProfile {
    pub total_shots: usize,
    pub total_makes: usize,
    pub games_tracked: usize,
    /// Points from made field goals only; free throws are not in the data.
    pub estimated_points: u64,
}

pub fn career_profile(view: &PlayerView<'_>) -> CareerProfile {
    let games: HashSet<&str> = view.shots.iter().map(|s| s.game_id.as_str()).collect();
    CareerProfile {
        total_shots: view.shots.len(),
        total_makes: view.shots.iter().filter(|s| s.made).count(),
        games_tracked: games.len(),
        estimated_points: view
            .shots
            .iter()
            .filter(|s| s.made)
            .map(|s| u64::from(s.category.point_value()))
            .sum(),
    }
}

/// Form at one point of a player's shot history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// 1-based position in the view.
    pub shot_number: usize,
    /// Expanding mean up to and including this shot.
    pub career_efficiency: f64,
    /// Trailing mean over the last `window` shots; None until the window fills.
    pub current_form: Option<f64>,
}

/// Expanding and rolling make rate for every shot in the view.
pub fn trajectory(view: &PlayerView<'_>, window: usize) -> Result<Vec<TrajectoryPoint>, StatsError> {
    if window == 0 {
        return Err(StatsError::InvalidWindow);
    }
    let outcomes: Vec<u32> = view.shots.iter().map(|s| u32::from(s.made)).collect();
    let mut points = Vec::with_capacity(outcomes.len());
    let mut cumulative = 0u64;
    let mut in_window = 0u64;

    for (i, &o) in outcomes.iter().enumerate() {
        cumulative += u64::from(o);
        in_window += u64::from(o);
        if i >= window {
            in_window -= u64::from(outcomes[i - window]);
        }
        let n = i + 1;
        points.push(TrajectoryPoint {
            shot_number: n,
            career_efficiency: cumulative as f64 / n as f64,
            current_form: (n >= window).then(|| in_window as f64 / window as f64),
        });
    }
    Ok(points)
}

/// Keep every `stride`-th point starting with the first.
pub fn sample_trajectory(
    points: &[TrajectoryPoint],
    stride: usize,
) -> Result<Vec<TrajectoryPoint>, StatsError> {
    if stride == 0 {
        return Err(StatsError::InvalidStride);
    }
    Ok(points.iter().step_by(stride).copied().collect())
}

/// Everything the report command prints for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub player: PlayerId,
    pub category: CategoryFilter,
    pub profile: CareerProfile,
    pub metrics: EfficiencyMetrics,
    pub rolling_window: usize,
    pub stride: usize,
    pub trajectory: Vec<TrajectoryPoint>,
}

pub fn player_report(
    rows: &[AugmentedShot],
    player: &str,
    filter: CategoryFilter,
    trajectory_config: &TrajectoryConfig,
) -> Result<PlayerReport, StatsError> {
    let view = player_view(rows, player, filter)?;
    let points = trajectory(&view, trajectory_config.rolling_window)?;
    Ok(PlayerReport {
        player: view.player.clone(),
        category: filter,
        profile: career_profile(&view),
        metrics: efficiency_metrics(&view),
        rolling_window: trajectory_config.rolling_window,
        stride: trajectory_config.stride,
        trajectory: sample_trajectory(&points, trajectory_config.stride)?,
    })
}
