//! Batch analysis: prepare sequences, fit every eligible player in
//! parallel, then merge labels back onto the shot rows.
//!
//! Each fitting task owns its sequence and returns its own result. Nothing
//! is shared or locked while tasks run; merging starts only after every
//! task of the batch has joined.

use chrono::NaiveDateTime;
use hh_common::{GameId, PlayerId};
use hh_config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error, info, instrument};

use crate::inference::{
    policy_from_config, EntityFit, EstimatorError, EstimatorSettings, FittedStateModel,
    HotZonePolicy, StateEstimator, StateStats,
};
use crate::prepare::{prepare_sequences, EntitySequence, ShotCategory, ShotEvent};

/// One output row: the input shot plus its decoded state and hot-zone flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedShot {
    #[serde(rename = "PLAYER_NAME")]
    pub player: PlayerId,
    #[serde(rename = "GAME_ID")]
    pub game_id: GameId,
    #[serde(rename = "GAME_DATE")]
    pub game_date: NaiveDateTime,
    #[serde(rename = "EVENT_ORDINAL")]
    pub event_ordinal: Option<u32>,
    #[serde(rename = "SHOT_TYPE")]
    pub category: ShotCategory,
    #[serde(rename = "SHOT_MADE")]
    pub made: bool,
    /// None for players below the minimum sequence length.
    #[serde(rename = "DECODED_STATE")]
    pub decoded_state: Option<u8>,
    #[serde(rename = "IS_HOT_ZONE")]
    pub is_hot_zone: bool,
}

impl AugmentedShot {
    fn new(event: &ShotEvent, decoded_state: Option<u8>, is_hot_zone: bool) -> Self {
        Self {
            player: event.player.clone(),
            game_id: event.game_id.clone(),
            game_date: event.time.at,
            event_ordinal: event.time.ordinal,
            category: event.category.clone(),
            made: event.made,
            decoded_state,
            is_hot_zone,
        }
    }
}

/// Fitted or skipped, with the details of each path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityStatus {
    Fitted {
        model: FittedStateModel,
        states: Vec<StateStats>,
        policy: String,
        hot_states: Vec<u8>,
    },
    Skipped {
        min_sequence_len: usize,
    },
}

/// Per-player outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub player: PlayerId,
    pub shots: usize,
    pub makes: usize,
    pub make_rate: f64,
    pub hot_zone_shots: usize,
    /// Make rate over hot-zone shots; None when there are none.
    pub hot_zone_efficiency: Option<f64>,
    #[serde(flatten)]
    pub status: EntityStatus,
}

impl EntityReport {
    pub fn is_fitted(&self) -> bool {
        matches!(self.status, EntityStatus::Fitted { .. })
    }

    /// Best-ranked hot state, if the player was fitted.
    pub fn hot_state(&self) -> Option<u8> {
        match &self.status {
            EntityStatus::Fitted { hot_states, .. } => hot_states.first().copied(),
            EntityStatus::Skipped { .. } => None,
        }
    }
}

/// Result of analyzing one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutput {
    /// Rows grouped by player (lexicographic), chronological within a player.
    pub rows: Vec<AugmentedShot>,
    pub entities: BTreeMap<PlayerId, EntityReport>,
    /// Events dropped by the player allowlist.
    pub excluded_events: usize,
}

impl AnalysisOutput {
    pub fn fitted_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_fitted()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.entities.len() - self.fitted_count()
    }
}

/// Configured analysis engine. Stateless between runs.
pub struct Pipeline {
    estimator: StateEstimator,
    policy: Box<dyn HotZonePolicy>,
    min_sequence_len: usize,
    players: Option<Vec<String>>,
    workers: usize,
}

impl Pipeline {
    /// Build from a validated engine config.
    pub fn new(config: &EngineConfig) -> Result<Self, EstimatorError> {
        Ok(Self {
            estimator: StateEstimator::new(EstimatorSettings::from(&config.estimator))?,
            policy: policy_from_config(&config.labeling),
            min_sequence_len: config.preparation.min_sequence_len.max(1),
            players: config.preparation.players.clone(),
            workers: config.runtime.effective_workers(),
        })
    }

    pub fn min_sequence_len(&self) -> usize {
        self.min_sequence_len
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Run the full batch: prepare, fit in parallel, merge.
    #[instrument(skip(self, events), fields(events = events.len()))]
    pub fn analyze(&self, events: Vec<ShotEvent>) -> Result<AnalysisOutput, EstimatorError> {
        let batch = prepare_sequences(events, self.players.as_deref());
        let (eligible, short): (Vec<&EntitySequence>, Vec<&EntitySequence>) = batch
            .sequences
            .values()
            .partition(|seq| seq.meets_minimum(self.min_sequence_len));

        info!(
            players = batch.sequences.len(),
            eligible = eligible.len(),
            skipped = short.len(),
            excluded_events = batch.excluded_events,
            "prepared sequences"
        );
        for seq in &short {
            info!(
                player = seq.player().as_str(),
                shots = seq.len(),
                min_sequence_len = self.min_sequence_len,
                "below minimum sequence length; not fitted"
            );
        }

        let fits = self.fit_all(&eligible)?;

        // Every task has joined; merge in player order.
        let mut output = AnalysisOutput {
            excluded_events: batch.excluded_events,
            ..AnalysisOutput::default()
        };
        let mut fits: BTreeMap<&PlayerId, EntityFit> = fits.into_iter().collect();
        for (player, seq) in &batch.sequences {
            let fit = fits.remove(player);
            let report = self.merge_entity(seq, fit, &mut output.rows);
            output.entities.insert(player.clone(), report);
        }
        Ok(output)
    }

    /// Fit one sequence. Used by the batch path and directly by callers that
    /// analyze a single player.
    pub fn fit_sequence(&self, seq: &EntitySequence) -> Result<EntityFit, EstimatorError> {
        let fit = self.estimator.analyze(seq.outcomes(), self.policy.as_ref())?;
        debug!(
            player = seq.player().as_str(),
            shots = seq.len(),
            iterations = fit.model.iterations,
            converged = fit.model.converged,
            log_likelihood = fit.model.log_likelihood,
            hot_state = ?fit.label.primary(),
            "fitted entity"
        );
        Ok(fit)
    }

    fn fit_all<'a>(
        &self,
        sequences: &[&'a EntitySequence],
    ) -> Result<Vec<(&'a PlayerId, EntityFit)>, EstimatorError> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let max_parallel = self.workers.max(1).min(sequences.len());
        info!(
            count = sequences.len(),
            max_parallel, "fitting players in parallel"
        );

        // Each worker claims the next unfitted sequence until none remain.
        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<EntityFit, EstimatorError>>> =
            (0..sequences.len()).map(|_| None).collect();

        thread::scope(|s| {
            let handles: Vec<_> = (0..max_parallel)
                .map(|_| {
                    s.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(&seq) = sequences.get(index) else {
                                break;
                            };
                            done.push((index, self.fit_sequence(seq)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (index, fit) in done {
                            slots[index] = Some(fit);
                        }
                    }
                    Err(_) => error!("fitting thread panicked"),
                }
            }
        });

        sequences
            .iter()
            .zip(slots)
            .map(|(seq, slot)| {
                let fit = slot.unwrap_or_else(|| {
                    Err(EstimatorError::InvalidParameters(
                        "fitting thread panicked".to_string(),
                    ))
                })?;
                Ok((seq.player(), fit))
            })
            .collect()
    }

    fn merge_entity(
        &self,
        seq: &EntitySequence,
        fit: Option<EntityFit>,
        rows: &mut Vec<AugmentedShot>,
    ) -> EntityReport {
        let shots = seq.len();
        let makes = seq.outcomes().iter().filter(|&&o| o == 1).count();
        let make_rate = makes as f64 / shots as f64;

        match fit {
            Some(fit) => {
                let flags = fit.hot_flags();
                let mut hot_zone_shots = 0;
                let mut hot_zone_makes = 0;
                for ((event, &state), &hot) in seq.events().iter().zip(&fit.states).zip(&flags) {
                    if hot {
                        hot_zone_shots += 1;
                        hot_zone_makes += usize::from(event.made);
                    }
                    rows.push(AugmentedShot::new(event, Some(state), hot));
                }
                EntityReport {
                    player: seq.player().clone(),
                    shots,
                    makes,
                    make_rate,
                    hot_zone_shots,
                    hot_zone_efficiency: (hot_zone_shots > 0)
                        .then(|| hot_zone_makes as f64 / hot_zone_shots as f64),
                    status: EntityStatus::Fitted {
                        model: fit.model,
                        states: fit.state_stats,
                        policy: fit.label.policy,
                        hot_states: fit.label.hot_states,
                    },
                }
            }
            None => {
                rows.extend(seq.events().iter().map(|e| AugmentedShot::new(e, None, false)));
                EntityReport {
                    player: seq.player().clone(),
                    shots,
                    makes,
                    make_rate,
                    hot_zone_shots: 0,
                    hot_zone_efficiency: None,
                    status: EntityStatus::Skipped {
                        min_sequence_len: self.min_sequence_len,
                    },
                }
            }
        }
    }
}
