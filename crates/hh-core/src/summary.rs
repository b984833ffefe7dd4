//! Run summaries and player reports for stdout.
//!
//! JSON is the stable machine contract. Markdown and the one-line summary
//! are for people and may change wording between releases.

use chrono::{DateTime, Utc};
use hh_common::OutputFormat;
use hh_config::ConfigSnapshot;
use serde::{Deserialize, Serialize};

use crate::ingest::{IngestReport, InputFormat};
use crate::pipeline::{AnalysisOutput, EntityReport, EntityStatus};
use crate::stats::PlayerReport;

/// Schema version of the JSON summary and report payloads.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0.0";

/// Where the analyzed shots came from and where augmented rows went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIo {
    pub input: String,
    pub input_format: InputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Batch-level counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub players: usize,
    pub fitted: usize,
    pub skipped: usize,
    pub shots: usize,
    /// Events dropped by the player allowlist.
    pub excluded_events: usize,
}

impl From<&AnalysisOutput> for RunTotals {
    fn from(output: &AnalysisOutput) -> Self {
        RunTotals {
            players: output.entities.len(),
            fitted: output.fitted_count(),
            skipped: output.skipped_count(),
            shots: output.rows.len(),
            excluded_events: output.excluded_events,
        }
    }
}

/// Everything `analyze` reports about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: String,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub io: RunIo,
    pub ingest: IngestReport,
    pub config: ConfigSnapshot,
    pub totals: RunTotals,
    /// One entry per player, in player order.
    pub entities: Vec<EntityReport>,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        io: RunIo,
        ingest: IngestReport,
        config: ConfigSnapshot,
        output: &AnalysisOutput,
    ) -> Self {
        RunSummary {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            run_id: run_id.into(),
            generated_at: Utc::now(),
            io,
            ingest,
            config,
            totals: RunTotals::from(output),
            entities: output.entities.values().cloned().collect(),
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self),
            OutputFormat::Md => Ok(self.render_markdown()),
            OutputFormat::Summary => Ok(self.render_lines()),
        }
    }

    fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# hh-core analyze\n\n");
        out.push_str(&format!("Run: `{}`\n", self.run_id));
        out.push_str(&format!(
            "Input: `{}` ({})\n",
            self.io.input, self.io.input_format
        ));
        if let Some(output) = &self.io.output {
            out.push_str(&format!("Output: `{}`\n", output));
        }
        out.push_str(&format!(
            "Config: {} ({})\n\n",
            self.config.source,
            self.config.short_id()
        ));

        out.push_str("## Ingest\n\n");
        out.push_str(&format!(
            "- Rows read: {}\n- Rows kept: {}\n",
            self.ingest.rows_read, self.ingest.rows_kept
        ));
        for (reason, count) in &self.ingest.dropped {
            out.push_str(&format!("- Dropped ({}): {}\n", reason, count));
        }
        if self.totals.excluded_events > 0 {
            out.push_str(&format!(
                "- Excluded by player filter: {}\n",
                self.totals.excluded_events
            ));
        }

        out.push_str("\n## Players\n\n");
        out.push_str("| Player | Shots | Status | Iter | Converged | Log-lik | Hot state | FG% | Hot-zone FG% |\n");
        out.push_str("|---|---:|---|---:|---|---:|---:|---:|---:|\n");
        for entity in &self.entities {
            let (status, iter, converged, loglik) = match &entity.status {
                EntityStatus::Fitted { model, .. } => (
                    "fitted",
                    model.iterations.to_string(),
                    if model.converged { "yes" } else { "no" }.to_string(),
                    format!("{:.2}", model.log_likelihood),
                ),
                EntityStatus::Skipped { .. } => {
                    ("skipped", "-".to_string(), "-".to_string(), "-".to_string())
                }
            };
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                entity.player,
                entity.shots,
                status,
                iter,
                converged,
                loglik,
                entity
                    .hot_state()
                    .map_or_else(|| "-".to_string(), |s| s.to_string()),
                pct(Some(entity.make_rate)),
                pct(entity.hot_zone_efficiency),
            ));
        }

        let fitted: Vec<&EntityReport> = self.entities.iter().filter(|e| e.is_fitted()).collect();
        if !fitted.is_empty() {
            out.push_str("\n## States\n");
            for entity in fitted {
                if let EntityStatus::Fitted {
                    model,
                    states,
                    hot_states,
                    ..
                } = &entity.status
                {
                    out.push_str(&format!("\n### {}\n\n", entity.player));
                    out.push_str("| State | P(make) | Shots | Empirical FG% | Hot |\n");
                    out.push_str("|---:|---:|---:|---:|---|\n");
                    for (stat, p_make) in states.iter().zip(&model.emission_make) {
                        out.push_str(&format!(
                            "| {} | {:.3} | {} | {} | {} |\n",
                            stat.state,
                            p_make,
                            stat.shots,
                            pct(stat.make_rate),
                            if hot_states.contains(&stat.state) { "yes" } else { "" },
                        ));
                    }
                }
            }
        }
        out
    }

    fn render_lines(&self) -> String {
        let mut out = format!(
            "[{}] analyze: {} players ({} fitted, {} skipped), {} shots, {} rows dropped\n",
            self.run_id,
            self.totals.players,
            self.totals.fitted,
            self.totals.skipped,
            self.totals.shots,
            self.ingest.rows_dropped(),
        );
        for entity in &self.entities {
            let detail = match &entity.status {
                EntityStatus::Fitted { model, .. } => format!(
                    "fitted in {} iter{}, hot state {}, FG {} -> hot {}",
                    model.iterations,
                    if model.converged { "" } else { " (not converged)" },
                    entity
                        .hot_state()
                        .map_or_else(|| "-".to_string(), |s| s.to_string()),
                    pct(Some(entity.make_rate)),
                    pct(entity.hot_zone_efficiency),
                ),
                EntityStatus::Skipped { min_sequence_len } => {
                    format!("skipped (< {} shots)", min_sequence_len)
                }
            };
            out.push_str(&format!("  {}: {} shots, {}\n", entity.player, entity.shots, detail));
        }
        out
    }
}

/// Envelope for the `report` command payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub schema_version: String,
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub input: String,
    pub dataset_hash: String,
    pub players: Vec<PlayerReport>,
}

impl ReportEnvelope {
    pub fn new(
        run_id: impl Into<String>,
        input: impl Into<String>,
        dataset_hash: impl Into<String>,
        players: Vec<PlayerReport>,
    ) -> Self {
        ReportEnvelope {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            run_id: run_id.into(),
            generated_at: Utc::now(),
            input: input.into(),
            dataset_hash: dataset_hash.into(),
            players,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(self),
            OutputFormat::Md => Ok(self
                .players
                .iter()
                .map(render_player_markdown)
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Summary => Ok(self
                .players
                .iter()
                .map(|p| render_player_line(&self.run_id, p))
                .collect()),
        }
    }
}

fn render_player_markdown(report: &PlayerReport) -> String {
    let mut out = format!("# {} ({})\n\n", report.player, report.category);
    let p = &report.profile;
    let m = &report.metrics;
    out.push_str("## Career profile\n\n");
    out.push_str(&format!(
        "- Attempts: {}\n- Makes: {}\n- Games tracked: {}\n- Estimated points: {}\n\n",
        p.total_shots, p.total_makes, p.games_tracked, p.estimated_points
    ));
    out.push_str("## Efficiency\n\n");
    out.push_str(&format!(
        "- Aggregate FG%: {}\n- Hot-zone FG%: {} over {} shots\n- Hot-hand effect: {}\n\n",
        pct(m.aggregate_efficiency),
        pct(m.hot_zone_efficiency),
        m.hot_zone_shots,
        signed_pct(m.hot_hand_effect),
    ));
    out.push_str(&format!(
        "## Trajectory (window {}, every {} shots)\n\n",
        report.rolling_window, report.stride
    ));
    out.push_str("| Shot | Career FG% | Current form |\n|---:|---:|---:|\n");
    for point in &report.trajectory {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            point.shot_number,
            pct(Some(point.career_efficiency)),
            pct(point.current_form),
        ));
    }
    out
}

fn render_player_line(run_id: &str, report: &PlayerReport) -> String {
    format!(
        "[{}] {} ({}): {} shots in {} games, FG {}, hot zone {} ({} shots), effect {}\n",
        run_id,
        report.player,
        report.category,
        report.profile.total_shots,
        report.profile.games_tracked,
        pct(report.metrics.aggregate_efficiency),
        pct(report.metrics.hot_zone_efficiency),
        report.metrics.hot_zone_shots,
        signed_pct(report.metrics.hot_hand_effect),
    )
}

fn pct(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0))
}

fn signed_pct(delta: Option<f64>) -> String {
    delta.map_or_else(|| "-".to_string(), |d| format!("{:+.1} pts", d * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{FittedStateModel, StateStats};
    use crate::stats::{CareerProfile, CategoryFilter, EfficiencyMetrics, TrajectoryPoint};
    use hh_common::PlayerId;
    use std::collections::BTreeMap;

    fn fitted(player: &str) -> EntityReport {
        EntityReport {
            player: PlayerId::from(player),
            shots: 120,
            makes: 60,
            make_rate: 0.5,
            hot_zone_shots: 40,
            hot_zone_efficiency: Some(0.75),
            status: EntityStatus::Fitted {
                model: FittedStateModel {
                    initial: vec![0.5, 0.5],
                    transition: vec![vec![0.9, 0.1], vec![0.1, 0.9]],
                    emission_make: vec![0.2, 0.8],
                    log_likelihood: -70.25,
                    iterations: 12,
                    converged: true,
                },
                states: vec![
                    StateStats {
                        state: 0,
                        shots: 80,
                        makes: 30,
                        make_rate: Some(0.375),
                    },
                    StateStats {
                        state: 1,
                        shots: 40,
                        makes: 30,
                        make_rate: Some(0.75),
                    },
                ],
                policy: "argmax_mean".to_string(),
                hot_states: vec![1],
            },
        }
    }

    fn skipped(player: &str) -> EntityReport {
        EntityReport {
            player: PlayerId::from(player),
            shots: 3,
            makes: 1,
            make_rate: 1.0 / 3.0,
            hot_zone_shots: 0,
            hot_zone_efficiency: None,
            status: EntityStatus::Skipped {
                min_sequence_len: 100,
            },
        }
    }

    fn summary() -> RunSummary {
        let mut entities = BTreeMap::new();
        entities.insert(PlayerId::from("Alpha"), fitted("Alpha"));
        entities.insert(PlayerId::from("Beta"), skipped("Beta"));
        let output = AnalysisOutput {
            rows: Vec::new(),
            entities,
            excluded_events: 0,
        };
        RunSummary::new(
            "run-abc123def456",
            RunIo {
                input: "shots.csv".to_string(),
                input_format: InputFormat::Csv,
                output: None,
            },
            IngestReport::default(),
            ConfigSnapshot::defaults_only(),
            &output,
        )
    }

    #[test]
    fn json_summary_has_entities_and_totals() {
        let json: serde_json::Value =
            serde_json::from_str(&summary().render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["schema_version"], SUMMARY_SCHEMA_VERSION);
        assert_eq!(json["totals"]["fitted"], 1);
        assert_eq!(json["totals"]["skipped"], 1);
        assert_eq!(json["entities"][0]["player"], "Alpha");
        assert_eq!(json["entities"][0]["status"], "fitted");
        assert_eq!(json["entities"][0]["hot_states"][0], 1);
        assert_eq!(json["entities"][1]["status"], "skipped");
        assert!(json["io"].get("output").is_none());
    }

    #[test]
    fn markdown_lists_states_for_fitted_players_only() {
        let md = summary().render(OutputFormat::Md).unwrap();
        assert!(md.contains("| Alpha | 120 | fitted | 12 | yes |"));
        assert!(md.contains("| Beta | 3 | skipped |"));
        assert!(md.contains("### Alpha"));
        assert!(!md.contains("### Beta"));
        assert!(md.contains("| 1 | 0.800 | 40 | 75.0% | yes |"));
    }

    #[test]
    fn summary_lines_one_per_player() {
        let text = summary().render(OutputFormat::Summary).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[run-abc123def456] analyze: 2 players"));
        assert!(lines[1].contains("hot state 1"));
        assert!(lines[2].contains("skipped (< 100 shots)"));
    }

    #[test]
    fn player_report_renders_every_format() {
        let report = PlayerReport {
            player: PlayerId::from("Alpha"),
            category: CategoryFilter::ThreePoint,
            profile: CareerProfile {
                total_shots: 10,
                total_makes: 4,
                games_tracked: 2,
                estimated_points: 12,
            },
            metrics: EfficiencyMetrics {
                shots: 10,
                makes: 4,
                aggregate_efficiency: Some(0.4),
                hot_zone_shots: 0,
                hot_zone_efficiency: None,
                hot_hand_effect: Some(0.0),
            },
            rolling_window: 5,
            stride: 5,
            trajectory: vec![TrajectoryPoint {
                shot_number: 1,
                career_efficiency: 1.0,
                current_form: None,
            }],
        };
        let envelope = ReportEnvelope::new("run-1", "aug.csv", "deadbeef", vec![report]);

        let json: serde_json::Value =
            serde_json::from_str(&envelope.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["players"][0]["metrics"]["hot_hand_effect"], 0.0);
        assert!(json["players"][0]["metrics"]["hot_zone_efficiency"].is_null());

        let md = envelope.render(OutputFormat::Md).unwrap();
        assert!(md.contains("Hot-hand effect: +0.0 pts"));
        assert!(md.contains("Estimated points: 12"));

        let line = envelope.render(OutputFormat::Summary).unwrap();
        assert!(line.contains("FG 40.0%, hot zone - (0 shots)"));
    }
}
