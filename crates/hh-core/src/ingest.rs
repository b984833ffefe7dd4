//! Shot log ingest from CSV or JSON Lines.
//!
//! Column names are matched case-insensitively. A required column missing
//! from the whole input fails the batch; a single row with a missing or
//! unparseable value is dropped and counted by reason.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use hh_common::{GameId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

use crate::prepare::{EventTime, ShotCategory, ShotEvent};

pub const PLAYER_FIELD: &str = "PLAYER_NAME";
pub const OUTCOME_FIELD: &str = "SHOT_MADE";
pub const CATEGORY_FIELD: &str = "SHOT_TYPE";
pub const DATE_FIELD: &str = "GAME_DATE";
pub const GAME_FIELD: &str = "GAME_ID";
pub const ORDINAL_FIELD: &str = "EVENT_ORDINAL";

/// Columns every input must carry.
pub const REQUIRED_FIELDS: [&str; 5] = [
    PLAYER_FIELD,
    OUTCOME_FIELD,
    CATEGORY_FIELD,
    DATE_FIELD,
    GAME_FIELD,
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m-%d-%Y", "%Y%m%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Batch-level ingest failures. Nothing is emitted when one occurs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input is missing required field: {field}")]
    MissingField { field: String },

    #[error("input contains no records")]
    Empty,

    #[error("cannot infer input format from {0}")]
    UnknownFormat(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for hh_common::Error {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MissingField { field } => hh_common::Error::MissingField { field },
            IngestError::Empty => hh_common::Error::EmptyInput,
            IngestError::UnknownFormat(path) => hh_common::Error::Input(format!(
                "cannot infer input format from {}",
                path.display()
            )),
            IngestError::Csv(e) => hh_common::Error::Csv(e.to_string()),
            IngestError::Io(e) => hh_common::Error::Io(e),
        }
    }
}

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Csv,
    Jsonl,
}

impl InputFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(InputFormat::Csv),
            "jsonl" | "ndjson" | "json" => Some(InputFormat::Jsonl),
            _ => None,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Csv => write!(f, "csv"),
            InputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Why a single row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Row could not be decoded at all (bad UTF-8, not a JSON object).
    Unreadable,
    MissingPlayer,
    MissingOutcome,
    InvalidOutcome,
    MissingCategory,
    MissingTimestamp,
    InvalidTimestamp,
    MissingGameId,
    InvalidOrdinal,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::Unreadable => "unreadable",
            DropReason::MissingPlayer => "missing_player",
            DropReason::MissingOutcome => "missing_outcome",
            DropReason::InvalidOutcome => "invalid_outcome",
            DropReason::MissingCategory => "missing_category",
            DropReason::MissingTimestamp => "missing_timestamp",
            DropReason::InvalidTimestamp => "invalid_timestamp",
            DropReason::MissingGameId => "missing_game_id",
            DropReason::InvalidOrdinal => "invalid_ordinal",
        };
        write!(f, "{}", s)
    }
}

/// Row accounting for one ingest pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl IngestReport {
    pub fn rows_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    fn record_drop(&mut self, index: usize, reason: DropReason) {
        trace!(row = index, reason = %reason, "dropping row");
        *self.dropped.entry(reason).or_insert(0) += 1;
    }
}

/// Parsed events plus row accounting.
#[derive(Debug, Clone, Default)]
pub struct IngestOutput {
    pub events: Vec<ShotEvent>,
    pub report: IngestReport,
}

impl IngestOutput {
    fn accept(&mut self, index: usize, parsed: Result<ShotEvent, DropReason>) {
        self.report.rows_read += 1;
        match parsed {
            Ok(event) => {
                self.report.rows_kept += 1;
                self.events.push(event);
            }
            Err(reason) => self.report.record_drop(index, reason),
        }
    }
}

/// Parse a shot outcome. Accepts 1/0, true/false, t/f, yes/no, made/missed.
pub fn parse_outcome(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" | "y" | "made" | "make" => Some(true),
        "0" | "0.0" | "false" | "f" | "no" | "n" | "missed" | "miss" => Some(false),
        _ => None,
    }
}

/// Parse a game date or event timestamp.
///
/// Date-only values map to midnight. RFC 3339 values are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

fn parse_ordinal(raw: &str) -> Option<u32> {
    if let Ok(v) = raw.parse::<u32>() {
        return Some(v);
    }
    // JSON numbers sometimes arrive as 12.0
    let f = raw.parse::<f64>().ok()?;
    if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) {
        Some(f as u32)
    } else {
        None
    }
}

fn normalize_field_name(name: &str) -> String {
    name.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_ascii_uppercase()
}

/// Raw values for one row, before coercion.
#[derive(Default)]
struct RawShot<'a> {
    player: Option<&'a str>,
    outcome: Option<&'a str>,
    category: Option<&'a str>,
    date: Option<&'a str>,
    game_id: Option<&'a str>,
    ordinal: Option<&'a str>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl RawShot<'_> {
    fn coerce(&self, record_index: usize) -> Result<ShotEvent, DropReason> {
        let player = present(self.player)
            .and_then(PlayerId::parse)
            .ok_or(DropReason::MissingPlayer)?;
        let made = parse_outcome(present(self.outcome).ok_or(DropReason::MissingOutcome)?)
            .ok_or(DropReason::InvalidOutcome)?;
        let category = present(self.category)
            .and_then(ShotCategory::parse)
            .ok_or(DropReason::MissingCategory)?;
        let at = parse_timestamp(present(self.date).ok_or(DropReason::MissingTimestamp)?)
            .ok_or(DropReason::InvalidTimestamp)?;
        let game_id = present(self.game_id)
            .and_then(GameId::parse)
            .ok_or(DropReason::MissingGameId)?;
        let ordinal = match present(self.ordinal) {
            Some(raw) => Some(parse_ordinal(raw).ok_or(DropReason::InvalidOrdinal)?),
            None => None,
        };

        Ok(ShotEvent {
            player,
            made,
            category,
            time: EventTime { at, ordinal },
            game_id,
            record_index,
        })
    }
}

/// Column positions resolved from a CSV header.
struct ColumnMap {
    player: usize,
    outcome: usize,
    category: usize,
    date: usize,
    game_id: usize,
    ordinal: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let names: Vec<String> = headers.iter().map(normalize_field_name).collect();
        let find = |field: &str| names.iter().position(|n| n == field);
        let require = |field: &str| {
            find(field).ok_or_else(|| IngestError::MissingField {
                field: field.to_string(),
            })
        };

        Ok(Self {
            player: require(PLAYER_FIELD)?,
            outcome: require(OUTCOME_FIELD)?,
            category: require(CATEGORY_FIELD)?,
            date: require(DATE_FIELD)?,
            game_id: require(GAME_FIELD)?,
            ordinal: find(ORDINAL_FIELD),
        })
    }

    fn raw<'r>(&self, record: &'r csv::StringRecord) -> RawShot<'r> {
        RawShot {
            player: record.get(self.player),
            outcome: record.get(self.outcome),
            category: record.get(self.category),
            date: record.get(self.date),
            game_id: record.get(self.game_id),
            ordinal: self.ordinal.and_then(|i| record.get(i)),
        }
    }
}

/// Read shot records from CSV with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<IngestOutput, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::Empty);
    }
    let columns = ColumnMap::from_headers(&headers)?;

    let mut output = IngestOutput::default();
    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                let parsed = columns.raw(&record).coerce(index);
                output.accept(index, parsed);
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(_) => output.accept(index, Err(DropReason::Unreadable)),
        }
    }

    if output.report.rows_read == 0 {
        return Err(IngestError::Empty);
    }
    Ok(output)
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read shot records from JSON Lines, one object per line.
///
/// Blank lines are skipped. A required key that appears in no record fails
/// the batch just like a missing CSV column.
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<IngestOutput, IngestError> {
    let mut output = IngestOutput::default();
    let mut seen: HashSet<&'static str> = HashSet::new();
    let mut index = 0;

    for raw_line in reader.split(b'\n') {
        let raw_line = raw_line?;
        let line = match std::str::from_utf8(&raw_line) {
            Ok(text) => text,
            Err(_) => {
                output.accept(index, Err(DropReason::Unreadable));
                index += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let record_index = index;
        index += 1;

        let object = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => {
                output.accept(record_index, Err(DropReason::Unreadable));
                continue;
            }
        };

        let mut values: [Option<String>; 6] = Default::default();
        for (key, value) in &object {
            let slot = match normalize_field_name(key).as_str() {
                PLAYER_FIELD => 0,
                OUTCOME_FIELD => 1,
                CATEGORY_FIELD => 2,
                DATE_FIELD => 3,
                GAME_FIELD => 4,
                ORDINAL_FIELD => 5,
                _ => continue,
            };
            if slot < REQUIRED_FIELDS.len() {
                seen.insert(REQUIRED_FIELDS[slot]);
            }
            values[slot] = json_text(value);
        }

        let raw = RawShot {
            player: values[0].as_deref(),
            outcome: values[1].as_deref(),
            category: values[2].as_deref(),
            date: values[3].as_deref(),
            game_id: values[4].as_deref(),
            ordinal: values[5].as_deref(),
        };
        let parsed = raw.coerce(record_index);
        output.accept(record_index, parsed);
    }

    if output.report.rows_read == 0 {
        return Err(IngestError::Empty);
    }
    if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !seen.contains(*f)) {
        return Err(IngestError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(output)
}

/// Read from an in-memory buffer.
pub fn read_bytes(bytes: &[u8], format: InputFormat) -> Result<IngestOutput, IngestError> {
    match format {
        InputFormat::Csv => read_csv(bytes),
        InputFormat::Jsonl => read_jsonl(bytes),
    }
}

/// Open and read a shot log, inferring the format from the extension when
/// `format` is None.
pub fn load_path(path: &Path, format: Option<InputFormat>) -> Result<IngestOutput, IngestError> {
    let format = format
        .or_else(|| InputFormat::from_path(path))
        .ok_or_else(|| IngestError::UnknownFormat(path.to_path_buf()))?;
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let output = match format {
        InputFormat::Csv => read_csv(reader)?,
        InputFormat::Jsonl => read_jsonl(reader)?,
    };
    debug!(
        path = %path.display(),
        format = %format,
        rows_read = output.report.rows_read,
        rows_kept = output.report.rows_kept,
        "read shot log"
    );
    Ok(output)
}
