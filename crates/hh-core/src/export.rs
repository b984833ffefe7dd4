//! Augmented dataset export and re-load.
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! reader never observes a half-written export.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::pipeline::AugmentedShot;

/// Errors writing or re-reading an augmented dataset.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot infer export format from {0}")]
    UnknownFormat(PathBuf),
}

impl From<ExportError> for hh_common::Error {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Io { source, .. } => hh_common::Error::Io(source),
            ExportError::Csv(e) => hh_common::Error::Csv(e.to_string()),
            ExportError::Json { source, .. } => hh_common::Error::Json(source),
            ExportError::UnknownFormat(path) => hh_common::Error::Input(format!(
                "cannot infer format from {}",
                path.display()
            )),
        }
    }
}

/// Serialization of the augmented dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Jsonl,
}

impl ExportFormat {
    /// Infer from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(ExportFormat::Csv),
            "jsonl" | "ndjson" | "json" => Some(ExportFormat::Jsonl),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Resolve an explicit format or fall back to the extension.
pub fn resolve_format(path: &Path, explicit: Option<ExportFormat>) -> Result<ExportFormat, ExportError> {
    explicit
        .or_else(|| ExportFormat::from_path(path))
        .ok_or_else(|| ExportError::UnknownFormat(path.to_path_buf()))
}

/// Serialize rows into memory.
pub fn encode_rows(rows: &[AugmentedShot], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in rows {
                writer.serialize(row)?;
            }
            writer
                .into_inner()
                .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))
        }
        ExportFormat::Jsonl => {
            let mut buf = Vec::new();
            for (i, row) in rows.iter().enumerate() {
                serde_json::to_writer(&mut buf, row)
                    .map_err(|source| ExportError::Json { line: i + 1, source })?;
                buf.push(b'\n');
            }
            Ok(buf)
        }
    }
}

/// Write rows to `path`, replacing any existing file atomically.
pub fn write_rows(path: &Path, rows: &[AugmentedShot], format: ExportFormat) -> Result<(), ExportError> {
    let content = encode_rows(rows, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    replace_atomically(path, |file| file.write_all(&content))?;

    debug!(path = %path.display(), rows = rows.len(), %format, "wrote augmented dataset");
    Ok(())
}

/// Write through `write` into a sibling temp file, then rename it over
/// `path`. The temp file is removed if any step fails.
fn replace_atomically<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
{
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("export");
    let tmp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, std::process::id()));
    let mut file = std::fs::File::create(&tmp_path).map_err(|source| ExportError::Io {
        path: tmp_path.clone(),
        source,
    })?;

    let written = write(&mut file);
    if written.is_ok() {
        let _ = file.sync_all();
    }
    drop(file);
    let result = written
        .map_err(|source| ExportError::Io {
            path: tmp_path.clone(),
            source,
        })
        .and_then(|()| {
            std::fs::rename(&tmp_path, path).map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })
        });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

/// Parse an augmented dataset previously produced by `write_rows`.
pub fn read_rows(bytes: &[u8], format: ExportFormat) -> Result<Vec<AugmentedShot>, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_reader(bytes);
            reader
                .deserialize()
                .collect::<Result<Vec<AugmentedShot>, csv::Error>>()
                .map_err(ExportError::from)
        }
        ExportFormat::Jsonl => {
            let mut rows = Vec::new();
            for (i, line) in bytes.lines().enumerate() {
                let line = line.map_err(|source| ExportError::Io {
                    path: PathBuf::from("<memory>"),
                    source,
                })?;
                if line.trim().is_empty() {
                    continue;
                }
                let row = serde_json::from_str(&line)
                    .map_err(|source| ExportError::Json { line: i + 1, source })?;
                rows.push(row);
            }
            Ok(rows)
        }
    }
}
