#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::RagError;

/// A single note loaded from the notes CSV, with normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Position of this note in the source collection, counted before
    /// empty rows are dropped.
    pub original_index: usize,
    pub text: String,
    /// Creation timestamp in microseconds since the epoch, if present.
    pub created_at: Option<i64>,
    /// Last-edit timestamp in microseconds since the epoch, if present.
    pub modified_at: Option<i64>,
}

/// Collapse every run of whitespace to a single ASCII space and trim.
///
/// Idempotent; empty or whitespace-only input yields the empty string.
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Load notes from a CSV file with a required `text` column and optional
/// `created_at`/`modified_at` integer-timestamp columns.
///
/// Rows whose normalized text is empty are dropped; `original_index` still
/// counts them so it stays stable against the source collection.
#[inline]
pub fn load_notes(path: &Path) -> Result<Vec<Note>> {
    if !path.exists() {
        return Err(RagError::Ingest(format!(
            "Notes file not found: {}. Run the import-keep command or place a CSV there first.",
            path.display()
        ))
        .into());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open notes CSV: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    let text_col = headers.iter().position(|h| h == "text").ok_or_else(|| {
        RagError::Ingest(format!(
            "Notes CSV {} must contain a 'text' column",
            path.display()
        ))
    })?;
    let created_col = headers.iter().position(|h| h == "created_at");
    let modified_col = headers.iter().position(|h| h == "modified_at");

    let mut total_rows = 0usize;
    let mut notes = Vec::new();
    for (original_index, record) in reader.records().enumerate() {
        let record = record.context("Failed to read CSV record")?;
        total_rows += 1;

        let text = normalize_whitespace(record.get(text_col).unwrap_or_default());
        if text.is_empty() {
            debug!("Dropping empty note at row {}", original_index);
            continue;
        }

        let created_at = created_col
            .and_then(|col| record.get(col))
            .and_then(parse_timestamp);
        let modified_at = modified_col
            .and_then(|col| record.get(col))
            .and_then(parse_timestamp);

        notes.push(Note {
            original_index,
            text,
            created_at,
            modified_at,
        });
    }

    info!(
        "Loaded {} notes from {} ({} rows dropped as empty)",
        notes.len(),
        path.display(),
        total_rows - notes.len()
    );
    Ok(notes)
}

/// Parse a timestamp field that may be an integer or a float-formatted
/// integer (CSV writers differ when the column has missing values).
fn parse_timestamp(field: &str) -> Option<i64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value as i64)
}

#[derive(Debug, Deserialize)]
struct KeepNote {
    #[serde(rename = "textContent")]
    text_content: Option<String>,
    #[serde(rename = "createdTimestampUsec")]
    created_timestamp_usec: Option<i64>,
    #[serde(rename = "userEditedTimestampUsec")]
    user_edited_timestamp_usec: Option<i64>,
}

/// Convert a directory of Google Keep JSON exports into the notes CSV.
///
/// Records without a `textContent` field are skipped. Notes are written
/// newest-first by creation timestamp. Returns the number of notes written.
#[inline]
pub fn import_keep_exports(json_dir: &Path, csv_path: &Path) -> Result<usize> {
    if !json_dir.is_dir() {
        return Err(RagError::Ingest(format!(
            "Keep export directory not found: {}",
            json_dir.display()
        ))
        .into());
    }

    let mut entries: Vec<_> = fs::read_dir(json_dir)
        .with_context(|| format!("Failed to read directory: {}", json_dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    let mut imported = Vec::new();
    for path in &entries {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read Keep export: {}", path.display()))?;
        let note: KeepNote = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse Keep export: {}", path.display()))?;

        let Some(text) = note.text_content else {
            warn!("Skipping Keep export without text content: {}", path.display());
            continue;
        };

        imported.push((
            text,
            note.created_timestamp_usec,
            note.user_edited_timestamp_usec,
        ));
    }

    // Newest first, matching the ordering of the original export tooling.
    imported.sort_by(|a, b| b.1.cmp(&a.1));

    if let Some(parent) = csv_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create notes CSV: {}", csv_path.display()))?;
    writer
        .write_record(["text", "created_at", "modified_at"])
        .context("Failed to write CSV headers")?;
    for (text, created_at, modified_at) in &imported {
        let created = created_at.map(|v| v.to_string()).unwrap_or_default();
        let modified = modified_at.map(|v| v.to_string()).unwrap_or_default();
        writer
            .write_record([text.as_str(), created.as_str(), modified.as_str()])
            .context("Failed to write CSV record")?;
    }
    writer.flush().context("Failed to flush notes CSV")?;

    info!(
        "Imported {} Keep notes into {}",
        imported.len(),
        csv_path.display()
    );
    Ok(imported.len())
}
