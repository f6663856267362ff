use std::fs;
use std::path::{Path, PathBuf};

use gonogo_core::{RESPONSE_KEY, TrialResult};
use serde::Serialize;

use crate::error::{ExportError, ExportResult};

/// Stands in when the participant gave no usable ID.
const UNKNOWN_PARTICIPANT: &str = "UNKNOWN";

/// One CSV line per main-block trial. Field order is the file's column
/// order: `participant_id,trial_type,response,correct,rt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub participant_id: String,
    pub trial_type: u8,
    pub response: u8,
    pub correct: u8,
    pub rt: u64,
}

impl ExportRow {
    fn from_result(participant_id: &str, result: &TrialResult) -> Self {
        let pressed = result.response_key == Some(RESPONSE_KEY);
        let correct = (result.is_go && pressed) || (!result.is_go && result.response_key.is_none());

        Self {
            participant_id: participant_id.to_string(),
            trial_type: result.is_go as u8,
            response: pressed as u8,
            correct: correct as u8,
            rt: result.reaction_time_ms().unwrap_or(0),
        }
    }
}

fn participant_or_unknown(participant_id: &str) -> &str {
    let trimmed = participant_id.trim();
    if trimmed.is_empty() {
        UNKNOWN_PARTICIPANT
    } else {
        trimmed
    }
}

/// Filters the session log down to main-block trials and derives the
/// response, correctness and reaction-time codes for each.
pub fn derive_rows(participant_id: &str, results: &[TrialResult]) -> Vec<ExportRow> {
    let participant_id = participant_or_unknown(participant_id);
    results
        .iter()
        .filter(|result| !result.is_practice)
        .map(|result| ExportRow::from_result(participant_id, result))
        .collect()
}

/// CSV bytes for the given rows, header included.
pub fn csv_bytes(rows: &[ExportRow]) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))
}

/// `gonogo_data_participant_<id>.csv`, with the ID reduced to characters
/// every filesystem accepts.
pub fn data_file_name(participant_id: &str) -> String {
    let id: String = participant_or_unknown(participant_id)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("gonogo_data_participant_{id}.csv")
}

/// Writes the session's main-block results as CSV into `dir` and returns
/// the file path. An empty row set aborts the export.
pub fn export_session(
    participant_id: &str,
    results: &[TrialResult],
    dir: &Path,
) -> ExportResult<PathBuf> {
    let rows = derive_rows(participant_id, results);
    if rows.is_empty() {
        return Err(ExportError::NoMainTrials);
    }

    let path = dir.join(data_file_name(participant_id));
    fs::write(&path, csv_bytes(&rows)?)?;
    Ok(path)
}

/// Like `export_session`, but retries in the OS temporary directory when
/// the primary location is not writable, reporting the substitute path.
pub fn export_session_with_fallback(
    participant_id: &str,
    results: &[TrialResult],
    dir: &Path,
) -> ExportResult<PathBuf> {
    match export_session(participant_id, results, dir) {
        Err(ExportError::Io(err)) => {
            let fallback = std::env::temp_dir();
            eprintln!("Could not write results to {}: {}", dir.display(), err);
            eprintln!("Retrying in {}", fallback.display());
            export_session(participant_id, results, &fallback)
        }
        other => other,
    }
}
