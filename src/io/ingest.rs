//! CSV ingest and validation.
//!
//! Each process is stored as one CSV table exported from the measurement
//! spreadsheets, with a header row naming the columns `x`, `exp_y`, `err`.
//!
//! Design goals:
//! - **Strict schema**: columns are looked up by name, never by position, and a
//!   missing column is an error naming it
//! - **Fail fast**: an unparseable or invalid row invalidates the whole run (a
//!   bootstrap over a silently truncated table would be misleading)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{DataRow, Dataset, DatasetGroup, Process};
use crate::error::{AppError, FitError};

/// Columns every table must provide.
pub const REQUIRED_COLUMNS: [&str; 3] = ["x", "exp_y", "err"];

/// Parse one table from any reader. `source` names the input in errors.
pub fn parse_dataset<R: Read>(reader: R, process: Process, source: &str) -> Result<Dataset, FitError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| FitError::schema(source, format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let columns = required_column_indices(&header_map, source)?;

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header, and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| FitError::schema(source, format!("line {line}: CSV parse error: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let row = parse_row(&record, columns).map_err(|msg| FitError::schema(source, format!("line {line}: {msg}")))?;
        if !(row.err.is_finite() && row.err > 0.0) {
            return Err(FitError::schema(
                source,
                format!("line {line}: `err` must be positive, got {}", row.err),
            ));
        }
        rows.push(row);
    }

    debug!(%process, source, rows = rows.len(), "parsed dataset");
    Dataset::new(process, rows).map_err(|e| match e {
        FitError::Schema { message, .. } => FitError::schema(source, message),
        other => other,
    })
}

/// Load one table from a CSV file.
pub fn load_dataset(path: &Path, process: Process) -> Result<Dataset, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    Ok(parse_dataset(file, process, &path.display().to_string())?)
}

/// Load all four tables from `data_dir` using the default file names.
pub fn load_all(data_dir: &Path) -> Result<DatasetGroup, AppError> {
    let mut datasets = Vec::with_capacity(Process::ALL.len());
    for process in Process::ALL {
        let path = data_dir.join(process.file_name());
        datasets.push(load_dataset(&path, process)?);
    }
    let group = DatasetGroup::new(datasets)?;
    info!(
        data_dir = %data_dir.display(),
        points = group.total_rows(),
        "loaded datasets"
    );
    Ok(group)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    x: usize,
    exp_y: usize,
    err: usize,
}

fn required_column_indices(header_map: &HashMap<String, usize>, source: &str) -> Result<ColumnIndices, FitError> {
    let lookup = |name: &str| {
        header_map
            .get(name)
            .copied()
            .ok_or_else(|| FitError::schema(source, format!("missing required column: `{name}`")))
    };
    Ok(ColumnIndices {
        x: lookup(REQUIRED_COLUMNS[0])?,
        exp_y: lookup(REQUIRED_COLUMNS[1])?,
        err: lookup(REQUIRED_COLUMNS[2])?,
    })
}

fn parse_row(record: &StringRecord, columns: ColumnIndices) -> Result<DataRow, String> {
    Ok(DataRow {
        x: parse_f64(record, columns.x, "x")?,
        exp_y: parse_f64(record, columns.exp_y, "exp_y")?,
        err: parse_f64(record, columns.err, "err")?,
    })
}

fn parse_f64(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing `{name}` value"))?;
    raw.parse::<f64>()
        .map_err(|_| format!("invalid `{name}` value: {raw:?}"))
}
