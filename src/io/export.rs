//! Exports for external plotting and later comparison.
//!
//! - summary JSON: configuration, reference fit, per-parameter statistics
//! - trials CSV: one row per recorded trial, easy to load in a spreadsheet
//! - fit JSON: reference parameters plus fitted curves on a grid
//!
//! The JSON schemas are defined by `domain::SummaryFile` and `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{
    BootstrapConfig, CurveGrid, DatasetGroup, FitFile, FitResult, ParamVector, RunSummary, SummaryFile, TrialRecord,
};
use crate::error::AppError;
use crate::models::predict_all;

const TOOL: &str = "tmd";

/// Points per fitted curve in the fit JSON.
const GRID_POINTS: usize = 101;

/// Write the run summary JSON.
pub fn write_summary_json(
    path: &Path,
    config: &BootstrapConfig,
    reference: Option<&FitResult>,
    summary: &RunSummary,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;

    let out = SummaryFile {
        tool: TOOL.to_string(),
        config: config.clone(),
        reference: reference.cloned(),
        summary: summary.clone(),
    };

    serde_json::to_writer_pretty(file, &out)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}

/// Write one CSV row per trial record.
pub fn write_trials_csv(path: &Path, records: &[TrialRecord]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create trials CSV '{}': {e}", path.display())))?;
    write_trials(file, records)
}

fn write_trials<W: std::io::Write>(writer: W, records: &[TrialRecord]) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["trial"];
    header.extend(ParamVector::NAMES);
    header.push("retried");
    wtr.write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write trials CSV header: {e}")))?;

    for r in records {
        let mut row = Vec::with_capacity(header.len());
        row.push(r.trial.to_string());
        row.extend(r.params.0.iter().map(|v| format!("{v:.10}")));
        row.push(r.retried.to_string());
        wtr.write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write trials CSV row: {e}")))?;
    }

    wtr.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush trials CSV: {e}")))?;
    Ok(())
}

/// Write the reference fit with fitted curves spanning each dataset's `x` range.
pub fn write_fit_json(path: &Path, fit: &FitResult, group: &DatasetGroup) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;

    let out = FitFile {
        tool: TOOL.to_string(),
        fit: fit.clone(),
        reduced_chi2: fit.reduced_chi2(),
        curves: build_curves(&fit.params, group, GRID_POINTS),
    };

    serde_json::to_writer_pretty(file, &out)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Sample every process's model on `n` evenly spaced points over its data range.
pub fn build_curves(params: &ParamVector, group: &DatasetGroup, n: usize) -> Vec<CurveGrid> {
    let n = n.max(2);
    group
        .iter()
        .map(|ds| {
            let (mut x0, mut x1) = crate::math::min_max(ds.x()).unwrap_or((0.0, 1.0));
            if (x1 - x0).abs() < 1e-12 {
                x0 -= 0.5;
                x1 += 0.5;
            }
            let x: Vec<f64> = (0..n)
                .map(|i| x0 + (x1 - x0) * i as f64 / (n as f64 - 1.0))
                .collect();
            let y = predict_all(ds.process(), &x, params);
            CurveGrid {
                process: ds.process(),
                x,
                y,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataRow, Dataset, Process};

    #[test]
    fn trials_csv_has_one_row_per_record() {
        let records = [
            TrialRecord {
                trial: 0,
                params: ParamVector([1.0, 2.0, 3.0, 4.0, 0.5]),
                retried: false,
            },
            TrialRecord {
                trial: 2,
                params: ParamVector([1.1, 2.1, 3.1, 4.1, 0.6]),
                retried: true,
            },
        ];
        let mut buf = Vec::new();
        write_trials(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "trial,a1,a2,a3,a4,b,retried");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2,1.1000000000,"));
        assert!(lines[2].ends_with(",true"));
    }

    #[test]
    fn curves_span_each_dataset() {
        let datasets = Process::ALL.map(|p| {
            Dataset::new(
                p,
                [
                    DataRow { x: 0.1, exp_y: 1.0, err: 0.1 },
                    DataRow { x: 0.9, exp_y: 0.5, err: 0.1 },
                ],
            )
            .unwrap()
        });
        let group = DatasetGroup::new(datasets).unwrap();
        let curves = build_curves(&ParamVector([1.0, 2.0, 3.0, 4.0, 0.5]), &group, 5);

        assert_eq!(curves.len(), 4);
        for (curve, process) in curves.iter().zip(Process::ALL) {
            assert_eq!(curve.process, process);
            assert_eq!(curve.x.len(), 5);
            assert_eq!(curve.x[0], 0.1);
            assert!((curve.x[4] - 0.9).abs() < 1e-12);
            assert!(curve.y.windows(2).all(|w| w[1] < w[0]));
        }
    }

    #[test]
    fn summary_json_can_be_read_back() {
        let summary = RunSummary {
            requested: 5,
            succeeded: 4,
            retried: 1,
            dropped: 1,
            parameters: Vec::new(),
        };
        let path = std::env::temp_dir().join(format!("tmd-summary-{}.json", std::process::id()));
        write_summary_json(&path, &BootstrapConfig::default(), None, &summary).unwrap();
        let file: SummaryFile = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(file.tool, "tmd");
        assert_eq!(file.summary, summary);
        assert!(file.reference.is_none());
    }
}
