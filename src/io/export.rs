//! Export results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::TestIntervalResult;
use crate::error::{LactationError, Result};

/// Write `TestId,Total305Yield` rows.
pub fn write_test_interval_csv<W: Write>(writer: W, results: &[TestIntervalResult]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    if results.is_empty() {
        // serde only emits headers alongside the first record.
        out.write_record(["TestId", "Total305Yield"]).map_err(write_error)?;
    }
    for result in results {
        out.serialize(result).map_err(write_error)?;
    }
    out.flush()
        .map_err(|e| LactationError::configuration(format!("Failed to flush export CSV: {e}")))
}

/// Write a predicted curve as `dim,yield`, day 1 first.
pub fn write_predicted_curve_csv<W: Write>(writer: W, predicted: &[f64]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["dim", "yield"]).map_err(write_error)?;
    for (idx, value) in predicted.iter().enumerate() {
        out.write_record([(idx + 1).to_string(), format!("{value:.6}")])
            .map_err(write_error)?;
    }
    out.flush()
        .map_err(|e| LactationError::configuration(format!("Failed to flush export CSV: {e}")))
}

/// Write TIM results to a CSV file.
pub fn export_test_interval_csv(path: &Path, results: &[TestIntervalResult]) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        LactationError::configuration(format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;
    write_test_interval_csv(file, results)
}

fn write_error(e: csv::Error) -> LactationError {
    LactationError::configuration(format!("Failed to write export CSV row: {e}"))
}
