//! # Observed Data Loading
//!
//! Reads real titre measurements so the sampler can run on them. The input
//! is a comma-separated file with a header row and a fixed schema:
//!
//! ```text
//! person_id,time,biomarker_value
//! 1,0.0,2.1
//! 1,30.0,4.8
//! 2,0.0,1.7
//! ```
//!
//! Rows may arrive in any order. They are grouped by `person_id`, each
//! person's series is sorted by time, and individuals come back in ascending
//! id order. Observed individuals carry no ground truth.

use crate::types::Individual;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const ID_COLUMN: &str = "person_id";
const TIME_COLUMN: &str = "time";
const VALUE_COLUMN: &str = "biomarker_value";

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to read CSV input: {0}")]
    CsvError(#[from] csv::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(&'static str),
    #[error("Line {line}: column '{column}' has a missing value.")]
    MissingValue { line: u64, column: &'static str },
    #[error("Line {line}: could not parse '{value}' in column '{column}'.")]
    UnparsableValue {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("Line {line}: column '{column}' must be finite, found {value}.")]
    NonFiniteValue {
        line: u64,
        column: &'static str,
        value: f64,
    },
    #[error("The input file contains no data rows.")]
    NoRows,
}

/// Reads observations from a CSV file on disk.
pub fn load_observations(path: impl AsRef<Path>) -> Result<Vec<Individual>, DataError> {
    read_observations(File::open(path)?)
}

/// Reads observations from any CSV source.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Individual>, DataError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(DataError::ColumnNotFound(name))
    };
    let id_idx = column(ID_COLUMN)?;
    let time_idx = column(TIME_COLUMN)?;
    let value_idx = column(VALUE_COLUMN)?;

    let mut series: BTreeMap<usize, Vec<(f64, f64)>> = BTreeMap::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        if record.iter().all(str::is_empty) {
            continue;
        }

        let id: usize = parse_field(&record, id_idx, ID_COLUMN, line)?;
        let time: f64 = parse_field(&record, time_idx, TIME_COLUMN, line)?;
        let value: f64 = parse_field(&record, value_idx, VALUE_COLUMN, line)?;
        require_finite(time, TIME_COLUMN, line)?;
        require_finite(value, VALUE_COLUMN, line)?;

        series.entry(id).or_default().push((time, value));
    }

    if series.is_empty() {
        return Err(DataError::NoRows);
    }

    let individuals: Vec<Individual> = series
        .into_iter()
        .map(|(id, observations)| Individual::from_series(id, observations))
        .collect();
    log::debug!(
        "Loaded {} individuals ({} samples)",
        individuals.len(),
        individuals.iter().map(Individual::n_samples).sum::<usize>()
    );
    Ok(individuals)
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    column: &'static str,
    line: u64,
) -> Result<T, DataError> {
    let raw = match record.get(idx) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(DataError::MissingValue { line, column }),
    };
    raw.parse().map_err(|_| DataError::UnparsableValue {
        line,
        column,
        value: raw.to_string(),
    })
}

fn require_finite(value: f64, column: &'static str, line: u64) -> Result<(), DataError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DataError::NonFiniteValue {
            line,
            column,
            value,
        })
    }
}
