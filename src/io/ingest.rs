//! CSV ingest for test-day tables.
//!
//! Turns a heterogeneous test-day CSV into clean [`TestDay`] rows for the
//! Test Interval Method.
//!
//! Design goals:
//! - **Forgiving headers**: case-insensitive aliases, BOM stripped, explicit
//!   overrides win
//! - **Strict values**: a non-numeric or negative cell is an error naming the line
//! - **Row-level reporting**: rows with blank cells are skipped and reported
//! - **Separation of concerns**: no integration logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LactationError, Result};
use crate::icar::TestDay;

const DAYS_IN_MILK_ALIASES: &[&str] = &["daysinmilk", "dim", "testday"];
const MILK_YIELD_ALIASES: &[&str] = &[
    "milkingyield",
    "testdaymilkyield",
    "milkyield",
    "yield",
    "milkproduction",
    "milk_yield",
];
const TEST_ID_ALIASES: &[&str] = &["testid", "animalid", "id"];

/// Explicit column names, taking precedence over the aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOverrides {
    pub days_in_milk: Option<String>,
    pub milk_yield: Option<String>,
    pub test_id: Option<String>,
    /// Group id used when the table has no test id column.
    pub default_test_id: String,
}

impl Default for ColumnOverrides {
    fn default() -> Self {
        Self {
            days_in_milk: None,
            milk_yield: None,
            test_id: None,
            default_test_id: "0".to_string(),
        }
    }
}

/// A row that was read but not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: usable rows plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct TestDayTable {
    pub rows: Vec<TestDay>,
    pub skipped: Vec<RowError>,
    pub rows_read: usize,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    days_in_milk: usize,
    milk_yield: usize,
    test_id: Option<usize>,
}

/// Open and read a test-day CSV file.
pub fn load_test_days(path: &Path, columns: &ColumnOverrides) -> Result<TestDayTable> {
    let file = File::open(path)
        .map_err(|e| LactationError::configuration(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_test_days(file, columns)
}

/// Read test-day rows from any CSV source.
pub fn read_test_days<R: Read>(source: R, overrides: &ColumnOverrides) -> Result<TestDayTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| LactationError::validation(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let columns = resolve_columns(&header_map, overrides)?;

    let mut table = TestDayTable::default();
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, CSV lines are 1-based.
        let line = idx + 2;
        table.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                skip(&mut table, line, format!("CSV parse error: {e}"));
                continue;
            }
        };

        let Some(cells) = required_cells(&record, columns) else {
            skip(&mut table, line, "blank days-in-milk or yield".to_string());
            continue;
        };
        table.rows.push(parse_row(cells, columns, &record, line, overrides)?);
    }
    Ok(table)
}

fn skip(table: &mut TestDayTable, line: usize, message: String) {
    warn!(line, %message, "skipping CSV row");
    table.skipped.push(RowError { line, message });
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_columns(header_map: &HashMap<String, usize>, overrides: &ColumnOverrides) -> Result<Columns> {
    let days_in_milk = resolve_column(header_map, overrides.days_in_milk.as_deref(), DAYS_IN_MILK_ALIASES)?
        .ok_or_else(|| LactationError::configuration("No DaysInMilk column found (tried: daysinmilk, dim, testday)."))?;
    let milk_yield = resolve_column(header_map, overrides.milk_yield.as_deref(), MILK_YIELD_ALIASES)?
        .ok_or_else(|| LactationError::configuration(format!(
            "No MilkingYield column found (tried: {}).",
            MILK_YIELD_ALIASES.join(", ")
        )))?;
    let test_id = resolve_column(header_map, overrides.test_id.as_deref(), TEST_ID_ALIASES)?;
    Ok(Columns {
        days_in_milk,
        milk_yield,
        test_id,
    })
}

/// An override must exist; without one the first alias present is used.
fn resolve_column(header_map: &HashMap<String, usize>, explicit: Option<&str>, aliases: &[&str]) -> Result<Option<usize>> {
    if let Some(name) = explicit {
        return header_map
            .get(&normalize_header_name(name))
            .copied()
            .map(Some)
            .ok_or_else(|| LactationError::configuration(format!("Column override '{name}' is not in the CSV header.")));
    }
    Ok(aliases.iter().find_map(|alias| header_map.get(*alias).copied()))
}

fn required_cells(record: &StringRecord, columns: Columns) -> Option<(&str, &str)> {
    let dim = record.get(columns.days_in_milk).filter(|s| !s.is_empty())?;
    let milk = record.get(columns.milk_yield).filter(|s| !s.is_empty())?;
    Some((dim, milk))
}

fn parse_row(
    (dim, milk): (&str, &str),
    columns: Columns,
    record: &StringRecord,
    line: usize,
    overrides: &ColumnOverrides,
) -> Result<TestDay> {
    let days_in_milk = parse_number(dim, "days in milk", line)?;
    let milk_yield = parse_number(milk, "milk yield", line)?;
    if days_in_milk < 0.0 {
        return Err(LactationError::validation(format!(
            "Line {line}: negative days in milk {days_in_milk}"
        )));
    }
    if milk_yield < 0.0 {
        return Err(LactationError::validation(format!(
            "Line {line}: negative milk yield {milk_yield}"
        )));
    }
    let test_id = columns
        .test_id
        .and_then(|idx| record.get(idx))
        .filter(|s| !s.is_empty())
        .unwrap_or(overrides.default_test_id.as_str())
        .to_string();
    Ok(TestDay {
        test_id,
        days_in_milk,
        milk_yield,
    })
}

fn parse_number(raw: &str, what: &str, line: usize) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| LactationError::validation(format!("Line {line}: invalid {what} '{raw}'")))?;
    if !value.is_finite() {
        return Err(LactationError::validation(format!("Line {line}: invalid {what} '{raw}'")));
    }
    Ok(value)
}
