// src/resolve/mod.rs
//
// The two resolution tables the parser grows while walking the log: tick
// codes to timestamps, and metric types to their ordered column lists. Both
// are bind-before-use; a lookup that misses means the log is malformed or
// out of order.
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use crate::classify::SEPARATOR;
use crate::error::SplitError;

/// Fast parse of `"DD-MON-YYYY"` + `"HH:MM:SS"` (e.g. `04-DEC-2015`,
/// `16:59:52`) into a naive timestamp. Month abbreviations are matched
/// case-insensitively. Returns `None` on any shape mismatch.
pub fn parse_tick_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    let time = time.trim();
    // minimal length + separators check
    if !date.is_ascii() || !time.is_ascii() {
        return None;
    }
    if date.len() != 11 || &date[2..3] != "-" || &date[6..7] != "-" {
        return None;
    }
    if time.len() != 8 || &time[2..3] != ":" || &time[5..6] != ":" {
        return None;
    }

    let day: u32 = date[0..2].parse().ok()?;
    let month = month_number(&date[3..6])?;
    let year: i32 = date[7..11].parse().ok()?;
    let hour: u32 = time[0..2].parse().ok()?;
    let min: u32 = time[3..5].parse().ok()?;
    let sec: u32 = time[6..8].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, min, sec)
}

fn month_number(abbrev: &str) -> Option<u32> {
    match abbrev.to_ascii_uppercase().as_str() {
        "JAN" => Some(1),
        "FEB" => Some(2),
        "MAR" => Some(3),
        "APR" => Some(4),
        "MAY" => Some(5),
        "JUN" => Some(6),
        "JUL" => Some(7),
        "AUG" => Some(8),
        "SEP" => Some(9),
        "OCT" => Some(10),
        "NOV" => Some(11),
        "DEC" => Some(12),
        _ => None,
    }
}

/// Tick code → timestamp, accumulated from ZZZZ lines. Codes are bound once
/// and referenced many times by later data rows.
#[derive(Debug, Default)]
pub struct TickTable {
    ticks: HashMap<String, NaiveDateTime>,
}

impl TickTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick definition line into the table.
    /// Shape: `ZZZZ,<code>,<HH:MM:SS>,<DD-MON-YYYY>`.
    pub fn record(&mut self, line: &str, line_no: u64) -> Result<(), SplitError> {
        let fields: Vec<&str> = line.split(SEPARATOR).collect();
        if fields.len() < 4 {
            return Err(SplitError::MalformedLine {
                line_no,
                reason: format!("tick definition has {} fields, expected 4", fields.len()),
            });
        }
        let ts = parse_tick_timestamp(fields[3], fields[2]).ok_or_else(|| {
            SplitError::MalformedLine {
                line_no,
                reason: format!("unparseable tick time {:?} {:?}", fields[3], fields[2]),
            }
        })?;
        self.ticks.insert(fields[1].to_string(), ts);
        Ok(())
    }

    /// Look up a code a data row referenced. Binding strictly precedes use,
    /// so a miss is fatal for the run.
    pub fn resolve(&self, code: &str, line_no: u64) -> Result<NaiveDateTime, SplitError> {
        self.ticks
            .get(code)
            .copied()
            .ok_or_else(|| SplitError::UnresolvedTick {
                code: code.to_string(),
                line_no,
            })
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

/// Metric type → ordered column names, from each type's definition line.
#[derive(Debug, Default)]
pub struct MetricCatalog {
    definitions: HashMap<String, Vec<String>>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one definition line into the catalog.
    /// Shape: `<type>,<description>,<col1>,<col2>...`; the description is
    /// discarded. Redefining a type overwrites its previous column list.
    pub fn record(&mut self, line: &str) -> (String, usize) {
        let mut fields = line.split(SEPARATOR);
        let name = fields.next().unwrap_or_default().to_string();
        let _description = fields.next();
        let columns: Vec<String> = fields.map(str::to_string).collect();
        let width = columns.len();
        self.definitions.insert(name.clone(), columns);
        (name, width)
    }

    /// Ordered columns for a type, or an error if no definition line for it
    /// has been seen yet.
    pub fn columns_for(&self, name: &str, line_no: u64) -> Result<&[String], SplitError> {
        self.definitions
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SplitError::UndefinedMetricType {
                name: name.to_string(),
                line_no,
            })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }
}
