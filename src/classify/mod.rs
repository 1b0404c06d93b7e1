// src/classify/mod.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// Field separator used by the NMON format itself. Output tables use a
/// different separator, see `split`.
pub const SEPARATOR: char = ',';

/// Sentinel in field 0 of every timestamp ("tick") definition line.
pub const TICK_SENTINEL: &str = "ZZZZ";

/// Metric types the downstream tooling understands. Lines for any other type
/// are dropped without error.
pub static SUPPORTED_METRICS: &[&str] = &[
    "CPU_ALL",
    "MEM",
    "NET",
    "PROC",
    "NETPACKET",
    "DISKBUSY",
    "DISKREAD",
    "DISKWRITE",
    "DISKXFER",
    "DISKBSIZE",
];

/// Tick codes look like `T0001`: the data-row discriminator.
static TICK_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T[0-9]+$").unwrap());

/// What a single raw line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `ZZZZ,T0252,16:59:52,04-DEC-2015`
    TickDefinition,
    /// `CPU_ALL,CPU Total node-05,User%,Sys%,Wait%,Idle%,Busy,CPUs`
    MetricDefinition,
    /// `CPU_ALL,T0001,0.1,0.3,0.1,99.5,,24`
    MetricDataRow,
    /// Everything else the format carries and this tool does not need.
    Unrecognized,
}

/// Classify one raw line by structure alone. Pure; no state, no side effects.
pub fn classify(line: &str) -> LineKind {
    let mut fields = line.split(SEPARATOR);
    let first = fields.next().unwrap_or_default();

    // A bare token with no separator is never one of ours.
    if !line.contains(SEPARATOR) {
        return LineKind::Unrecognized;
    }

    if first == TICK_SENTINEL {
        return LineKind::TickDefinition;
    }

    if !SUPPORTED_METRICS.contains(&first) {
        return LineKind::Unrecognized;
    }

    // Same metric name starts both definition lines and data rows; the tick
    // code in field 1 is what tells them apart.
    match fields.next() {
        Some(second) if TICK_CODE.is_match(second) => LineKind::MetricDataRow,
        _ => LineKind::MetricDefinition,
    }
}
