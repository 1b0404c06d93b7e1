use thiserror::Error;

/// Resolution and line-shape failures raised while splitting an NMON log.
///
/// Every variant is fatal for the run: data rows reference ticks and metric
/// definitions that must already have been seen, so once a reference fails to
/// resolve the rest of the stream cannot be trusted.
#[derive(Error, Debug)]
pub enum SplitError {
    /// A data row referenced a tick code that no ZZZZ line has bound.
    #[error("unresolved tick code {code:?} at line {line_no}")]
    UnresolvedTick { code: String, line_no: u64 },

    /// A data row arrived before its metric type's definition line.
    #[error("metric type {name:?} used at line {line_no} before its definition")]
    UndefinedMetricType { name: String, line_no: u64 },

    /// A line matched a recognized shape but is missing or mangling the
    /// positional fields that shape requires.
    #[error("malformed line {line_no}: {reason}")]
    MalformedLine { line_no: u64, reason: String },
}
