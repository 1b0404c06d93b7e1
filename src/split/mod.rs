// src/split/mod.rs
use anyhow::{bail, Context, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::classify::{classify, LineKind, SEPARATOR};
use crate::error::SplitError;
use crate::resolve::{MetricCatalog, TickTable};

/// Separator for the emitted tables. Deliberately distinct from the input's
/// comma: NMON values may themselves contain empty comma-delimited gaps.
pub const OUT_SEPARATOR: &str = ";";

/// Counters for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// Input lines consumed, recognized or not.
    pub lines: u64,
    /// Data rows written across all tables.
    pub rows: u64,
    /// Output tables created.
    pub tables: u64,
}

/// Registry of lazily created per-metric-type output files.
///
/// The sink exclusively owns every handle it creates: one file per metric
/// type, named `<input>.<TYPE>.csv` under `out_dir`, header written exactly
/// once at creation time.
struct CsvSink {
    out_dir: PathBuf,
    base_name: String,
    files: HashMap<String, BufWriter<File>>,
}

impl CsvSink {
    fn new(out_dir: &Path, base_name: &str) -> Self {
        Self {
            out_dir: out_dir.to_path_buf(),
            base_name: base_name.to_string(),
            files: HashMap::new(),
        }
    }

    /// Append one resolved row, creating the table (and its header) on the
    /// first row of that metric type.
    fn append(
        &mut self,
        metric: &str,
        columns: &[String],
        epoch_secs: i64,
        values: &[&str],
    ) -> Result<()> {
        let writer = match self.files.entry(metric.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let path = self
                    .out_dir
                    .join(format!("{}.{}.csv", self.base_name, metric));
                let file = File::create(&path)
                    .with_context(|| format!("creating output table {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                let header: Vec<&str> = std::iter::once("timestamp")
                    .chain(columns.iter().map(String::as_str))
                    .collect();
                writeln!(writer, "{}", header.join(OUT_SEPARATOR))?;
                debug!(metric, path = %path.display(), "created output table");
                e.insert(writer)
            }
        };
        writeln!(
            writer,
            "{}{}{}",
            epoch_secs,
            OUT_SEPARATOR,
            values.join(OUT_SEPARATOR)
        )?;
        Ok(())
    }

    fn tables(&self) -> u64 {
        self.files.len() as u64
    }

    /// Flush and release every table created during the run.
    fn finish(self) -> Result<()> {
        for (metric, mut writer) in self.files {
            writer
                .flush()
                .with_context(|| format!("flushing output table for {}", metric))?;
        }
        Ok(())
    }
}

/// Split one NMON log into per-metric-type CSV tables under `out_dir`.
///
/// Lines are consumed strictly in file order, single pass: the format
/// guarantees every tick code and metric definition precedes the data rows
/// that reference it, so the first unresolvable reference aborts the run.
/// Partial output files may remain after an abort.
#[instrument(level = "info", skip(nmon_path, out_dir), fields(file = %nmon_path.as_ref().display()))]
pub fn split_nmon_to_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    nmon_path: P,
    out_dir: Q,
) -> Result<SplitSummary> {
    let start = Instant::now();
    let nmon_path = nmon_path.as_ref();
    let out_dir = out_dir.as_ref();

    let base_name = match nmon_path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_string(),
        None => bail!("input path {} has no file name", nmon_path.display()),
    };

    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let file = File::open(nmon_path)
        .with_context(|| format!("opening NMON file {}", nmon_path.display()))?;
    let reader = BufReader::new(file);

    let mut ticks = TickTable::new();
    let mut catalog = MetricCatalog::new();
    let mut sink = CsvSink::new(out_dir, &base_name);
    let mut summary = SplitSummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx as u64 + 1;
        let line =
            line.with_context(|| format!("reading {} at line {}", nmon_path.display(), line_no))?;
        summary.lines += 1;

        match classify(&line) {
            LineKind::TickDefinition => ticks.record(&line, line_no)?,
            LineKind::MetricDefinition => {
                let (name, width) = catalog.record(&line);
                debug!(metric = %name, columns = width, line_no, "recorded definition");
            }
            LineKind::MetricDataRow => {
                handle_data_row(&line, line_no, &ticks, &catalog, &mut sink)?;
                summary.rows += 1;
            }
            LineKind::Unrecognized => {}
        }
    }

    summary.tables = sink.tables();
    sink.finish()?;

    info!(
        lines = summary.lines,
        rows = summary.rows,
        tables = summary.tables,
        ticks = ticks.len(),
        metrics = catalog.len(),
        elapsed = ?start.elapsed(),
        "split complete"
    );
    Ok(summary)
}

/// Resolve one data row's tick code and column list, then append it to its
/// metric type's table. Values pass through verbatim; a row whose width does
/// not match its definition is written ragged rather than rejected.
fn handle_data_row(
    line: &str,
    line_no: u64,
    ticks: &TickTable,
    catalog: &MetricCatalog,
    sink: &mut CsvSink,
) -> Result<()> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() < 2 {
        return Err(SplitError::MalformedLine {
            line_no,
            reason: "data row is missing its tick code".to_string(),
        }
        .into());
    }
    let metric = fields[0];
    let timestamp = ticks.resolve(fields[1], line_no)?;
    let columns = catalog.columns_for(metric, line_no)?;

    // Truncate to whole epoch seconds only here, at write time.
    sink.append(metric, columns, timestamp.and_utc().timestamp(), &fields[2..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,nmonsplit::split=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const SAMPLE: &str = "\
AAA,progname,nmon
AAA,host,node-05
CPU_ALL,CPU Total node-05,User%,Sys%,Wait%,Idle%,Busy,CPUs
MEM,Memory node-05,memtotal,hightotal,lowtotal,swaptotal
ZZZZ,T0001,16:59:52,04-DEC-2015
CPU_ALL,T0001,0.1,0.3,0.1,99.5,,24
MEM,T0001,32094.2,-0.0,-0.0,2047.9
JFSFILE,T0001,1.2,3.4
ZZZZ,T0002,17:00:02,04-DEC-2015
CPU_ALL,T0002,0.2,0.4,0.1,99.3,,24
MEM,T0002,32094.2,-0.0,-0.0,2047.9
";

    fn write_sample(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn splits_interleaved_types_into_two_tables() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let input = write_sample(tmp.path(), "node05.nmon", SAMPLE);
        let out_dir = tmp.path().join("out/csv");

        let summary = split_nmon_to_csv(&input, &out_dir)?;
        assert_eq!(summary.lines, 11);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.tables, 2);

        let cpu = fs::read_to_string(out_dir.join("node05.nmon.CPU_ALL.csv"))?;
        assert_eq!(
            cpu,
            "timestamp;User%;Sys%;Wait%;Idle%;Busy;CPUs\n\
             1449248392;0.1;0.3;0.1;99.5;;24\n\
             1449248402;0.2;0.4;0.1;99.3;;24\n"
        );

        let mem = fs::read_to_string(out_dir.join("node05.nmon.MEM.csv"))?;
        assert_eq!(
            mem,
            "timestamp;memtotal;hightotal;lowtotal;swaptotal\n\
             1449248392;32094.2;-0.0;-0.0;2047.9\n\
             1449248402;32094.2;-0.0;-0.0;2047.9\n"
        );

        // The unsupported JFSFILE rows produced no third table.
        let csvs: Vec<_> = fs::read_dir(&out_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        assert_eq!(csvs.len(), 2);
        Ok(())
    }

    #[test]
    fn reruns_are_byte_identical() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let input = write_sample(tmp.path(), "node05.nmon", SAMPLE);
        let out_dir = tmp.path().join("out");

        split_nmon_to_csv(&input, &out_dir)?;
        let first = fs::read(out_dir.join("node05.nmon.CPU_ALL.csv"))?;
        split_nmon_to_csv(&input, &out_dir)?;
        let second = fs::read(out_dir.join("node05.nmon.CPU_ALL.csv"))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn unresolved_tick_aborts_the_run() {
        init_test_logging();
        let tmp = tempdir().unwrap();
        let input = write_sample(
            tmp.path(),
            "bad.nmon",
            "CPU_ALL,CPU Total,User%,Sys%\nCPU_ALL,T0009,0.1,0.3\n",
        );

        let err = split_nmon_to_csv(&input, tmp.path().join("out")).unwrap_err();
        match err.downcast_ref::<SplitError>() {
            Some(SplitError::UnresolvedTick { code, line_no }) => {
                assert_eq!(code, "T0009");
                assert_eq!(*line_no, 2);
            }
            other => panic!("expected UnresolvedTick, got {:?}", other),
        }
    }

    #[test]
    fn data_row_before_definition_aborts_the_run() {
        init_test_logging();
        let tmp = tempdir().unwrap();
        let input = write_sample(
            tmp.path(),
            "bad.nmon",
            "ZZZZ,T0001,16:59:52,04-DEC-2015\nMEM,T0001,32094.2,2047.9\n",
        );

        let err = split_nmon_to_csv(&input, tmp.path().join("out")).unwrap_err();
        match err.downcast_ref::<SplitError>() {
            Some(SplitError::UndefinedMetricType { name, line_no }) => {
                assert_eq!(name, "MEM");
                assert_eq!(*line_no, 2);
            }
            other => panic!("expected UndefinedMetricType, got {:?}", other),
        }
    }

    #[test]
    fn truncated_tick_definition_aborts_the_run() {
        init_test_logging();
        let tmp = tempdir().unwrap();
        let input = write_sample(tmp.path(), "bad.nmon", "ZZZZ,T0001,16:59:52\n");

        let err = split_nmon_to_csv(&input, tmp.path().join("out")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SplitError>(),
            Some(SplitError::MalformedLine { line_no: 1, .. })
        ));
    }

    #[test]
    fn ragged_rows_pass_through_verbatim() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let input = write_sample(
            tmp.path(),
            "ragged.nmon",
            "NET,Network I/O,eth0-read,eth0-write\n\
             ZZZZ,T0001,00:00:00,01-JAN-2016\n\
             NET,T0001,12.5\n",
        );
        let out_dir = tmp.path().join("out");

        let summary = split_nmon_to_csv(&input, &out_dir)?;
        assert_eq!(summary.rows, 1);

        let net = fs::read_to_string(out_dir.join("ragged.nmon.NET.csv"))?;
        assert_eq!(net, "timestamp;eth0-read;eth0-write\n1451606400;12.5\n");
        Ok(())
    }

    #[test]
    fn existing_out_dir_is_not_an_error() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let input = write_sample(tmp.path(), "node05.nmon", SAMPLE);

        split_nmon_to_csv(&input, tmp.path())?;
        assert!(tmp.path().join("node05.nmon.MEM.csv").is_file());
        Ok(())
    }
}
