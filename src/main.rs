use anyhow::Result;
use clap::Parser;
use nmonsplit::split;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Split an NMON performance log into one CSV file per metric type"
)]
struct Args {
    /// NMON file to be parsed
    file: PathBuf,

    /// Directory to store .csv files in, created if absent
    #[arg(long, default_value = "./")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    // ─── 2) parse args and split ─────────────────────────────────────
    let args = Args::parse();
    info!(file = %args.file.display(), out_dir = %args.out_dir.display(), "startup");

    let summary = split::split_nmon_to_csv(&args.file, &args.out_dir)?;

    info!(
        lines = summary.lines,
        rows = summary.rows,
        tables = summary.tables,
        "all done"
    );
    Ok(())
}
